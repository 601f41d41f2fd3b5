//! Validate the bundled demo model.
use nexusplan::cli::handle_validate_command;
use std::path::Path;

#[test]
fn test_validate_demo_model() {
    let model_dir = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/saravan"));
    handle_validate_command(model_dir).unwrap();
}

#[test]
fn test_validate_missing_model() {
    let model_dir = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/nowhere"));
    assert!(handle_validate_command(model_dir).is_err());
}
