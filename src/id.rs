//! Code for handling string IDs
use anyhow::{Context, Result};
use indexmap::IndexMap;

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone, std::hash::Hash, PartialEq, Eq, serde::Deserialize, Debug, serde::Serialize,
        )]
        /// An ID type (e.g. `TechnologyID`, `ScenarioID`)
        pub struct $name(pub std::sync::Arc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::sync::Arc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::sync::Arc::from(s))
            }
        }
    };
}

define_id_type! {TechnologyID}
define_id_type! {ScenarioID}

/// Look up an entry in a name-keyed map, failing with the unknown ID in the message.
pub fn lookup<'a, ID, V>(map: &'a IndexMap<ID, V>, id: &str) -> Result<&'a V>
where
    ID: std::hash::Hash + Eq + std::borrow::Borrow<str>,
{
    map.get(id).with_context(|| format!("Unknown ID {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    #[test]
    fn test_lookup() {
        let map = indexmap! { TechnologyID::from("wind") => 1 };
        assert_eq!(*lookup(&map, "wind").unwrap(), 1);
        assert!(lookup(&map, "solar").is_err());
    }
}
