//! The snapshot calendar: an ordered, hourly sequence of time steps.
//!
//! A [`Snapshots`] value is fixed for a run. Scenario rules that depend on the
//! calendar (seasonal availability factors, blackout hours) look up the season
//! and hour of day for each snapshot here.
use anyhow::{Result, ensure};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};

/// One quarter of the year, used for seasonal availability and demand rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Season {
    /// March to May
    Spring,
    /// June to August
    Summer,
    /// September to November
    Fall,
    /// December to February
    Winter,
}

impl Season {
    /// The season a given calendar month falls in.
    pub fn from_month(month: u32) -> Season {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Fall,
            _ => Season::Winter,
        }
    }
}

/// A per-season scaling factor, e.g. for gas or grid availability.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SeasonalFactors {
    /// Factor for March to May
    pub spring: f64,
    /// Factor for June to August
    pub summer: f64,
    /// Factor for September to November
    pub fall: f64,
    /// Factor for December to February
    pub winter: f64,
}

impl SeasonalFactors {
    /// A set of factors that leaves every season unchanged.
    pub fn all_year(factor: f64) -> Self {
        Self {
            spring: factor,
            summer: factor,
            fall: factor,
            winter: factor,
        }
    }

    /// The factor for a given season.
    pub fn get(&self, season: Season) -> f64 {
        match season {
            Season::Spring => self.spring,
            Season::Summer => self.summer,
            Season::Fall => self.fall,
            Season::Winter => self.winter,
        }
    }
}

impl Default for SeasonalFactors {
    fn default() -> Self {
        Self::all_year(1.0)
    }
}

/// Severity of dust conditions affecting wind generation.
#[derive(Debug, Clone, Copy, PartialEq, SerializeLabeledStringEnum, DeserializeLabeledStringEnum)]
pub enum DustSeverity {
    /// Occasional dust, negligible impact
    #[string = "low"]
    Low,
    /// Typical local conditions; the capacity-factor curve already reflects them
    #[string = "moderate"]
    Moderate,
    /// Frequent storms; wind output materially degraded
    #[string = "severe"]
    Severe,
}

/// The ordered hourly time horizon for one optimisation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshots {
    start: NaiveDateTime,
    len: usize,
}

impl Snapshots {
    /// Create a horizon of `len` hourly snapshots beginning at midnight on `start`.
    pub fn new(start: NaiveDate, len: usize) -> Result<Snapshots> {
        ensure!(len > 0, "The snapshot sequence cannot be empty");
        Ok(Snapshots {
            start: start.and_hms_opt(0, 0, 0).unwrap(),
            len,
        })
    }

    /// The number of snapshots in the horizon.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the horizon is empty. It never is; see [`Snapshots::new`].
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The timestamp of the given snapshot.
    pub fn timestamp(&self, index: usize) -> NaiveDateTime {
        self.start + Duration::hours(index as i64)
    }

    /// The season the given snapshot falls in.
    pub fn season(&self, index: usize) -> Season {
        Season::from_month(self.timestamp(index).month())
    }

    /// The hour of day (0-23) of the given snapshot.
    pub fn hour_of_day(&self, index: usize) -> u32 {
        self.timestamp(index).hour()
    }

    /// Iterate over snapshot indices.
    pub fn iter(&self) -> impl Iterator<Item = usize> {
        0..self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, Season::Winter)]
    #[case(3, Season::Spring)]
    #[case(7, Season::Summer)]
    #[case(10, Season::Fall)]
    #[case(12, Season::Winter)]
    fn test_season_from_month(#[case] month: u32, #[case] expected: Season) {
        assert_eq!(Season::from_month(month), expected);
    }

    #[test]
    fn test_snapshots_calendar() {
        let snapshots = Snapshots::new(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(), 48).unwrap();
        assert_eq!(snapshots.len(), 48);
        assert_eq!(snapshots.hour_of_day(0), 0);
        assert_eq!(snapshots.hour_of_day(25), 1);
        assert_eq!(snapshots.season(0), Season::Winter);
    }

    #[test]
    fn test_snapshots_must_not_be_empty() {
        assert!(Snapshots::new(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(), 0).is_err());
    }

    #[test]
    fn test_seasonal_factors_lookup() {
        let factors = SeasonalFactors {
            spring: 0.9,
            summer: 1.0,
            fall: 0.6,
            winter: 0.3,
        };
        assert_eq!(factors.get(Season::Winter), 0.3);
        assert_eq!(factors.get(Season::Summer), 1.0);
        assert_eq!(SeasonalFactors::default().get(Season::Fall), 1.0);
    }
}
