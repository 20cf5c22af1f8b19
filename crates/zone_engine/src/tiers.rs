//! Accuracy and detection tiers
//!
//! Both enumerations are closed: the only way to obtain a value from
//! outside the type system (config files, numeric ids, names) is through
//! `TryFrom<u8>` / `FromStr`, which reject anything not listed here.

use crate::error::{Result, ZoneError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How often a zone re-evaluates its occupants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Accuracy {
    /// Checks every 1 second
    Low,
    /// Checks every 0.5 seconds
    Medium,
    /// Checks every 0.1 seconds
    High,
    /// Checks every frame
    Precise,
}

impl Accuracy {
    /// Every tier, ordered from slowest to fastest
    pub const ALL: [Accuracy; 4] = [Self::Low, Self::Medium, Self::High, Self::Precise];

    /// Numeric value of the tier
    pub fn value(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Precise => 4,
        }
    }

    /// Poll interval in seconds; zero means once per frame
    pub fn interval(self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 0.5,
            Self::High => 0.1,
            Self::Precise => 0.0,
        }
    }

    /// Dense index for per-tier tables
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Tier name
    pub fn name(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Precise => "Precise",
        }
    }
}

impl Default for Accuracy {
    fn default() -> Self {
        Self::High
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Accuracy {
    type Error = ZoneError;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.value() == value)
            .ok_or_else(|| ZoneError::invalid_tier("accuracy", value))
    }
}

impl FromStr for Accuracy {
    type Err = ZoneError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ZoneError::invalid_tier("accuracy", s))
    }
}

/// How a character is sampled when deciding whether it is inside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Detection {
    /// Multiple samples spread over the character's bounds
    WholeBody,
    /// A single sample at the character's root
    Centre,
    /// WholeBody while the player population is small, Centre beyond it
    Automatic,
}

impl Detection {
    /// Every detection level
    pub const ALL: [Detection; 3] = [Self::WholeBody, Self::Centre, Self::Automatic];

    /// Numeric value of the level
    pub fn value(self) -> u8 {
        match self {
            Self::WholeBody => 0,
            Self::Centre => 2,
            Self::Automatic => 3,
        }
    }

    /// Level name
    pub fn name(self) -> &'static str {
        match self {
            Self::WholeBody => "WholeBody",
            Self::Centre => "Centre",
            Self::Automatic => "Automatic",
        }
    }

    /// Concrete sampling strategy for the current player population
    pub fn resolve(self, player_count: usize, automatic_threshold: usize) -> Sampling {
        match self {
            Self::WholeBody => Sampling::WholeBody,
            Self::Centre => Sampling::Centre,
            Self::Automatic if player_count < automatic_threshold => Sampling::WholeBody,
            Self::Automatic => Sampling::Centre,
        }
    }
}

impl Default for Detection {
    fn default() -> Self {
        Self::Automatic
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Detection {
    type Error = ZoneError;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.value() == value)
            .ok_or_else(|| ZoneError::invalid_tier("detection", value))
    }
}

impl FromStr for Detection {
    type Err = ZoneError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ZoneError::invalid_tier("detection", s))
    }
}

/// Sampling strategy a detection level resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sampling {
    /// Centre and corners of the character bounds
    WholeBody,
    /// Character root only
    Centre,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_intervals() {
        assert_eq!(Accuracy::Low.interval(), 1.0);
        assert_eq!(Accuracy::Medium.interval(), 0.5);
        assert_eq!(Accuracy::High.interval(), 0.1);
        assert_eq!(Accuracy::Precise.interval(), 0.0);
        assert_eq!(Accuracy::default(), Accuracy::High);
    }

    #[test]
    fn test_numeric_values_are_closed() {
        assert_eq!(Accuracy::try_from(1).unwrap(), Accuracy::Low);
        assert_eq!(Accuracy::try_from(4).unwrap(), Accuracy::Precise);
        assert!(matches!(
            Accuracy::try_from(5),
            Err(ZoneError::InvalidTier { kind: "accuracy", .. })
        ));

        assert_eq!(Detection::try_from(0).unwrap(), Detection::WholeBody);
        assert_eq!(Detection::try_from(2).unwrap(), Detection::Centre);
        assert!(Detection::try_from(1).is_err());
    }

    #[test]
    fn test_names_parse() {
        assert_eq!("precise".parse::<Accuracy>().unwrap(), Accuracy::Precise);
        assert_eq!("Centre".parse::<Detection>().unwrap(), Detection::Centre);
        let err = "Ultra".parse::<Accuracy>().unwrap_err();
        assert!(err.to_string().contains("Ultra"));
    }

    #[test]
    fn test_automatic_switches_on_threshold() {
        assert_eq!(Detection::Automatic.resolve(99, 100), Sampling::WholeBody);
        assert_eq!(Detection::Automatic.resolve(100, 100), Sampling::Centre);
        assert_eq!(Detection::WholeBody.resolve(500, 100), Sampling::WholeBody);
        assert_eq!(Detection::Centre.resolve(0, 100), Sampling::Centre);
    }
}
