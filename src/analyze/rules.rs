//! Ordered threshold rules mapping a reading to a diagnosis.
//!
//! Rules are evaluated top to bottom and the first match wins. A reading that
//! matches nothing is `Indeterminate`, so classification is total.

use super::diagnosis::Diagnosis;
use super::reading::ColorReading;

/// Constraint on a single channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Any,
    /// Strictly greater than.
    Above(u8),
    /// Strictly less than.
    Below(u8),
}

impl Bound {
    fn admits(self, value: u8) -> bool {
        match self {
            Bound::Any => true,
            Bound::Above(limit) => value > limit,
            Bound::Below(limit) => value < limit,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rule {
    pub diagnosis: Diagnosis,
    pub red: Bound,
    pub green: Bound,
    pub blue: Bound,
}

impl Rule {
    pub fn matches(&self, reading: &ColorReading) -> bool {
        self.red.admits(reading.red)
            && self.green.admits(reading.green)
            && self.blue.admits(reading.blue)
    }
}

pub const RULES: [Rule; 3] = [
    Rule {
        diagnosis: Diagnosis::HighPitta,
        red: Bound::Above(160),
        green: Bound::Below(120),
        blue: Bound::Below(120),
    },
    Rule {
        diagnosis: Diagnosis::KaphaAma,
        red: Bound::Above(180),
        green: Bound::Above(180),
        blue: Bound::Above(180),
    },
    Rule {
        diagnosis: Diagnosis::Healthy,
        red: Bound::Above(130),
        green: Bound::Below(140),
        blue: Bound::Any,
    },
];

pub fn diagnose(reading: &ColorReading) -> Diagnosis {
    RULES
        .iter()
        .find(|rule| rule.matches(reading))
        .map(|rule| rule.diagnosis)
        .unwrap_or(Diagnosis::Indeterminate)
}
