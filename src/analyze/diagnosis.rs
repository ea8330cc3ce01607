use serde::{Serialize, Serializer};

/// Coarse tongue-color diagnosis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Diagnosis {
    /// Red tongue: excess Pitta.
    HighPitta,
    /// Pale white coating: Kapha with Ama.
    KaphaAma,
    /// Pink tongue, balanced Agni.
    Healthy,
    /// No rule matched; usually a lighting problem.
    Indeterminate,
}

impl Diagnosis {
    pub fn label(&self) -> &'static str {
        match self {
            Diagnosis::HighPitta => "High-Pitta",
            Diagnosis::KaphaAma => "Kapha-Ama",
            Diagnosis::Healthy => "Healthy",
            Diagnosis::Indeterminate => "Indeterminate",
        }
    }

    /// Category tag used by renderers for styling.
    pub fn category(&self) -> &'static str {
        match self {
            Diagnosis::HighPitta => "pitta",
            Diagnosis::KaphaAma => "kapha",
            Diagnosis::Healthy => "healthy",
            Diagnosis::Indeterminate => "neutral",
        }
    }

    /// Sentence shown to the user.
    pub fn message(&self) -> &'static str {
        match self {
            Diagnosis::HighPitta => "High Pitta - redness detected",
            Diagnosis::KaphaAma => "Kapha Ama - white coating found",
            Diagnosis::Healthy => "Healthy pink - balanced Agni",
            Diagnosis::Indeterminate => "Adjust lighting",
        }
    }
}

impl std::fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Diagnosis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}
