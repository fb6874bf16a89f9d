/// Terminal outcomes recorded in the checkpoint store
///
/// Every page reaches exactly one of these, and it is written once.
use std::fmt;

/// How processing of a page ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Page was handled: a collection extracted or its records emitted
    Processed,

    /// Permanent fetch failure (not found, malformed); never retried
    Skipped,

    /// Transient failures exhausted the retry budget
    Failed,

    /// A candidate record was rejected by the validator
    FailedValidation,

    /// Page was neither a collection nor a content item
    Unclassified,
}

impl Outcome {
    /// Returns true for outcomes that count as errors in the summary
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed | Self::FailedValidation)
    }

    /// Returns true for outcomes `--retry-failures` clears
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Converts the outcome to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::FailedValidation => "failed_validation",
            Self::Unclassified => "unclassified",
        }
    }

    /// Parses an outcome from its database string representation
    ///
    /// Returns None if the string doesn't match any known outcome.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "processed" => Some(Self::Processed),
            "skipped" => Some(Self::Skipped),
            "failed" => Some(Self::Failed),
            "failed_validation" => Some(Self::FailedValidation),
            "unclassified" => Some(Self::Unclassified),
            _ => None,
        }
    }

    /// Returns all outcomes in summary order
    pub fn all() -> [Self; 5] {
        [
            Self::Processed,
            Self::Skipped,
            Self::Failed,
            Self::FailedValidation,
            Self::Unclassified,
        ]
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
