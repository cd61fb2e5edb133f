//! Evidence status lattice and workflow status codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of comparing an object's current state with its secured ground truth.
///
/// Variants are declared in increasing severity so the derived `Ord` gives
/// `Ok < Warn < Ko < Fatal`. A status accumulated over several checks only
/// ever moves up; use [`EvidenceStatus::worst`] to fold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum EvidenceStatus {
    /// Verified consistent
    #[default]
    #[serde(rename = "OK")]
    Ok,
    /// Expected transient condition (not yet secured, no covering operation)
    #[serde(rename = "WARN")]
    Warn,
    /// Confirmed business-rule violation
    #[serde(rename = "KO")]
    Ko,
    /// Technical or infrastructure failure
    #[serde(rename = "FATAL")]
    Fatal,
}

impl EvidenceStatus {
    /// The more severe of two statuses.
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }

    /// Fold any number of statuses, starting from `Ok`.
    pub fn worst_of(statuses: impl IntoIterator<Item = Self>) -> Self {
        statuses.into_iter().fold(Self::Ok, Self::worst)
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Ko => "KO",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for EvidenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status reported to the workflow engine and written to the logbook.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    #[default]
    Unknown,
    Started,
    Ok,
    Warning,
    Ko,
    Fatal,
}

impl StatusCode {
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Started => "STARTED",
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Ko => "KO",
            Self::Fatal => "FATAL",
        }
    }
}

impl From<EvidenceStatus> for StatusCode {
    fn from(status: EvidenceStatus) -> Self {
        match status {
            EvidenceStatus::Ok => Self::Ok,
            EvidenceStatus::Warn => Self::Warning,
            EvidenceStatus::Ko => Self::Ko,
            EvidenceStatus::Fatal => Self::Fatal,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
