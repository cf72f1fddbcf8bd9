use serde::{Deserialize, Serialize};
use std::convert::Infallible;

/// Job priority levels for lane selection (higher values drain first).
///
/// Persisted as an integer ordinal: `Low=0, Normal=1, High=2, Critical=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum JobPriority {
    /// Low priority jobs (processed last)
    Low = 0,

    /// Normal priority jobs (default)
    Normal = 1,

    /// High priority jobs
    High = 2,

    /// Critical priority jobs (always drained first)
    Critical = 3,
}

impl Default for JobPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl JobPriority {
    /// Get all priority levels in order (low to high)
    pub fn all() -> &'static [JobPriority] {
        &[Self::Low, Self::Normal, Self::High, Self::Critical]
    }

    /// Priority levels in the order `dequeue` drains them
    pub fn drain_order() -> &'static [JobPriority] {
        &[Self::Critical, Self::High, Self::Normal, Self::Low]
    }

    /// Get the numeric ordinal
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create from numeric ordinal
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Low),
            1 => Some(Self::Normal),
            2 => Some(Self::High),
            3 => Some(Self::Critical),
            _ => None,
        }
    }

    /// Get the canonical lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parse a priority name, falling back to `Normal` for anything unrecognized
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "normal" => Self::Normal,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Normal,
        }
    }
}

impl std::fmt::Display for JobPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for JobPriority {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<JobPriority> for u8 {
    fn from(priority: JobPriority) -> Self {
        priority.as_u8()
    }
}

impl TryFrom<u8> for JobPriority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or_else(|| format!("Invalid priority ordinal: {}", value))
    }
}
