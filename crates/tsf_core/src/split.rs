//! Data split types for train/validation/test.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One of the three partitions a series is cut into before windowing.
///
/// ```rust
/// use tsf_core::Split;
///
/// let split: Split = "valid".parse().unwrap();
/// assert_eq!(split, Split::Validation);
/// assert_eq!(split.to_string(), "validation");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    /// Training partition.
    #[default]
    Train,
    /// Validation partition, drives model selection and early stopping.
    #[serde(alias = "valid")]
    Validation,
    /// Test partition.
    Test,
}

impl Split {
    /// All splits in time order.
    pub const ALL: [Split; 3] = [Split::Train, Split::Validation, Split::Test];

    /// Check if this is the training split.
    #[must_use]
    pub const fn is_train(&self) -> bool {
        matches!(self, Split::Train)
    }

    /// Get the split index (0=Train, 1=Validation, 2=Test).
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Split::Train => 0,
            Split::Validation => 1,
            Split::Test => 2,
        }
    }

    /// Lowercase name used in file names and configs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Split {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Split::Train),
            "validation" | "valid" => Ok(Split::Validation),
            "test" => Ok(Split::Test),
            other => Err(CoreError::UnknownSplit(other.to_string())),
        }
    }
}
