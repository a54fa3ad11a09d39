//! Types for registrations and their test items.

use serde::{Deserialize, Serialize};

/// Opaque registration key.
pub type RegistrationKey = String;

/// Processing flag stored on a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingFlag {
    /// Not yet eligible for delivery.
    NotEligible,
    /// Eligible and waiting for the pipeline.
    Queued,
    /// Report generated and registration completed.
    Processed,
}

impl ProcessingFlag {
    /// Column value of this flag.
    pub fn as_i64(&self) -> i64 {
        match self {
            ProcessingFlag::NotEligible => 0,
            ProcessingFlag::Queued => 1,
            ProcessingFlag::Processed => 2,
        }
    }

    /// Parses a column value.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(ProcessingFlag::NotEligible),
            1 => Some(ProcessingFlag::Queued),
            2 => Some(ProcessingFlag::Processed),
            _ => None,
        }
    }
}

/// Discriminator of a test item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Maps directly to a report template.
    Group,
    /// Resolves its template through a mega profile.
    Mega,
}

impl ItemType {
    /// Column value of this item type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Group => "group",
            ItemType::Mega => "mega",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_flag_roundtrip() {
        for flag in [
            ProcessingFlag::NotEligible,
            ProcessingFlag::Queued,
            ProcessingFlag::Processed,
        ] {
            assert_eq!(ProcessingFlag::from_i64(flag.as_i64()), Some(flag));
        }
        assert_eq!(ProcessingFlag::from_i64(7), None);
    }

    #[test]
    fn test_item_type_as_str() {
        assert_eq!(ItemType::Group.as_str(), "group");
        assert_eq!(ItemType::Mega.as_str(), "mega");
    }
}
