//! Progress reports published by adapters

use serde::{Deserialize, Serialize};

/// Progress of a long-running adapter activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Percent complete (0-100), meaningless when `indeterminate` is set
    pub percent_complete: u32,

    /// What the adapter is doing
    pub message: String,

    /// True when the adapter cannot estimate completion
    pub indeterminate: bool,
}

impl ProgressInfo {
    pub fn new(percent_complete: u32, message: impl Into<String>, indeterminate: bool) -> Self {
        Self {
            percent_complete,
            message: message.into(),
            indeterminate,
        }
    }
}

impl Default for ProgressInfo {
    fn default() -> Self {
        Self::new(0, "Not available", true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_not_available() {
        let progress = ProgressInfo::default();
        assert_eq!(progress.percent_complete, 0);
        assert_eq!(progress.message, "Not available");
        assert!(progress.indeterminate);
    }
}
