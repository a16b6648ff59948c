//! System state and status as reported by either side of the integration

use serde::{Deserialize, Serialize};

/// Operational state of the external system or the process model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    /// Nothing reported yet
    #[default]
    Unknown,
    /// Adapter cannot reach its counterpart
    NotAvailable,
    /// Connected but not advancing
    Idle,
    /// Advancing in real time
    Running,
    /// Connected and holding its current values
    Frozen,
    /// Counterpart reports an error condition
    Error,
}

impl std::fmt::Display for SystemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::NotAvailable => write!(f, "not_available"),
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Frozen => write!(f, "frozen"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Severity of a status report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    #[default]
    Unknown,
    Ok,
    Warning,
    Error,
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Ok => write!(f, "ok"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Status code plus a human-readable message
///
/// Replaced wholesale on every update, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SystemStatus {
    pub code: StatusCode,
    pub message: String,
}

impl SystemStatus {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Ok, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Error, message)
    }
}

/// State and status published together so readers never see a mix of two updates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct SystemSnapshot {
    pub state: SystemState,
    pub status: SystemStatus,
}

impl SystemSnapshot {
    pub fn new(state: SystemState, status: SystemStatus) -> Self {
        Self { state, status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_unknown() {
        assert_eq!(SystemState::default(), SystemState::Unknown);
        assert_eq!(SystemStatus::default().code, StatusCode::Unknown);
        assert!(SystemStatus::default().message.is_empty());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SystemState::NotAvailable.to_string(), "not_available");
        assert_eq!(SystemState::Running.to_string(), "running");
    }

    #[test]
    fn test_status_constructors() {
        let status = SystemStatus::warning("link degraded");
        assert_eq!(status.code, StatusCode::Warning);
        assert_eq!(status.message, "link degraded");
    }
}
