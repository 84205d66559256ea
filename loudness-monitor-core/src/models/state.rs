use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Monitor state machine.
///
/// State transitions:
/// ```text
/// idle ──activate ok──→ capturing
///   ↑                       │
///   └── deactivate / device lost / drop
/// ```
///
/// A failed activation never leaves `Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MonitorState {
    #[default]
    Idle,
    Capturing {
        session_id: Uuid,
        since: DateTime<Utc>,
    },
}

impl MonitorState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing { .. })
    }

    /// Id of the open session, if any.
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            Self::Capturing { session_id, .. } => Some(*session_id),
            Self::Idle => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Capturing { .. } => "capturing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        let state = MonitorState::default();
        assert!(state.is_idle());
        assert!(!state.is_capturing());
        assert_eq!(state.session_id(), None);
        assert_eq!(state.label(), "idle");
    }

    #[test]
    fn capturing_exposes_session_id() {
        let id = Uuid::new_v4();
        let state = MonitorState::Capturing {
            session_id: id,
            since: Utc::now(),
        };
        assert!(state.is_capturing());
        assert_eq!(state.session_id(), Some(id));
        assert_eq!(state.label(), "capturing");
    }
}
