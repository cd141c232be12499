//! Transfer state machine.

use serde::{Deserialize, Serialize};
use stock_store::TransferStatus;

/// An event that moves a transfer between statuses.
///
/// ```text
/// NotStarted ──begin──► InProgress ──┬──complete──► Completed
///                                    ├──revert────► Reverted
///                                    └──fail──────► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferEvent {
    Begin,
    Complete,
    Revert,
    Fail,
}

impl TransferEvent {
    /// Maps a requested target status onto the event that reaches it.
    ///
    /// `NotStarted` is only ever the initial status and has no event.
    pub fn from_target(target: TransferStatus) -> Option<Self> {
        match target {
            TransferStatus::NotStarted => None,
            TransferStatus::InProgress => Some(TransferEvent::Begin),
            TransferStatus::Completed => Some(TransferEvent::Complete),
            TransferStatus::Reverted => Some(TransferEvent::Revert),
            TransferStatus::Failed => Some(TransferEvent::Fail),
        }
    }

    /// Change applied to the (source, destination) quantities.
    pub fn deltas(&self, quantity: i64) -> (i64, i64) {
        match self {
            TransferEvent::Begin => (-quantity, 0),
            TransferEvent::Complete => (0, quantity),
            TransferEvent::Revert => (quantity, 0),
            TransferEvent::Fail => (0, 0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferEvent::Begin => "begin",
            TransferEvent::Complete => "complete",
            TransferEvent::Revert => "revert",
            TransferEvent::Fail => "fail",
        }
    }
}

impl std::fmt::Display for TransferEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returns the status reached by applying `event` in `current`, or `None` if
/// the event is not allowed there.
pub fn transition(current: TransferStatus, event: TransferEvent) -> Option<TransferStatus> {
    match (current, event) {
        (TransferStatus::NotStarted, TransferEvent::Begin) => Some(TransferStatus::InProgress),
        (TransferStatus::InProgress, TransferEvent::Complete) => Some(TransferStatus::Completed),
        (TransferStatus::InProgress, TransferEvent::Revert) => Some(TransferStatus::Reverted),
        (TransferStatus::InProgress, TransferEvent::Fail) => Some(TransferStatus::Failed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [TransferStatus; 5] = [
        TransferStatus::NotStarted,
        TransferStatus::InProgress,
        TransferStatus::Completed,
        TransferStatus::Reverted,
        TransferStatus::Failed,
    ];

    const ALL_EVENTS: [TransferEvent; 4] = [
        TransferEvent::Begin,
        TransferEvent::Complete,
        TransferEvent::Revert,
        TransferEvent::Fail,
    ];

    #[test]
    fn allowed_transitions() {
        assert_eq!(
            transition(TransferStatus::NotStarted, TransferEvent::Begin),
            Some(TransferStatus::InProgress)
        );
        assert_eq!(
            transition(TransferStatus::InProgress, TransferEvent::Complete),
            Some(TransferStatus::Completed)
        );
        assert_eq!(
            transition(TransferStatus::InProgress, TransferEvent::Revert),
            Some(TransferStatus::Reverted)
        );
        assert_eq!(
            transition(TransferStatus::InProgress, TransferEvent::Fail),
            Some(TransferStatus::Failed)
        );
    }

    #[test]
    fn terminal_statuses_accept_no_event() {
        for status in ALL_STATUSES.into_iter().filter(|s| s.is_terminal()) {
            for event in ALL_EVENTS {
                assert_eq!(transition(status, event), None, "{status} + {event}");
            }
        }
    }

    #[test]
    fn not_started_only_begins() {
        for event in ALL_EVENTS {
            let next = transition(TransferStatus::NotStarted, event);
            assert_eq!(next.is_some(), event == TransferEvent::Begin);
        }
        assert_eq!(
            transition(TransferStatus::InProgress, TransferEvent::Begin),
            None
        );
    }

    #[test]
    fn event_reaches_its_target() {
        for target in ALL_STATUSES {
            if let Some(event) = TransferEvent::from_target(target) {
                let from = if event == TransferEvent::Begin {
                    TransferStatus::NotStarted
                } else {
                    TransferStatus::InProgress
                };
                assert_eq!(transition(from, event), Some(target));
            }
        }
        assert_eq!(TransferEvent::from_target(TransferStatus::NotStarted), None);
    }

    #[test]
    fn quantity_leaves_source_and_lands_on_complete() {
        assert_eq!(TransferEvent::Begin.deltas(20), (-20, 0));
        assert_eq!(TransferEvent::Complete.deltas(20), (0, 20));
        assert_eq!(TransferEvent::Revert.deltas(20), (20, 0));
        assert_eq!(TransferEvent::Fail.deltas(20), (0, 0));
    }

    #[test]
    fn event_serializes_snake_case() {
        let json = serde_json::to_string(&TransferEvent::Revert).unwrap();
        assert_eq!(json, "\"revert\"");
    }
}
