use crate::types::StepAction;
use tokio::sync::broadcast;

/// One dispatched step, published for the `StreamChannel` to turn into
/// user-visible chunks. Cheap to clone: the `action` carries its own
/// `think` text, everything else is metadata for ordering.
#[derive(Debug, Clone)]
pub struct ActionEvent {
    pub total_step: u32,
    pub question: String,
    pub action: StepAction,
}

/// Publishes every step the scheduler takes. A single scheduler has a
/// single subscriber in practice (the `StreamChannel`), but `broadcast` is
/// used — rather than a bespoke single-consumer channel — so a debug
/// listener can be attached without disturbing the primary consumer,
/// mirroring the teacher's preference for `tokio::sync` primitives over a
/// general pub/sub bus (§9).
#[derive(Clone)]
pub struct ActionTracker {
    sender: broadcast::Sender<ActionEvent>,
}

impl ActionTracker {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActionEvent> {
        self.sender.subscribe()
    }

    /// Publish a step. Send failures (no subscribers) are not an error —
    /// a non-streaming request never subscribes at all.
    pub fn publish(&self, event: ActionEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for ActionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_events_in_order() {
        let tracker = ActionTracker::new();
        let mut rx = tracker.subscribe();

        tracker.publish(ActionEvent {
            total_step: 1,
            question: "q".into(),
            action: StepAction::Search {
                queries: vec!["a".into()],
                think: "t1".into(),
            },
        });
        tracker.publish(ActionEvent {
            total_step: 2,
            question: "q".into(),
            action: StepAction::Reflect {
                sub_questions: vec![],
                think: "t2".into(),
            },
        });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.total_step, 1);
        assert_eq!(second.total_step, 2);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let tracker = ActionTracker::new();
        tracker.publish(ActionEvent {
            total_step: 1,
            question: "q".into(),
            action: StepAction::Coding {
                issue: "x".into(),
                think: "t".into(),
            },
        });
    }
}
