//! crates/muneccim_core/src/session.rs
//!
//! Sign-in and sign-out notifications. The auth layer publishes, and anything holding
//! per-user state (the workspace registry) subscribes.

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::domain::User;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(User),
    SignedOut { user_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: SessionEvent) {
        if self.sender.send(event).is_err() {
            debug!("Session event dropped: no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_events_in_order() {
        let events = SessionEvents::new();
        let mut rx = events.subscribe();
        let user = User {
            user_id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
        };

        events.publish(SessionEvent::SignedIn(user.clone()));
        events.publish(SessionEvent::SignedOut {
            user_id: user.user_id,
        });

        assert_eq!(rx.recv().await.unwrap(), SessionEvent::SignedIn(user.clone()));
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::SignedOut {
                user_id: user.user_id
            }
        );
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        SessionEvents::new().publish(SessionEvent::SignedOut {
            user_id: Uuid::nil(),
        });
    }
}
