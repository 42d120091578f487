//! Session lifecycle notifications.

use tokio::sync::broadcast;

/// Capacity of the session event channel.
const EVENT_CAPACITY: usize = 32;

/// A change in session state that the application may react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Tokens were stored by a login or token-completion flow.
    LoggedIn { subject: Option<String> },
    /// A refresh minted a new access token.
    Refreshed,
    /// The session could not be renewed; the app must navigate to `redirect_to`.
    Expired { redirect_to: String },
    /// The user signed out.
    LoggedOut,
}

/// Broadcast hub for [`SessionEvent`]s. Publishing never blocks or fails.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        tracing::debug!(?event, "Publishing session event");
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
