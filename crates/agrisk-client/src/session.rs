//! Session-end notification

/// Told when the session ends without the user signing out
///
/// Implementations typically route the user to the sign-in view.
pub trait SessionListener: Send + Sync {
    /// Tokens were rejected or could not be refreshed; they have already
    /// been cleared from both stores
    fn session_expired(&self);
}

/// Listener that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyListener;

impl SessionListener for LogOnlyListener {
    fn session_expired(&self) {
        tracing::info!("session expired; sign in again to continue");
    }
}
