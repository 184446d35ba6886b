//! Notifier port
//!
//! Outbound delivery of result summaries to an operator channel (a chat
//! bot in production). The core only formats the message.

use crate::domain::result::Result;

pub trait Notifier: Send + Sync {
    /// Channel name (e.g., "telegram")
    fn name(&self) -> &str;

    /// Whether credentials/destination are present
    fn is_configured(&self) -> bool;

    /// Deliver a plain-text message, returning the channel's message id
    ///
    /// Failures must be reported as `Error::UpstreamNotification`.
    fn send(&self, message: &str) -> Result<String>;
}
