use thiserror::Error;

/// Errors surfaced by hub transport operations.
///
/// Only `Connect` is fatal, and only during startup. Everything else is
/// contained where it is detected: the next telemetry tick resends fresh data,
/// so transient failures self-heal without retry machinery.
#[derive(Debug, Error)]
pub enum HubError {
    /// The transport connection could not be established.
    #[error("hub connection failed: {0}")]
    Connect(String),

    /// A send, fetch or patch failed; safe to drop and move on.
    #[error("transient hub failure: {0}")]
    Transient(String),
}
