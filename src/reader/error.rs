use thiserror::Error;

/// Failure taxonomy for card reader operations, shared by both transports.
///
/// `Timeout` (this client gave up waiting) and `NoCard` (the reader itself
/// reported that no card arrived before its own scan window closed) are
/// deliberately distinct variants with the same operator wording: the desk
/// staff react identically, the logs should not.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Bluetooth operation attempted without an established session.
    #[error("not connected to the Bluetooth card reader")]
    NotConnected,

    /// No reply within the caller-supplied window.
    #[error("no card detected, try again")]
    Timeout,

    /// The reader reported its own scan timeout.
    #[error("no card detected, try again")]
    NoCard,

    /// The reader reported a failure reason of its own.
    #[error("card reader reported a failure: {0}")]
    Device(String),

    /// Status value outside the `waiting`/`success`/`error:*` protocol.
    #[error("unexpected reader status {0:?}")]
    UnexpectedStatus(String),

    /// The Bluetooth link dropped while an operation was in flight.
    #[error("connection to the card reader was lost")]
    ConnectionLost,

    /// An operation is already outstanding on this transport.
    #[error("another card operation is still in progress")]
    Busy,

    /// Could not establish the Bluetooth session.
    #[error("Bluetooth connection failed: {0}")]
    Connect(String),

    /// The local reader service answered with an error of its own.
    #[error("{0}")]
    Service(String),

    /// Could not reach the local reader service at all.
    #[error("card reader service unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    /// Payload from the reader was not valid for the operation.
    #[error("unusable reader payload: {0}")]
    Payload(String),

    /// The transport preference could not be persisted.
    #[error("failed to persist reader preferences: {0}")]
    Prefs(String),
}

impl ReaderError {
    /// True when re-presenting the card is a sensible next step for the
    /// operator, as opposed to fixing the connection first.
    pub fn is_retryable_tap(&self) -> bool {
        matches!(self, Self::Timeout | Self::NoCard)
    }
}
