//! Shared command/status vocabulary of the reader protocol.
//!
//! Both transports speak the same three commands; the Bluetooth bridge
//! additionally reports outcomes through a status mailbox whose raw values
//! (`waiting`, `success`, `error:<reason>`) are parsed here into a tagged
//! type so firmware surprises surface as protocol errors instead of being
//! string-matched into silence.

use crate::card::CardId;

use super::error::ReaderError;

/// Status value the bridge parks in the mailbox while idle.
const STATUS_WAITING: &str = "waiting";
const STATUS_SUCCESS: &str = "success";
const STATUS_ERROR_PREFIX: &str = "error:";

/// Reason string the bridge uses for its own scan timeout.
const DEVICE_TIMEOUT_REASON: &str = "timeout";

/// One logical command issued to a reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderCommand {
    Read,
    Write(CardId),
    Format,
}

impl ReaderCommand {
    /// Wire form written to the command characteristic.
    pub fn encode(&self) -> String {
        match self {
            Self::Read => "READ".to_owned(),
            Self::Write(card) => format!("WRITE:{card}"),
            Self::Format => "FORMAT".to_owned(),
        }
    }

    /// Label used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write(_) => "write",
            Self::Format => "format",
        }
    }
}

/// Decoded value of the status characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderStatus {
    /// No command outcome pending.
    Waiting,
    Success,
    /// The reader reported a failure with the given reason.
    Error(String),
}

impl ReaderStatus {
    /// Parses a decoded status string. Anything outside the protocol's
    /// three forms is a hard error, never a silent success.
    pub fn parse(raw: &str) -> Result<Self, ReaderError> {
        if raw == STATUS_WAITING {
            return Ok(Self::Waiting);
        }
        if raw == STATUS_SUCCESS {
            return Ok(Self::Success);
        }
        if let Some(reason) = raw.strip_prefix(STATUS_ERROR_PREFIX) {
            return Ok(Self::Error(reason.to_owned()));
        }
        Err(ReaderError::UnexpectedStatus(raw.to_owned()))
    }

    /// Maps a terminal status to the operation outcome. `Waiting` is not
    /// terminal and must be filtered out by the caller.
    pub fn into_outcome(self) -> Result<(), ReaderError> {
        match self {
            Self::Success => Ok(()),
            Self::Error(reason) if reason == DEVICE_TIMEOUT_REASON => Err(ReaderError::NoCard),
            Self::Error(reason) => Err(ReaderError::Device(reason)),
            Self::Waiting => Err(ReaderError::UnexpectedStatus(STATUS_WAITING.to_owned())),
        }
    }
}

/// Decodes a characteristic payload. The bridge sends fixed-width UTF-8
/// buffers, so NUL padding and surrounding whitespace are stripped before
/// the value is interpreted.
pub fn decode_payload(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).replace('\0', "").trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_commands() {
        assert_eq!(ReaderCommand::Read.encode(), "READ");
        assert_eq!(ReaderCommand::Format.encode(), "FORMAT");
        let card = CardId::new("A1B2C3D4E5F6A7B8").unwrap();
        assert_eq!(ReaderCommand::Write(card).encode(), "WRITE:A1B2C3D4E5F6A7B8");
    }

    #[test]
    fn parses_the_three_protocol_forms() {
        assert_eq!(ReaderStatus::parse("waiting").unwrap(), ReaderStatus::Waiting);
        assert_eq!(ReaderStatus::parse("success").unwrap(), ReaderStatus::Success);
        assert_eq!(
            ReaderStatus::parse("error:write-failed").unwrap(),
            ReaderStatus::Error("write-failed".into())
        );
    }

    #[test]
    fn rejects_unknown_status_values() {
        let err = ReaderStatus::parse("Success").unwrap_err();
        assert!(matches!(err, ReaderError::UnexpectedStatus(s) if s == "Success"));
        assert!(ReaderStatus::parse("ok").is_err());
        assert!(ReaderStatus::parse("").is_err());
    }

    #[test]
    fn device_timeout_becomes_no_card() {
        let outcome = ReaderStatus::Error("timeout".into()).into_outcome();
        assert!(matches!(outcome, Err(ReaderError::NoCard)));
    }

    #[test]
    fn other_device_reasons_keep_their_text() {
        let outcome = ReaderStatus::Error("unsupported card".into()).into_outcome();
        assert!(matches!(outcome, Err(ReaderError::Device(r)) if r == "unsupported card"));
    }

    #[test]
    fn strips_nul_padding_and_whitespace() {
        assert_eq!(decode_payload(b"success\0\0\0\0"), "success");
        assert_eq!(decode_payload(b"  A1B2\0C3D4 \0"), "A1B2C3D4");
        assert_eq!(decode_payload(b"\0\0\0"), "");
    }
}
