//! Card identifiers as they live on the physical NFC cards.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Number of hex characters in a generated card identifier.
pub const CARD_ID_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CardIdError {
    #[error("card identifier is empty")]
    Empty,
}

/// Opaque identifier written onto a patient card.
///
/// Generated identifiers are 16 uppercase hex characters derived from a
/// random UUID. Identifiers read back from a card are accepted as-is
/// (older cards may carry other formats); the only requirement is that
/// the value is non-empty after trimming. The identifier is a bearer
/// token, not a credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    /// Accepts an identifier as read from a card or a request payload.
    pub fn new(value: impl Into<String>) -> Result<Self, CardIdError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CardIdError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Generates a fresh identifier for a blank card.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(hex[..CARD_ID_LEN].to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CardId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
