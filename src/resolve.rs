//! Patient resolution flow.
//!
//! One tap gesture resolves to one of three outcomes: the card belongs to
//! a known patient, the card carries an unassigned identifier, or the card
//! is blank. Only the blank branch touches the card: a fresh identifier is
//! generated and must be confirmed written before a registration form may
//! carry it. A registration prefill for an id that never reached the card
//! would let the desk create a patient record no card can ever resolve.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::card::CardId;
use crate::reader::{CardReader, ReaderError, TapReading};
use crate::registry::{Patient, PatientDirectory, RegistryError};

/// How many fresh identifiers the blank-card branch will try before
/// giving up. Collisions are near-impossible; two in a row means the
/// registry lookup itself is suspect.
const GENERATION_ATTEMPTS: usize = 2;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error("patient lookup failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("could not allocate an unused card identifier")]
    IdExhausted,
}

/// Outcome of one resolution gesture.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    /// The card id matched a patient record; show it. Nothing was written.
    Existing { patient: Patient },
    /// Prefill a registration form with this card id. `written` is true
    /// when the id was generated and written onto the card during this
    /// gesture, false when the card already carried it.
    Register { card: CardId, written: bool },
}

pub struct ResolutionFlow {
    reader: Arc<dyn CardReader>,
    directory: Arc<dyn PatientDirectory>,
}

impl ResolutionFlow {
    pub fn new(reader: Arc<dyn CardReader>, directory: Arc<dyn PatientDirectory>) -> Self {
        Self { reader, directory }
    }

    /// Runs one tap gesture end to end. Every failure leaves the flow back
    /// at the waiting state; retries are always operator-initiated.
    pub async fn resolve(&self, timeout_secs: Option<u64>) -> Result<Resolution, FlowError> {
        match self.reader.tap(timeout_secs).await? {
            TapReading::Card(card) => self.resolve_identifier(card).await,
            TapReading::Blank => self.register_blank_card(timeout_secs).await,
        }
    }

    async fn resolve_identifier(&self, card: CardId) -> Result<Resolution, FlowError> {
        match self.directory.find_by_card(&card).await? {
            Some(patient) => {
                tracing::info!(card = %card, patient = %patient.id, "card resolved to patient");
                Ok(Resolution::Existing { patient })
            }
            // A formatted card that never finished registration; the id is
            // already on the card, so prefill without writing anything.
            None => {
                tracing::info!(card = %card, "card carries an unassigned identifier");
                Ok(Resolution::Register {
                    card,
                    written: false,
                })
            }
        }
    }

    /// Blank card: allocate an identifier, write it to the card, and only
    /// then hand it to the registration form. If the process dies between
    /// the write and the form being saved, the card carries an id with no
    /// record; the next tap lands in the unassigned-identifier branch.
    async fn register_blank_card(&self, timeout_secs: Option<u64>) -> Result<Resolution, FlowError> {
        let card = self.allocate_card_id().await?;
        self.reader.write_card(&card, timeout_secs).await?;
        tracing::info!(card = %card, "identifier written to blank card");
        Ok(Resolution::Register {
            card,
            written: true,
        })
    }

    async fn allocate_card_id(&self) -> Result<CardId, FlowError> {
        for _ in 0..GENERATION_ATTEMPTS {
            let candidate = CardId::generate();
            if self.directory.find_by_card(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            tracing::warn!(card = %candidate, "generated card id already in use, retrying");
        }
        Err(FlowError::IdExhausted)
    }
}
