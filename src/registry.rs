//! Patient and admin registry ports.
//!
//! The relational store itself is an external collaborator; the console
//! only needs lookups keyed by card id, phone, or record id, plus the
//! registration insert. `MemoryRegistry` backs tests and development,
//! `RestRegistry` speaks the PostgREST dialect of the deployed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::card::CardId;

mod memory;
mod rest;

pub use memory::MemoryRegistry;
pub use rest::RestRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub nfc_card_id: Option<CardId>,
    pub name: String,
    pub age: Option<u16>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub blood_group: Option<String>,
    pub abha_number: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// Registration payload; id and timestamp are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub nfc_card_id: Option<CardId>,
    pub name: String,
    #[serde(default)]
    pub age: Option<u16>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub abha_number: Option<String>,
}

/// Staff member allowed to log into the console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// A patient record already holds this card id. One card, one patient.
    #[error("a patient is already registered with card id {0}")]
    DuplicateCardId(CardId),

    #[error("patient registry request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("patient registry returned an unusable reply: {0}")]
    Decode(String),
}

#[async_trait]
pub trait PatientDirectory: Send + Sync + 'static {
    /// Looks up the patient holding the given card id, if any.
    async fn find_by_card(&self, card: &CardId) -> Result<Option<Patient>, RegistryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, RegistryError>;

    /// All patients, newest registration first.
    async fn list(&self) -> Result<Vec<Patient>, RegistryError>;

    /// Registers a patient, refusing a card id another record already holds.
    async fn register(&self, new: NewPatient) -> Result<Patient, RegistryError>;
}

#[async_trait]
pub trait AdminDirectory: Send + Sync + 'static {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Admin>, RegistryError>;
}
