use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::card::CardId;

use super::{Admin, AdminDirectory, NewPatient, Patient, PatientDirectory, RegistryError};

/// PostgREST-dialect registry client.
///
/// Filters are passed as `column=eq.value` query parameters and inserts ask
/// for the created row back via the `Prefer` header.
#[derive(Debug, Clone)]
pub struct RestRegistry {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl RestRegistry {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{path}", self.base_url))
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(self.api_key.expose_secret())
    }

    async fn fetch_patients(&self, path: &str) -> Result<Vec<Patient>, RegistryError> {
        let res = self.get(path).send().await?;
        if !res.status().is_success() {
            return Err(RegistryError::Decode(format!(
                "registry answered {} for {path}",
                res.status()
            )));
        }
        res.json().await.map_err(RegistryError::Upstream)
    }
}

#[async_trait]
impl PatientDirectory for RestRegistry {
    async fn find_by_card(&self, card: &CardId) -> Result<Option<Patient>, RegistryError> {
        let rows = self
            .fetch_patients(&format!("/patients?nfc_card_id=eq.{card}"))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, RegistryError> {
        let rows = self.fetch_patients(&format!("/patients?id=eq.{id}")).await?;
        Ok(rows.into_iter().next())
    }

    async fn list(&self) -> Result<Vec<Patient>, RegistryError> {
        self.fetch_patients("/patients?order=registered_at.desc")
            .await
    }

    async fn register(&self, new: NewPatient) -> Result<Patient, RegistryError> {
        // The store should carry a unique constraint on nfc_card_id; this
        // pre-check gives the operator a clean conflict either way.
        if let Some(card) = &new.nfc_card_id {
            if self.find_by_card(card).await?.is_some() {
                return Err(RegistryError::DuplicateCardId(card.clone()));
            }
        }
        let res = self
            .http
            .post(format!("{}/patients", self.base_url))
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(self.api_key.expose_secret())
            .header("Prefer", "return=representation")
            .json(&new)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(RegistryError::Decode(format!(
                "registry refused the registration: {}",
                res.status()
            )));
        }
        let mut rows: Vec<Patient> = res.json().await.map_err(RegistryError::Upstream)?;
        rows.pop()
            .ok_or_else(|| RegistryError::Decode("insert returned no row".to_owned()))
    }
}

#[async_trait]
impl AdminDirectory for RestRegistry {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Admin>, RegistryError> {
        let res = self.get(&format!("/admins?phone=eq.{phone}")).send().await?;
        if !res.status().is_success() {
            return Err(RegistryError::Decode(format!(
                "registry answered {} for admin lookup",
                res.status()
            )));
        }
        let rows: Vec<Admin> = res.json().await.map_err(RegistryError::Upstream)?;
        Ok(rows.into_iter().next())
    }
}
