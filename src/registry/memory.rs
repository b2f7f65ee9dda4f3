use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::card::CardId;

use super::{Admin, AdminDirectory, NewPatient, Patient, PatientDirectory, RegistryError};

/// An in-memory registry.
///
/// Useful for testing and development. Enforces card-id uniqueness on
/// insert, the constraint the deployed store should carry as well.
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
    patients: Arc<DashMap<Uuid, Patient>>,
    admins: Arc<DashMap<Uuid, Admin>>,
}

impl MemoryRegistry {
    pub fn seed_admin(&self, name: &str, phone: &str) -> Admin {
        let admin = Admin {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            phone: phone.to_owned(),
        };
        self.admins.insert(admin.id, admin.clone());
        admin
    }
}

#[async_trait]
impl PatientDirectory for MemoryRegistry {
    async fn find_by_card(&self, card: &CardId) -> Result<Option<Patient>, RegistryError> {
        Ok(self
            .patients
            .iter()
            .find(|p| p.nfc_card_id.as_ref() == Some(card))
            .map(|p| p.value().clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, RegistryError> {
        Ok(self.patients.get(&id).map(|p| p.value().clone()))
    }

    async fn list(&self) -> Result<Vec<Patient>, RegistryError> {
        let mut patients: Vec<Patient> =
            self.patients.iter().map(|p| p.value().clone()).collect();
        patients.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
        Ok(patients)
    }

    async fn register(&self, new: NewPatient) -> Result<Patient, RegistryError> {
        if let Some(card) = &new.nfc_card_id {
            if self.find_by_card(card).await?.is_some() {
                return Err(RegistryError::DuplicateCardId(card.clone()));
            }
        }
        let patient = Patient {
            id: Uuid::new_v4(),
            nfc_card_id: new.nfc_card_id,
            name: new.name,
            age: new.age,
            gender: new.gender,
            phone: new.phone,
            address: new.address,
            blood_group: new.blood_group,
            abha_number: new.abha_number,
            registered_at: Utc::now(),
        };
        self.patients.insert(patient.id, patient.clone());
        Ok(patient)
    }
}

#[async_trait]
impl AdminDirectory for MemoryRegistry {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Admin>, RegistryError> {
        Ok(self
            .admins
            .iter()
            .find(|a| a.phone == phone)
            .map(|a| a.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(name: &str, card: Option<&str>) -> NewPatient {
        NewPatient {
            nfc_card_id: card.map(|c| CardId::new(c).unwrap()),
            name: name.to_owned(),
            age: None,
            gender: None,
            phone: None,
            address: None,
            blood_group: None,
            abha_number: None,
        }
    }

    #[tokio::test]
    async fn register_and_find_by_card() {
        let registry = MemoryRegistry::default();
        let patient = registry
            .register(minimal("Asha Rao", Some("A1B2C3D4E5F6A7B8")))
            .await
            .unwrap();

        let card = CardId::new("A1B2C3D4E5F6A7B8").unwrap();
        let found = registry.find_by_card(&card).await.unwrap().unwrap();
        assert_eq!(found.id, patient.id);
        assert_eq!(found.name, "Asha Rao");
    }

    #[tokio::test]
    async fn duplicate_card_id_is_refused() {
        let registry = MemoryRegistry::default();
        registry
            .register(minimal("Asha Rao", Some("A1B2C3D4E5F6A7B8")))
            .await
            .unwrap();

        let err = registry
            .register(minimal("Vikram Shah", Some("A1B2C3D4E5F6A7B8")))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateCardId(_)));
    }

    #[tokio::test]
    async fn cardless_registrations_do_not_collide() {
        let registry = MemoryRegistry::default();
        registry.register(minimal("Asha Rao", None)).await.unwrap();
        registry
            .register(minimal("Vikram Shah", None))
            .await
            .unwrap();
        assert_eq!(registry.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn admin_lookup_by_phone() {
        let registry = MemoryRegistry::default();
        registry.seed_admin("Dr. Mehta", "+911234567890");

        let admin = registry
            .find_by_phone("+911234567890")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.name, "Dr. Mehta");
        assert!(registry.find_by_phone("+910000000000").await.unwrap().is_none());
    }
}
