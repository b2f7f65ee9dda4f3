//! One-time codes for console login and patient phone verification.
//!
//! Codes are six digits, single use, valid for five minutes, and stored
//! in process memory; a re-request replaces any code outstanding for the
//! phone. Expiry is checked at verify time, so no background sweeper is
//! needed. Codes are plain bearer tokens and are stored unhashed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;
use thiserror::Error;

use crate::gateway::{GatewayError, OtpDelivery};
use crate::registry::{AdminDirectory, RegistryError};

const OTP_TTL_MINUTES: i64 = 5;

#[derive(Debug, Error)]
pub enum OtpError {
    /// Login codes only go to registered staff phones.
    #[error("phone number not registered")]
    UnknownPhone,

    #[error("invalid OTP")]
    Invalid,

    #[error("OTP expired")]
    Expired,

    #[error(transparent)]
    Delivery(#[from] GatewayError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Login and verification codes live in separate namespaces; a patient
/// verification code must not open a staff session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Namespace {
    Admin,
    Patient,
}

#[derive(Debug, Clone)]
struct Entry {
    code: String,
    expires_at: DateTime<Utc>,
}

pub struct OtpService {
    codes: DashMap<(Namespace, String), Entry>,
    delivery: Arc<dyn OtpDelivery>,
    admins: Arc<dyn AdminDirectory>,
}

impl OtpService {
    pub fn new(delivery: Arc<dyn OtpDelivery>, admins: Arc<dyn AdminDirectory>) -> Self {
        Self {
            codes: DashMap::new(),
            delivery,
            admins,
        }
    }

    /// Issues a login code for a staff phone and delivers it. On delivery
    /// failure the stored code is withdrawn, so a code the operator never
    /// received cannot linger as a valid login.
    pub async fn request_login_otp(&self, phone: &str) -> Result<(), OtpError> {
        if self.admins.find_by_phone(phone).await?.is_none() {
            return Err(OtpError::UnknownPhone);
        }
        let code = self.issue(Namespace::Admin, phone);
        let message = format!(
            "Your HospitalOS login OTP is: {code}. Valid for {OTP_TTL_MINUTES} minutes."
        );
        if let Err(e) = self.delivery.send(phone, &message).await {
            self.codes.remove(&(Namespace::Admin, phone.to_owned()));
            return Err(e.into());
        }
        Ok(())
    }

    /// Verifies a login code. Valid codes are consumed; expired ones are
    /// dropped. Returns the staff member's display name.
    pub async fn verify_login_otp(&self, phone: &str, code: &str) -> Result<String, OtpError> {
        let key = (Namespace::Admin, phone.to_owned());
        let entry = match self.codes.get(&key) {
            Some(entry) if entry.code == code => entry.clone(),
            _ => return Err(OtpError::Invalid),
        };
        // Single use either way.
        self.codes.remove(&key);
        if entry.expires_at < Utc::now() {
            return Err(OtpError::Expired);
        }
        let name = self
            .admins
            .find_by_phone(phone)
            .await?
            .map(|a| a.name)
            .unwrap_or_else(|| "Admin".to_owned());
        Ok(name)
    }

    /// Issues a phone-verification code for a patient. No registration
    /// check; the patient may not have a record yet.
    pub async fn request_verification_otp(&self, phone: &str) -> Result<(), OtpError> {
        let code = self.issue(Namespace::Patient, phone);
        let message = format!(
            "Your HospitalOS verification OTP is: {code}. Valid for {OTP_TTL_MINUTES} minutes."
        );
        if let Err(e) = self.delivery.send(phone, &message).await {
            self.codes.remove(&(Namespace::Patient, phone.to_owned()));
            return Err(e.into());
        }
        Ok(())
    }

    pub fn verify_verification_otp(&self, phone: &str, code: &str) -> Result<(), OtpError> {
        let key = (Namespace::Patient, phone.to_owned());
        let entry = match self.codes.get(&key) {
            Some(entry) if entry.code == code => entry.clone(),
            _ => return Err(OtpError::Invalid),
        };
        self.codes.remove(&key);
        if entry.expires_at < Utc::now() {
            return Err(OtpError::Expired);
        }
        Ok(())
    }

    /// Replaces any outstanding code for the phone with a fresh one.
    fn issue(&self, namespace: Namespace, phone: &str) -> String {
        let code = format!("{:06}", rand::rng().random_range(100_000..1_000_000));
        self.codes.insert(
            (namespace, phone.to_owned()),
            Entry {
                code: code.clone(),
                expires_at: Utc::now() + Duration::minutes(OTP_TTL_MINUTES),
            },
        );
        code
    }

    #[cfg(test)]
    fn expire_now(&self, phone: &str) {
        if let Some(mut entry) = self.codes.get_mut(&(Namespace::Admin, phone.to_owned())) {
            entry.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}
