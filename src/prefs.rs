//! Durable operator preferences.
//!
//! The desk console keeps a handful of per-machine settings (currently just
//! the reader transport mode) that must survive a restart. They live behind
//! a store trait with a file-backed production implementation and an
//! in-memory one for tests.

use async_trait::async_trait;
use color_eyre::Report;
use std::error::Error as StdError;
use std::fmt;

mod file;
mod memory;

pub use file::FilePrefs;
pub use memory::MemoryPrefs;

type Result<T> = std::result::Result<T, PrefsError>;

/// Error type for preference store operations.
#[derive(Debug)]
pub struct PrefsError {
    error: Report,
}

impl PrefsError {
    pub fn new<T>(error: T) -> Self
    where
        T: StdError + Send + Sync + 'static,
    {
        Self {
            error: Report::new(error),
        }
    }
}

impl StdError for PrefsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.error.source()
    }
}

impl fmt::Display for PrefsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl From<std::io::Error> for PrefsError {
    fn from(error: std::io::Error) -> Self {
        Self {
            error: Report::new(error),
        }
    }
}

impl From<serde_json::Error> for PrefsError {
    fn from(error: serde_json::Error) -> Self {
        Self {
            error: Report::new(error),
        }
    }
}

/// Abstract interface for preference storage backends.
#[async_trait]
pub trait PreferenceStore: Send + Sync + 'static {
    /// Returns the stored value for the key, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores the value under the key, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}
