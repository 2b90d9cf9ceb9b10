//! Warehouse credentials.
//!
//! Credentials are read from an explicit file path only, never from the
//! environment. Any problem obtaining a usable token is an `Auth` error.

use std::path::Path;

use serde::{Deserialize, Serialize};

use portal_model::{PortalError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub host: String,
    pub token: String,
}

impl Credentials {
    /// Load credentials from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|error| {
            PortalError::auth(format!("read credentials {}: {error}", path.display()))
        })?;
        let credentials: Self = serde_json::from_str(&contents).map_err(|error| {
            PortalError::auth(format!("parse credentials {}: {error}", path.display()))
        })?;
        credentials.verify()?;
        Ok(credentials)
    }

    /// Reject empty tokens before any warehouse round trip.
    pub fn verify(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(PortalError::auth("credentials token is empty"));
        }
        Ok(())
    }
}
