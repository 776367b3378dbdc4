pub mod permission;

use serde::{Deserialize, Serialize};

pub use permission::{PermissionSet, WILDCARD, has_permissions};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_JWT_EXPIRE_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_BCRYPT_COST: u32 = 12;

#[derive(Debug, thiserror::Error)]
pub enum GlobalConfigError {
    #[error("missing required global config field: {0}")]
    MissingField(&'static str),
    #[error("invalid global config field {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

/// Final, merged configuration used by the running process.
///
/// Merge order: CLI > ENV > defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub host: String,
    pub port: u16,
    /// Database DSN used for this process.
    pub dsn: String,
    /// HMAC secret for bearer tokens. Never serialized back out.
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expire_secs: u64,
    pub bcrypt_cost: u32,
    /// Whether error responses carry the underlying error text.
    pub expose_error_details: bool,
}

/// Optional layer used for merging global config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dsn: Option<String>,
    pub jwt_secret: Option<String>,
    pub jwt_expire_secs: Option<u64>,
    pub bcrypt_cost: Option<u32>,
    pub expose_error_details: Option<bool>,
}

impl GlobalConfigPatch {
    pub fn overlay(&mut self, other: GlobalConfigPatch) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.dsn.is_some() {
            self.dsn = other.dsn;
        }
        if other.jwt_secret.is_some() {
            self.jwt_secret = other.jwt_secret;
        }
        if other.jwt_expire_secs.is_some() {
            self.jwt_expire_secs = other.jwt_expire_secs;
        }
        if other.bcrypt_cost.is_some() {
            self.bcrypt_cost = other.bcrypt_cost;
        }
        if other.expose_error_details.is_some() {
            self.expose_error_details = other.expose_error_details;
        }
    }

    pub fn into_config(self) -> Result<GlobalConfig, GlobalConfigError> {
        let jwt_secret = self
            .jwt_secret
            .filter(|secret| !secret.trim().is_empty())
            .ok_or(GlobalConfigError::MissingField("jwt_secret"))?;
        let bcrypt_cost = self.bcrypt_cost.unwrap_or(DEFAULT_BCRYPT_COST);
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(GlobalConfigError::InvalidField {
                field: "bcrypt_cost",
                reason: "must be between 4 and 31",
            });
        }
        let jwt_expire_secs = self.jwt_expire_secs.unwrap_or(DEFAULT_JWT_EXPIRE_SECS);
        if jwt_expire_secs == 0 {
            return Err(GlobalConfigError::InvalidField {
                field: "jwt_expire_secs",
                reason: "must be greater than zero",
            });
        }
        Ok(GlobalConfig {
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            dsn: self.dsn.ok_or(GlobalConfigError::MissingField("dsn"))?,
            jwt_secret,
            jwt_expire_secs,
            bcrypt_cost,
            expose_error_details: self.expose_error_details.unwrap_or(false),
        })
    }
}
