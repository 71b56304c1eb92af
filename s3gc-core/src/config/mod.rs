//! Immutable configuration snapshot.
//!
//! Constructed once (from the environment or by hand in tests), validated,
//! then threaded by value to every component. Reloading requires a full
//! lifecycle restart.

mod defaults;
mod env;

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::ConfigError;
use crate::models::{GcMode, WatchedColumn, WatchedSet};

pub use env::from_env;

/// Which CDC stream feeds the registry. Absent means scan-only mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CdcBackend {
    Postgres,
    MySql,
}

impl FromStr for CdcBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(CdcBackend::Postgres),
            "mysql" => Ok(CdcBackend::MySql),
            other => Err(ConfigError::Invalid {
                name: "cdc_backend".into(),
                value: other.into(),
                reason: "expected postgres or mysql".into(),
            }),
        }
    }
}

/// Daily trigger time, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub hour: u8,
    pub minute: u8,
}

impl FromStr for Schedule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Invalid {
            name: "schedule".into(),
            value: s.into(),
            reason: "expected HH:MM (UTC)".into(),
        };
        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        let hour: u8 = h.parse().map_err(|_| invalid())?;
        let minute: u8 = m.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Self { hour, minute })
    }
}

/// The full configuration snapshot. Recognized options only; immutable
/// after `validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcConfig {
    pub bucket: String,
    pub region: String,
    pub mode: GcMode,
    pub tables: WatchedSet,
    pub retention_days: u32,
    pub exclude_prefixes: Vec<String>,
    pub vault_path: PathBuf,
    pub cdc_backend: Option<CdcBackend>,
    pub cdc_connection_url: Option<String>,
    pub schedule: Option<Schedule>,
    pub admin_api_key: String,
}

impl GcConfig {
    /// Check every invariant the rest of the system assumes. Fatal at
    /// initialization; nothing downstream revalidates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::Missing {
                name: "bucket".into(),
            });
        }
        if self.tables.is_empty() {
            return Err(ConfigError::Missing {
                name: "tables".into(),
            });
        }
        for table in self.tables.tables() {
            if self.tables.columns_of(table).is_empty() {
                return Err(ConfigError::EmptyColumns {
                    table: table.to_string(),
                });
            }
        }
        if self.mode == GcMode::Execute && self.retention_days == 0 {
            return Err(ConfigError::ZeroRetentionInExecute);
        }
        if let Some(backend) = self.cdc_backend {
            if self.cdc_connection_url.as_deref().unwrap_or("").is_empty() {
                return Err(ConfigError::CdcWithoutDsn {
                    backend: match backend {
                        CdcBackend::Postgres => "postgres".into(),
                        CdcBackend::MySql => "mysql".into(),
                    },
                });
            }
        }
        Ok(())
    }

    /// Watched columns as a list (declaration order).
    pub fn watched_columns(&self) -> &[WatchedColumn] {
        self.tables.columns()
    }

    /// Name of the CDC stream, also used to derive the Postgres slot name.
    /// Deterministic per bucket so a restart resumes the same checkpoint row.
    pub fn stream_name(&self) -> String {
        let sanitized: String = self
            .bucket
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("s3gc_{sanitized}")
    }

    /// Snapshot with credentials masked, served by `/admin/s3gc/config`.
    pub fn redacted(&self) -> serde_json::Value {
        let mut v = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = v.as_object_mut() {
            if obj.get("cdc_connection_url").map(|u| !u.is_null()).unwrap_or(false) {
                obj.insert("cdc_connection_url".into(), "***".into());
            }
            obj.insert("admin_api_key".into(), "***".into());
        }
        v
    }

    /// SHA-256 (hex) of the redacted snapshot; recorded on every operation.
    pub fn digest(&self) -> String {
        let json = serde_json::to_string(&self.redacted()).unwrap_or_default();
        hex::encode(Sha256::digest(json.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> GcConfig {
        GcConfig {
            bucket: "media".into(),
            region: "us-east-1".into(),
            mode: GcMode::DryRun,
            tables: WatchedSet::new(vec![WatchedColumn::new("users", "avatar_url")]),
            retention_days: 7,
            exclude_prefixes: vec![],
            vault_path: "/tmp/vault".into(),
            cdc_backend: None,
            cdc_connection_url: None,
            schedule: None,
            admin_api_key: "secret".into(),
        }
    }

    #[test]
    fn valid_config_passes() {
        base_config().validate().unwrap();
    }

    #[test]
    fn empty_bucket_rejected() {
        let mut cfg = base_config();
        cfg.bucket.clear();
        assert!(matches!(cfg.validate(), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn zero_retention_rejected_in_execute_only() {
        let mut cfg = base_config();
        cfg.retention_days = 0;
        cfg.validate().unwrap();
        cfg.mode = GcMode::Execute;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ZeroRetentionInExecute)
        ));
    }

    #[test]
    fn cdc_backend_requires_dsn() {
        let mut cfg = base_config();
        cfg.cdc_backend = Some(CdcBackend::Postgres);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::CdcWithoutDsn { .. })
        ));
        cfg.cdc_connection_url = Some("postgres://localhost/app".into());
        cfg.validate().unwrap();
    }

    #[test]
    fn schedule_parses_and_bounds() {
        assert_eq!(
            "03:30".parse::<Schedule>().unwrap(),
            Schedule { hour: 3, minute: 30 }
        );
        assert!("24:00".parse::<Schedule>().is_err());
        assert!("0330".parse::<Schedule>().is_err());
    }

    #[test]
    fn redaction_masks_secrets() {
        let mut cfg = base_config();
        cfg.cdc_connection_url = Some("postgres://user:pw@host/db".into());
        let v = cfg.redacted();
        assert_eq!(v["cdc_connection_url"], "***");
        assert_eq!(v["admin_api_key"], "***");
        assert_eq!(v["bucket"], "media");
    }

    #[test]
    fn digest_is_stable_and_ignores_secret_values() {
        let mut a = base_config();
        let mut b = base_config();
        a.admin_api_key = "one".into();
        b.admin_api_key = "two".into();
        assert_eq!(a.digest(), b.digest());
        b.bucket = "other".into();
        assert_ne!(a.digest(), b.digest());
    }
}
