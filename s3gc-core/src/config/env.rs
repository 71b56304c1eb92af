//! Environment-variable config loader.
//!
//! Variable names are the external contract (see the admin README):
//! `S3_BUCKET`, `AWS_REGION`, `S3GC_MODE`, `S3GC_TABLES`,
//! `S3GC_VAULT_PATH`, `S3GC_RETENTION_DAYS`, `S3GC_EXCLUDE_PREFIXES`,
//! `S3GC_SCHEDULE_CRON`, `DATABASE_URL`, `S3GC_CDC_BACKEND`,
//! `S3GC_ADMIN_API_KEY`.

use std::collections::HashMap;

use crate::constants::DEFAULT_RETENTION_DAYS;
use crate::errors::ConfigError;
use crate::models::{WatchedColumn, WatchedSet};

use super::{defaults, GcConfig};

/// Load and validate a config snapshot from an environment map.
///
/// Takes the map explicitly so tests can feed synthetic environments;
/// the binary passes `std::env::vars().collect()`.
pub fn from_env(vars: &HashMap<String, String>) -> Result<GcConfig, ConfigError> {
    let get = |name: &str| vars.get(name).map(|s| s.trim()).filter(|s| !s.is_empty());

    let bucket = get("S3_BUCKET")
        .ok_or_else(|| ConfigError::Missing {
            name: "S3_BUCKET".into(),
        })?
        .to_string();

    let region = get("AWS_REGION")
        .unwrap_or(defaults::DEFAULT_REGION)
        .to_string();

    let mode = match get("S3GC_MODE") {
        Some(raw) => raw.parse()?,
        None => Default::default(),
    };

    let tables = parse_tables(get("S3GC_TABLES").ok_or_else(|| ConfigError::Missing {
        name: "S3GC_TABLES".into(),
    })?)?;

    let retention_days = match get("S3GC_RETENTION_DAYS") {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            name: "S3GC_RETENTION_DAYS".into(),
            value: raw.into(),
            reason: "expected a non-negative integer".into(),
        })?,
        None => DEFAULT_RETENTION_DAYS,
    };

    let exclude_prefixes = get("S3GC_EXCLUDE_PREFIXES")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let vault_path = get("S3GC_VAULT_PATH")
        .unwrap_or(defaults::DEFAULT_VAULT_PATH)
        .into();

    let cdc_backend = get("S3GC_CDC_BACKEND").map(|raw| raw.parse()).transpose()?;
    let cdc_connection_url = get("DATABASE_URL").map(String::from);

    let schedule = get("S3GC_SCHEDULE_CRON").map(|raw| raw.parse()).transpose()?;

    let admin_api_key = get("S3GC_ADMIN_API_KEY")
        .ok_or_else(|| ConfigError::Missing {
            name: "S3GC_ADMIN_API_KEY".into(),
        })?
        .to_string();

    let config = GcConfig {
        bucket,
        region,
        mode,
        tables,
        retention_days,
        exclude_prefixes,
        vault_path,
        cdc_backend,
        cdc_connection_url,
        schedule,
        admin_api_key,
    };
    config.validate()?;
    Ok(config)
}

/// `S3GC_TABLES` format: `table:col[|col...]` entries, comma-separated.
/// Example: `users:avatar_url|banner_url,posts:attachment`.
fn parse_tables(raw: &str) -> Result<WatchedSet, ConfigError> {
    let mut columns = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (table, cols) = entry.split_once(':').ok_or_else(|| ConfigError::Invalid {
            name: "S3GC_TABLES".into(),
            value: entry.into(),
            reason: "expected table:col[|col...]".into(),
        })?;
        let table = table.trim();
        let mut any = false;
        for col in cols.split('|').map(str::trim).filter(|c| !c.is_empty()) {
            columns.push(WatchedColumn::new(table, col));
            any = true;
        }
        if !any {
            return Err(ConfigError::EmptyColumns {
                table: table.to_string(),
            });
        }
    }
    Ok(WatchedSet::new(columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GcMode;

    fn env(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn minimal() -> HashMap<String, String> {
        env(&[
            ("S3_BUCKET", "media"),
            ("S3GC_TABLES", "users:avatar_url"),
            ("S3GC_ADMIN_API_KEY", "secret"),
        ])
    }

    #[test]
    fn minimal_env_loads_with_defaults() {
        let cfg = from_env(&minimal()).unwrap();
        assert_eq!(cfg.bucket, "media");
        assert_eq!(cfg.mode, GcMode::DryRun);
        assert_eq!(cfg.retention_days, 7);
        assert!(cfg.exclude_prefixes.is_empty());
        assert!(cfg.cdc_backend.is_none());
    }

    #[test]
    fn tables_parse_multi_column() {
        let mut vars = minimal();
        vars.insert(
            "S3GC_TABLES".into(),
            "users:avatar_url|banner_url, posts:attachment".into(),
        );
        let cfg = from_env(&vars).unwrap();
        assert_eq!(cfg.tables.len(), 3);
        assert_eq!(cfg.tables.columns_of("users").len(), 2);
        assert_eq!(cfg.tables.columns_of("posts"), ["attachment"]);
    }

    #[test]
    fn missing_bucket_is_fatal() {
        let mut vars = minimal();
        vars.remove("S3_BUCKET");
        assert!(matches!(
            from_env(&vars),
            Err(ConfigError::Missing { name }) if name == "S3_BUCKET"
        ));
    }

    #[test]
    fn malformed_tables_rejected() {
        let mut vars = minimal();
        vars.insert("S3GC_TABLES".into(), "users".into());
        assert!(from_env(&vars).is_err());
        vars.insert("S3GC_TABLES".into(), "users:".into());
        assert!(matches!(
            from_env(&vars),
            Err(ConfigError::EmptyColumns { .. })
        ));
    }

    #[test]
    fn excludes_split_on_comma() {
        let mut vars = minimal();
        vars.insert("S3GC_EXCLUDE_PREFIXES".into(), "backups/,tmp/".into());
        let cfg = from_env(&vars).unwrap();
        assert_eq!(cfg.exclude_prefixes, ["backups/", "tmp/"]);
    }

    #[test]
    fn cdc_backend_without_dsn_rejected() {
        let mut vars = minimal();
        vars.insert("S3GC_CDC_BACKEND".into(), "postgres".into());
        assert!(matches!(
            from_env(&vars),
            Err(ConfigError::CdcWithoutDsn { .. })
        ));
        vars.insert("DATABASE_URL".into(), "postgres://localhost/app".into());
        from_env(&vars).unwrap();
    }
}
