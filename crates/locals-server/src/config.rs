use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{FixedOffset, TimeDelta};
use tracing::warn;

use locals_types::models::UserId;

pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Longest accepted token lifetime (ten years).
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

/// Server settings, read from `LOCALS_*` environment variables (a `.env`
/// file is loaded first if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: TimeDelta,
    pub upload_dir: PathBuf,
    pub owner_user_id: Option<UserId>,
    pub utc_offset: FixedOffset,
    pub google_client_id: Option<String>,
    pub apple_client_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset or blank keys take their
    /// default; a value that is set but unparseable is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("LOCALS_JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.into());
        if jwt_secret == DEV_JWT_SECRET {
            warn!("LOCALS_JWT_SECRET is not set; using the development secret");
        }

        let offset_minutes: i32 = parse_or(get("LOCALS_UTC_OFFSET_MINUTES"), "LOCALS_UTC_OFFSET_MINUTES", 0)?;
        let utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("LOCALS_UTC_OFFSET_MINUTES out of range: {offset_minutes}"))?;

        let token_ttl_days: i64 = parse_or(get("LOCALS_TOKEN_TTL_DAYS"), "LOCALS_TOKEN_TTL_DAYS", 30)?;
        if !(1..=MAX_TOKEN_TTL_DAYS).contains(&token_ttl_days) {
            anyhow::bail!(
                "LOCALS_TOKEN_TTL_DAYS must be between 1 and {MAX_TOKEN_TTL_DAYS}, got {token_ttl_days}"
            );
        }
        let token_ttl = TimeDelta::try_days(token_ttl_days)
            .with_context(|| format!("LOCALS_TOKEN_TTL_DAYS out of range: {token_ttl_days}"))?;

        let google_client_id = get("LOCALS_GOOGLE_CLIENT_ID");
        if google_client_id.is_none() {
            warn!("LOCALS_GOOGLE_CLIENT_ID is not set; Google tokens for any client will be accepted");
        }
        let apple_client_id = get("LOCALS_APPLE_CLIENT_ID");
        if apple_client_id.is_none() {
            warn!("LOCALS_APPLE_CLIENT_ID is not set; Apple tokens for any audience will be accepted");
        }

        Ok(Self {
            host: get("LOCALS_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(get("LOCALS_PORT"), "LOCALS_PORT", 5000)?,
            db_path: get("LOCALS_DB_PATH").unwrap_or_else(|| "locals.db".into()).into(),
            jwt_secret,
            token_ttl,
            upload_dir: get("LOCALS_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into()).into(),
            owner_user_id: get("LOCALS_OWNER_USER_ID")
                .map(|v| v.parse::<UserId>().with_context(|| format!("LOCALS_OWNER_USER_ID is not an id: {v}")))
                .transpose()?,
            utc_offset,
            google_client_id,
            apple_client_id,
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v.parse().with_context(|| format!("{key} is malformed: {v}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.db_path, PathBuf::from("locals.db"));
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.token_ttl, TimeDelta::days(30));
        assert_eq!(cfg.owner_user_id, None);
        assert_eq!(cfg.utc_offset.local_minus_utc(), 0);
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("LOCALS_PORT", "8080"),
            ("LOCALS_OWNER_USER_ID", "7"),
            ("LOCALS_UTC_OFFSET_MINUTES", "-300"),
            ("LOCALS_GOOGLE_CLIENT_ID", "abc.apps.googleusercontent.com"),
            ("LOCALS_APPLE_CLIENT_ID", "  "),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.owner_user_id, Some(7));
        assert_eq!(cfg.utc_offset.local_minus_utc(), -300 * 60);
        assert_eq!(cfg.google_client_id.as_deref(), Some("abc.apps.googleusercontent.com"));
        assert_eq!(cfg.apple_client_id, None);
    }

    #[test]
    fn token_ttl_is_bounded() {
        let cfg = config(&[("LOCALS_TOKEN_TTL_DAYS", "3650")]).unwrap();
        assert_eq!(cfg.token_ttl, TimeDelta::days(MAX_TOKEN_TTL_DAYS));

        let err = config(&[("LOCALS_TOKEN_TTL_DAYS", "9223372036854775807")]).unwrap_err();
        assert!(err.to_string().contains("LOCALS_TOKEN_TTL_DAYS"), "{err}");
        assert!(config(&[("LOCALS_TOKEN_TTL_DAYS", "3651")]).is_err());
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(config(&[("LOCALS_PORT", "eighty")]).is_err());
        assert!(config(&[("LOCALS_OWNER_USER_ID", "admin")]).is_err());
        assert!(config(&[("LOCALS_TOKEN_TTL_DAYS", "0")]).is_err());
        assert!(config(&[("LOCALS_TOKEN_TTL_DAYS", "-3")]).is_err());
        assert!(config(&[("LOCALS_UTC_OFFSET_MINUTES", "100000")]).is_err());
    }
}
