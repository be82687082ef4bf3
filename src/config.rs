use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

/// Upper bound for `JWT_TTL_MINUTES`: one year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Which side of "today" a birth date has to fall on to pass validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BirthDateRule {
    AfterToday,
    BeforeToday,
}

impl FromStr for BirthDateRule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "after_today" => Ok(Self::AfterToday),
            "before_today" => Ok(Self::BeforeToday),
            other => anyhow::bail!("unknown birth date rule: {other}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub revocation_purge_secs: u64,
    pub birth_date_rule: BirthDateRule,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "usersvc".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "usersvc-clients".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60_i64).clamp(1, MAX_TTL_MINUTES),
        };
        let birth_date_rule = match std::env::var("BIRTH_DATE_RULE") {
            Ok(v) => v.parse()?,
            Err(_) => BirthDateRule::AfterToday,
        };
        Ok(Self {
            database_url,
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT", 8080),
            jwt,
            revocation_purge_secs: env_parse("REVOCATION_PURGE_SECS", 60 * 60),
            birth_date_rule,
        })
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
