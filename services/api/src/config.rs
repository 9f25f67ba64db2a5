//! Service configuration loaded from the environment
//!
//! # Environment Variables
//! - `HOST`: Bind address (default: `0.0.0.0`)
//! - `PORT`: Listen port (default: 5000)
//! - `JWT_SECRET`: Token signing secret (required)
//! - `JWT_EXPIRES_IN_SECS`: User session lifetime (default: 3600)
//! - `JWT_ADMIN_EXPIRES_IN_SECS`: Admin session lifetime (default: 86400)
//! - `SESSION_COOKIE_NAME`: Session cookie name (default: `jwt`)
//! - `SESSION_COOKIE_SECURE`: Send the cookie over HTTPS only (default: false)
//! - `SWEEP_SCHEDULE`: Six-field cron expression (default: `0 0 0 1 * *`)
//! - `SWEEP_DEACTIVATE_AFTER_MONTHS`: Idle months before deactivation (default: 6)
//! - `SWEEP_ARCHIVE_AFTER_YEARS`: Idle years before archival (default: 1)
//! - `SWEEP_RUN_ON_STARTUP`: Sweep once at boot (default: false)
//!
//! Database settings are read separately by `common::database::DatabaseConfig`.

use anyhow::{Context, Result, bail};
use config::{Config, Environment};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};

use crate::{
    jwt::JwtConfig, scheduler::DEFAULT_SCHEDULE, service::InactivityThresholds,
    session::SessionCookieConfig,
};

#[derive(Debug, Deserialize)]
struct Settings {
    host: String,
    port: u16,
    jwt_secret: String,
    jwt_expires_in_secs: u64,
    jwt_admin_expires_in_secs: u64,
    session_cookie_name: String,
    session_cookie_secure: bool,
    sweep_schedule: String,
    sweep_deactivate_after_months: u32,
    sweep_archive_after_years: u32,
    sweep_run_on_startup: bool,
}

/// Inactivity sweep settings
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub schedule: String,
    pub thresholds: InactivityThresholds,
    pub run_on_startup: bool,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt: JwtConfig,
    pub session: SessionCookieConfig,
    pub sweep: SweepConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let settings: Settings = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 5000_i64)?
            .set_default("jwt_expires_in_secs", 3600_i64)?
            .set_default("jwt_admin_expires_in_secs", 86400_i64)?
            .set_default("session_cookie_name", "jwt")?
            .set_default("session_cookie_secure", false)?
            .set_default("sweep_schedule", DEFAULT_SCHEDULE)?
            .set_default("sweep_deactivate_after_months", 6_i64)?
            .set_default("sweep_archive_after_years", 1_i64)?
            .set_default("sweep_run_on_startup", false)?
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
            .context("Invalid service configuration")?;

        Self::from_settings(settings)
    }

    fn from_settings(settings: Settings) -> Result<Self> {
        if settings.jwt_secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let thresholds = InactivityThresholds {
            deactivate_after_months: settings.sweep_deactivate_after_months,
            archive_after_years: settings.sweep_archive_after_years,
        };
        if thresholds.deactivate_after_months == 0
            || u64::from(thresholds.deactivate_after_months)
                >= u64::from(thresholds.archive_after_years) * 12
        {
            bail!(
                "Deactivation threshold ({} months) must be positive and shorter than the archive threshold ({} years)",
                thresholds.deactivate_after_months,
                thresholds.archive_after_years
            );
        }

        let host: IpAddr = settings
            .host
            .parse()
            .with_context(|| format!("Invalid HOST `{}`", settings.host))?;

        Ok(Self {
            bind_addr: SocketAddr::new(host, settings.port),
            jwt: JwtConfig {
                secret: settings.jwt_secret,
                expires_in: settings.jwt_expires_in_secs,
                admin_expires_in: settings.jwt_admin_expires_in_secs,
            },
            session: SessionCookieConfig {
                name: settings.session_cookie_name,
                secure: settings.session_cookie_secure,
            },
            sweep: SweepConfig {
                schedule: settings.sweep_schedule,
                thresholds,
                run_on_startup: settings.sweep_run_on_startup,
            },
        })
    }
}
