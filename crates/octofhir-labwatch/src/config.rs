use std::net::SocketAddr;

use octofhir_auth::AuthConfig;
use octofhir_bulk::ExportConfig;
use octofhir_notifications::EmailConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Client authentication against the data platform
    #[serde(default)]
    pub auth: AuthConfig,
    /// Group export and polling
    #[serde(default)]
    pub export: ExportConfig,
    /// Report delivery
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Public JWKS endpoint
    #[serde(default)]
    pub jwks: JwksServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validates everything a report cycle needs.
    pub fn validate(&self) -> Result<(), String> {
        self.auth.validate()?;
        self.export.validate()?;
        self.email.validate()?;
        self.schedule.validate()?;
        self.validate_serving()
    }

    /// Validates only what serving the JWKS needs.
    pub fn validate_serving(&self) -> Result<(), String> {
        if self.auth.jwks_path.as_os_str().is_empty() {
            return Err("auth.jwks_path must not be empty".into());
        }
        self.jwks.validate()?;
        self.logging.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Cron expression, evaluated in UTC
    #[serde(default = "default_cron")]
    pub cron: String,
    /// Run one cycle immediately when the scheduler starts
    #[serde(default)]
    pub run_on_startup: bool,
}

fn default_cron() -> String {
    "0 0 * * *".into()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            run_on_startup: false,
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), String> {
        croner::Cron::new(&self.cron)
            .parse()
            .map(|_| ())
            .map_err(|e| format!("schedule.cron '{}' is invalid: {e}", self.cron))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwksServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_true() -> bool {
    true
}

fn default_bind() -> String {
    "0.0.0.0:3000".into()
}

impl Default for JwksServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bind(),
        }
    }
}

impl JwksServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, String> {
        self.bind
            .parse()
            .map_err(|e| format!("jwks.bind '{}' is not a socket address: {e}", self.bind))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.addr().map(|_| ())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), String> {
        let lvl = self.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    /// Loads and fully validates the configuration.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let cfg = load_unvalidated(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads the configuration without validating it.
    ///
    /// An explicitly given file must exist; the default `labwatch.toml` is
    /// optional.
    pub fn load_unvalidated(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(format!("config file not found: {p}"));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from("labwatch.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., LABWATCH__EMAIL__SMTP_PASSWORD=secret
        builder = builder.add_source(
            Environment::with_prefix("LABWATCH")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("email.to")
                .with_list_parse_key("export.types"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        cfg.try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.schedule.cron, "0 0 * * *");
        assert!(!cfg.schedule.run_on_startup);
        assert!(cfg.jwks.enabled);
        assert_eq!(cfg.jwks.addr().unwrap().port(), 3000);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_schedule_rejects_malformed_cron() {
        let schedule = ScheduleConfig {
            cron: "0 0 * * ".into(),
            run_on_startup: false,
        };
        assert!(schedule.validate().unwrap_err().contains("schedule.cron"));
        assert!(ScheduleConfig::default().validate().is_ok());
    }

    #[test]
    fn test_jwks_bind_must_be_socket_addr() {
        let jwks = JwksServerConfig {
            enabled: true,
            bind: "localhost".into(),
        };
        assert!(jwks.validate().is_err());
    }

    #[test]
    fn test_logging_level() {
        let logging = LoggingConfig {
            level: "LOUD".into(),
        };
        assert!(logging.validate().is_err());
        let logging = LoggingConfig {
            level: "DEBUG".into(),
        };
        assert!(logging.validate().is_ok());
    }

    #[test]
    fn test_default_config_is_incomplete() {
        // client id, group id and mail settings have no defaults
        assert!(AppConfig::default().validate().is_err());
        assert!(AppConfig::default().validate_serving().is_ok());
    }
}
