use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub recipients: Vec<String>,
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/academic_reports".to_string(),
                max_connections: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            notifications: NotificationConfig {
                enabled: true,
                recipients: Vec::new(),
                queue_capacity: 64,
            },
        }
    }
}

impl Config {
    /// Defaults, then `academic-reports.{yaml,toml,json}` if present, then
    /// `REPORTS_*` variables. A plain `DATABASE_URL` wins over all of them.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = ConfigBuilder::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(File::with_name("academic-reports").required(false))
            .add_source(env_source());

        Self::finish(builder)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if path.as_ref().exists() {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        Self::finish(builder.add_source(env_source()))
    }

    fn finish(
        mut builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", url)?;
        }

        builder.build()?.try_deserialize()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("REPORTS")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("notifications.recipients")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.database.url, "postgres://localhost/academic_reports");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, "info");
        assert!(config.notifications.enabled);
        assert!(config.notifications.recipients.is_empty());
        assert_eq!(config.notifications.queue_capacity, 64);
    }

    #[test]
    #[serial]
    fn test_config_load_from_yaml_file() {
        let yaml_content = r#"
database:
  max_connections: 12
logging:
  level: "debug"
notifications:
  enabled: false
  recipients:
    - "office@school.test"
    - "principal@school.test"
"#;

        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = Config::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.database.max_connections, 12);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.notifications.enabled);
        assert_eq!(
            config.notifications.recipients,
            vec!["office@school.test", "principal@school.test"]
        );
        assert_eq!(config.notifications.queue_capacity, 64);
    }

    #[test]
    #[serial]
    fn test_config_load_nonexistent_file() {
        let config = Config::load_from_file("nonexistent.yaml").unwrap();

        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    #[serial]
    fn test_config_env_overrides_file() {
        let yaml_content = r#"
database:
  url: "postgres://file-host/reports"
  max_connections: 12
notifications:
  recipients:
    - "office@school.test"
"#;
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        std::env::set_var("REPORTS_DATABASE__MAX_CONNECTIONS", "20");
        std::env::set_var(
            "REPORTS_NOTIFICATIONS__RECIPIENTS",
            "registrar@school.test,principal@school.test",
        );
        std::env::set_var("DATABASE_URL", "postgres://env-host/reports");

        let config = Config::load_from_file(temp_file.path());

        std::env::remove_var("REPORTS_DATABASE__MAX_CONNECTIONS");
        std::env::remove_var("REPORTS_NOTIFICATIONS__RECIPIENTS");
        std::env::remove_var("DATABASE_URL");

        let config = config.unwrap();
        assert_eq!(config.database.url, "postgres://env-host/reports");
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(
            config.notifications.recipients,
            vec!["registrar@school.test", "principal@school.test"]
        );
        assert_eq!(config.logging.level, "info");
    }
}
