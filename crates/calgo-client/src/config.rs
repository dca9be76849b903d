//! Client configuration.
//!
//! Settings live in a single `config.toml` file at
//! `~/.config/calgo/config.toml` by default. Every key is optional; values
//! are layered as command-line flag > environment variable > config file >
//! built-in default. Flags and environment variables arrive together through
//! clap's `env` support as [`Overrides`].

use std::path::{Path, PathBuf};

use calgo_core::{TracingOutputFormat, Zone};
use calgo_providers::google::GoogleConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Default event length in minutes.
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

/// Default target calendar.
pub const DEFAULT_CALENDAR_ID: &str = "primary";

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Path to the OAuth client credentials JSON file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,

    /// Path where the OAuth token is stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_path: Option<PathBuf>,

    /// Target calendar ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,

    /// Event length in minutes when `--duration` is not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_duration: Option<u32>,

    /// IANA timezone for wall-clock start times.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Debug mode.
    pub debug: bool,

    /// Log output format: `compact`, `pretty` or `json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<String>,
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if the file
    /// does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path, which must exist.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| ClientError::Config(format!("{} in {}", e, path.display())))
    }

    /// Loads `path` when given, the default location otherwise.
    pub fn load_optional(path: Option<&Path>) -> ClientResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    /// Parses TOML content.
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calgo")
    }

    /// Combines the file values with flags and environment.
    pub fn resolve(&self, overrides: &Overrides) -> Settings {
        let dir = Self::default_config_dir();

        // An ambient TZ outranks the file; the resolver reads it itself.
        let timezone = match (&overrides.timezone, &overrides.ambient_tz) {
            (Some(tz), _) => Some(tz.clone()),
            (None, Some(_)) => None,
            (None, None) => self.timezone.clone(),
        };

        Settings {
            credentials_path: overrides
                .credentials
                .clone()
                .or_else(|| self.credentials_path.clone())
                .unwrap_or_else(|| dir.join("credentials.json")),
            token_path: overrides
                .token
                .clone()
                .or_else(|| self.token_path.clone())
                .unwrap_or_else(|| dir.join("token.json")),
            calendar_id: overrides
                .calendar_id
                .clone()
                .or_else(|| self.calendar_id.clone())
                .unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string()),
            default_duration: self.default_duration.unwrap_or(DEFAULT_DURATION_MINUTES),
            timezone,
            debug: overrides.debug || self.debug,
            log_format: self.log_format.clone(),
        }
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub credentials: Option<PathBuf>,
    pub token: Option<PathBuf>,
    pub calendar_id: Option<String>,
    pub timezone: Option<String>,
    /// The `TZ` environment variable, if set.
    pub ambient_tz: Option<String>,
    pub debug: bool,
}

/// Effective settings after layering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub calendar_id: String,
    pub default_duration: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    pub debug: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<String>,
}

impl Settings {
    /// Parsed log format, defaulting to compact.
    pub fn log_format(&self) -> ClientResult<TracingOutputFormat> {
        self.log_format
            .as_deref()
            .map(str::parse)
            .transpose()
            .map(Option::unwrap_or_default)
            .map_err(ClientError::Config)
    }

    /// Checks every value without touching the network.
    pub fn validate(&self) -> ClientResult<()> {
        if !self.credentials_path.is_file() {
            return Err(ClientError::Config(format!(
                "credentials file not found: {} (set GOOGLE_CALENDAR_CREDENTIALS or credentials_path in config)",
                self.credentials_path.display()
            )));
        }
        if self.calendar_id.trim().is_empty() {
            return Err(ClientError::Config("calendar_id must not be empty".into()));
        }
        if self.default_duration == 0 {
            return Err(ClientError::Config(
                "default_duration must be a positive number of minutes".into(),
            ));
        }
        if let Some(tz) = &self.timezone
            && Zone::from_name(tz).is_none()
        {
            return Err(ClientError::Config(format!("unknown timezone '{}'", tz)));
        }
        self.log_format()?;
        Ok(())
    }

    /// Builds the provider configuration.
    pub fn google_config(&self) -> GoogleConfig {
        GoogleConfig::new(&self.credentials_path, &self.token_path)
            .with_calendar_id(&self.calendar_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config() -> ClientConfig {
        ClientConfig::parse(
            r#"
credentials_path = "/config/credentials.json"
token_path = "/config/token.json"
calendar_id = "file-calendar"
default_duration = 45
timezone = "Europe/Paris"
"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults() {
        let settings = ClientConfig::default().resolve(&Overrides::default());
        assert_eq!(settings.calendar_id, "primary");
        assert_eq!(settings.default_duration, 30);
        assert!(settings.credentials_path.ends_with("calgo/credentials.json"));
        assert!(settings.token_path.ends_with("calgo/token.json"));
        assert_eq!(settings.timezone, None);
        assert!(!settings.debug);
    }

    #[test]
    fn file_values_apply() {
        let settings = file_config().resolve(&Overrides::default());
        assert_eq!(settings.credentials_path, PathBuf::from("/config/credentials.json"));
        assert_eq!(settings.token_path, PathBuf::from("/config/token.json"));
        assert_eq!(settings.calendar_id, "file-calendar");
        assert_eq!(settings.default_duration, 45);
        assert_eq!(settings.timezone.as_deref(), Some("Europe/Paris"));
    }

    #[test]
    fn overrides_win_over_file() {
        let overrides = Overrides {
            credentials: Some("/flag/credentials.json".into()),
            token: Some("/flag/token.json".into()),
            calendar_id: Some("flag-calendar".into()),
            timezone: Some("Asia/Tokyo".into()),
            ambient_tz: Some("America/New_York".into()),
            debug: true,
        };
        let settings = file_config().resolve(&overrides);
        assert_eq!(settings.credentials_path, PathBuf::from("/flag/credentials.json"));
        assert_eq!(settings.token_path, PathBuf::from("/flag/token.json"));
        assert_eq!(settings.calendar_id, "flag-calendar");
        assert_eq!(settings.timezone.as_deref(), Some("Asia/Tokyo"));
        assert!(settings.debug);
    }

    #[test]
    fn ambient_tz_outranks_file_timezone() {
        let overrides = Overrides {
            ambient_tz: Some("America/New_York".into()),
            ..Overrides::default()
        };
        let settings = file_config().resolve(&overrides);
        assert_eq!(settings.timezone, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ClientConfig::parse("calendar = \"x\"\n").unwrap_err();
        assert!(err.contains("failed to parse config"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "calendar_id = \"work\"\ndebug = true\n").unwrap();

        let config = ClientConfig::load_optional(Some(&path)).unwrap();
        assert_eq!(config.calendar_id.as_deref(), Some("work"));
        assert!(config.debug);

        let missing = ClientConfig::load_from(&dir.path().join("missing.toml")).unwrap_err();
        assert!(missing.to_string().contains("failed to read"));
    }

    #[test]
    fn dump_format() {
        let rendered = toml::to_string_pretty(&file_config()).unwrap();
        assert!(rendered.contains("calendar_id = \"file-calendar\""));
        assert!(rendered.contains("default_duration = 45"));
        assert!(!rendered.contains("log_format"));
        assert_eq!(ClientConfig::parse(&rendered).unwrap(), file_config());
    }

    #[test]
    fn validate_settings() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = dir.path().join("credentials.json");
        let mut settings = ClientConfig::default().resolve(&Overrides {
            credentials: Some(credentials.clone()),
            ..Overrides::default()
        });

        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("credentials file not found"));

        std::fs::write(&credentials, "{}").unwrap();
        settings.validate().unwrap();

        settings.timezone = Some("Mars/Olympus".into());
        assert!(settings.validate().unwrap_err().to_string().contains("unknown timezone"));
        settings.timezone = None;

        settings.default_duration = 0;
        assert!(settings.validate().is_err());
        settings.default_duration = 30;

        settings.log_format = Some("xml".into());
        assert!(settings.validate().unwrap_err().to_string().contains("unknown log format"));
        settings.log_format = Some("json".into());
        assert_eq!(settings.log_format().unwrap(), TracingOutputFormat::Json);
    }
}
