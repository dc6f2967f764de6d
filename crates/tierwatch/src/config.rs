//! Daemon configuration
//!
//! Loaded from a TOML file. Mailbox credentials may also come from
//! `TIERWATCH_MAIL_ADDRESS` and `TIERWATCH_MAIL_PASSWORD`, which win over
//! the file.
//!
//! ```toml
//! [api]
//! keys = ["HDEV-primary", "HDEV-backup"]
//!
//! [[entities]]
//! id = "2f1c..."
//! name = "Alice#EUW"
//! region = "eu"
//!
//! [channels]
//! cards = 1100000000000000001
//! ```

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tierwatch_core::scheduler::config::{DEFAULT_ENTITY_DELAY, DEFAULT_INTERVAL, DEFAULT_JITTER};
use tierwatch_core::{Entity, JitterPolicy, MessageId, SchedulerConfig};
use tierwatch_mail::IngestConfig;
use tierwatch_supervisor::{SupervisorConfig, DEFAULT_PERIOD, DEFAULT_STALL_THRESHOLD};

/// Environment variable overriding `mail.address`
pub const ENV_MAIL_ADDRESS: &str = "TIERWATCH_MAIL_ADDRESS";

/// Environment variable overriding `mail.password`
pub const ENV_MAIL_PASSWORD: &str = "TIERWATCH_MAIL_PASSWORD";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`Settings`]
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values are inconsistent
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// `[api]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSettings {
    /// Credential pool, rotated on rate limits
    pub keys: Vec<String>,
    /// Ranking API root
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Pause before retrying on the next key
    pub rotation_pause_ms: u64,
    /// Icons kept in memory
    pub icon_cache_capacity: u64,
    /// Icon lifetime in the cache
    pub icon_ttl_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            base_url: tierwatch_client::source::DEFAULT_BASE_URL.to_string(),
            timeout_secs: tierwatch_client::DEFAULT_TIMEOUT.as_secs(),
            rotation_pause_ms: 0,
            icon_cache_capacity: tierwatch_client::assets::DEFAULT_CAPACITY,
            icon_ttl_secs: tierwatch_client::assets::DEFAULT_TTL.as_secs(),
        }
    }
}

/// One `[[entities]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntitySettings {
    /// Stable player identifier
    pub id: String,
    /// `Name#TAG`
    pub name: String,
    /// Lookup region
    pub region: String,
    /// Card message to reuse when history no longer shows it
    #[serde(default)]
    pub message_id: Option<u64>,
}

/// `[scheduler]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSettings {
    /// Spacing of cycles
    pub interval_secs: u64,
    /// Maximum jitter in either direction
    pub jitter_secs: u64,
    /// Pause before each player lookup
    pub entity_delay_secs: u64,
    /// Messages read back on restore
    pub history_window: usize,
    /// Messages inspected for holds
    pub hold_window: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        let config = SchedulerConfig::default();
        Self {
            interval_secs: DEFAULT_INTERVAL.as_secs(),
            jitter_secs: DEFAULT_JITTER.as_secs(),
            entity_delay_secs: DEFAULT_ENTITY_DELAY.as_secs(),
            history_window: config.history_window,
            hold_window: config.hold_window,
        }
    }
}

/// `[mail]`
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailSettings {
    /// Switch for the ingestion loop
    pub enabled: bool,
    /// Mailbox login
    pub address: String,
    /// Mailbox app password
    pub password: String,
    /// IMAP host
    pub imap_server: String,
    /// IMAP TLS port
    pub imap_port: u16,
    /// Most recent messages inspected per check
    pub window: usize,
    /// Maximum message age
    pub max_age_mins: u64,
    /// Pause between checks
    pub poll_secs: u64,
}

impl std::fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailSettings")
            .field("enabled", &self.enabled)
            .field("address", &self.address)
            .field("password", &"<redacted>")
            .field("imap_server", &self.imap_server)
            .field("imap_port", &self.imap_port)
            .field("window", &self.window)
            .field("max_age_mins", &self.max_age_mins)
            .field("poll_secs", &self.poll_secs)
            .finish()
    }
}

impl Default for MailSettings {
    fn default() -> Self {
        let config = IngestConfig::default();
        Self {
            enabled: true,
            address: String::new(),
            password: String::new(),
            imap_server: "imap.gmail.com".to_string(),
            imap_port: 993,
            window: config.window,
            max_age_mins: config.max_age.as_secs() / 60,
            poll_secs: config.poll_interval.as_secs(),
        }
    }
}

impl MailSettings {
    /// Whether ingestion will actually run
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.address.trim().is_empty() && !self.password.is_empty()
    }
}

/// `[supervisor]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorSettings {
    /// Spacing of checks
    pub period_secs: u64,
    /// Lag after which a live loop counts as stuck
    pub stall_threshold_secs: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            period_secs: DEFAULT_PERIOD.as_secs(),
            stall_threshold_secs: DEFAULT_STALL_THRESHOLD.as_secs(),
        }
    }
}

/// `[channels]`: platform channel identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelSettings {
    /// Player cards
    pub cards: u64,
    /// Summary board
    pub summary: Option<u64>,
    /// Summary board message to reuse
    pub summary_message: Option<u64>,
    /// Hold commands
    pub holds: Option<u64>,
    /// Delivered codes
    pub codes: Option<u64>,
    /// Crash logs and watchdog reports
    pub logs: Option<u64>,
}

/// Complete daemon configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Ranking API access
    pub api: ApiSettings,
    /// Tracked players, in card order
    pub entities: Vec<EntitySettings>,
    /// Reconciliation cadence
    pub scheduler: SchedulerSettings,
    /// Code ingestion
    pub mail: MailSettings,
    /// Watchdog cadence
    pub supervisor: SupervisorSettings,
    /// Target channels
    pub channels: ChannelSettings,
}

impl Settings {
    /// Read, apply environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings = Self::from_toml_str(&text)?;
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        tracing::info!(path = %path.display(), entities = settings.entities.len(), "configuration loaded");
        Ok(settings)
    }

    /// Parse without overrides or validation
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Override mailbox credentials from `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(address) = lookup(ENV_MAIL_ADDRESS).filter(|v| !v.trim().is_empty()) {
            self.mail.address = address;
        }
        if let Some(password) = lookup(ENV_MAIL_PASSWORD).filter(|v| !v.is_empty()) {
            self.mail.password = password;
        }
    }

    /// Reject configurations the daemon cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.api.keys.iter().all(|k| k.trim().is_empty()) {
            return invalid("api.keys must contain at least one key");
        }
        if self.entities.is_empty() {
            return invalid("at least one [[entities]] entry is required");
        }
        let mut seen = HashSet::new();
        for entity in &self.entities {
            if entity.id.trim().is_empty() || entity.name.trim().is_empty() {
                return invalid("entity id and name must not be empty");
            }
            if !seen.insert(entity.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate entity id {}",
                    entity.id
                )));
            }
        }
        if self.scheduler.interval_secs == 0 {
            return invalid("scheduler.interval_secs must be non-zero");
        }
        if self.scheduler.jitter_secs >= self.scheduler.interval_secs {
            return invalid("scheduler.jitter_secs must be below interval_secs");
        }
        if self.mail.poll_secs == 0 || self.mail.window == 0 {
            return invalid("mail.poll_secs and mail.window must be non-zero");
        }
        self.supervisor_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.channels.cards == 0 {
            return invalid("channels.cards is required");
        }
        Ok(())
    }

    /// Tracked players
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.entities
            .iter()
            .map(|e| Entity::new(e.id.trim(), e.name.trim(), e.region.trim()))
            .collect()
    }

    /// Card messages pinned in the configuration
    #[must_use]
    pub fn pinned_slots(&self) -> Vec<(String, MessageId)> {
        self.entities
            .iter()
            .filter_map(|e| e.message_id.map(|id| (e.id.trim().to_string(), MessageId(id))))
            .collect()
    }

    /// Scheduler tuning
    #[must_use]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let s = &self.scheduler;
        let jitter = if s.jitter_secs == 0 {
            JitterPolicy::None
        } else {
            JitterPolicy::Uniform(Duration::from_secs(s.jitter_secs))
        };
        SchedulerConfig::new()
            .with_interval(Duration::from_secs(s.interval_secs))
            .with_jitter(jitter)
            .with_entity_delay(Duration::from_secs(s.entity_delay_secs))
            .with_history_window(s.history_window)
            .with_hold_window(s.hold_window)
    }

    /// Ingestion tuning; disabled without credentials
    #[must_use]
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            enabled: self.mail.is_active(),
            window: self.mail.window,
            max_age: Duration::from_secs(self.mail.max_age_mins * 60),
            poll_interval: Duration::from_secs(self.mail.poll_secs),
            ..IngestConfig::default()
        }
    }

    /// Watchdog tuning
    #[must_use]
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig::new()
            .with_period(Duration::from_secs(self.supervisor.period_secs))
            .with_stall_threshold(Duration::from_secs(self.supervisor.stall_threshold_secs))
    }

    /// Operator summary, without secrets
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "api: {} key(s), {}", self.api.keys.len(), self.api.base_url);
        let _ = writeln!(out, "entities: {}", self.entities.len());
        for entity in &self.entities {
            let _ = writeln!(out, "  - {} [{}]", entity.name, entity.region);
        }
        let _ = writeln!(
            out,
            "scheduler: every {}s ±{}s, {}s between players",
            self.scheduler.interval_secs, self.scheduler.jitter_secs, self.scheduler.entity_delay_secs
        );
        let _ = writeln!(
            out,
            "mail: {}",
            if self.mail.is_active() {
                format!("{} via {}:{}", self.mail.address, self.mail.imap_server, self.mail.imap_port)
            } else {
                "disabled".to_string()
            }
        );
        let _ = write!(
            out,
            "supervisor: every {}s, stuck after {}s",
            self.supervisor.period_secs, self.supervisor.stall_threshold_secs
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const MINIMAL: &str = r#"
        [api]
        keys = ["k1", "k2"]

        [[entities]]
        id = "p1"
        name = "Alice#EUW"
        region = "eu"
        message_id = 77

        [[entities]]
        id = "p2"
        name = "Bruno#1234"
        region = "eu"

        [channels]
        cards = 10
        summary = 11
    "#;

    #[test]
    fn defaults_fill_missing_sections() {
        let settings = Settings::from_toml_str(MINIMAL).unwrap();
        settings.validate().unwrap();

        let scheduler = settings.scheduler_config();
        assert_eq!(scheduler.interval, Duration::from_secs(3600));
        assert_eq!(scheduler.jitter, JitterPolicy::Uniform(Duration::from_secs(120)));
        assert_eq!(settings.supervisor_config().stall_threshold, Duration::from_secs(300));
        assert!(!settings.ingest_config().enabled);
        assert_eq!(settings.pinned_slots(), vec![("p1".to_string(), MessageId(77))]);
    }

    #[test]
    fn env_supplies_mail_credentials() {
        let mut settings = Settings::from_toml_str(MINIMAL).unwrap();
        settings.apply_env(|key| match key {
            ENV_MAIL_ADDRESS => Some("bot@example.com".into()),
            ENV_MAIL_PASSWORD => Some("app-password".into()),
            _ => None,
        });
        assert!(settings.ingest_config().enabled);
        assert!(!format!("{:?}", settings.mail).contains("app-password"));
    }

    #[test]
    fn rejects_inconsistent_values() {
        let mut settings = Settings::from_toml_str(MINIMAL).unwrap();
        settings.entities[1].id = "p1".into();
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("duplicate")));

        let mut settings = Settings::from_toml_str(MINIMAL).unwrap();
        settings.api.keys = vec!["  ".into()];
        assert!(settings.validate().is_err());

        let mut settings = Settings::from_toml_str(MINIMAL).unwrap();
        settings.scheduler.interval_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::from_toml_str(MINIMAL).unwrap();
        settings.supervisor.period_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Settings::from_toml_str("[api]\nkeyz = []").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.entities().len(), 2);
        assert!(settings.summary().contains("Alice#EUW [eu]"));

        let missing = Settings::load(file.path().with_extension("missing")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
