//! JSON configuration: loading, legacy migration and validate-and-fix
//! normalization. A parseable config never fails to load; bad values are
//! replaced by their defaults and warned about instead.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::provider::ProviderKind;

pub const CONFIG_VERSION: u32 = 4;
pub const DEFAULT_CONFIG_FILE: &str = "OnlineBot_Config.json";

const BACKUP_SUFFIX: &str = ".backup";
const CORRUPTED_SUFFIX: &str = ".corrupted";

/// Activity names the presence transport understands.
const ACTIVITY_TYPES: &[&str] = &[
    "PLAYING",
    "LISTENING",
    "WATCHING",
    "COMPETING",
    "CUSTOM_STATUS",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub version: Option<u32>,
    #[serde(default)]
    pub instances: Vec<BotInstance>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotInstance {
    pub discord: DiscordConfig,
    pub server: ServerConfig,
    pub emojis: EmojisConfig,
    pub updater: UpdaterConfig,
    pub status: StatusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub ip: String,
    /// Game port; identifies the server towards HTTP providers.
    pub port: u16,
    /// Steam query port; where A2S_INFO requests go.
    pub steam_query_port: u16,
    pub online_provider: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            ip: "127.0.0.1".to_string(),
            port: 2302,
            steam_query_port: 27015,
            online_provider: "CFTOOLS".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmojisConfig {
    pub player: String,
    pub day: String,
    pub night: String,
    pub queue: String,
}

impl Default for EmojisConfig {
    fn default() -> Self {
        EmojisConfig {
            player: "👥".to_string(),
            day: "☀️".to_string(),
            night: "🌙".to_string(),
            queue: "👥".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdaterConfig {
    pub interval_seconds: u64,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        UpdaterConfig {
            interval_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusConfig {
    pub message: String,
    pub queue_block: String,
    pub show_queue_if_not_active: bool,
    pub activity_type: String,
    pub server_offline_message: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        StatusConfig {
            message: "${emoji.player} ${online} / ${max} ${emoji.daytime} ${time} ${status.queueBlock} "
                .to_string(),
            queue_block: "${emoji.queue} ${queue}".to_string(),
            show_queue_if_not_active: true,
            activity_type: "PLAYING".to_string(),
            server_offline_message: "Server offline".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscordConfig {
    pub token: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        DiscordConfig {
            token: "YOUR_BOT_TOKEN_HERE".to_string(),
        }
    }
}

/// Pre-v4 single-server layout. Kept only as a migration source; the
/// strict field set is what tells it apart from the current schema.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct LegacyConfig {
    version: Option<u32>,
    server: LegacyServerConfig,
    #[serde(default)]
    emojis: EmojisConfig,
    #[serde(default)]
    updater: UpdaterConfig,
    #[serde(default)]
    discord: DiscordConfig,
    #[serde(default)]
    status: StatusConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyServerConfig {
    ip: String,
    port: u16,
}

impl AppConfig {
    pub fn default_config() -> Self {
        AppConfig {
            version: Some(CONFIG_VERSION),
            instances: vec![BotInstance::default()],
        }
    }

    pub fn log_summary(&self) {
        info!("Config version: {:?}", self.version);
        info!("Bot instances configured: {}", self.instances.len());
        for (index, instance) in self.instances.iter().enumerate() {
            info!(
                "  Instance[{}]: {}:{} (update: {}s)",
                index,
                instance.server.ip,
                instance.server.port,
                instance.updater.interval_seconds
            );
        }
    }
}

/// Load the configuration at `path`, creating, migrating or repairing it
/// as needed. Only I/O failures surface as errors.
pub fn load_or_init(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        let config = AppConfig::default_config();
        save(path, &config)?;
        info!("Created default {}", path.display());
        return Ok(config);
    }

    info!("Loading config from file: {}", path.display());
    let raw = fs::read_to_string(path)?;

    if let Ok(legacy) = serde_json::from_str::<LegacyConfig>(&raw) {
        let migrated = migrate_from_legacy(legacy);
        backup_and_save(path, &migrated)?;
        return Ok(validate_and_fix(migrated));
    }

    match serde_json::from_str::<AppConfig>(&raw) {
        Ok(mut config) => {
            if config.version.unwrap_or(0) < CONFIG_VERSION {
                warn!(
                    "Config version mismatch: {:?} < {}",
                    config.version, CONFIG_VERSION
                );
                config = migrate(config);
                backup_and_save(path, &config)?;
            }
            Ok(validate_and_fix(config))
        }
        Err(err) => {
            warn!("Failed to parse config: {}", err);
            backup_corrupted(path)?;
            let config = AppConfig::default_config();
            save(path, &config)?;
            Ok(config)
        }
    }
}

pub fn save(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let raw = serde_json::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}

fn migrate(old: AppConfig) -> AppConfig {
    info!(
        "Starting migration from version {:?} to {}",
        old.version, CONFIG_VERSION
    );

    let instances = if old.instances.is_empty() {
        info!("Converting old single-server config to instances array");
        vec![BotInstance::default()]
    } else {
        info!(
            "Found existing instances array, migrating {} instances",
            old.instances.len()
        );
        old.instances
    };

    info!("Migration completed successfully");
    AppConfig {
        version: Some(CONFIG_VERSION),
        instances,
    }
}

fn migrate_from_legacy(legacy: LegacyConfig) -> AppConfig {
    info!(
        "Starting migration from version {:?} to {}",
        legacy.version, CONFIG_VERSION
    );

    let instance = BotInstance {
        discord: legacy.discord,
        server: ServerConfig {
            ip: legacy.server.ip,
            port: legacy.server.port,
            ..ServerConfig::default()
        },
        emojis: legacy.emojis,
        updater: legacy.updater,
        status: legacy.status,
    };

    info!("Migration completed successfully");
    AppConfig {
        version: Some(CONFIG_VERSION),
        instances: vec![instance],
    }
}

/// Replace missing, blank or out-of-range values with their defaults.
fn validate_and_fix(mut config: AppConfig) -> AppConfig {
    if config.instances.is_empty() {
        warn!("No bot instances configured, adding default instance");
        config.instances.push(BotInstance::default());
        return config;
    }

    for (index, instance) in config.instances.iter_mut().enumerate() {
        validate_and_fix_instance(instance, index);
    }
    config
}

fn validate_and_fix_instance(instance: &mut BotInstance, index: usize) {
    let defaults = BotInstance::default();

    if instance.server.ip.trim().is_empty() {
        warn!("Instance[{}]: Invalid server IP, using default", index);
        instance.server.ip = defaults.server.ip;
    }
    if instance.server.port == 0 {
        warn!("Instance[{}]: Invalid server port, using default", index);
        instance.server.port = defaults.server.port;
    }
    if instance.server.steam_query_port == 0 {
        warn!(
            "Instance[{}]: Invalid steam query port, using default",
            index
        );
        instance.server.steam_query_port = defaults.server.steam_query_port;
    }
    if ProviderKind::parse(&instance.server.online_provider).is_none() {
        warn!(
            "Instance[{}]: Unknown online provider '{}', using default",
            index, instance.server.online_provider
        );
        instance.server.online_provider = defaults.server.online_provider;
    }

    if instance.emojis.player.is_empty() {
        instance.emojis.player = defaults.emojis.player;
    }
    if instance.emojis.day.is_empty() {
        instance.emojis.day = defaults.emojis.day;
    }
    if instance.emojis.night.is_empty() {
        instance.emojis.night = defaults.emojis.night;
    }
    if instance.emojis.queue.is_empty() {
        instance.emojis.queue = defaults.emojis.queue;
    }

    if instance.updater.interval_seconds == 0 {
        warn!(
            "Instance[{}]: Invalid updater interval, using default",
            index
        );
        instance.updater.interval_seconds = defaults.updater.interval_seconds;
    }

    if instance.status.message.trim().is_empty() {
        warn!("Instance[{}]: Invalid status message, using default", index);
        instance.status.message = defaults.status.message;
    }
    if instance.status.server_offline_message.trim().is_empty() {
        warn!(
            "Instance[{}]: Invalid serverOfflineMessage, using default",
            index
        );
        instance.status.server_offline_message = defaults.status.server_offline_message;
    }
    if !ACTIVITY_TYPES.contains(&instance.status.activity_type.as_str()) {
        warn!(
            "Instance[{}]: Invalid activity type, using default (PLAYING)",
            index
        );
        instance.status.activity_type = defaults.status.activity_type;
    }

    if instance.discord.token.trim().is_empty() {
        instance.discord.token = defaults.discord.token;
    }
}

fn backup_and_save(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let backup = suffixed_path(path, BACKUP_SUFFIX);
    fs::copy(path, &backup)?;
    info!("Created backup: {}", backup.display());
    save(path, config)
}

fn backup_corrupted(path: &Path) -> Result<(), ConfigError> {
    let backup = suffixed_path(path, CORRUPTED_SUFFIX);
    fs::copy(path, &backup)?;
    warn!("Backed up unreadable config to {}", backup.display());
    Ok(())
}

fn suffixed_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
