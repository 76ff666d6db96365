//! Status provider backed by the CFTools Data API instead of a direct
//! UDP query. CFTools identifies a game server by the hex SHA-1 of its
//! game identifier, IP and game port.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use ring::digest;
use serde::Deserialize;

use crate::config::ServerConfig;
use crate::provider::StatusProvider;
use crate::status::OnlineStatus;

const GAMESERVER_ENDPOINT: &str = "https://data.cftools.cloud/v1/gameserver";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// CFTools game identifier for DayZ, the first input byte of the
/// gameserver id hash.
const GAME_IDENTIFIER: &str = "1";

/// The slice of the CFTools gameserver document the status boundary needs.
/// The full document carries far more (geolocation, mods, attributes).
#[derive(Debug, Deserialize)]
pub struct CfToolsServer {
    status: CfToolsStatusBlock,
    environment: CfToolsEnvironment,
}

#[derive(Debug, Deserialize)]
struct CfToolsStatusBlock {
    players: u32,
    slots: u32,
    queue: CfToolsQueue,
}

#[derive(Debug, Deserialize)]
struct CfToolsQueue {
    active: bool,
    size: u32,
}

#[derive(Debug, Deserialize)]
struct CfToolsEnvironment {
    time: String,
}

/// [OnlineStatus] view over an optional CFTools server document.
pub struct CfToolsStatus {
    server: Option<CfToolsServer>,
}

impl CfToolsStatus {
    pub fn new(server: Option<CfToolsServer>) -> Self {
        CfToolsStatus { server }
    }
}

impl OnlineStatus for CfToolsStatus {
    fn current_players(&self) -> Option<u32> {
        self.server.as_ref().map(|server| server.status.players)
    }

    fn max_players(&self) -> Option<u32> {
        self.server.as_ref().map(|server| server.status.slots)
    }

    fn server_time(&self) -> Option<&str> {
        self.server
            .as_ref()
            .map(|server| server.environment.time.as_str())
    }

    fn queue_size(&self) -> Option<u32> {
        self.server.as_ref().map(|server| server.status.queue.size)
    }

    fn queue_active(&self) -> bool {
        self.server
            .as_ref()
            .map_or(false, |server| server.status.queue.active)
    }

    fn online(&self) -> bool {
        self.server.is_some()
    }
}

/// [StatusProvider] querying the CFTools Data API over HTTPS.
pub struct CfToolsProvider {
    client: reqwest::Client,
    id_cache: Mutex<HashMap<String, String>>,
}

impl CfToolsProvider {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(CfToolsProvider {
            client,
            id_cache: Mutex::new(HashMap::new()),
        })
    }

    /// The gameserver id is a pure function of the endpoint, so it is
    /// computed once per server and cached.
    fn cached_gameserver_id(&self, server: &ServerConfig) -> String {
        let key = format!("{}:{}", server.ip, server.port);
        let mut cache = self
            .id_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        cache
            .entry(key)
            .or_insert_with(|| gameserver_id(server))
            .clone()
    }

    async fn fetch_server(&self, gameserver_id: &str) -> Option<CfToolsServer> {
        let url = format!("{}/{}", GAMESERVER_ENDPOINT, gameserver_id);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("CFTools request failed: {}", err);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("CFTools responded {} for {}", response.status(), url);
            return None;
        }

        // the document is keyed by the gameserver id we asked for
        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                warn!("CFTools response was not valid JSON: {}", err);
                return None;
            }
        };

        let server = body.get(gameserver_id)?.clone();
        match serde_json::from_value(server) {
            Ok(server) => Some(server),
            Err(err) => {
                warn!("CFTools server document has unexpected shape: {}", err);
                None
            }
        }
    }
}

#[async_trait]
impl StatusProvider for CfToolsProvider {
    async fn fetch(&self, server: &ServerConfig) -> Box<dyn OnlineStatus + Send + Sync> {
        let gameserver_id = self.cached_gameserver_id(server);
        debug!(
            "CFTools lookup for {}:{} as {}",
            server.ip, server.port, gameserver_id
        );

        Box::new(CfToolsStatus::new(self.fetch_server(&gameserver_id).await))
    }
}

fn gameserver_id(server: &ServerConfig) -> String {
    let input = format!("{}{}{}", GAME_IDENTIFIER, server.ip, server.port);
    let hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, input.as_bytes());
    hex::encode(hash.as_ref())
}
