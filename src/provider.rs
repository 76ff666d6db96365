use std::time::Duration;

use async_trait::async_trait;
use log::error;

use crate::cftools::CfToolsProvider;
use crate::config::ServerConfig;
use crate::query;
use crate::status::{A2sStatus, OnlineStatus};

/// Which backend answers "who is online" for a configured server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    A2s,
    CfTools,
}

impl ProviderKind {
    /// Parse the provider name as configured, case-insensitively.
    pub fn parse(value: &str) -> Option<ProviderKind> {
        match value.to_ascii_uppercase().as_str() {
            "A2S" => Some(ProviderKind::A2s),
            "CFTOOLS" | "CF_TOOLS" => Some(ProviderKind::CfTools),
            _ => None,
        }
    }

    pub fn as_config_str(&self) -> &'static str {
        match self {
            ProviderKind::A2s => "A2S",
            ProviderKind::CfTools => "CFTOOLS",
        }
    }
}

/// One status backend.
///
/// Implementations absorb their own failures: a server that cannot be
/// reached reports as offline, it never raises to the scheduler.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    async fn fetch(&self, server: &ServerConfig) -> Box<dyn OnlineStatus + Send + Sync>;
}

/// [StatusProvider] querying the server directly over UDP.
pub struct A2sProvider {
    timeout: Option<Duration>,
}

impl A2sProvider {
    pub fn new(timeout: Option<Duration>) -> Self {
        A2sProvider { timeout }
    }
}

#[async_trait]
impl StatusProvider for A2sProvider {
    async fn fetch(&self, server: &ServerConfig) -> Box<dyn OnlineStatus + Send + Sync> {
        match query::query(&server.ip, server.steam_query_port, self.timeout).await {
            Ok(info) => Box::new(A2sStatus::new(Some(info))),
            Err(err) => {
                error!(
                    "A2S query {}:{} failed: {}. Probably server is offline.",
                    server.ip, server.steam_query_port, err
                );
                Box::new(A2sStatus::new(None))
            }
        }
    }
}

/// Shared provider instances, one per [ProviderKind].
pub struct ProviderRegistry {
    a2s: A2sProvider,
    cftools: CfToolsProvider,
}

impl ProviderRegistry {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(ProviderRegistry {
            a2s: A2sProvider::new(None),
            cftools: CfToolsProvider::new()?,
        })
    }

    pub fn get(&self, kind: ProviderKind) -> &dyn StatusProvider {
        match kind {
            ProviderKind::A2s => &self.a2s,
            ProviderKind::CfTools => &self.cftools,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_parse_case_insensitively() {
        assert_eq!(ProviderKind::parse("a2s"), Some(ProviderKind::A2s));
        assert_eq!(ProviderKind::parse("A2S"), Some(ProviderKind::A2s));
        assert_eq!(ProviderKind::parse("CfTools"), Some(ProviderKind::CfTools));
        assert_eq!(ProviderKind::parse("CF_TOOLS"), Some(ProviderKind::CfTools));
        assert_eq!(ProviderKind::parse("STEAM_API"), None);
        assert_eq!(ProviderKind::parse(""), None);
    }

    #[tokio::test]
    async fn a2s_provider_reports_unreachable_server_as_offline() {
        let provider = A2sProvider::new(Some(Duration::from_millis(50)));
        let server = ServerConfig {
            ip: "127.0.0.1".to_string(),
            // nothing listens here
            steam_query_port: 1,
            ..ServerConfig::default()
        };

        let status = provider.fetch(&server).await;
        assert!(!status.online());
    }
}
