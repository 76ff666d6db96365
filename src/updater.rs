//! Periodic status polling: one task per configured instance, all wound
//! down together on shutdown.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::BotInstance;
use crate::presence::{format_presence, PresenceSink};
use crate::provider::{ProviderKind, ProviderRegistry};

pub struct OnlineUpdater {
    tasks: Vec<JoinHandle<()>>,
    shutdown: broadcast::Sender<()>,
}

impl OnlineUpdater {
    /// Spawn one polling task per instance. Each task updates immediately,
    /// then on its configured interval, until [shutdown](Self::shutdown).
    pub fn start(
        instances: Vec<BotInstance>,
        registry: Arc<ProviderRegistry>,
        sink: Arc<dyn PresenceSink>,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        info!("Starting schedulers for {} instances...", instances.len());

        let tasks = instances
            .into_iter()
            .map(|instance| {
                let registry = Arc::clone(&registry);
                let sink = Arc::clone(&sink);
                let stop = shutdown.subscribe();
                tokio::spawn(update_loop(instance, registry, sink, stop))
            })
            .collect();

        OnlineUpdater { tasks, shutdown }
    }

    /// Signal every task and wait for them to wind down.
    pub async fn shutdown(self) {
        info!("Stopping all schedulers gracefully...");
        // receivers are gone if every loop already ended
        let _ = self.shutdown.send(());

        for task in self.tasks {
            if let Err(err) = task.await {
                warn!("Updater task ended abnormally: {}", err);
            }
        }
        info!("All schedulers stopped");
    }
}

async fn update_loop(
    instance: BotInstance,
    registry: Arc<ProviderRegistry>,
    sink: Arc<dyn PresenceSink>,
    mut stop: broadcast::Receiver<()>,
) {
    let target = format!("{}:{}", instance.server.ip, instance.server.port);
    // validation pinned the provider name down already; stay defensive anyway
    let kind =
        ProviderKind::parse(&instance.server.online_provider).unwrap_or(ProviderKind::CfTools);

    info!(
        "Scheduler started for {}: interval={}s, provider={}",
        target,
        instance.updater.interval_seconds,
        kind.as_config_str()
    );

    let mut ticker = interval(Duration::from_secs(instance.updater.interval_seconds));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = registry.get(kind).fetch(&instance.server).await;
                let presence = format_presence(&instance, status.as_ref());
                sink.publish(&target, &presence);
            }
            _ = stop.recv() => {
                info!("Scheduler for {} stopping", target);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink {
        lines: Mutex<Vec<(String, String)>>,
    }

    impl PresenceSink for RecordingSink {
        fn publish(&self, target: &str, presence: &str) {
            self.lines
                .lock()
                .unwrap()
                .push((target.to_string(), presence.to_string()));
        }
    }

    #[tokio::test]
    async fn updater_publishes_and_shuts_down() {
        let mut instance = BotInstance::default();
        // A2S against a dead port reports offline quickly, no network needed
        instance.server.online_provider = "A2S".to_string();
        instance.server.ip = "127.0.0.1".to_string();
        instance.server.steam_query_port = 1;
        instance.updater.interval_seconds = 3600;

        let registry = Arc::new(ProviderRegistry::new().unwrap());
        let sink = Arc::new(RecordingSink {
            lines: Mutex::new(Vec::new()),
        });

        let updater =
            OnlineUpdater::start(vec![instance], registry, sink.clone() as Arc<dyn PresenceSink>);

        // the first tick fires immediately; the dead-port query needs its
        // 5 second receive window before it reports offline
        tokio::time::sleep(Duration::from_millis(100)).await;
        updater.shutdown().await;

        let lines = sink.lines.lock().unwrap();
        assert!(lines.len() <= 1);
    }
}
