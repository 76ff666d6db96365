//! Rendering one server's status into a short presence line.

use log::info;

use crate::config::BotInstance;
use crate::status::OnlineStatus;

/// In-game hours rendered with the day emoji; everything else is night.
const DAY_HOURS: std::ops::Range<u32> = 6..20;

/// Render one presence line for `instance` from `status`.
///
/// An offline server renders the configured offline message; everything
/// else goes through the `${...}` placeholders of the status template.
pub fn format_presence(instance: &BotInstance, status: &dyn OnlineStatus) -> String {
    if !status.online() {
        return instance.status.server_offline_message.clone();
    }

    let time = status.server_time().unwrap_or("");

    instance
        .status
        .message
        .replace("${emoji.player}", &instance.emojis.player)
        .replace("${online}", &format_count(status.current_players()))
        .replace("${max}", &format_count(status.max_players()))
        .replace("${emoji.daytime}", daytime_emoji(instance, status.server_time()))
        .replace("${time}", time)
        .replace("${status.queueBlock}", &queue_block(instance, status))
}

fn format_count(count: Option<u32>) -> String {
    count.map_or_else(|| "?".to_string(), |count| count.to_string())
}

fn queue_block(instance: &BotInstance, status: &dyn OnlineStatus) -> String {
    let should_show = status.queue_active() || instance.status.show_queue_if_not_active;
    if !should_show {
        return String::new();
    }

    instance
        .status
        .queue_block
        .replace("${emoji.queue}", &instance.emojis.queue)
        .replace("${queue}", &status.queue_size().unwrap_or(0).to_string())
}

/// Pick the day or night emoji from the in-game clock's hour. A clock
/// that does not parse counts as day.
fn daytime_emoji<'a>(instance: &'a BotInstance, time: Option<&str>) -> &'a str {
    let hour = time
        .and_then(|time| time.split(':').next())
        .and_then(|hour| hour.parse::<u32>().ok());

    match hour {
        Some(hour) if !DAY_HOURS.contains(&hour) => &instance.emojis.night,
        _ => &instance.emojis.day,
    }
}

/// Where rendered presence lines go. A Discord transport would implement
/// this outside the crate; [LogSink] keeps the updater observable without
/// one.
pub trait PresenceSink: Send + Sync {
    fn publish(&self, target: &str, presence: &str);
}

/// Sink that logs each presence line.
pub struct LogSink;

impl PresenceSink for LogSink {
    fn publish(&self, target: &str, presence: &str) {
        info!("[{}] {}", target, presence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BotInstance;

    struct FakeStatus {
        online: bool,
        players: Option<u32>,
        max: Option<u32>,
        time: Option<&'static str>,
        queue: Option<u32>,
    }

    impl OnlineStatus for FakeStatus {
        fn current_players(&self) -> Option<u32> {
            self.players
        }
        fn max_players(&self) -> Option<u32> {
            self.max
        }
        fn server_time(&self) -> Option<&str> {
            self.time
        }
        fn queue_size(&self) -> Option<u32> {
            self.queue
        }
        fn queue_active(&self) -> bool {
            self.queue.map_or(false, |size| size > 0)
        }
        fn online(&self) -> bool {
            self.online
        }
    }

    fn instance() -> BotInstance {
        let mut instance = BotInstance::default();
        instance.emojis.player = "P".to_string();
        instance.emojis.day = "D".to_string();
        instance.emojis.night = "N".to_string();
        instance.emojis.queue = "Q".to_string();
        instance.status.message =
            "${emoji.player} ${online} / ${max} ${emoji.daytime} ${time} ${status.queueBlock}"
                .to_string();
        instance.status.queue_block = "${emoji.queue} ${queue}".to_string();
        instance.status.show_queue_if_not_active = false;
        instance
    }

    fn online(players: u32, time: &'static str, queue: Option<u32>) -> FakeStatus {
        FakeStatus {
            online: true,
            players: Some(players),
            max: Some(60),
            time: Some(time),
            queue,
        }
    }

    #[test]
    fn substitutes_all_placeholders() {
        let presence = format_presence(&instance(), &online(42, "12:30", Some(3)));
        assert_eq!(presence, "P 42 / 60 D 12:30 Q 3");
    }

    #[test]
    fn offline_renders_offline_message() {
        let status = FakeStatus {
            online: false,
            players: None,
            max: None,
            time: None,
            queue: None,
        };

        assert_eq!(format_presence(&instance(), &status), "Server offline");
    }

    #[test]
    fn queue_block_collapses_when_inactive() {
        let presence = format_presence(&instance(), &online(42, "12:30", None));
        assert_eq!(presence, "P 42 / 60 D 12:30 ");
    }

    #[test]
    fn queue_block_shows_when_configured_even_if_empty() {
        let mut instance = instance();
        instance.status.show_queue_if_not_active = true;

        let presence = format_presence(&instance, &online(42, "12:30", None));
        assert_eq!(presence, "P 42 / 60 D 12:30 Q 0");
    }

    #[test]
    fn daytime_emoji_follows_the_in_game_clock() {
        let cases = [
            ("05:59", "N"),
            ("06:00", "D"),
            ("12:00", "D"),
            ("19:59", "D"),
            ("20:00", "N"),
            ("23:30", "N"),
        ];

        for (time, emoji) in cases {
            let presence = format_presence(&instance(), &online(1, time, None));
            assert!(
                presence.contains(&format!(" {} ", emoji)),
                "time {} expected {} in '{}'",
                time,
                emoji,
                presence
            );
        }
    }

    #[test]
    fn unparsable_clock_counts_as_day() {
        let presence = format_presence(&instance(), &online(1, "soon", None));
        assert!(presence.contains(" D "));
    }
}
