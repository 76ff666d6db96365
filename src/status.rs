use crate::info::ServerInfo;

/// Provider-independent view of one server's live status: the handful of
/// values presence rendering needs, regardless of where they came from.
///
/// `None` means the provider had no value for the field, not zero.
pub trait OnlineStatus {
    fn current_players(&self) -> Option<u32>;
    fn max_players(&self) -> Option<u32>;
    fn server_time(&self) -> Option<&str>;
    fn queue_size(&self) -> Option<u32>;
    fn queue_active(&self) -> bool;
    fn online(&self) -> bool;
}

/// [OnlineStatus] backed by a direct A2S_INFO query. `None` inside means
/// the query failed and the server counts as offline.
pub struct A2sStatus {
    info: Option<ServerInfo>,
}

impl A2sStatus {
    pub fn new(info: Option<ServerInfo>) -> Self {
        A2sStatus { info }
    }
}

impl OnlineStatus for A2sStatus {
    fn current_players(&self) -> Option<u32> {
        self.info.as_ref().map(|info| u32::from(info.players))
    }

    fn max_players(&self) -> Option<u32> {
        self.info.as_ref().map(|info| u32::from(info.max_players))
    }

    fn server_time(&self) -> Option<&str> {
        self.info.as_ref().and_then(|info| info.time.as_deref())
    }

    /// The queue rides as a numeric string in the keywords; anything
    /// non-numeric reads as "no queue reported".
    fn queue_size(&self) -> Option<u32> {
        self.info
            .as_ref()
            .and_then(|info| info.queue.as_deref())
            .and_then(|queue| queue.parse().ok())
    }

    fn queue_active(&self) -> bool {
        self.queue_size().map_or(false, |size| size > 0)
    }

    fn online(&self) -> bool {
        self.info.is_some()
    }
}
