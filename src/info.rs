use log::debug;

use crate::error::QueryError;
use crate::packet::{PacketType, ResponsePacket};
use crate::parse;

const EDF_PORT: u8 = 0x80;
const EDF_STEAM_ID: u8 = 0x10;
const EDF_SOURCE_TV: u8 = 0x40;
const EDF_KEYWORDS: u8 = 0x20;
const EDF_GAME_ID: u8 = 0x01;

/// Keyword prefix DayZ servers use to report their login queue length.
const QUEUE_PREFIX: &str = "lqs";

/// Server type:
/// - `d`: Dedicated
/// - `l`: Listen (non-dedicated)
/// - `p`: SourceTV relay (proxy)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerType {
    Dedicated,
    NonDedicated,
    Proxy,
    Unknown,
}

impl From<u8> for ServerType {
    fn from(value: u8) -> Self {
        match value {
            b'd' => ServerType::Dedicated,
            b'l' => ServerType::NonDedicated,
            b'p' => ServerType::Proxy,
            _ => ServerType::Unknown,
        }
    }
}

/// Server environment:
/// - `l`: Linux
/// - `w`: Windows
/// - `m` or `o`: Mac
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Linux,
    Windows,
    Mac,
    Unknown,
}

impl From<u8> for Environment {
    fn from(value: u8) -> Self {
        match value {
            b'l' => Environment::Linux,
            b'w' => Environment::Windows,
            b'm' | b'o' => Environment::Mac,
            _ => Environment::Unknown,
        }
    }
}

/// Server information as obtained by [query](crate::query::query).
///
/// The `Option` fields are gated by the response's Extra Data Flags byte;
/// `None` means the server did not report the field, not that it is zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server hostname
    pub name: String,
    /// Current map
    pub map: String,
    /// Name of game
    pub game: String,
    /// Current players
    pub players: u8,
    /// Max players
    pub max_players: u8,
    /// Current bots
    pub bots: u8,
    pub server_type: ServerType,
    pub environment: Environment,
    /// Is the server VAC enabled?
    pub vac_enabled: bool,
    /// Game version
    pub version: String,
    /// Game port
    pub port: Option<u16>,
    /// SteamID of the server
    pub steam_id: Option<u64>,
    /// Steam ID of the game
    pub game_id: Option<u64>,
    /// Login queue length, as reported in the keywords
    pub queue: Option<String>,
    /// In-game clock, as reported in the keywords
    pub time: Option<String>,
}

/// Truncation inside the mandatory fields means the response is unusable.
fn malformed(err: QueryError) -> QueryError {
    QueryError::MalformedResponse(Box::new(err))
}

impl ServerInfo {
    /// Parse a [ResponsePacket] into its corresponding [ServerInfo].
    pub fn parse(packet: &ResponsePacket) -> Result<ServerInfo, QueryError> {
        if packet.packet_type() != &PacketType::Response {
            return Err(QueryError::UnexpectedMessageType(
                packet.packet_type().to_byte(),
            ));
        }

        let data = packet.body();
        let mut offset = 0;

        // protocol version, not surfaced
        parse::get_u8(data, &mut offset).map_err(malformed)?;

        let name = parse::get_string(data, &mut offset).map_err(malformed)?;
        let map = parse::get_string(data, &mut offset).map_err(malformed)?;
        // folder; read only to advance the cursor
        parse::get_string(data, &mut offset).map_err(malformed)?;
        let game = parse::get_string(data, &mut offset).map_err(malformed)?;

        // app id, not surfaced
        parse::get_u16(data, &mut offset).map_err(malformed)?;

        let players = parse::get_u8(data, &mut offset).map_err(malformed)?;
        let max_players = parse::get_u8(data, &mut offset).map_err(malformed)?;
        let bots = parse::get_u8(data, &mut offset).map_err(malformed)?;

        let server_type = ServerType::from(parse::get_u8(data, &mut offset).map_err(malformed)?);
        let environment = Environment::from(parse::get_u8(data, &mut offset).map_err(malformed)?);

        // visibility, not surfaced
        parse::get_u8(data, &mut offset).map_err(malformed)?;
        let vac_enabled = parse::get_u8(data, &mut offset).map_err(malformed)? == 1;

        let version = parse::get_string(data, &mut offset).map_err(malformed)?;

        let mut info = ServerInfo {
            name,
            map,
            game,
            players,
            max_players,
            bots,
            server_type,
            environment,
            vac_enabled,
            version,
            port: None,
            steam_id: None,
            game_id: None,
            queue: None,
            time: None,
        };

        if offset < data.len() {
            let edf = parse::get_u8(data, &mut offset).map_err(malformed)?;
            info.parse_extra_data(data, &mut offset, edf);
        }

        Ok(info)
    }

    /// Extra Data Flags: each set bit gates one optional field, in wire
    /// order. A field truncated mid-read ends processing; whatever was
    /// parsed before it is kept.
    fn parse_extra_data(&mut self, data: &[u8], offset: &mut usize, edf: u8) {
        if edf & EDF_PORT != 0 {
            match parse::get_u16(data, offset) {
                Ok(port) => self.port = Some(port),
                Err(_) => return,
            }
        }

        if edf & EDF_STEAM_ID != 0 {
            match parse::get_u64(data, offset) {
                Ok(steam_id) => self.steam_id = Some(steam_id),
                Err(_) => return,
            }
        }

        if edf & EDF_SOURCE_TV != 0 {
            // spectator port and name, not surfaced
            if parse::get_u16(data, offset).is_err() {
                return;
            }
            if parse::get_string(data, offset).is_err() {
                return;
            }
        }

        if edf & EDF_KEYWORDS != 0 {
            match parse::get_string(data, offset) {
                Ok(keywords) => self.parse_keywords(&keywords),
                Err(_) => return,
            }
        }

        if edf & EDF_GAME_ID != 0 {
            if let Ok(game_id) = parse::get_u64(data, offset) {
                self.game_id = Some(game_id);
            }
        }
    }

    fn parse_keywords(&mut self, keywords: &str) {
        debug!("EDF keywords: {}", keywords);
        let tokens: Vec<&str> = keywords.split(',').collect();

        if let Some(queue) = tokens.iter().find(|t| t.starts_with(QUEUE_PREFIX)) {
            if queue.len() > QUEUE_PREFIX.len() {
                self.queue = Some(queue[QUEUE_PREFIX.len()..].to_string());
            }
        }

        // DayZ convention: the in-game clock rides as the last keyword
        if let Some(last) = tokens.last() {
            self.time = Some(last.to_string());
        }
    }
}
