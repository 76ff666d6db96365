use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::error::QueryError;
use crate::info::ServerInfo;
use crate::packet::{
    FragmentBuffer, InsertOutcome, PacketHeader, PacketType, RequestPacket, ResponsePacket,
    SplitFragment, RECV_BUFFER_SIZE,
};

/// Per-receive window. One query may wait this long several times over:
/// once per datagram, for every challenge retry.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// How often a challenge is absolved before the server is written off.
const MAX_CHALLENGE_RETRIES: u32 = 2;

/// Query `host` with the Source Query Protocol A2S_INFO query.
///
/// If `timeout_dur` is `Some(Duration)`, each `timeout()` will use `timeout_dur`.
/// The default is 5 seconds if `timeout_dur` is `None`.
///
/// Note that this timeout duration can occur several times per query:
/// - On socket connect
/// - On packet send
/// - On every datagram receive (split responses receive once per fragment)
/// - On each of the above again for every challenge retry
///
/// Example usage:
/// ```no_run
/// # use rsourcestatus::{error::QueryError, info::ServerInfo, query::query};
/// # async fn example() -> Result<(), QueryError> {
/// let info: ServerInfo = query("192.168.1.2", 27016, None).await?;
/// # Ok(())
/// # }
/// ```
pub async fn query(
    host: &str,
    port: u16,
    timeout_dur: Option<Duration>,
) -> Result<ServerInfo, QueryError> {
    let timeout_dur: Duration = timeout_dur.unwrap_or(DEFAULT_TIMEOUT);

    // just arbitrarily bind any port, doesn't matter really
    let sock: UdpSocket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(QueryError::FailedPortBind)?;

    // connecting
    timeout(timeout_dur, sock.connect((host, port)))
        .await?
        .map_err(QueryError::UnknownHost)?;

    // sending initial packet
    let mut packet: ResponsePacket = send_recv(&sock, RequestPacket::new(None), timeout_dur).await?;

    // absolving challenges, within budget
    let mut retries = 0;
    while packet.packet_type() == &PacketType::Challenge && retries < MAX_CHALLENGE_RETRIES {
        let challenge = packet
            .challenge()
            .map_err(|err| QueryError::MalformedResponse(Box::new(err)))?;
        debug!("received A2S challenge {} from {}:{}", challenge, host, port);

        packet = send_recv(&sock, RequestPacket::new(Some(challenge)), timeout_dur).await?;
        retries += 1;
    }

    if packet.packet_type() == &PacketType::Challenge {
        return Err(QueryError::ChallengeLoopExceeded);
    }

    ServerInfo::parse(&packet)
}

async fn send_recv(
    sock: &UdpSocket,
    packet: RequestPacket,
    timeout_dur: Duration,
) -> Result<ResponsePacket, QueryError> {
    // sending
    timeout(timeout_dur, sock.send(&packet.pack()))
        .await?
        .map_err(QueryError::SendError)?;

    // receiving, reassembling if the response arrives split
    let payload = recv_response(sock, timeout_dur).await?;
    ResponsePacket::unpack(&payload)
}

/// Receive one full response payload, reassembling split responses.
async fn recv_response(sock: &UdpSocket, timeout_dur: Duration) -> Result<Vec<u8>, QueryError> {
    let first = recv_datagram(sock, timeout_dur).await?;
    if first.len() < 4 {
        return Err(QueryError::TruncatedBuffer(first.len()));
    }

    match PacketHeader::try_from(LittleEndian::read_i32(&first[..4]))? {
        PacketHeader::Single => Ok(first),
        PacketHeader::Split => recv_split(sock, timeout_dur, &first).await,
    }
}

/// Collect the remaining fragments of a split response into one payload.
///
/// Datagrams that do not belong to this response are discarded; only the
/// first fragment's sub-header decides the outcome hard.
async fn recv_split(
    sock: &UdpSocket,
    timeout_dur: Duration,
    first: &[u8],
) -> Result<Vec<u8>, QueryError> {
    let fragment = SplitFragment::unpack(first)?;
    let total = fragment.total;

    let mut buffer = FragmentBuffer::new(fragment.id, total)?;
    if buffer.insert(fragment) != InsertOutcome::Stored {
        return Err(QueryError::IncompleteMultiPacket);
    }

    while !buffer.is_complete() {
        let datagram = match recv_datagram(sock, timeout_dur).await {
            Ok(datagram) => datagram,
            // the window closed with slots still open
            Err(QueryError::Timeout(_)) => return Err(QueryError::IncompleteMultiPacket),
            Err(other) => return Err(other),
        };

        let fragment = match SplitFragment::unpack(&datagram) {
            Ok(fragment) => fragment,
            Err(err) => {
                warn!("discarding datagram in split response: {}", err);
                continue;
            }
        };

        if fragment.total != total {
            warn!(
                "total fragment count differs between packets: {} vs {}",
                total, fragment.total
            );
        }

        match buffer.insert(fragment) {
            InsertOutcome::Stored => {}
            outcome => warn!("discarding split fragment: {:?}", outcome),
        }
    }

    buffer.assemble()
}

async fn recv_datagram(sock: &UdpSocket, timeout_dur: Duration) -> Result<Vec<u8>, QueryError> {
    let mut resp_buf = [0u8; RECV_BUFFER_SIZE];
    let len = timeout(timeout_dur, sock.recv(&mut resp_buf))
        .await?
        .map_err(QueryError::ReceiveError)?;

    Ok(resp_buf[..len].to_vec())
}
