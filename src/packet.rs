use byteorder::{ByteOrder, LittleEndian};

use crate::error::QueryError;
use crate::parse;

/// According to the Valve wiki, Source query responses use 1400 bytes + IP/UDP
/// headers. DayZ servers with long mod lists split their responses instead of
/// honoring that, so receive buffers are sized generously.
pub const RECV_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketHeader {
    Single,
    Split,
}

/// Convert the leading i32 of a datagram into a [PacketHeader].
impl TryFrom<i32> for PacketHeader {
    type Error = QueryError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(PacketHeader::Single),
            -2 => Ok(PacketHeader::Split),
            n => Err(QueryError::InvalidHeader(n)),
        }
    }
}

/// For packing a [PacketHeader] into a packet in [RequestPacket::pack].
impl PacketHeader {
    pub fn to_le_bytes(&self) -> [u8; 4] {
        let type_value: i32 = match self {
            PacketHeader::Single => -1,
            PacketHeader::Split => -2,
        };
        type_value.to_le_bytes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// A2S_INFO Request -- https://developer.valvesoftware.com/wiki/Server_queries#A2S_INFO
    ///
    /// Retrieves information about the server including, but not limited to:
    /// its name, the map currently being played, and the number of players.
    Request,
    /// S2C_CHALLENGE
    ///
    /// The server may reply with a challenge to the client using S2C_CHALLENGE
    /// ('A' or 0x41). In that case, the client should repeat the request by
    /// appending the challenge number.
    Challenge,
    /// A2S_INFO Response Packet -- https://developer.valvesoftware.com/wiki/Server_queries#A2S_INFO
    ///
    /// To be parsed by [ServerInfo::parse](crate::info::ServerInfo::parse).
    Response,
}

/// Convert a u8 into a [PacketType].
impl TryFrom<u8> for PacketType {
    type Error = QueryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x54 => Ok(PacketType::Request),
            0x41 => Ok(PacketType::Challenge),
            0x49 => Ok(PacketType::Response),
            n => Err(QueryError::UnexpectedMessageType(n)),
        }
    }
}

/// For packing a [PacketType] into a packet in [RequestPacket::pack].
impl PacketType {
    pub fn to_byte(&self) -> u8 {
        match self {
            PacketType::Request => 0x54,
            PacketType::Challenge => 0x41,
            PacketType::Response => 0x49,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct RequestPacket {
    packet_header: PacketHeader,
    packet_type: PacketType,
    body: String,
    challenge: Option<i32>,
}

impl RequestPacket {
    pub fn new(challenge: Option<i32>) -> Self {
        RequestPacket {
            packet_header: PacketHeader::Single,
            packet_type: PacketType::Request,
            body: "Source Engine Query".to_owned(),
            challenge,
        }
    }

    /// Serializes a request packet into an array of bytes.
    pub fn pack(&self) -> Vec<u8> {
        // packet structure: header, type, body, terminator (and challenge)
        let mut payload: Vec<u8> = Vec::new();
        payload.extend_from_slice(&self.packet_header.to_le_bytes());
        payload.push(self.packet_type.to_byte());
        payload.extend_from_slice(self.body.as_bytes());
        // null terminate the body
        payload.push(0);
        if let Some(challenge) = self.challenge {
            payload.extend_from_slice(&challenge.to_le_bytes());
        }

        payload
    }
}

/// A fully reassembled response, split into its type marker and body.
/// The body starts at the protocol version byte for info responses and at
/// the challenge token for challenge responses.
#[derive(Debug, PartialEq, Eq)]
pub struct ResponsePacket {
    packet_type: PacketType,
    body: Vec<u8>,
}

impl ResponsePacket {
    const TYPE_OFFSET: usize = 4;
    const BODY_OFFSET: usize = 5;

    /// Deserializes a reassembled response, splitting it up into header and body.
    ///
    /// Split responses must be reassembled (see [FragmentBuffer]) before they
    /// are unpacked; the concatenated payload carries its own `Single` header.
    pub fn unpack(data: &[u8]) -> Result<Self, QueryError> {
        if data.len() < Self::BODY_OFFSET {
            return Err(QueryError::TruncatedBuffer(data.len()));
        }

        let raw_header = LittleEndian::read_i32(&data[..4]);
        if PacketHeader::try_from(raw_header)? != PacketHeader::Single {
            return Err(QueryError::InvalidHeader(raw_header));
        }

        let raw_type = data[Self::TYPE_OFFSET];
        let packet_type = PacketType::try_from(raw_type)?;
        if packet_type == PacketType::Request {
            // servers never send requests back
            return Err(QueryError::UnexpectedMessageType(raw_type));
        }

        Ok(ResponsePacket {
            packet_type,
            body: data[Self::BODY_OFFSET..].to_vec(),
        })
    }

    pub fn packet_type(&self) -> &PacketType {
        &self.packet_type
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Challenge token carried by an S2C_CHALLENGE response.
    pub fn challenge(&self) -> Result<i32, QueryError> {
        let mut offset = 0;
        parse::get_i32(&self.body, &mut offset)
    }
}

/// One datagram of a split (multi-packet) response.
#[derive(Debug, PartialEq, Eq)]
pub struct SplitFragment {
    pub id: i32,
    pub total: u8,
    pub number: u8,
    pub payload: Vec<u8>,
}

impl SplitFragment {
    /// Deserializes the split sub-header and payload of one datagram.
    pub fn unpack(data: &[u8]) -> Result<Self, QueryError> {
        let mut offset = 0;

        let raw_header = parse::get_i32(data, &mut offset)?;
        if PacketHeader::try_from(raw_header)? != PacketHeader::Split {
            return Err(QueryError::InvalidHeader(raw_header));
        }

        let id = parse::get_i32(data, &mut offset)?;
        // the sign bit marks bzip2-compressed payloads, which we reject
        if id < 0 {
            return Err(QueryError::UnsupportedCompression);
        }

        let total = parse::get_u8(data, &mut offset)?;
        let number = parse::get_u8(data, &mut offset)?;
        // 2 reserved bytes (split size), unused
        parse::get_u16(data, &mut offset)?;

        Ok(SplitFragment {
            id,
            total,
            number,
            payload: data[offset..].to_vec(),
        })
    }
}

/// What [FragmentBuffer::insert] did with a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Stored,
    IdMismatch,
    IndexOutOfRange,
    Duplicate,
}

/// Reassembly arena for one split response: one slot per fragment index,
/// each filled at most once.
#[derive(Debug)]
pub struct FragmentBuffer {
    id: i32,
    slots: Vec<Option<Vec<u8>>>,
    filled: usize,
}

impl FragmentBuffer {
    /// Upper bound on fragments per response. A corrupt or hostile count
    /// must not drive allocation.
    pub const MAX_FRAGMENTS: u8 = 32;

    pub fn new(id: i32, total: u8) -> Result<Self, QueryError> {
        if total == 0 || total > Self::MAX_FRAGMENTS {
            return Err(QueryError::InvalidFragmentCount(total));
        }

        Ok(FragmentBuffer {
            id,
            slots: vec![None; total as usize],
            filled: 0,
        })
    }

    pub fn total(&self) -> u8 {
        self.slots.len() as u8
    }

    /// Files `fragment` into its slot. Fragments from another response,
    /// out-of-range indices and duplicates are reported, not stored.
    pub fn insert(&mut self, fragment: SplitFragment) -> InsertOutcome {
        if fragment.id != self.id {
            return InsertOutcome::IdMismatch;
        }

        let index = fragment.number as usize;
        if index >= self.slots.len() {
            return InsertOutcome::IndexOutOfRange;
        }
        if self.slots[index].is_some() {
            return InsertOutcome::Duplicate;
        }

        self.slots[index] = Some(fragment.payload);
        self.filled += 1;
        InsertOutcome::Stored
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// Concatenates the slots in index order into the response payload.
    /// An unfilled slot here means the receive loop exited early.
    pub fn assemble(self) -> Result<Vec<u8>, QueryError> {
        let mut payload: Vec<u8> = Vec::new();
        for slot in self.slots {
            match slot {
                Some(part) => payload.extend_from_slice(&part),
                None => return Err(QueryError::IncompleteMultiPacket),
            }
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_datagram(id: i32, total: u8, number: u8, payload: &[u8]) -> Vec<u8> {
        let mut data = PacketHeader::Split.to_le_bytes().to_vec();
        data.extend_from_slice(&id.to_le_bytes());
        data.push(total);
        data.push(number);
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn request_packs_header_body_and_terminator() {
        let packed = RequestPacket::new(None).pack();

        assert_eq!(&packed[..5], &[0xFF, 0xFF, 0xFF, 0xFF, 0x54]);
        assert_eq!(&packed[5..], b"Source Engine Query\0");
    }

    #[test]
    fn request_appends_challenge_little_endian() {
        let packed = RequestPacket::new(Some(0x0403_0201)).pack();

        assert_eq!(&packed[packed.len() - 4..], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(packed.len(), RequestPacket::new(None).pack().len() + 4);
    }

    #[test]
    fn unpack_rejects_unknown_header() {
        let data = [0x00, 0x00, 0x00, 0x00, 0x49, 0x00];

        assert!(matches!(
            ResponsePacket::unpack(&data),
            Err(QueryError::InvalidHeader(0))
        ));
    }

    #[test]
    fn unpack_rejects_unknown_type() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0x7A, 0x00];

        assert!(matches!(
            ResponsePacket::unpack(&data),
            Err(QueryError::UnexpectedMessageType(0x7A))
        ));
    }

    #[test]
    fn unpack_reads_challenge_token() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0x41, 0x0A, 0x0B, 0x0C, 0x0D];

        let packet = ResponsePacket::unpack(&data).unwrap();
        assert_eq!(packet.packet_type(), &PacketType::Challenge);
        assert_eq!(packet.challenge().unwrap(), 0x0D0C_0B0A);
    }

    #[test]
    fn split_fragment_unpacks_sub_header() {
        let data = split_datagram(77, 3, 1, b"abc");

        let fragment = SplitFragment::unpack(&data).unwrap();
        assert_eq!(fragment.id, 77);
        assert_eq!(fragment.total, 3);
        assert_eq!(fragment.number, 1);
        assert_eq!(fragment.payload, b"abc");
    }

    #[test]
    fn compressed_split_is_rejected() {
        let data = split_datagram(-77, 3, 1, b"abc");

        assert!(matches!(
            SplitFragment::unpack(&data),
            Err(QueryError::UnsupportedCompression)
        ));
    }

    #[test]
    fn fragment_count_bounds_are_enforced() {
        assert!(matches!(
            FragmentBuffer::new(1, 0),
            Err(QueryError::InvalidFragmentCount(0))
        ));
        assert!(matches!(
            FragmentBuffer::new(1, 33),
            Err(QueryError::InvalidFragmentCount(33))
        ));
        assert!(FragmentBuffer::new(1, 32).is_ok());
    }

    #[test]
    fn reassembly_is_order_independent() {
        let parts: [&[u8]; 3] = [b"one", b"two", b"three"];

        let mut in_order = FragmentBuffer::new(9, 3).unwrap();
        for (number, part) in parts.iter().enumerate() {
            let fragment = SplitFragment::unpack(&split_datagram(9, 3, number as u8, part)).unwrap();
            assert_eq!(in_order.insert(fragment), InsertOutcome::Stored);
        }

        let mut shuffled = FragmentBuffer::new(9, 3).unwrap();
        for number in [2usize, 0, 1] {
            let fragment =
                SplitFragment::unpack(&split_datagram(9, 3, number as u8, parts[number])).unwrap();
            assert_eq!(shuffled.insert(fragment), InsertOutcome::Stored);
        }

        assert!(shuffled.is_complete());
        assert_eq!(in_order.assemble().unwrap(), shuffled.assemble().unwrap());
    }

    #[test]
    fn duplicates_and_strays_are_rejected() {
        let mut buffer = FragmentBuffer::new(9, 2).unwrap();

        let fragment = SplitFragment::unpack(&split_datagram(9, 2, 0, b"one")).unwrap();
        assert_eq!(buffer.insert(fragment), InsertOutcome::Stored);

        let duplicate = SplitFragment::unpack(&split_datagram(9, 2, 0, b"corrupt")).unwrap();
        assert_eq!(buffer.insert(duplicate), InsertOutcome::Duplicate);

        let stray = SplitFragment::unpack(&split_datagram(10, 2, 1, b"two")).unwrap();
        assert_eq!(buffer.insert(stray), InsertOutcome::IdMismatch);

        let out_of_range = SplitFragment::unpack(&split_datagram(9, 2, 5, b"two")).unwrap();
        assert_eq!(buffer.insert(out_of_range), InsertOutcome::IndexOutOfRange);

        assert!(!buffer.is_complete());

        let fragment = SplitFragment::unpack(&split_datagram(9, 2, 1, b"two")).unwrap();
        assert_eq!(buffer.insert(fragment), InsertOutcome::Stored);
        assert_eq!(buffer.assemble().unwrap(), b"onetwo");
    }

    #[test]
    fn assemble_with_missing_slot_fails() {
        let mut buffer = FragmentBuffer::new(9, 2).unwrap();
        let fragment = SplitFragment::unpack(&split_datagram(9, 2, 0, b"one")).unwrap();
        buffer.insert(fragment);

        assert!(matches!(
            buffer.assemble(),
            Err(QueryError::IncompleteMultiPacket)
        ));
    }
}
