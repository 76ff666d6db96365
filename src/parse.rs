use byteorder::{ByteOrder, LittleEndian};

use crate::error::QueryError;

/// Hard cap on a single string field. A response that omits the terminator
/// must not cost unbounded work or memory.
pub const MAX_STRING_LENGTH: usize = 4096;

/// Get the value of a null-terminated string
/// with index 0 at `offset` in an array of bytes.
///
/// Mutates `offset` to the index after the null-termination byte.
/// Strings longer than [MAX_STRING_LENGTH] are truncated; the cursor still
/// advances past the terminator so subsequent reads stay aligned.
pub fn get_string(data: &[u8], offset: &mut usize) -> Result<String, QueryError> {
    let mut buf: Vec<u8> = Vec::new();
    let mut terminated = false;

    while let Some(c) = data.get(*offset) {
        *offset += 1;
        if *c == 0 {
            terminated = true;
            break;
        }
        if buf.len() < MAX_STRING_LENGTH {
            buf.push(*c);
        }
    }

    if !terminated && buf.len() < MAX_STRING_LENGTH {
        return Err(QueryError::TruncatedBuffer(*offset));
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Get the [u8] at index `offset` from `data`.
///
/// Mutates `offset` to the index after the byte.
pub fn get_u8(data: &[u8], offset: &mut usize) -> Result<u8, QueryError> {
    let byte = *data
        .get(*offset)
        .ok_or(QueryError::TruncatedBuffer(*offset))?;
    *offset += 1;
    Ok(byte)
}

/// Get 2 bytes (as a [u16]) at index `offset` from `data`.
///
/// Mutates `offset` to the index after the bytes.
pub fn get_u16(data: &[u8], offset: &mut usize) -> Result<u16, QueryError> {
    let bytes = data
        .get(*offset..*offset + 2)
        .ok_or(QueryError::TruncatedBuffer(*offset))?;
    *offset += 2;
    Ok(LittleEndian::read_u16(bytes))
}

/// Get 4 bytes (as an [i32]) at index `offset` from `data`.
///
/// Mutates `offset` to the index after the bytes.
pub fn get_i32(data: &[u8], offset: &mut usize) -> Result<i32, QueryError> {
    let bytes = data
        .get(*offset..*offset + 4)
        .ok_or(QueryError::TruncatedBuffer(*offset))?;
    *offset += 4;
    Ok(LittleEndian::read_i32(bytes))
}

/// Get 8 bytes (as a [u64]) at index `offset` from `data`.
///
/// Mutates `offset` to the index after the bytes.
pub fn get_u64(data: &[u8], offset: &mut usize) -> Result<u64, QueryError> {
    let bytes = data
        .get(*offset..*offset + 8)
        .ok_or(QueryError::TruncatedBuffer(*offset))?;
    *offset += 8;
    Ok(LittleEndian::read_u64(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_stops_at_terminator() {
        let data = b"hello\0world\0";
        let mut offset = 0;

        assert_eq!(get_string(data, &mut offset).unwrap(), "hello");
        assert_eq!(offset, 6);
        assert_eq!(get_string(data, &mut offset).unwrap(), "world");
        assert_eq!(offset, 12);
    }

    #[test]
    fn string_without_terminator_is_truncated_error() {
        let data = b"never ends";
        let mut offset = 0;

        assert!(matches!(
            get_string(data, &mut offset),
            Err(QueryError::TruncatedBuffer(_))
        ));
    }

    #[test]
    fn oversized_string_is_capped_but_cursor_stays_aligned() {
        let mut data = vec![b'x'; MAX_STRING_LENGTH + 100];
        data.push(0);
        data.push(42);
        let mut offset = 0;

        let value = get_string(&data, &mut offset).unwrap();
        assert_eq!(value.len(), MAX_STRING_LENGTH);
        // cursor sits after the terminator, not after the cap
        assert_eq!(offset, MAX_STRING_LENGTH + 101);
        assert_eq!(get_u8(&data, &mut offset).unwrap(), 42);
    }

    #[test]
    fn oversized_string_with_no_terminator_at_all_still_returns() {
        let data = vec![b'x'; MAX_STRING_LENGTH + 100];
        let mut offset = 0;

        let value = get_string(&data, &mut offset).unwrap();
        assert_eq!(value.len(), MAX_STRING_LENGTH);
        assert_eq!(offset, data.len());
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let data = [0xFF, 0xFE, b'a', 0];
        let mut offset = 0;

        let value = get_string(&data, &mut offset).unwrap();
        assert!(value.ends_with('a'));
        assert_eq!(offset, 4);
    }

    #[test]
    fn integers_are_little_endian() {
        let data = [0x39, 0x05, 0xFE, 0xFF, 0xFF, 0xFF];
        let mut offset = 0;

        assert_eq!(get_u16(&data, &mut offset).unwrap(), 1337);
        assert_eq!(get_i32(&data, &mut offset).unwrap(), -2);
    }

    #[test]
    fn u64_reads_eight_bytes() {
        let data = 90071992547409921u64.to_le_bytes();
        let mut offset = 0;

        assert_eq!(get_u64(&data, &mut offset).unwrap(), 90071992547409921);
        assert_eq!(offset, 8);
    }

    #[test]
    fn short_buffer_fails_fixed_width_reads() {
        let data = [0x01];
        let mut offset = 0;

        assert!(matches!(
            get_u16(&data, &mut offset),
            Err(QueryError::TruncatedBuffer(0))
        ));
        assert!(matches!(
            get_u64(&data, &mut offset),
            Err(QueryError::TruncatedBuffer(0))
        ));
        // failed reads must not move the cursor
        assert_eq!(offset, 0);
    }
}
