//! Message codec: delimiter-separated byte fields.
//!
//! A decrypted frame payload is `field_0 SEP field_1 SEP ... SEP field_n`
//! with `SEP = 0x00`; field 0 is the event code. Fields must not contain
//! the separator. Handlers whose payload is binary (and so may contain it)
//! are dispatched in raw mode: only the first split is performed and the
//! handler parses the remainder itself.

use deskhand_types::Event;

/// The reserved field separator.
pub const SEPARATOR: u8 = 0x00;

/// One decoded message: the full field split plus the raw remainder after
/// the event code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    fields: Vec<Vec<u8>>,
    raw: Vec<u8>,
}

impl Message {
    /// Decode a frame payload. Never fails: an empty payload decodes to a
    /// message with an empty code, which no registry entry matches.
    #[must_use]
    pub fn decode(payload: &[u8]) -> Self {
        let fields = payload
            .split(|byte| *byte == SEPARATOR)
            .map(<[u8]>::to_vec)
            .collect();
        let raw = match payload.iter().position(|byte| *byte == SEPARATOR) {
            Some(at) => payload[at + 1..].to_vec(),
            None => Vec::new(),
        };
        Self { fields, raw }
    }

    /// Join fields with the separator into a frame payload.
    #[must_use]
    pub fn encode(fields: &[&[u8]]) -> Vec<u8> {
        fields.join(&SEPARATOR)
    }

    /// The code field as raw bytes.
    #[must_use]
    pub fn code_bytes(&self) -> &[u8] {
        &self.fields[0]
    }

    /// The decoded event, if the code is known.
    #[must_use]
    pub fn event(&self) -> Option<Event> {
        Event::from_wire(self.code_bytes())
    }

    /// All fields after the event code.
    #[must_use]
    pub fn fields(&self) -> &[Vec<u8>] {
        &self.fields[1..]
    }

    /// Everything after the event code with only one split performed;
    /// separator bytes inside are preserved.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

/// Encode an integer as its minimal big-endian byte string; zero encodes
/// as the empty string.
#[must_use]
pub fn encode_uint(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|byte| *byte != 0).unwrap_or(8);
    bytes[start..].to_vec()
}

/// Decode a big-endian byte string; the empty string is zero. Values wider
/// than eight bytes wrap.
#[must_use]
pub fn decode_uint(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let payload = Message::encode(&[b"LSRQ", b"/tmp", b"extra"]);
        let msg = Message::decode(&payload);
        assert_eq!(msg.event(), Some(Event::ListRequest));
        assert_eq!(msg.fields(), &[b"/tmp".to_vec(), b"extra".to_vec()]);
    }

    #[test]
    fn code_only_message() {
        let msg = Message::decode(b"SUCC");
        assert_eq!(msg.event(), Some(Event::Success));
        assert!(msg.fields().is_empty());
        assert!(msg.raw().is_empty());
    }

    #[test]
    fn empty_fields_survive() {
        let payload = Message::encode(&[b"ERRR", b"", b"ctx"]);
        let msg = Message::decode(&payload);
        assert_eq!(msg.fields(), &[b"".to_vec(), b"ctx".to_vec()]);
    }

    #[test]
    fn raw_keeps_separators_in_the_tail() {
        let chunk = b"bin\x00ary\x00bytes";
        let mut payload = b"UPCK\x00name\x00".to_vec();
        payload.extend_from_slice(&encode_uint(3));
        payload.push(SEPARATOR);
        payload.extend_from_slice(chunk);

        let msg = Message::decode(&payload);
        assert_eq!(msg.event(), Some(Event::UploadChunk));

        let mut parts = msg.raw().splitn(3, |byte| *byte == SEPARATOR);
        assert_eq!(parts.next(), Some(&b"name"[..]));
        assert_eq!(parts.next().map(decode_uint), Some(3));
        assert_eq!(parts.next(), Some(&chunk[..]));
    }

    #[test]
    fn empty_payload_has_no_event() {
        let msg = Message::decode(b"");
        assert!(msg.code_bytes().is_empty());
        assert_eq!(msg.event(), None);
        assert!(msg.fields().is_empty());
    }

    #[test]
    fn uint_minimal_big_endian() {
        assert_eq!(encode_uint(0), b"");
        assert_eq!(encode_uint(3), b"\x03");
        assert_eq!(encode_uint(256), b"\x01\x00");
        assert_eq!(encode_uint(u64::from(u32::MAX)), vec![0xFF; 4]);
    }

    #[test]
    fn uint_decode_inverts_encode() {
        for value in [0u64, 1, 255, 256, 65_535, 1 << 40, u64::MAX] {
            assert_eq!(decode_uint(&encode_uint(value)), value);
        }
    }
}
