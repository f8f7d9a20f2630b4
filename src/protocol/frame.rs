use crate::error::ProtocolError;

use super::checksum::checksum;
use super::commands::{
    CHECKSUM_ACCEPTED, DATA_TYPE_ACK, END_MARKER, ESCAPE_MARKER, START_MARKER,
};

/// Size of the unescaped header: data type + sequence number + payload length.
pub const HEADER_SIZE: usize = 6;

/// Reserved byte -> substitute sent after [`ESCAPE_MARKER`].
/// Used in both directions, so the mapping must stay a bijection.
const ESCAPES: [(u8, u8); 3] = [
    (END_MARKER, 0x2C),
    (ESCAPE_MARKER, 0x2D),
    (START_MARKER, 0x2E),
];

fn substitute(raw: u8) -> Option<u8> {
    ESCAPES.iter().find(|(r, _)| *r == raw).map(|(_, s)| *s)
}

fn restore(sub: u8) -> Option<u8> {
    ESCAPES.iter().find(|(_, s)| *s == sub).map(|(r, _)| *r)
}

/// Escape every reserved marker byte in `block`.
pub fn escape(block: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(block.len() + 4);
    for &b in block {
        match substitute(b) {
            Some(sub) => {
                out.push(ESCAPE_MARKER);
                out.push(sub);
            }
            None => out.push(b),
        }
    }
    out
}

/// Reverse [`escape`].
pub fn unescape(body: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::with_capacity(body.len());
    let mut bytes = body.iter().copied();
    while let Some(b) = bytes.next() {
        if b != ESCAPE_MARKER {
            out.push(b);
            continue;
        }
        let sub = bytes.next().ok_or(ProtocolError::DanglingEscape)?;
        out.push(restore(sub).ok_or(ProtocolError::InvalidEscape(sub))?);
    }
    Ok(out)
}

/// One protocol frame.
///
/// Wire format:
/// ```text
/// [0x3E] escaped([data_type] [seq] [length: 4 bytes BE] [payload...] [checksum]) [0x3C]
/// ```
///
/// `length` covers the payload only. `checksum` is the 8-bit sum of every
/// byte before it in the unescaped block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data_type: u8,
    pub seq: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(data_type: u8, seq: u8, payload: &[u8]) -> Self {
        Self {
            data_type,
            seq,
            payload: payload.to_vec(),
        }
    }

    /// Unescaped header + payload + checksum.
    pub fn block(&self) -> Result<Vec<u8>, ProtocolError> {
        let length = u32::try_from(self.payload.len())
            .map_err(|_| ProtocolError::PayloadTooLarge(self.payload.len()))?;

        let mut block = Vec::with_capacity(HEADER_SIZE + self.payload.len() + 1);
        block.push(self.data_type);
        block.push(self.seq);
        block.extend_from_slice(&length.to_be_bytes());
        block.extend_from_slice(&self.payload);
        block.push(checksum(&block));
        Ok(block)
    }

    /// Serialize this frame for transmission.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let body = escape(&self.block()?);
        let mut result = Vec::with_capacity(body.len() + 2);
        result.push(START_MARKER);
        result.extend_from_slice(&body);
        result.push(END_MARKER);
        Ok(result)
    }

    /// Parse a complete wire frame, verifying length and checksum.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        let body = match data {
            [START_MARKER, body @ .., END_MARKER] => body,
            _ => return Err(ProtocolError::MissingMarker),
        };
        let block = unescape(body)?;
        if block.len() < HEADER_SIZE + 1 {
            return Err(ProtocolError::LengthMismatch {
                declared: 0,
                actual: block.len(),
            });
        }

        let (content, carried) = block.split_at(block.len() - 1);
        let carried = carried[0];
        let computed = checksum(content);
        if computed != carried {
            return Err(ProtocolError::ChecksumMismatch { computed, carried });
        }

        let declared =
            u32::from_be_bytes([content[2], content[3], content[4], content[5]]) as usize;
        let payload = &content[HEADER_SIZE..];
        if declared != payload.len() {
            return Err(ProtocolError::LengthMismatch {
                declared,
                actual: payload.len(),
            });
        }

        Ok(Self::new(content[0], content[1], payload))
    }
}

/// Minimum acknowledgement contract, checked on the raw reply buffer:
/// byte 1 is the ACK data type and the byte before the end marker is the
/// accepted-checksum value.
pub fn check_reply(reply: &[u8]) -> Result<(), ProtocolError> {
    if reply.len() < 2 {
        return Err(ProtocolError::ReplyTooShort { len: reply.len() });
    }
    if reply[1] != DATA_TYPE_ACK {
        return Err(ProtocolError::NotAcknowledged { got: reply[1] });
    }
    let marker = reply[reply.len() - 2];
    if marker != CHECKSUM_ACCEPTED {
        return Err(ProtocolError::ChecksumRejected { got: marker });
    }
    Ok(())
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "type=0x{:02X} seq={} payload={}",
            self.data_type,
            self.seq,
            hex::encode(&self.payload)
        )
    }
}

/// Hex rendering for logs and dry-run output.
pub mod hex {
    pub fn encode(data: &[u8]) -> String {
        data.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::commands::DATA_TYPE_COMMAND;

    const RESERVED: [u8; 3] = [START_MARKER, END_MARKER, ESCAPE_MARKER];

    #[test]
    fn test_escape_roundtrip_with_markers() {
        let blocks: Vec<Vec<u8>> = vec![
            vec![],
            vec![0x00, 0x01, 0x02],
            vec![START_MARKER],
            vec![END_MARKER, 0x10, ESCAPE_MARKER],
            RESERVED.repeat(5),
            vec![0x2C, 0x2D, 0x2E, ESCAPE_MARKER, 0x2D, 0x3E, 0x3E],
            (0..=255u8).collect(),
        ];
        for block in blocks {
            assert_eq!(unescape(&escape(&block)).unwrap(), block);
        }
    }

    #[test]
    fn test_escaped_body_has_no_start_or_end_marker() {
        let block: Vec<u8> = (0..=255u8).collect();
        let body = escape(&block);
        assert!(!body.contains(&START_MARKER));
        assert!(!body.contains(&END_MARKER));
        // Each reserved byte costs exactly one extra byte
        assert_eq!(body.len(), block.len() + RESERVED.len());
    }

    #[test]
    fn test_escape_substitutes() {
        assert_eq!(escape(&[0x3E]), vec![0x3D, 0x2E]);
        assert_eq!(escape(&[0x3D]), vec![0x3D, 0x2D]);
        assert_eq!(escape(&[0x3C]), vec![0x3D, 0x2C]);
    }

    #[test]
    fn test_unescape_rejects_bad_sequences() {
        assert_eq!(unescape(&[0x01, ESCAPE_MARKER]), Err(ProtocolError::DanglingEscape));
        assert_eq!(
            unescape(&[ESCAPE_MARKER, 0x41]),
            Err(ProtocolError::InvalidEscape(0x41))
        );
    }

    #[test]
    fn test_frame_format() {
        let frame = Frame::new(DATA_TYPE_COMMAND, 0, &[104, 2, 17, 1, 2, 1, 0, 0]);
        let bytes = frame.to_bytes().unwrap();

        assert_eq!(bytes[0], START_MARKER);
        assert_eq!(bytes[bytes.len() - 1], END_MARKER);
        assert_eq!(
            frame.block().unwrap(),
            vec![0x0C, 0x00, 0x00, 0x00, 0x00, 0x08, 104, 2, 17, 1, 2, 1, 0, 0, 0x93]
        );
        // No reserved bytes in this block, so the body is sent verbatim
        assert_eq!(&bytes[1..bytes.len() - 1], frame.block().unwrap().as_slice());
    }

    #[test]
    fn test_checksum_is_sum_of_preceding_bytes() {
        let frame = Frame::new(DATA_TYPE_COMMAND, 200, &[0xFF, 0x80, 0x3E, 0x3C]);
        let block = frame.block().unwrap();
        let (content, carried) = block.split_at(block.len() - 1);
        let sum: u32 = content.iter().map(|&b| b as u32).sum();
        assert_eq!(carried[0], (sum % 256) as u8);
    }

    #[test]
    fn test_roundtrip_with_reserved_bytes() {
        let frame = Frame::new(DATA_TYPE_COMMAND, 0x3E, &[0x3C, 0x3D, 0x3E, 0x00]);
        let parsed = Frame::from_bytes(&frame.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_empty_payload() {
        let frame = Frame::new(DATA_TYPE_ACK, 1, &[]);
        let bytes = frame.to_bytes().unwrap();
        assert_eq!(bytes, vec![0x3E, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x02, 0x3C]);
        assert_eq!(Frame::from_bytes(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_corrupted_payload_detected() {
        let frame = Frame::new(DATA_TYPE_COMMAND, 3, &[104, 2, 17, 1, 2, 1, 0, 0]);
        let clean = frame.to_bytes().unwrap();
        for idx in 1 + HEADER_SIZE..clean.len() - 2 {
            let mut bytes = clean.clone();
            // Flip the low bit; stays clear of marker values for this payload
            bytes[idx] ^= 0x01;
            assert!(
                matches!(
                    Frame::from_bytes(&bytes),
                    Err(ProtocolError::ChecksumMismatch { .. })
                ),
                "corruption at {} not detected",
                idx
            );
        }
    }

    #[test]
    fn test_from_bytes_rejects_missing_markers() {
        assert_eq!(Frame::from_bytes(&[]), Err(ProtocolError::MissingMarker));
        assert_eq!(
            Frame::from_bytes(&[0x01, 0x01, 0x02, 0x3C]),
            Err(ProtocolError::MissingMarker)
        );
    }

    #[test]
    fn test_from_bytes_rejects_length_mismatch() {
        // Declares 2 payload bytes but carries 1
        let mut block = vec![0x0C, 0x00, 0x00, 0x00, 0x00, 0x02, 0x07];
        block.push(checksum(&block));
        let mut bytes = vec![START_MARKER];
        bytes.extend(escape(&block));
        bytes.push(END_MARKER);
        assert_eq!(
            Frame::from_bytes(&bytes),
            Err(ProtocolError::LengthMismatch {
                declared: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_check_reply_accepts_ack() {
        let ack = Frame::new(DATA_TYPE_ACK, 1, &[]).to_bytes().unwrap();
        assert_eq!(check_reply(&ack), Ok(()));
    }

    #[test]
    fn test_check_reply_rejections() {
        assert_eq!(check_reply(&[]), Err(ProtocolError::ReplyTooShort { len: 0 }));
        assert_eq!(check_reply(&[0x3E]), Err(ProtocolError::ReplyTooShort { len: 1 }));
        assert_eq!(
            check_reply(&[0x3E, 0x0C, 0x02, 0x3C]),
            Err(ProtocolError::NotAcknowledged { got: 0x0C })
        );
        assert_eq!(
            check_reply(&[0x3E, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x3C]),
            Err(ProtocolError::ChecksumRejected { got: 0x07 })
        );
    }

    #[test]
    fn test_display() {
        let frame = Frame::new(DATA_TYPE_COMMAND, 5, &[0xAB, 0x01]);
        assert_eq!(frame.to_string(), "type=0x0C seq=5 payload=ab01");
    }
}
