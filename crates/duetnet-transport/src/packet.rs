//! Datagram framing below the message layer.
//!
//! Every datagram starts with one kind byte. Only `Payload` carries message
//! bytes; the rest keep the link alive and acknowledged.

use bytes::{BufMut, Bytes, BytesMut};

use crate::TransportError;

const CONNECT_REQUEST: u8 = 1;
const CONNECT_ACCEPT: u8 = 2;
const DISCONNECT: u8 = 3;
const PAYLOAD: u8 = 4;
const ACK: u8 = 5;
const HEARTBEAT: u8 = 6;

/// Bytes a `Payload` packet adds in front of the message: kind and seq.
pub(crate) const PAYLOAD_HEADER: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Packet<'a> {
    ConnectRequest,
    ConnectAccept,
    Disconnect,
    /// `[u16 seq][message bytes]`
    Payload { seq: u16, body: &'a [u8] },
    /// `[u16 next_expected]`, acknowledging everything before it.
    Ack { next_expected: u16 },
    Heartbeat,
}

impl<'a> Packet<'a> {
    pub(crate) fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PAYLOAD_HEADER + self.body_len());
        match *self {
            Packet::ConnectRequest => buf.put_u8(CONNECT_REQUEST),
            Packet::ConnectAccept => buf.put_u8(CONNECT_ACCEPT),
            Packet::Disconnect => buf.put_u8(DISCONNECT),
            Packet::Payload { seq, body } => {
                buf.put_u8(PAYLOAD);
                buf.put_u16_le(seq);
                buf.put_slice(body);
            }
            Packet::Ack { next_expected } => {
                buf.put_u8(ACK);
                buf.put_u16_le(next_expected);
            }
            Packet::Heartbeat => buf.put_u8(HEARTBEAT),
        }
        buf.freeze()
    }

    pub(crate) fn decode(datagram: &'a [u8]) -> Result<Self, TransportError> {
        let (&kind, rest) = datagram
            .split_first()
            .ok_or(TransportError::Malformed("empty datagram"))?;
        match kind {
            CONNECT_REQUEST => Ok(Packet::ConnectRequest),
            CONNECT_ACCEPT => Ok(Packet::ConnectAccept),
            DISCONNECT => Ok(Packet::Disconnect),
            PAYLOAD => {
                let (seq, body) = split_u16(rest)?;
                Ok(Packet::Payload { seq, body })
            }
            ACK => {
                let (next_expected, _) = split_u16(rest)?;
                Ok(Packet::Ack { next_expected })
            }
            HEARTBEAT => Ok(Packet::Heartbeat),
            _ => Err(TransportError::Malformed("unknown packet kind")),
        }
    }

    fn body_len(&self) -> usize {
        match self {
            Packet::Payload { body, .. } => body.len(),
            _ => 0,
        }
    }
}

fn split_u16(bytes: &[u8]) -> Result<(u16, &[u8]), TransportError> {
    match bytes {
        [lo, hi, rest @ ..] => Ok((u16::from_le_bytes([*lo, *hi]), rest)),
        _ => Err(TransportError::Malformed("missing sequence number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_layout() {
        let bytes = Packet::Payload {
            seq: 0x0102,
            body: &[9, 8],
        }
        .encode();
        assert_eq!(&bytes[..], &[4, 0x02, 0x01, 9, 8]);
        assert_eq!(
            Packet::decode(&bytes).unwrap(),
            Packet::Payload {
                seq: 0x0102,
                body: &[9, 8]
            }
        );
    }

    #[test]
    fn test_ack_decodes() {
        let bytes = Packet::Ack { next_expected: 7 }.encode();
        assert_eq!(Packet::decode(&bytes).unwrap(), Packet::Ack { next_expected: 7 });
    }

    #[test]
    fn test_malformed_datagrams_are_rejected() {
        assert!(Packet::decode(&[]).is_err());
        assert!(Packet::decode(&[99]).is_err());
        assert!(Packet::decode(&[PAYLOAD, 1]).is_err());
    }
}
