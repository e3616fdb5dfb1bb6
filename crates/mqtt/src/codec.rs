//! MQTT 3.1.1 packet framing.
//!
//! Encodes the packets a subscribing client sends (CONNECT, SUBSCRIBE,
//! acknowledgements, PINGREQ, DISCONNECT) and decodes the packets a broker
//! sends back. Packet types a subscriber never expects decode to
//! [`Packet::Other`] so the stream stays in sync.

/// Protocol level byte for MQTT 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;

/// Largest value the variable-length "remaining length" field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Largest incoming packet [`decode`] accepts, header included. Payloads are
/// only counted, so anything bigger is refused before it is buffered.
pub const MAX_PACKET_SIZE: usize = 64 * 1024;

pub const PINGREQ: [u8; 2] = [0xC0, 0x00];
pub const DISCONNECT: [u8; 2] = [0xE0, 0x00];

const CONNECT: u8 = 0x10;
const SUBSCRIBE: u8 = 0x82;
const PUBACK: u8 = 0x40;
const PUBREC: u8 = 0x50;
const PUBCOMP: u8 = 0x70;

const FLAG_USERNAME: u8 = 0x80;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_CLEAN_SESSION: u8 = 0x02;

/// SUBACK return code signalling a rejected subscription.
pub const SUBACK_FAILURE: u8 = 0x80;

/// Delivery guarantee of a PUBLISH or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl QoS {
    fn from_bits(bits: u8) -> Result<Self, DecodeError> {
        match bits {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(DecodeError::InvalidQos(other)),
        }
    }
}

/// An incoming application message. The payload is counted, not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: String,
    pub qos: QoS,
    pub packet_id: Option<u16>,
    pub retain: bool,
    pub dup: bool,
    pub payload_len: usize,
}

/// A packet received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    ConnAck { session_present: bool, return_code: u8 },
    Publish(Publish),
    PubAck(u16),
    PubRec(u16),
    PubRel(u16),
    PubComp(u16),
    SubAck { packet_id: u16, return_codes: Vec<u8> },
    UnsubAck(u16),
    PingResp,
    Other { packet_type: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed remaining length")]
    MalformedLength,

    #[error("Invalid QoS level {0}")]
    InvalidQos(u8),

    #[error("Truncated {0} packet")]
    Truncated(&'static str),

    #[error("PUBLISH topic is not valid UTF-8")]
    InvalidUtf8,

    #[error("Packet of {size} bytes exceeds the {limit}-byte limit")]
    PacketTooLarge { size: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("String of {0} bytes exceeds the 65535-byte limit")]
    StringTooLong(usize),

    #[error("Packet body of {0} bytes exceeds the maximum remaining length")]
    PacketTooLarge(usize),
}

/// Human-readable reason for a non-zero CONNACK return code.
pub fn connack_reason(return_code: u8) -> &'static str {
    match return_code {
        0 => "accepted",
        1 => "unacceptable protocol version",
        2 => "client identifier rejected",
        3 => "server unavailable",
        4 => "bad user name or password",
        5 => "not authorized",
        _ => "unknown return code",
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn write_string(out: &mut Vec<u8>, value: &str) -> Result<(), EncodeError> {
    let len = u16::try_from(value.len()).map_err(|_| EncodeError::StringTooLong(value.len()))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Prefix `body` with its fixed header.
fn frame(first_byte: u8, body: Vec<u8>) -> Result<Vec<u8>, EncodeError> {
    if body.len() > MAX_REMAINING_LENGTH {
        return Err(EncodeError::PacketTooLarge(body.len()));
    }

    let mut out = Vec::with_capacity(body.len() + 5);
    out.push(first_byte);
    let mut remaining = body.len();
    loop {
        let mut byte = (remaining % 128) as u8;
        remaining /= 128;
        if remaining > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if remaining == 0 {
            break;
        }
    }
    out.extend_from_slice(&body);
    Ok(out)
}

/// CONNECT with an optional `(username, password)` pair.
pub fn encode_connect(
    client_id: &str,
    credentials: Option<(&str, &str)>,
    keep_alive_secs: u16,
    clean_session: bool,
) -> Result<Vec<u8>, EncodeError> {
    let mut flags = 0u8;
    if clean_session {
        flags |= FLAG_CLEAN_SESSION;
    }
    if credentials.is_some() {
        flags |= FLAG_USERNAME | FLAG_PASSWORD;
    }

    let mut body = Vec::new();
    write_string(&mut body, "MQTT")?;
    body.push(PROTOCOL_LEVEL);
    body.push(flags);
    body.extend_from_slice(&keep_alive_secs.to_be_bytes());
    write_string(&mut body, client_id)?;
    if let Some((username, password)) = credentials {
        write_string(&mut body, username)?;
        write_string(&mut body, password)?;
    }

    frame(CONNECT, body)
}

/// One SUBSCRIBE covering every topic at the same requested QoS.
pub fn encode_subscribe(packet_id: u16, topics: &[String], qos: QoS) -> Result<Vec<u8>, EncodeError> {
    let mut body = Vec::new();
    body.extend_from_slice(&packet_id.to_be_bytes());
    for topic in topics {
        write_string(&mut body, topic)?;
        body.push(qos as u8);
    }
    frame(SUBSCRIBE, body)
}

fn encode_ack(first_byte: u8, packet_id: u16) -> Vec<u8> {
    let [hi, lo] = packet_id.to_be_bytes();
    vec![first_byte, 0x02, hi, lo]
}

pub fn encode_puback(packet_id: u16) -> Vec<u8> {
    encode_ack(PUBACK, packet_id)
}

pub fn encode_pubrec(packet_id: u16) -> Vec<u8> {
    encode_ack(PUBREC, packet_id)
}

pub fn encode_pubcomp(packet_id: u16) -> Vec<u8> {
    encode_ack(PUBCOMP, packet_id)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode the packet at the front of `buf`.
///
/// Returns `Ok(None)` while the packet is incomplete, otherwise the packet
/// and the number of bytes it occupied.
pub fn decode(buf: &[u8]) -> Result<Option<(Packet, usize)>, DecodeError> {
    let Some(&first_byte) = buf.first() else {
        return Ok(None);
    };
    let Some((remaining, length_bytes)) = decode_remaining_length(&buf[1..])? else {
        return Ok(None);
    };

    let total = 1 + length_bytes + remaining;
    if total > MAX_PACKET_SIZE {
        return Err(DecodeError::PacketTooLarge {
            size: total,
            limit: MAX_PACKET_SIZE,
        });
    }
    if buf.len() < total {
        return Ok(None);
    }

    let body = &buf[1 + length_bytes..total];
    let packet = decode_body(first_byte, body)?;
    Ok(Some((packet, total)))
}

/// Returns `(value, bytes_used)`, or `None` if more bytes are needed.
fn decode_remaining_length(buf: &[u8]) -> Result<Option<(usize, usize)>, DecodeError> {
    let mut value = 0usize;
    let mut multiplier = 1usize;

    for (i, byte) in buf.iter().take(4).enumerate() {
        value += usize::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
        multiplier *= 128;
    }

    if buf.len() >= 4 {
        Err(DecodeError::MalformedLength)
    } else {
        Ok(None)
    }
}

fn read_u16(body: &[u8], at: usize, packet: &'static str) -> Result<u16, DecodeError> {
    match body.get(at..at + 2) {
        Some(&[hi, lo]) => Ok(u16::from_be_bytes([hi, lo])),
        _ => Err(DecodeError::Truncated(packet)),
    }
}

fn decode_body(first_byte: u8, body: &[u8]) -> Result<Packet, DecodeError> {
    let packet = match first_byte >> 4 {
        2 => {
            if body.len() < 2 {
                return Err(DecodeError::Truncated("CONNACK"));
            }
            Packet::ConnAck {
                session_present: body[0] & 0x01 == 0x01,
                return_code: body[1],
            }
        }
        3 => Packet::Publish(decode_publish(first_byte & 0x0F, body)?),
        4 => Packet::PubAck(read_u16(body, 0, "PUBACK")?),
        5 => Packet::PubRec(read_u16(body, 0, "PUBREC")?),
        6 => Packet::PubRel(read_u16(body, 0, "PUBREL")?),
        7 => Packet::PubComp(read_u16(body, 0, "PUBCOMP")?),
        9 => Packet::SubAck {
            packet_id: read_u16(body, 0, "SUBACK")?,
            return_codes: body[2..].to_vec(),
        },
        11 => Packet::UnsubAck(read_u16(body, 0, "UNSUBACK")?),
        13 => Packet::PingResp,
        packet_type => Packet::Other { packet_type },
    };
    Ok(packet)
}

fn decode_publish(flags: u8, body: &[u8]) -> Result<Publish, DecodeError> {
    let qos = QoS::from_bits((flags >> 1) & 0x03)?;

    let topic_len = usize::from(read_u16(body, 0, "PUBLISH")?);
    let topic_bytes = body
        .get(2..2 + topic_len)
        .ok_or(DecodeError::Truncated("PUBLISH"))?;
    let topic = std::str::from_utf8(topic_bytes)
        .map_err(|_| DecodeError::InvalidUtf8)?
        .to_string();

    let mut offset = 2 + topic_len;
    let packet_id = if qos == QoS::AtMostOnce {
        None
    } else {
        let id = read_u16(body, offset, "PUBLISH")?;
        offset += 2;
        Some(id)
    };

    Ok(Publish {
        topic,
        qos,
        packet_id,
        retain: flags & 0x01 == 0x01,
        dup: flags & 0x08 == 0x08,
        payload_len: body.len() - offset,
    })
}

/// Broker-side PUBLISH encoder for exercising the client in tests.
#[cfg(test)]
pub(crate) fn encode_publish(topic: &str, qos: QoS, packet_id: Option<u16>, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    write_string(&mut body, topic).expect("test topic fits");
    if let Some(id) = packet_id {
        body.extend_from_slice(&id.to_be_bytes());
    }
    body.extend_from_slice(payload);
    frame(0x30 | ((qos as u8) << 1), body).expect("test packet fits")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn connect_without_credentials() {
        let bytes = encode_connect("c", None, 60, true).unwrap();
        assert_eq!(
            bytes,
            [
                0x10, 13, // fixed header
                0x00, 0x04, b'M', b'Q', b'T', b'T', // protocol name
                0x04, 0x02, 0x00, 0x3C, // level, flags, keep-alive
                0x00, 0x01, b'c', // client id
            ]
        );
    }

    #[test]
    fn connect_with_credentials_sets_flags_and_payload() {
        let bytes = encode_connect("id", Some(("u", "pw")), 30, true).unwrap();

        assert_eq!(bytes[9], FLAG_USERNAME | FLAG_PASSWORD | FLAG_CLEAN_SESSION);
        assert!(bytes.ends_with(&[0x00, 0x01, b'u', 0x00, 0x02, b'p', b'w']));
        assert_eq!(usize::from(bytes[1]), bytes.len() - 2);
    }

    #[test]
    fn subscribe_lists_every_topic() {
        let topics = vec!["a/b".to_string(), "c".to_string()];
        let bytes = encode_subscribe(7, &topics, QoS::AtMostOnce).unwrap();

        assert_eq!(
            bytes,
            [0x82, 12, 0x00, 0x07, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x00, 0x01, b'c', 0x00]
        );
    }

    #[test]
    fn oversized_string_is_rejected() {
        let long = "x".repeat(70_000);
        assert_matches!(
            encode_connect(&long, None, 60, true),
            Err(EncodeError::StringTooLong(70_000))
        );
    }

    #[test]
    fn multi_byte_remaining_length_round_trips() {
        let payload = vec![0u8; 300];
        let bytes = encode_publish("t", QoS::AtMostOnce, None, &payload);
        // 3 (topic) + 300 (payload) = 303 = 0xAF 0x02
        assert_eq!(&bytes[1..3], &[0xAF, 0x02]);

        let (packet, used) = decode(&bytes).unwrap().unwrap();
        assert_eq!(used, bytes.len());
        assert_matches!(packet, Packet::Publish(p) if p.payload_len == 300);
    }

    #[test]
    fn decode_qos1_publish_reads_packet_id() {
        let bytes = encode_publish("sensors/temp", QoS::AtLeastOnce, Some(42), b"21.5");
        let (packet, _) = decode(&bytes).unwrap().unwrap();

        assert_eq!(
            packet,
            Packet::Publish(Publish {
                topic: "sensors/temp".to_string(),
                qos: QoS::AtLeastOnce,
                packet_id: Some(42),
                retain: false,
                dup: false,
                payload_len: 4,
            })
        );
    }

    #[test]
    fn decode_retained_publish_flag() {
        let mut bytes = encode_publish("t", QoS::AtMostOnce, None, b"");
        bytes[0] |= 0x01;
        let (packet, _) = decode(&bytes).unwrap().unwrap();
        assert_matches!(packet, Packet::Publish(p) if p.retain && !p.dup);
    }

    #[test]
    fn decode_waits_for_complete_packet() {
        let bytes = encode_publish("topic", QoS::AtMostOnce, None, b"payload");
        for cut in 0..bytes.len() {
            assert_eq!(decode(&bytes[..cut]).unwrap(), None, "cut at {cut}");
        }
    }

    #[test]
    fn decode_consumes_only_first_packet() {
        let mut bytes = vec![0x20, 0x02, 0x00, 0x00];
        bytes.extend_from_slice(&[0xD0, 0x00]);

        let (packet, used) = decode(&bytes).unwrap().unwrap();
        assert_eq!(
            packet,
            Packet::ConnAck {
                session_present: false,
                return_code: 0
            }
        );
        assert_eq!(used, 4);
        assert_eq!(decode(&bytes[used..]).unwrap(), Some((Packet::PingResp, 2)));
    }

    #[test]
    fn decode_suback_and_acks() {
        let suback = [0x90, 0x04, 0x00, 0x01, 0x00, SUBACK_FAILURE];
        assert_eq!(
            decode(&suback).unwrap(),
            Some((
                Packet::SubAck {
                    packet_id: 1,
                    return_codes: vec![0x00, SUBACK_FAILURE]
                },
                6
            ))
        );
        assert_eq!(decode(&[0x62, 0x02, 0x00, 0x09]).unwrap(), Some((Packet::PubRel(9), 4)));
        assert_eq!(decode(&[0x40, 0x02, 0x01, 0x00]).unwrap(), Some((Packet::PubAck(256), 4)));
    }

    #[test]
    fn decode_unknown_packet_type_keeps_framing() {
        assert_eq!(
            decode(&[0xF0, 0x01, 0xFF]).unwrap(),
            Some((Packet::Other { packet_type: 15 }, 3))
        );
    }

    #[test]
    fn decode_rejects_malformed_length_and_qos() {
        assert_eq!(decode(&[0x30, 0xFF, 0xFF, 0xFF, 0xFF]), Err(DecodeError::MalformedLength));
        assert_eq!(
            decode(&[0x36, 0x03, 0x00, 0x01, b't']),
            Err(DecodeError::InvalidQos(3))
        );
    }

    #[test]
    fn decode_refuses_oversized_packet_from_header_alone() {
        // Remaining length 2_097_152 (0x80 0x80 0x80 0x01), no body bytes yet.
        let header = [0x30, 0x80, 0x80, 0x80, 0x01];
        assert_eq!(
            decode(&header),
            Err(DecodeError::PacketTooLarge {
                size: 1 + 4 + 2_097_152,
                limit: MAX_PACKET_SIZE,
            })
        );
    }

    #[test]
    fn decode_accepts_packet_at_size_limit() {
        let payload = vec![0u8; MAX_PACKET_SIZE - 1 - 3 - 3];
        let packet = encode_publish("t", QoS::AtMostOnce, None, &payload);
        assert_eq!(packet.len(), MAX_PACKET_SIZE);

        let (decoded, used) = decode(&packet).unwrap().unwrap();
        assert_eq!(used, MAX_PACKET_SIZE);
        assert_matches!(decoded, Packet::Publish(p) if p.payload_len == payload.len());
    }

    #[test]
    fn decode_rejects_truncated_connack() {
        assert_eq!(decode(&[0x20, 0x01, 0x00]), Err(DecodeError::Truncated("CONNACK")));
    }

    #[test]
    fn ack_encoders_use_expected_types() {
        assert_eq!(encode_puback(5), [0x40, 0x02, 0x00, 0x05]);
        assert_eq!(encode_pubrec(5), [0x50, 0x02, 0x00, 0x05]);
        assert_eq!(encode_pubcomp(5), [0x70, 0x02, 0x00, 0x05]);
    }

    #[test]
    fn connack_reasons_are_described() {
        assert_eq!(connack_reason(4), "bad user name or password");
        assert_eq!(connack_reason(99), "unknown return code");
    }
}
