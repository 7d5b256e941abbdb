//! OSC wire codec
//!
//! Converts between [`OutboundCommand`]/[`InboundMessage`] and OSC packets.
//! Only the first usable argument of an inbound message is kept; messages
//! with no usable argument are dropped.

use rosc::{OscMessage, OscPacket, OscType};
use tracing::trace;

use super::{InboundMessage, OutboundCommand};
use crate::error::TransportError;
use crate::state::{Address, Value};

/// Encode a command as a single OSC message datagram
pub fn encode(command: &OutboundCommand) -> Result<Vec<u8>, TransportError> {
    let packet = OscPacket::Message(OscMessage {
        addr: command.address.to_string(),
        args: command.value.iter().map(to_osc).collect(),
    });

    rosc::encoder::encode(&packet).map_err(|e| TransportError::Encode {
        address: command.address.to_string(),
        reason: format!("{:?}", e),
    })
}

/// Decode a datagram into zero or more inbound messages
///
/// Bundles are flattened in order.
pub fn decode(datagram: &[u8]) -> Result<Vec<InboundMessage>, TransportError> {
    let (_, packet) = rosc::decoder::decode_udp(datagram).map_err(|e| TransportError::Decode {
        len: datagram.len(),
        reason: format!("{:?}", e),
    })?;

    let mut out = Vec::new();
    flatten(packet, &mut out);
    Ok(out)
}

fn flatten(packet: OscPacket, out: &mut Vec<InboundMessage>) {
    match packet {
        OscPacket::Message(msg) => {
            let value = msg.args.iter().find_map(from_osc);
            match value {
                Some(value) => {
                    if msg.args.len() > 1 {
                        trace!(addr = %msg.addr, extra = msg.args.len() - 1, "Ignoring extra OSC arguments");
                    }
                    out.push(InboundMessage {
                        address: Address::from(msg.addr),
                        value,
                    });
                }
                None => trace!(addr = %msg.addr, "Dropping OSC message without usable argument"),
            }
        }
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                flatten(inner, out);
            }
        }
    }
}

fn to_osc(value: &Value) -> OscType {
    match value {
        Value::Int(i) => OscType::Int(*i),
        Value::Float(f) => OscType::Float(*f),
        Value::Text(s) => OscType::String(s.clone()),
    }
}

fn from_osc(arg: &OscType) -> Option<Value> {
    match arg {
        OscType::Int(i) => Some(Value::Int(*i)),
        OscType::Float(f) => Some(Value::Float(*f)),
        OscType::String(s) => Some(Value::Text(s.clone())),
        OscType::Long(l) => Some(Value::Int((*l).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)),
        OscType::Double(d) => Some(Value::Float(*d as f32)),
        OscType::Bool(b) => Some(Value::from(*b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{OscBundle, OscTime};

    fn raw(addr: &str, args: Vec<OscType>) -> Vec<u8> {
        rosc::encoder::encode(&OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        }))
        .unwrap()
    }

    #[test]
    fn test_query_encodes_without_arguments() {
        let bytes = encode(&OutboundCommand::query(Address::new("/ch/01/mix/fader"))).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&bytes).unwrap();
        match packet {
            OscPacket::Message(msg) => {
                assert_eq!(msg.addr, "/ch/01/mix/fader");
                assert!(msg.args.is_empty());
            }
            _ => panic!("expected message"),
        }
    }

    #[test]
    fn test_set_encodes_typed_argument() {
        let bytes = encode(&OutboundCommand::set(
            Address::new("/ch/01/mix/fader"),
            Value::Float(0.75),
        ))
        .unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&bytes).unwrap();
        match packet {
            OscPacket::Message(msg) => assert_eq!(msg.args, vec![OscType::Float(0.75)]),
            _ => panic!("expected message"),
        }
    }

    #[test]
    fn test_decode_maps_argument_types() {
        let cases = vec![
            (OscType::Int(3), Value::Int(3)),
            (OscType::Float(0.5), Value::Float(0.5)),
            (OscType::String("Kick".into()), Value::from("Kick")),
            (OscType::Bool(true), Value::Int(1)),
            (OscType::Long(i64::MAX), Value::Int(i32::MAX)),
            (OscType::Double(0.25), Value::Float(0.25)),
        ];
        for (arg, expected) in cases {
            let decoded = decode(&raw("/x", vec![arg])).unwrap();
            assert_eq!(decoded, vec![InboundMessage::new("/x", expected)]);
        }
    }

    #[test]
    fn test_message_without_value_is_dropped() {
        assert!(decode(&raw("/xinfo", vec![])).unwrap().is_empty());
        assert!(decode(&raw("/x", vec![OscType::Nil])).unwrap().is_empty());
    }

    #[test]
    fn test_bundle_is_flattened_in_order() {
        let bundle = OscPacket::Bundle(OscBundle {
            timetag: OscTime::from((0, 1)),
            content: vec![
                OscPacket::Message(OscMessage {
                    addr: "/a".into(),
                    args: vec![OscType::Int(1)],
                }),
                OscPacket::Message(OscMessage {
                    addr: "/b".into(),
                    args: vec![OscType::Float(2.0), OscType::Int(9)],
                }),
            ],
        });
        let bytes = rosc::encoder::encode(&bundle).unwrap();

        let decoded = decode(&bytes).unwrap();
        assert_eq!(
            decoded,
            vec![
                InboundMessage::new("/a", Value::Int(1)),
                InboundMessage::new("/b", Value::Float(2.0)),
            ]
        );
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let err = decode(&[0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, TransportError::Decode { len: 3, .. }));
    }
}
