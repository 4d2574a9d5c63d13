use std::net::Ipv4Addr;

use serde_test::{Configure, Token};

use super::Event;
use crate::id::*;
use crate::opcode::Opcode;
use crate::payload::*;
use crate::protocol_data::ProtocolData;
use crate::speaking_state::SpeakingState;

fn json_round_trip(event: &Event) -> Event {
    let text = serde_json::to_string(event).expect("event should serialise");
    serde_json::from_str(&text).expect("serialised event should parse")
}

#[test]
fn deserialize_identify_json() {
    let json_data = r#"{
      "d": {
        "server_id": "94882524378968064",
        "user_id": "181380170556768256",
        "session_id": "f3fd7dbb1eba2c1ea9acf79f",
        "token": "af8291bb0ae51248"
      },
      "op": 0
    }"#;

    let event = serde_json::from_str(json_data);

    let ident = Identify {
        session_id: "f3fd7dbb1eba2c1ea9acf79f".into(),
        token: "af8291bb0ae51248".into(),
        server_id: GuildId(94882524378968064),
        user_id: UserId(181380170556768256),
    };

    assert!(matches!(event, Ok(Event::Identify(i)) if i == ident));
}

#[test]
fn deserialize_ready_json() {
    let json_data = r#"{
        "op": 2,
        "d": {
            "ssrc": 123,
            "ip": "1.2.3.4",
            "port": 50000,
            "modes": ["xsalsa20_poly1305", "xsalsa20_poly1305_suffix", "xsalsa20_poly1305_lite"]
        }
    }"#;

    let event = serde_json::from_str(json_data);

    let ready = Ready {
        ssrc: 123,
        ip: Ipv4Addr::new(1, 2, 3, 4).into(),
        port: 50000,
        modes: vec![
            "xsalsa20_poly1305".into(),
            "xsalsa20_poly1305_suffix".into(),
            "xsalsa20_poly1305_lite".into(),
        ],
    };

    assert!(matches!(event, Ok(Event::Ready(i)) if i == ready));
}

#[test]
fn deserialize_heartbeat_and_ack_json() {
    let beat = serde_json::from_str(r#"{"op": 3, "d": 1696243917155}"#);
    assert!(matches!(
        beat,
        Ok(Event::Heartbeat(Heartbeat { sent_ms: 1696243917155 }))
    ));

    let ack = serde_json::from_str(r#"{"op": 6, "d": 1696243917155}"#);
    assert!(matches!(
        ack,
        Ok(Event::HeartbeatAck(HeartbeatAck { sent_ms: 1696243917155 }))
    ));
}

#[test]
fn deserialize_session_description_json() {
    let json_data = r#"{
        "op": 4,
        "d": {
            "mode": "xsalsa20_poly1305_lite",
            "secret_key": [5, 18, 249, 0, 64]
        }
    }"#;
    let event = serde_json::from_str(json_data);

    let description = SessionDescription {
        mode: "xsalsa20_poly1305_lite".into(),
        secret_key: vec![5, 18, 249, 0, 64],
    };

    assert!(matches!(event, Ok(Event::SessionDescription(i)) if i == description));
}

#[test]
fn deserialize_speaker_announcement_json() {
    let json_data = r#"{
        "op": 5,
        "d": {
            "speaking": 1,
            "delay": 0,
            "ssrc": 42,
            "user_id": "24"
        }
    }"#;
    let event = serde_json::from_str(json_data);

    let speaking = Speaking {
        speaking: SpeakingState::MICROPHONE,
        ssrc: 42,
        delay: Some(0),
        user_id: Some(UserId(24)),
    };

    assert!(matches!(event, Ok(Event::Speaking(i)) if i == speaking));
}

#[test]
fn deserialize_body_before_opcode() {
    // Out-of-order keys force the visitor down the buffered RawValue path.
    let json_data = r#"{
        "d": {
            "speaking": 1,
            "delay": 0,
            "ssrc": 42,
            "user_id": "24"
        },
        "op": 5
    }"#;
    let event = serde_json::from_str(json_data);

    assert!(matches!(
        event,
        Ok(Event::Speaking(Speaking { ssrc: 42, user_id: Some(UserId(24)), .. }))
    ));
}

#[test]
fn deserialize_hello_json() {
    let json_data = r#"{
      "op": 8,
      "d": {
        "heartbeat_interval": 41250
      }
    }"#;

    let event = serde_json::from_str(json_data);

    assert!(match event {
        Ok(Event::Hello(h)) => (h.heartbeat_interval - 41250.0).abs() < f64::EPSILON,
        _ => false,
    });
}

#[test]
fn deserialize_resumed_json() {
    let event = serde_json::from_str(r#"{"op": 9, "d": null}"#);

    assert!(matches!(event, Ok(Event::Resumed)));
}

#[test]
fn deserialize_unknown_opcode_fails() {
    assert!(serde_json::from_str::<Event>(r#"{"op": 200, "d": null}"#).is_err());
}

#[test]
fn deserialize_client_lifecycle_json() {
    let connect = serde_json::from_str(
        r#"{"op": 12, "d": {"audio_ssrc": 5678, "user_id": "881"}}"#,
    );
    assert!(matches!(
        connect,
        Ok(Event::ClientConnect(ClientConnect { audio_ssrc: 5678, user_id: UserId(881) }))
    ));

    let disconnect = serde_json::from_str(r#"{"op": 13, "d": {"user_id": "881"}}"#);
    assert!(matches!(
        disconnect,
        Ok(Event::ClientDisconnect(ClientDisconnect { user_id: UserId(881) }))
    ));
}

#[test]
fn identify_round_trips_with_stringly_ids() {
    let event: Event = Identify {
        server_id: GuildId(94882524378968064),
        session_id: "f3fd7dbb1eba2c1ea9acf79f".into(),
        token: "af8291bb0ae51248".into(),
        user_id: UserId(181380170556768256),
    }
    .into();

    let text = serde_json::to_string(&event).unwrap();
    // IDs must leave as strings, not numbers.
    assert!(text.contains(r#""server_id":"94882524378968064""#));
    assert!(text.contains(r#""user_id":"181380170556768256""#));

    let reparsed = json_round_trip(&event);
    assert!(
        matches!((event, reparsed), (Event::Identify(a), Event::Identify(b)) if a == b)
    );
}

#[test]
fn resume_round_trips() {
    let event: Event = Resume {
        server_id: GuildId(3),
        session_id: "0b7894a1cd9e".into(),
        token: "t0k3n".into(),
    }
    .into();

    let text = serde_json::to_string(&event).unwrap();
    assert!(text.starts_with(r#"{"op":7,"#));

    let reparsed = json_round_trip(&event);
    assert!(matches!((event, reparsed), (Event::Resume(a), Event::Resume(b)) if a == b));
}

#[test]
fn serialize_select_protocol() {
    let value: Event = SelectProtocol {
        protocol: "udp".into(),
        data: ProtocolData {
            address: Ipv4Addr::new(10, 0, 3, 9).into(),
            port: 61234,
            mode: "xsalsa20_poly1305_lite".into(),
        },
    }
    .into();

    serde_test::assert_ser_tokens(&value.readable(), &[
        Token::Struct {
            name: "Event",
            len: 2,
        },
        Token::Str("op"),
        Token::U8(Opcode::SelectProtocol as u8),
        Token::Str("d"),
        Token::Struct {
            name: "SelectProtocol",
            len: 2,
        },
        Token::Str("data"),
        Token::Struct {
            name: "ProtocolData",
            len: 3,
        },
        Token::Str("address"),
        Token::Str("10.0.3.9"),
        Token::Str("mode"),
        Token::Str("xsalsa20_poly1305_lite"),
        Token::Str("port"),
        Token::U16(61234),
        Token::StructEnd,
        Token::Str("protocol"),
        Token::Str("udp"),
        Token::StructEnd,
        Token::StructEnd,
    ]);
}

#[test]
fn serialize_heartbeat_as_bare_number() {
    let value: Event = Heartbeat {
        sent_ms: 1696243917155,
    }
    .into();

    serde_test::assert_ser_tokens(&value, &[
        Token::Struct {
            name: "Event",
            len: 2,
        },
        Token::Str("op"),
        Token::U8(Opcode::Heartbeat as u8),
        Token::Str("d"),
        Token::U64(1696243917155),
        Token::StructEnd,
    ]);

    assert_eq!(
        serde_json::to_string(&value).unwrap(),
        r#"{"op":3,"d":1696243917155}"#
    );
}

#[test]
fn serialize_speaking_flags_as_integer() {
    let value: Event = Speaking {
        delay: Some(0),
        speaking: SpeakingState::MICROPHONE | SpeakingState::PRIORITY,
        ssrc: 240,
        user_id: None,
    }
    .into();

    serde_test::assert_ser_tokens(&value, &[
        Token::Struct {
            name: "Event",
            len: 2,
        },
        Token::Str("op"),
        Token::U8(Opcode::Speaking as u8),
        Token::Str("d"),
        Token::Struct {
            name: "Speaking",
            len: 4,
        },
        Token::Str("delay"),
        Token::Some,
        Token::U32(0),
        Token::Str("speaking"),
        Token::U8(5),
        Token::Str("ssrc"),
        Token::U32(240),
        Token::Str("user_id"),
        Token::None,
        Token::StructEnd,
        Token::StructEnd,
    ]);
}

#[test]
fn serialize_resumed_with_null_body() {
    assert_eq!(
        serde_json::to_string(&Event::Resumed).unwrap(),
        r#"{"op":9,"d":null}"#
    );
}
