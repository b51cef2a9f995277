//! Wire protocol: newline-delimited JSON objects discriminated by `type`.
//!
//! ```text
//! client ──"{"type":"MOVE","dx":1.0,"dy":0.0}\n"──▶ decode_client_line ──▶ ClientPacket
//! ServerPacket ──encode_server_line──▶ "{"type":"POS_UPDATE",...}\n" ──▶ client
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::map::MapData;
use crate::serialization::EntityRecord;

/// Packet kinds a client may send. Anything else is `ProtocolError::UnknownType`.
pub const CLIENT_PACKET_TYPES: &[&str] = &[
    "AUTH",
    "REGISTER",
    "MOVE",
    "DAMAGE",
    "EVOLVE",
    "CHAT_MESSAGE",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientPacket {
    Auth {
        username: String,
        password: String,
    },
    Register {
        username: String,
        password: String,
    },
    /// Always a displacement, whichever field names the client used.
    Move {
        #[serde(alias = "x")]
        dx: f32,
        #[serde(alias = "y")]
        dy: f32,
    },
    Damage {
        target_entity_id: u64,
    },
    Evolve {
        class_name: String,
    },
    ChatMessage {
        content: String,
    },
}

impl ClientPacket {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientPacket::Auth { .. } => "AUTH",
            ClientPacket::Register { .. } => "REGISTER",
            ClientPacket::Move { .. } => "MOVE",
            ClientPacket::Damage { .. } => "DAMAGE",
            ClientPacket::Evolve { .. } => "EVOLVE",
            ClientPacket::ChatMessage { .. } => "CHAT_MESSAGE",
        }
    }

    /// AUTH and REGISTER belong to the connection handshake, not the game.
    pub fn is_handshake(&self) -> bool {
        matches!(self, ClientPacket::Auth { .. } | ClientPacket::Register { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerPacket {
    AuthSuccess {
        status: String,
    },
    AuthFail {
        status: String,
        message: String,
    },
    RegisterSuccess {
        status: String,
    },
    RegisterFail {
        status: String,
        message: String,
    },
    EntityNew {
        #[serde(flatten)]
        entity: EntityRecord,
        is_local_player: bool,
    },
    EntityUpdate {
        #[serde(flatten)]
        entity: EntityRecord,
    },
    EntityRemove {
        entity_id: u64,
        asset_type: String,
    },
    PosUpdate {
        entity_id: u64,
        x: f32,
        y: f32,
        asset_type: String,
    },
    HealthUpdate {
        entity_id: u64,
        current_health: u32,
        max_health: u32,
    },
    PlayerLevelUp {
        entity_id: u64,
        level: u32,
        stat_points: u32,
        max_health: u32,
    },
    MapData {
        data: MapData,
    },
    SystemMessage {
        content: String,
    },
    ChatMessage {
        content: String,
    },
}

impl ServerPacket {
    pub fn auth_success() -> Self {
        ServerPacket::AuthSuccess {
            status: "success".into(),
        }
    }

    pub fn auth_fail(message: impl Into<String>) -> Self {
        ServerPacket::AuthFail {
            status: "failure".into(),
            message: message.into(),
        }
    }

    pub fn register_success() -> Self {
        ServerPacket::RegisterSuccess {
            status: "success".into(),
        }
    }

    pub fn register_fail(message: impl Into<String>) -> Self {
        ServerPacket::RegisterFail {
            status: "failure".into(),
            message: message.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        ServerPacket::SystemMessage {
            content: content.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerPacket::AuthSuccess { .. } => "AUTH_SUCCESS",
            ServerPacket::AuthFail { .. } => "AUTH_FAIL",
            ServerPacket::RegisterSuccess { .. } => "REGISTER_SUCCESS",
            ServerPacket::RegisterFail { .. } => "REGISTER_FAIL",
            ServerPacket::EntityNew { .. } => "ENTITY_NEW",
            ServerPacket::EntityUpdate { .. } => "ENTITY_UPDATE",
            ServerPacket::EntityRemove { .. } => "ENTITY_REMOVE",
            ServerPacket::PosUpdate { .. } => "POS_UPDATE",
            ServerPacket::HealthUpdate { .. } => "HEALTH_UPDATE",
            ServerPacket::PlayerLevelUp { .. } => "PLAYER_LEVEL_UP",
            ServerPacket::MapData { .. } => "MAP_DATA",
            ServerPacket::SystemMessage { .. } => "SYSTEM_MESSAGE",
            ServerPacket::ChatMessage { .. } => "CHAT_MESSAGE",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("packet is not a JSON object")]
    NotAnObject,
    #[error("packet has no `type` field")]
    MissingType,
    #[error("unknown packet type `{0}`")]
    UnknownType(String),
    #[error("malformed {kind} packet: {source}")]
    InvalidFields {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decodes one line received from a client.
pub fn decode_client_line(line: &str) -> Result<ClientPacket, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(line.trim()).map_err(ProtocolError::InvalidJson)?;
    let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;
    let kind = object
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(ProtocolError::MissingType)?
        .to_string();
    if !CLIENT_PACKET_TYPES.contains(&kind.as_str()) {
        return Err(ProtocolError::UnknownType(kind));
    }
    serde_json::from_value(value).map_err(|source| ProtocolError::InvalidFields { kind, source })
}

/// Encodes a packet as a single line, newline included.
pub fn encode_server_line(packet: &ServerPacket) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(packet)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_decode_move_with_delta_fields() {
        let packet = decode_client_line(r#"{"type":"MOVE","dx":1.5,"dy":-2}"#).unwrap();
        assert_eq!(packet, ClientPacket::Move { dx: 1.5, dy: -2.0 });
    }

    #[test]
    fn test_decode_move_with_xy_fields_is_still_a_delta() {
        let packet = decode_client_line(r#"{"type":"MOVE","x":0.5,"y":0.25}"#).unwrap();
        assert_eq!(packet, ClientPacket::Move { dx: 0.5, dy: 0.25 });
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode_client_line("{not json"),
            Err(ProtocolError::InvalidJson(_))
        ));
        assert!(matches!(
            decode_client_line("[1,2]"),
            Err(ProtocolError::NotAnObject)
        ));
        assert!(matches!(
            decode_client_line(r#"{"dx":1}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            decode_client_line(r#"{"type":"ITEM_USE"}"#),
            Err(ProtocolError::UnknownType(t)) if t == "ITEM_USE"
        ));
        assert!(matches!(
            decode_client_line(r#"{"type":"DAMAGE"}"#),
            Err(ProtocolError::InvalidFields { kind, .. }) if kind == "DAMAGE"
        ));
    }

    #[test]
    fn test_server_packet_tags() {
        let value = serde_json::to_value(ServerPacket::HealthUpdate {
            entity_id: 9,
            current_health: 40,
            max_health: 118,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "HEALTH_UPDATE", "entity_id": 9, "current_health": 40, "max_health": 118})
        );

        let value = serde_json::to_value(ServerPacket::auth_fail("bad password")).unwrap();
        assert_eq!(value["type"], "AUTH_FAIL");
        assert_eq!(value["status"], "failure");
    }

    #[test]
    fn test_entity_new_is_flat() {
        let record = EntityRecord {
            entity_id: 3,
            asset_type: "ana".into(),
            ..Default::default()
        };
        let line = encode_server_line(&ServerPacket::EntityNew {
            entity: record,
            is_local_player: true,
        })
        .unwrap();
        assert!(line.ends_with('\n'));
        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["type"], "ENTITY_NEW");
        assert_eq!(value["entity_id"], 3);
        assert_eq!(value["asset_type"], "ana");
        assert_eq!(value["is_local_player"], true);
        assert!(value.get("x").is_none(), "absent components stay absent");
    }

    #[test]
    fn test_handshake_classification() {
        assert!(ClientPacket::Auth {
            username: "a".into(),
            password: "b".into()
        }
        .is_handshake());
        assert!(!ClientPacket::Move { dx: 0.0, dy: 0.0 }.is_handshake());
    }
}
