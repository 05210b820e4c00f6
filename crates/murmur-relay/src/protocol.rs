//! Wire protocol.
//!
//! Every frame is a JSON object whose `type` key discriminates the message.
//! Inbound frames are decoded discriminator-first into [`Inbound`]; anything
//! that is not a rename keeps its full key/value payload so unknown fields and
//! unknown types pass through untouched.
//!
//! | direction | `type`                 | payload                         |
//! |-----------|------------------------|---------------------------------|
//! | in        | `message` / `text`     | `text`, optional `target`, ...  |
//! | in        | `username` / `rename`  | `name`, `id` (echoed)           |
//! | out       | `id`                   | `id`                            |
//! | out       | `userlist`             | `users` (`null` for unnamed)    |
//! | out       | `rejectusername`       | `id` (echoed), `name` (granted) |

use std::borrow::Cow;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::id::ConnectionId;
use crate::sanitize::strip_tags;
use crate::RelayError;

/// Discriminator values recognised as text messages.
pub const TEXT_TYPES: &[&str] = &["message", "text"];

/// Discriminator values recognised as rename requests.
pub const RENAME_TYPES: &[&str] = &["username", "rename"];

const TYPE_KEY: &str = "type";
const BODY_KEY: &str = "text";
const TARGET_KEY: &str = "target";
const SENDER_KEY: &str = "name";

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A text message
    Text(Envelope),
    /// A display name registration
    Rename(RenameRequest),
    /// Unrecognised type, routed like text
    Passthrough(Envelope),
}

impl Inbound {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::Text(_) => "text",
            Inbound::Rename(_) => "rename",
            Inbound::Passthrough(_) => "passthrough",
        }
    }
}

/// A rename request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenameRequest {
    /// Requested display name
    pub name: String,
    /// Client correlation id, echoed back on rejection
    pub correlation_id: Option<Value>,
}

/// A routable message: the client's JSON object, kept whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Envelope {
    fields: Map<String, Value>,
}

impl Envelope {
    /// Wrap a JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// The `type` discriminator, if present and a string.
    pub fn message_type(&self) -> Option<&str> {
        self.fields.get(TYPE_KEY).and_then(Value::as_str)
    }

    /// Addressed recipient, if the frame names a non-empty `target`.
    pub fn target(&self) -> Option<&str> {
        self.fields
            .get(TARGET_KEY)
            .and_then(Value::as_str)
            .filter(|target| !target.is_empty())
    }

    /// The message body, if it is a string.
    pub fn body(&self) -> Option<&str> {
        self.fields.get(BODY_KEY).and_then(Value::as_str)
    }

    /// Overwrite the sender attribution with the server's view.
    ///
    /// An unnamed sender removes the key entirely.
    pub fn stamp_sender(&mut self, name: Option<&str>) {
        match name {
            Some(name) => {
                self.fields
                    .insert(SENDER_KEY.to_owned(), Value::String(name.to_owned()));
            }
            None => {
                self.fields.remove(SENDER_KEY);
            }
        }
    }

    /// Strip tag sequences from a string body. Non-string bodies are left alone.
    pub fn sanitize_body(&mut self) {
        if let Some(Value::String(body)) = self.fields.get_mut(BODY_KEY) {
            let clean = match strip_tags(body) {
                Cow::Borrowed(_) => return,
                Cow::Owned(clean) => clean,
            };
            *body = clean;
        }
    }

    /// Access a raw field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Messages originated by the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Sent once to a freshly accepted connection
    #[serde(rename = "id")]
    Identity {
        /// The assigned connection id
        id: ConnectionId,
    },
    /// The current roster, broadcast to everyone
    #[serde(rename = "userlist")]
    Roster {
        /// Display names in connection order; `null` for unnamed connections
        users: Vec<Option<String>>,
    },
    /// Tells a client its requested name was altered
    #[serde(rename = "rejectusername")]
    NameRejected {
        /// The client's correlation id
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        /// The name actually granted
        name: String,
    },
}

/// Any frame the server sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    /// Server-originated message
    Server(ServerMessage),
    /// A client message relayed to other clients
    Relayed(Envelope),
}

impl Outbound {
    /// Serialize to the JSON text frame sent on the wire.
    pub fn encode(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(RelayError::Encode)
    }
}

impl From<ServerMessage> for Outbound {
    fn from(message: ServerMessage) -> Self {
        Outbound::Server(message)
    }
}

impl From<Envelope> for Outbound {
    fn from(envelope: Envelope) -> Self {
        Outbound::Relayed(envelope)
    }
}

/// Decode an inbound frame.
///
/// Fails if the bytes are not a JSON object, or if a rename does not carry a
/// string `name`.
pub fn decode(raw: &[u8]) -> Result<Inbound, RelayError> {
    let value: Value = serde_json::from_slice(raw).map_err(RelayError::Malformed)?;
    let Value::Object(mut fields) = value else {
        return Err(RelayError::NotAnObject);
    };

    let message_type = fields.get(TYPE_KEY).and_then(Value::as_str);
    let is_rename = message_type.is_some_and(|t| RENAME_TYPES.contains(&t));
    let is_text = message_type.is_some_and(|t| TEXT_TYPES.contains(&t));

    if is_rename {
        let name = match fields.remove(SENDER_KEY) {
            Some(Value::String(name)) => name,
            Some(_) => return Err(RelayError::invalid_rename("name is not a string")),
            None => return Err(RelayError::invalid_rename("missing name")),
        };
        Ok(Inbound::Rename(RenameRequest {
            name,
            correlation_id: fields.remove("id"),
        }))
    } else if is_text {
        Ok(Inbound::Text(Envelope::new(fields)))
    } else {
        Ok(Inbound::Passthrough(Envelope::new(fields)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> Envelope {
        match value {
            Value::Object(fields) => Envelope::new(fields),
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_decode_text() {
        let inbound = decode(br#"{"type":"message","text":"hi","target":"bob"}"#).unwrap();
        let Inbound::Text(env) = inbound else {
            panic!("expected text");
        };
        assert_eq!(env.body(), Some("hi"));
        assert_eq!(env.target(), Some("bob"));
    }

    #[test]
    fn test_decode_text_alias() {
        let inbound = decode(br#"{"type":"text","text":"hi"}"#).unwrap();
        assert_eq!(inbound.kind(), "text");
    }

    #[test]
    fn test_decode_rename() {
        let inbound = decode(br#"{"type":"username","name":"alice","id":17}"#).unwrap();
        assert_eq!(
            inbound,
            Inbound::Rename(RenameRequest {
                name: "alice".to_string(),
                correlation_id: Some(json!(17)),
            })
        );
    }

    #[test]
    fn test_decode_rename_without_correlation_id() {
        let inbound = decode(br#"{"type":"rename","name":"alice"}"#).unwrap();
        assert!(matches!(inbound, Inbound::Rename(r) if r.correlation_id.is_none()));
    }

    #[test]
    fn test_decode_rename_requires_string_name() {
        assert!(matches!(
            decode(br#"{"type":"username"}"#),
            Err(RelayError::InvalidRename(_))
        ));
        assert!(matches!(
            decode(br#"{"type":"username","name":5}"#),
            Err(RelayError::InvalidRename(_))
        ));
    }

    #[test]
    fn test_decode_unknown_type_passes_through() {
        let inbound = decode(br#"{"type":"typing","text":"<b>x</b>","extra":[1,2]}"#).unwrap();
        let Inbound::Passthrough(env) = inbound else {
            panic!("expected passthrough");
        };
        assert_eq!(env.message_type(), Some("typing"));
        assert_eq!(env.get("extra"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_decode_missing_type_passes_through() {
        let inbound = decode(br#"{"text":"hello"}"#).unwrap();
        assert_eq!(inbound.kind(), "passthrough");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(b"not json"), Err(RelayError::Malformed(_))));
        assert!(matches!(decode(b"[1,2,3]"), Err(RelayError::NotAnObject)));
        assert!(matches!(decode(b"\"str\""), Err(RelayError::NotAnObject)));
    }

    #[test]
    fn test_empty_target_means_broadcast() {
        let env = envelope(json!({"type":"message","target":""}));
        assert_eq!(env.target(), None);
        let env = envelope(json!({"type":"message","target":7}));
        assert_eq!(env.target(), None);
    }

    #[test]
    fn test_stamp_sender_overwrites_client_value() {
        let mut env = envelope(json!({"type":"message","name":"mallory"}));
        env.stamp_sender(Some("alice"));
        assert_eq!(env.get("name"), Some(&json!("alice")));

        env.stamp_sender(None);
        assert_eq!(env.get("name"), None);
    }

    #[test]
    fn test_sanitize_body() {
        let mut env = envelope(json!({"text":"hello <script>bad</script> world"}));
        env.sanitize_body();
        assert_eq!(env.body(), Some("hello bad world"));

        let mut env = envelope(json!({"text":{"nested":"<b>"}}));
        env.sanitize_body();
        assert_eq!(env.get("text"), Some(&json!({"nested":"<b>"})));
    }

    #[test]
    fn test_encode_identity() {
        let out = Outbound::from(ServerMessage::Identity {
            id: ConnectionId::new(1001),
        });
        let value: Value = serde_json::from_str(&out.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type":"id","id":1001}));
    }

    #[test]
    fn test_encode_roster_with_placeholders() {
        let out = Outbound::from(ServerMessage::Roster {
            users: vec![Some("alice".to_string()), None],
        });
        let value: Value = serde_json::from_str(&out.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type":"userlist","users":["alice",null]}));
    }

    #[test]
    fn test_encode_name_rejected() {
        let out = Outbound::from(ServerMessage::NameRejected {
            id: Some(json!("req-1")),
            name: "alice1".to_string(),
        });
        let value: Value = serde_json::from_str(&out.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type":"rejectusername","id":"req-1","name":"alice1"})
        );

        let out = Outbound::from(ServerMessage::NameRejected {
            id: None,
            name: "alice1".to_string(),
        });
        let value: Value = serde_json::from_str(&out.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type":"rejectusername","name":"alice1"}));
    }

    #[test]
    fn test_encode_relayed_keeps_unknown_fields() {
        let env = envelope(json!({"type":"message","text":"hi","color":"red"}));
        let value: Value = serde_json::from_str(&Outbound::Relayed(env).encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type":"message","text":"hi","color":"red"}));
    }
}
