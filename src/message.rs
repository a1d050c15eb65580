//! Wire message format.
//!
//! Each frame carries one JSON record with a required `type` and `parameters`, plus
//! optional `channel` (request/response correlation) and `folder` (routing scope).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::Result;
use crate::types::Parameters;
use crate::ws::WsError;

/// A single message exchanged with the server.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub message_type: String,
    pub parameters: Parameters,
    /// Read leniently: numbers and booleans become text, other non-strings are dropped.
    #[serde(
        default,
        deserialize_with = "text_from_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub channel: Option<String>,
    #[serde(
        default,
        deserialize_with = "text_from_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub folder: Option<String>,
}

impl Message {
    #[must_use]
    pub fn new<T: Into<String>>(message_type: T, parameters: Parameters) -> Self {
        Self {
            message_type: message_type.into(),
            parameters,
            channel: None,
            folder: None,
        }
    }

    /// Attach a correlation channel. `None` and empty strings leave the field unset.
    #[must_use]
    pub fn with_channel(mut self, channel: Option<&str>) -> Self {
        self.channel = non_empty(channel);
        self
    }

    /// Attach a routing folder. `None` and empty strings leave the field unset.
    #[must_use]
    pub fn with_folder(mut self, folder: Option<&str>) -> Self {
        self.folder = non_empty(folder);
        self
    }

    /// Compact JSON followed by a newline, one message per frame.
    pub fn encode(&self) -> Result<String> {
        let mut text = serde_json::to_string(self)?;
        text.push('\n');
        Ok(text)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_owned)
}

/// Optional text field that also accepts a number or boolean. Empty strings, `null`,
/// arrays and objects read as unset.
fn text_from_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => text,
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => return Ok(None),
    };
    Ok(Some(text).filter(|t| !t.is_empty()))
}

/// Outcome of decoding one inbound frame.
#[derive(Debug)]
pub(crate) enum Inbound {
    Message(Message),
    /// Well-formed JSON that is not a `type`/`parameters` record.
    Ignored,
}

/// Decode an inbound text frame.
///
/// Malformed JSON is an error; JSON lacking `type` or `parameters` is ignored.
pub(crate) fn decode(text: &str) -> Result<Inbound> {
    let value: Value = serde_json::from_str(text).map_err(WsError::MessageParse)?;

    let is_message = value
        .as_object()
        .is_some_and(|obj| obj.contains_key("type") && obj.contains_key("parameters"));
    if !is_message {
        return Ok(Inbound::Ignored);
    }

    let message = serde_json::from_value(value).map_err(WsError::MessageParse)?;
    Ok(Inbound::Message(message))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> Parameters {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test parameters are objects"),
        }
    }

    #[test]
    fn empty_channel_and_folder_are_omitted() -> Result<()> {
        let message = Message::new("ping", Parameters::new())
            .with_channel(Some(""))
            .with_folder(None);

        assert_eq!(message.encode()?, "{\"type\":\"ping\",\"parameters\":{}}\n");
        Ok(())
    }

    #[test]
    fn channel_and_folder_are_sent_when_present() -> Result<()> {
        let message = Message::new("update", params(json!({"value": 3})))
            .with_channel(Some("c1"))
            .with_folder(Some("/devices/a"));

        let encoded: Value = serde_json::from_str(message.encode()?.trim_end())?;
        assert_eq!(
            encoded,
            json!({
                "type": "update",
                "parameters": {"value": 3},
                "channel": "c1",
                "folder": "/devices/a",
            })
        );
        Ok(())
    }

    #[test]
    fn decode_reads_channel() -> Result<()> {
        let inbound = decode(r#"{"type":"get_config","parameters":{"names":"a"},"channel":"x"}"#)?;

        let Inbound::Message(message) = inbound else {
            panic!("expected a message");
        };
        assert_eq!(message.message_type, "get_config");
        assert_eq!(message.channel.as_deref(), Some("x"));
        assert_eq!(message.folder, None);
        Ok(())
    }

    #[test]
    fn decode_accepts_scalar_channel_and_folder() -> Result<()> {
        let inbound = decode(r#"{"type":"get_config","parameters":{},"channel":7,"folder":true}"#)?;

        let Inbound::Message(message) = inbound else {
            panic!("expected a message");
        };
        assert_eq!(message.channel.as_deref(), Some("7"));
        assert_eq!(message.folder.as_deref(), Some("true"));
        Ok(())
    }

    #[test]
    fn decode_drops_structured_or_empty_channel_and_folder() -> Result<()> {
        let inbound = decode(
            r#"{"type":"update","parameters":{"v":1},"channel":"","folder":{"path":"/a"}}"#,
        )?;

        let Inbound::Message(message) = inbound else {
            panic!("expected a message");
        };
        assert_eq!(message.parameters, params(json!({"v": 1})));
        assert_eq!(message.channel, None);
        assert_eq!(message.folder, None);
        Ok(())
    }

    #[test]
    fn decode_ignores_records_without_parameters() -> Result<()> {
        assert!(matches!(decode(r#"{"type":"hello"}"#)?, Inbound::Ignored));
        assert!(matches!(decode("[1,2,3]")?, Inbound::Ignored));
        Ok(())
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let err = decode("{\"type\":").unwrap_err();
        assert_eq!(err.kind(), crate::error::Kind::WebSocket);
        assert!(err.downcast_ref::<WsError>().is_some());
    }
}
