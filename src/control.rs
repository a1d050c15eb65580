//! Built-in control messages answered by the client itself.

use serde_json::Value;

use crate::Result;
use crate::config::{ConfigStore, value_text};
use crate::error::Error;
use crate::message::Message;
use crate::types::Parameters;
use crate::ws::WsError;

/// Control message types handled without involving application handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    GetConfig,
    SetConfig,
}

impl Control {
    pub fn parse(message_type: &str) -> Option<Self> {
        match message_type {
            "get_config" | "getConfig" => Some(Self::GetConfig),
            "set_config" | "setConfig" => Some(Self::SetConfig),
            _ => None,
        }
    }
}

/// Response to `get_config`: a `config` message mapping each requested name (from the
/// comma-separated `names` parameter) to its value, or `""` when unset.
pub(crate) fn config_response(store: &dyn ConfigStore, request: &Message) -> Result<Message> {
    let names = request
        .parameters
        .get("names")
        .and_then(Value::as_str)
        .ok_or_else(|| WsError::InvalidMessage("get_config requires a `names` string".to_owned()))?;

    let parameters: Parameters = names
        .split(',')
        .map(|name| {
            let value = store
                .get(name)
                .unwrap_or_else(|| Value::String(String::new()));
            (name.to_owned(), value)
        })
        .collect();

    Ok(Message::new("config", parameters).with_channel(request.channel.as_deref()))
}

/// Apply `set_config` to the store's backing file, then reload and show the result.
pub(crate) async fn apply_set_config(store: &dyn ConfigStore, parameters: &Parameters) -> Result<()> {
    let path = store
        .path()
        .ok_or_else(|| Error::validation("set_config requires a file-backed config store"))?
        .to_path_buf();

    let contents = tokio::fs::read_to_string(&path).await?;
    tokio::fs::write(&path, rewrite_lines(&contents, parameters)).await?;

    store.reload().await?;
    store.show();
    Ok(())
}

/// Replace the value of every line whose first token is a key in `parameters`.
/// Other lines pass through untouched.
pub(crate) fn rewrite_lines(contents: &str, parameters: &Parameters) -> String {
    contents
        .split_inclusive('\n')
        .map(|line| {
            match line
                .split_whitespace()
                .next()
                .and_then(|key| parameters.get_key_value(key))
            {
                Some((key, value)) => format!("{key} {}\n", value_text(value)),
                None => line.to_owned(),
            }
        })
        .collect()
}
