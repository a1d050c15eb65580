//! Controller configuration collaborator.
//!
//! The client never owns configuration. It reads named keys from a [`ConfigStore`] on every
//! connection attempt, and the legacy `set_config` message rewrites the store's backing file
//! and asks it to reload.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;

use crate::Result;
use crate::error::Error;
use crate::types::Map;

pub const SERVER_NAME: &str = "server_name";
pub const SECRET_KEY: &str = "secret_key";
pub const SECURE_SERVER: &str = "secure_server";
pub const OLD_AUTH: &str = "old_auth";
pub const NAME: &str = "name";
pub const SUBSCRIBE_CHILDREN: &str = "subscribe_children";

/// Externally owned key/value configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync + 'static {
    /// Current value for `key`, if set.
    fn get(&self, key: &str) -> Option<Value>;

    /// Backing line-oriented file rewritten by `set_config`, if any.
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Re-read the backing storage after it was rewritten.
    async fn reload(&self) -> Result<()> {
        Ok(())
    }

    /// Display the effective configuration.
    fn show(&self) {}
}

#[async_trait]
impl ConfigStore for Map<String, Value> {
    fn get(&self, key: &str) -> Option<Value> {
        Map::get(self, key).cloned()
    }
}

/// File-backed store: one `key value` setting per line.
///
/// Blank lines and lines starting with `#` are skipped. Values that parse as JSON scalars
/// (`true`, `12`, `"quoted"`) keep that type; everything else is stored as text.
#[derive(Debug)]
pub struct FileConfig {
    path: PathBuf,
    values: RwLock<BTreeMap<String, Value>>,
}

impl FileConfig {
    /// Load settings from `path`.
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let values = parse_lines(&std::fs::read_to_string(&path)?);
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }
}

#[async_trait]
impl ConfigStore for FileConfig {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    async fn reload(&self) -> Result<()> {
        let values = parse_lines(&tokio::fs::read_to_string(&self.path).await?);
        *self.values.write().unwrap_or_else(PoisonError::into_inner) = values;
        Ok(())
    }

    fn show(&self) {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in values.iter() {
            let shown = if key == SECRET_KEY {
                "********".to_owned()
            } else {
                value_text(value)
            };
            #[cfg(feature = "tracing")]
            tracing::info!("{key}: {shown}");
            #[cfg(not(feature = "tracing"))]
            let _ = (key, shown);
        }
    }
}

fn parse_lines(contents: &str) -> BTreeMap<String, Value> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.splitn(2, char::is_whitespace);
            let key = parts.next()?;
            let raw = parts.next().unwrap_or_default().trim();
            let value = match serde_json::from_str::<Value>(raw) {
                Ok(v) if !v.is_array() && !v.is_object() => v,
                _ => Value::String(raw.to_owned()),
            };
            Some((key.to_owned(), value))
        })
        .collect()
}

/// Plain text form of a config value: strings unquoted, everything else as JSON.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Interpret a config value as a boolean flag.
pub(crate) fn as_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    }
}

/// Connection-relevant view of the store, read fresh for every connection attempt.
#[derive(Debug)]
pub(crate) struct Settings {
    pub server_name: String,
    pub secret_key: SecretString,
    pub secure_server: Option<bool>,
    pub old_auth: bool,
    pub name: Option<String>,
    pub subscribe_children: bool,
}

impl Settings {
    pub fn from_store(store: &dyn ConfigStore) -> Result<Self> {
        let text = |key: &str| {
            store
                .get(key)
                .map(|v| value_text(&v))
                .filter(|v| !v.is_empty())
        };
        let flag = |key: &str| store.get(key).as_ref().map(as_flag);

        Ok(Self {
            server_name: text(SERVER_NAME).ok_or_else(|| Error::missing_setting(SERVER_NAME))?,
            secret_key: text(SECRET_KEY)
                .map(SecretString::from)
                .ok_or_else(|| Error::missing_setting(SECRET_KEY))?,
            secure_server: flag(SECURE_SERVER),
            old_auth: flag(OLD_AUTH).unwrap_or(false),
            name: text(NAME),
            subscribe_children: flag(SUBSCRIBE_CHILDREN).unwrap_or(false),
        })
    }

    /// Explicit `secure_server` wins; otherwise only loopback hosts use plain `ws`.
    pub fn is_secure(&self) -> bool {
        self.secure_server.unwrap_or_else(|| {
            let host = self.server_name.split(':').next().unwrap_or_default();
            host != "localhost" && host != "127.0.0.1"
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use serde_json::json;

    use super::*;
    use crate::error::Kind;

    fn store(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test stores are objects"),
        }
    }

    #[test]
    fn settings_defaults() -> Result<()> {
        let settings = Settings::from_store(&store(json!({
            "server_name": "example.com",
            "secret_key": "abc",
        })))?;

        assert!(!settings.old_auth);
        assert!(!settings.subscribe_children);
        assert_eq!(settings.name, None);
        assert!(settings.is_secure());
        Ok(())
    }

    #[test]
    fn loopback_hosts_are_insecure_unless_overridden() -> Result<()> {
        let local = Settings::from_store(&store(json!({
            "server_name": "localhost:5000",
            "secret_key": "abc",
        })))?;
        assert!(!local.is_secure());

        let loopback = Settings::from_store(&store(json!({
            "server_name": "127.0.0.1",
            "secret_key": "abc",
        })))?;
        assert!(!loopback.is_secure());

        let forced = Settings::from_store(&store(json!({
            "server_name": "localhost:5000",
            "secret_key": "abc",
            "secure_server": true,
        })))?;
        assert!(forced.is_secure());

        let plain = Settings::from_store(&store(json!({
            "server_name": "example.com",
            "secret_key": "abc",
            "secure_server": false,
        })))?;
        assert!(!plain.is_secure());
        Ok(())
    }

    #[test]
    fn missing_server_name_is_config_error() {
        let err = Settings::from_store(&store(json!({ "secret_key": "abc" }))).unwrap_err();
        assert_eq!(err.kind(), Kind::Config);
        assert!(err.to_string().contains(SERVER_NAME));
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert!(as_flag(&json!(true)));
        assert!(as_flag(&json!(1)));
        assert!(as_flag(&json!("Yes")));
        assert!(as_flag(&json!("1")));
        assert!(!as_flag(&json!("false")));
        assert!(!as_flag(&json!(0)));
        assert!(!as_flag(&Value::Null));
    }

    #[tokio::test]
    async fn file_config_parses_and_reloads() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "# controller settings")?;
        writeln!(file, "server_name example.com")?;
        writeln!(file, "old_auth true")?;
        writeln!(file)?;
        writeln!(file, "name North Greenhouse")?;
        writeln!(file, "port 8080")?;
        file.flush()?;

        let config = FileConfig::load(file.path())?;
        assert_eq!(config.get("server_name"), Some(json!("example.com")));
        assert_eq!(config.get("old_auth"), Some(json!(true)));
        assert_eq!(config.get("name"), Some(json!("North Greenhouse")));
        assert_eq!(config.get("port"), Some(json!(8080)));
        assert_eq!(config.get("# controller"), None);
        assert_eq!(config.path(), Some(file.path()));

        std::fs::write(file.path(), "server_name other.example.com\n")?;
        config.reload().await?;
        assert_eq!(config.get("server_name"), Some(json!("other.example.com")));
        assert_eq!(config.get("old_auth"), None);
        Ok(())
    }
}
