//! Re-exported types from external crates for convenience.
//!
//! These types are commonly used in this SDK and are re-exported here
//! so users don't need to add these dependencies to their `Cargo.toml`.

use std::fmt;

/// Dynamic JSON value and object types used for message parameters.
pub use serde_json::{Map, Value, json};

/// Structured record carried in the `parameters` field of every message.
pub type Parameters = Map<String, Value>;

/// Unwrap a JSON object literal into [`Parameters`]; non-objects become empty parameters.
pub(crate) fn object(value: Value) -> Parameters {
    match value {
        Value::Object(map) => map,
        _ => Parameters::new(),
    }
}

/// Client version identity supplied by the embedding application.
///
/// The pair is sent as the HTTP Basic user name (`VERSION.BUILD`) and, for legacy
/// authentication, inside the `connect` message (`VERSION:BUILD`).
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Version {
    pub version: String,
    pub build: String,
}

impl Version {
    #[must_use]
    pub fn new<V: Into<String>, B: Into<String>>(version: V, build: B) -> Self {
        Self {
            version: version.into(),
            build: build.into(),
        }
    }

    /// `VERSION.BUILD`, used as the Basic auth user name.
    #[must_use]
    pub fn user_name(&self) -> String {
        format!("{}.{}", self.version, self.build)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.version, self.build)
    }
}
