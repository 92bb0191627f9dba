//! Plugin input documents
//!
//! A plugin input starts as the compiled-in default document, gets the
//! user's overrides merged over it, is stamped with the derived user id
//! and finally validated before it is handed to a plugin.

mod identity;
mod merge;
mod sources;

pub use identity::derive_user_id;
pub use merge::{extract_service_params, merge};
pub use sources::{read_json_object, read_text, InputSources};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::common::{Error, Result};
use crate::schema::SchemaRegistry;

/// Protocol version of the compiled-in default document
pub const DEFAULT_WATTS_VERSION: &str = "1.0.0";

/// The action a plugin is asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Describe the configurable parameters
    Parameter,
    /// Issue a credential
    Request,
    /// Revoke a credential
    Revoke,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Parameter => "parameter",
            Action::Request => "request",
            Action::Revoke => "revoke",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "parameter" => Ok(Action::Parameter),
            "request" => Ok(Action::Request),
            "revoke" => Ok(Action::Revoke),
            other => Err(Error::InvalidAction(other.to_string())),
        }
    }
}

/// Strictly parsed `watts_version`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WattsVersion(semver::Version);

impl WattsVersion {
    /// Parse a version from the `watts_version` field value
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => s.parse(),
            other => Err(Error::UnsupportedVersion(other.to_string())),
        }
    }
}

impl FromStr for WattsVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        semver::Version::parse(s)
            .map(WattsVersion)
            .map_err(|_| Error::UnsupportedVersion(s.to_string()))
    }
}

impl fmt::Display for WattsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A plugin request document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginInput(Map<String, Value>);

impl Default for PluginInput {
    /// The compiled-in default document
    fn default() -> Self {
        let mut map = Map::new();
        map.insert("action".into(), json!(Action::Parameter.as_str()));
        map.insert("watts_version".into(), json!(DEFAULT_WATTS_VERSION));
        map.insert("cred_state".into(), json!("undefined"));
        map.insert("conf_params".into(), json!({}));
        map.insert("params".into(), json!({}));
        map.insert(
            "user_info".into(),
            json!({
                "iss": "https://issuer.example.com",
                "sub": "123456789",
            }),
        );
        map.insert("additional_logins".into(), json!([]));
        PluginInput(map)
    }
}

impl PluginInput {
    /// An input with no keys, used for override documents
    pub fn empty() -> Self {
        PluginInput(Map::new())
    }

    /// Parse an override document from JSON text
    ///
    /// `source_name` names where the text came from for error messages.
    pub fn from_json_str(text: &str, source_name: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Error::malformed_override(source_name, e))?;
        Self::from_value(value, source_name)
    }

    /// Wrap a JSON value, which must be an object
    pub fn from_value(value: Value, source_name: &str) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(PluginInput(map)),
            other => Err(Error::malformed_override(
                source_name,
                format!("expected a JSON object, found {}", crate::schema::Kind::of(&other)),
            )),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Recompute `watts_userid` from `user_info`
    pub fn stamp_user_id(&mut self) -> Result<()> {
        let user_info = self
            .get("user_info")
            .ok_or_else(|| Error::InvalidPluginInput {
                path: "user_info".to_string(),
                cause: "missing required field".to_string(),
            })?;
        let user_id = derive_user_id(user_info)?;
        self.set("watts_userid", Value::String(user_id));
        Ok(())
    }

    /// The action named by the document itself
    fn own_action(&self) -> Result<Action> {
        match self.get("action") {
            Some(Value::String(s)) => s.parse(),
            Some(other) => Err(Error::InvalidAction(other.to_string())),
            None => Err(Error::MissingInput("plugin action".to_string())),
        }
    }

    /// Turn a merged document into a canonical input
    ///
    /// Stamps the user id, resolves the action (an explicit `action`
    /// replaces the document's own), parses the version and validates the
    /// result against the plugin input schema.
    pub fn canonicalize(
        mut self,
        action: Option<Action>,
        schemas: &SchemaRegistry,
    ) -> Result<CanonicalInput> {
        self.stamp_user_id()?;

        let action = match action {
            Some(action) => action,
            None => self.own_action()?,
        };
        self.set("action", Value::String(action.as_str().to_string()));

        let version = match self.get("watts_version") {
            Some(value) => WattsVersion::from_value(value)?,
            None => return Err(Error::MissingInput("watts_version".to_string())),
        };

        let outcome = schemas.plugin_input().validate(&self.to_value());
        if let Some((path, cause)) = outcome.failure() {
            return Err(Error::InvalidPluginInput {
                path: path.to_string(),
                cause: cause.to_string(),
            });
        }

        tracing::debug!(%action, %version, "Built canonical plugin input");
        Ok(CanonicalInput {
            input: self,
            action,
            version,
        })
    }
}

/// A merged, identity-stamped and validated plugin input
#[derive(Debug, Clone)]
pub struct CanonicalInput {
    pub input: PluginInput,
    pub action: Action,
    pub version: WattsVersion,
}

impl CanonicalInput {
    /// Compact JSON bytes sent to the plugin
    pub fn payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.input)?)
    }
}
