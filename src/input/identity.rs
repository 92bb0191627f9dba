//! User id derivation
//!
//! WaTTS identifies a user by the base64url encoding of a small JSON object
//! naming the issuer and subject. Plugins may rely on the exact bytes, so
//! the encoding below must not change.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;

use crate::common::{Error, Result};

/// Field order here is the serialized key order
#[derive(Serialize)]
struct UserIdSeed<'a> {
    issuer: &'a str,
    subject: &'a str,
}

fn required_str<'a>(user_info: &'a Value, key: &str) -> Result<&'a str> {
    match user_info.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(Error::InvalidPluginInput {
            path: format!("user_info.{key}"),
            cause: "expected string".to_string(),
        }),
        None => Err(Error::InvalidPluginInput {
            path: format!("user_info.{key}"),
            cause: "missing required field".to_string(),
        }),
    }
}

/// Derive `watts_userid` from a `user_info` object
pub fn derive_user_id(user_info: &Value) -> Result<String> {
    let seed = UserIdSeed {
        issuer: required_str(user_info, "iss")?,
        subject: required_str(user_info, "sub")?,
    };

    let json = serde_json::to_string(&seed)?;
    // Slashes are escaped the way the WaTTS server encodes them
    let escaped = json.replace('/', "\\/");
    Ok(URL_SAFE_NO_PAD.encode(escaped.as_bytes()))
}
