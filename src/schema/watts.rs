//! Built-in WaTTS plugin schemas
//!
//! Each protocol version carries a complete schema set; versions never
//! borrow schemas from each other.

use std::collections::HashMap;

use super::{Rule, Schema};
use crate::common::{Error, Result};
use crate::input::{Action, WattsVersion};

/// Keys of `conf_params`, `params` and request parameters
const PARAM_KEY: &str = "[a-z0-9_]+";

/// Response and input schemas for every supported protocol version
#[derive(Debug)]
pub struct SchemaRegistry {
    responses: HashMap<(WattsVersion, Action), Schema>,
    plugin_input: Schema,
}

impl SchemaRegistry {
    /// Build the schemas compiled into the tester
    pub fn builtin() -> Result<Self> {
        let v1: WattsVersion = "1.0.0".parse()?;

        let mut responses = HashMap::new();
        responses.insert((v1.clone(), Action::Parameter), v1_parameter()?);
        responses.insert((v1.clone(), Action::Request), v1_request());
        responses.insert((v1, Action::Revoke), v1_revoke());

        Ok(Self {
            responses,
            plugin_input: plugin_input()?,
        })
    }

    /// Schema for a plugin's response to `action` under `version`
    pub fn lookup(&self, version: &WattsVersion, action: Action) -> Result<&Schema> {
        self.responses
            .get(&(version.clone(), action))
            .ok_or_else(|| Error::UnknownSchema {
                version: version.to_string(),
                action: action.to_string(),
            })
    }

    /// Schema every canonical plugin input must satisfy
    pub fn plugin_input(&self) -> &Schema {
        &self.plugin_input
    }
}

fn param_key() -> Result<Rule> {
    Rule::pattern(PARAM_KEY).map_err(|e| Error::Internal(format!("invalid built-in schema: {e}")))
}

fn error_response() -> Rule {
    Rule::object([
        ("result", Rule::exact_str("error")),
        ("user_msg", Rule::string()),
        ("log_msg", Rule::optional(Rule::string())),
    ])
}

fn v1_parameter() -> Result<Schema> {
    let conf_param = Rule::object([
        ("name", param_key()?),
        ("type", Rule::string()),
        (
            "default",
            Rule::OneOf(vec![Rule::string(), Rule::bool(), Rule::number()]),
        ),
        ("description", Rule::string()),
    ]);
    let request_param = Rule::object([
        ("key", param_key()?),
        ("name", Rule::string()),
        ("description", Rule::string()),
        ("type", Rule::string()),
        ("mandatory", Rule::optional(Rule::bool())),
    ]);

    Ok(Schema::new(
        "parameter 1.0.0",
        Rule::object([
            ("result", Rule::exact_str("ok")),
            ("conf_params", Rule::array_of(conf_param)),
            ("request_params", Rule::array_of(Rule::array_of(request_param))),
            ("version", Rule::string()),
        ]),
    ))
}

fn v1_request() -> Schema {
    let credential = Rule::object([
        ("name", Rule::string()),
        ("type", Rule::string()),
        ("value", Rule::Any),
    ]);

    Schema::new(
        "request 1.0.0",
        Rule::OneOf(vec![
            Rule::object([
                ("result", Rule::exact_str("ok")),
                ("credential", Rule::array_of(credential)),
                ("state", Rule::string()),
            ]),
            error_response(),
            Rule::object([
                ("result", Rule::exact_str("oidc_login")),
                ("provider", Rule::string()),
                ("msg", Rule::string()),
            ]),
        ]),
    )
}

fn v1_revoke() -> Schema {
    Schema::new(
        "revoke 1.0.0",
        Rule::OneOf(vec![
            Rule::object([("result", Rule::exact_str("ok"))]),
            error_response(),
        ]),
    )
}

fn plugin_input() -> Result<Schema> {
    Ok(Schema::new(
        "plugin input",
        Rule::object([
            ("watts_version", Rule::string()),
            ("watts_userid", Rule::string()),
            ("action", Rule::string()),
            ("cred_state", Rule::string()),
            ("conf_params", Rule::map_of(param_key()?, Rule::Any)),
            ("params", Rule::map_of(param_key()?, Rule::Any)),
            (
                "user_info",
                Rule::object([("iss", Rule::string()), ("sub", Rule::string())]),
            ),
            ("additional_logins", Rule::array_of(Rule::Any)),
        ]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PathSegment;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builtin().unwrap()
    }

    fn v1() -> WattsVersion {
        "1.0.0".parse().unwrap()
    }

    #[test]
    fn test_minimal_parameter_response_passes() {
        let registry = registry();
        let schema = registry.lookup(&v1(), Action::Parameter).unwrap();
        let outcome = schema.validate(&json!({
            "result": "ok",
            "conf_params": [],
            "request_params": [],
            "version": "1.0.0"
        }));
        assert!(outcome.passed());
        assert!(outcome.path().is_root());
    }

    #[test]
    fn test_parameter_response_missing_conf_params() {
        let registry = registry();
        let schema = registry.lookup(&v1(), Action::Parameter).unwrap();
        let outcome = schema.validate(&json!({"result": "ok"}));
        assert_eq!(
            outcome.path().segments(),
            &[PathSegment::Key("conf_params".to_string())]
        );
        assert_eq!(outcome.path().to_string(), "conf_params");
    }

    #[test]
    fn test_full_parameter_response() {
        let registry = registry();
        let schema = registry.lookup(&v1(), Action::Parameter).unwrap();
        let response = json!({
            "result": "ok",
            "version": "0.3.1",
            "conf_params": [
                {"name": "cert_valid_duration", "type": "string", "default": "11",
                 "description": "validity in days"},
                {"name": "show_issuer", "type": "boolean", "default": true,
                 "description": "include the issuer"}
            ],
            "request_params": [[
                {"key": "pub_key", "name": "public key", "description": "your key",
                 "type": "textarea", "mandatory": true}
            ]]
        });
        assert!(schema.validate(&response).passed());

        let mut bad = response.clone();
        bad["request_params"][0][0]["key"] = json!("Public Key");
        assert_eq!(
            schema.validate(&bad).path().to_string(),
            "request_params[0][0].key"
        );
    }

    #[test]
    fn test_request_alternatives() {
        let registry = registry();
        let schema = registry.lookup(&v1(), Action::Request).unwrap();
        assert!(schema
            .validate(&json!({
                "result": "ok",
                "credential": [{"name": "Username", "type": "text", "value": "alice"}],
                "state": "alice@host"
            }))
            .passed());
        assert!(schema
            .validate(&json!({"result": "error", "user_msg": "nope"}))
            .passed());
        assert!(schema
            .validate(&json!({"result": "oidc_login", "provider": "iam", "msg": "login"}))
            .passed());
        assert!(!schema.validate(&json!({"result": "error"})).passed());
    }

    #[test]
    fn test_revoke_schema() {
        let registry = registry();
        let schema = registry.lookup(&v1(), Action::Revoke).unwrap();
        assert!(schema.validate(&json!({"result": "ok"})).passed());
        assert!(!schema.validate(&json!({"result": "done"})).passed());
    }

    #[test]
    fn test_unknown_version_has_no_fallback() {
        let registry = registry();
        let v2: WattsVersion = "2.0.0".parse().unwrap();
        assert!(matches!(
            registry.lookup(&v2, Action::Parameter),
            Err(Error::UnknownSchema { version, action })
                if version == "2.0.0" && action == "parameter"
        ));
    }
}
