//! Merging of input documents
//!
//! Precedence, highest first: inline JSON string, JSON file, parameters
//! extracted from a WaTTS config, compiled-in default. A key present in a
//! higher source replaces the lower value whole; nested objects are not
//! unioned and arrays are not concatenated.

use regex::Regex;
use serde_json::{Map, Value};

use super::PluginInput;
use crate::common::{Error, Result};

/// Merge `overrides` over `base`
///
/// `overrides` is ordered lowest precedence first, so the last document
/// to mention a key decides its value.
pub fn merge(base: PluginInput, overrides: impl IntoIterator<Item = PluginInput>) -> PluginInput {
    let mut merged = base.into_map();
    for layer in overrides {
        for (key, value) in layer.into_map() {
            tracing::trace!(%key, "Override replaces key");
            merged.insert(key, value);
        }
    }
    PluginInput(merged)
}

/// Extract `service.<id>.plugin.<key> = <value>` lines from a WaTTS config
///
/// Returns an override document carrying the values as `conf_params`.
/// `source_name` is only used in the error when nothing matches.
pub fn extract_service_params(
    config_text: &str,
    service_id: &str,
    source_name: &str,
) -> Result<PluginInput> {
    let pattern = format!(
        r"(?m)^[ \t]*service\.{}\.plugin\.(?P<key>[^\s=]+)[ \t]*=[ \t]*(?P<value>.*?)[ \t\r]*$",
        regex::escape(service_id)
    );
    let extractor = Regex::new(&pattern).map_err(|e| Error::Internal(e.to_string()))?;

    let mut conf_params = Map::new();
    for captures in extractor.captures_iter(config_text) {
        let key = &captures["key"];
        let value = &captures["value"];
        conf_params.insert(key.to_string(), Value::String(value.to_string()));
    }

    if conf_params.is_empty() {
        return Err(Error::ConfigExtraction {
            service: service_id.to_string(),
            path: source_name.to_string(),
        });
    }

    tracing::debug!(
        service = service_id,
        count = conf_params.len(),
        "Extracted plugin parameters from config"
    );

    let mut extracted = PluginInput::empty();
    extracted.set("conf_params", Value::Object(conf_params));
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> PluginInput {
        PluginInput::from_value(value, "test").unwrap()
    }

    const WATTS_CONF: &str = "\
service.info.description = Simple Info Service
service.info.cmd = /usr/lib/watts/plugins/info.py
service.info.plugin.show_issuer = true
service.info.plugin.greeting = hello world
service.x509.plugin.cert_valid_duration = 11
";

    #[test]
    fn test_merge_without_overrides_is_identity() {
        let base = PluginInput::default();
        assert_eq!(merge(base.clone(), Vec::new()), base);
    }

    #[test]
    fn test_precedence_is_total() {
        let default = doc(json!({"a": 4, "b": 4, "c": 4, "d": 4}));
        let extracted = doc(json!({"a": 3, "b": 3, "c": 3}));
        let file = doc(json!({"a": 2, "b": 2}));
        let string = doc(json!({"a": 1}));

        let merged = merge(default, [extracted, file, string]);
        assert_eq!(merged.get("a"), Some(&json!(1)));
        assert_eq!(merged.get("b"), Some(&json!(2)));
        assert_eq!(merged.get("c"), Some(&json!(3)));
        assert_eq!(merged.get("d"), Some(&json!(4)));
    }

    #[test]
    fn test_nested_objects_replaced_wholesale() {
        let base = PluginInput::default();
        let over = doc(json!({"user_info": {"sub": "other"}}));

        let merged = merge(base, [over]);
        assert_eq!(merged.get("user_info"), Some(&json!({"sub": "other"})));
    }

    #[test]
    fn test_arrays_replaced_not_concatenated() {
        let base = doc(json!({"additional_logins": [1, 2]}));
        let over = doc(json!({"additional_logins": [3]}));
        let merged = merge(base, [over]);
        assert_eq!(merged.get("additional_logins"), Some(&json!([3])));
    }

    #[test]
    fn test_extract_service_params() {
        let extracted = extract_service_params(WATTS_CONF, "info", "watts.conf").unwrap();
        assert_eq!(
            extracted.get("conf_params"),
            Some(&json!({"show_issuer": "true", "greeting": "hello world"}))
        );
        assert_eq!(extracted.iter().count(), 1);
    }

    #[test]
    fn test_extract_uses_first_line_too() {
        let text = "service.a.plugin.first = 1\nservice.a.plugin.second = 2";
        let extracted = extract_service_params(text, "a", "watts.conf").unwrap();
        assert_eq!(
            extracted.get("conf_params"),
            Some(&json!({"first": "1", "second": "2"}))
        );
    }

    #[test]
    fn test_extract_empty_value_stays_on_its_line() {
        let text = "service.a.plugin.k =\nservice.a.plugin.j = 2\nservice.a.plugin.tight=3\r\n";
        let extracted = extract_service_params(text, "a", "watts.conf").unwrap();
        assert_eq!(
            extracted.get("conf_params"),
            Some(&json!({"k": "", "j": "2", "tight": "3"}))
        );
    }

    #[test]
    fn test_extract_service_id_is_literal() {
        let text = "service.aXb.plugin.key = v\n";
        assert!(extract_service_params(text, "a.b", "watts.conf").is_err());
    }

    #[test]
    fn test_extract_without_matches_fails() {
        match extract_service_params(WATTS_CONF, "missing", "watts.conf") {
            Err(Error::ConfigExtraction { service, path }) => {
                assert_eq!(service, "missing");
                assert_eq!(path, "watts.conf");
            }
            other => panic!("expected extraction error, got {other:?}"),
        }
    }

    #[test]
    fn test_extracted_conf_params_lose_to_file_override() {
        let extracted = extract_service_params(WATTS_CONF, "info", "watts.conf").unwrap();
        let file = doc(json!({"conf_params": {"greeting": "hi"}}));

        let merged = merge(PluginInput::default(), [extracted, file]);
        assert_eq!(merged.get("conf_params"), Some(&json!({"greeting": "hi"})));
    }
}
