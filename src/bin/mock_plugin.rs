//! Mock WaTTS plugin binary for integration testing
//!
//! Reads the base64 encoded input from its first argument, or from
//! `WATTS_PARAMETER` when no argument is given, and answers according to
//! the requested action. `params.mock` selects a misbehaviour:
//! `error`, `incomplete`, `garbage` or `crash`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

fn read_input() -> Result<Value, String> {
    let encoded = match std::env::args().nth(1) {
        Some(arg) => arg,
        None => std::env::var("WATTS_PARAMETER").map_err(|_| "no input given".to_string())?,
    };
    let bytes = STANDARD.decode(encoded.trim()).map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

fn respond(input: &Value) -> Value {
    let user_id = input["watts_userid"].clone();
    match input["action"].as_str().unwrap_or_default() {
        "parameter" => json!({
            "result": "ok",
            "version": "1.0.0",
            "conf_params": [
                {"name": "greeting", "type": "string", "default": "hello",
                 "description": "text shown to the user"},
                {"name": "verbose", "type": "boolean", "default": false,
                 "description": "log more"}
            ],
            "request_params": []
        }),
        "request" => json!({
            "result": "ok",
            "credential": [{"name": "user id", "type": "text", "value": user_id}],
            "state": user_id
        }),
        _ => json!({"result": "ok"}),
    }
}

fn main() {
    let input = match read_input() {
        Ok(input) => input,
        Err(e) => {
            eprintln!("mock plugin: {e}");
            std::process::exit(2);
        }
    };

    let response = match input["params"]["mock"].as_str() {
        Some("error") => json!({"result": "error", "user_msg": "mock failure"}),
        Some("incomplete") => json!({"result": "ok"}),
        Some("garbage") => {
            println!("this is not json");
            return;
        }
        Some("crash") => {
            eprintln!("mock plugin crashed");
            std::process::exit(1);
        }
        _ => respond(&input),
    };

    println!("{response}");
}
