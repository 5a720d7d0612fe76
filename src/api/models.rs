//! Backend model identifiers

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

static MODEL_PATH: OnceLock<Regex> = OnceLock::new();

/// Strip directory components and a trailing file extension from a model id.
///
/// LM Studio reports loaded models by file path (`/models/llama-3-8b.gguf`);
/// clients expect the bare name (`llama-3-8b`). An extension must start with a
/// letter, so version dots such as `llama-3.1` survive.
pub fn bare_model_name(model_id: &str) -> &str {
    let pattern = MODEL_PATH.get_or_init(|| {
        Regex::new(r"^(?:.*[/\\])?(.+?)(?:\.[A-Za-z][A-Za-z0-9]{0,15})?$")
            .expect("model path pattern is valid")
    });

    pattern
        .captures(model_id)
        .and_then(|caps| caps.get(1))
        .map_or(model_id, |m| m.as_str())
}

/// Rewrite `data[0].id` of a model list to its bare name. Returns true if rewritten.
pub fn rewrite_model_list(list: &mut Value) -> bool {
    match list.pointer_mut("/data/0/id") {
        Some(Value::String(id)) => {
            let bare = bare_model_name(id).to_string();
            *id = bare;
            true
        }
        _ => false,
    }
}
