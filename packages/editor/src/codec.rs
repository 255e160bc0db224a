//! # Text Codecs
//!
//! The editor surface holds the config as text. A [`TextCodec`] turns that
//! text into a [`Value`] tree and back. Both codecs require a mapping at the
//! root; blank text is an empty config.

use crate::errors::CodecError;
use stagesync_document::Value;

pub trait TextCodec: Send + Sync {
    /// Short format name for logs
    fn name(&self) -> &'static str;

    fn decode(&self, text: &str) -> Result<Value, CodecError>;

    fn encode(&self, value: &Value) -> Result<String, CodecError>;
}

fn require_mapping(value: Value) -> Result<Value, CodecError> {
    match value {
        Value::Object(_) => Ok(value),
        // A document holding only comments
        Value::Null => Ok(Value::object()),
        other => Err(CodecError::NotAMapping(other.kind())),
    }
}

/// YAML, the format experiment configs are authored in
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl TextCodec for YamlCodec {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn decode(&self, text: &str) -> Result<Value, CodecError> {
        if text.trim().is_empty() {
            return Ok(Value::object());
        }
        require_mapping(serde_yaml_ng::from_str(text)?)
    }

    fn encode(&self, value: &Value) -> Result<String, CodecError> {
        Ok(serde_yaml_ng::to_string(value)?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JsonCodec {
    pub pretty: bool,
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl TextCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&self, text: &str) -> Result<Value, CodecError> {
        if text.trim().is_empty() {
            return Ok(Value::object());
        }
        require_mapping(serde_json::from_str(text)?)
    }

    fn encode(&self, value: &Value) -> Result<String, CodecError> {
        let mut text = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        if self.pretty {
            text.push('\n');
        }
        Ok(text)
    }
}

/// Codec for a file name, by extension; YAML unless it ends in `.json`
pub fn codec_for_path(path: &std::path::Path) -> Box<dyn TextCodec> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => Box::new(JsonCodec::default()),
        _ => Box::new(YamlCodec),
    }
}
