//! Generation request envelope.
//!
//! Requests form a closed set of kinds sharing one envelope; routing keys off
//! the kind (the queue's capability class) and the model string. The
//! provider-bound parameters stay opaque JSON so the engine never interprets
//! chat messages, image options, or speech inputs.

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Capability class of a generation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    #[default]
    Chat,
    Image,
    Speech,
}

/// All kinds, in queue-scan order.
pub const ALL_KINDS: [GenerationKind; 3] = [
    GenerationKind::Chat,
    GenerationKind::Image,
    GenerationKind::Speech,
];

impl GenerationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationKind::Chat => "chat",
            GenerationKind::Image => "image",
            GenerationKind::Speech => "speech",
        }
    }
}

impl std::fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generation request: kind tag, target model, and opaque parameters.
///
/// `kind` defaults to `chat` when omitted, so the minimal submission body is
/// `{"model": "..."}` plus whatever the provider expects (flattened into
/// `params`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(default)]
    pub kind: GenerationKind,
    pub model: String,
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl GenerationRequest {
    /// Minimal submission-time validation.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.model.trim().is_empty() {
            return Err(DispatchError::Validation(
                "request.model must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_defaults_to_chat() {
        let req: GenerationRequest = serde_json::from_str(r#"{"model":"gpt-x"}"#).unwrap();
        assert_eq!(req.kind, GenerationKind::Chat);
        assert_eq!(req.model, "gpt-x");
        assert!(req.params.is_empty());
    }

    #[test]
    fn extra_fields_flatten_into_params() {
        let req: GenerationRequest = serde_json::from_str(
            r#"{"kind":"image","model":"sdxl","size":"1024x1024","steps":30}"#,
        )
        .unwrap();
        assert_eq!(req.kind, GenerationKind::Image);
        assert_eq!(req.params["size"], "1024x1024");
        assert_eq!(req.params["steps"], 30);
    }

    #[test]
    fn params_serialize_flattened() {
        let mut req = GenerationRequest {
            kind: GenerationKind::Speech,
            model: "tts-1".into(),
            params: serde_json::Map::new(),
        };
        req.params
            .insert("input".into(), serde_json::Value::String("hello".into()));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["kind"], "speech");
        assert_eq!(json["input"], "hello");
    }

    #[test]
    fn empty_model_fails_validation() {
        let req: GenerationRequest = serde_json::from_str(r#"{"model":"  "}"#).unwrap();
        let err = req.validate().unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }
}
