use serde::{Deserialize, Serialize};
use std::fmt;

/// Edit operation requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditMode {
    Inpainting,
    Outpainting,
    PreciseOutpainting,
}

impl EditMode {
    /// Accepts the canonical names and the short forms used by the web client
    /// (`inpaint`, `outpaint`, `precise-outpaint`), case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "inpainting" | "inpaint" => Some(EditMode::Inpainting),
            "outpainting" | "outpaint" => Some(EditMode::Outpainting),
            "precise_outpainting" | "precise_outpaint" => Some(EditMode::PreciseOutpainting),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EditMode::Inpainting => "INPAINTING",
            EditMode::Outpainting => "OUTPAINTING",
            EditMode::PreciseOutpainting => "PRECISE_OUTPAINTING",
        }
    }

    pub fn requires_mask(&self) -> bool {
        !matches!(self, EditMode::PreciseOutpainting)
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptInput {
    pub text: String,
    pub mode: String,
}

/// Body of `POST /generate`. Fields stay as received; the handler validates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRequest {
    pub prompt: PromptInput,
    pub base_image: String,
    #[serde(default)]
    pub mask: Option<String>,
    pub model: String,
}

impl EditRequest {
    pub fn new(
        text: impl Into<String>,
        mode: impl Into<String>,
        base_image: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            prompt: PromptInput {
                text: text.into(),
                mode: mode.into(),
            },
            base_image: base_image.into(),
            mask: None,
            model: model.into(),
        }
    }

    pub fn with_mask(mut self, mask: impl Into<String>) -> Self {
        self.mask = Some(mask.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditResponse {
    pub images: Vec<String>, // Base64 encoded PNG
    pub model_used: String,
    pub request_id: String,
    pub generation_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_mode_spellings() {
        assert_eq!(EditMode::parse("OUTPAINTING"), Some(EditMode::Outpainting));
        assert_eq!(EditMode::parse("inpaint"), Some(EditMode::Inpainting));
        assert_eq!(
            EditMode::parse("precise-outpaint"),
            Some(EditMode::PreciseOutpainting)
        );
        assert_eq!(
            EditMode::parse("Precise_Outpainting"),
            Some(EditMode::PreciseOutpainting)
        );
        assert_eq!(EditMode::parse("upscale"), None);
        assert_eq!(EditMode::parse(""), None);
    }

    #[test]
    fn only_precise_outpainting_allows_missing_mask() {
        assert!(EditMode::Inpainting.requires_mask());
        assert!(EditMode::Outpainting.requires_mask());
        assert!(!EditMode::PreciseOutpainting.requires_mask());
    }

    #[test]
    fn request_body_mask_is_optional() {
        let body = r#"{
            "prompt": {"text": "a mountain landscape", "mode": "precise-outpaint"},
            "base_image": "data:image/png;base64,AAAA",
            "model": "titan"
        }"#;
        let request: EditRequest = serde_json::from_str(body).unwrap();
        assert!(request.mask.is_none());
        assert_eq!(request.prompt.mode, "precise-outpaint");
    }
}
