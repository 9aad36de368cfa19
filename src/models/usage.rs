use super::EditMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageStatus {
    Success,
    Failure,
}

impl UsageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageStatus::Success => "SUCCESS",
            UsageStatus::Failure => "FAILURE",
        }
    }
}

/// One immutable audit entry per generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub model_used: String,
    pub mode: EditMode,
    pub prompt_text: String,
    pub input_width: u32,
    pub input_height: u32,
    pub input_image_bytes: usize,
    pub mask_image_bytes: Option<usize>,
    pub output_image_bytes: Vec<usize>,
    pub generation_time_ms: u64,
    pub status: UsageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl UsageRecord {
    pub fn is_success(&self) -> bool {
        self.status == UsageStatus::Success
    }
}
