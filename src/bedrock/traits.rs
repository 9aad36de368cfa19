use crate::{error::BackendError, models::EditMode};
use async_trait::async_trait;

/// Everything the generation backend needs for one edit call.
#[derive(Debug, Clone)]
pub struct EditTask {
    pub model_id: String,
    pub mode: EditMode,
    pub prompt: String,
    /// Base64 PNG, no data URI prefix.
    pub image: String,
    /// Base64 PNG, same dimensions as `image`.
    pub mask: String,
    pub params: TaskParams,
}

/// Fixed generation parameters taken from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskParams {
    pub number_of_images: u32,
    pub quality: String,
    pub width: u32,
    pub height: u32,
    pub cfg_scale: f32,
}

#[async_trait]
pub trait ImageEditBackend: Send + Sync {
    /// Returns the generated images as base64 PNG, in backend order.
    async fn edit(&self, task: EditTask) -> Result<Vec<String>, BackendError>;
}
