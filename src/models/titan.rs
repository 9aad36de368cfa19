use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TitanTaskType {
    Inpainting,
    Outpainting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutPaintingMode {
    Default,
    Precise,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InPaintingParams {
    pub text: String,
    pub image: String,
    pub mask_image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutPaintingParams {
    pub text: String,
    pub image: String,
    pub mask_image: String,
    pub out_painting_mode: OutPaintingMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageGenerationConfig {
    pub number_of_images: u32,
    pub quality: String,
    pub height: u32,
    pub width: u32,
    pub cfg_scale: f32,
}

/// `InvokeModel` body for Titan Image Generator edit tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitanImageRequest {
    pub task_type: TitanTaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_painting_params: Option<InPaintingParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_painting_params: Option<OutPaintingParams>,
    pub image_generation_config: ImageGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TitanImageResponse {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}
