use crate::{
    bedrock::traits::{EditTask, ImageEditBackend},
    error::BackendError,
    models::{
        EditMode, ImageGenerationConfig, InPaintingParams, OutPaintingMode, OutPaintingParams,
        TitanImageRequest, TitanImageResponse, TitanTaskType,
    },
};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::{
    error::{ProvideErrorMetadata, SdkError},
    operation::invoke_model::InvokeModelError,
    primitives::Blob,
    Client,
};

#[derive(Clone)]
pub struct ImageClient {
    client: Client,
}

impl ImageClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn supported_models() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            (
                "amazon.titan-image-generator-v1",
                "Titan Image Generator G1",
                "Amazon",
            ),
            (
                "amazon.titan-image-generator-v2:0",
                "Titan Image Generator G1 v2",
                "Amazon",
            ),
        ]
    }
}

/// Maps an edit task onto Titan's `INPAINTING` / `OUTPAINTING` task body.
pub fn build_titan_request(task: &EditTask) -> TitanImageRequest {
    let image_generation_config = ImageGenerationConfig {
        number_of_images: task.params.number_of_images,
        quality: task.params.quality.clone(),
        height: task.params.height,
        width: task.params.width,
        cfg_scale: task.params.cfg_scale,
    };

    match task.mode {
        EditMode::Inpainting => TitanImageRequest {
            task_type: TitanTaskType::Inpainting,
            in_painting_params: Some(InPaintingParams {
                text: task.prompt.clone(),
                image: task.image.clone(),
                mask_image: task.mask.clone(),
            }),
            out_painting_params: None,
            image_generation_config,
        },
        EditMode::Outpainting | EditMode::PreciseOutpainting => TitanImageRequest {
            task_type: TitanTaskType::Outpainting,
            in_painting_params: None,
            out_painting_params: Some(OutPaintingParams {
                text: task.prompt.clone(),
                image: task.image.clone(),
                mask_image: task.mask.clone(),
                out_painting_mode: if task.mode == EditMode::PreciseOutpainting {
                    OutPaintingMode::Precise
                } else {
                    OutPaintingMode::Default
                },
            }),
            image_generation_config,
        },
    }
}

fn classify_sdk_error<R>(err: &SdkError<InvokeModelError, R>) -> BackendError
where
    R: std::fmt::Debug,
{
    let detail = format!(
        "{}: {}",
        err.code().unwrap_or("Unknown"),
        err.message().unwrap_or("no message")
    );

    match err.as_service_error() {
        Some(service) if service.is_validation_exception() => BackendError::rejected(detail),
        Some(service)
            if service.is_throttling_exception()
                || service.is_service_quota_exceeded_exception() =>
        {
            BackendError::throttled(detail)
        }
        Some(service) if service.is_model_timeout_exception() => BackendError::timeout(detail),
        Some(_) => BackendError::failed(detail),
        None => BackendError::failed(format!("{:?}", err)),
    }
}

#[async_trait]
impl ImageEditBackend for ImageClient {
    async fn edit(&self, task: EditTask) -> Result<Vec<String>, BackendError> {
        let payload = build_titan_request(&task);
        let request_json = serde_json::to_vec(&payload)
            .map_err(|e| BackendError::failed(format!("serialize Titan request: {}", e)))?;

        log::info!(
            "Invoking {} for {} ({} images)",
            task.model_id,
            task.mode,
            task.params.number_of_images
        );

        let response = self
            .client
            .invoke_model()
            .model_id(&task.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(request_json))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let titan_response: TitanImageResponse =
            serde_json::from_slice(response.body.as_ref())
                .map_err(|e| BackendError::failed(format!("parse Titan response: {}", e)))?;

        if let Some(error) = titan_response.error.filter(|e| !e.is_empty()) {
            return Err(BackendError::rejected(error));
        }
        if titan_response.images.is_empty() {
            return Err(BackendError::failed("No images generated"));
        }

        Ok(titan_response.images)
    }
}
