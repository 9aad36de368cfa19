use crate::{
    bedrock::{EditTask, ImageEditBackend, TaskParams},
    config::GenerationConfig,
    error::{BackendError, EditError, Result, ValidationCode},
    imaging::{self, DecodedImage, ImagingError},
    logger,
    metrics::HandlerMetrics,
    models::{EditMode, EditRequest, EditResponse, UsageRecord, UsageStatus},
    storage::UsageSink,
};
use chrono::Utc;
use image::DynamicImage;
use std::sync::Arc;
use uuid::Uuid;

/// A request that passed validation, with images decoded.
struct ValidatedEdit {
    mode: EditMode,
    model_alias: String,
    model_id: String,
    prompt: String,
    base: DecodedImage,
    mask: MaskSource,
}

enum MaskSource {
    Provided(DecodedImage),
    /// Built from the base image's alpha channel (precise outpainting only).
    Derived(DynamicImage),
}

impl MaskSource {
    fn image(&self) -> &DynamicImage {
        match self {
            MaskSource::Provided(decoded) => &decoded.image,
            MaskSource::Derived(image) => image,
        }
    }

    fn encoded_bytes(&self) -> Option<usize> {
        match self {
            MaskSource::Provided(decoded) => Some(decoded.encoded_bytes),
            MaskSource::Derived(_) => None,
        }
    }
}

pub struct EditHandler {
    backend: Arc<dyn ImageEditBackend>,
    sink: Arc<dyn UsageSink>,
    config: GenerationConfig,
    metrics: Arc<HandlerMetrics>,
}

impl EditHandler {
    pub fn new(
        backend: Arc<dyn ImageEditBackend>,
        sink: Arc<dyn UsageSink>,
        config: GenerationConfig,
    ) -> prometheus::Result<Self> {
        Ok(Self {
            backend,
            sink,
            config,
            metrics: Arc::new(HandlerMetrics::new()?),
        })
    }

    pub fn metrics(&self) -> &Arc<HandlerMetrics> {
        &self.metrics
    }

    pub fn sink(&self) -> &Arc<dyn UsageSink> {
        &self.sink
    }

    pub async fn handle(&self, request: EditRequest) -> Result<EditResponse> {
        self.metrics.record_request();

        let edit = match self.validate(request) {
            Ok(edit) => edit,
            Err(err) => {
                self.metrics.record_validation_failure();
                log::warn!("Rejected edit request: {} ({})", err, err.code());
                return Err(err);
            }
        };
        let task = match self.prepare(&edit) {
            Ok(task) => task,
            Err(err) => {
                self.metrics.record_validation_failure();
                return Err(err);
            }
        };

        let request_id = Uuid::new_v4().to_string();
        log::info!(
            "Edit {} accepted: {} on {} ({}x{})",
            request_id,
            edit.mode,
            edit.model_alias,
            task.params.width,
            task.params.height
        );

        let timer = logger::timer("image generation");
        let outcome = match tokio::time::timeout(self.config.timeout, self.backend.edit(task)).await
        {
            Ok(result) => result,
            Err(_) => Err(BackendError::timeout(format!(
                "no response within {}ms",
                self.config.timeout.as_millis()
            ))),
        };
        let generation_time_ms = timer.stop().as_millis() as u64;

        let outcome = outcome.and_then(|images| {
            let expected = self.config.number_of_images as usize;
            if images.len() == expected {
                Ok(images)
            } else {
                Err(BackendError::failed(format!(
                    "expected {} images, backend returned {}",
                    expected,
                    images.len()
                )))
            }
        });

        match outcome {
            Ok(images) => {
                let record = self.usage_record(
                    &request_id,
                    &edit,
                    images.iter().map(|image| imaging::base64_decoded_len(image)).collect(),
                    generation_time_ms,
                    None,
                );
                self.append_usage(record).await;
                self.metrics.record_success();
                log::info!(
                    "Edit {} completed in {}ms with {} images",
                    request_id,
                    generation_time_ms,
                    images.len()
                );

                Ok(EditResponse {
                    images,
                    model_used: edit.model_alias,
                    request_id,
                    generation_time_ms,
                })
            }
            Err(source) => {
                log::error!(
                    "Edit {} failed after {}ms: {}",
                    request_id,
                    generation_time_ms,
                    source
                );
                let record = self.usage_record(
                    &request_id,
                    &edit,
                    Vec::new(),
                    generation_time_ms,
                    Some(&source),
                );
                self.append_usage(record).await;
                self.metrics.record_generation_failure();
                Err(EditError::from(source))
            }
        }
    }

    fn validate(&self, request: EditRequest) -> Result<ValidatedEdit> {
        let EditRequest {
            prompt,
            base_image,
            mask,
            model,
        } = request;

        let text = prompt.text.trim();
        if text.is_empty() {
            return Err(EditError::validation(
                ValidationCode::EmptyPrompt,
                "prompt text must not be empty",
            ));
        }

        let mode = EditMode::parse(&prompt.mode).ok_or_else(|| {
            EditError::validation(
                ValidationCode::InvalidMode,
                format!(
                    "unknown mode '{}'; expected INPAINTING, OUTPAINTING or PRECISE_OUTPAINTING",
                    prompt.mode
                ),
            )
        })?;

        let prompt_chars = text.chars().count();
        if prompt_chars > self.config.max_prompt_chars {
            return Err(EditError::validation(
                ValidationCode::PromptTooLong,
                format!(
                    "prompt is {} characters; the limit is {}",
                    prompt_chars, self.config.max_prompt_chars
                ),
            ));
        }

        let model_alias = model.trim();
        let model_id = self
            .config
            .resolve_model(model_alias)
            .ok_or_else(|| {
                EditError::validation(
                    ValidationCode::UnsupportedModel,
                    format!("model '{}' is not supported", model_alias),
                )
            })?
            .to_string();

        let max_side = self.config.max_input_dimension;
        let base = imaging::decode_image(&base_image, max_side).map_err(|e| match e {
            ImagingError::TooLarge { .. } => {
                EditError::validation(ValidationCode::ImageTooLarge, format!("base image: {}", e))
            }
            _ => EditError::validation(ValidationCode::InvalidImage, format!("base image: {}", e)),
        })?;
        self.check_min_dimension(&base)?;

        let mask = match mask.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            Some(payload) => {
                let decoded = imaging::decode_image(payload, max_side).map_err(|e| match e {
                    ImagingError::TooLarge { .. } => EditError::validation(
                        ValidationCode::MaskDimensionMismatch,
                        format!("mask: {}", e),
                    ),
                    _ => EditError::validation(ValidationCode::InvalidMask, format!("mask: {}", e)),
                })?;
                if decoded.dimensions() != base.dimensions() {
                    let (bw, bh) = base.dimensions();
                    let (mw, mh) = decoded.dimensions();
                    return Err(EditError::validation(
                        ValidationCode::MaskDimensionMismatch,
                        format!(
                            "mask is {}x{} but the base image is {}x{}",
                            mw, mh, bw, bh
                        ),
                    ));
                }
                MaskSource::Provided(decoded)
            }
            None if mode.requires_mask() => {
                return Err(EditError::validation(
                    ValidationCode::MissingMask,
                    format!("{} requires a mask", mode),
                ));
            }
            None => MaskSource::Derived(imaging::mask_from_alpha(&base.image).ok_or_else(
                || {
                    EditError::validation(
                        ValidationCode::NothingToOutpaint,
                        "without a mask the base image needs transparent pixels to extend",
                    )
                },
            )?),
        };

        Ok(ValidatedEdit {
            mode,
            model_alias: model_alias.to_string(),
            model_id,
            prompt: text.to_string(),
            base,
            mask,
        })
    }

    fn check_min_dimension(&self, image: &DecodedImage) -> Result<()> {
        let (width, height) = image.dimensions();
        if width.min(height) < self.config.min_input_dimension {
            return Err(EditError::validation(
                ValidationCode::ImageTooSmall,
                format!(
                    "base image is {}x{}; sides must be at least {}px",
                    width, height, self.config.min_input_dimension
                ),
            ));
        }
        Ok(())
    }

    fn prepare(&self, edit: &ValidatedEdit) -> Result<EditTask> {
        let encode = |image: &DynamicImage, code: ValidationCode| {
            imaging::to_png_base64(image).map_err(|e: ImagingError| {
                EditError::validation(code, format!("could not prepare image: {}", e))
            })
        };

        Ok(EditTask {
            model_id: edit.model_id.clone(),
            mode: edit.mode,
            prompt: edit.prompt.clone(),
            image: encode(&edit.base.image, ValidationCode::InvalidImage)?,
            mask: encode(edit.mask.image(), ValidationCode::InvalidMask)?,
            params: TaskParams {
                number_of_images: self.config.number_of_images,
                quality: self.config.quality.clone(),
                width: self.config.width,
                height: self.config.height,
                cfg_scale: self.config.cfg_scale,
            },
        })
    }

    fn usage_record(
        &self,
        request_id: &str,
        edit: &ValidatedEdit,
        output_image_bytes: Vec<usize>,
        generation_time_ms: u64,
        failure: Option<&BackendError>,
    ) -> UsageRecord {
        let (input_width, input_height) = edit.base.dimensions();

        UsageRecord {
            id: request_id.to_string(),
            timestamp: Utc::now(),
            model_used: edit.model_alias.clone(),
            mode: edit.mode,
            prompt_text: edit.prompt.clone(),
            input_width,
            input_height,
            input_image_bytes: edit.base.encoded_bytes,
            mask_image_bytes: edit.mask.encoded_bytes(),
            output_image_bytes,
            generation_time_ms,
            status: if failure.is_some() {
                UsageStatus::Failure
            } else {
                UsageStatus::Success
            },
            error_code: failure.map(|err| err.kind_code().to_string()),
            error_message: failure.map(|err| err.to_string()),
        }
    }

    async fn append_usage(&self, record: UsageRecord) {
        if let Err(err) = self.sink.append(&record).await {
            self.metrics.record_sink_failure();
            log::error!(
                "Usage record {} ({}) was not written to {} sink: {}",
                record.id,
                record.status.as_str(),
                self.sink.name(),
                err
            );
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::imaging::test_images::{data_uri, half_transparent, solid};
    use crate::storage::MemoryUsageSink;
    use std::time::Duration;

    fn outpaint_request(prompt: &str) -> EditRequest {
        let image = data_uri(&solid(512, 512));
        EditRequest::new(prompt, "OUTPAINTING", image.clone(), "titan").with_mask(image)
    }

    fn expect_validation(result: Result<EditResponse>, expected: ValidationCode) {
        match result {
            Err(EditError::Validation { code, .. }) => assert_eq!(code, expected),
            other => panic!("expected {:?}, got {:?}", expected, other),
        }
    }

    #[tokio::test]
    async fn outpainting_returns_configured_image_count() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let sink = Arc::new(MemoryUsageSink::new());
        let handler = handler(backend.clone(), sink.clone());

        let response = handler
            .handle(outpaint_request("a mountain landscape"))
            .await
            .unwrap();

        assert_eq!(response.images.len(), 2);
        assert_eq!(response.model_used, "titan");
        assert!(!response.request_id.is_empty());
        assert_eq!(backend.calls(), 1);

        let records = sink.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, UsageStatus::Success);
        assert_eq!(records[0].id, response.request_id);
        assert_eq!(records[0].generation_time_ms, response.generation_time_ms);
        assert_eq!(records[0].mode, EditMode::Outpainting);
        assert_eq!(records[0].input_width, 512);
        assert_eq!(records[0].output_image_bytes.len(), 2);
        assert!(records[0].error_message.is_none());
    }

    #[tokio::test]
    async fn request_ids_are_unique_for_identical_requests() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let sink = Arc::new(MemoryUsageSink::new());
        let handler = handler(backend, sink.clone());

        let first = handler.handle(outpaint_request("a lake")).await.unwrap();
        let second = handler.handle(outpaint_request("a lake")).await.unwrap();

        assert_ne!(first.request_id, second.request_id);
        assert_eq!(sink.len().await, 2);
    }

    #[tokio::test]
    async fn empty_prompt_never_reaches_backend() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let sink = Arc::new(MemoryUsageSink::new());
        let handler = handler(backend.clone(), sink.clone());

        expect_validation(
            handler.handle(outpaint_request("   ")).await,
            ValidationCode::EmptyPrompt,
        );
        assert_eq!(backend.calls(), 0);
        assert_eq!(sink.len().await, 0);
        assert_eq!(handler.metrics().snapshot().validation_failures, 1);
    }

    #[tokio::test]
    async fn precise_outpaint_with_empty_prompt_is_rejected() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let sink = Arc::new(MemoryUsageSink::new());
        let handler = handler(backend.clone(), sink.clone());

        let request = EditRequest::new(
            "",
            "precise-outpaint",
            data_uri(&half_transparent(512, 512)),
            "titan",
        );
        expect_validation(handler.handle(request).await, ValidationCode::EmptyPrompt);
        assert_eq!(backend.calls(), 0);
        assert!(sink.records().await.iter().all(|r| !r.is_success()));
    }

    #[tokio::test]
    async fn inpainting_requires_mask() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let handler = handler(backend.clone(), Arc::new(MemoryUsageSink::new()));

        let request =
            EditRequest::new("a red door", "INPAINTING", data_uri(&solid(512, 512)), "titan");
        expect_validation(handler.handle(request).await, ValidationCode::MissingMask);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn mismatched_mask_dimensions_are_rejected() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let handler = handler(backend.clone(), Arc::new(MemoryUsageSink::new()));

        let request =
            EditRequest::new("a red door", "inpaint", data_uri(&solid(512, 512)), "titan")
                .with_mask(data_uri(&solid(256, 512)));
        expect_validation(
            handler.handle(request).await,
            ValidationCode::MaskDimensionMismatch,
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_mode_and_model_are_rejected() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let handler = handler(backend.clone(), Arc::new(MemoryUsageSink::new()));

        let mut request = outpaint_request("a forest");
        request.prompt.mode = "upscale".into();
        expect_validation(handler.handle(request).await, ValidationCode::InvalidMode);

        let mut request = outpaint_request("a forest");
        request.model = "stable-diffusion".into();
        expect_validation(
            handler.handle(request).await,
            ValidationCode::UnsupportedModel,
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn undecodable_and_oversized_images_are_rejected() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let handler = EditHandler::new(
            backend.clone(),
            Arc::new(MemoryUsageSink::new()),
            GenerationConfig::default().with_max_input_dimension(256),
        )
        .unwrap();

        let request = EditRequest::new(
            "a forest",
            "OUTPAINTING",
            "data:image/png;base64,aGVsbG8=",
            "titan",
        );
        expect_validation(handler.handle(request).await, ValidationCode::InvalidImage);

        expect_validation(
            handler.handle(outpaint_request("a forest")).await,
            ValidationCode::ImageTooLarge,
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn overlong_prompt_is_rejected() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let handler = handler(backend.clone(), Arc::new(MemoryUsageSink::new()));

        expect_validation(
            handler.handle(outpaint_request(&"a".repeat(513))).await,
            ValidationCode::PromptTooLong,
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn oversized_image_is_rejected_from_its_header() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let handler = handler(backend.clone(), Arc::new(MemoryUsageSink::new()));

        let request = EditRequest::new(
            "a forest",
            "OUTPAINTING",
            data_uri(&solid(4096, 64)),
            "titan",
        )
        .with_mask(data_uri(&solid(4096, 64)));
        expect_validation(handler.handle(request).await, ValidationCode::ImageTooLarge);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn undersized_image_is_rejected() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let sink = Arc::new(MemoryUsageSink::new());
        let handler = handler(backend.clone(), sink.clone());

        let image = data_uri(&solid(32, 32));
        let request =
            EditRequest::new("a forest", "OUTPAINTING", image.clone(), "titan").with_mask(image);
        expect_validation(handler.handle(request).await, ValidationCode::ImageTooSmall);
        assert_eq!(backend.calls(), 0);
        assert_eq!(sink.len().await, 0);
    }

    #[tokio::test]
    async fn undecodable_mask_is_rejected() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let sink = Arc::new(MemoryUsageSink::new());
        let handler = handler(backend.clone(), sink.clone());

        let request =
            EditRequest::new("a red door", "INPAINTING", data_uri(&solid(512, 512)), "titan")
                .with_mask("data:image/png;base64,aGVsbG8=");
        expect_validation(handler.handle(request).await, ValidationCode::InvalidMask);
        assert_eq!(backend.calls(), 0);
        assert_eq!(sink.len().await, 0);
    }

    #[tokio::test]
    async fn backend_failure_writes_failure_record() {
        let backend = FakeBackend::new(Behavior::Fail(BackendError::throttled(
            "ThrottlingException: Too many requests",
        )));
        let sink = Arc::new(MemoryUsageSink::new());
        let handler = handler(backend.clone(), sink.clone());

        let err = handler
            .handle(outpaint_request("a mountain landscape"))
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::Generation { .. }));
        assert_eq!(err.code(), "GENERATION_THROTTLED");
        assert!(!err.public_message().contains("ThrottlingException"));

        let records = sink.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, UsageStatus::Failure);
        assert_eq!(records[0].error_code.as_deref(), Some("GENERATION_THROTTLED"));
        assert!(records[0]
            .error_message
            .as_deref()
            .is_some_and(|m| !m.is_empty()));
        assert_eq!(handler.metrics().snapshot().generation_failures, 1);
    }

    #[tokio::test]
    async fn wrong_image_count_is_a_generation_error() {
        let backend = FakeBackend::new(Behavior::Images(1));
        let sink = Arc::new(MemoryUsageSink::new());
        let handler = handler(backend, sink.clone());

        let err = handler.handle(outpaint_request("a lake")).await.unwrap_err();
        assert_eq!(err.code(), "GENERATION_FAILED");
        assert_eq!(sink.records().await[0].status, UsageStatus::Failure);
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let backend = FakeBackend::new(Behavior::Hang);
        let sink = Arc::new(MemoryUsageSink::new());
        let handler = EditHandler::new(
            backend,
            sink.clone(),
            GenerationConfig::default().with_timeout(Duration::from_millis(50)),
        )
        .unwrap();

        let err = handler.handle(outpaint_request("a lake")).await.unwrap_err();
        assert_eq!(err.code(), "GENERATION_TIMEOUT");

        let records = sink.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error_code.as_deref(), Some("GENERATION_TIMEOUT"));
        assert!(records[0].generation_time_ms >= 50);
    }

    #[tokio::test]
    async fn sink_failure_does_not_fail_the_request() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let handler = EditHandler::new(
            backend,
            Arc::new(FailingSink),
            GenerationConfig::default(),
        )
        .unwrap();

        let response = handler
            .handle(outpaint_request("a mountain landscape"))
            .await
            .unwrap();
        assert_eq!(response.images.len(), 2);

        let metrics = handler.metrics().snapshot();
        assert_eq!(metrics.usage_sink_failures, 1);
        assert_eq!(metrics.successes, 1);
    }

    #[tokio::test]
    async fn precise_outpaint_derives_mask_from_alpha() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let sink = Arc::new(MemoryUsageSink::new());
        let handler = handler(backend.clone(), sink.clone());

        let request = EditRequest::new(
            "extend the beach",
            "PRECISE_OUTPAINTING",
            data_uri(&half_transparent(256, 256)),
            "titan",
        );
        handler.handle(request).await.unwrap();

        let task = backend.last_task().unwrap();
        assert_eq!(task.mode, EditMode::PreciseOutpainting);
        let mask = imaging::decode_image(&task.mask, u32::MAX).unwrap();
        assert_eq!(mask.dimensions(), (256, 256));
        assert_eq!(sink.records().await[0].mask_image_bytes, None);

        let opaque = EditRequest::new(
            "extend the beach",
            "PRECISE_OUTPAINTING",
            data_uri(&solid(256, 256)),
            "titan",
        );
        expect_validation(
            handler.handle(opaque).await,
            ValidationCode::NothingToOutpaint,
        );
    }

    #[tokio::test]
    async fn prepared_payload_preserves_base_image() {
        let backend = FakeBackend::new(Behavior::Images(2));
        let handler = handler(backend.clone(), Arc::new(MemoryUsageSink::new()));
        let original = solid(320, 200);

        let request = EditRequest::new("a red door", "INPAINTING", data_uri(&original), "titan")
            .with_mask(data_uri(&solid(320, 200)));
        handler.handle(request).await.unwrap();

        let task = backend.last_task().unwrap();
        assert_eq!(task.model_id, "amazon.titan-image-generator-v1");
        assert_eq!(task.params.number_of_images, 2);
        assert_eq!(task.prompt, "a red door");
        let sent = imaging::decode_image(&task.image, u32::MAX).unwrap();
        assert_eq!(sent.image.to_rgb8(), original.to_rgb8());
    }
}
