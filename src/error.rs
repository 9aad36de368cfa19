use thiserror::Error;

/// Stable, machine-readable codes for input that never reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    EmptyPrompt,
    PromptTooLong,
    InvalidMode,
    UnsupportedModel,
    InvalidImage,
    ImageTooLarge,
    ImageTooSmall,
    MissingMask,
    InvalidMask,
    MaskDimensionMismatch,
    NothingToOutpaint,
    InvalidRequestBody,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::EmptyPrompt => "EMPTY_PROMPT",
            ValidationCode::PromptTooLong => "PROMPT_TOO_LONG",
            ValidationCode::InvalidMode => "INVALID_MODE",
            ValidationCode::UnsupportedModel => "UNSUPPORTED_MODEL",
            ValidationCode::InvalidImage => "INVALID_IMAGE",
            ValidationCode::ImageTooLarge => "IMAGE_TOO_LARGE",
            ValidationCode::ImageTooSmall => "IMAGE_TOO_SMALL",
            ValidationCode::MissingMask => "MISSING_MASK",
            ValidationCode::InvalidMask => "INVALID_MASK",
            ValidationCode::MaskDimensionMismatch => "MASK_DIMENSION_MISMATCH",
            ValidationCode::NothingToOutpaint => "NOTHING_TO_OUTPAINT",
            ValidationCode::InvalidRequestBody => "INVALID_REQUEST_BODY",
        }
    }
}

/// How the generation backend failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The backend refused the payload (bad input, content filter).
    Rejected,
    /// Quota exhausted or request throttled.
    Throttled,
    Timeout,
    /// Transport failure or an unusable response body.
    Failed,
}

#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {detail}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub detail: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Rejected, detail)
    }

    pub fn throttled(detail: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Throttled, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, detail)
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Failed, detail)
    }
}

/// Errors surfaced to the caller of the edit handler.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("{message}")]
    Validation {
        code: ValidationCode,
        message: String,
    },

    /// `source` keeps the backend's own text for the usage log; it is
    /// never rendered into a response.
    #[error("image generation failed ({})", .source.kind_code())]
    Generation { source: BackendError },
}

impl EditError {
    pub fn validation(code: ValidationCode, message: impl Into<String>) -> Self {
        EditError::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EditError::Validation { code, .. } => code.as_str(),
            EditError::Generation { source } => source.kind_code(),
        }
    }

    /// Message that is safe to show to API clients.
    pub fn public_message(&self) -> String {
        match self {
            EditError::Validation { message, .. } => message.clone(),
            EditError::Generation { source } => match source.kind {
                BackendErrorKind::Rejected => {
                    "The image model rejected the request; adjust the prompt or images".into()
                }
                BackendErrorKind::Throttled => {
                    "The image model is busy; try again shortly".into()
                }
                BackendErrorKind::Timeout => "The image model did not respond in time".into(),
                BackendErrorKind::Failed => "The image model failed to generate images".into(),
            },
        }
    }
}

impl From<BackendError> for EditError {
    fn from(source: BackendError) -> Self {
        EditError::Generation { source }
    }
}

impl BackendError {
    pub fn kind_code(&self) -> &'static str {
        match self.kind {
            BackendErrorKind::Rejected => "GENERATION_REJECTED",
            BackendErrorKind::Throttled => "GENERATION_THROTTLED",
            BackendErrorKind::Timeout => "GENERATION_TIMEOUT",
            BackendErrorKind::Failed => "GENERATION_FAILED",
        }
    }
}

/// Usage sink write failures. Never returned to API clients.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Usage sink unavailable: {0}")]
    Unavailable(String),
    #[error("Usage record rejected: {0}")]
    Rejected(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),
    #[error("Missing configuration: {0}")]
    Missing(&'static str),
}

pub type Result<T> = std::result::Result<T, EditError>;

#[cfg(feature = "server")]
mod http {
    use super::{BackendErrorKind, EditError};
    use crate::models::ErrorBody;
    use actix_web::{http::StatusCode, HttpResponse, ResponseError};

    impl ResponseError for EditError {
        fn status_code(&self) -> StatusCode {
            match self {
                EditError::Validation { .. } => StatusCode::BAD_REQUEST,
                EditError::Generation { source } => match source.kind {
                    BackendErrorKind::Rejected => StatusCode::UNPROCESSABLE_ENTITY,
                    BackendErrorKind::Throttled => StatusCode::SERVICE_UNAVAILABLE,
                    BackendErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    BackendErrorKind::Failed => StatusCode::BAD_GATEWAY,
                },
            }
        }

        fn error_response(&self) -> HttpResponse {
            HttpResponse::build(self.status_code()).json(ErrorBody {
                error: self.public_message(),
                code: self.code().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_hides_backend_detail() {
        let err = EditError::from(BackendError::rejected(
            "ValidationException: arn:aws:bedrock:us-east-1::foundation-model blocked",
        ));
        assert_eq!(err.code(), "GENERATION_REJECTED");
        assert!(!err.public_message().contains("arn:aws"));
        assert!(!err.to_string().contains("arn:aws"));
    }

    #[test]
    fn validation_error_exposes_code_and_message() {
        let err = EditError::validation(ValidationCode::MissingMask, "mask is required");
        assert!(matches!(err, EditError::Validation { .. }));
        assert_eq!(err.code(), "MISSING_MASK");
        assert_eq!(err.public_message(), "mask is required");
    }

    #[cfg(feature = "server")]
    #[test]
    fn status_codes_follow_error_kind() {
        use actix_web::{http::StatusCode, ResponseError};

        let cases = [
            (BackendError::rejected("x"), StatusCode::UNPROCESSABLE_ENTITY),
            (BackendError::throttled("x"), StatusCode::SERVICE_UNAVAILABLE),
            (BackendError::timeout("x"), StatusCode::GATEWAY_TIMEOUT),
            (BackendError::failed("x"), StatusCode::BAD_GATEWAY),
        ];
        for (source, status) in cases {
            assert_eq!(EditError::from(source).status_code(), status);
        }
        let invalid = EditError::validation(ValidationCode::EmptyPrompt, "empty");
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
    }
}
