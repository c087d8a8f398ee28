use crate::model::Id;
use crate::pipeline::PipelineState;
use crate::version::Version;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorCode {
    StoreUnavailable,
    StoreTimeout,
    VersionNotFound,
    RepairExhausted,
    MalformedPayload,
    WriteFailed,
    Validation,
    EntityTooLarge,
    LoadTooLarge,
    VersionConflict,
    InvalidConfig,
    Encode,
    Decode,
}

impl EngineErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineErrorCode::StoreUnavailable => "store_unavailable",
            EngineErrorCode::StoreTimeout => "store_timeout",
            EngineErrorCode::VersionNotFound => "version_not_found",
            EngineErrorCode::RepairExhausted => "repair_exhausted",
            EngineErrorCode::MalformedPayload => "malformed_payload",
            EngineErrorCode::WriteFailed => "write_failed",
            EngineErrorCode::Validation => "validation",
            EngineErrorCode::EntityTooLarge => "entity_too_large",
            EngineErrorCode::LoadTooLarge => "load_too_large",
            EngineErrorCode::VersionConflict => "version_conflict",
            EngineErrorCode::InvalidConfig => "invalid_config",
            EngineErrorCode::Encode => "encode",
            EngineErrorCode::Decode => "decode",
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store unavailable: {message}")]
    StoreUnavailable { message: String },
    #[error("store operation '{operation}' timed out after {timeout_ms}ms")]
    StoreTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },
    #[error("version {version} of entity {id} not found")]
    VersionNotFound { id: Id, version: Version },
    #[error("no complete version of entity {id} within {scanned} scanned versions")]
    RepairExhausted { id: Id, scanned: usize },
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("write failed in {state} stage at version {version:?}: {source}")]
    WriteFailed {
        state: PipelineState,
        version: Option<Version>,
        #[source]
        source: Box<EngineError>,
    },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("entity payload of {size} bytes exceeds maximum of {max} bytes")]
    EntityTooLarge { size: usize, max: usize },
    #[error("requested load of {requested} entities exceeds maximum of {max}")]
    LoadTooLarge { requested: usize, max: usize },
    #[error("version {version} of entity {id} already holds different content")]
    VersionConflict { id: Id, version: Version },
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl EngineError {
    pub fn code(&self) -> EngineErrorCode {
        match self {
            EngineError::StoreUnavailable { .. } => EngineErrorCode::StoreUnavailable,
            EngineError::StoreTimeout { .. } => EngineErrorCode::StoreTimeout,
            EngineError::VersionNotFound { .. } => EngineErrorCode::VersionNotFound,
            EngineError::RepairExhausted { .. } => EngineErrorCode::RepairExhausted,
            EngineError::MalformedPayload(_) => EngineErrorCode::MalformedPayload,
            EngineError::WriteFailed { .. } => EngineErrorCode::WriteFailed,
            EngineError::Validation(_) => EngineErrorCode::Validation,
            EngineError::EntityTooLarge { .. } => EngineErrorCode::EntityTooLarge,
            EngineError::LoadTooLarge { .. } => EngineErrorCode::LoadTooLarge,
            EngineError::VersionConflict { .. } => EngineErrorCode::VersionConflict,
            EngineError::InvalidConfig { .. } => EngineErrorCode::InvalidConfig,
            EngineError::Encode(_) => EngineErrorCode::Encode,
            EngineError::Decode(_) => EngineErrorCode::Decode,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    /// Transient store failures. Retrying the whole write with a fresh
    /// version is always safe for these.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::StoreUnavailable { .. } | EngineError::StoreTimeout { .. } => true,
            EngineError::WriteFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    pub(crate) fn write_failed(
        state: PipelineState,
        version: Option<Version>,
        source: EngineError,
    ) -> Self {
        EngineError::WriteFailed {
            state,
            version,
            source: Box::new(source),
        }
    }
}
