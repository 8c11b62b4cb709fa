//! Error handling for the voxelizer
//!
//! One error type for the whole pipeline. Configuration problems are caught
//! before any GPU allocation; device problems arrive through the completion
//! channel and are folded into the same type.

use crate::gpu::error_recovery::GpuRecoveryError;
use thiserror::Error;

/// Main error type for the voxelizer
#[derive(Debug, Error)]
pub enum VoxelizerError {
    // Configuration Errors
    #[error("Invalid config: {field} = {value} ({reason})")]
    InvalidConfig {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required resource: {resource}")]
    MissingResource { resource: String },

    #[error("Invalid mesh: {reason}")]
    InvalidMesh { reason: String },

    #[error("Resolution {resolution:?} needs {required} bytes for {buffer}, limit is {limit}")]
    ResolutionTooLarge {
        resolution: [u32; 3],
        buffer: String,
        required: u64,
        limit: u64,
    },

    #[error("Mesh with {triangles} triangles needs {required} bytes of triangle vertices, limit is {limit}")]
    MeshTooLarge {
        triangles: u64,
        required: u64,
        limit: u64,
    },

    // Device Errors
    #[error("GPU adapter not found")]
    AdapterNotFound,

    #[error("GPU device request failed: {0}")]
    DeviceRequest(String),

    #[error("Shader validation failed for {shader}: {error}")]
    ShaderValidation { shader: String, error: String },

    #[error("Device submission failed: {0}")]
    Submission(String),

    #[error(transparent)]
    Gpu(#[from] GpuRecoveryError),

    // State Errors
    #[error("State error: expected {expected}, actual {actual}")]
    StateError { expected: String, actual: String },

    // Config file Errors
    #[error("IO error for {path}: {error}")]
    IoError { path: String, error: String },

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl VoxelizerError {
    /// Shorthand for configuration errors
    pub fn invalid_config(
        field: impl Into<String>,
        value: impl std::fmt::Debug,
        reason: impl Into<String>,
    ) -> Self {
        VoxelizerError::InvalidConfig {
            field: field.into(),
            value: format!("{:?}", value),
            reason: reason.into(),
        }
    }

    /// Whether this error was detected before any device work was submitted
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            VoxelizerError::InvalidConfig { .. }
                | VoxelizerError::MissingResource { .. }
                | VoxelizerError::InvalidMesh { .. }
                | VoxelizerError::ResolutionTooLarge { .. }
                | VoxelizerError::MeshTooLarge { .. }
                | VoxelizerError::ConfigParse(_)
        )
    }
}

/// Type alias for Results in the voxelizer
pub type VoxelResult<T> = Result<T, VoxelizerError>;

impl From<toml::de::Error> for VoxelizerError {
    fn from(error: toml::de::Error) -> Self {
        VoxelizerError::ConfigParse(error.to_string())
    }
}

impl From<wgpu::RequestDeviceError> for VoxelizerError {
    fn from(error: wgpu::RequestDeviceError) -> Self {
        VoxelizerError::DeviceRequest(error.to_string())
    }
}

/// Convert Option to Result with context
pub trait OptionExt<T> {
    fn ok_or_voxel<F>(self, f: F) -> VoxelResult<T>
    where
        F: FnOnce() -> VoxelizerError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_voxel<F>(self, f: F) -> VoxelResult<T>
    where
        F: FnOnce() -> VoxelizerError,
    {
        self.ok_or_else(f)
    }
}

/// Extension trait for adding context to errors
pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> VoxelResult<T>;
    fn with_context<F>(self, f: F) -> VoxelResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn context(self, msg: &str) -> VoxelResult<T> {
        self.map_err(|e| VoxelizerError::Internal {
            message: format!("{}: {}", msg, e),
        })
    }

    fn with_context<F>(self, f: F) -> VoxelResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| VoxelizerError::Internal {
            message: format!("{}: {}", f(), e),
        })
    }
}
