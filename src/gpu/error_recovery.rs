//! GPU Error Recovery
//!
//! Device operations of one run are wrapped in their own out-of-memory and
//! validation error scopes. A validation error fails only the run whose
//! scope caught it; out-of-memory and panics inside wgpu mark the device as
//! lost for the backend that saw them. Errors raised outside these scopes are
//! left to whatever handler the host installed on the device.

use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// GPU error recovery system
#[derive(Debug, Clone, Default)]
pub struct GpuErrorRecovery {
    device_lost: Arc<AtomicBool>,
}

impl GpuErrorRecovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_device_lost(&self) -> bool {
        self.device_lost.load(Ordering::Acquire)
    }

    fn mark_device_lost(&self) {
        self.device_lost.store(true, Ordering::Release);
    }

    /// Run `operation` inside an out-of-memory and a validation error scope
    ///
    /// Both scopes are popped on every path. A scoped error takes precedence
    /// over the operation's own result.
    pub fn scoped<F, R, E>(&self, device: &wgpu::Device, operation: F) -> Result<R, E>
    where
        F: FnOnce() -> Result<R, E>,
        E: From<GpuRecoveryError>,
    {
        if self.is_device_lost() {
            return Err(GpuRecoveryError::DeviceLost.into());
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = operation();
        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());

        self.resolve_scopes(out_of_memory, validation)?;
        result
    }

    /// Classify the errors popped from one pair of scopes
    pub fn resolve_scopes(
        &self,
        out_of_memory: Option<wgpu::Error>,
        validation: Option<wgpu::Error>,
    ) -> Result<(), GpuRecoveryError> {
        if let Some(error) = out_of_memory {
            log::error!("[GpuErrorRecovery] GPU out of memory: {}", error);
            self.mark_device_lost();
            return Err(GpuRecoveryError::OutOfMemory {
                message: error.to_string(),
            });
        }
        if let Some(error) = validation {
            log::error!("[GpuErrorRecovery] GPU validation error: {}", error);
            return Err(GpuRecoveryError::Validation {
                message: error.to_string(),
            });
        }
        Ok(())
    }

    /// Run a device operation, turning panics inside wgpu into errors
    pub fn execute_with_recovery<F, R>(&self, operation: F) -> Result<R, GpuRecoveryError>
    where
        F: FnOnce() -> Result<R, GpuRecoveryError>,
    {
        if self.is_device_lost() {
            return Err(GpuRecoveryError::DeviceLost);
        }

        match panic::catch_unwind(panic::AssertUnwindSafe(operation)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                log::warn!("[GpuErrorRecovery] Operation failed: {}", e);
                Err(e)
            }
            Err(panic_info) => {
                let message = if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else {
                    "Unknown panic".to_string()
                };

                log::error!("[GpuErrorRecovery] GPU operation panicked: {}", message);
                self.mark_device_lost();
                Err(GpuRecoveryError::Panic { message })
            }
        }
    }

    /// Submit command buffers with panic protection
    pub fn submit_with_recovery(
        &self,
        queue: &wgpu::Queue,
        command_buffers: Vec<wgpu::CommandBuffer>,
    ) -> Result<wgpu::SubmissionIndex, GpuRecoveryError> {
        self.execute_with_recovery(|| Ok(queue.submit(command_buffers)))
    }
}

/// GPU recovery errors
#[derive(Debug, thiserror::Error)]
pub enum GpuRecoveryError {
    #[error("GPU device lost")]
    DeviceLost,

    #[error("GPU out of memory: {message}")]
    OutOfMemory { message: String },

    #[error("GPU validation error: {message}")]
    Validation { message: String },

    #[error("GPU operation panicked: {message}")]
    Panic { message: String },

    #[error("GPU operation failed: {message}")]
    OperationFailed { message: String },
}

/// Extension trait for Result types to add GPU error context
pub trait GpuResultExt<T> {
    fn gpu_context(self, context: &str) -> Result<T, GpuRecoveryError>;
}

impl<T, E: std::fmt::Display> GpuResultExt<T> for Result<T, E> {
    fn gpu_context(self, context: &str) -> Result<T, GpuRecoveryError> {
        self.map_err(|e| GpuRecoveryError::OperationFailed {
            message: format!("{}: {}", context, e),
        })
    }
}
