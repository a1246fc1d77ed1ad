//! Correspondence matching and feature transfer between two frames.
//!
//! The forward pass ([`forward_cpu`]) matches each current-frame pixel to
//! the nearest previous-frame 3D point inside a square pixel window and
//! gathers the source feature vector when the match is close enough. The
//! backward pass ([`backward_cpu`]) re-derives the identical matching from
//! the recorded point fields and scatter-accumulates upstream gradients.
//! The matching is a hard nearest-neighbor decision; only the transferred
//! values carry gradient.
//!
//! Both passes share the search in `window::nearest_in_window`, so the
//! window clipping, distance metric, and tie-break order cannot drift
//! between them.

mod backward;
mod forward;
pub(crate) mod window;

pub use backward::backward_cpu;
pub use forward::{forward_cpu, FlowOutput};
pub use window::WindowMatch;

use thiserror::Error;

/// Matching parameters shared by the forward and backward passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowParams {
    /// Half-width of the square search window in pixels. Zero restricts
    /// matching to the same pixel.
    pub kernel_size: usize,

    /// Upper bound on the 3D distance for a correspondence to be accepted
    /// (strict: a match at exactly the threshold is rejected).
    pub threshold: f32,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            kernel_size: 2,
            threshold: 0.1,
        }
    }
}

/// Errors produced by [`FlowParams::validate`].
#[derive(Debug, Error, PartialEq)]
pub enum FlowParamsError {
    #[error("threshold must be finite and non-negative, got {0}")]
    InvalidThreshold(f32),
}

impl FlowParams {
    /// Check the parameters before any pixel work begins.
    pub fn validate(&self) -> Result<(), FlowParamsError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(FlowParamsError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}
