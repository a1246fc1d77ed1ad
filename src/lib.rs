//! Dense 3D correspondence flow for RGB-D frame pairs.
//!
//! Every pixel of the current frame is backprojected through its depth and
//! camera pose into a shared world coordinate frame, then matched to the
//! spatially nearest previously-observed 3D point inside a bounded pixel
//! window. Per-pixel feature data is warped along those correspondences —
//! 3D geometric proximity instead of 2D optical flow. The matching itself
//! is a hard nearest-neighbor decision; only the transferred values carry
//! gradient (straight-through convention), so the backward pass re-derives
//! the same matching and scatter-accumulates the upstream gradient onto
//! the matched source pixels.
//!
//! # Architecture
//!
//! The computation is split into phases:
//! - Phase 1: Backproject current-frame depth into world space (`reproject`)
//! - Phase 2: Window search over the previous frame's point field (`flow::window`)
//! - Phase 3: Feature gather under the distance threshold (`flow::forward`)
//! - Phase 4: Gradient scatter along the re-derived matching (`flow::backward`)
//!
//! Every pixel's computation is independent, so both passes parallelize
//! across the flattened (batch, row, column) space with rayon.
//!
//! # Usage
//!
//! ```ignore
//! use corrflow::{FlowOp, FlowParams};
//!
//! let op = FlowOp::new(FlowParams {
//!     kernel_size: 2,
//!     threshold: 0.1,
//! })?;
//!
//! // Forward: warp source features onto the current frame and emit the
//! // current point field.
//! let out = op.forward(&features, &prev_points, &depth, &meta)?;
//!
//! // Backward: scatter the upstream gradient to the matched sources.
//! let grad_in = op.backward(&prev_points, &out.points, &grad_out)?;
//! ```

pub mod flow;
pub mod meta;
pub mod op;
pub mod reproject;
pub mod tensor;
pub mod test_utils;

pub use flow::{FlowOutput, FlowParams, FlowParamsError, WindowMatch};
pub use meta::{parse_meta_tensor, CameraMeta, PackedPose, META_MIN_LEN, META_RECORD_LEN};
pub use op::FlowOp;
pub use reproject::backproject;
pub use tensor::{FrameTensor, PointField};
