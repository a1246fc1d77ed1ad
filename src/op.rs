//! Host-facing invocation surface.
//!
//! Mirrors the construction-then-invoke shape of a framework kernel:
//! matching parameters are validated once when the operator is built,
//! tensor shapes are validated per invocation, and the per-pixel kernels
//! then run without further checks. Degenerate geometry (missing depth, no
//! neighbor in the window, no neighbor under the threshold) is never an
//! error.

use anyhow::{bail, Result};
use tracing::debug;

use crate::flow::{backward_cpu, forward_cpu, FlowOutput, FlowParams};
use crate::meta::parse_meta_tensor;
use crate::tensor::{FrameTensor, PointField};

/// A configured correspondence-flow operator.
#[derive(Debug, Clone)]
pub struct FlowOp {
    params: FlowParams,
}

impl FlowOp {
    /// Create an operator, validating the matching parameters.
    pub fn new(params: FlowParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &FlowParams {
        &self.params
    }

    /// Forward pass: compute the current frame's point field and gather
    /// matched source features onto its pixel grid.
    ///
    /// * `data` — source feature tensor `[N, H, W, C]`, gathered from at
    ///   the matched pixel.
    /// * `prev_points` — previous frame's point field `[N, H, W, 3]`.
    /// * `depth` — current frame's depth map `[N, H, W, 1]`.
    /// * `meta` — camera records `[N, 1, 1, M]`, `M >= 42` (see
    ///   [`crate::meta`]).
    pub fn forward(
        &self,
        data: &FrameTensor,
        prev_points: &PointField,
        depth: &FrameTensor,
        meta: &FrameTensor,
    ) -> Result<FlowOutput> {
        let [batch, height, width, channels] = data.shape();
        if batch == 0 || height == 0 || width == 0 || channels == 0 {
            bail!("data tensor has an empty dimension: {:?}", data.shape());
        }
        let points_shape = [
            prev_points.batch(),
            prev_points.height(),
            prev_points.width(),
        ];
        if points_shape != [batch, height, width] {
            bail!(
                "prev_points spatial shape {points_shape:?} does not match data {:?}",
                [batch, height, width]
            );
        }
        if depth.shape() != [batch, height, width, 1] {
            bail!(
                "depth must be [{batch}, {height}, {width}, 1], got {:?}",
                depth.shape()
            );
        }
        let metas = parse_meta_tensor(meta)?;
        if metas.len() != batch {
            bail!(
                "metadata batch {} does not match data batch {batch}",
                metas.len()
            );
        }

        debug!(
            batch,
            height,
            width,
            channels,
            kernel_size = self.params.kernel_size,
            threshold = f64::from(self.params.threshold),
            "forward correspondence flow"
        );
        Ok(forward_cpu(data, prev_points, depth, &metas, &self.params))
    }

    /// Backward pass: scatter the upstream gradient onto the matched
    /// source pixels, re-deriving the forward matching from the two point
    /// fields.
    ///
    /// * `prev_points` — previous frame's point field, as fed to
    ///   [`FlowOp::forward`].
    /// * `curr_points` — current frame's point field, as produced by
    ///   [`FlowOp::forward`].
    /// * `grad` — upstream gradient `[N, H, W, C]`.
    pub fn backward(
        &self,
        prev_points: &PointField,
        curr_points: &PointField,
        grad: &FrameTensor,
    ) -> Result<FrameTensor> {
        let [batch, height, width, channels] = grad.shape();
        if batch == 0 || height == 0 || width == 0 || channels == 0 {
            bail!("grad tensor has an empty dimension: {:?}", grad.shape());
        }
        for (name, field) in [("prev_points", prev_points), ("curr_points", curr_points)] {
            let shape = [field.batch(), field.height(), field.width()];
            if shape != [batch, height, width] {
                bail!(
                    "{name} spatial shape {shape:?} does not match grad {:?}",
                    [batch, height, width]
                );
            }
        }

        debug!(
            batch,
            height,
            width,
            channels,
            kernel_size = self.params.kernel_size,
            threshold = f64::from(self.params.threshold),
            "backward correspondence flow"
        );
        Ok(backward_cpu(prev_points, curr_points, grad, &self.params))
    }
}
