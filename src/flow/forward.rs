//! Forward correspondence matching and feature transfer.

use rayon::prelude::*;

use super::window::nearest_in_window;
use super::FlowParams;
use crate::meta::CameraMeta;
use crate::reproject::backproject;
use crate::tensor::{FrameTensor, PointField};

/// Outputs of the forward pass.
#[derive(Debug, Clone)]
pub struct FlowOutput {
    /// Feature data gathered from the source frame; zero where no
    /// correspondence was accepted.
    pub data: FrameTensor,

    /// World-space point computed for every current-frame pixel, undefined
    /// where the depth carried no measurement. Feeds the backward pass.
    pub points: PointField,
}

/// Gather source features onto the current frame's pixel grid.
///
/// For each pixel, the current depth is backprojected into world space and
/// recorded in the output point field; the nearest previous-frame point
/// inside the search window is then located, and the source feature vector
/// at the match is copied over when the match distance is strictly below
/// the threshold. Pixels without depth, without a valid neighbor, or
/// beyond the threshold keep a zero feature vector.
///
/// Inputs are assumed shape-validated (see [`crate::op::FlowOp`]); `metas`
/// holds one parsed camera record per batch element. Every pixel's
/// computation is independent, so the pass runs in parallel over the
/// flattened (batch, row, column) space with each worker owning its own
/// output pixel.
pub fn forward_cpu(
    data: &FrameTensor,
    prev_points: &PointField,
    depth: &FrameTensor,
    metas: &[CameraMeta],
    params: &FlowParams,
) -> FlowOutput {
    let [batch, height, width, channels] = data.shape();
    debug_assert_eq!(metas.len(), batch);
    let pixels = batch * height * width;

    let mut out_data = vec![0.0f32; pixels * channels];
    let mut out_points = vec![f32::NAN; pixels * 3];

    out_data
        .par_chunks_exact_mut(channels)
        .zip(out_points.par_chunks_exact_mut(3))
        .enumerate()
        .for_each(|(index, (out_pixel, out_point))| {
            let n = index / (height * width);
            let rest = index % (height * width);
            let h = rest / width;
            let w = rest % width;

            let Some(point) = backproject(&metas[n], w, h, depth.at(n, h, w, 0)) else {
                return;
            };
            out_point.copy_from_slice(&[point.x, point.y, point.z]);

            let Some(found) = nearest_in_window(prev_points, n, h, w, &point, params.kernel_size)
            else {
                return;
            };
            if found.distance < params.threshold {
                out_pixel.copy_from_slice(data.pixel(n, found.row, found.col));
            }
        });

    FlowOutput {
        data: FrameTensor::from_parts(batch, height, width, channels, out_data),
        points: PointField::from_parts(batch, height, width, out_points),
    }
}
