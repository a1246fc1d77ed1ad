//! Backward matching and gradient scatter.

use rayon::prelude::*;

use super::window::nearest_in_window;
use super::FlowParams;
use crate::tensor::{FrameTensor, PointField};

/// Scatter upstream gradients back onto their matched source pixels.
///
/// The correspondence is never materialized between passes: this pass
/// re-runs the forward window search against `prev_points`, using each
/// target pixel's point as recorded in `curr_points` (not a fresh
/// reprojection). A target whose point is undefined, whose window holds no
/// valid neighbor, or whose best distance reaches the threshold
/// contributes nothing.
///
/// The returned gradient has the source feature shape, zero-initialized
/// and accumulated with `+=` — a source pixel may receive gradient from
/// several target pixels. Batch elements write disjoint output shards and
/// run in parallel; within a batch the scatter runs serially in scan
/// order, so the accumulation needs no atomics and is deterministic.
pub fn backward_cpu(
    prev_points: &PointField,
    curr_points: &PointField,
    grad: &FrameTensor,
    params: &FlowParams,
) -> FrameTensor {
    let [batch, height, width, channels] = grad.shape();
    let mut out = vec![0.0f32; batch * height * width * channels];

    out.par_chunks_exact_mut(height * width * channels)
        .enumerate()
        .for_each(|(n, out_batch)| {
            for h in 0..height {
                for w in 0..width {
                    let Some(point) = curr_points.point(n, h, w) else {
                        continue;
                    };
                    let Some(found) =
                        nearest_in_window(prev_points, n, h, w, &point, params.kernel_size)
                    else {
                        continue;
                    };
                    if found.distance >= params.threshold {
                        continue;
                    }

                    let offset = (found.row * width + found.col) * channels;
                    let slot = &mut out_batch[offset..offset + channels];
                    for (acc, g) in slot.iter_mut().zip(grad.pixel(n, h, w)) {
                        *acc += g;
                    }
                }
            }
        });

    FrameTensor::from_parts(batch, height, width, channels, out)
}
