//! Deterministic synthetic inputs for testing the flow passes.
//!
//! These generators build the small depth grids, feature tensors, and
//! camera records the matching scenarios are written against. Everything
//! is deterministic so tests can assert exact values.

use crate::meta::{CameraMeta, META_RECORD_LEN};
use crate::reproject::backproject;
use crate::tensor::{FrameTensor, PointField};

/// Single-batch depth map from row slices. Rows must share one length.
pub fn depth_from_rows(rows: &[&[f32]]) -> FrameTensor {
    let height = rows.len();
    let width = rows.first().map_or(0, |r| r.len());
    let mut data = Vec::with_capacity(height * width);
    for row in rows {
        assert_eq!(row.len(), width, "ragged depth rows");
        data.extend_from_slice(row);
    }
    FrameTensor::from_parts(1, height, width, 1, data)
}

/// Constant depth map.
pub fn constant_depth(batch: usize, height: usize, width: usize, value: f32) -> FrameTensor {
    FrameTensor::from_parts(
        batch,
        height,
        width,
        1,
        vec![value; batch * height * width],
    )
}

/// Single-channel feature tensor encoding each pixel's within-batch index
/// plus one, so a transferred value reveals its source pixel and zero
/// means "no correspondence". The pattern repeats across batch elements.
pub fn index_features(batch: usize, height: usize, width: usize) -> FrameTensor {
    let per_batch = height * width;
    let data = (0..batch * per_batch)
        .map(|i| (i % per_batch + 1) as f32)
        .collect();
    FrameTensor::from_parts(batch, height, width, 1, data)
}

/// Pack camera records into a `[N, 1, 1, 48]` metadata tensor.
pub fn meta_tensor(metas: &[CameraMeta]) -> FrameTensor {
    let mut data = Vec::with_capacity(metas.len() * META_RECORD_LEN);
    for meta in metas {
        data.extend(meta.to_record());
    }
    FrameTensor::from_parts(metas.len(), 1, 1, META_RECORD_LEN, data)
}

/// Populate a point field by backprojecting a depth frame, one camera
/// record per batch element — the "previously observed" field of the
/// matching scenarios. Pixels without a depth measurement stay undefined.
pub fn reproject_field(depth: &FrameTensor, metas: &[CameraMeta]) -> PointField {
    assert_eq!(depth.channels(), 1, "depth must have a single channel");
    assert_eq!(depth.batch(), metas.len(), "one camera record per batch");

    let mut field = PointField::undefined(depth.batch(), depth.height(), depth.width());
    for n in 0..depth.batch() {
        for h in 0..depth.height() {
            for w in 0..depth.width() {
                if let Some(point) = backproject(&metas[n], w, h, depth.at(n, h, w, 0)) {
                    field.set_point(n, h, w, point);
                }
            }
        }
    }
    field
}
