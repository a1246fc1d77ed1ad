//! Per-batch camera metadata records.
//!
//! Each batch element carries one flat numeric record with a fixed layout:
//!
//! ```text
//! [ 0.. 9)  intrinsic matrix (row-major 3x3)
//! [ 9..18)  inverse intrinsic matrix
//! [18..30)  world-to-live pose (3 rows of [r r r t])
//! [30..42)  live-to-world pose
//! [42..45)  voxel step size
//! [45..48)  voxel minimum
//! ```
//!
//! The voxel fields are carried for layout compatibility but not read by
//! the flow passes. The record length equals the metadata tensor's channel
//! count and must be at least [`META_MIN_LEN`].

use anyhow::{bail, Result};
use nalgebra::{Isometry3, Matrix3, Vector3};

use crate::tensor::FrameTensor;

/// Record prefix consumed by the flow read path.
pub const META_MIN_LEN: usize = 42;

/// Full record length including the voxel fields.
pub const META_RECORD_LEN: usize = 48;

const INTRINSICS: usize = 0;
const INV_INTRINSICS: usize = 9;
const POSE_WORLD_TO_LIVE: usize = 18;
const POSE_LIVE_TO_WORLD: usize = 30;
const VOXEL_STEP: usize = 42;
const VOXEL_MIN: usize = 45;

/// Affine camera pose packed as 3 rows of `[r r r t]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackedPose {
    pub rotation: Matrix3<f32>,
    pub translation: Vector3<f32>,
}

impl PackedPose {
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn from_isometry(iso: &Isometry3<f32>) -> Self {
        Self {
            rotation: *iso.rotation.to_rotation_matrix().matrix(),
            translation: iso.translation.vector,
        }
    }

    /// Apply the pose to a point: `R * p + t`.
    #[inline]
    pub fn apply(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * point + self.translation
    }

    fn from_rows(rows: &[f32]) -> Self {
        debug_assert_eq!(rows.len(), 12);
        Self {
            rotation: Matrix3::new(
                rows[0], rows[1], rows[2], // row 0
                rows[4], rows[5], rows[6], // row 1
                rows[8], rows[9], rows[10], // row 2
            ),
            translation: Vector3::new(rows[3], rows[7], rows[11]),
        }
    }

    fn write_rows(&self, out: &mut [f32]) {
        debug_assert_eq!(out.len(), 12);
        for r in 0..3 {
            for c in 0..3 {
                out[r * 4 + c] = self.rotation[(r, c)];
            }
            out[r * 4 + 3] = self.translation[r];
        }
    }
}

/// Parsed camera metadata for one batch element.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraMeta {
    pub intrinsics: Matrix3<f32>,
    pub inv_intrinsics: Matrix3<f32>,
    pub world_to_live: PackedPose,
    pub live_to_world: PackedPose,
    /// Carried in the record, unused by the flow passes.
    pub voxel_step: Vector3<f32>,
    /// Carried in the record, unused by the flow passes.
    pub voxel_min: Vector3<f32>,
}

impl CameraMeta {
    /// Identity intrinsics and pose. Pixel (w, h) at depth d reprojects to
    /// the world point (w*d, h*d, d).
    pub fn identity() -> Self {
        Self {
            intrinsics: Matrix3::identity(),
            inv_intrinsics: Matrix3::identity(),
            world_to_live: PackedPose::identity(),
            live_to_world: PackedPose::identity(),
            voxel_step: Vector3::zeros(),
            voxel_min: Vector3::zeros(),
        }
    }

    /// Build metadata from pinhole parameters and the camera's
    /// live-to-world pose. The inverse intrinsics and the world-to-live
    /// pose are derived.
    pub fn from_pinhole(
        fx: f32,
        fy: f32,
        cx: f32,
        cy: f32,
        live_to_world: Isometry3<f32>,
    ) -> Result<Self> {
        let intrinsics = Matrix3::new(
            fx, 0.0, cx, //
            0.0, fy, cy, //
            0.0, 0.0, 1.0,
        );
        let Some(inv_intrinsics) = intrinsics.try_inverse() else {
            bail!("intrinsic matrix is singular (fx={fx}, fy={fy})");
        };
        Ok(Self {
            intrinsics,
            inv_intrinsics,
            world_to_live: PackedPose::from_isometry(&live_to_world.inverse()),
            live_to_world: PackedPose::from_isometry(&live_to_world),
            voxel_step: Vector3::zeros(),
            voxel_min: Vector3::zeros(),
        })
    }

    /// Parse one record. Records shorter than [`META_RECORD_LEN`] leave the
    /// voxel fields zeroed.
    pub fn from_record(record: &[f32]) -> Result<Self> {
        if record.len() < META_MIN_LEN {
            bail!(
                "camera record has {} values, need at least {META_MIN_LEN}",
                record.len()
            );
        }
        let read_vec3 = |offset: usize| {
            if record.len() >= offset + 3 {
                Vector3::new(record[offset], record[offset + 1], record[offset + 2])
            } else {
                Vector3::zeros()
            }
        };
        Ok(Self {
            intrinsics: Matrix3::from_row_slice(&record[INTRINSICS..INTRINSICS + 9]),
            inv_intrinsics: Matrix3::from_row_slice(&record[INV_INTRINSICS..INV_INTRINSICS + 9]),
            world_to_live: PackedPose::from_rows(
                &record[POSE_WORLD_TO_LIVE..POSE_WORLD_TO_LIVE + 12],
            ),
            live_to_world: PackedPose::from_rows(
                &record[POSE_LIVE_TO_WORLD..POSE_LIVE_TO_WORLD + 12],
            ),
            voxel_step: read_vec3(VOXEL_STEP),
            voxel_min: read_vec3(VOXEL_MIN),
        })
    }

    /// Encode into a flat record. The buffer must hold at least
    /// [`META_MIN_LEN`] values; the voxel fields are written when it holds
    /// the full [`META_RECORD_LEN`].
    pub fn write_record(&self, out: &mut [f32]) -> Result<()> {
        if out.len() < META_MIN_LEN {
            bail!(
                "record buffer has {} values, need at least {META_MIN_LEN}",
                out.len()
            );
        }
        for r in 0..3 {
            for c in 0..3 {
                out[INTRINSICS + r * 3 + c] = self.intrinsics[(r, c)];
                out[INV_INTRINSICS + r * 3 + c] = self.inv_intrinsics[(r, c)];
            }
        }
        self.world_to_live
            .write_rows(&mut out[POSE_WORLD_TO_LIVE..POSE_WORLD_TO_LIVE + 12]);
        self.live_to_world
            .write_rows(&mut out[POSE_LIVE_TO_WORLD..POSE_LIVE_TO_WORLD + 12]);
        if out.len() >= META_RECORD_LEN {
            for i in 0..3 {
                out[VOXEL_STEP + i] = self.voxel_step[i];
                out[VOXEL_MIN + i] = self.voxel_min[i];
            }
        }
        Ok(())
    }

    /// Encode into a freshly allocated full-length record.
    pub fn to_record(&self) -> Vec<f32> {
        let mut record = vec![0.0; META_RECORD_LEN];
        self.write_record(&mut record)
            .expect("full-length record buffer");
        record
    }
}

/// Parse a `[N, 1, 1, M]` metadata tensor into one record per batch
/// element.
pub fn parse_meta_tensor(meta: &FrameTensor) -> Result<Vec<CameraMeta>> {
    if meta.height() != 1 || meta.width() != 1 {
        bail!(
            "metadata tensor must be [N, 1, 1, M], got {:?}",
            meta.shape()
        );
    }
    if meta.channels() < META_MIN_LEN {
        bail!(
            "metadata record length {} is below the minimum {META_MIN_LEN}",
            meta.channels()
        );
    }
    (0..meta.batch())
        .map(|n| CameraMeta::from_record(meta.pixel(n, 0, 0)))
        .collect()
}
