//! Flat NHWC tensor containers shared by both flow passes.
//!
//! All bulk data lives in contiguous `Vec<f32>` buffers with explicit
//! strides (`((n*H + h)*W + w)*C + c`). The per-pixel kernels rely on this
//! exact layout: a pixel's channels are adjacent, and the flattened
//! (batch, row, column) index enumerates disjoint output locations for the
//! parallel workers.

use anyhow::{bail, Result};
use nalgebra::Vector3;

/// Owned 4D tensor indexed (batch, row, column, channel).
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTensor {
    batch: usize,
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<f32>,
}

impl FrameTensor {
    /// Create a zero-filled tensor.
    pub fn zeros(batch: usize, height: usize, width: usize, channels: usize) -> Self {
        Self {
            batch,
            height,
            width,
            channels,
            data: vec![0.0; batch * height * width * channels],
        }
    }

    /// Wrap an existing buffer, checking that its length matches the shape.
    pub fn from_vec(
        batch: usize,
        height: usize,
        width: usize,
        channels: usize,
        data: Vec<f32>,
    ) -> Result<Self> {
        let expected = batch * height * width * channels;
        if data.len() != expected {
            bail!(
                "buffer length {} does not match shape [{batch}, {height}, {width}, {channels}] ({expected} values)",
                data.len()
            );
        }
        Ok(Self {
            batch,
            height,
            width,
            channels,
            data,
        })
    }

    /// Internal constructor for kernel outputs whose length is correct by
    /// construction.
    pub(crate) fn from_parts(
        batch: usize,
        height: usize,
        width: usize,
        channels: usize,
        data: Vec<f32>,
    ) -> Self {
        debug_assert_eq!(data.len(), batch * height * width * channels);
        Self {
            batch,
            height,
            width,
            channels,
            data,
        }
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Shape as `[N, H, W, C]`.
    pub fn shape(&self) -> [usize; 4] {
        [self.batch, self.height, self.width, self.channels]
    }

    /// Number of pixels across all batch elements.
    pub fn num_pixels(&self) -> usize {
        self.batch * self.height * self.width
    }

    #[inline]
    fn pixel_offset(&self, n: usize, h: usize, w: usize) -> usize {
        ((n * self.height + h) * self.width + w) * self.channels
    }

    /// Channel slice of one pixel.
    #[inline]
    pub fn pixel(&self, n: usize, h: usize, w: usize) -> &[f32] {
        let offset = self.pixel_offset(n, h, w);
        &self.data[offset..offset + self.channels]
    }

    /// Mutable channel slice of one pixel.
    #[inline]
    pub fn pixel_mut(&mut self, n: usize, h: usize, w: usize) -> &mut [f32] {
        let offset = self.pixel_offset(n, h, w);
        &mut self.data[offset..offset + self.channels]
    }

    /// Single channel value of one pixel.
    #[inline]
    pub fn at(&self, n: usize, h: usize, w: usize, c: usize) -> f32 {
        self.data[self.pixel_offset(n, h, w) + c]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Per-pixel 3D point field with an explicit undefined sentinel.
///
/// Storage is a plain 3-channel [`FrameTensor`] whose undefined pixels hold
/// NaN in all three channels, so buffers interchange directly with callers
/// that use the raw convention. The API only ever hands out
/// `Option<Vector3<f32>>`, keeping validity checks away from raw NaN
/// comparisons. Invariant: a pixel is undefined iff its source depth was
/// non-positive or the pixel was never computed.
#[derive(Debug, Clone, PartialEq)]
pub struct PointField {
    tensor: FrameTensor,
}

impl PointField {
    /// Create a field with every pixel undefined.
    pub fn undefined(batch: usize, height: usize, width: usize) -> Self {
        Self {
            tensor: FrameTensor::from_parts(
                batch,
                height,
                width,
                3,
                vec![f32::NAN; batch * height * width * 3],
            ),
        }
    }

    /// Wrap an existing tensor; it must carry exactly the 3 point channels.
    pub fn from_tensor(tensor: FrameTensor) -> Result<Self> {
        if tensor.channels() != 3 {
            bail!(
                "point field requires 3 channels, got {}",
                tensor.channels()
            );
        }
        Ok(Self { tensor })
    }

    pub(crate) fn from_parts(batch: usize, height: usize, width: usize, data: Vec<f32>) -> Self {
        Self {
            tensor: FrameTensor::from_parts(batch, height, width, 3, data),
        }
    }

    pub fn batch(&self) -> usize {
        self.tensor.batch()
    }

    pub fn height(&self) -> usize {
        self.tensor.height()
    }

    pub fn width(&self) -> usize {
        self.tensor.width()
    }

    /// The point recorded at a pixel, or `None` when undefined.
    #[inline]
    pub fn point(&self, n: usize, h: usize, w: usize) -> Option<Vector3<f32>> {
        let p = self.tensor.pixel(n, h, w);
        if p[0].is_nan() || p[1].is_nan() || p[2].is_nan() {
            None
        } else {
            Some(Vector3::new(p[0], p[1], p[2]))
        }
    }

    /// Record a valid point at a pixel.
    #[inline]
    pub fn set_point(&mut self, n: usize, h: usize, w: usize, point: Vector3<f32>) {
        self.tensor
            .pixel_mut(n, h, w)
            .copy_from_slice(&[point.x, point.y, point.z]);
    }

    /// Mark a pixel undefined.
    #[inline]
    pub fn clear_point(&mut self, n: usize, h: usize, w: usize) {
        self.tensor
            .pixel_mut(n, h, w)
            .copy_from_slice(&[f32::NAN; 3]);
    }

    pub fn as_tensor(&self) -> &FrameTensor {
        &self.tensor
    }

    pub fn into_tensor(self) -> FrameTensor {
        self.tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_layout() {
        let mut t = FrameTensor::zeros(2, 2, 3, 4);
        t.pixel_mut(1, 0, 2)[3] = 7.0;

        // ((n*H + h)*W + w)*C + c = ((1*2 + 0)*3 + 2)*4 + 3 = 35
        assert_eq!(t.as_slice()[35], 7.0);
        assert_eq!(t.at(1, 0, 2, 3), 7.0);
        assert_eq!(t.pixel(1, 0, 2), &[0.0, 0.0, 0.0, 7.0]);
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        let result = FrameTensor::from_vec(1, 2, 2, 1, vec![0.0; 5]);
        assert!(result.is_err());
    }

    #[test]
    fn test_shape_accessors() {
        let t = FrameTensor::zeros(2, 4, 5, 3);
        assert_eq!(t.shape(), [2, 4, 5, 3]);
        assert_eq!(t.num_pixels(), 40);
        assert_eq!(t.as_slice().len(), 120);
    }

    #[test]
    fn test_point_field_starts_undefined() {
        let field = PointField::undefined(1, 2, 2);
        for h in 0..2 {
            for w in 0..2 {
                assert!(field.point(0, h, w).is_none());
            }
        }
    }

    #[test]
    fn test_point_field_set_and_clear() {
        let mut field = PointField::undefined(1, 2, 2);
        field.set_point(0, 1, 0, Vector3::new(1.0, 2.0, 3.0));

        let p = field.point(0, 1, 0).unwrap();
        assert_eq!(p, Vector3::new(1.0, 2.0, 3.0));
        assert!(field.point(0, 0, 0).is_none());

        field.clear_point(0, 1, 0);
        assert!(field.point(0, 1, 0).is_none());
    }

    #[test]
    fn test_point_field_partial_nan_is_undefined() {
        let mut raw = vec![0.0f32; 3];
        raw[1] = f32::NAN;
        let tensor = FrameTensor::from_vec(1, 1, 1, 3, raw).unwrap();
        let field = PointField::from_tensor(tensor).unwrap();
        assert!(field.point(0, 0, 0).is_none());
    }

    #[test]
    fn test_point_field_rejects_wrong_channels() {
        let tensor = FrameTensor::zeros(1, 1, 1, 4);
        assert!(PointField::from_tensor(tensor).is_err());
    }
}
