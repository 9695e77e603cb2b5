//! Generic 2-D image sampler, `Texture<T>`: row-major storage, with two
//! named sampling operations. `sample` is nearest-texel with `repeat`
//! wrapping on the UV-derived pixel coordinate; `sample_interpolated` is
//! bilinear with `clamp` at the boundary and a fast path when the sample
//! point lands (almost) exactly on a texel.

use std::ops::{Add, Mul};

use crate::math::{Point2, Vec3};

#[derive(Clone, Debug)]
pub struct Texture<T> {
    width: u32,
    height: u32,
    data: Vec<T>,
}

impl<T: Copy + Add<Output = T> + Mul<f32, Output = T>> Texture<T> {
    pub fn new(width: u32, height: u32, fill: T) -> Self {
        Self {
            width,
            height,
            data: vec![fill; (width * height) as usize],
        }
    }

    pub fn from_data(width: u32, height: u32, data: Vec<T>) -> Self {
        assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Nearest-texel sample with `repeat` wrapping on integer coordinates.
    #[inline]
    pub fn sample_texel(&self, x: i64, y: i64) -> T {
        let w = self.width() as i64;
        let h = self.height() as i64;
        let x = x.rem_euclid(w) as usize;
        let y = y.rem_euclid(h) as usize;
        self.data[y * self.width() as usize + x]
    }

    /// Nearest-texel sample at `uv`: converts to the pixel coordinate
    /// `uv * (size - 1)` and rounds to the nearest integer index, wrapping
    /// (not clamping) at the boundary.
    pub fn sample(&self, uv: Point2) -> T {
        let x = (uv.x * (self.width().max(1) - 1) as f32).round() as i64;
        let y = (uv.y * (self.height().max(1) - 1) as f32).round() as i64;
        self.sample_texel(x, y)
    }

    /// Bilinear sample at `uv in [0, 1]^2`, clamped to the texture bounds.
    pub fn sample_interpolated(&self, uv: Point2) -> T {
        let sample_uv = Vec3::new(
            uv.x * (self.width().max(1) - 1) as f32,
            uv.y * (self.height().max(1) - 1) as f32,
            0.0,
        );

        let fx = sample_uv.x - sample_uv.x.floor();
        let fy = sample_uv.y - sample_uv.y.floor();
        if fx <= 0.001 && fy <= 0.001 {
            return self.sample_clamped(sample_uv.x.round() as i64, sample_uv.y.round() as i64);
        }

        let x0 = sample_uv.x.floor() as i64;
        let y0 = sample_uv.y.floor() as i64;

        let c00 = self.sample_clamped(x0, y0);
        let c10 = self.sample_clamped(x0 + 1, y0);
        let c01 = self.sample_clamped(x0, y0 + 1);
        let c11 = self.sample_clamped(x0 + 1, y0 + 1);

        let top = c00 * (1.0 - fx) + c10 * fx;
        let bottom = c01 * (1.0 - fx) + c11 * fx;
        top * (1.0 - fy) + bottom * fy
    }

    #[inline]
    fn sample_clamped(&self, x: i64, y: i64) -> T {
        let x = x.clamp(0, self.width() as i64 - 1) as usize;
        let y = y.clamp(0, self.height() as i64 - 1) as usize;
        self.data[y * self.width() as usize + x]
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorRgb;
    use approx::assert_abs_diff_eq;

    #[test]
    fn nearest_sample_repeats() {
        let tex: Texture<f32> = Texture::from_data(2, 1, vec![1.0, 2.0]);
        assert_abs_diff_eq!(tex.sample_texel(2, 0), 1.0);
        assert_abs_diff_eq!(tex.sample_texel(-1, 0), 2.0);
    }

    #[test]
    fn bilinear_interpolates_between_texels() {
        let tex: Texture<f32> = Texture::from_data(2, 1, vec![0.0, 1.0]);
        let mid = tex.sample_interpolated(Point2::new(0.5, 0.0));
        assert_abs_diff_eq!(mid, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn single_pixel_texture_is_constant() {
        let tex: Texture<ColorRgb> = Texture::new(1, 1, ColorRgb::WHITE);
        let s = tex.sample_interpolated(Point2::new(0.3, 0.8));
        assert_abs_diff_eq!(s.r(), 1.0);
    }

    #[test]
    fn nearest_uv_sample_wraps_past_the_far_edge() {
        let tex: Texture<f32> = Texture::from_data(2, 1, vec![1.0, 2.0]);
        // uv = 2.0 rounds to pixel index 2, which wraps to texel 0.
        assert_abs_diff_eq!(tex.sample(Point2::new(2.0, 0.0)), 1.0);
        // uv = -1.0 rounds to pixel index -1, which wraps to the last texel.
        assert_abs_diff_eq!(tex.sample(Point2::new(-1.0, 0.0)), 2.0);
    }
}
