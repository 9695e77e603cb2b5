//! Parallel-over-scanlines renderer: accumulates `samples` camera rays per
//! pixel into a running mean for each output channel, using `rayon` for
//! scanline parallelism.

use rayon::prelude::*;

use crate::camera::Camera;
use crate::color::ColorRgb;
use crate::integrator::sample_path;
use crate::math::{Vec2, Vec3, Xoshiro256StarStar};
use crate::world::World;

#[derive(Clone, Copy, Debug, Default)]
pub struct OutputChannels {
    pub color: bool,
    pub depth: bool,
    pub normal: bool,
    pub albedo: bool,
    pub emission: bool,
    #[cfg(feature = "bvh_test")]
    pub aabb_test_count: bool,
    #[cfg(feature = "bvh_test")]
    pub triangle_test_count: bool,
}

impl OutputChannels {
    pub fn color_only() -> Self {
        Self {
            color: true,
            ..Default::default()
        }
    }

    pub fn all() -> Self {
        Self {
            color: true,
            depth: true,
            normal: true,
            albedo: true,
            emission: true,
            #[cfg(feature = "bvh_test")]
            aabb_test_count: true,
            #[cfg(feature = "bvh_test")]
            triangle_test_count: true,
        }
    }
}

/// The accumulated image, one plane per enabled output channel. Disabled
/// channels stay as empty vectors, matching the source's zero-sized
/// `Texture` for channels the caller didn't ask for.
#[derive(Clone, Debug)]
pub struct Output {
    pub image_size: (u32, u32),
    pub color: Vec<ColorRgb>,
    pub depth: Vec<f32>,
    pub normal: Vec<Vec3>,
    pub albedo: Vec<ColorRgb>,
    pub emission: Vec<ColorRgb>,
    #[cfg(feature = "bvh_test")]
    pub aabb_test_count: Vec<f32>,
    #[cfg(feature = "bvh_test")]
    pub triangle_test_count: Vec<f32>,
}

impl Output {
    fn new(image_size: (u32, u32), channels: OutputChannels) -> Self {
        let pixel_count = (image_size.0 * image_size.1) as usize;
        let plane = |enabled: bool| if enabled { pixel_count } else { 0 };
        Self {
            image_size,
            color: vec![ColorRgb::BLACK; plane(channels.color)],
            depth: vec![f32::NAN; plane(channels.depth)],
            normal: vec![Vec3::new(f32::NAN, f32::NAN, f32::NAN); plane(channels.normal)],
            albedo: vec![ColorRgb::new(f32::NAN, f32::NAN, f32::NAN); plane(channels.albedo)],
            emission: vec![ColorRgb::new(f32::NAN, f32::NAN, f32::NAN); plane(channels.emission)],
            #[cfg(feature = "bvh_test")]
            aabb_test_count: vec![f32::NAN; plane(channels.aabb_test_count)],
            #[cfg(feature = "bvh_test")]
            triangle_test_count: vec![f32::NAN; plane(channels.triangle_test_count)],
        }
    }
}

/// NaN-guarded running mean: a NaN `current` value is treated as "no
/// contribution" so auxiliary channels that are only captured on a
/// non-transmissive bounce don't poison already-converged pixels with NaN
/// from paths that only ever hit glass.
fn running_mean_scalar(previous: f32, current: f32, sample_count: u32) -> f32 {
    if sample_count == 1 {
        return current;
    }
    if current.is_nan() {
        return previous;
    }
    if previous.is_nan() {
        return current;
    }
    (previous * (sample_count - 1) as f32 + current) / sample_count as f32
}

fn running_mean_color(previous: ColorRgb, current: ColorRgb, sample_count: u32) -> ColorRgb {
    ColorRgb::new(
        running_mean_scalar(previous.r(), current.r(), sample_count),
        running_mean_scalar(previous.g(), current.g(), sample_count),
        running_mean_scalar(previous.b(), current.b(), sample_count),
    )
}

fn running_mean_vec3(previous: Vec3, current: Vec3, sample_count: u32) -> Vec3 {
    Vec3::new(
        running_mean_scalar(previous.x, current.x, sample_count),
        running_mean_scalar(previous.y, current.y, sample_count),
        running_mean_scalar(previous.z, current.z, sample_count),
    )
}

#[derive(Clone, Debug)]
pub struct Renderer {
    pub image_size: (u32, u32),
    pub samples: u32,
    pub max_bounces: u32,
    pub output_channels: OutputChannels,
    pub seed: u64,
}

impl Renderer {
    /// Renders `world` through `camera`, invoking `sample_callback` after
    /// every accumulated sample (for a progress bar, or incremental
    /// preview). Each scanline gets its own RNG seeded from `(seed, y,
    /// sampleNum)` so the render is reproducible regardless of how rayon
    /// schedules rows, while still drawing an independent jitter/scatter
    /// sequence every sample.
    pub fn render_frame<F>(&self, world: &mut World, camera: &mut Camera, mut sample_callback: F) -> Output
    where
        F: FnMut(&Output, u32),
    {
        camera.initialize(self.image_size);
        world.frame_begin();

        let mut output = Output::new(self.image_size, self.output_channels);
        if self.samples == 0 {
            return output;
        }

        for sample_num in 1..=self.samples {
            self.sample_frame(&mut output, world, camera, sample_num);
            sample_callback(&output, sample_num);
        }

        output
    }

    fn sample_frame(&self, output: &mut Output, world: &World, camera: &Camera, sample_num: u32) {
        let (width, height) = self.image_size;
        let row_stride = width as usize;

        let rows: Vec<Row> = (0..height)
            .into_par_iter()
            .map(|y| {
                let mut rng = Xoshiro256StarStar::seed_from_u64(self.seed ^ ((y as u64) << 32) ^ sample_num as u64);
                let mut row = Row::with_capacity(y, row_stride);

                for x in 0..width {
                    let jitter = Vec2::new(rng.next_f32() - 0.5, rng.next_f32() - 0.5);
                    let ray = camera.create_ray((x, y), jitter, &mut rng);
                    let sample = sample_path(world, ray, self.max_bounces, &mut rng);
                    row.color.push(sample.color);
                    row.depth.push(sample.depth);
                    row.normal.push(sample.normal);
                    row.albedo.push(sample.albedo);
                    row.emission.push(sample.emission);
                    #[cfg(feature = "bvh_test")]
                    row.aabb_test_count.push(sample.aabb_test_count);
                    #[cfg(feature = "bvh_test")]
                    row.triangle_test_count.push(sample.triangle_test_count);
                }

                row
            })
            .collect();

        for row in rows {
            let y = row.y;
            let (color_row, depth_row, normal_row, albedo_row, emission_row) =
                (&row.color, &row.depth, &row.normal, &row.albedo, &row.emission);
            for x in 0..width as usize {
                let pixel = y as usize * row_stride + x;
                if self.output_channels.color {
                    output.color[pixel] =
                        running_mean_color(output.color[pixel], color_row[x], sample_num);
                }
                if self.output_channels.depth {
                    output.depth[pixel] =
                        running_mean_scalar(output.depth[pixel], depth_row[x], sample_num);
                }
                if self.output_channels.normal {
                    output.normal[pixel] =
                        running_mean_vec3(output.normal[pixel], normal_row[x], sample_num);
                }
                if self.output_channels.albedo {
                    output.albedo[pixel] =
                        running_mean_color(output.albedo[pixel], albedo_row[x], sample_num);
                }
                if self.output_channels.emission {
                    output.emission[pixel] =
                        running_mean_color(output.emission[pixel], emission_row[x], sample_num);
                }
                #[cfg(feature = "bvh_test")]
                if self.output_channels.aabb_test_count {
                    output.aabb_test_count[pixel] = running_mean_scalar(
                        output.aabb_test_count[pixel],
                        row.aabb_test_count[x],
                        sample_num,
                    );
                }
                #[cfg(feature = "bvh_test")]
                if self.output_channels.triangle_test_count {
                    output.triangle_test_count[pixel] = running_mean_scalar(
                        output.triangle_test_count[pixel],
                        row.triangle_test_count[x],
                        sample_num,
                    );
                }
            }
        }
    }
}

/// One scanline's worth of per-pixel samples, collected in parallel and
/// folded into the running-mean `Output` afterwards.
struct Row {
    y: u32,
    color: Vec<ColorRgb>,
    depth: Vec<f32>,
    normal: Vec<Vec3>,
    albedo: Vec<ColorRgb>,
    emission: Vec<ColorRgb>,
    #[cfg(feature = "bvh_test")]
    aabb_test_count: Vec<f32>,
    #[cfg(feature = "bvh_test")]
    triangle_test_count: Vec<f32>,
}

impl Row {
    fn with_capacity(y: u32, row_stride: usize) -> Self {
        Self {
            y,
            color: Vec::with_capacity(row_stride),
            depth: Vec::with_capacity(row_stride),
            normal: Vec::with_capacity(row_stride),
            albedo: Vec::with_capacity(row_stride),
            emission: Vec::with_capacity(row_stride),
            #[cfg(feature = "bvh_test")]
            aabb_test_count: Vec::with_capacity(row_stride),
            #[cfg(feature = "bvh_test")]
            triangle_test_count: Vec::with_capacity(row_stride),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_mean_ignores_nan_contributions() {
        assert_eq!(running_mean_scalar(0.5, f32::NAN, 2), 0.5);
        assert_eq!(running_mean_scalar(f32::NAN, 0.7, 2), 0.7);
    }

    #[test]
    fn running_mean_of_constant_value_stays_constant() {
        let mut mean = 2.0;
        for n in 1..=10 {
            mean = running_mean_scalar(mean, 2.0, n);
        }
        assert_eq!(mean, 2.0);
    }

    #[test]
    fn running_mean_converges_to_the_arithmetic_average() {
        let samples = [1.0, 2.0, 3.0, 4.0];
        let mut mean = f32::NAN;
        for (i, &s) in samples.iter().enumerate() {
            mean = running_mean_scalar(mean, s, i as u32 + 1);
        }
        assert!((mean - 2.5).abs() < 1e-5);
    }
}
