#![deny(future_incompatible)]
#![deny(nonstandard_style)]
#![allow(clippy::too_many_arguments)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

mod aabb;
mod bmp;
mod bvh;
mod camera;
mod color;
mod config;
mod hittable;
mod integrator;
mod interval;
mod material;
mod math;
mod mesh;
mod ray;
mod renderer;
mod scenes;
mod texture;
mod transform;
mod triangle;
mod world;

use config::{RenderConfig, RenderConfigOverrides};
use renderer::{OutputChannels, Renderer};

#[derive(clap::Parser)]
#[clap(author, version, about = "Offline, physically based Monte-Carlo path tracer")]
struct CliArgs {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Renders a scene to `color.bmp` (and, optionally, auxiliary AOVs).
    Render(RenderArgs),
}

#[derive(clap::Args)]
struct RenderArgs {
    /// RON config file. Defaults are used for any field it omits.
    #[clap(long)]
    config: Option<PathBuf>,

    #[clap(long)]
    seed: Option<u64>,

    #[clap(long)]
    samples: Option<u32>,

    #[clap(long = "max-bounces")]
    max_bounces: Option<u32>,

    #[clap(long)]
    width: Option<u32>,

    #[clap(long)]
    height: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::init();

    match CliArgs::parse().command {
        Commands::Render(args) => run_render(args),
    }
}

fn run_render(args: RenderArgs) -> Result<()> {
    let base_config = match &args.config {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig::default(),
    };

    let overrides = RenderConfigOverrides {
        seed: args.seed,
        samples: args.samples,
        max_bounces: args.max_bounces,
        width: args.width,
        height: args.height,
    };
    let config = overrides.apply(base_config);

    log::info!(
        "rendering {}x{} at {} samples/pixel, seed={}",
        config.image_width,
        config.image_height,
        config.samples_per_pixel,
        config.seed,
    );

    let (mut world, mut camera) = scenes::build(config.scene);

    let renderer = Renderer {
        image_size: (config.image_width, config.image_height),
        samples: config.samples_per_pixel,
        max_bounces: config.max_bounces,
        output_channels: OutputChannels::color_only(),
        seed: config.seed,
    };

    let progress = indicatif::ProgressBar::new(u64::from(config.samples_per_pixel));
    progress.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} samples")
            .expect("progress bar template is valid"),
    );

    let output = renderer.render_frame(&mut world, &mut camera, |_output, sample_num| {
        progress.set_position(u64::from(sample_num));
    });
    progress.finish_and_clear();

    let output_dir = work_dir().join(&config.output_dir);
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let color_path = output_dir.join("color.bmp");
    let tonemapped: Vec<_> = output.color.iter().map(|c| c.tonemap()).collect();
    bmp::write_bmp(&color_path, config.image_width, config.image_height, &tonemapped)?;
    log::info!("wrote {}", color_path.display());

    Ok(())
}

#[must_use]
pub fn manifest_dir() -> PathBuf {
    std::env::var("CARGO_MANIFEST_DIR")
        .expect("CARGO_MANIFEST_DIR is not set")
        .into()
}

#[must_use]
pub fn work_dir() -> PathBuf {
    let work_dir = manifest_dir().join("work");
    if !work_dir.exists() {
        std::fs::create_dir(&work_dir).expect("failed to create work directory");
    }
    work_dir
}
