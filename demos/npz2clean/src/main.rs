use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use mocap_core::codec::{AnimationCodec, SequenceCodec};
use mocap_core::pipeline::{clean, CleanupConfig};
use std::path::Path;

/// Clean a raw per-frame rotation dump into a smooth quaternion animation.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Input npz with per-frame rotation matrices and camera metadata.
    #[arg(short, long)]
    input: String,
    /// Output npz for the cleaned quaternion animation.
    #[arg(short, long)]
    output: String,
    /// Override the declared frame rate.
    #[arg(long)]
    fps: Option<f32>,
    /// Wrist angular velocity cap in degrees per frame.
    #[arg(long, default_value_t = 30.0)]
    velocity_cap: f32,
    /// Hard limit on hand rotation magnitude in degrees.
    #[arg(long, default_value_t = 120.0)]
    max_rotation: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let input_path = Path::new(&args.input);
    if !input_path.exists() {
        bail!("input file does not exist: {}", input_path.display());
    }

    let mut codec = SequenceCodec::from_file(input_path)
        .with_context(|| format!("reading {}", input_path.display()))?;
    if let Some(fps) = args.fps {
        codec.frame_rate = Some(fps);
    }
    let sequence = codec.into_sequence().context("assembling input sequence")?;

    let config = CleanupConfig {
        wrist_velocity_cap: args.velocity_cap.to_radians(),
        max_rotation_angle: args.max_rotation.to_radians(),
        ..CleanupConfig::default()
    };
    let (animation, report) = clean(&sequence, &config).context("running cleanup pipeline")?;

    info!(
        "report: {} dropped frames, {} sign flips, {} outliers, {} velocity-limited frames, {} clamps",
        report.dropped_frames,
        report.sign_flips,
        report.outliers_rejected,
        report.frames_velocity_limited,
        report.rotations_clamped
    );

    AnimationCodec::from_animation(&animation)
        .to_file(&args.output)
        .with_context(|| format!("writing {}", args.output))?;
    Ok(())
}
