use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use minifb::{Key, KeyRepeat, Scale, Window, WindowOptions};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wavetank::config::Config;
use wavetank::render::{self, FrameRecorder};
use wavetank::simulation::Simulation;

#[derive(Parser, Debug)]
#[command(name = "wavetank")]
#[command(about = "2D scalar wave simulator with a live display loop")]
struct Cli {
    /// Path to TOML configuration
    #[arg(long, default_value = "wavetank.toml")]
    config: PathBuf,

    /// Run this many ticks without a window
    #[arg(long)]
    steps: Option<usize>,

    /// Write PNG heatmap frames while running
    #[arg(long)]
    record: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wavetank=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;
    config.log_summary();

    let mut sim = Simulation::from_config(&config);

    if let Some(path) = config.materials.image.clone() {
        match import_material_image(&mut sim, &path) {
            Ok(()) => info!(image = %path.display(), "Material grid derived from image"),
            Err(e) => warn!(image = %path.display(), "Material import failed: {e:#}"),
        }
    }

    let recorder = if cli.record {
        Some(FrameRecorder::new(
            Path::new(&config.recording.output_dir),
            config.recording.image_width,
            config.recording.image_height,
        )?)
    } else {
        None
    };

    match cli.steps {
        Some(steps) => run_headless(&mut sim, &config, recorder.as_ref(), steps),
        None => run_window(&mut sim, &config, recorder.as_ref()),
    }
}

fn import_material_image(sim: &mut Simulation, path: &Path) -> Result<()> {
    let img = image::open(path)
        .with_context(|| format!("Failed to load material image '{}'", path.display()))?
        .to_rgb8();
    sim.import_materials(&img)?;
    Ok(())
}

fn run_headless(
    sim: &mut Simulation,
    config: &Config,
    recorder: Option<&FrameRecorder>,
    steps: usize,
) -> Result<()> {
    info!(steps, "Running without a window");
    let report_every = (steps / 10).max(1);

    for tick in 1..=steps {
        sim.step();

        if tick % report_every == 0 {
            info!(tick, t = sim.time(), "Progress");
        }
        if let Some(recorder) = recorder {
            if tick % config.recording.every == 0 {
                recorder.save_frame(&sim.field.current, tick, sim.time())?;
            }
        }
    }

    info!(t = sim.time(), "Simulation complete");
    Ok(())
}

fn run_window(
    sim: &mut Simulation,
    config: &Config,
    recorder: Option<&FrameRecorder>,
) -> Result<()> {
    let l = sim.grid.l;
    let mut window = Window::new(
        &title(sim),
        l,
        l,
        WindowOptions {
            scale: scale_for(config.display.pixel_size),
            ..WindowOptions::default()
        },
    )
    .context("Failed to create window")?;
    window.set_target_fps(config.display.target_fps);

    let mut buf = vec![0u32; l * l];
    let mut tick: usize = 0;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        if handle_input(&window, sim, config) {
            window.set_title(&title(sim));
        }

        // One integration tick per frame
        sim.step();
        tick += 1;

        render::shade(&sim.field.current, sim.materials(), &mut buf);
        if let Some(recorder) = recorder {
            if tick % config.recording.every == 0 {
                recorder.save_frame(&sim.field.current, tick, sim.time())?;
            }
        }

        window
            .update_with_buffer(&buf, l, l)
            .context("Failed to present frame")?;
    }
    Ok(())
}

/// Apply user controls to the source descriptor and material grid.
/// Returns true if anything changed that the title should reflect.
fn handle_input(window: &Window, sim: &mut Simulation, config: &Config) -> bool {
    let mut changed = false;

    let (mut sx, mut sy) = (sim.source().x, sim.source().y);
    if window.is_key_pressed(Key::Left, KeyRepeat::Yes) {
        sx = sx.saturating_sub(1);
    }
    if window.is_key_pressed(Key::Right, KeyRepeat::Yes) {
        sx += 1;
    }
    if window.is_key_pressed(Key::Up, KeyRepeat::Yes) {
        sy = sy.saturating_sub(1);
    }
    if window.is_key_pressed(Key::Down, KeyRepeat::Yes) {
        sy += 1;
    }
    if (sx, sy) != (sim.source().x, sim.source().y) {
        sim.set_source_position(sx, sy);
        changed = true;
    }

    if window.is_key_pressed(Key::A, KeyRepeat::Yes) {
        sim.set_amplitude(sim.source().amplitude + 10.0);
        changed = true;
    }
    if window.is_key_pressed(Key::Z, KeyRepeat::Yes) {
        sim.set_amplitude((sim.source().amplitude - 10.0).max(0.0));
        changed = true;
    }
    if window.is_key_pressed(Key::S, KeyRepeat::Yes) {
        sim.set_frequency(sim.source().frequency + 0.1);
        changed = true;
    }
    if window.is_key_pressed(Key::X, KeyRepeat::Yes) {
        sim.set_frequency((sim.source().frequency - 0.1).max(0.0));
        changed = true;
    }
    if window.is_key_pressed(Key::D, KeyRepeat::Yes) {
        sim.set_omega(sim.source().omega + 0.5);
        changed = true;
    }
    if window.is_key_pressed(Key::C, KeyRepeat::Yes) {
        sim.set_omega((sim.source().omega - 0.5).max(0.0));
        changed = true;
    }

    if window.is_key_pressed(Key::R, KeyRepeat::No) {
        sim.reset();
        info!("Field reset");
    }
    if window.is_key_pressed(Key::M, KeyRepeat::No) {
        sim.rebuild_default_materials();
        info!("Default material grid rebuilt");
    }
    if window.is_key_pressed(Key::I, KeyRepeat::No) {
        match &config.materials.image {
            Some(path) => match import_material_image(sim, path) {
                Ok(()) => info!(image = %path.display(), "Material grid re-imported"),
                Err(e) => warn!(image = %path.display(), "Material import failed: {e:#}"),
            },
            None => warn!("No material image configured"),
        }
    }

    changed
}

fn title(sim: &Simulation) -> String {
    let s = sim.source();
    format!(
        "wavetank - source ({}, {}) amp {:.0} freq {:.1} omega {:.1}",
        s.x, s.y, s.amplitude, s.frequency, s.omega
    )
}

fn scale_for(pixel_size: usize) -> Scale {
    match pixel_size {
        1 => Scale::X1,
        2 => Scale::X2,
        4 => Scale::X4,
        8 => Scale::X8,
        16 => Scale::X16,
        32 => Scale::X32,
        _ => Scale::X1,
    }
}
