use clap::Parser;
use mixbus::{AudioSystem, EngineConfig, MeteringPipeline, MeteringService};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "mixbus")]
#[command(about = "Play audio files through per-track node sets and print master metering")]
#[command(version)]
struct Cli {
    /// Audio files, one track each
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Engine config (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fader gain applied to every track, in dB
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    volume: f32,

    /// Loop region as START:END in seconds
    #[arg(long = "loop", value_parser = parse_loop)]
    loop_region: Option<(f64, f64)>,

    /// Plugin chain for every track, e.g. "eq,compressor,reverb"
    #[arg(long, value_delimiter = ',')]
    plugins: Vec<String>,

    /// Run the metronome at this tempo
    #[arg(long)]
    bpm: Option<f32>,

    /// Seconds to run before exiting
    #[arg(short, long, default_value = "10")]
    seconds: f64,

    /// Print snapshots as JSON lines
    #[arg(long)]
    json: bool,
}

fn parse_loop(value: &str) -> Result<(f64, f64), String> {
    let (start, end) = value
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got '{}'", value))?;
    let start = start.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let end = end.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Ok((start, end))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let mut system = AudioSystem::new(&config)?;
    println!(
        "Output: {} Hz, {} channel(s)",
        system.sample_rate(),
        system.channels()
    );

    let mut pipeline = MeteringPipeline::new(config.metering.clone(), system.sample_rate())
        .with_registry(system.controller.registry().clone());
    system.controller.start_metering(&mut pipeline)?;

    let json = cli.json;
    let _subscription = pipeline.on_metering_update(move |snapshot| {
        if json {
            match serde_json::to_string(snapshot) {
                Ok(line) => println!("{}", line),
                Err(e) => log::warn!("Snapshot serialization failed: {}", e),
            }
        } else {
            let l = &snapshot.loudness;
            println!(
                "peak {:>7.2} dB | TP {:>7.2} dBTP | ST {:>7.2} LUFS~ | INT {:>7.2} LUFS~ | corr {:>5.2} | tracks {}",
                snapshot.levels.peak_db,
                l.true_peak,
                l.short_term_lufs,
                l.integrated_lufs,
                l.phase_correlation,
                snapshot.per_track_metrics.len()
            );
        }
    });
    let pipeline = Arc::new(Mutex::new(pipeline));
    let service = MeteringService::spawn(Arc::clone(&pipeline), Duration::from_millis(20))?;

    let controller = &mut system.controller;
    if let Some((start, end)) = cli.loop_region {
        let region = controller.set_loop_region(start, end, true);
        println!("Loop: {:.2}s - {:.2}s", region.start, region.end);
    }
    if let Some(bpm) = cli.bpm {
        let bpm = controller.set_metronome_bpm(bpm);
        controller.set_metronome_enabled(true);
        println!("Metronome: {} BPM", bpm);
    }

    let mut track_ids = Vec::new();
    for (index, path) in cli.files.iter().enumerate() {
        let track_id = index as u32;
        if !controller.load_audio_path(track_id, path) {
            eprintln!("Skipping {}", path.display());
            continue;
        }
        if !cli.plugins.is_empty() {
            controller.set_plugin_chain(track_id, &cli.plugins);
        }
        if controller.play_audio(track_id, 0.0, cli.volume, 0.0) {
            track_ids.push(track_id);
        }
    }
    if track_ids.is_empty() && cli.bpm.is_none() {
        eprintln!("Nothing to play");
        return Ok(());
    }

    let started = Instant::now();
    while started.elapsed().as_secs_f64() < cli.seconds {
        controller.poll_events();
        if track_ids.iter().all(|&id| !controller.is_playing(id)) && cli.bpm.is_none() {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    controller.stop_all_audio();
    service.join();
    let mut pipeline = pipeline.lock();
    system.controller.stop_metering(&mut pipeline);
    Ok(())
}
