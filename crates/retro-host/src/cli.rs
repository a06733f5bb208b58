use crate::bridge::HostBridge;
use crate::components::Components;
use crate::memory::{LoggingConsumer, MemoryTracker};
use crate::settings::HostSettings;
use serde::Serialize;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

pub fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 { print_help(); std::process::exit(2); }
    match args[1].as_str() {
        "info" => run_info(&args[2..]),
        "run" => run_frames(&args[2..]),
        "help" | "--help" | "-h" => { print_help(); Ok(()) }
        _ => { eprintln!("unknown command: {}", args[1]); print_help(); std::process::exit(2); }
    }
}

fn run_info(args: &[String]) -> Result<(), Box<dyn Error>> {
    let mut core_path: Option<PathBuf> = None;
    let mut settings_path: Option<PathBuf> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--core"     => { i += 1; core_path = Some(PathBuf::from(require_arg(args, i, "--core")?)); }
            "--settings" => { i += 1; settings_path = Some(PathBuf::from(require_arg(args, i, "--settings")?)); }
            other => { return Err(format!("unexpected argument: {other}").into()); }
        }
        i += 1;
    }

    let core_path = core_path.ok_or("missing --core <library>")?;
    let settings = read_settings(settings_path.as_deref())?;
    let (components, _stats) = Components::headless(settings);
    let mut bridge = HostBridge::new(components);
    bridge.load_core(&core_path)?;
    bridge.init_core()?;

    let report = InfoReport {
        api_version: bridge.api_version(),
        system: bridge.system_info(),
        supports_no_game: bridge.supports_no_game(),
        subsystems: bridge.subsystems().len(),
        restricted_settings: bridge.disallowed_settings().map_or(0, <[_]>::len),
    };
    bridge.destroy();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_frames(args: &[String]) -> Result<(), Box<dyn Error>> {
    let mut core_path: Option<PathBuf> = None;
    let mut content_path: Option<PathBuf> = None;
    let mut settings_path: Option<PathBuf> = None;
    let mut frames: u64 = 60;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--core"     => { i += 1; core_path = Some(PathBuf::from(require_arg(args, i, "--core")?)); }
            "--content"  => { i += 1; content_path = Some(PathBuf::from(require_arg(args, i, "--content")?)); }
            "--settings" => { i += 1; settings_path = Some(PathBuf::from(require_arg(args, i, "--settings")?)); }
            "--frames"   => { i += 1; frames = require_arg(args, i, "--frames")?.parse()?; }
            other => { return Err(format!("unexpected argument: {other}").into()); }
        }
        i += 1;
    }

    let core_path = core_path.ok_or("missing --core <library>")?;
    let settings = read_settings(settings_path.as_deref())?;
    let (components, stats) = Components::headless(settings);
    let mut bridge = HostBridge::new(components);
    bridge.load_core(&core_path)?;
    bridge.init_core()?;

    match &content_path {
        Some(path) => {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if bridge.needs_full_path(ext) {
                bridge.load_game(Some(path), None)?;
            } else {
                let data = fs::read(path)?;
                bridge.load_game(Some(path), Some(&data))?;
            }
        }
        None => bridge.load_game(None, None)?,
    }

    let mut consumer = LoggingConsumer::default();
    let mut tracker = MemoryTracker::new();
    let mut ran = 0u64;
    while ran < frames && !bridge.shutdown_requested() {
        if let Err(e) = bridge.step(true, true) {
            tracker.clear(&mut consumer);
            return Err(e.into());
        }
        tracker.sync(&bridge, &mut consumer);
        ran += 1;
    }

    let av = bridge.av_info();
    let report = RunReport {
        system: bridge.system_info(),
        frames: ran,
        fps: av.timing.fps,
        sample_rate: av.timing.sample_rate,
        width: av.geometry.base_width,
        height: av.geometry.base_height,
        performance_level: bridge.performance_level(),
        shutdown_requested: bridge.shutdown_requested(),
        output: stats.summary(),
        banks: consumer.banks().to_vec(),
    };
    tracker.clear(&mut consumer);
    bridge.destroy();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[derive(Serialize)]
struct InfoReport {
    api_version: u32,
    system: Option<crate::bridge::tables::SystemInfo>,
    supports_no_game: bool,
    subsystems: usize,
    restricted_settings: usize,
}

#[derive(Serialize)]
struct RunReport {
    system: Option<crate::bridge::tables::SystemInfo>,
    frames: u64,
    fps: f64,
    sample_rate: f64,
    width: u32,
    height: u32,
    performance_level: u32,
    shutdown_requested: bool,
    output: crate::components::StatsSummary,
    banks: Vec<crate::memory::InstalledBank>,
}

fn read_settings(path: Option<&Path>) -> Result<HostSettings, Box<dyn Error>> {
    Ok(match path { Some(p) => HostSettings::load(p)?, None => HostSettings::default() })
}

fn require_arg<'a>(args: &'a [String], idx: usize, flag: &str) -> Result<&'a str, Box<dyn Error>> {
    args.get(idx).map(|s| s.as_str()).ok_or_else(|| format!("missing value for {flag}").into())
}

fn print_help() {
    eprintln!("\
retro-host <command>

Commands:
  info --core <library> [--settings <settings.json>]
  run  --core <library> [--content <file>] [--frames <n>] [--settings <settings.json>]

Examples:
  retro-host info --core ./snes9x_libretro.so
  retro-host run --core ./gambatte_libretro.so --content game.gb --frames 600
  RUST_LOG=retro_host=debug retro-host run --core ./core.so --settings host.json
");
}
