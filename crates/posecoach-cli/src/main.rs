use std::env;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, TimeZone, Utc};
use clap::{Parser, Subcommand};
use posecoach_contracts::chat::{parse_command, SESSION_HELP_COMMANDS};
use posecoach_contracts::data_url::extension_for;
use posecoach_contracts::errors::SessionError;
use posecoach_contracts::gallery::{GalleryImage, GalleryStore};
use posecoach_contracts::pose::{Gender, Style};
use posecoach_contracts::session::{BusyKind, CaptureIntent, Phase, SessionState};
use posecoach_engine::driver::GALLERY_FILE;
use posecoach_engine::overlay::DEFAULT_GHOST_OPACITY;
use posecoach_engine::{
    service_from_config, DispatchReport, EngineConfig, PoseService, SessionDriver, StillCapture,
};
use serde_json::json;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "posecoach", version, about = "Camera pose coach")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive capture session.
    Session(SessionArgs),
    /// Analyze one photo and write the reference and ghost overlay.
    Analyze(AnalyzeArgs),
    /// Inspect or maintain a saved gallery.
    Gallery {
        #[command(subcommand)]
        action: GalleryAction,
    },
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    provider: Option<String>,
    #[arg(long, value_parser = parse_gender, default_value = "female")]
    gender: Gender,
    #[arg(long, value_parser = parse_style, default_value = "casual")]
    style: Style,
    /// Image file used as the camera until `/camera` changes it.
    #[arg(long)]
    camera: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    provider: Option<String>,
    #[arg(long, value_parser = parse_gender, default_value = "female")]
    gender: Gender,
    #[arg(long, value_parser = parse_style, default_value = "casual")]
    style: Style,
    #[arg(long, default_value_t = DEFAULT_GHOST_OPACITY)]
    opacity: f32,
}

#[derive(Debug, Subcommand)]
enum GalleryAction {
    List {
        #[arg(long)]
        out: PathBuf,
    },
    Remove {
        id: String,
        #[arg(long)]
        out: PathBuf,
    },
    Export {
        dir: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
}

fn parse_gender(raw: &str) -> Result<Gender, String> {
    raw.parse()
}

fn parse_style(raw: &str) -> Result<Style, String> {
    raw.parse()
}

fn main() {
    init_logging();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("posecoach error: {err:#}");
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr; stdout carries command output only.
fn init_logging() {
    let filter = env::var("POSECOACH_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Session(args) => {
            run_session(args)?;
            Ok(0)
        }
        Command::Analyze(args) => run_analyze(args),
        Command::Gallery { action } => run_gallery(action),
    }
}

fn resolve_service(provider: Option<&str>) -> Result<(EngineConfig, Arc<dyn PoseService>)> {
    let mut config = EngineConfig::from_env();
    if let Some(provider) = provider.map(str::trim).filter(|value| !value.is_empty()) {
        config = config.with_provider(provider.to_ascii_lowercase());
    }
    let service = service_from_config(&config)?;
    tracing::info!(provider = service.name(), "service selected");
    Ok((config, service))
}

fn run_session(args: SessionArgs) -> Result<()> {
    let (config, service) = resolve_service(args.provider.as_deref())?;
    let mut driver = SessionDriver::open(
        &args.out,
        service,
        config.pipeline_timeout(),
        args.gender,
        args.style,
    )?;
    let mut camera = match args.camera.as_deref() {
        Some(path) => Some(StillCapture::open(path)?),
        None => None,
    };

    let stdin = io::stdin();
    let mut line = String::new();

    println!(
        "Posecoach session started ({}). Type /help for commands.",
        driver.service_name()
    );

    loop {
        if driver.poll() {
            print_lines(&describe_state(driver.state()));
        }
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let command = parse_command(input);
        match command.action.as_str() {
            "noop" => {}
            "help" => println!("Commands: {}", SESSION_HELP_COMMANDS.join(" ")),
            "quit" => break,
            "set_camera" => match command.arg("path") {
                Some(path) => match StillCapture::open(path) {
                    Ok(opened) => {
                        camera = Some(opened);
                        println!("Camera set to {path}");
                    }
                    Err(err) => println!("{}", device_failure_line(&err)),
                },
                None => println!("/camera requires a path"),
            },
            "analyze" | "grade" | "save" => {
                let intent = match command.action.as_str() {
                    "analyze" => CaptureIntent::Analyze,
                    "grade" => CaptureIntent::Grade,
                    _ => CaptureIntent::Save,
                };
                if let Some(path) = command.arg("path") {
                    match StillCapture::open(path) {
                        Ok(opened) => camera = Some(opened),
                        Err(err) => {
                            println!("{}", device_failure_line(&err));
                            continue;
                        }
                    }
                }
                let Some(device) = camera.as_mut() else {
                    println!("No camera. Use /camera PATH or /{} PATH", intent.label());
                    continue;
                };
                match driver.capture(intent, device) {
                    Ok(report) => println!("{}", describe_report(&report)),
                    Err(err) => {
                        camera = None;
                        println!("{}", device_failure_line(&err));
                    }
                }
            }
            "wait" => {
                if driver.wait() {
                    print_lines(&describe_state(driver.state()));
                } else {
                    println!("Nothing pending.");
                }
            }
            "status" => println!("{}", serde_json::to_string_pretty(&driver.state().status_json())?),
            "reset" => {
                driver.reset();
                println!("Session reset.");
            }
            "set_gender" => match command.arg("gender").map(str::parse::<Gender>) {
                Some(Ok(gender)) => {
                    driver.set_gender(gender);
                    println!("Gender set to {gender}");
                }
                Some(Err(err)) => println!("{err}"),
                None => println!("Gender is {}", driver.state().gender()),
            },
            "set_style" => match command.arg("style").map(str::parse::<Style>) {
                Some(Ok(style)) => {
                    driver.set_style(style);
                    println!("Style set to {style}");
                }
                Some(Err(err)) => println!("{err}"),
                None => println!("Style is {}", driver.state().style()),
            },
            "list_gallery" => print_lines(&gallery_lines(driver.gallery().entries())),
            "delete_image" => match command.arg("id") {
                Some(id) if driver.remove(id) => println!("Deleted {id}"),
                Some(id) => println!("No gallery entry {id}"),
                None => println!("/delete requires an id"),
            },
            "ghost" => match command.arg("path") {
                Some(path) => println!("{}", ghost_line(&driver, Path::new(path))),
                None => println!("/ghost requires an output path"),
            },
            "export_gallery" => match command.arg("path") {
                Some(path) => println!("{}", export_line(driver.gallery(), Path::new(path))),
                None => println!("/export requires a directory"),
            },
            _ => println!("Unknown command: {}", input.trim()),
        }
    }

    Ok(())
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let (config, service) = resolve_service(args.provider.as_deref())?;
    let mut camera = StillCapture::open(&args.image)?;
    let mut driver = SessionDriver::open(
        &args.out,
        service,
        config.pipeline_timeout(),
        args.gender,
        args.style,
    )?;

    driver.capture(CaptureIntent::Analyze, &mut camera)?;
    driver.wait();
    let state = driver.state();
    if let Some(err) = state.error() {
        bail!("{}: {}", err.user_message(), err.message());
    }
    let (Some(analysis), Some(reference)) = (state.analysis(), state.reference_image()) else {
        bail!("analysis produced no result");
    };

    let reference_path = args
        .out
        .join(format!("reference.{}", extension_for(reference)));
    fs::write(&reference_path, reference)
        .with_context(|| format!("failed to write {}", reference_path.display()))?;
    let ghost_path = args.out.join("ghost.png");
    let ghost = driver.ghost(args.opacity)?;
    fs::write(&ghost_path, ghost)
        .with_context(|| format!("failed to write {}", ghost_path.display()))?;

    let summary = json!({
        "analysis": analysis,
        "landmarks": state.landmarks(),
        "reference_image": reference_path.display().to_string(),
        "ghost_image": ghost_path.display().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(0)
}

fn run_gallery(action: GalleryAction) -> Result<i32> {
    match action {
        GalleryAction::List { out } => {
            let store = GalleryStore::open(out.join(GALLERY_FILE));
            print_lines(&gallery_lines(store.entries()));
            Ok(0)
        }
        GalleryAction::Remove { id, out } => {
            let mut store = GalleryStore::open(out.join(GALLERY_FILE));
            if store.remove(&id) {
                println!("Deleted {id}");
            } else {
                println!("No gallery entry {id}");
            }
            Ok(0)
        }
        GalleryAction::Export { dir, out } => {
            let store = GalleryStore::open(out.join(GALLERY_FILE));
            for path in store.export(&dir)? {
                println!("{}", path.display());
            }
            Ok(0)
        }
    }
}

/// Writes the ghost overlay for `/ghost`. Failures become the reply line so
/// the session keeps running.
fn ghost_line(driver: &SessionDriver, path: &Path) -> String {
    let written = driver.ghost(DEFAULT_GHOST_OPACITY).and_then(|png| {
        fs::write(path, png).with_context(|| format!("failed to write {}", path.display()))
    });
    match written {
        Ok(()) => format!("Ghost overlay written to {}", path.display()),
        Err(err) => format!("Ghost overlay unavailable: {err:#}"),
    }
}

fn export_line(gallery: &GalleryStore, dir: &Path) -> String {
    match gallery.export(dir) {
        Ok(written) => format!("Exported {} files to {}", written.len(), dir.display()),
        Err(err) => format!("Export failed: {err:#}"),
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

fn device_failure_line(err: &anyhow::Error) -> String {
    match err.downcast_ref::<SessionError>() {
        Some(session_err) => format!("{} ({})", session_err.user_message(), session_err.message()),
        None => format!("Camera unavailable: {err:#}"),
    }
}

fn describe_report(report: &DispatchReport) -> String {
    match report {
        DispatchReport::Started { job, kind } => {
            let verb = match kind {
                BusyKind::Analyzing => "Analyzing scene",
                BusyKind::Grading => "Grading pose",
            };
            format!("{verb} (job {job}). /wait to block for the result.")
        }
        DispatchReport::Saved { id } => format!("Saved to gallery as {id}"),
        DispatchReport::Ignored(reason) => format!("Ignored: {reason}"),
    }
}

/// Human summary of the session after a pipeline ends.
fn describe_state(state: &SessionState) -> Vec<String> {
    if let Some(err) = state.error() {
        return vec![format!("Error: {}", err.user_message())];
    }
    let mut lines = Vec::new();
    if let Some(analysis) = state.analysis() {
        let pose = &analysis.suggested_pose;
        lines.push(format!("Scene: {}", analysis.environment));
        lines.push(format!(
            "Lighting: {:?} from {}. {}",
            analysis.lighting.quality, analysis.lighting.direction, analysis.lighting.suggestion
        ));
        lines.push(format!(
            "Background: {:?}. {}",
            analysis.background.clutter_level, analysis.background.suggestion
        ));
        lines.push(format!("Pose: {} ({:?})", pose.title, pose.difficulty));
        lines.push(format!("  {}", pose.description));
        for (idx, step) in pose.steps.iter().enumerate() {
            lines.push(format!("  {}. {step}", idx + 1));
        }
    }
    if let Some(feedback) = state.feedback() {
        lines.push(format!(
            "Score: {}/100 ({})",
            feedback.score,
            feedback.match_status.label()
        ));
        for adjustment in &feedback.adjustments {
            lines.push(format!("  - {adjustment}"));
        }
    }
    if state.phase() == Phase::Idle && lines.is_empty() {
        lines.push("No pose suggested yet.".to_string());
    }
    lines
}

fn gallery_lines(entries: &[GalleryImage]) -> Vec<String> {
    if entries.is_empty() {
        return vec!["Gallery is empty.".to_string()];
    }
    entries
        .iter()
        .map(|entry| {
            let taken = Utc
                .timestamp_millis_opt(entry.timestamp)
                .single()
                .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_else(|| entry.timestamp.to_string());
            format!(
                "{}  score={:>3}  {}{}",
                entry.id,
                entry.score,
                taken,
                if entry.reference_image.is_some() {
                    "  +reference"
                } else {
                    ""
                }
            )
        })
        .collect()
}
