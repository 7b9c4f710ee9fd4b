//! Stress Sense Agent CLI
//!
//! Live stress monitoring from facial emotion probabilities.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stress_sense_agent::{
    collector::{Collector, CollectorConfig, EmotionLabel, FrameEvent},
    config::Config,
    core::{FrameOutcome, Monitor, RecorderState, SessionReport, SkipReason},
    transparency::create_shared_log_with_persistence,
    CALM_DOWN_MESSAGE, PRIVACY_DECLARATION, VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stress-sense")]
#[command(version = VERSION)]
#[command(about = "Live stress monitoring from facial emotion probabilities", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a monitoring session over classifier output
    Start {
        /// JSON-lines file of classified frames (reads stdin if omitted)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Comma-separated emotions you actually felt, recorded after the session
        #[arg(long)]
        feedback: Option<String>,
    },

    /// Grant camera consent
    Consent,

    /// Revoke camera consent
    Revoke,

    /// Show current status and cumulative statistics
    Status,

    /// Display privacy declaration
    Privacy,

    /// List the emotion vocabulary
    Labels,

    /// Merge exported session reports
    Export {
        /// Output directory for the merged file
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export format (json or jsonl)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Show configuration
    Config,

    /// Serve the HTTP interface (requires the server feature)
    #[cfg(feature = "server")]
    Serve {
        /// Port to bind on 127.0.0.1
        #[arg(long, default_value = "8765")]
        port: u16,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { input, feedback } => {
            cmd_start(input, feedback);
        }
        Commands::Consent => {
            cmd_set_consent(true);
        }
        Commands::Revoke => {
            cmd_set_consent(false);
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Privacy => {
            cmd_privacy();
        }
        Commands::Labels => {
            cmd_labels();
        }
        Commands::Export { output, format } => {
            cmd_export(output, &format);
        }
        Commands::Config => {
            cmd_config();
        }
        #[cfg(feature = "server")]
        Commands::Serve { port } => {
            cmd_serve(port);
        }
    }
}

fn cmd_start(input: Option<PathBuf>, feedback: Option<String>) {
    println!("Stress Sense Agent v{VERSION}");
    println!();

    let config = Config::load().unwrap_or_default();
    if !config.consent_granted {
        eprintln!("Error: camera consent has not been granted.");
        eprintln!();
        eprintln!("Review what is kept with 'stress-sense privacy', then run");
        eprintln!("'stress-sense consent' to allow monitoring.");
        std::process::exit(1);
    }

    // Validate feedback up front so a typo doesn't surface after a long session.
    let feedback_labels = match feedback.as_deref().map(EmotionLabel::parse_list) {
        Some(Ok(labels)) if labels.is_empty() => {
            eprintln!("Error: --feedback needs at least one emotion");
            std::process::exit(1);
        }
        Some(Ok(labels)) => Some(labels),
        Some(Err(e)) => {
            eprintln!("Error: {e}");
            eprintln!("Valid emotions: {}", label_list());
            std::process::exit(1);
        }
        None => None,
    };

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let collector_config = CollectorConfig::default();
    let mut collector = match &input {
        Some(path) => match Collector::from_path(collector_config, path) {
            Ok(collector) => collector,
            Err(e) => {
                eprintln!("Error opening {path:?}: {e}");
                std::process::exit(1);
            }
        },
        None => Collector::new(collector_config, std::io::BufReader::new(std::io::stdin())),
    };

    println!("Starting monitoring...");
    println!(
        "  Input: {}",
        input
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdin".to_string())
    );
    println!("  Window horizon: {}s", config.window_horizon.as_secs());
    println!("  Alert threshold: {:.0}%", config.alert_threshold);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let transparency_log = create_shared_log_with_persistence(config.transparency_path());
    let mut monitor =
        Monitor::with_transparency(config.monitor_settings(), transparency_log.clone());

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    // A replayed file runs on its own clock: the session opens at the first
    // classified frame and closes at the last one.
    let replay = input.is_some();
    if !replay {
        let outcome = monitor.start();
        println!("Session ID: {}", outcome.session_id());
        println!();
    }
    let mut last_frame_at: Option<DateTime<Utc>> = None;

    if let Err(e) = collector.start() {
        eprintln!("Error starting collector: {e}");
        std::process::exit(1);
    }

    // Main frame loop
    let receiver = collector.receiver().clone();
    let mut skipped_in_row = 0u32;

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                if let (true, FrameEvent::Frame { timestamp, .. }) = (replay, &event) {
                    if monitor.state() == RecorderState::Idle {
                        let outcome = monitor.start_at(*timestamp);
                        println!("Session ID: {}", outcome.session_id());
                        println!();
                    }
                    last_frame_at = last_frame_at.max(Some(*timestamp));
                }
                match monitor.process_frame(event) {
                    FrameOutcome::Recorded(update) => {
                        skipped_in_row = 0;
                        println!(
                            "[{}] {} | Stress: {:.2}% | window: {} samples{}",
                            update.timestamp.format("%H:%M:%S"),
                            update.dominant.as_str().to_uppercase(),
                            update.stress,
                            update.window.len(),
                            if update.alert {
                                format!(" | {CALM_DOWN_MESSAGE}")
                            } else {
                                String::new()
                            }
                        );
                    }
                    FrameOutcome::Skipped(SkipReason::FrameUnavailable) => {
                        skipped_in_row += 1;
                        if skipped_in_row == 1 {
                            println!("[{}] No face detected", Utc::now().format("%H:%M:%S"));
                        }
                    }
                    FrameOutcome::Skipped(SkipReason::NoActiveSession) => {}
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                // Input exhausted.
                break;
            }
        }
    }

    println!();
    println!("Stopping monitoring...");
    collector.stop();

    let stopped = match last_frame_at {
        Some(at) if replay => monitor.stop_at(at),
        _ if monitor.state() == RecorderState::Idle => {
            // Empty replay: record an empty session rather than nothing.
            monitor.start();
            monitor.stop()
        }
        _ => monitor.stop(),
    };
    let summary = match stopped {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error stopping session: {e}");
            std::process::exit(1);
        }
    };
    println!();
    println!("{summary}");

    if let Some(labels) = feedback_labels {
        match monitor.submit_feedback(summary.session_id, labels) {
            Ok(feedback) => {
                let names: Vec<&str> = feedback.labels.iter().map(|l| l.as_str()).collect();
                println!();
                println!("Feedback recorded: {}", names.join(", "));
            }
            Err(e) => eprintln!("Feedback rejected: {e}"),
        }
    }

    if let Err(e) = transparency_log.save() {
        eprintln!("Warning: Could not save transparency log: {e}");
    }

    if let Some(report) = monitor.last_report() {
        export_report(&config.export_path, &report);
    }

    println!();
    println!("{}", transparency_log.summary());
}

fn export_report(export_dir: &Path, report: &SessionReport) {
    let export_path = export_dir.join(format!(
        "session_{}_{}.json",
        report.started_at.format("%Y%m%d_%H%M%S"),
        report.session_id
    ));

    if let Err(e) = std::fs::create_dir_all(export_dir) {
        eprintln!("Error creating export directory {export_dir:?}: {e}");
        return;
    }

    match serde_json::to_string_pretty(report) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&export_path, json) {
                eprintln!("Error writing session report: {e}");
            } else {
                println!("Exported session report to {export_path:?}");
            }
        }
        Err(e) => {
            eprintln!("Error serializing session report: {e}");
        }
    }
}

fn cmd_set_consent(granted: bool) {
    let mut config = Config::load().unwrap_or_default();
    config.consent_granted = granted;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    if granted {
        println!("Camera consent granted. Use 'stress-sense revoke' to withdraw it.");
    } else {
        println!("Camera consent revoked. Monitoring will not start.");
    }
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Stress Sense Agent Status");
    println!("=========================");
    println!();

    println!(
        "Camera Consent: {}",
        if config.consent_granted {
            "Granted ✓"
        } else {
            "Not Granted ✗"
        }
    );
    println!();

    println!("Configuration:");
    println!("  Window horizon: {}s", config.window_horizon.as_secs());
    println!("  Alert threshold: {:.0}%", config.alert_threshold);
    println!("  Export path: {:?}", config.export_path);
    println!();

    // Load and show transparency stats if available
    let stats_path = config.transparency_path();
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                for (key, title) in [
                    ("frames_processed", "Frames analysed"),
                    ("frames_skipped", "Frames skipped"),
                    ("alerts_raised", "Stress alerts"),
                    ("sessions_completed", "Sessions completed"),
                    ("feedback_submitted", "Feedback submitted"),
                ] {
                    if let Some(value) = stats.get(key) {
                        println!("  {title}: {value}");
                    }
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_labels() {
    println!("Emotion vocabulary (tie-break priority order):");
    for (i, label) in EmotionLabel::ALL.iter().enumerate() {
        println!("  {}. {label}", i + 1);
    }
}

fn label_list() -> String {
    EmotionLabel::ALL
        .iter()
        .map(|l| l.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn cmd_export(output: Option<PathBuf>, format: &str) {
    let config = Config::load().unwrap_or_default();
    let source_dir = config.export_path.clone();
    let export_dir = output.unwrap_or_else(|| source_dir.clone());

    // Find all session files
    let session_files: Vec<PathBuf> = std::fs::read_dir(&source_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.extension().map(|e| e == "json").unwrap_or(false)
                        && p.file_name()
                            .and_then(|n| n.to_str())
                            .map(|n| n.starts_with("session_"))
                            .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default();

    if session_files.is_empty() {
        println!("No session reports found in {source_dir:?}");
        println!("Run 'stress-sense start' to record a session.");
        return;
    }

    println!(
        "Found {} session report(s) in {:?}",
        session_files.len(),
        source_dir
    );

    let mut reports: Vec<SessionReport> = Vec::new();
    for file in &session_files {
        match std::fs::read_to_string(file)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_json::from_str::<SessionReport>(&content).map_err(|e| e.to_string())
            }) {
            Ok(report) => reports.push(report),
            Err(e) => tracing::warn!("skipping {}: {e}", file.display()),
        }
    }
    reports.sort_by_key(|r| r.started_at);

    println!("Total sessions: {}", reports.len());

    let output_path = export_dir.join(format!(
        "export_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        if format == "jsonl" { "jsonl" } else { "json" }
    ));

    if let Err(e) = std::fs::create_dir_all(&export_dir) {
        eprintln!("Error creating {export_dir:?}: {e}");
        return;
    }

    let result = if format == "jsonl" {
        // JSON Lines format
        let lines: Vec<String> = reports
            .iter()
            .filter_map(|r| serde_json::to_string(r).ok())
            .collect();
        std::fs::write(&output_path, lines.join("\n"))
    } else {
        // Pretty JSON format
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => std::fs::write(&output_path, json),
            Err(e) => {
                eprintln!("Error serializing: {e}");
                return;
            }
        }
    };

    match result {
        Ok(_) => println!("Exported to {output_path:?}"),
        Err(e) => eprintln!("Error writing export: {e}"),
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

#[cfg(feature = "server")]
fn cmd_serve(port: u16) {
    use stress_sense_agent::server::{run, ServerConfig};

    let config = Config::load().unwrap_or_default();
    if !config.consent_granted {
        eprintln!("Error: camera consent has not been granted. Run 'stress-sense consent' first.");
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            std::process::exit(1);
        }
    };

    let server_config = ServerConfig::new(port, config.monitor_settings())
        .with_transparency_path(config.transparency_path());

    let result: anyhow::Result<()> = runtime.block_on(async {
        let (addr, shutdown_tx) = run(server_config).await?;
        println!("Listening on http://{addr}");
        println!("Press Ctrl+C to stop");
        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(());
        Ok(())
    });

    if let Err(e) = result {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
