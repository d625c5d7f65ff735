//! Replays a recorded pose trace through a counting session.
//!
//! Usage: rep-replay --joint elbow --side right trace.jsonl
//!
//! Each line of the trace is one frame, either
//! `{"timestamp_ms": 33, "landmarks": [{"x": .., "y": .., "confidence": ..}, ...]}`
//! (`"landmarks": null` when the model found nobody) or
//! `{"timestamp_ms": 33, "angle": 97.5}` for precomputed angles.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::{Deserialize, Deserializer};

use rep_engine::{PoseKeypoint, RepSession, SessionConfig, SessionSummary, Side, TrackedJoint};

#[derive(Parser, Debug)]
#[command(name = "rep-replay")]
#[command(about = "Count exercise repetitions in a recorded pose trace")]
struct Args {
    /// JSON-lines trace, `-` for stdin
    #[arg(default_value = "-")]
    trace: String,

    /// Session config (JSON); flags below override it
    #[arg(short, long)]
    config: Option<String>,

    /// Joint to track: elbow, shoulder, knee or hip
    #[arg(short, long)]
    joint: Option<TrackedJoint>,

    /// Body side to track: left or right
    #[arg(short, long)]
    side: Option<Side>,

    /// Read the other side when the tracked side is occluded
    #[arg(long)]
    fallback: bool,

    /// Print a JSON report for every frame
    #[arg(long)]
    emit_frames: bool,
}

#[derive(Deserialize, Debug)]
struct FrameRecord {
    #[serde(default)]
    timestamp_ms: Option<u64>,
    #[serde(default)]
    landmarks: Option<Vec<PoseKeypoint>>,
    /// Outer `Some` when the key is present, even if its value is null
    #[serde(default, deserialize_with = "present")]
    angle: Option<Option<f64>>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(Some)
}

fn load_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path))?;
            SessionConfig::from_json(&json).with_context(|| format!("bad config {}", path))?
        }
        None => SessionConfig::default(),
    };

    if let Some(joint) = args.joint {
        config.pose.joint = joint;
    }
    if let Some(side) = args.side {
        config.pose.side = side;
    }
    if args.fallback {
        config.pose.fallback_to_other_side = true;
    }
    Ok(config)
}

fn open_trace(path: &str) -> Result<Box<dyn BufRead>> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("failed to open trace {}", path))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Feed every frame of `trace` to `session`, writing a JSON report per
/// frame to `frames` when given.
///
/// Rejected frames are counted by the session and do not stop the replay;
/// malformed JSON does.
fn replay(
    trace: impl BufRead,
    session: &mut RepSession,
    mut frames: Option<&mut dyn Write>,
) -> Result<SessionSummary> {
    for (line_no, line) in trace.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: FrameRecord = serde_json::from_str(&line)
            .with_context(|| format!("malformed frame on line {}", line_no + 1))?;

        let processed = match record.angle {
            Some(angle) => session.process_angle(angle, record.timestamp_ms),
            None => session.process_landmarks(record.landmarks.as_deref(), record.timestamp_ms),
        };

        // Err is already logged and counted as rejected by the session
        if let (Ok(report), Some(out)) = (processed, frames.as_deref_mut()) {
            writeln!(out, "{}", serde_json::to_string(&report)?)?;
        }
    }
    Ok(session.summary())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(
        "tracking {} {} (fallback: {})",
        config.pose.side, config.pose.joint, config.pose.fallback_to_other_side
    );

    let mut session = RepSession::new(config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let frames: Option<&mut dyn Write> = if args.emit_frames {
        Some(&mut out as &mut dyn Write)
    } else {
        None
    };
    let summary = replay(open_trace(&args.trace)?, &mut session, frames)?;
    info!(
        "{} reps over {} frames ({} detected)",
        summary.reps, summary.frames, summary.detected_frames
    );
    writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
    Ok(())
}
