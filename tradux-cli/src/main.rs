//! Tradux terminal front end.
//!
//! Wires the stub collaborators into `TraduxEngine`, prints translation
//! pairs as they arrive and tears the pipeline down on Ctrl-C. Real model
//! backends plug in by implementing the `tradux_core::engines` traits and
//! swapping them into the `EngineSet` below.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tradux_core::audio::device::{list_input_devices, list_output_devices};
use tradux_core::engines::stub::{StubSynthesizer, StubTranscriber, StubTranslator};
use tradux_core::engines::{EngineSet, SynthesizerHandle, TranscriberHandle, TranslatorHandle};
use tradux_core::{PipelineConfig, TraduxEngine};

/// Live spoken translation from the microphone
#[derive(Parser, Debug)]
#[command(name = "tradux", version, about = "Live spoken translation from the microphone")]
struct Cli {
    /// Source language code (e.g. en, de, ja)
    #[arg(long, short = 's', value_name = "LANG", default_value = "en")]
    source: String,

    /// Target language code
    #[arg(long, short = 't', value_name = "LANG", default_value = "fr")]
    target: String,

    /// Peak amplitude below which a frame counts as silence
    #[arg(long, value_name = "LEVEL", default_value_t = 0.01)]
    silence_threshold: f32,

    /// Audio input device name (default: system default input)
    #[arg(long, value_name = "DEVICE")]
    input_device: Option<String>,

    /// Audio output device name (default: system default output)
    #[arg(long, value_name = "DEVICE")]
    output_device: Option<String>,

    /// List audio devices and exit
    #[arg(long)]
    list_devices: bool,

    /// On exit, write the last seconds of captured audio to this WAV file
    #[arg(long, value_name = "PATH")]
    dump_audio: Option<PathBuf>,
}

fn print_devices() {
    println!("Input devices:");
    for device in list_input_devices() {
        let marker = if device.is_default { " (default)" } else { "" };
        println!("  {}{}", device.name, marker);
    }
    println!("Output devices:");
    for device in list_output_devices() {
        let marker = if device.is_default { " (default)" } else { "" };
        println!("  {}{}", device.name, marker);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        print_devices();
        return Ok(());
    }

    let config = PipelineConfig {
        source_language: cli.source.clone(),
        target_language: cli.target.clone(),
        silence_threshold: cli.silence_threshold,
        preferred_input_device: cli.input_device.clone(),
        preferred_output_device: cli.output_device.clone(),
        ..PipelineConfig::default()
    };

    let engines = EngineSet::new(
        TranscriberHandle::new(StubTranscriber::new()),
        TranslatorHandle::new(StubTranslator),
        SynthesizerHandle::new(StubSynthesizer::new()),
    );

    let engine = TraduxEngine::new(config, engines);
    let mut display_rx = engine.subscribe_display();
    let mut status_rx = engine.subscribe_status();

    engine.start()?;
    info!(
        source = %cli.source,
        target = %cli.target,
        "listening — press Ctrl-C to stop"
    );

    // Terminal presentation sink: print when the shown pair changes.
    let display_task = tokio::spawn(async move {
        let mut shown: Option<(String, String)> = None;
        loop {
            match display_rx.recv().await {
                Ok(update) => {
                    let (Some(original), Some(translated)) =
                        (update.original, update.translated)
                    else {
                        continue;
                    };
                    let pair = (original, translated);
                    if shown.as_ref() != Some(&pair) {
                        println!("» {}", pair.0);
                        println!("  → {}   [{}]", pair.1, update.status_line);
                        shown = Some(pair);
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Surface status details (warm-up failures, device trouble) as warnings.
    let status_task = tokio::spawn(async move {
        loop {
            match status_rx.recv().await {
                Ok(event) => {
                    if let Some(detail) = event.detail {
                        warn!(status = ?event.status, "{detail}");
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    engine.stop()?;

    if let Some(path) = &cli.dump_audio {
        match engine.write_recent_audio_wav(path) {
            Ok(()) => info!(path = %path.display(), "diagnostic audio written"),
            Err(e) => warn!("failed to write diagnostic audio: {e}"),
        }
    }

    // Workers observe the flag within one queue-timeout interval.
    tokio::time::sleep(Duration::from_millis(300)).await;
    display_task.abort();
    status_task.abort();

    let snap = engine.diagnostics_snapshot();
    info!(
        frames_in = snap.frames_in,
        frames_forwarded = snap.frames_forwarded,
        dispatch_cycles = snap.dispatch_cycles,
        translations = snap.translations,
        synthesis_requests = snap.synthesis_requests,
        "session diagnostics"
    );

    Ok(())
}
