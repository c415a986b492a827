use anyhow::{Context, Result};
use clap::Parser;
use loqa_capture::config::AudioSourceKind;
use loqa_capture::nats::{run_audio_intake, run_telemetry};
use loqa_capture::{
    create_router, AmplitudeThreshold, AppState, AudioFile, Config, DetectorLoader,
    EnergyDetectorLoader, FileSource, NatsClient, NatsTranscriber, NatsUnderstander,
    RecordingSession, SessionController, UtteranceArchive,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Frame size used when replaying a WAV file
const FILE_FRAME_MS: u64 = 20;

#[derive(Debug, Parser)]
#[command(name = "loqa-capture", version, about = "Voice-activity-gated capture service")]
struct Args {
    /// Config file path (without extension)
    #[arg(long, default_value = "config/loqa-capture")]
    config: String,

    /// Replay this WAV file instead of subscribing to NATS audio
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Loop the WAV file
    #[arg(long = "loop", requires = "wav")]
    looped: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut cfg = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    if let Some(path) = args.wav {
        cfg.audio.source = AudioSourceKind::Wav;
        cfg.audio.wav_path = Some(path);
        cfg.audio.wav_loop |= args.looped;
    }
    cfg.validate()?;

    info!("Loqa Capture v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!(
        "Intake: {:?} at {}Hz, {}ms windows",
        cfg.audio.source, cfg.audio.sample_rate, cfg.vad.window_ms
    );

    // Session
    let loader = EnergyDetectorLoader {
        midpoint_db: cfg.vad.energy_midpoint_db,
    };
    let classifier = loader.load_detector()?;
    let threshold = AmplitudeThreshold::new(cfg.session.amplitude_threshold)?;
    let session = Arc::new(RecordingSession::new(
        cfg.to_session_config(),
        classifier,
        threshold,
    )?);

    // NATS
    let nats = Arc::new(
        NatsClient::connect(
            &cfg.nats.url,
            cfg.nats.subjects.clone(),
            cfg.request_timeout(),
        )
        .await?,
    );

    // Controller
    let (feedback_tx, feedback_rx) = mpsc::channel(64);
    let mut controller = SessionController::new(
        Arc::clone(&session),
        Arc::new(NatsTranscriber::new(Arc::clone(&nats))),
        Arc::new(NatsUnderstander::new(Arc::clone(&nats))),
        cfg.to_controller_config(),
    )
    .with_feedback(feedback_tx);

    if let Some(dir) = &cfg.recordings.dir {
        let archive = UtteranceArchive::new(dir)?;
        let (archive_tx, archive_rx) = mpsc::channel(8);
        controller = controller.with_archive(archive_tx);
        tokio::spawn(async move {
            if let Err(e) = archive.run(archive_rx).await {
                error!("Archive task failed: {:#}", e);
            }
        });
    }

    tokio::spawn(run_telemetry(
        Arc::clone(&nats),
        session.subscribe(),
        feedback_rx,
    ));

    // Intake
    let _file_source = match cfg.audio.source {
        AudioSourceKind::Nats => {
            let subscriber = nats.subscribe_audio().await?;
            let intake_session = Arc::clone(&session);
            let pcm = cfg.audio.pcm;
            tokio::spawn(async move {
                if let Err(e) = run_audio_intake(subscriber, intake_session, pcm).await {
                    error!("Audio intake failed: {:#}", e);
                }
            });
            None
        }
        AudioSourceKind::Wav => {
            let path = cfg
                .audio
                .wav_path
                .clone()
                .context("audio.wav_path is required for WAV intake")?;
            let file = AudioFile::open(&path)?;
            if file.sample_rate != cfg.audio.sample_rate || file.channels != cfg.audio.channels {
                anyhow::bail!(
                    "{} is {}Hz/{}ch but intake expects {}Hz/{}ch",
                    path.display(),
                    file.sample_rate,
                    file.channels,
                    cfg.audio.sample_rate,
                    cfg.audio.channels
                );
            }

            let intake_session = Arc::clone(&session);
            Some(FileSource::spawn(
                file,
                FILE_FRAME_MS,
                cfg.audio.wav_loop,
                move |frame| {
                    if let Err(e) = intake_session.push_frame(&frame) {
                        error!("Session rejected file frame: {}", e);
                    }
                },
            ))
        }
    };

    // HTTP
    let state = AppState::new(Arc::new(controller)).with_nats(Arc::clone(&nats));
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP API listening on {}", addr);
    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}
