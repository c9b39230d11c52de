mod cli;

use anyhow::Result;
use clap::ValueEnum;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tracing::{error, info, warn};

use ffremux::config::Config;
use ffremux::engine::{
    CodecFamily, CommandPlan, ContainerOption, EncodeMode, EncodeOptions, EncodePreset,
    EncoderCapabilities, EngineEvent, PriorityClass, ProcessController, VideoEncoderOption,
    best_hardware_encoder, build_encode, build_extract_audio, build_remux, resolve_duration,
    resolve_engine, resolve_probe_tool,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse();

    let config = Config::load().unwrap_or_else(|err| {
        warn!("could not load config, using defaults: {err:#}");
        Config::default()
    });

    if let Err(err) = run(args, config) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(args: cli::Cli, config: Config) -> Result<()> {
    let cli_ffmpeg = args.ffmpeg.clone();
    let cli_priority = args.priority;
    let candidate = args.ffmpeg.clone().or(config.engine.ffmpeg_path.clone());
    let priority = args.priority.unwrap_or(config.defaults.priority);

    let engine = resolve_engine(candidate.as_deref());

    match args.command {
        cli::Commands::Config {
            container,
            preset,
            encoder,
            show,
        } => {
            let mut config = config;
            if !show {
                if let Some(path) = cli_ffmpeg {
                    config.engine.ffmpeg_path = Some(path);
                }
                if let Some(value) = cli_priority {
                    config.defaults.priority = value;
                }
                if let Some(value) = container {
                    config.defaults.container = value.extension().to_string();
                }
                if let Some(value) = preset {
                    config.defaults.preset = value.as_str().to_string();
                }
                if let Some(value) = encoder {
                    config.defaults.encoder = value.as_str().to_string();
                }
                config.save()?;
                println!("Saved {}", Config::config_path()?.display());
            }

            match &config.engine.ffmpeg_path {
                Some(path) => println!("ffmpeg:    {}", path.display()),
                None => println!("ffmpeg:    unset"),
            }
            println!("priority:  {}", config.defaults.priority.as_str());
            println!("container: {}", config.defaults.container_option().extension());
            println!("preset:    {}", config.defaults.preset_option().as_str());
            println!("encoder:   {}", config.defaults.encoder_option().as_str());
            Ok(())
        }

        cli::Commands::Check => {
            match &engine {
                Some(path) => {
                    println!("ffmpeg:  {}", path.display());
                    match resolve_probe_tool(path) {
                        Some(probe) => println!("ffprobe: {}", probe.display()),
                        None => println!("ffprobe: not found"),
                    }
                }
                None => println!("ffmpeg:  not found"),
            }
            Ok(())
        }

        cli::Commands::Encoders => {
            let engine = require_engine(engine)?;
            let mut caps = EncoderCapabilities::new();
            caps.ensure_probed(&engine);

            for enc in caps.encoders() {
                println!("{enc}");
            }
            match best_hardware_encoder(CodecFamily::H264, &caps) {
                Some(enc) => println!("best h264 hardware encoder: {enc}"),
                None => println!("best h264 hardware encoder: none"),
            }
            match best_hardware_encoder(CodecFamily::Hevc, &caps) {
                Some(enc) => println!("best hevc hardware encoder: {enc}"),
                None => println!("best hevc hardware encoder: none"),
            }
            Ok(())
        }

        cli::Commands::Duration { file } => {
            let engine = require_engine(engine)?;
            let seconds = resolve_duration(&engine, &file);
            if seconds > 0.0 {
                println!("{seconds}");
                Ok(())
            } else {
                anyhow::bail!("could not determine duration of {}", file.display())
            }
        }

        cli::Commands::Extract {
            input,
            codec,
            dry_run,
        } => {
            let engine = require_engine(engine)?;
            let plan = build_extract_audio(&input, &codec);
            execute(&engine, plan, &input, priority, dry_run)
        }

        cli::Commands::Remux {
            video,
            audio,
            container,
            dry_run,
        } => {
            let engine = require_engine(engine)?;
            let container = container.unwrap_or(config.defaults.container_option());
            let plan = build_remux(&video, &audio, container);
            execute(&engine, plan, &video, priority, dry_run)
        }

        cli::Commands::Youtube {
            video,
            audio,
            encoder,
            container,
            dry_run,
        } => run_encode(
            EncodeMode::YouTubeOptimize,
            engine,
            &config,
            video,
            audio,
            encoder,
            None,
            container,
            priority,
            dry_run,
        ),

        cli::Commands::Yify {
            video,
            audio,
            encoder,
            container,
            dry_run,
        } => run_encode(
            EncodeMode::YifyReencode,
            engine,
            &config,
            video,
            audio,
            encoder,
            None,
            container,
            priority,
            dry_run,
        ),

        cli::Commands::Encode {
            video,
            audio,
            encoder,
            preset,
            container,
            dry_run,
        } => run_encode(
            EncodeMode::CustomEncode,
            engine,
            &config,
            video,
            audio,
            encoder,
            preset,
            container,
            priority,
            dry_run,
        ),
    }
}

fn require_engine(engine: Option<PathBuf>) -> Result<PathBuf> {
    engine.ok_or_else(|| {
        anyhow::anyhow!("ffmpeg not found; pass --ffmpeg or place it next to the application")
    })
}

#[allow(clippy::too_many_arguments)]
fn run_encode(
    mode: EncodeMode,
    engine: Option<PathBuf>,
    config: &Config,
    video: PathBuf,
    audio: Option<PathBuf>,
    encoder: Option<VideoEncoderOption>,
    preset: Option<EncodePreset>,
    container: Option<ContainerOption>,
    priority: PriorityClass,
    dry_run: bool,
) -> Result<()> {
    let engine = require_engine(engine)?;

    let mut caps = EncoderCapabilities::new();
    caps.ensure_probed(&engine);

    let opts = EncodeOptions {
        encoder: encoder.unwrap_or(config.defaults.encoder_option()),
        preset: preset.unwrap_or(config.defaults.preset_option()),
        container: container.unwrap_or(config.defaults.container_option()),
    };

    let plan = build_encode(mode, &video, audio.as_deref(), opts, &caps);
    execute(&engine, plan, &video, priority, dry_run)
}

/// Resolve duration, spawn the engine, and drain events until completion.
fn execute(
    engine: &Path,
    plan: CommandPlan,
    primary_input: &Path,
    priority: PriorityClass,
    dry_run: bool,
) -> Result<()> {
    if dry_run {
        println!("{} {}", engine.display(), plan.display_args());
        return Ok(());
    }

    let total_duration = resolve_duration(engine, primary_input);
    if total_duration <= 0.0 {
        // Unknown duration would make the percent math divide by zero.
        anyhow::bail!(
            "could not determine duration of {}; aborting",
            primary_input.display()
        );
    }

    info!(
        duration_s = total_duration,
        output = %plan.output_path.display(),
        "starting engine"
    );

    let (tx, rx) = mpsc::channel();
    let mut controller = ProcessController::new(tx);
    controller.start(
        engine,
        &plan.args,
        total_duration,
        priority,
        Some(plan.output_path),
    );

    if !controller.is_running() {
        anyhow::bail!("engine process failed to start");
    }

    // Interactive session controls arrive as lines on stdin.
    let (ctl_tx, ctl_rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines().map_while(Result::ok) {
            if ctl_tx.send(line).is_err() {
                break;
            }
        }
    });
    info!("session controls: pause, resume, stop, priority <class>");

    let mut stderr = std::io::stderr();
    'session: loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(EngineEvent::Progress(sample)) => {
                let eta = sample.eta.as_deref().unwrap_or("--:--:--");
                print!("\rProgress: {:.1}% | ETA {eta}", sample.percent);
                std::io::stdout().flush().ok();
            }
            Ok(EngineEvent::Log(line)) => {
                let _ = writeln!(stderr, "{line}");
            }
            Ok(EngineEvent::RunningChanged(_)) => {}
            Ok(EngineEvent::Completed { output_path }) => {
                println!();
                match output_path {
                    Some(path) => println!("Done: {}", path.display()),
                    None => println!("Done."),
                }
                break 'session;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break 'session,
        }

        while let Ok(line) = ctl_rx.try_recv() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_control(&line) {
                Some(Control::Pause) => controller.pause(),
                Some(Control::Resume) => controller.resume(),
                Some(Control::Stop) => controller.stop(),
                Some(Control::Priority(class)) => controller.update_priority(class),
                None => {
                    let _ = writeln!(stderr, "commands: pause, resume, stop, priority <class>");
                }
            }
        }
    }

    Ok(())
}

/// A control command typed into a running session.
#[derive(Debug, PartialEq, Eq)]
enum Control {
    Pause,
    Resume,
    Stop,
    Priority(PriorityClass),
}

fn parse_control(line: &str) -> Option<Control> {
    let mut parts = line.split_whitespace();
    match (parts.next()?, parts.next()) {
        ("pause", None) => Some(Control::Pause),
        ("resume", None) => Some(Control::Resume),
        ("stop", None) => Some(Control::Stop),
        ("priority", Some(value)) => PriorityClass::from_str(value, true)
            .ok()
            .map(Control::Priority),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_lines_parse() {
        assert_eq!(parse_control("pause"), Some(Control::Pause));
        assert_eq!(parse_control("  resume "), Some(Control::Resume));
        assert_eq!(parse_control("stop"), Some(Control::Stop));
        assert_eq!(
            parse_control("priority below-normal"),
            Some(Control::Priority(PriorityClass::BelowNormal))
        );
        assert_eq!(
            parse_control("priority HIGH"),
            Some(Control::Priority(PriorityClass::High))
        );
    }

    #[test]
    fn malformed_control_lines_are_rejected() {
        assert_eq!(parse_control("priority"), None);
        assert_eq!(parse_control("priority bogus"), None);
        assert_eq!(parse_control("pause now"), None);
        assert_eq!(parse_control("abort"), None);
    }
}
