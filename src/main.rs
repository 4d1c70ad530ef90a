use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use etude::ingest::{ingest_dir, SongMetadata};
use etude::session::{ConsoleConnector, ConsoleHooks, SilentHooks, TeachingHooks};
use etude::{EtudeConfig, PlaybackMode, Session, SessionState, SongEntry};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest(args) => execute_ingest(args),
        Commands::Batch(args) => execute_batch(args),
        Commands::Play(args) => execute_play(args),
    }
}

#[derive(Parser)]
#[command(author, version, about = "Turn parsed MIDI performances into lessons and play them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble one parsed performance into a song.
    Ingest(IngestArgs),
    /// Assemble every performance in a directory.
    Batch(BatchArgs),
    /// Play a song to the console with teaching hooks.
    Play(PlayArgs),
}

#[derive(Args)]
struct IngestArgs {
    /// Parsed performance (JSON).
    midi: PathBuf,
    /// Song metadata (YAML).
    #[arg(long)]
    meta: Option<PathBuf>,
    /// Configuration file (YAML).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where to write the song; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct BatchArgs {
    /// Directory of parsed performances, each with an optional `<name>.yaml`.
    dir: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory for the songs; a summary only when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct PlayArgs {
    /// Song produced by `ingest` (JSON).
    song: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the configured playback mode.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    /// Overrides the configured tempo scale (0.5 = half speed).
    #[arg(long)]
    tempo_scale: Option<f64>,
    /// Play without teaching output.
    #[arg(long)]
    silent: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Continuous,
    MeasureByMeasure,
}

impl From<ModeArg> for PlaybackMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Continuous => PlaybackMode::Continuous,
            ModeArg::MeasureByMeasure => PlaybackMode::MeasureByMeasure,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EtudeConfig> {
    match path {
        Some(path) => EtudeConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EtudeConfig::default()),
    }
}

fn write_or_print(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn execute_ingest(args: IngestArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let midi_json = fs::read_to_string(&args.midi)
        .with_context(|| format!("failed to read {}", args.midi.display()))?;
    let metadata = match &args.meta {
        Some(path) => SongMetadata::load(path)
            .with_context(|| format!("failed to load metadata {}", path.display()))?,
        None => SongMetadata::default(),
    };

    let midi = etude::ParsedMidi::from_json(&midi_json)
        .with_context(|| format!("{} is not a parsed performance", args.midi.display()))?;
    let song = etude::assemble(&midi, &metadata, &config.ingest)
        .with_context(|| format!("failed to ingest {}", args.midi.display()))?;

    write_or_print(args.output.as_deref(), &song.to_json_pretty()?)
}

fn execute_batch(args: BatchArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let report = ingest_dir(&args.dir, &config.ingest)
        .with_context(|| format!("failed to read {}", args.dir.display()))?;

    if let Some(out_dir) = &args.output {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
        for song in &report.songs {
            let path = out_dir.join(format!("{}.json", song.id));
            write_or_print(Some(&path), &song.to_json_pretty()?)?;
        }
    }

    for song in &report.songs {
        eprintln!("ok    {} ({} bars)", song.id, song.total_measures);
    }
    for (name, error) in &report.failures {
        eprintln!("FAIL  {}: {}", name, error);
    }
    if report.songs.is_empty() && !report.failures.is_empty() {
        bail!("no song in {} could be ingested", args.dir.display());
    }
    Ok(())
}

fn execute_play(args: PlayArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let mut options = config.playback;
    if let Some(mode) = args.mode {
        options.mode = mode.into();
    }
    if let Some(scale) = args.tempo_scale {
        options.tempo_scale = scale;
    }

    let json = fs::read_to_string(&args.song)
        .with_context(|| format!("failed to read {}", args.song.display()))?;
    let song = SongEntry::from_json(&json)
        .with_context(|| format!("{} is not a song", args.song.display()))?;

    if args.silent {
        play(&song, SilentHooks, options)
    } else {
        play(&song, ConsoleHooks, options)
    }
}

fn play<H: TeachingHooks>(
    song: &SongEntry,
    hooks: H,
    options: etude::PlaybackOptions,
) -> Result<()> {
    let mut session = Session::new(song, ConsoleConnector::new(), hooks).with_options(options)?;
    session.connect()?;

    let stdin = std::io::stdin();
    loop {
        let state = async_std::task::block_on(session.play())?;
        match state {
            SessionState::Paused if session.mode() == PlaybackMode::MeasureByMeasure => {
                eprint!(
                    "Bar {} of {} done. Enter for the next bar, c to play on, q to quit: ",
                    session.measures_played(),
                    session.song().total_measures
                );
                let mut line = String::new();
                stdin.read_line(&mut line)?;
                match line.trim().to_ascii_lowercase().as_str() {
                    "q" => {
                        session.stop();
                        break;
                    }
                    "c" => session.set_mode(PlaybackMode::Continuous),
                    _ => {}
                }
            }
            SessionState::Paused => continue,
            _ => break,
        }
    }
    Ok(())
}
