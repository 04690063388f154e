use std::env;
#[cfg(feature = "export")]
use std::fs::File;
#[cfg(feature = "export")]
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chiptrack::backend::{create_backend, ChipBackend, BACKEND_NAMES};
use chiptrack::config::EngineConfig;
#[cfg(feature = "export")]
use chiptrack::export::{render_song_to_wav, write_trace_csv};

const USAGE: &str = "Usage:
  chiptrack render <backend> <song> <out.wav> [--config cfg.json]
  chiptrack info <backend> <song> [--config cfg.json]
  chiptrack new <backend> <out> [--config cfg.json]
  chiptrack trace <backend> <song> <ticks> <out.csv> [--config cfg.json]

Backends:
  lft (simple)  p1xl (multitable)  bv (register)

Flags:
  --config <file>   Engine configuration as JSON
  -h, --help        Show this help

Set RUST_LOG=debug for engine diagnostics.
";

struct Args {
    command: String,
    positional: Vec<String>,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Option<Args>> {
    let mut positional = Vec::new();
    let mut config = None;
    let mut show_help = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => show_help = true,
            "--config" => match args.next() {
                Some(value) => config = Some(PathBuf::from(value)),
                None => bail!("--config requires a file argument"),
            },
            _ if arg.starts_with("--config=") => config = Some(PathBuf::from(&arg[9..])),
            _ if arg.starts_with('-') => bail!("unknown flag: {arg}"),
            _ => positional.push(arg),
        }
    }

    if show_help || positional.is_empty() {
        eprint!("{USAGE}");
        return Ok(None);
    }
    let command = positional.remove(0);
    Ok(Some(Args {
        command,
        positional,
        config,
    }))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config '{}'", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn open_backend(name: &str, config: &EngineConfig) -> Result<Box<dyn ChipBackend>> {
    let mut backend = create_backend(name, config)
        .with_context(|| format!("expected one of {}", BACKEND_NAMES.join(", ")))?;
    backend.init()?;
    Ok(backend)
}

fn open_song(name: &str, song: &str, config: &EngineConfig) -> Result<Box<dyn ChipBackend>> {
    let mut backend = open_backend(name, config)?;
    backend
        .load_song(Path::new(song))
        .with_context(|| format!("failed to load song '{song}'"))?;
    Ok(backend)
}

fn expect_args<'a>(args: &'a Args, count: usize) -> Result<&'a [String]> {
    if args.positional.len() != count {
        eprint!("{USAGE}");
        bail!("'{}' takes {count} arguments", args.command);
    }
    Ok(&args.positional)
}

fn info(backend: &dyn ChipBackend, song: &str) {
    println!("Song:        {song}");
    println!("Backend:     {}", backend.id());
    println!("Channels:    {}", backend.channel_count());
    println!("Song rows:   {}", backend.song_len());
    println!("Patterns:    {}", backend.pattern_count());
    let used = (0..backend.instrument_count())
        .filter(|&i| backend.instrument_len(i as u8) > 1)
        .count();
    println!("Instruments: {} ({used} with more than one row)", backend.instrument_count());
    for entry in backend.metadata() {
        let value = entry.options.get(entry.value).copied().unwrap_or("?");
        println!("{:<12} {value}", format!("{}:", entry.name));
    }
}

#[cfg(feature = "export")]
fn render(backend: &mut dyn ChipBackend, out: &str, config: &EngineConfig) -> Result<()> {
    println!("Rendering to {out}...");
    let summary = render_song_to_wav(backend, out, &config.export)
        .with_context(|| format!("failed to render '{out}'"))?;
    println!("Wrote {} frames ({:.2} seconds)", summary.frames, summary.seconds);
    if summary.truncated {
        println!("Stopped at the {} second limit", config.export.max_seconds);
    }
    Ok(())
}

#[cfg(feature = "export")]
fn trace(backend: &mut dyn ChipBackend, ticks: &str, out: &str) -> Result<()> {
    let ticks: u64 = ticks.parse().with_context(|| format!("invalid tick count '{ticks}'"))?;
    let file = File::create(out).with_context(|| format!("failed to create '{out}'"))?;
    let traced = write_trace_csv(backend, ticks, BufWriter::new(file))?;
    println!("Traced {traced} ticks to {out}");
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;

    match args.command.as_str() {
        "info" => {
            let a = expect_args(&args, 2)?;
            let backend = open_song(&a[0], &a[1], &config)?;
            info(backend.as_ref(), &a[1]);
        }
        "new" => {
            let a = expect_args(&args, 2)?;
            let mut backend = open_backend(&a[0], &config)?;
            backend.new_song()?;
            backend
                .save_song(Path::new(&a[1]))
                .with_context(|| format!("failed to write '{}'", a[1]))?;
            println!("Created empty {} song {}", backend.id(), a[1]);
        }
        #[cfg(feature = "export")]
        "render" => {
            let a = expect_args(&args, 3)?;
            let mut backend = open_song(&a[0], &a[1], &config)?;
            render(backend.as_mut(), &a[2], &config)?;
        }
        #[cfg(feature = "export")]
        "trace" => {
            let a = expect_args(&args, 4)?;
            let mut backend = open_song(&a[0], &a[1], &config)?;
            trace(backend.as_mut(), &a[2], &a[3])?;
        }
        #[cfg(not(feature = "export"))]
        "render" | "trace" => bail!("'{}' requires the \"export\" feature", args.command),
        other => {
            eprint!("{USAGE}");
            bail!("unknown command: {other}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match parse_args()? {
        Some(args) => run(args),
        None => Ok(()),
    }
}
