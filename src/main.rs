use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use sa_audio::archive::{AudioArchive, EntryInfo};
use sa_audio::crypto::XorKey;
use sa_audio::sfx::{SfxArchive, SfxLayout};
use sa_audio::stream::{StreamArchive, StreamOptions};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sa-audio", about = "Inspect, extract and patch San Andreas stream and SFX audio")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypted music stream files (audio/streams/*)
    Stream {
        /// XOR key as 32 hex digits (defaults to the game key)
        #[arg(long, global = true)]
        key: Option<String>,
        #[command(subcommand)]
        command: StreamCommand,
    },
    /// Sound-effect banks under a game root
    Sfx {
        #[command(flatten)]
        layout: LayoutArgs,
        #[command(subcommand)]
        command: SfxCommand,
    },
}

#[derive(Subcommand)]
enum StreamCommand {
    /// List the tracks of a stream file
    List {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Export one track (or all) as .ogg
    Export {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        #[arg(short, long)]
        index: Option<usize>,
    },
    /// Replace a track's payload and rebuild the stream file
    Replace {
        input: PathBuf,
        #[arg(short, long)]
        index: usize,
        /// Replacement .ogg file
        #[arg(short, long)]
        with: PathBuf,
        /// Write the rebuilt stream here instead of over the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decrypt, re-encrypt and write the stream unchanged
    Rebuild {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SfxCommand {
    /// List every sound in every bank
    List {
        root: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Export one sound (or all) as .wav
    Export {
        root: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        #[arg(short, long)]
        index: Option<usize>,
    },
    /// Replace a sound with a mono 16-bit WAV of the same length and patch its package
    Replace {
        root: PathBuf,
        #[arg(short, long)]
        index: usize,
        #[arg(short, long)]
        with: PathBuf,
    },
}

#[derive(Args)]
struct LayoutArgs {
    /// Index directory, relative to the game root
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    /// Package directory, relative to the game root
    #[arg(long, global = true)]
    sfx_dir: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Stream ───────────────────────────────────────────────────────────
        Commands::Stream { key, command } => {
            let opts = StreamOptions {
                key: match key {
                    Some(hex) => XorKey::from_hex(&hex)?,
                    None      => XorKey::default(),
                },
            };
            match command {
                StreamCommand::List { input, json } => {
                    let ar = load_stream(&input, opts)?;
                    print_entries(&ar.entries(), json)?;
                }
                StreamCommand::Export { input, output_dir, index } => {
                    let ar = load_stream(&input, opts)?;
                    export(&ar, &output_dir, index)?;
                }
                StreamCommand::Replace { input, index, with, output } => {
                    let mut ar = load_stream(&input, opts)?;
                    ar.replace(index, std::fs::read(&with)?)?;
                    println!("  replaced {} with {}", ar.track(index)?.name, with.display());
                    rebuild_stream(&mut ar, output)?;
                }
                StreamCommand::Rebuild { input, output } => {
                    let mut ar = load_stream(&input, opts)?;
                    rebuild_stream(&mut ar, output)?;
                }
            }
        }

        // ── Sfx ──────────────────────────────────────────────────────────────
        Commands::Sfx { layout, command } => {
            let layout = layout.into_layout();
            match command {
                SfxCommand::List { root, json } => {
                    let ar = load_sfx(&root, layout)?;
                    print_entries(&ar.entries(), json)?;
                    if !json {
                        for skipped in &ar.report().skipped_banks {
                            eprintln!("  skipped {} @ {}: {}", skipped.package, skipped.bank_offset, skipped.reason);
                        }
                    }
                }
                SfxCommand::Export { root, output_dir, index } => {
                    let ar = load_sfx(&root, layout)?;
                    export(&ar, &output_dir, index)?;
                }
                SfxCommand::Replace { root, index, with } => {
                    let mut ar = load_sfx(&root, layout)?;
                    ar.replace(index, std::fs::read(&with)?)?;
                    println!("  replaced {} with {}", ar.sound(index)?.name, with.display());
                    let pb = progress_bar("patching");
                    ar.rebuild(Some(&mut |done, total| tick(&pb, done, total)))?;
                    pb.finish_and_clear();
                    println!("Patched: {}", ar.sound(index)?.source_file.display());
                }
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn progress_bar(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} {msg:<10} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message);
    pb
}

fn tick(pb: &ProgressBar, done: u64, total: u64) {
    pb.set_length(total);
    pb.set_position(done);
}

fn load_stream(input: &Path, opts: StreamOptions) -> sa_audio::Result<StreamArchive> {
    let pb = progress_bar("loading");
    let ar = StreamArchive::load(input, opts, Some(&mut |done, total| tick(&pb, done, total)));
    pb.finish_and_clear();
    ar
}

fn load_sfx(root: &Path, layout: SfxLayout) -> sa_audio::Result<SfxArchive> {
    let pb = progress_bar("loading");
    let ar = SfxArchive::load(root, layout, Some(&mut |done, total| tick(&pb, done, total)));
    pb.finish_and_clear();
    ar
}

fn rebuild_stream(ar: &mut StreamArchive, output: Option<PathBuf>) -> sa_audio::Result<()> {
    let target = output.unwrap_or_else(|| ar.path().to_owned());
    let pb = progress_bar("rebuilding");
    ar.rebuild_to(&target, Some(&mut |done, total| tick(&pb, done, total)))?;
    pb.finish_and_clear();
    println!("Rebuilt: {}", target.display());
    Ok(())
}

fn export<A: AudioArchive>(ar: &A, output_dir: &Path, index: Option<usize>) -> sa_audio::Result<()> {
    match index {
        Some(i) => {
            let path = ar.export(i, output_dir)?;
            println!("  exported {}", path.display());
        }
        None => {
            let pb = progress_bar("exporting");
            let written = ar.export_all(output_dir, Some(&mut |done, total| tick(&pb, done, total)))?;
            pb.finish_and_clear();
            println!("Exported {} file(s) to {}", written.len(), output_dir.display());
        }
    }
    Ok(())
}

fn print_entries(entries: &[EntryInfo], json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }
    println!("{:>5}  {:<32} {:>10} {:>7} {:>9}", "Idx", "Name", "Size", "Rate", "Seconds");
    for e in entries {
        let rate = e.sample_rate.map(|r| r.to_string()).unwrap_or_else(|| "-".into());
        let secs = e.duration.map(|d| format!("{d:.2}")).unwrap_or_else(|| "-".into());
        let mark = if e.modified { " *" } else { "" };
        println!("{:>5}  {:<32} {:>10} {:>7} {:>9}{}", e.index, e.name, e.size, rate, secs, mark);
    }
    println!("{} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
    Ok(())
}

impl LayoutArgs {
    fn into_layout(self) -> SfxLayout {
        let mut layout = SfxLayout::default();
        if let Some(dir) = self.config_dir {
            layout.config_dir = dir;
        }
        if let Some(dir) = self.sfx_dir {
            layout.sfx_dir = dir;
        }
        layout
    }
}
