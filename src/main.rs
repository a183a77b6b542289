use std::path::PathBuf;
use std::thread;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use epub_narrator::book::extract_book;
use epub_narrator::config::PipelineConfig;
use epub_narrator::pipeline::{progress_channel, CancellationToken, Pipeline};
use epub_narrator::text::{plan_book, TextCleaner};

#[derive(Parser)]
#[command(name = "epub-narrator", version, about = "Convert EPUB books to audiobooks")]
struct Cli {
    /// Path to a JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an EPUB into an audiobook
    Convert {
        /// Input EPUB file
        input: PathBuf,

        /// Output file; defaults to the input name with the container extension
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fallback synthesizer voice
        #[arg(long)]
        voice: Option<String>,

        /// Voice model for the accelerated primary backend
        #[arg(long)]
        model: Option<PathBuf>,

        /// Synthesis worker threads
        #[arg(short, long)]
        workers: Option<usize>,

        /// Output container format (m4b or mp3)
        #[arg(short, long)]
        format: Option<String>,

        /// Use GPU acceleration for the primary backend
        #[arg(long)]
        gpu: bool,

        /// Also write the chapter manifest as JSON next to the output
        #[arg(long)]
        manifest: bool,
    },
    /// Show the chapters and synthesis plan of an EPUB without converting it
    Inspect {
        /// Input EPUB file
        input: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    config.apply_env()?;

    match cli.command {
        Commands::Convert {
            input,
            output,
            voice,
            model,
            workers,
            format,
            gpu,
            manifest,
        } => {
            if let Some(voice) = voice {
                config.voice = voice;
            }
            if let Some(model) = model {
                config.model_path = Some(model.display().to_string());
            }
            if let Some(workers) = workers {
                config.workers = workers;
            }
            if let Some(format) = format {
                config.output_format = format;
            }
            if gpu {
                config.use_gpu = true;
            }
            convert(config, &input, output, manifest)
        }
        Commands::Inspect { input } => inspect(config, &input),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "epub_narrator=info",
        1 => "epub_narrator=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn convert(
    config: PipelineConfig,
    input: &PathBuf,
    output: Option<PathBuf>,
    dump_manifest: bool,
) -> anyhow::Result<()> {
    let cleaner = TextCleaner::new(config.expand_abbreviations, config.remove_urls);
    let book = extract_book(input, &cleaner)
        .with_context(|| format!("failed to read {}", input.display()))?;

    println!(
        "\"{}\" by {} ({} chapters, {} words)",
        book.metadata.title,
        book.metadata.author,
        book.chapters.len(),
        book.total_words()
    );

    let pipeline = Pipeline::new(config)?;
    let output = output.unwrap_or_else(|| {
        let mut path = input.clone();
        path.set_extension(pipeline.config().output_format.clone());
        path
    });

    let (primary, fallback) = pipeline.backends_from_config();
    let (progress_tx, progress_rx) = progress_channel(256);
    let cancel = CancellationToken::new();

    let bar_thread = thread::spawn(move || {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} chunks ({percent}%) {elapsed}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        let mut started = false;
        while let Ok(event) = progress_rx.recv() {
            if !started {
                bar.set_length(event.total as u64);
                bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
                started = true;
            }
            bar.set_position(event.completed as u64);
        }
        bar.finish_and_clear();
    });

    let result = pipeline.convert(
        &book,
        primary,
        fallback,
        Some(progress_tx),
        &cancel,
        &output,
    );
    // sender side is gone once convert returns; the bar thread drains and exits
    let _ = bar_thread.join();

    let report = result?;

    if !report.failures.is_empty() {
        warn!(
            failed = report.failures.len(),
            "some chunks were replaced with silence"
        );
        for failure in &report.failures {
            error!(
                chapter = failure.chapter,
                chunk = failure.seq,
                error = %failure.error,
                "chunk failed"
            );
        }
    }

    match &report.output {
        Some(path) => {
            if dump_manifest {
                let manifest_path = path.with_extension("manifest.json");
                std::fs::write(
                    &manifest_path,
                    serde_json::to_string_pretty(&report.manifest)?,
                )?;
                println!("Wrote {}", manifest_path.display());
            }
            println!(
                "Wrote {} ({}/{} chunks synthesized)",
                path.display(),
                report.completed - report.failures.len(),
                report.total
            );
        }
        None => println!("Conversion cancelled, no output written"),
    }
    Ok(())
}

fn inspect(config: PipelineConfig, input: &PathBuf) -> anyhow::Result<()> {
    let cleaner = TextCleaner::new(config.expand_abbreviations, config.remove_urls);
    let book = extract_book(input, &cleaner)
        .with_context(|| format!("failed to read {}", input.display()))?;

    println!("Title:    {}", book.metadata.title);
    println!("Author:   {}", book.metadata.author);
    println!("Language: {}", book.metadata.language);
    if let Some(date) = &book.metadata.date {
        println!("Date:     {date}");
    }
    println!("Cover:    {}", if book.cover.is_some() { "yes" } else { "no" });
    println!();

    let chunks = plan_book(&book.chapters, config.max_chunk_chars);
    for chapter in &book.chapters {
        let n = chunks.iter().filter(|c| c.chapter == chapter.index).count();
        println!(
            "{:3}. {} ({} words, {} chunks)",
            chapter.index + 1,
            chapter.title,
            chapter.word_count(),
            n
        );
    }
    println!();
    println!(
        "{} chapters, {} chunks at up to {} chars each",
        book.chapters.len(),
        chunks.len(),
        config.max_chunk_chars
    );
    Ok(())
}
