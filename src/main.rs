//! tutor-rag - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tutor_rag::{
    cli::{Args, Commands, Config, Verbosity},
    embedding::MistralEmbedder,
    feedback::{ContextConfig, ExistingFiles, FeedbackEngine, MistralChat, Submission},
    index::{BuildEvent, IndexBuilder, IndexStore, ResumePolicy},
    retrieval::Retriever,
    Corpus,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.clone())?;

    let verbosity = args.verbosity();
    tutor_rag::logging::init(verbosity.log_level().unwrap_or(config.logging.default_level.as_str()));
    debug!(verbosity = verbosity.as_str(), config = ?args.config, "starting tutor-rag");

    match &args.command {
        Commands::Build {
            corpus,
            index,
            fill_gaps,
        } => {
            run_build(&config, verbosity, corpus.clone(), index.clone(), *fill_gaps).await?;
        }
        Commands::Query { text, top_k, index } => {
            run_query(&config, text, *top_k, index.clone()).await?;
        }
        Commands::Feedback {
            question,
            image,
            index,
        } => {
            run_feedback(&config, question, image.clone(), index.clone()).await?;
        }
        Commands::Stats { corpus, index } => {
            show_stats(&config, corpus.clone(), index.clone())?;
        }
        Commands::Config => {
            show_config(&config, args.config.as_ref())?;
        }
    }

    Ok(())
}

/// Embed pending corpus pages into the persisted index
async fn run_build(
    config: &Config,
    verbosity: Verbosity,
    corpus_path: Option<PathBuf>,
    index_path: Option<PathBuf>,
    fill_gaps: bool,
) -> Result<()> {
    let corpus_path = corpus_path.unwrap_or_else(|| config.corpus_path());
    let index_path = index_path.unwrap_or_else(|| config.index_path());

    let corpus = Corpus::load(&corpus_path)
        .with_context(|| format!("Failed to load corpus from {}", corpus_path.display()))?;
    let embedder = MistralEmbedder::from_config(&config.embedding)?;

    let mut options = config.builder_options();
    if fill_gaps {
        options.resume = ResumePolicy::MissingPages;
    }

    let pb = if verbosity.show_progress() {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} pages {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let progress = pb.clone();
    let mut builder = IndexBuilder::new(embedder, IndexStore::new(&index_path))
        .with_options(options)
        .on_progress(move |event| match event {
            BuildEvent::Started { pending, resume_after } => {
                progress.set_length(*pending as u64);
                if let Some(page) = resume_after {
                    progress.set_message(format!("resuming after page {}", page));
                }
            }
            BuildEvent::Embedded { page_number } => {
                progress.set_message(format!("page {}", page_number));
                progress.inc(1);
            }
            BuildEvent::Failed { page_number, .. } => {
                progress.set_message(format!("page {} failed", page_number));
                progress.inc(1);
            }
            BuildEvent::Finished { .. } => progress.finish_and_clear(),
        });

    let outcome = builder.resume(&corpus).await?;
    let report = &outcome.report;

    println!(
        "{} {} pages embedded, {} skipped, {} failed ({} pages indexed) in {:.1}s",
        "✓".green(),
        report.embedded.len(),
        report.skipped,
        report.failed.len(),
        outcome.index.len(),
        report.elapsed_ms as f64 / 1000.0
    );
    for failure in &report.failed {
        println!(
            "  {} page {}: {}",
            "✗".red(),
            failure.page_number,
            failure.reason.dimmed()
        );
    }
    if !report.failed.is_empty() && keeps_gaps(config, fill_gaps) {
        println!(
            "{}",
            "Failed pages before the last indexed page are only retried with --fill-gaps".yellow()
        );
    }
    println!("Index saved to: {}", index_path.display());

    Ok(())
}

fn keeps_gaps(config: &Config, fill_gaps: bool) -> bool {
    !fill_gaps && config.builder.resume == ResumePolicy::LastPage
}

/// Print the pages most relevant to a query
async fn run_query(
    config: &Config,
    text: &str,
    top_k: Option<usize>,
    index_path: Option<PathBuf>,
) -> Result<()> {
    let index_path = index_path.unwrap_or_else(|| config.index_path());
    let index = IndexStore::new(&index_path).load()?;

    if index.is_empty() {
        println!(
            "{} No index at {}. Run 'tutor-rag build' first.",
            "Warning:".yellow(),
            index_path.display()
        );
        return Ok(());
    }

    let retriever = Retriever::new(MistralEmbedder::from_config(&config.embedding)?);
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let pages = retriever.retrieve_scored(text, &index, top_k).await;

    if pages.is_empty() {
        println!("{}", "No pages retrieved.".yellow());
        return Ok(());
    }

    for (rank, page) in pages.iter().enumerate() {
        println!(
            "{}. {} (similarity {:.3})",
            rank + 1,
            format!("Page {}", page.record.page_number).bold(),
            page.score
        );
        println!("   {}", preview(&page.record.text, 160).dimmed());
        for image in &page.record.image_paths {
            println!("   🖼  {}", image.display());
        }
    }

    Ok(())
}

/// Generate grounded feedback for one submission
async fn run_feedback(
    config: &Config,
    question: &str,
    image: Option<PathBuf>,
    index_path: Option<PathBuf>,
) -> Result<()> {
    let index_path = index_path.unwrap_or_else(|| config.index_path());
    let index = IndexStore::new(&index_path).load()?;
    if index.is_empty() {
        eprintln!(
            "{}: no index loaded, feedback will not cite textbook pages",
            "Warning".yellow()
        );
    }

    let mut submission = Submission::new(question);
    if let Some(path) = image {
        let png = std::fs::read(&path)
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        submission = submission.with_image(png);
    }

    let retriever = Retriever::new(MistralEmbedder::from_config(&config.embedding)?)
        .with_top_k(config.retrieval.top_k);
    let chat = MistralChat::from_config(&config.chat)?;

    let mut engine = FeedbackEngine::new(retriever, chat, config.chat.system_prompt.clone())
        .with_context_config(ContextConfig {
            max_context_tokens: config.retrieval.max_context_tokens,
            include_scores: false,
        });
    if config.retrieval.existing_images_only {
        engine = engine.with_image_filter(Arc::new(ExistingFiles));
    }

    let feedback = engine.feedback(&index, &submission).await?;

    println!("{}", "Feedback".bold().underline());
    println!("{}\n", feedback.text);

    if !feedback.pages.is_empty() {
        println!("{}", "Relevant pages".bold().underline());
        for page in &feedback.pages {
            println!("  {} {}", format!("Page {}", page.page_number).cyan(), preview(&page.text, 100).dimmed());
            for image in &page.image_paths {
                println!("     🖼  {}", image.display());
            }
        }
    }

    Ok(())
}

/// Summarise the persisted index
fn show_stats(config: &Config, corpus_path: Option<PathBuf>, index_path: Option<PathBuf>) -> Result<()> {
    let index_path = index_path.unwrap_or_else(|| config.index_path());
    let index = IndexStore::new(&index_path).load()?;

    println!("{}", "Index".bold().underline());
    println!("  Path:      {}", index_path.display());
    println!("  Pages:     {}", index.len());
    match index.dimension() {
        Some(dim) => println!("  Dimension: {}", dim),
        None => println!("  Dimension: -"),
    }
    if let (Some(first), Some(last)) = (index.metadata().first(), index.metadata().last()) {
        println!("  Range:     {} - {}", first.page_number, last.page_number);
    }

    let corpus_path = corpus_path.unwrap_or_else(|| config.corpus_path());
    if corpus_path.exists() {
        let corpus = Corpus::load(&corpus_path)?;
        let missing: Vec<u32> = corpus
            .pages()
            .iter()
            .map(|p| p.page_number)
            .filter(|n| !index.contains_page(*n))
            .collect();
        let last = index.last_page_number().unwrap_or(0);
        let gaps = missing.iter().filter(|n| **n < last).count();

        println!("\n{}", "Corpus".bold().underline());
        println!("  Path:      {}", corpus_path.display());
        println!("  Pages:     {}", corpus.len());
        println!("  Missing:   {}", missing.len());
        if gaps > 0 {
            println!(
                "  {} {} missing pages precede page {} (use build --fill-gaps)",
                "Gaps:".yellow(),
                gaps,
                last
            );
        }
    }

    Ok(())
}

/// Print the effective configuration
fn show_config(config: &Config, explicit: Option<&PathBuf>) -> Result<()> {
    match explicit.cloned().or_else(Config::default_path) {
        Some(path) if path.exists() => println!("{} {}\n", "Config file:".bold(), path.display()),
        _ => println!("{}\n", "Using built-in defaults".dimmed()),
    }
    let rendered = toml::to_string_pretty(config).context("Failed to render config")?;
    println!("{}", rendered);
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
