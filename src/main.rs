mod classifier;
mod cleaner;
mod crawler;
mod db;
mod listing;
mod navigator;
mod normalize;
mod settings;
mod snapshot;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use classifier::{GeminiService, TitleClassifier};
use crawler::{CrawlPlan, ListingCrawler};
use listing::{Listing, Taxonomy};
use navigator::chrome::ChromeNavigator;
use normalize::location::UzbekRegions;
use normalize::translate::GoogleTranslator;
use normalize::Normalizer;
use settings::Settings;

#[derive(Parser)]
#[command(name = "hh_scraper", about = "hh.uz job listing pipeline: crawl, classify, store")]
struct Cli {
    /// Settings file (default: ./hh_scraper.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl listings and write the raw snapshot
    Crawl {
        /// Max listings to visit (overrides job_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Classify titles from the raw snapshot, clean, write the cleaned snapshot
    Classify,
    /// Upsert the cleaned snapshot into the store
    Push,
    /// Crawl + classify + clean + push in one go
    Run {
        /// Max listings to visit (overrides job_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show store statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Crawl { limit } => {
            settings.job_limit = limit.or(settings.job_limit);
            let listings = crawl(&settings).await?;
            println!(
                "Crawled {} listings -> {}",
                listings.len(),
                settings.raw_snapshot_path().display()
            );
            Ok(())
        }
        Commands::Classify => {
            let raw = snapshot::read_snapshot(&settings.raw_snapshot_path())
                .context("No raw snapshot. Run 'crawl' first.")?;
            let cleaned = classify_and_clean(&settings, raw).await?;
            println!(
                "Kept {} listings -> {}",
                cleaned.len(),
                settings.cleaned_snapshot_path().display()
            );
            Ok(())
        }
        Commands::Push => {
            let cleaned = snapshot::read_snapshot(&settings.cleaned_snapshot_path())
                .context("No cleaned snapshot. Run 'classify' first.")?;
            push(&settings, &cleaned)
        }
        Commands::Run { limit } => {
            settings.job_limit = limit.or(settings.job_limit);

            let t_crawl = Instant::now();
            let raw = crawl(&settings).await?;
            println!(
                "Crawled {} listings in {}",
                raw.len(),
                format_duration(t_crawl.elapsed())
            );
            if raw.is_empty() {
                println!("Nothing crawled.");
                return Ok(());
            }

            let t_classify = Instant::now();
            let cleaned = classify_and_clean(&settings, raw).await?;
            println!(
                "Classified and cleaned to {} listings in {}",
                cleaned.len(),
                format_duration(t_classify.elapsed())
            );

            push(&settings, &cleaned)
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Listings:    {}", s.total);
            println!("With date:   {}", s.dated);
            println!("With salary: {}", s.with_salary);
            println!(
                "Last ingest: {}",
                s.latest_ingestion.as_deref().unwrap_or("-")
            );
            if !s.by_title.is_empty() {
                println!("\n{:<28} | {:>5}", "Title", "Count");
                println!("{}", "-".repeat(36));
                for (title, n) in &s.by_title {
                    println!("{:<28} | {:>5}", truncate(title, 28), n);
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

// ── Stages ──

async fn crawl(settings: &Settings) -> anyhow::Result<Vec<Listing>> {
    let normalizer = Normalizer::new(
        Box::new(GoogleTranslator::new(settings.translator.endpoint.as_deref())),
        Box::new(UzbekRegions),
        settings.skills.clone(),
        settings.rates,
        settings.country.clone(),
        settings.source.clone(),
    );
    let plan = CrawlPlan {
        base_url: settings.base_url.clone(),
        job_limit: settings.job_limit,
        locators: settings.locators.clone(),
        element_wait: settings.timeouts.element_wait(),
        delays: settings.delays,
    };

    let mut nav = ChromeNavigator::launch(settings.headless, settings.timeouts.page_load()).await?;
    let outcome = ListingCrawler::new(plan, &normalizer).crawl(&mut nav).await;
    nav.shutdown().await;
    let outcome = outcome.context("Crawl aborted")?;

    info!(
        "Crawl: {} attempted, {} skipped, {} pages",
        outcome.attempted, outcome.skipped, outcome.pages
    );
    snapshot::write_snapshot(&settings.raw_snapshot_path(), &outcome.listings)?;
    Ok(outcome.listings)
}

async fn classify_and_clean(settings: &Settings, raw: Vec<Listing>) -> anyhow::Result<Vec<Listing>> {
    let taxonomy = Taxonomy::new(settings.taxonomy.iter().cloned());
    let service = GeminiService::from_env(
        settings.classifier.endpoint.clone(),
        settings.classifier.model.clone(),
        &settings.classifier.api_key_env,
    )?;
    let classifier = TitleClassifier::new(
        &service,
        &taxonomy,
        settings.classifier.batch_size,
        settings.classifier.batch_delay(),
    );

    let titles: Vec<String> = raw
        .iter()
        .map(|l| l.raw_title.clone().unwrap_or_default())
        .collect();
    let skills: Vec<String> = raw.iter().map(Listing::skills_joined).collect();
    let labels = classifier.classify(&titles, &skills).await?;

    let labelled: Vec<Listing> = raw
        .into_iter()
        .zip(labels)
        .map(|(l, label)| l.with_title(label))
        .collect();

    let (cleaned, report) = cleaner::clean(labelled, &taxonomy);
    info!("Cleaning: {:?}", report);
    snapshot::write_snapshot(&settings.cleaned_snapshot_path(), &cleaned)?;
    Ok(cleaned)
}

fn push(settings: &Settings, cleaned: &[Listing]) -> anyhow::Result<()> {
    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    let report = db::upsert_listings(&conn, cleaned)?;
    println!(
        "Stored {} listings ({} replaced, {} skipped)",
        report.written,
        report.replaced,
        report.blank_ids + report.duplicate_ids
    );
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max - 3).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
