use anyhow::{ensure, Result};
use cf_samples::{
    client::http_client,
    download::{read_links, PageDownloaderBuilder},
    links::{write_links, LinkCollectorBuilder, DEFAULT_BASE_URL},
    samples::process_directories,
};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

const LINKS_CSV: &str = "codeforces_problem_links.csv";

#[derive(Debug, Parser)]
#[command(
    name = "cf-samples",
    version,
    about = "Collect Codeforces problems and refresh their sample tests"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Collect problem links from the paginated problemset into a CSV file
    Links {
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,
        /// First listing page
        #[arg(long, default_value_t = 1)]
        first: u32,
        /// Last listing page, inclusive
        #[arg(long, default_value_t = 40)]
        last: u32,
        /// Pause after each fetched page
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
        #[arg(short, long, default_value = LINKS_CSV)]
        output: PathBuf,
    },
    /// Download the HTML of every problem listed in the CSV file
    Download {
        #[arg(short, long, default_value = LINKS_CSV)]
        input: PathBuf,
        #[arg(long, default_value = "problems")]
        out_dir: PathBuf,
        /// Pause after each saved page
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
    },
    /// Rewrite `sampleTests` of each JSON record from its downloaded HTML page
    Samples {
        /// Folder of problem records, e.g. ./extracted_problems
        json_dir: PathBuf,
        /// Folder of downloaded pages, e.g. ./problems
        html_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match Cli::parse().command {
        Command::Links {
            base_url,
            first,
            last,
            delay_ms,
            output,
        } => {
            ensure!(first <= last, "first page {first} is after last page {last}");
            let collector = LinkCollectorBuilder::default()
                .client(http_client()?)
                .base_url(base_url)
                .pages(first..=last)
                .delay(Duration::from_millis(delay_ms))
                .build()?;

            let links = collector.collect().await;
            write_links(&output, &links)?;
            println!(
                "Saved {} problem links to {}",
                links.len(),
                output.display()
            );
        }
        Command::Download {
            input,
            out_dir,
            delay_ms,
        } => {
            let urls = read_links(&input)?;
            let downloader = PageDownloaderBuilder::default()
                .client(http_client()?)
                .out_dir(out_dir.clone())
                .delay(Duration::from_millis(delay_ms))
                .build()?;

            let stats = downloader.download_all(&urls).await?;
            println!(
                "Downloaded {} of {} problems into {} ({} failed)",
                stats.saved,
                stats.total,
                out_dir.display(),
                stats.failed
            );
        }
        Command::Samples { json_dir, html_dir } => {
            info!("JSON folder: '{}'", json_dir.display());
            info!("HTML folder: '{}'", html_dir.display());

            let tally = process_directories(&json_dir, &html_dir)?;
            println!("{tally}");
        }
    }

    Ok(())
}
