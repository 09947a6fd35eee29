use anyhow::{Context, Result};
use derive_builder::Builder;
use reqwest::Client;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, error, info};
use url::Url;

use crate::links::LinkRow;

/// Saves the raw HTML of each problem page under `out_dir`.
#[derive(Debug, Builder)]
pub struct PageDownloader {
    client: Client,
    #[builder(setter(into), default = "PathBuf::from(\"problems\")")]
    out_dir: PathBuf,
    #[builder(default = "Duration::from_secs(1)")]
    delay: Duration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownloadStats {
    pub total: usize,
    pub saved: usize,
    pub failed: usize,
}

impl PageDownloader {
    pub async fn download_all(&self, urls: &[String]) -> Result<DownloadStats> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("failed to create {}", self.out_dir.display()))?;

        let total = urls.len();
        let mut stats = DownloadStats {
            total,
            ..Default::default()
        };

        for (idx, url) in urls.iter().enumerate() {
            let position = idx + 1;
            info!("[{position}/{total}] Fetching {url} ...");
            match self.download_one(url, position).await {
                Ok(path) => {
                    debug!("Saved {}", path.display());
                    stats.saved += 1;
                }
                Err(e) => {
                    error!("Failed {url}: {e:#}");
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    async fn download_one(&self, url: &str, position: usize) -> Result<PathBuf> {
        let html = self.client.get(url).send().await?.text().await?;

        let path = self.out_dir.join(problem_filename(url, position));
        fs::write(&path, html).with_context(|| format!("failed to write {}", path.display()))?;

        tokio::time::sleep(self.delay).await;
        Ok(path)
    }
}

/// `<contest>_<letter>.html` from `/problemset/problem/<contest>/<letter>`,
/// `problem_<position>.html` when the path is too short to tell.
pub fn problem_filename(url: &str, position: usize) -> String {
    let segments = Url::parse(url)
        .map(|url| {
            url.path()
                .trim_matches('/')
                .split('/')
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    match segments.as_slice() {
        [_, _, contest, letter, ..] => format!("{contest}_{letter}.html"),
        _ => format!("problem_{position}.html"),
    }
}

/// Problem URLs from the links file, in file order.
pub fn read_links(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("failed to open {}", path.display()))?;

    let urls = reader
        .deserialize::<LinkRow>()
        .map(|row| row.map(|row| row.problem_url))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to read links from {}", path.display()))?;

    info!("Found {} problem URLs in {}", urls.len(), path.display());
    Ok(urls)
}
