use anyhow::{bail, Context, Result};
use derive_builder::Builder;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, ops::RangeInclusive, path::Path, time::Duration};
use tracing::{info, warn};

pub const DEFAULT_BASE_URL: &str = "https://codeforces.com";
pub const LINKS_HEADER: &str = "problem_url";

/// Walks the paginated problemset and gathers links to individual problems.
#[derive(Debug, Builder)]
pub struct LinkCollector {
    client: Client,
    #[builder(setter(into), default = "DEFAULT_BASE_URL.to_string()")]
    base_url: String,
    #[builder(default = "1..=40")]
    pages: RangeInclusive<u32>,
    #[builder(default = "Duration::from_secs(1)")]
    delay: Duration,
}

/// One row of the links file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRow {
    pub problem_url: String,
}

impl LinkCollector {
    /// Failed pages are logged and skipped, never retried.
    pub async fn collect(&self) -> BTreeSet<String> {
        let mut links = BTreeSet::new();
        for page in self.pages.clone() {
            let url = get_page_url(&self.base_url, page);
            info!("Scraping {url} ...");

            let html = match self.fetch(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Failed to fetch {url}: {e:#}");
                    continue;
                }
            };

            let found = parse_problem_links(&self.base_url, &html);
            info!("Found {} problem links on page {page}", found.len());
            links.extend(found);

            tokio::time::sleep(self.delay).await;
        }

        links
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("status {status}");
        }
        Ok(resp.text().await?)
    }
}

fn get_page_url(base_url: &str, page: u32) -> String {
    format!("{}/problemset/page/{}", base_url.trim_end_matches('/'), page)
}

/// Absolute URLs of every problem link in a listing page, in document order.
pub fn parse_problem_links(base_url: &str, html: &str) -> Vec<String> {
    let base_url = base_url.trim_end_matches('/');
    let fragment = Html::parse_document(html);
    fragment
        .select(&Selector::parse("a[href^='/problemset/problem/']").unwrap())
        .filter_map(|node| node.value().attr("href"))
        .map(|href| format!("{base_url}{href}"))
        .collect()
}

pub fn write_links(path: impl AsRef<Path>, links: &BTreeSet<String>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::CRLF)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    // header goes out even when no links were found
    writer.write_record([LINKS_HEADER])?;
    for link in links {
        writer.serialize(LinkRow {
            problem_url: link.clone(),
        })?;
    }
    writer.flush()?;

    Ok(())
}
