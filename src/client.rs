use anyhow::Result;
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const TIMEOUT: Duration = Duration::from_secs(30);

/// Client shared by the link collector and the page downloader.
pub fn http_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .gzip(true)
        .cookie_store(true)
        .timeout(TIMEOUT)
        .build()?;

    Ok(client)
}
