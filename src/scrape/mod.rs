use reqwest::StatusCode;
use std::{error::Error, thread::sleep, time::Duration};

use crate::config::ScrapeConfig;
use crate::errors::FetchError;

/// A fetched page body together with the final status code.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub html: String,
}

/// GET with timeout, user agent and status-code signaling.
pub trait PageFetcher {
    /// Retries retryable failures within the configured budget.
    fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// One attempt, no retries.
    fn fetch_once(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.fetch(url)
    }
}

fn get_error(error: &reqwest::Error) -> String {
    match error.source() {
        Some(e) => match e.source() {
            Some(e) => e.to_string(),
            None => e.to_string(),
        },
        None => error.to_string(),
    }
}

/// Upgrade protocol-relative urls and check they parse.
pub fn prepare_url(url: &str) -> Result<reqwest::Url, FetchError> {
    let mut url = url.trim().to_string();

    if url.starts_with("//") {
        url = format!("https:{}", url);
    }

    reqwest::Url::parse(&url).map_err(|e| FetchError::InvalidUrl {
        url: url.clone(),
        reason: e.to_string(),
    })
}

/// Long-lived blocking client; connections are pooled across rows.
pub struct HttpClient {
    client: reqwest::blocking::Client,
    max_retries: u8,
}

impl HttpClient {
    pub fn new(config: &ScrapeConfig) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    fn attempt(&self, url: &reqwest::Url, iden: &str) -> Result<FetchedPage, FetchError> {
        log::debug!("{iden}: requesting");

        let resp = match self.client.get(url.clone()).send() {
            Ok(r) => r,
            Err(err) => {
                log::debug!("{iden}: {err}: {:#?}", get_error(&err));
                return Err(FetchError::Retryable(get_error(&err)));
            }
        };

        let status = resp.status();

        if !status.is_success() {
            log::debug!("{iden}: {:?}", status.to_string());

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(FetchError::Retryable(format!("http status {status}")));
            }

            return Err(FetchError::Terminal(format!("http status {status}")));
        }

        // we might get OK, but no text response.
        let bytes = match resp.bytes() {
            Ok(b) => b,
            Err(err) if err.is_timeout() => {
                return Err(FetchError::Retryable(format!("body timeout: {err}")));
            }
            Err(err) => return Err(FetchError::Terminal(get_error(&err))),
        };

        Ok(FetchedPage {
            status: status.as_u16(),
            html: String::from_utf8_lossy(&bytes).to_string(),
        })
    }
}

fn iden(url: &reqwest::Url) -> String {
    format!("{}{}", url.host_str().unwrap_or_default(), url.path())
}

impl PageFetcher for HttpClient {
    fn fetch_once(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let url_parsed = prepare_url(url)?;
        self.attempt(&url_parsed, &iden(&url_parsed))
    }

    fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let url_parsed = prepare_url(url)?;
        let iden = iden(&url_parsed);

        let mut r: u64 = 0;
        loop {
            if r > 0 {
                log::debug!("{iden}: retrying");
            }

            r += 1;

            match self.attempt(&url_parsed, &iden) {
                Ok(page) => return Ok(page),
                Err(err) if err.is_retryable() && r <= u64::from(self.max_retries) => {
                    log::warn!("{iden}: {err}, attempt {r}/{}", u64::from(self.max_retries) + 1);
                    sleep(Duration::from_secs(r * 2));
                }
                Err(err) => return Err(err),
            }
        }
    }
}
