// ABOUTME: Blocking HTTP client for the Granola documents API
// ABOUTME: Handles pagination, throttling, client headers, and fail-fast errors

use crate::model::{null_as_default, Document};
use crate::{Error, Result};
use rand::Rng;
use reqwest::blocking::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.granola.ai";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const DOCUMENTS_ENDPOINT: &str = "/v2/get-documents";
const CLIENT_VERSION: &str = "5.354.0";
const PAGE_SIZE: usize = 100;
const ERROR_PREVIEW_CHARS: usize = 200;

fn truncate_str(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((boundary, _)) => format!("{}...", &s[..boundary]),
        None => s.to_string(),
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
    page_size: usize,
    throttle_min: u64,
    throttle_max: u64,
}

impl ApiClient {
    pub fn new(token: String, base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).gzip(true).build()?;

        Ok(ApiClient {
            client,
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            token,
            page_size: PAGE_SIZE,
            throttle_min: 100,
            throttle_max: 300,
        })
    }

    pub fn with_throttle(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.throttle_min = min_ms;
        self.throttle_max = max_ms;
        self
    }

    pub fn disable_throttle(mut self) -> Self {
        self.throttle_min = 0;
        self.throttle_max = 0;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn throttle(&self) {
        if self.throttle_max > 0 {
            let sleep_ms = rand::thread_rng().gen_range(self.throttle_min..=self.throttle_max);
            std::thread::sleep(Duration::from_millis(sleep_ms));
        }
    }

    fn post<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "*/*")
            .header("Content-Type", "application/json")
            .header("User-Agent", format!("Granola/{}", CLIENT_VERSION))
            .header("X-Client-Version", CLIENT_VERSION)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(Error::Api {
                endpoint: endpoint.into(),
                status: status.as_u16(),
                message: truncate_str(&message, ERROR_PREVIEW_CHARS),
            });
        }

        let body = response.text()?;
        serde_json::from_str(&body).map_err(|e| {
            debug!(
                endpoint,
                body = %truncate_str(&body, 500),
                "failed to parse response"
            );
            Error::Parse(e)
        })
    }

    /// Fetches every document, one page at a time, until a short page.
    pub fn list_documents(&self) -> Result<Vec<Document>> {
        #[derive(serde::Deserialize)]
        struct Response {
            #[serde(default, deserialize_with = "null_as_default")]
            docs: Vec<Document>,
        }

        let mut documents = Vec::new();
        let mut offset = 0;

        loop {
            let page: Response = self.post(
                DOCUMENTS_ENDPOINT,
                json!({
                    "limit": self.page_size,
                    "offset": offset,
                    "include_last_viewed_panel": true,
                }),
            )?;

            let count = page.docs.len();
            debug!(offset, count, "fetched documents page");
            documents.extend(page.docs);

            if count < self.page_size {
                break;
            }
            offset += count;
            self.throttle();
        }

        Ok(documents)
    }
}
