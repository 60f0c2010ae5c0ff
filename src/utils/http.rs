// src/utils/http.rs
use std::time::Duration;
use anyhow::{bail, Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, trace};

/// HTTP client shared by the web-facing tool adapters
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    user_agent: String,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(user_agent: Option<String>, timeout_secs: Option<u64>) -> Result<Self> {
        let user_agent = user_agent.unwrap_or_else(|| format!("recon-again/{}", env!("CARGO_PKG_VERSION")));
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(30));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(&user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, user_agent })
    }

    /// Make a GET request
    pub async fn get(&self, url: &str) -> Result<Response> {
        debug!("GET {}", url);

        self.client
            .get(url)
            .send()
            .await
            .context(format!("Failed to GET {}", url))
    }

    /// GET a JSON document; any non-200 status is an error of the form `HTTP <code>`
    pub async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self.get(url).await?;
        let status = response.status();

        if status != StatusCode::OK {
            bail!("HTTP {}", status.as_u16());
        }

        response
            .json::<Value>()
            .await
            .context(format!("Invalid JSON from {}", url))
    }

    /// GET a page body, or `None` for non-200 responses and transport errors
    pub async fn get_text(&self, url: &str) -> Option<String> {
        match self.get(url).await {
            Ok(response) if response.status() == StatusCode::OK => response.text().await.ok(),
            Ok(response) => {
                trace!("Non-200 status {} for {}", response.status(), url);
                None
            }
            Err(e) => {
                trace!("Request error for {}: {:#}", url, e);
                None
            }
        }
    }

    /// Status code of a HEAD request, following redirects
    pub async fn head_status(&self, url: &str) -> Result<u16> {
        trace!("HEAD {}", url);

        let response = self.client
            .head(url)
            .send()
            .await
            .context(format!("Failed to HEAD {}", url))?;

        Ok(response.status().as_u16())
    }

    /// Get the user agent
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}
