use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::http_client;
use crate::config::Config;
use crate::core::{capture, domain_of, Tool, ToolCategory, ToolMetadata, ToolOutput, ToolResult};
use crate::error::{ReconError, ReconResult};
use crate::utils::HttpClient;

const CANDIDATE_PATHS: &[&str] = &["/", "/about", "/company", "/team", "/people", "/leadership", "/staff"];

const SOCIAL_NETWORKS: &[(&str, &str)] = &[
    ("linkedin", "linkedin.com"),
    ("twitter", "twitter.com"),
    ("facebook", "facebook.com"),
    ("instagram", "instagram.com"),
    ("github", "github.com"),
];

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap()
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\+?\d[\d\s().-]{7,}\d").unwrap()
});

static HREF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).unwrap()
});

static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap()
});

/// What one page contributed
#[derive(Debug, Default)]
struct PageFindings {
    title: Option<String>,
    emails: BTreeSet<String>,
    phones: BTreeSet<String>,
    social: BTreeMap<&'static str, BTreeSet<String>>,
}

/// Scrape the target's own site for contact details and social profiles
pub struct CorporateSiteTool {
    metadata: ToolMetadata,
    http: HttpClient,
}

impl CorporateSiteTool {
    pub fn new(config: &Config) -> ReconResult<Self> {
        Ok(Self {
            metadata: ToolMetadata::new(
                "corporate_site",
                "Scrape corporate site pages for emails, phones and social profiles",
                ToolCategory::Web,
            ),
            http: http_client(config, 15)?,
        })
    }

    async fn collect(&self, target: &str) -> ReconResult<ToolOutput> {
        let base_url = if target.starts_with("http") {
            target.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", domain_of(target))
        };

        let mut pages = Vec::new();
        let mut titles = Map::new();
        let mut emails = BTreeSet::new();
        let mut phones = BTreeSet::new();
        let mut social: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();

        for path in CANDIDATE_PATHS {
            let url = if *path == "/" { base_url.clone() } else { format!("{}{}", base_url, path) };

            let Some(html) = self.http.get_text(&url).await else {
                continue;
            };

            let findings = scan_page(&html);
            pages.push(json!({"path": path, "url": url, "length": html.len()}));
            if let Some(title) = findings.title {
                titles.insert(path.to_string(), Value::String(title));
            }
            emails.extend(findings.emails);
            phones.extend(findings.phones);
            for (network, links) in findings.social {
                social.entry(network).or_default().extend(links);
            }
        }

        if pages.is_empty() {
            return Err(ReconError::NetworkError("Unable to retrieve corporate site pages".to_string()));
        }

        if emails.is_empty() && phones.is_empty() && social.is_empty() && titles.is_empty() {
            return Err(ReconError::ToolError {
                tool: self.metadata.name.clone(),
                message: format!("No contact details found on {} retrieved pages", pages.len()),
            });
        }

        debug!(
            "corporate_site: {} pages, {} emails, {} phones for {}",
            pages.len(), emails.len(), phones.len(), base_url
        );

        let pages_retrieved = pages.len();
        Ok(ToolOutput::new(json!({
            "pages_scraped": pages,
            "page_titles": titles,
            "emails": emails,
            "phones": phones,
            "social_links": social,
        }))
        .meta("source", "corporate_site_scraper")
        .meta("pages_attempted", CANDIDATE_PATHS.len())
        .meta("pages_retrieved", pages_retrieved))
    }
}

#[async_trait]
impl Tool for CorporateSiteTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn probe(&self, target: &str) -> ToolResult {
        capture(&self.metadata, target, self.collect(target)).await
    }
}

fn scan_page(html: &str) -> PageFindings {
    let mut findings = PageFindings {
        title: TITLE_RE
            .captures(html)
            .map(|c| c[1].split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty()),
        ..PageFindings::default()
    };

    findings.emails = EMAIL_RE.find_iter(html).map(|m| m.as_str().to_string()).collect();
    findings.phones = PHONE_RE.find_iter(html).map(|m| m.as_str().trim().to_string()).collect();

    for caps in HREF_RE.captures_iter(html) {
        let href = &caps[1];
        let lowered = href.to_lowercase();
        if let Some((network, _)) = SOCIAL_NETWORKS.iter().find(|(_, host)| lowered.contains(host)) {
            findings.social.entry(*network).or_default().insert(href.to_string());
        }
    }

    findings
}

pub fn create(config: &Config) -> ReconResult<Arc<dyn Tool>> {
    Ok(Arc::new(CorporateSiteTool::new(config)?))
}
