use std::collections::BTreeSet;
use std::sync::Arc;
use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use tracing::trace;

use super::http_client;
use crate::config::Config;
use crate::core::{capture, domain_of, Tool, ToolCategory, ToolMetadata, ToolOutput, ToolResult};
use crate::error::ReconResult;
use crate::utils::HttpClient;

const PROVIDERS: &[(&str, &str)] = &[
    ("aws_s3", "https://{bucket}.s3.amazonaws.com"),
    ("gcp_storage", "https://storage.googleapis.com/{bucket}"),
    ("azure_blob", "https://{bucket}.blob.core.windows.net"),
];

/// Statuses that mean the bucket exists, whether or not it is readable
const INTERESTING_STATUSES: &[u16] = &[200, 301, 302, 307, 308, 401, 403, 405];

#[derive(Debug, Serialize, PartialEq)]
struct CloudResource {
    provider: &'static str,
    bucket: String,
    url: String,
    status: u16,
    access: &'static str,
}

enum ProbeOutcome {
    Found(CloudResource),
    Missing,
    TimedOut,
}

/// Probe public cloud storage for buckets named after the target
pub struct CloudEnumTool {
    metadata: ToolMetadata,
    http: HttpClient,
}

impl CloudEnumTool {
    pub fn new(config: &Config) -> ReconResult<Self> {
        Ok(Self {
            metadata: ToolMetadata::new(
                "cloud_enum",
                "Enumerate common cloud storage buckets named after the target",
                ToolCategory::Cloud,
            ),
            http: http_client(config, 10)?,
        })
    }

    async fn check(&self, provider: &'static str, template: &str, bucket: &str) -> ProbeOutcome {
        let url = template.replace("{bucket}", bucket);

        match self.http.head_status(&url).await {
            Ok(status) if INTERESTING_STATUSES.contains(&status) => ProbeOutcome::Found(CloudResource {
                provider,
                bucket: bucket.to_string(),
                url,
                status,
                access: if status == 200 { "public" } else { "restricted" },
            }),
            Ok(_) => ProbeOutcome::Missing,
            Err(e) => {
                let timed_out = e
                    .downcast_ref::<reqwest::Error>()
                    .map_or(false, |e| e.is_timeout());
                trace!("{} probe failed for {}: {:#}", provider, bucket, e);
                if timed_out {
                    ProbeOutcome::TimedOut
                } else {
                    ProbeOutcome::Missing
                }
            }
        }
    }

    async fn collect(&self, target: &str) -> ReconResult<ToolOutput> {
        let candidates = candidate_buckets(&domain_of(target));

        let checks = candidates
            .iter()
            .flat_map(|bucket| PROVIDERS.iter().map(move |(provider, template)| (*provider, *template, bucket)))
            .map(|(provider, template, bucket)| self.check(provider, template, bucket));

        let mut resources = Vec::new();
        let mut timeouts = 0usize;
        for outcome in join_all(checks).await {
            match outcome {
                ProbeOutcome::Found(resource) => resources.push(resource),
                ProbeOutcome::TimedOut => timeouts += 1,
                ProbeOutcome::Missing => {}
            }
        }

        let providers: Vec<&str> = PROVIDERS.iter().map(|(provider, _)| *provider).collect();

        Ok(ToolOutput::new(json!({
            "found_count": resources.len(),
            "resources": resources,
        }))
        .meta("providers_checked", providers)
        .meta("candidate_buckets", candidates.len())
        .meta("checks_performed", candidates.len() * PROVIDERS.len())
        .meta("timeouts", timeouts))
    }
}

#[async_trait]
impl Tool for CloudEnumTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn probe(&self, target: &str) -> ToolResult {
        capture(&self.metadata, target, self.collect(target)).await
    }
}

/// Bucket names derived from a domain: the domain itself in a few spellings
/// plus common suffixes on its first label
fn candidate_buckets(domain: &str) -> BTreeSet<String> {
    let base = domain.split('.').next().unwrap_or(domain);

    let mut candidates = BTreeSet::from([
        domain.to_string(),
        domain.replace('.', "-"),
        domain.replace('.', ""),
        base.to_string(),
    ]);
    for suffix in ["assets", "static", "files", "media", "cdn"] {
        candidates.insert(format!("{}-{}", base, suffix));
    }

    candidates.retain(|name| !name.is_empty());
    candidates
}

pub fn create(config: &Config) -> ReconResult<Arc<dyn Tool>> {
    Ok(Arc::new(CloudEnumTool::new(config)?))
}
