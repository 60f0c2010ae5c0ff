//! Built-in reconnaissance tools and the ordered catalog they register from

mod cloud_enum;
mod corporate_site;
mod crt_sh;
mod holehe;
mod hunter;
mod sherlock;
mod sublist3r;
mod urlscan;
mod wayback;

use url::Url;

use crate::config::Config;
use crate::core::CatalogEntry;
use crate::error::{ReconError, ReconResult};
use crate::utils::HttpClient;

pub use cloud_enum::CloudEnumTool;
pub use corporate_site::CorporateSiteTool;
pub use crt_sh::CrtShTool;
pub use holehe::HoleheTool;
pub use hunter::HunterTool;
pub use sherlock::SherlockTool;
pub use sublist3r::Sublist3rTool;
pub use urlscan::UrlscanTool;
pub use wayback::WaybackTool;

/// The fixed catalog, in registration order
pub fn default_catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::new("crt_sh", crt_sh::create),
        CatalogEntry::new("urlscan", urlscan::create),
        CatalogEntry::new("wayback", wayback::create),
        CatalogEntry::new("cloud_enum", cloud_enum::create),
        CatalogEntry::new("corporate_site", corporate_site::create),
        CatalogEntry::new("hunter", hunter::create),
        CatalogEntry::new("sublist3r", sublist3r::create),
        CatalogEntry::new("sherlock", sherlock::create),
        CatalogEntry::new("holehe", holehe::create),
    ]
}

fn http_client(config: &Config, timeout_secs: u64) -> ReconResult<HttpClient> {
    Ok(HttpClient::new(Some(config.global.user_agent.clone()), Some(timeout_secs))?)
}

/// Build a URL with properly encoded query parameters
fn endpoint(base: &str, params: &[(&str, &str)]) -> ReconResult<String> {
    Url::parse_with_params(base, params)
        .map(String::from)
        .map_err(|e| ReconError::InvalidInput(format!("Invalid URL {}: {}", base, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ToolCategory, ToolRegistry};

    #[test]
    fn test_catalog_without_hunter_key() {
        let registry = ToolRegistry::from_catalog(&Config::default(), default_catalog());

        assert_eq!(
            registry.list(),
            vec!["crt_sh", "urlscan", "wayback", "cloud_enum", "corporate_site", "sublist3r"]
        );
        assert_eq!(registry.category_of("cloud_enum"), Some(ToolCategory::Cloud));
    }

    #[test]
    fn test_catalog_with_hunter_key() {
        let mut config = Config::default();
        config.api_keys.insert("hunter".to_string(), "secret".to_string());

        let registry = ToolRegistry::from_catalog(&config, default_catalog());

        assert_eq!(registry.len(), 9);
        let info = registry.info("hunter").unwrap();
        assert!(info.requires_auth);
        assert_eq!(info.category, ToolCategory::Email);
    }

    #[test]
    fn test_endpoint_encodes_query() {
        let url = endpoint("https://crt.sh/", &[("q", "%.example.com"), ("output", "json")]).unwrap();
        assert_eq!(url, "https://crt.sh/?q=%25.example.com&output=json");
    }
}
