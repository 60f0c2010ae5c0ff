use std::fmt;
use std::net::{IpAddr, SocketAddr};
use serde::{Serialize, Deserialize};
use ipnetwork::IpNetwork;
use url::Url;

/// Kind of identifier a reconnaissance run is aimed at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Domain,
    Ip,
    Email,
    Username,
}

impl TargetType {
    /// Classify a raw target string
    pub fn detect(target: &str) -> Self {
        let target = target.trim();

        if target.contains('@') {
            return TargetType::Email;
        }

        if target.parse::<IpAddr>().is_ok()
            || target.parse::<IpNetwork>().is_ok()
            || target.parse::<SocketAddr>().is_ok()
        {
            return TargetType::Ip;
        }

        if target.contains('.') {
            TargetType::Domain
        } else {
            TargetType::Username
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Domain => "domain",
            TargetType::Ip => "ip",
            TargetType::Email => "email",
            TargetType::Username => "username",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "domain" => Some(TargetType::Domain),
            "ip" => Some(TargetType::Ip),
            "email" => Some(TargetType::Email),
            "username" => Some(TargetType::Username),
            _ => None,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host part of a target, without scheme, credentials, port or path.
///
/// `https://www.example.com/about` -> `www.example.com`
pub fn domain_of(target: &str) -> String {
    let target = target.trim();

    let with_scheme = if target.contains("://") {
        target.to_string()
    } else {
        format!("http://{}", target)
    };

    if let Ok(url) = Url::parse(&with_scheme) {
        if let Some(host) = url.host_str() {
            return host.trim_end_matches('.').to_lowercase();
        }
    }

    target
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or(target)
        .to_lowercase()
}

/// Make a target safe to embed in identifiers and file names
pub fn sanitize(target: &str) -> String {
    let sanitized: String = target
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '@') { c } else { '_' })
        .collect();

    if sanitized.is_empty() {
        "target".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_target_type() {
        assert_eq!(TargetType::detect("example.com"), TargetType::Domain);
        assert_eq!(TargetType::detect("https://example.com/path"), TargetType::Domain);
        assert_eq!(TargetType::detect("admin@example.com"), TargetType::Email);
        assert_eq!(TargetType::detect("192.0.2.10"), TargetType::Ip);
        assert_eq!(TargetType::detect("10.0.0.0/24"), TargetType::Ip);
        assert_eq!(TargetType::detect("2001:db8::1"), TargetType::Ip);
        assert_eq!(TargetType::detect("192.0.2.10:8080"), TargetType::Ip);
        assert_eq!(TargetType::detect("johndoe"), TargetType::Username);
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("example.com"), "example.com");
        assert_eq!(domain_of("https://WWW.Example.com/about?x=1"), "www.example.com");
        assert_eq!(domain_of("http://example.com:8080"), "example.com");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("https://example.com/a"), "https___example.com_a");
        assert_eq!(sanitize("  "), "target");
    }

    #[test]
    fn test_target_type_round_trip() {
        for t in [TargetType::Domain, TargetType::Ip, TargetType::Email, TargetType::Username] {
            assert_eq!(TargetType::parse(t.as_str()), Some(t));
        }
    }
}
