use reqwest::Proxy;

use crate::FollowerError;

/// Which requests a proxy applies to
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum ProxyType {
    /// Plain HTTP origins only
    Http,
    /// HTTPS origins only
    Https,
    /// SOCKS5 for every request
    Socks5,
    /// Every request, whatever the scheme
    All,
}

impl std::str::FromStr for ProxyType {
    type Err = FollowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ProxyType::Http),
            "https" => Ok(ProxyType::Https),
            "socks5" => Ok(ProxyType::Socks5),
            "all" => Ok(ProxyType::All),
            other => Err(FollowerError::ConfigError(format!(
                "Unknown proxy type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Proxy used for playlist and segment requests
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

/// Build a reqwest [`Proxy`] from a [`ProxyConfig`].
pub fn build_proxy_from_config(config: &ProxyConfig) -> Result<Proxy, FollowerError> {
    let proxy_url = &config.url;
    let invalid = |kind: &str, e: reqwest::Error| {
        FollowerError::ConfigError(format!("Invalid {kind} proxy URL {proxy_url}: {e}"))
    };

    let mut proxy = match config.proxy_type {
        ProxyType::Http => Proxy::http(proxy_url).map_err(|e| invalid("HTTP", e))?,
        ProxyType::Https => Proxy::https(proxy_url).map_err(|e| invalid("HTTPS", e))?,
        ProxyType::Socks5 => {
            let url = if proxy_url.starts_with("socks5://") {
                proxy_url.to_string()
            } else {
                format!("socks5://{proxy_url}")
            };
            Proxy::all(&url).map_err(|e| invalid("SOCKS5", e))?
        }
        ProxyType::All => Proxy::all(proxy_url).map_err(|e| invalid("generic", e))?,
    };

    if let Some(auth) = &config.auth {
        proxy = proxy.basic_auth(&auth.username, &auth.password);
    }

    Ok(proxy)
}
