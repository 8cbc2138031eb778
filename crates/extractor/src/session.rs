use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use rustls::ClientConfig;
use rustls::crypto::aws_lc_rs;
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::debug;

pub const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// HTTP session shared by every component that talks to YouTube.
///
/// Carries a browser-like identity (user agent, Accept headers) and a
/// cookie store pre-seeded with the consent cookie so requests skip the
/// consent interstitial. TLS-verification bypass for constrained corporate
/// networks is an explicit opt-in, never a default.
#[derive(Debug, Clone)]
pub struct WebSession {
    client: Client,
    headers: HeaderMap,
    cookies: HashMap<String, String>,
}

impl WebSession {
    pub fn new(insecure_tls: bool) -> Result<Self, reqwest::Error> {
        let builder = Client::builder().timeout(Duration::from_secs(30));

        let builder = if insecure_tls {
            debug!("TLS certificate verification disabled by configuration");
            builder.danger_accept_invalid_certs(true)
        } else {
            let provider = Arc::new(aws_lc_rs::default_provider());
            let tls_config = ClientConfig::builder_with_provider(provider)
                .with_safe_default_protocol_versions()
                .expect("default TLS protocol versions")
                .with_platform_verifier()
                .expect("platform certificate verifier")
                .with_no_client_auth();
            builder.use_preconfigured_tls(tls_config)
        };

        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(DEFAULT_UA));
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        // Accept-Encoding is left to reqwest so it auto-decompresses.

        let mut cookies = HashMap::new();
        // Pre-consented session; avoids the "Before you continue" page.
        cookies.insert("CONSENT".to_owned(), "YES+cb".to_owned());

        Ok(Self {
            client: builder.build()?,
            headers,
            cookies,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn add_cookie<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.cookies.insert(name.into(), value.into());
    }

    fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let mut out = String::new();
        for (name, value) in &self.cookies {
            if !out.is_empty() {
                out.push_str("; ");
            }
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }
        Some(out)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Build a request carrying the session's identity headers and cookies.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut headers = self.headers.clone();

        if let Some(cookie_header) = self.cookie_header() {
            match HeaderValue::from_str(&cookie_header) {
                Ok(value) => {
                    headers.insert(reqwest::header::COOKIE, value);
                }
                Err(e) => {
                    debug!(error = %e, "Failed to build Cookie header; skipping");
                }
            }
        }

        self.client.request(method, url).headers(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_cookie_is_preset() {
        let session = WebSession::new(false).unwrap();
        let header = session.cookie_header().unwrap();
        assert!(header.contains("CONSENT=YES+cb"));
    }

    #[test]
    fn added_cookies_join_the_header() {
        let mut session = WebSession::new(false).unwrap();
        session.add_cookie("PREF", "hl=en");
        let header = session.cookie_header().unwrap();
        assert!(header.contains("CONSENT=YES+cb"));
        assert!(header.contains("PREF=hl=en"));
    }
}
