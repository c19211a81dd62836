use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use serde::de::DeserializeOwned;

use crate::error::FetchError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Headers stats.nba.com expects before it will answer a non-browser client.
pub const NBA_STATS_HEADERS: [(&str, &str); 8] = [
    ("Host", "stats.nba.com"),
    ("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:72.0) Gecko/20100101 Firefox/72.0"),
    ("Accept", "application/json, text/plain, */*"),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("Connection", "keep-alive"),
    ("Referer", "https://stats.nba.com/"),
    ("Pragma", "no-cache"),
    ("Cache-Control", "no-cache"),
];

pub const JSON_HEADERS: [(&str, &str); 1] = [("accept", "application/json")];

/// Blocking HTTP client that keeps at least `interval` between two requests.
pub struct PacedClient {
    agent: ureq::Agent,
    interval: Duration,
    headers: Vec<(&'static str, &'static str)>,
    last_call: Option<Instant>,
}

impl PacedClient {
    pub fn new(interval: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        PacedClient {
            agent,
            interval,
            headers: Vec::new(),
            last_call: None,
        }
    }

    pub fn with_headers(mut self, headers: &[(&'static str, &'static str)]) -> Self {
        self.headers.extend_from_slice(headers);
        self
    }

    fn wait_turn(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
    }

    pub fn get(&mut self, url: &str) -> Result<ureq::Response, FetchError> {
        self.wait_turn();
        debug!("GET {}", redact(url));
        let mut request = self.agent.get(url);
        for (name, value) in &self.headers {
            request = request.set(name, value);
        }
        let result = request.call();
        self.last_call = Some(Instant::now());
        match result {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(code, _)) => Err(status_error(url, code)),
            Err(ureq::Error::Transport(transport)) => Err(FetchError::Transport(transport.to_string())),
        }
    }

    pub fn get_text(&mut self, url: &str) -> Result<String, FetchError> {
        Ok(self.get(url)?.into_string()?)
    }

    pub fn get_json<T: DeserializeOwned>(&mut self, url: &str) -> Result<T, FetchError> {
        let body = self.get_text(url)?;
        Ok(serde_json::from_str(&body)?)
    }
}

pub fn status_error(url: &str, status: u16) -> FetchError {
    let url = redact(url);
    if status == 429 {
        FetchError::RateLimited { url }
    } else {
        FetchError::Status { url, status }
    }
}

/// Masks the `api_key` query value so keys never reach logs or errors.
pub fn redact(url: &str) -> String {
    match url.find("api_key=") {
        Some(pos) => {
            let value_start = pos + "api_key=".len();
            let value_end = url[value_start..]
                .find('&')
                .map(|i| value_start + i)
                .unwrap_or_else(|| url.len());
            format!("{}***{}", &url[..value_start], &url[value_end..])
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_requests_is_rate_limited() {
        assert!(status_error("https://x/y", 429).is_rate_limited());
        match status_error("https://x/y", 503) {
            FetchError::Status { status, .. } => assert_eq!(status, 503),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn api_keys_are_masked() {
        assert_eq!(
            redact("https://api.example.com/teams.json?api_key=secret"),
            "https://api.example.com/teams.json?api_key=***"
        );
        assert_eq!(
            redact("https://api.example.com/p.json?api_key=secret&lang=en"),
            "https://api.example.com/p.json?api_key=***&lang=en"
        );
        assert_eq!(redact("https://stats.nba.com/stats"), "https://stats.nba.com/stats");
    }

    #[test]
    fn rate_limit_error_carries_redacted_url() {
        let err = status_error("https://api.example.com/x?api_key=abc", 429);
        assert_eq!(err.to_string(), "rate limited by https://api.example.com/x?api_key=***");
    }
}
