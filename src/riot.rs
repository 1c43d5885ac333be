use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::UpstreamError;
use crate::model::{Account, MatchData, RankedEntry, Summoner};

const DEFAULT_MAX_REQS_PER_2MIN: usize = 80;
const DEFAULT_MAX_REQS_PER_SEC: usize = 20;
const MAX_ATTEMPTS: usize = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(2);
const BACKOFF_CAP: Duration = Duration::from_secs(30);

fn build_headers(api_key: &str) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        "X-Riot-Token",
        HeaderValue::from_str(api_key).context("API key is not a valid header value")?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// Client for the Riot REST API. Carries the auth header on every call and
/// shares one sliding-window rate limiter across all endpoints.
pub struct RiotClient {
    client: Client,
    base_url: String,
    limiter: Mutex<RateLimiter>,
}

impl RiotClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .default_headers(build_headers(api_key)?)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: Mutex::new(RateLimiter::new(
                DEFAULT_MAX_REQS_PER_2MIN,
                DEFAULT_MAX_REQS_PER_SEC,
            )),
        })
    }

    pub async fn get_account_by_riot_id(
        &self,
        game_name: &str,
        tag_line: &str,
    ) -> Result<Account, UpstreamError> {
        let url = format!(
            "{}/riot/account/v1/accounts/by-riot-id/{}/{}",
            self.base_url, game_name, tag_line
        );

        self.get_json(&url).await
    }

    pub async fn get_summoner_by_puuid(&self, puuid: &str) -> Result<Summoner, UpstreamError> {
        let url = format!(
            "{}/lol/summoner/v4/summoners/by-puuid/{}",
            self.base_url, puuid
        );

        self.get_json(&url).await
    }

    pub async fn get_league_entries(
        &self,
        summoner_id: &str,
    ) -> Result<Vec<RankedEntry>, UpstreamError> {
        let url = format!(
            "{}/lol/league/v4/entries/by-summoner/{}",
            self.base_url, summoner_id
        );

        self.get_json(&url).await
    }

    pub async fn get_match_ids(
        &self,
        puuid: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<String>, UpstreamError> {
        let url = format!(
            "{}/lol/match/v5/matches/by-puuid/{}/ids?start={}&count={}",
            self.base_url, puuid, start, count
        );

        self.get_json(&url).await
    }

    pub async fn get_match(&self, match_id: &str) -> Result<MatchData, UpstreamError> {
        let url = format!("{}/lol/match/v5/matches/{}", self.base_url, match_id);

        self.get_json(&url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, UpstreamError> {
        let response = self.request_with_retry(url).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn request_with_retry(&self, url: &str) -> Result<Response, UpstreamError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            self.wait_rate_limit().await;

            let response = self.client.get(url).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= MAX_ATTEMPTS {
                    return Err(UpstreamError::RateLimited { attempts: attempt });
                }

                let delay = backoff_delay(attempt, parse_retry_after(&response));
                tracing::warn!(url, attempt, ?delay, "upstream 429, backing off");
                sleep(delay).await;
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                return Err(UpstreamError::NotFound(url.to_string()));
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(UpstreamError::Status {
                    status: status.as_u16(),
                    message: upstream_message(&body),
                });
            }

            return Ok(response);
        }
    }

    async fn wait_rate_limit(&self) {
        loop {
            let delay = {
                let mut limiter = self.limiter.lock().await;
                match limiter.next_delay(Instant::now()) {
                    None => {
                        limiter.record(Instant::now());
                        return;
                    }
                    Some(delay) => delay,
                }
            };
            sleep(delay).await;
        }
    }
}

/// Sliding-window limiter over the two Riot budgets (per second and per two
/// minutes). Callers ask for the next permissible delay against a supplied
/// clock, then record the request once admitted.
pub struct RateLimiter {
    max_reqs_per_2min: usize,
    max_reqs_per_sec: usize,
    timestamps_2min: VecDeque<Instant>,
    timestamps_1s: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_reqs_per_2min: usize, max_reqs_per_sec: usize) -> Self {
        Self {
            max_reqs_per_2min,
            max_reqs_per_sec,
            timestamps_2min: VecDeque::new(),
            timestamps_1s: VecDeque::new(),
        }
    }

    pub fn next_delay(&mut self, now: Instant) -> Option<Duration> {
        self.prune(now);

        if self.timestamps_1s.len() >= self.max_reqs_per_sec {
            if let Some(oldest) = self.timestamps_1s.front() {
                let elapsed = now.duration_since(*oldest);
                if elapsed < Duration::from_secs(1) {
                    return Some(Duration::from_secs(1) - elapsed);
                }
            }
        }

        if self.timestamps_2min.len() >= self.max_reqs_per_2min {
            if let Some(oldest) = self.timestamps_2min.front() {
                let elapsed = now.duration_since(*oldest);
                if elapsed < Duration::from_secs(120) {
                    return Some(Duration::from_secs(120) - elapsed);
                }
            }
        }

        None
    }

    pub fn record(&mut self, now: Instant) {
        self.timestamps_1s.push_back(now);
        self.timestamps_2min.push_back(now);
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.timestamps_1s.front() {
            if now.duration_since(*front) > Duration::from_secs(1) {
                self.timestamps_1s.pop_front();
            } else {
                break;
            }
        }

        while let Some(front) = self.timestamps_2min.front() {
            if now.duration_since(*front) > Duration::from_secs(120) {
                self.timestamps_2min.pop_front();
            } else {
                break;
            }
        }
    }
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// The upstream's Retry-After wins when present; otherwise exponential
/// backoff from the base, capped.
fn backoff_delay(attempt: usize, retry_after: Option<Duration>) -> Duration {
    retry_after
        .unwrap_or_else(|| BACKOFF_BASE * (1u32 << (attempt.saturating_sub(1)).min(4)))
        .min(BACKOFF_CAP)
}

/// Riot error bodies look like {"status": {"message": ..., "status_code": ...}}.
fn upstream_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value
            .get("status")
            .and_then(|status| status.get("message"))
            .and_then(|message| message.as_str())
        {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "upstream error".to_string()
    } else {
        trimmed.to_string()
    }
}
