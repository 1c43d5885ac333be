use std::env;
use std::time::Duration;

use anyhow::Context;

const DDRAGON_HOST: &str = "https://ddragon.leagueoflegends.com/cdn";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub riot_base: String,
    pub ddragon_base: String,
    pub request_timeout: Duration,
    pub catalog_ttl: Duration,
}

impl Config {
    /// The API key stays server-side; it is read from the environment and
    /// never appears in responses or logs.
    pub fn from_env(
        region: &str,
        ddragon_version: &str,
        catalog_ttl_secs: u64,
    ) -> anyhow::Result<Self> {
        let api_key = env::var("RIOT_API_KEY").context("RIOT_API_KEY is not set")?;

        Ok(Self {
            api_key,
            riot_base: format!("https://{}.api.riotgames.com", region),
            ddragon_base: format!("{}/{}", DDRAGON_HOST, ddragon_version),
            request_timeout: Duration::from_secs(10),
            catalog_ttl: Duration::from_secs(catalog_ttl_secs),
        })
    }
}
