use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::UpstreamError;

/// Data Dragon dictionaries are wrapped in a `data` envelope keyed by id.
#[derive(Debug, Deserialize)]
struct DdragonDict<T> {
    data: BTreeMap<String, T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawItem {
    pub name: String,
    pub description: String,
    pub gold: ItemGold,
    pub stats: BTreeMap<String, f64>,
    pub tags: Vec<String>,
    pub from: Vec<String>,
    pub into: Vec<String>,
    pub maps: BTreeMap<String, bool>,
    pub required_ally: Option<String>,
    pub required_champion: Option<String>,
    pub hide_from_all: bool,
    pub in_store: Option<bool>,
    pub consumed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemGold {
    pub base: i64,
    pub total: i64,
    pub sell: i64,
    pub purchasable: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub image: String,
    pub stats: BTreeMap<String, f64>,
    pub tags: Vec<String>,
    pub from: Vec<String>,
    pub into: Vec<String>,
    pub gold: ItemGold,
    pub rarity: Rarity,
    pub consumed: bool,
    pub in_store: bool,
    pub required_champion: Option<String>,
    pub special_item: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Epic,
    Legendary,
    Mythic,
}

/// Display-only classification inferred from price and recipe depth; the
/// upstream has no rarity field. First rule that matches wins, ties fall
/// through to common.
#[derive(Debug, Clone)]
pub struct RarityPolicy {
    pub legendary_components: usize,
    pub legendary_price: i64,
    pub epic_price: i64,
}

impl Default for RarityPolicy {
    fn default() -> Self {
        Self {
            legendary_components: 2,
            legendary_price: 3000,
            epic_price: 1000,
        }
    }
}

impl RarityPolicy {
    pub fn classify(&self, item: &RawItem) -> Rarity {
        if item.description.contains("Mythic") {
            Rarity::Mythic
        } else if item.from.len() >= self.legendary_components
            || item.gold.total >= self.legendary_price
        {
            Rarity::Legendary
        } else if item.from.len() == 1 || item.gold.total >= self.epic_price {
            Rarity::Epic
        } else {
            Rarity::Common
        }
    }
}

/// Keep only entries a player can actually buy on the standard 5v5 map.
fn is_displayable(item: &RawItem) -> bool {
    item.gold.purchasable
        && item.maps.get("11").copied().unwrap_or(false)
        && item.gold.total > 0
        && item.required_ally.is_none()
        && !item.hide_from_all
        && item.in_store != Some(false)
}

const STAT_DISPLAY_NAMES: &[(&str, &str)] = &[
    ("FlatPhysicalDamageMod", "Attack Damage"),
    ("FlatMagicDamageMod", "Ability Power"),
    ("FlatArmorMod", "Armor"),
    ("FlatSpellBlockMod", "Magic Resist"),
    ("FlatHPPoolMod", "Health"),
    ("FlatMPPoolMod", "Mana"),
    ("PercentAttackSpeedMod", "Attack Speed"),
    ("FlatCritChanceMod", "Critical Strike"),
    ("PercentMovementSpeedMod", "Movement Speed"),
    ("FlatHPRegenMod", "Health Regen"),
    ("FlatMPRegenMod", "Mana Regen"),
    ("PercentLifeStealMod", "Life Steal"),
    ("AbilityHaste", "Ability Haste"),
];

fn display_stat_name(key: &str) -> &str {
    STAT_DISPLAY_NAMES
        .iter()
        .find(|(internal, _)| *internal == key)
        .map(|(_, display)| *display)
        .unwrap_or(key)
}

/// Renames internal stat keys to display labels, converts percent-typed
/// values to whole percentages, and drops zero-valued stats.
fn process_item_stats(stats: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    stats
        .iter()
        .filter(|(_, value)| **value != 0.0)
        .map(|(key, value)| {
            let converted = if key.contains("Percent") {
                (value * 100.0).round()
            } else {
                *value
            };
            (display_stat_name(key).to_string(), converted)
        })
        .collect()
}

/// Strips `<br>` and other HTML tags from upstream description markup.
fn strip_markup(raw: &str) -> String {
    let spaced = raw.replace("<br>", " ");
    let mut out = String::with_capacity(spaced.len());
    let mut in_tag = false;
    for ch in spaced.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ")
}

/// Filters, maps and classifies a raw item dictionary. Repeated ids
/// deduplicate last-seen-wins, keeping the first-seen position.
pub fn process_items<I>(entries: I, image_base: &str, policy: &RarityPolicy) -> Vec<Item>
where
    I: IntoIterator<Item = (String, RawItem)>,
{
    let mut items: Vec<Item> = Vec::new();
    let mut index_by_id: HashMap<String, usize> = HashMap::new();

    for (id, raw) in entries {
        if !is_displayable(&raw) {
            continue;
        }

        let item = Item {
            image: format!("{}/img/item/{}.png", image_base, id),
            name: raw.name.clone(),
            description: strip_markup(&raw.description),
            price: raw.gold.total,
            stats: process_item_stats(&raw.stats),
            tags: raw.tags.clone(),
            from: raw.from.clone(),
            into: raw.into.clone(),
            rarity: policy.classify(&raw),
            consumed: raw.consumed,
            in_store: raw.in_store != Some(false),
            required_champion: raw.required_champion.clone(),
            special_item: raw.required_ally.is_some() || raw.required_champion.is_some(),
            gold: raw.gold,
            id: id.clone(),
        };

        match index_by_id.get(&id) {
            Some(&existing) => items[existing] = item,
            None => {
                index_by_id.insert(id, items.len());
                items.push(item);
            }
        }
    }

    items
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawChampion {
    pub id: String,
    pub name: String,
    pub title: String,
    pub tags: Vec<String>,
    pub info: ChampionInfo,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChampionInfo {
    pub attack: i64,
    pub defense: i64,
    pub magic: i64,
    pub difficulty: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Champion {
    pub id: String,
    pub name: String,
    pub title: String,
    pub tags: Vec<String>,
    pub info: ChampionInfo,
    pub image: String,
}

pub fn process_champions<I>(entries: I, image_base: &str) -> Vec<Champion>
where
    I: IntoIterator<Item = (String, RawChampion)>,
{
    entries
        .into_iter()
        .map(|(id, raw)| Champion {
            image: format!("{}/img/champion/{}.png", image_base, id),
            id: raw.id,
            name: raw.name,
            title: raw.title,
            tags: raw.tags,
            info: raw.info,
        })
        .collect()
}

struct CacheSlot<T> {
    fetched_at: Instant,
    value: Arc<Vec<T>>,
}

/// Versioned Data Dragon catalog cache. Owned by the server state instead of
/// living as a module singleton; entries expire after the configured TTL and
/// are refetched on the next request.
pub struct CatalogCache {
    http: Client,
    base_url: String,
    ttl: Duration,
    policy: RarityPolicy,
    items: Mutex<Option<CacheSlot<Item>>>,
    champions: Mutex<Option<CacheSlot<Champion>>>,
}

impl CatalogCache {
    pub fn new(
        base_url: &str,
        ttl: Duration,
        policy: RarityPolicy,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build catalog HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            ttl,
            policy,
            items: Mutex::new(None),
            champions: Mutex::new(None),
        })
    }

    pub async fn items(&self) -> Result<Arc<Vec<Item>>, UpstreamError> {
        let mut slot = self.items.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.value.clone());
            }
        }

        let raw: DdragonDict<RawItem> = self.fetch_json("data/en_US/item.json").await?;
        let value = Arc::new(process_items(raw.data, &self.base_url, &self.policy));
        tracing::info!(count = value.len(), "refreshed item catalog");
        *slot = Some(CacheSlot {
            fetched_at: Instant::now(),
            value: value.clone(),
        });
        Ok(value)
    }

    pub async fn champions(&self) -> Result<Arc<Vec<Champion>>, UpstreamError> {
        let mut slot = self.champions.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.value.clone());
            }
        }

        let raw: DdragonDict<RawChampion> = self.fetch_json("data/en_US/champion.json").await?;
        let value = Arc::new(process_champions(raw.data, &self.base_url));
        tracing::info!(count = value.len(), "refreshed champion catalog");
        *slot = Some(CacheSlot {
            fetched_at: Instant::now(),
            value: value.clone(),
        });
        Ok(value)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: format!("failed to fetch {}", path),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
