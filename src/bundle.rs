use std::time::Duration;

use futures::{StreamExt, stream};
use tokio::time::sleep;

use crate::error::UpstreamError;
use crate::model::{MatchData, PlayerBundle};
use crate::riot::RiotClient;

pub const MAX_MATCH_COUNT: usize = 100;
const PAGE_SIZE: usize = 100;
const PAGE_DELAY: Duration = Duration::from_secs(1);
/// Upper bound on simultaneous match-detail requests.
const DETAIL_CONCURRENCY: usize = 4;

pub fn clamp_match_count(requested: usize) -> usize {
    requested.clamp(1, MAX_MATCH_COUNT)
}

/// Resolves a riot-id into the consolidated player view: account, summoner
/// profile, ranked entries, and full details for the most recent matches.
///
/// Account, summoner and ranked lookups are fatal; partial account data is
/// meaningless. Match-detail fetches are best effort, so a failed match is
/// dropped from the bundle rather than failing the whole request.
pub async fn fetch_player_bundle(
    client: &RiotClient,
    game_name: &str,
    tag_line: &str,
    match_count: usize,
) -> Result<PlayerBundle, UpstreamError> {
    let count = clamp_match_count(match_count);

    let account = client.get_account_by_riot_id(game_name, tag_line).await?;
    let summoner = client.get_summoner_by_puuid(&account.puuid).await?;
    let ranks = client.get_league_entries(&summoner.id).await?;

    let match_ids = collect_match_ids(client, &account.puuid, count).await?;
    let recent_matches = fetch_match_details(client, &match_ids).await;

    Ok(PlayerBundle {
        account,
        summoner,
        ranks,
        recent_matches,
    })
}

/// Pages through the match-id endpoint until `count` ids are collected or a
/// short page signals the history is exhausted. Page requests are spaced by
/// a fixed delay to stay under the upstream burst budget.
pub async fn collect_match_ids(
    client: &RiotClient,
    puuid: &str,
    count: usize,
) -> Result<Vec<String>, UpstreamError> {
    let mut ids: Vec<String> = Vec::new();

    while ids.len() < count {
        let batch = (count - ids.len()).min(PAGE_SIZE);

        if !ids.is_empty() {
            sleep(PAGE_DELAY).await;
        }

        let page = client.get_match_ids(puuid, ids.len(), batch).await?;
        let exhausted = page.len() < batch;
        ids.extend(page);

        if exhausted {
            break;
        }
    }

    ids.truncate(count);
    Ok(ids)
}

/// Fetches match details through a bounded pool, preserving the upstream id
/// order (most recent first). Individual failures are logged and dropped.
pub async fn fetch_match_details(client: &RiotClient, match_ids: &[String]) -> Vec<MatchData> {
    stream::iter(match_ids.to_vec())
        .map(|match_id| async move {
            match client.get_match(&match_id).await {
                Ok(detail) => Some(detail),
                Err(err) => {
                    tracing::warn!(%match_id, "dropping match detail: {err}");
                    None
                }
            }
        })
        .buffered(DETAIL_CONCURRENCY)
        .filter_map(|detail| async move { detail })
        .collect()
        .await
}
