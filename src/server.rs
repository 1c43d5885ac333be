use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::bundle;
use crate::catalog::{CatalogCache, Champion, Item};
use crate::error::ApiError;
use crate::model::{MatchData, PlayerBundle, RankedEntry, Summoner};
use crate::riot::RiotClient;
use crate::stats::{self, PlayerAggregate, TeamObjectiveTotals};

/// The SPA's default page size for match history.
const DEFAULT_MATCH_COUNT: usize = 5;

#[derive(Clone)]
pub struct AppState {
    pub riot: Arc<RiotClient>,
    pub catalog: Arc<CatalogCache>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/account/by-riot-id/:game_name/:tag_line",
            get(account_by_riot_id),
        )
        .route("/api/matches/by-puuid/:puuid", get(matches_by_puuid))
        .route("/api/matches/:match_id", get(match_detail))
        .route("/api/player/stats/:puuid", get(player_stats))
        .route("/api/catalog/items", get(catalog_items))
        .route("/api/catalog/champions", get(catalog_champions))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CountParams {
    count: Option<usize>,
}

async fn account_by_riot_id(
    State(state): State<AppState>,
    Path((game_name, tag_line)): Path<(String, String)>,
    Query(params): Query<CountParams>,
) -> Result<Json<PlayerBundle>, ApiError> {
    let count = params.count.unwrap_or(DEFAULT_MATCH_COUNT);
    let bundle = bundle::fetch_player_bundle(&state.riot, &game_name, &tag_line, count).await?;
    Ok(Json(bundle))
}

async fn matches_by_puuid(
    State(state): State<AppState>,
    Path(puuid): Path<String>,
    Query(params): Query<CountParams>,
) -> Result<Json<Vec<MatchData>>, ApiError> {
    let count = bundle::clamp_match_count(params.count.unwrap_or(DEFAULT_MATCH_COUNT));
    let match_ids = bundle::collect_match_ids(&state.riot, &puuid, count).await?;
    let matches = bundle::fetch_match_details(&state.riot, &match_ids).await;
    Ok(Json(matches))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchDetailResponse {
    #[serde(rename = "match")]
    match_data: MatchData,
    objectives: Vec<TeamObjectiveTotals>,
}

async fn match_detail(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
) -> Result<Json<MatchDetailResponse>, ApiError> {
    let match_data = state.riot.get_match(&match_id).await?;
    let objectives = stats::team_objective_totals(&match_data);
    Ok(Json(MatchDetailResponse {
        match_data,
        objectives,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayerStatsResponse {
    profile: Summoner,
    ranked: Vec<RankedEntry>,
    matches: Vec<MatchData>,
    aggregate: PlayerAggregate,
}

async fn player_stats(
    State(state): State<AppState>,
    Path(puuid): Path<String>,
) -> Result<Json<PlayerStatsResponse>, ApiError> {
    let profile = state.riot.get_summoner_by_puuid(&puuid).await?;
    let ranked = state.riot.get_league_entries(&profile.id).await?;
    let match_ids = bundle::collect_match_ids(&state.riot, &puuid, DEFAULT_MATCH_COUNT).await?;
    let matches = bundle::fetch_match_details(&state.riot, &match_ids).await;
    let aggregate = stats::compute_player_aggregate(&matches, &puuid);

    Ok(Json(PlayerStatsResponse {
        profile,
        ranked,
        matches,
        aggregate,
    }))
}

async fn catalog_items(State(state): State<AppState>) -> Result<Json<Vec<Item>>, ApiError> {
    let items = state.catalog.items().await?;
    Ok(Json(items.as_ref().clone()))
}

async fn catalog_champions(State(state): State<AppState>) -> Result<Json<Vec<Champion>>, ApiError> {
    let champions = state.catalog.champions().await?;
    Ok(Json(champions.as_ref().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::{IntoResponse, Response};
    use serde_json::{Value, json};
    use tower::util::ServiceExt;

    use crate::catalog::RarityPolicy;

    /// Per-endpoint request counters for the fake upstream.
    #[derive(Clone, Default)]
    struct Hits(Arc<Mutex<HashMap<&'static str, usize>>>);

    impl Hits {
        fn bump(&self, key: &'static str) {
            *self.0.lock().unwrap().entry(key).or_default() += 1;
        }

        fn count(&self, key: &'static str) -> usize {
            self.0.lock().unwrap().get(key).copied().unwrap_or(0)
        }
    }

    fn fake_match(match_id: &str, puuid: &str) -> Value {
        json!({
            "metadata": { "matchId": match_id, "participants": [puuid] },
            "info": {
                "gameCreation": 1_700_000_000_000i64,
                "gameDuration": 1800,
                "queueId": 420,
                "participants": [{
                    "puuid": puuid,
                    "championName": "Ahri",
                    "kills": 10,
                    "deaths": 2,
                    "assists": 5,
                    "totalMinionsKilled": 150,
                    "neutralMinionsKilled": 30,
                    "goldEarned": 12_000,
                    "win": true,
                    "teamId": 100
                }],
                "teams": [
                    {
                        "teamId": 100,
                        "win": true,
                        "objectives": {
                            "champion": { "first": true, "kills": 20 },
                            "tower": { "first": false, "kills": 7 }
                        }
                    },
                    { "teamId": 200, "win": false, "objectives": {} }
                ]
            }
        })
    }

    async fn up_account(
        State(hits): State<Hits>,
        Path((game_name, tag_line)): Path<(String, String)>,
    ) -> Response {
        hits.bump("account");
        if game_name == "Unknown" {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "status": { "message": "Data not found", "status_code": 404 } })),
            )
                .into_response();
        }
        Json(json!({ "puuid": "PUUID-1", "gameName": game_name, "tagLine": tag_line }))
            .into_response()
    }

    async fn up_summoner(State(hits): State<Hits>, Path(puuid): Path<String>) -> Response {
        hits.bump("summoner");
        Json(json!({
            "id": "SUMM-1",
            "puuid": puuid,
            "profileIconId": 4321,
            "summonerLevel": 512
        }))
        .into_response()
    }

    async fn up_league(State(hits): State<Hits>, Path(_id): Path<String>) -> Response {
        hits.bump("league");
        Json(json!([{
            "queueType": "RANKED_SOLO_5x5",
            "tier": "CHALLENGER",
            "rank": "I",
            "leaguePoints": 1021,
            "wins": 300,
            "losses": 150
        }]))
        .into_response()
    }

    #[derive(Debug, Deserialize)]
    struct IdsQuery {
        #[serde(default)]
        start: usize,
        #[serde(default)]
        count: usize,
    }

    async fn up_match_ids(State(hits): State<Hits>, Query(params): Query<IdsQuery>) -> Response {
        hits.bump("ids");
        let available = ["EUW1_1", "EUW1_2", "EUW1_3", "EUW1_4", "EUW1_5"];
        let page: Vec<&str> = available
            .iter()
            .skip(params.start)
            .take(params.count)
            .copied()
            .collect();
        Json(json!(page)).into_response()
    }

    async fn up_match(State(hits): State<Hits>, Path(match_id): Path<String>) -> Response {
        hits.bump("match");
        if match_id == "EUW1_3" {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": { "message": "game data not ready", "status_code": 500 } })),
            )
                .into_response();
        }
        Json(fake_match(&match_id, "PUUID-1")).into_response()
    }

    async fn up_items(State(hits): State<Hits>) -> Response {
        hits.bump("items");
        Json(json!({
            "data": {
                "1001": {
                    "name": "Boots",
                    "description": "<mainText>Move faster<br>a bit</mainText>",
                    "gold": { "base": 300, "total": 300, "sell": 210, "purchasable": true },
                    "maps": { "11": true },
                    "stats": { "PercentMovementSpeedMod": 0.25 },
                    "tags": ["Boots"]
                },
                "9999": {
                    "name": "Hidden Blade",
                    "description": "not for sale",
                    "gold": { "base": 0, "total": 2000, "sell": 0, "purchasable": false },
                    "maps": { "11": true },
                    "stats": {},
                    "tags": []
                }
            }
        }))
        .into_response()
    }

    async fn up_champions(State(hits): State<Hits>) -> Response {
        hits.bump("champions");
        Json(json!({
            "data": {
                "Ahri": {
                    "id": "Ahri",
                    "name": "Ahri",
                    "title": "the Nine-Tailed Fox",
                    "tags": ["Mage", "Assassin"],
                    "info": { "attack": 3, "defense": 4, "magic": 8, "difficulty": 5 }
                }
            }
        }))
        .into_response()
    }

    async fn spawn_upstream(hits: Hits) -> String {
        let router = Router::new()
            .route(
                "/riot/account/v1/accounts/by-riot-id/:game_name/:tag_line",
                get(up_account),
            )
            .route("/lol/summoner/v4/summoners/by-puuid/:puuid", get(up_summoner))
            .route("/lol/league/v4/entries/by-summoner/:id", get(up_league))
            .route("/lol/match/v5/matches/by-puuid/:puuid/ids", get(up_match_ids))
            .route("/lol/match/v5/matches/:match_id", get(up_match))
            .route("/data/en_US/item.json", get(up_items))
            .route("/data/en_US/champion.json", get(up_champions))
            .with_state(hits);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn test_state(base_url: &str) -> AppState {
        AppState {
            riot: Arc::new(
                RiotClient::new("test-key", base_url, Duration::from_secs(5)).unwrap(),
            ),
            catalog: Arc::new(
                CatalogCache::new(
                    base_url,
                    Duration::from_secs(3600),
                    RarityPolicy::default(),
                    Duration::from_secs(5),
                )
                .unwrap(),
            ),
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn bundle_tolerates_a_failed_match_detail() {
        let hits = Hits::default();
        let base = spawn_upstream(hits.clone()).await;
        let state = test_state(&base);

        let app = build_router(state);
        let (status, json) = get_json(app, "/api/account/by-riot-id/Faker/KR1?count=5").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["account"]["puuid"], "PUUID-1");
        assert_eq!(json["summoner"]["id"], "SUMM-1");
        assert_eq!(json["ranks"].as_array().unwrap().len(), 1);

        // EUW1_3 failed upstream and is dropped, not fatal.
        let matches = json["recentMatches"].as_array().unwrap();
        assert_eq!(matches.len(), 4);
        let ids: Vec<&str> = matches
            .iter()
            .map(|m| m["metadata"]["matchId"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["EUW1_1", "EUW1_2", "EUW1_4", "EUW1_5"]);

        assert_eq!(hits.count("account"), 1);
        assert_eq!(hits.count("summoner"), 1);
        assert_eq!(hits.count("league"), 1);
        assert!(hits.count("ids") >= 1);
        assert_eq!(hits.count("match"), 5);
    }

    #[tokio::test]
    async fn unknown_riot_id_surfaces_as_500_with_error_body() {
        let hits = Hits::default();
        let base = spawn_upstream(hits.clone()).await;
        let state = test_state(&base);

        let app = build_router(state);
        let (status, json) = get_json(app, "/api/account/by-riot-id/Unknown/XX").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("not found"));
        // The fatal account lookup stops the pipeline before any other call.
        assert_eq!(hits.count("summoner"), 0);
        assert_eq!(hits.count("ids"), 0);
    }

    #[tokio::test]
    async fn match_history_count_is_clamped_and_exhaustion_terminates() {
        let hits = Hits::default();
        let base = spawn_upstream(hits.clone()).await;
        let state = test_state(&base);

        // Zero clamps up to one match.
        let (status, json) =
            get_json(build_router(state.clone()), "/api/matches/by-puuid/PUUID-1?count=0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 1);

        // Asking for more than the player has returns what exists; the
        // paging loop stops on the short page.
        let pages_before = hits.count("ids");
        let (status, json) =
            get_json(build_router(state), "/api/matches/by-puuid/PUUID-1?count=50").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 4);
        assert_eq!(hits.count("ids") - pages_before, 1);
    }

    #[tokio::test]
    async fn player_stats_includes_profile_ranked_and_aggregate() {
        let hits = Hits::default();
        let base = spawn_upstream(hits.clone()).await;
        let state = test_state(&base);

        let app = build_router(state);
        let (status, json) = get_json(app, "/api/player/stats/PUUID-1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["profile"]["id"], "SUMM-1");
        assert_eq!(json["ranked"][0]["tier"], "CHALLENGER");
        assert_eq!(json["matches"].as_array().unwrap().len(), 4);
        assert_eq!(json["aggregate"]["games"], 4);
        assert_eq!(json["aggregate"]["winRate"], 100.0);
        // (40 + 20) / 8
        assert_eq!(json["aggregate"]["avgKda"], 7.5);
    }

    #[tokio::test]
    async fn match_detail_carries_team_objective_totals() {
        let hits = Hits::default();
        let base = spawn_upstream(hits.clone()).await;
        let state = test_state(&base);

        let app = build_router(state);
        let (status, json) = get_json(app, "/api/matches/EUW1_1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["match"]["metadata"]["matchId"], "EUW1_1");
        let objectives = json["objectives"].as_array().unwrap();
        assert_eq!(objectives.len(), 2);
        assert_eq!(objectives[0]["teamId"], 100);
        assert_eq!(objectives[0]["championKills"], 20);
        assert_eq!(objectives[0]["towers"], 7);
    }

    #[tokio::test]
    async fn catalog_items_are_filtered_and_served_from_cache() {
        let hits = Hits::default();
        let base = spawn_upstream(hits.clone()).await;
        let state = test_state(&base);

        let (status, json) = get_json(build_router(state.clone()), "/api/catalog/items").await;
        assert_eq!(status, StatusCode::OK);
        let items = json.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "Boots");
        assert_eq!(items[0]["rarity"], "common");
        assert_eq!(items[0]["stats"]["Movement Speed"], 25.0);

        // Second request inside the TTL does not touch the CDN again.
        let (status, _) = get_json(build_router(state), "/api/catalog/items").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(hits.count("items"), 1);
    }

    #[tokio::test]
    async fn catalog_champions_are_processed() {
        let hits = Hits::default();
        let base = spawn_upstream(hits.clone()).await;
        let state = test_state(&base);

        let (status, json) = get_json(build_router(state), "/api/catalog/champions").await;
        assert_eq!(status, StatusCode::OK);
        let champs = json.as_array().unwrap();
        assert_eq!(champs.len(), 1);
        assert_eq!(champs[0]["id"], "Ahri");
        assert_eq!(champs[0]["info"]["magic"], 8);
        assert!(champs[0]["image"].as_str().unwrap().ends_with("/img/champion/Ahri.png"));
    }
}
