use serde::Serialize;

use crate::model::{MatchData, Participant};

/// Per-player aggregates over a set of matches, as shown on the profile view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAggregate {
    pub games: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub avg_kda: f64,
    pub avg_cs: f64,
    pub avg_gold_k: f64,
    pub total_kills: i64,
    pub total_deaths: i64,
    pub total_assists: i64,
    pub champions_played: Vec<String>,
}

/// Pure function of its inputs; calling it twice on the same match set
/// yields identical output. Matches where the player is absent are skipped
/// and do not count toward the averages.
pub fn compute_player_aggregate(matches: &[MatchData], puuid: &str) -> PlayerAggregate {
    let mut games = 0usize;
    let mut wins = 0usize;
    let mut total_kills = 0i64;
    let mut total_deaths = 0i64;
    let mut total_assists = 0i64;
    let mut total_cs = 0i64;
    let mut total_gold = 0i64;
    let mut champions_played: Vec<String> = Vec::new();

    for m in matches {
        let Some(player) = find_participant(m, puuid) else {
            continue;
        };

        games += 1;
        if player.win {
            wins += 1;
        }
        total_kills += player.kills;
        total_deaths += player.deaths;
        total_assists += player.assists;
        total_cs += player.total_cs();
        total_gold += player.gold_earned;
        if !champions_played.contains(&player.champion_name) {
            champions_played.push(player.champion_name.clone());
        }
    }

    let win_rate = if games == 0 {
        0.0
    } else {
        round1(wins as f64 / games as f64 * 100.0)
    };
    let avg_cs = if games == 0 {
        0.0
    } else {
        round1(total_cs as f64 / games as f64)
    };
    let avg_gold_k = if games == 0 {
        0.0
    } else {
        round1(total_gold as f64 / games as f64 / 1000.0)
    };

    PlayerAggregate {
        games,
        wins,
        win_rate,
        avg_kda: round2(kda(total_kills, total_deaths, total_assists)),
        avg_cs,
        avg_gold_k,
        total_kills,
        total_deaths,
        total_assists,
        champions_played,
    }
}

pub fn find_participant<'a>(m: &'a MatchData, puuid: &str) -> Option<&'a Participant> {
    m.info.participants.iter().find(|p| p.puuid == puuid)
}

/// (Kills + Assists) / max(Deaths, 1). Zero deaths is legitimate.
pub fn kda(kills: i64, deaths: i64, assists: i64) -> f64 {
    (kills + assists) as f64 / deaths.max(1) as f64
}

/// Game duration is in seconds.
pub fn cs_per_minute(cs: i64, game_duration_secs: i64) -> f64 {
    if game_duration_secs <= 0 {
        return 0.0;
    }
    round1(cs as f64 / (game_duration_secs as f64 / 60.0))
}

/// Objective totals for one side of a match, for the match-detail view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamObjectiveTotals {
    pub team_id: i64,
    pub win: bool,
    pub champion_kills: i64,
    pub towers: i64,
    pub dragons: i64,
    pub barons: i64,
    pub heralds: i64,
    pub inhibitors: i64,
}

pub fn team_objective_totals(m: &MatchData) -> Vec<TeamObjectiveTotals> {
    m.info
        .teams
        .iter()
        .map(|team| TeamObjectiveTotals {
            team_id: team.team_id,
            win: team.win,
            champion_kills: team.objectives.champion.kills,
            towers: team.objectives.tower.kills,
            dragons: team.objectives.dragon.kills,
            barons: team.objectives.baron.kills,
            heralds: team.objectives.rift_herald.kills,
            inhibitors: team.objectives.inhibitor.kills,
        })
        .collect()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
