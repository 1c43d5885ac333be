use serde::{Deserialize, Serialize};

/// Riot ID resolution result. The puuid is the stable cross-endpoint player
/// key; it never changes within a region.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summoner {
    pub id: String,
    pub puuid: String,
    pub profile_icon_id: i64,
    pub summoner_level: i64,
}

/// One entry per queue type. Unranked players have none.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RankedEntry {
    pub queue_type: String,
    pub tier: String,
    pub rank: String,
    pub league_points: i64,
    pub wins: i64,
    pub losses: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchData {
    pub metadata: MatchMetadata,
    pub info: MatchInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchMetadata {
    pub match_id: String,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchInfo {
    pub game_creation: i64,
    /// Seconds.
    pub game_duration: i64,
    pub queue_id: i64,
    pub participants: Vec<Participant>,
    pub teams: Vec<Team>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Participant {
    pub puuid: String,
    pub champion_id: i64,
    pub champion_name: String,
    pub team_position: String,
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
    pub item0: i64,
    pub item1: i64,
    pub item2: i64,
    pub item3: i64,
    pub item4: i64,
    pub item5: i64,
    pub item6: i64,
    pub total_damage_dealt_to_champions: i64,
    pub total_minions_killed: i64,
    pub neutral_minions_killed: i64,
    pub gold_earned: i64,
    pub vision_score: i64,
    pub win: bool,
    pub team_id: i64,
    pub summoner1_id: i64,
    pub summoner2_id: i64,
}

impl Participant {
    /// Creep score: lane minions plus neutral monsters.
    pub fn total_cs(&self) -> i64 {
        self.total_minions_killed + self.neutral_minions_killed
    }

    /// Slot 0 means empty.
    pub fn items(&self) -> [i64; 7] {
        [
            self.item0, self.item1, self.item2, self.item3, self.item4, self.item5, self.item6,
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Team {
    pub team_id: i64,
    pub win: bool,
    pub objectives: Objectives,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Objectives {
    pub baron: ObjectiveCounter,
    pub champion: ObjectiveCounter,
    pub dragon: ObjectiveCounter,
    pub inhibitor: ObjectiveCounter,
    pub rift_herald: ObjectiveCounter,
    pub tower: ObjectiveCounter,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveCounter {
    pub first: bool,
    pub kills: i64,
}

/// Consolidated response for a riot-id search.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerBundle {
    pub account: Account,
    pub summoner: Summoner,
    pub ranks: Vec<RankedEntry>,
    pub recent_matches: Vec<MatchData>,
}
