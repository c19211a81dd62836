//! Sportradar NBA API: league teams, team rosters and player efficiency.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FetchError;
use crate::nba::analysis::top_efficiencies;
use crate::nba::batch::{StatSource, WorkItem};
use crate::nba::db::{StatRow, StatTable};
use crate::nba::http::{PacedClient, JSON_HEADERS};
use crate::nba::teams::FRANCHISES;

const SPORTRADAR_BASE_URL: &str = "https://api.sportradar.com/nba/trial/v8/en";
const REGULAR_SEASON: &str = "REG";
pub const TOP_PLAYERS: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeagueTeams {
    #[serde(default)]
    pub teams: Vec<LeagueTeam>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueTeam {
    pub id: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl LeagueTeams {
    pub fn api_id(&self, alias: &str) -> Option<&str> {
        self.teams
            .iter()
            .find(|t| t.alias.as_deref() == Some(alias))
            .map(|t| t.id.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamProfile {
    #[serde(default)]
    pub players: Vec<RosterPlayer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterPlayer {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerProfile {
    #[serde(default)]
    pub seasons: Vec<PlayerSeason>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSeason {
    pub year: i32,
    #[serde(rename = "type", default)]
    pub season_type: String,
    #[serde(default)]
    pub teams: Vec<PlayerSeasonTeam>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSeasonTeam {
    #[serde(default)]
    pub average: Option<Averages>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Averages {
    #[serde(default)]
    pub efficiency: Option<f64>,
}

impl PlayerProfile {
    /// Average efficiency for the first team listed in the player's regular
    /// season `year`.
    pub fn regular_season_efficiency(&self, year: i32) -> Option<f64> {
        self.seasons
            .iter()
            .filter(|s| s.year == year && s.season_type == REGULAR_SEASON)
            .find_map(|s| {
                s.teams
                    .first()
                    .and_then(|t| t.average.as_ref())
                    .and_then(|a| a.efficiency)
            })
    }
}

pub struct SportradarClient {
    client: PacedClient,
    api_key: String,
    league: Option<LeagueTeams>,
}

impl SportradarClient {
    pub fn new<S: Into<String>>(api_key: S, pause: Duration) -> Self {
        SportradarClient {
            client: PacedClient::new(pause).with_headers(&JSON_HEADERS),
            api_key: api_key.into(),
            league: None,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}?api_key={}", SPORTRADAR_BASE_URL, path, self.api_key)
    }

    pub fn league_teams_raw(&mut self) -> Result<Value, FetchError> {
        let url = self.url("league/teams.json");
        self.client.get_json(&url)
    }

    /// The league team list is fetched once and reused for the rest of the run.
    pub fn team_api_id(&mut self, alias: &str) -> Result<Option<String>, FetchError> {
        if self.league.is_none() {
            let raw = self.league_teams_raw()?;
            self.league = Some(serde_json::from_value(raw)?);
        }
        Ok(self
            .league
            .as_ref()
            .and_then(|league| league.api_id(alias))
            .map(str::to_string))
    }

    pub fn team_profile_raw(&mut self, api_team_id: &str) -> Result<Value, FetchError> {
        let url = self.url(&format!("teams/{}/profile.json", api_team_id));
        self.client.get_json(&url)
    }

    pub fn team_profile(&mut self, api_team_id: &str) -> Result<TeamProfile, FetchError> {
        Ok(serde_json::from_value(self.team_profile_raw(api_team_id)?)?)
    }

    pub fn player_profile(&mut self, player_id: &str) -> Result<PlayerProfile, FetchError> {
        let url = self.url(&format!("players/{}/profile.json", player_id));
        self.client.get_json(&url)
    }
}

/// Stores the five most efficient players on each team's roster for one season.
pub struct EfficiencySource {
    api: SportradarClient,
}

impl EfficiencySource {
    pub fn new(api: SportradarClient) -> Self {
        EfficiencySource { api }
    }
}

impl StatSource for EfficiencySource {
    fn name(&self) -> &str {
        "sportradar"
    }

    fn table(&self) -> StatTable {
        StatTable::Efficiency
    }

    fn fetch(&mut self, item: &WorkItem) -> Result<Option<StatRow>, FetchError> {
        let alias = match item.team.franchise() {
            Some(franchise) => franchise.abbreviation,
            None => return Ok(None),
        };
        let api_team_id = match self.api.team_api_id(alias)? {
            Some(id) => id,
            None => {
                warn!("could not find API ID for team {}", alias);
                return Ok(None);
            }
        };
        info!("processing {} ({})", item.team.team_name, alias);
        let roster = self.api.team_profile(&api_team_id)?;
        let year = item.season.season.sportradar_year();

        let mut efficiencies: Vec<(String, f64)> = Vec::new();
        for player in &roster.players {
            let player_name = match &player.full_name {
                Some(name) => name,
                None => continue,
            };
            match self.api.player_profile(&player.id) {
                Ok(profile) => {
                    if let Some(efficiency) = profile.regular_season_efficiency(year) {
                        efficiencies.push((player_name.clone(), efficiency));
                    }
                }
                // a partial top five must not be stored as complete
                Err(e) if e.is_rate_limited() => return Err(e),
                Err(e) => warn!("failed to get data for {}: {}", player_name, e),
            }
        }

        let top = top_efficiencies(&efficiencies, TOP_PLAYERS);
        if top.is_empty() {
            return Ok(None);
        }
        Ok(Some(StatRow::Efficiency(top)))
    }
}

/// Writes the league hierarchy to `teams_info.json` and each franchise's
/// profile to `{ALIAS}.json`. Returns the files written.
pub fn dump_rosters(api: &mut SportradarClient, out_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let mut written = Vec::new();

    let league_raw = api.league_teams_raw()?;
    let league: LeagueTeams = serde_json::from_value(league_raw.clone())?;
    written.push(write_json(out_dir, "teams_info.json", &league_raw)?);

    for franchise in FRANCHISES.iter() {
        let api_team_id = match league.api_id(franchise.abbreviation) {
            Some(id) => id,
            None => {
                warn!("{} not in league hierarchy", franchise.abbreviation);
                continue;
            }
        };
        match api.team_profile_raw(api_team_id) {
            Ok(profile) => {
                let file_name = format!("{}.json", franchise.abbreviation);
                written.push(write_json(out_dir, &file_name, &profile)?);
                info!("saved roster for {}", franchise.name);
            }
            Err(e) => warn!("error retrieving profile for team {}: {}", franchise.abbreviation, e),
        }
    }
    Ok(written)
}

fn write_json(out_dir: &Path, file_name: &str, value: &Value) -> anyhow::Result<PathBuf> {
    let path = out_dir.join(file_name);
    let writer = fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(writer, value)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn league_alias_resolves_to_api_id() {
        let league: LeagueTeams = serde_json::from_value(json!({
            "league": {"alias": "NBA"},
            "teams": [
                {"id": "583eca2f", "name": "Celtics", "alias": "BOS"},
                {"id": "583ec9d6", "name": "Nets", "alias": "BKN"},
                {"id": "team-no-alias", "name": "All-Stars"}
            ]
        }))
        .unwrap();
        assert_eq!(league.api_id("BKN"), Some("583ec9d6"));
        assert_eq!(league.api_id("BRK"), None);
    }

    #[test]
    fn efficiency_comes_from_matching_regular_season() {
        let profile: PlayerProfile = serde_json::from_value(json!({
            "full_name": "Jayson Tatum",
            "seasons": [
                {"year": 2023, "type": "PST", "teams": [{"average": {"efficiency": 30.1}}]},
                {"year": 2022, "type": "REG", "teams": [{"average": {"efficiency": 25.2}}]},
                {"year": 2023, "type": "REG", "teams": []},
                {"year": 2023, "type": "REG", "teams": [{"average": {"efficiency": 24.4}}, {"average": {"efficiency": 1.0}}]}
            ]
        }))
        .unwrap();
        assert_eq!(profile.regular_season_efficiency(2023), Some(24.4));
        assert_eq!(profile.regular_season_efficiency(2022), Some(25.2));
        assert_eq!(profile.regular_season_efficiency(2019), None);
    }

    #[test]
    fn sparse_profiles_still_parse() {
        let profile: PlayerProfile = serde_json::from_value(json!({"id": "x"})).unwrap();
        assert!(profile.seasons.is_empty());
        let roster: TeamProfile = serde_json::from_value(json!({
            "players": [{"id": "p1", "full_name": "A"}, {"id": "p2"}]
        }))
        .unwrap();
        assert_eq!(roster.players.len(), 2);
        assert!(roster.players[1].full_name.is_none());
    }
}
