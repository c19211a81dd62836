
use crate::error::FetchError;
use crate::nba::batch::{StatSource, WorkItem};
use crate::nba::db::{DefenseLine, StatRow, StatTable};
use crate::nba::http::{PacedClient, NBA_STATS_HEADERS};
use crate::nba::params::*;
use crate::nba::season::Season;
use log::{debug, warn};
use polars::prelude::*;
use serde_json::Value;
use std::{collections::HashMap, time::{Duration, Instant}};

const NBA_BASE_URL: &str = "https://stats.nba.com/stats";

pub trait NBAEndpoint {
    fn endpoint_url(&self) -> String;

    fn send_request(&self, client: &mut PacedClient) -> std::result::Result<Value, FetchError> {
        client.get_json(&self.endpoint_url())
    }
}

/// Loads every `resultSets` entry of a stats.nba.com payload into a frame
/// keyed by the result set name.
pub trait SaveToDataframe: NBAEndpoint {
    fn load_dataframes(&self, client: &mut PacedClient) -> std::result::Result<HashMap<String, DataFrame>, FetchError> {
        let endpoint_json = self.send_request(client)?;
        let load_start = Instant::now();
        let frames = frames_from_json(&endpoint_json)?;
        debug!("dataframe loading took {:?}", load_start.elapsed());
        Ok(frames)
    }
}

pub struct TeamYearByYearStats {
    pub league_id: LeagueID,
    pub per_mode: PerMode,
    pub season_type: SeasonType,
    pub team_id: TeamID,
}

impl TeamYearByYearStats {
    pub fn new(team_id: i64) -> Self {
        TeamYearByYearStats {
            league_id: Default::default(),
            per_mode: Default::default(),
            season_type: Default::default(),
            team_id: TeamID::ID(team_id),
        }
    }
}

impl NBAEndpoint for TeamYearByYearStats {
    fn endpoint_url(&self) -> String {
        format!(
            "{}/teamyearbyyearstats?{}&{}&{}&{}",
            NBA_BASE_URL, self.league_id, self.per_mode, self.season_type, self.team_id
        )
    }
}

impl SaveToDataframe for TeamYearByYearStats {
}

pub fn frames_from_json(endpoint_json: &Value) -> std::result::Result<HashMap<String, DataFrame>, FetchError> {
    let result_sets = endpoint_json["resultSets"]
        .as_array()
        .ok_or_else(|| FetchError::payload("missing resultSets"))?;
    let mut stats_dataframes: HashMap<String, DataFrame> = HashMap::new();
    for data_set in result_sets {
        let data_set_name = data_set["name"]
            .as_str()
            .ok_or_else(|| FetchError::payload("result set without a name"))?;
        let data_set_headers = data_set["headers"]
            .as_array()
            .ok_or_else(|| FetchError::payload(format!("{} has no headers", data_set_name)))?;
        let data_set_values = data_set["rowSet"]
            .as_array()
            .ok_or_else(|| FetchError::payload(format!("{} has no rowSet", data_set_name)))?;

        let mut df_series: Vec<Series> = Vec::with_capacity(data_set_headers.len());
        if !data_set_values.is_empty() {
            for (pos, header) in data_set_headers.iter().enumerate() {
                let col_name = header
                    .as_str()
                    .ok_or_else(|| FetchError::payload(format!("{} has a non-text header", data_set_name)))?;
                let json_values: Vec<&Value> = data_set_values
                    .iter()
                    .map(|row| row.get(pos).unwrap_or(&Value::Null))
                    .collect();
                df_series.push(column_series(col_name, &json_values));
            }
        }
        stats_dataframes.insert(data_set_name.to_string(), DataFrame::new(df_series)?);
    }
    Ok(stats_dataframes)
}

/// Integer columns stay integers; any fractional value makes the column a
/// float column; anything else is text. JSON nulls stay null.
fn column_series(col_name: &str, json_values: &[&Value]) -> Series {
    let non_null: Vec<&&Value> = json_values.iter().filter(|v| !v.is_null()).collect();
    if !non_null.is_empty() && non_null.iter().all(|v| v.is_i64()) {
        let typed_data = json_values.iter().map(|&v| v.as_i64()).collect::<Vec<Option<i64>>>();
        Series::new(col_name, typed_data)
    } else if !non_null.is_empty() && non_null.iter().all(|v| v.is_number()) {
        let typed_data = json_values.iter().map(|&v| v.as_f64()).collect::<Vec<Option<f64>>>();
        Series::new(col_name, typed_data)
    } else {
        let typed_data = json_values
            .iter()
            .map(|&v| v.as_str().map(str::to_string))
            .collect::<Vec<Option<String>>>();
        Series::new(col_name, typed_data)
    }
}

fn numeric_at(frame: &DataFrame, col_name: &str, idx: usize) -> std::result::Result<Option<f64>, FetchError> {
    let series = frame.column(col_name)?;
    let value = match series.dtype() {
        DataType::Int64 => series.i64()?.into_iter().nth(idx).flatten().map(|v| v as f64),
        DataType::Float64 => series.f64()?.into_iter().nth(idx).flatten(),
        _ => None,
    };
    Ok(value)
}

/// Finds the season's row (`YEAR` such as `2019-20`) in a year-by-year totals
/// frame and reads the defensive counting stats from it.
pub fn defensive_line(frame: &DataFrame, season: &Season) -> std::result::Result<Option<DefenseLine>, FetchError> {
    if frame.height() == 0 {
        return Ok(None);
    }
    let code = season.nba_code();
    let years = frame.column("YEAR")?.utf8()?;
    let idx = match years.into_iter().position(|year| year == Some(code.as_str())) {
        Some(idx) => idx,
        None => return Ok(None),
    };
    let stat = |col_name: &str| -> std::result::Result<f64, FetchError> {
        numeric_at(frame, col_name, idx)?
            .ok_or_else(|| FetchError::payload(format!("{} missing for {}", col_name, code)))
    };
    Ok(Some(DefenseLine {
        games_played: stat("GP")? as i64,
        defensive_rebounds: stat("DREB")?,
        steals: stat("STL")?,
        blocks: stat("BLK")?,
        personal_fouls: stat("PF")?,
    }))
}

/// Defensive totals from stats.nba.com. One request covers every season of a
/// team, so frames are kept for the rest of the run.
pub struct NbaDefenseSource {
    client: PacedClient,
    frames: HashMap<i64, DataFrame>,
}

impl NbaDefenseSource {
    pub fn new(pause: Duration) -> Self {
        NbaDefenseSource {
            client: PacedClient::new(pause).with_headers(&NBA_STATS_HEADERS),
            frames: HashMap::new(),
        }
    }
}

impl StatSource for NbaDefenseSource {
    fn name(&self) -> &str {
        "stats.nba.com"
    }

    fn table(&self) -> StatTable {
        StatTable::Defensive
    }

    fn fetch(&mut self, item: &WorkItem) -> std::result::Result<Option<StatRow>, FetchError> {
        let nba_team_id = match item.team.franchise() {
            Some(franchise) => franchise.nba_team_id,
            None => {
                warn!("no stats.nba.com id known for {}", item.team.team_name);
                return Ok(None);
            }
        };
        if !self.frames.contains_key(&nba_team_id) {
            let mut frames = TeamYearByYearStats::new(nba_team_id).load_dataframes(&mut self.client)?;
            let frame = match frames.remove("TeamStats") {
                Some(frame) => frame,
                None => frames
                    .into_iter()
                    .next()
                    .map(|(_, frame)| frame)
                    .ok_or_else(|| FetchError::payload("teamyearbyyearstats returned no result sets"))?,
            };
            self.frames.insert(nba_team_id, frame);
        }
        match self.frames.get(&nba_team_id) {
            Some(frame) => Ok(defensive_line(frame, &item.season.season)?.map(StatRow::Defensive)),
            None => Ok(None),
        }
    }
}
