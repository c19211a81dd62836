use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::nba::batch::{SelectionScope, WorkItem};
use crate::nba::season::{Season, SeasonRow, DEFAULT_SEASONS};
use crate::nba::teams::{Team, FRANCHISES};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS Seasons (
        season_id INTEGER PRIMARY KEY,
        season_name TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS Teams (
        team_id INTEGER PRIMARY KEY,
        team_name TEXT NOT NULL UNIQUE,
        team_abbreviation TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS ThreePointStats (
        team_id INTEGER NOT NULL,
        season_id INTEGER NOT NULL,
        three_pt_percentage REAL,
        three_pt_made INTEGER,
        three_pt_attempts INTEGER,
        games_played INTEGER,
        fetched_at TEXT NOT NULL,
        PRIMARY KEY (team_id, season_id),
        FOREIGN KEY (team_id) REFERENCES Teams(team_id),
        FOREIGN KEY (season_id) REFERENCES Seasons(season_id)
    );
    CREATE TABLE IF NOT EXISTS WinStats (
        team_id INTEGER NOT NULL,
        season_id INTEGER NOT NULL,
        win_percentage REAL,
        wins INTEGER,
        losses INTEGER,
        fetched_at TEXT NOT NULL,
        PRIMARY KEY (team_id, season_id),
        FOREIGN KEY (team_id) REFERENCES Teams(team_id),
        FOREIGN KEY (season_id) REFERENCES Seasons(season_id)
    );
    CREATE TABLE IF NOT EXISTS DefensiveStats (
        team_id INTEGER NOT NULL,
        season_id INTEGER NOT NULL,
        defensive_rebounds REAL,
        steals REAL,
        blocks REAL,
        personal_fouls REAL,
        games_played INTEGER,
        fetched_at TEXT NOT NULL,
        PRIMARY KEY (team_id, season_id),
        FOREIGN KEY (team_id) REFERENCES Teams(team_id),
        FOREIGN KEY (season_id) REFERENCES Seasons(season_id)
    );
    CREATE TABLE IF NOT EXISTS PlayerEfficiency (
        team_id INTEGER NOT NULL,
        season_id INTEGER NOT NULL,
        rank INTEGER NOT NULL,
        player_name TEXT NOT NULL,
        efficiency REAL NOT NULL,
        fetched_at TEXT NOT NULL,
        PRIMARY KEY (team_id, season_id, rank),
        FOREIGN KEY (team_id) REFERENCES Teams(team_id),
        FOREIGN KEY (season_id) REFERENCES Seasons(season_id)
    );
";

/// The per-team, per-season tables the collectors fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatTable {
    ThreePoint,
    Win,
    Defensive,
    Efficiency,
}

impl StatTable {
    pub const ALL: [StatTable; 4] = [
        StatTable::ThreePoint,
        StatTable::Win,
        StatTable::Defensive,
        StatTable::Efficiency,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            StatTable::ThreePoint => "ThreePointStats",
            StatTable::Win => "WinStats",
            StatTable::Defensive => "DefensiveStats",
            StatTable::Efficiency => "PlayerEfficiency",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatTable::ThreePoint => "3PT",
            StatTable::Win => "wins",
            StatTable::Defensive => "defense",
            StatTable::Efficiency => "efficiency",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreePointLine {
    pub three_pt_percentage: f64,
    pub three_pt_made: i64,
    pub three_pt_attempts: i64,
    pub games_played: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WinLine {
    pub win_percentage: f64,
    pub wins: i64,
    pub losses: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefenseLine {
    pub defensive_rebounds: f64,
    pub steals: f64,
    pub blocks: f64,
    pub personal_fouls: f64,
    pub games_played: i64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EfficiencyEntry {
    pub player_name: String,
    pub efficiency: f64,
}

/// What a collector produced for one `(team, season)` work item.
#[derive(Debug, Clone, PartialEq)]
pub enum StatRow {
    ThreePoint(ThreePointLine),
    Win(WinLine),
    Defensive(DefenseLine),
    /// Best first, at most five.
    Efficiency(Vec<EfficiencyEntry>),
}

impl StatRow {
    pub fn table(&self) -> StatTable {
        match self {
            StatRow::ThreePoint(_) => StatTable::ThreePoint,
            StatRow::Win(_) => StatTable::Win,
            StatRow::Defensive(_) => StatTable::Defensive,
            StatRow::Efficiency(_) => StatTable::Efficiency,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub teams_added: usize,
    pub seasons_added: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonProgress {
    pub season: SeasonRow,
    /// Teams done per table, in `StatTable::ALL` order.
    pub done: [i64; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreePointWinAverage {
    pub team_name: String,
    pub team_abbreviation: String,
    pub avg_three_pt_pct: f64,
    pub avg_win_pct: f64,
    pub seasons: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefenseWinAverage {
    pub team_name: String,
    pub team_abbreviation: String,
    pub def_reb_per_game: f64,
    pub steals_per_game: f64,
    pub blocks_per_game: f64,
    pub fouls_per_game: f64,
    pub avg_win_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredEfficiency {
    pub team_id: i64,
    pub team_name: String,
    pub team_abbreviation: String,
    pub player_name: String,
    pub efficiency: f64,
}

pub struct StatsStore {
    conn: Connection,
}

impl StatsStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = StatsStore { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn check_table_exists(&self, table_name: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type='table' AND name=?",
                params![table_name],
                |r| r.get::<_, String>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Inserts the 30 franchises and the default seasons; existing rows are kept.
    pub fn seed(&self) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();
        for (pos, franchise) in FRANCHISES.iter().enumerate() {
            summary.teams_added += self.conn.execute(
                "INSERT OR IGNORE INTO Teams (team_id, team_name, team_abbreviation) VALUES (?1, ?2, ?3)",
                params![pos as i64 + 1, franchise.name, franchise.abbreviation],
            )?;
        }
        for (pos, season) in DEFAULT_SEASONS.iter().enumerate() {
            summary.seasons_added += self.conn.execute(
                "INSERT OR IGNORE INTO Seasons (season_id, season_name) VALUES (?1, ?2)",
                params![pos as i64 + 1, season],
            )?;
        }
        Ok(summary)
    }

    /// Drops every stat table and recreates it empty. Teams and seasons survive.
    pub fn reset_stats(&self) -> Result<()> {
        for table in StatTable::ALL.iter() {
            if self.check_table_exists(table.table_name())? {
                self.conn.execute_batch(&format!("DROP TABLE {};", table.table_name()))?;
            }
        }
        self.initialize_schema()
    }

    pub fn team_count(&self) -> Result<i64> {
        Ok(self.conn.query_row("SELECT COUNT(*) FROM Teams", [], |r| r.get(0))?)
    }

    pub fn seasons(&self) -> Result<Vec<SeasonRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT season_id, season_name FROM Seasons ORDER BY season_id")?;
        let rows = stmt.query_map([], |row| {
            Ok(SeasonRow {
                season_id: row.get(0)?,
                season: parse_season(1, row.get(1)?)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn season_row(&self, season: &Season) -> Result<Option<SeasonRow>> {
        Ok(self.seasons()?.into_iter().find(|s| &s.season == season))
    }

    /// Number of distinct teams with at least one row in `table` for the season.
    pub fn completed_count(&self, table: StatTable, season_id: i64) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(DISTINCT team_id) FROM {} WHERE season_id = ?",
            table.table_name()
        );
        Ok(self.conn.query_row(&sql, params![season_id], |r| r.get(0))?)
    }

    pub fn row_count(&self, table: StatTable) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.table_name());
        Ok(self.conn.query_row(&sql, [], |r| r.get(0))?)
    }

    pub fn first_incomplete_season(&self, table: StatTable) -> Result<Option<SeasonRow>> {
        let team_count = self.team_count()?;
        for season in self.seasons()? {
            if self.completed_count(table, season.season_id)? < team_count {
                return Ok(Some(season));
            }
        }
        Ok(None)
    }

    /// The next `limit` team/season pairs with no row in `table`, ordered by
    /// season then team.
    pub fn pending_items(&self, table: StatTable, scope: SelectionScope, limit: usize) -> Result<Vec<WorkItem>> {
        let season_filter: Option<i64> = match scope {
            SelectionScope::AllSeasons => None,
            SelectionScope::Season(season_id) => Some(season_id),
            SelectionScope::FirstIncompleteSeason => match self.first_incomplete_season(table)? {
                Some(season) => Some(season.season_id),
                None => return Ok(Vec::new()),
            },
        };
        let sql = format!(
            "SELECT t.team_id, t.team_name, t.team_abbreviation, s.season_id, s.season_name
             FROM Seasons s CROSS JOIN Teams t
             WHERE (?1 IS NULL OR s.season_id = ?1)
               AND NOT EXISTS (
                   SELECT 1 FROM {} x WHERE x.team_id = t.team_id AND x.season_id = s.season_id
               )
             ORDER BY s.season_id, t.team_id
             LIMIT ?2",
            table.table_name()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![season_filter, limit as i64], |row| {
            Ok(WorkItem {
                team: team_from_row(row)?,
                season: SeasonRow {
                    season_id: row.get(3)?,
                    season: parse_season(4, row.get(4)?)?,
                },
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Inserts the row unless the team/season pair already has one. Existing
    /// rows are never replaced. Returns whether anything was written.
    pub fn insert_row(&mut self, item: &WorkItem, row: &StatRow) -> Result<bool> {
        let fetched_at = Utc::now().to_rfc3339();
        let team_id = item.team.team_id;
        let season_id = item.season.season_id;
        let changed = match row {
            StatRow::ThreePoint(line) => self.conn.execute(
                "INSERT OR IGNORE INTO ThreePointStats
                 (team_id, season_id, three_pt_percentage, three_pt_made, three_pt_attempts, games_played, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    team_id,
                    season_id,
                    line.three_pt_percentage,
                    line.three_pt_made,
                    line.three_pt_attempts,
                    line.games_played,
                    fetched_at
                ],
            )?,
            StatRow::Win(line) => self.conn.execute(
                "INSERT OR IGNORE INTO WinStats
                 (team_id, season_id, win_percentage, wins, losses, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![team_id, season_id, line.win_percentage, line.wins, line.losses, fetched_at],
            )?,
            StatRow::Defensive(line) => self.conn.execute(
                "INSERT OR IGNORE INTO DefensiveStats
                 (team_id, season_id, defensive_rebounds, steals, blocks, personal_fouls, games_played, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    team_id,
                    season_id,
                    line.defensive_rebounds,
                    line.steals,
                    line.blocks,
                    line.personal_fouls,
                    line.games_played,
                    fetched_at
                ],
            )?,
            StatRow::Efficiency(entries) => {
                if entries.is_empty() {
                    return Ok(false);
                }
                let tx = self.conn.transaction()?;
                let existing: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM PlayerEfficiency WHERE team_id = ?1 AND season_id = ?2",
                    params![team_id, season_id],
                    |r| r.get(0),
                )?;
                if existing > 0 {
                    return Ok(false);
                }
                let mut written = 0;
                for (rank, entry) in entries.iter().enumerate() {
                    written += tx.execute(
                        "INSERT OR IGNORE INTO PlayerEfficiency
                         (team_id, season_id, rank, player_name, efficiency, fetched_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            team_id,
                            season_id,
                            rank as i64 + 1,
                            entry.player_name,
                            entry.efficiency,
                            fetched_at
                        ],
                    )?;
                }
                tx.commit()?;
                written
            }
        };
        Ok(changed > 0)
    }

    pub fn progress(&self) -> Result<Vec<SeasonProgress>> {
        let mut progress = Vec::new();
        for season in self.seasons()? {
            let mut done = [0i64; 4];
            for (slot, table) in done.iter_mut().zip(StatTable::ALL.iter()) {
                *slot = self.completed_count(*table, season.season_id)?;
            }
            progress.push(SeasonProgress { season, done });
        }
        Ok(progress)
    }

    pub fn search_teams(&self, keyword: &str) -> Result<Vec<Team>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            bail!("search keyword is empty");
        }
        let pattern = format!("%{}%", keyword);
        let mut stmt = self.conn.prepare(
            "SELECT team_id, team_name, team_abbreviation FROM Teams
             WHERE team_name LIKE ?1 OR team_abbreviation LIKE ?1
             ORDER BY team_id",
        )?;
        let rows = stmt.query_map(params![pattern], team_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Per-team averages over the seasons that have both a 3PT and a win row,
    /// best win percentage first.
    pub fn three_point_win_averages(&self) -> Result<Vec<ThreePointWinAverage>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.team_name, t.team_abbreviation,
                    AVG(tp.three_pt_percentage), AVG(ws.win_percentage), COUNT(*)
             FROM Teams t
             JOIN ThreePointStats tp ON t.team_id = tp.team_id
             JOIN WinStats ws ON t.team_id = ws.team_id AND tp.season_id = ws.season_id
             GROUP BY t.team_id, t.team_name, t.team_abbreviation
             ORDER BY AVG(ws.win_percentage) DESC, t.team_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ThreePointWinAverage {
                team_name: row.get(0)?,
                team_abbreviation: row.get(1)?,
                avg_three_pt_pct: row.get(2)?,
                avg_win_pct: row.get(3)?,
                seasons: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Per-game defensive averages joined with win percentage. Seasons with no
    /// games played are left out.
    pub fn defense_win_averages(&self) -> Result<Vec<DefenseWinAverage>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.team_name, t.team_abbreviation,
                    AVG(ds.defensive_rebounds / ds.games_played),
                    AVG(ds.steals / ds.games_played),
                    AVG(ds.blocks / ds.games_played),
                    AVG(ds.personal_fouls / ds.games_played),
                    AVG(ws.win_percentage)
             FROM Teams t
             JOIN DefensiveStats ds ON t.team_id = ds.team_id
             JOIN WinStats ws ON t.team_id = ws.team_id AND ds.season_id = ws.season_id
             WHERE ds.games_played > 0
             GROUP BY t.team_id, t.team_name, t.team_abbreviation
             ORDER BY AVG(ws.win_percentage) DESC, t.team_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DefenseWinAverage {
                team_name: row.get(0)?,
                team_abbreviation: row.get(1)?,
                def_reb_per_game: row.get(2)?,
                steals_per_game: row.get(3)?,
                blocks_per_game: row.get(4)?,
                fouls_per_game: row.get(5)?,
                avg_win_pct: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Most recent season with at least one row in `table`.
    pub fn latest_season_with(&self, table: StatTable) -> Result<Option<SeasonRow>> {
        let sql = format!("SELECT MAX(season_id) FROM {}", table.table_name());
        let latest: Option<i64> = self.conn.query_row(&sql, [], |r| r.get(0))?;
        Ok(match latest {
            Some(season_id) => self.seasons()?.into_iter().find(|s| s.season_id == season_id),
            None => None,
        })
    }

    /// Stored top players for one season, grouped by team in rank order.
    pub fn stored_efficiencies(&self, season_id: i64) -> Result<Vec<StoredEfficiency>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.team_id, t.team_name, t.team_abbreviation, pe.player_name, pe.efficiency
             FROM Teams t
             JOIN PlayerEfficiency pe ON t.team_id = pe.team_id
             WHERE pe.season_id = ?1
             ORDER BY t.team_id, pe.rank",
        )?;
        let rows = stmt.query_map(params![season_id], |row| {
            Ok(StoredEfficiency {
                team_id: row.get(0)?,
                team_name: row.get(1)?,
                team_abbreviation: row.get(2)?,
                player_name: row.get(3)?,
                efficiency: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn team_from_row(row: &rusqlite::Row) -> rusqlite::Result<Team> {
    Ok(Team {
        team_id: row.get(0)?,
        team_name: row.get(1)?,
        team_abbreviation: row.get(2)?,
    })
}

fn parse_season(idx: usize, name: String) -> rusqlite::Result<Season> {
    name.parse::<Season>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}
