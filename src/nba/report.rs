//! Text reports and chart data for the stored stats.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::nba::analysis::{
    defensive_rating, linear_fit, mean, median, pearson, tier, top_efficiencies, LinearFit, Strength, Tier,
    DEFENSIVE_RATING_FORMULA,
};
use crate::nba::db::{
    DefenseWinAverage, EfficiencyEntry, SeasonProgress, StatTable, StatsStore, StoredEfficiency, ThreePointWinAverage,
};
use crate::nba::season::Season;
use crate::nba::sportradar::TOP_PLAYERS;
use crate::nba::teams::Team;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub x: f64,
    pub y: f64,
}

/// Everything needed to redraw a scatter plot with its fitted line and
/// median quadrants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<ChartPoint>,
    pub correlation: Option<f64>,
    pub fit: Option<LinearFit>,
    pub median_x: Option<f64>,
    pub median_y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChart {
    pub title: String,
    pub x_label: String,
    pub bars: Vec<Bar>,
    pub league_average: Option<f64>,
}

fn generated_at() -> String {
    Utc::now().to_rfc3339()
}

pub fn format_correlation(r: Option<f64>) -> String {
    match r {
        Some(r) => format!("{:.4}", r),
        None => "undefined".to_string(),
    }
}

fn interpretation(r: Option<f64>, subject: &str) -> String {
    match r {
        Some(r) => format!("Interpretation: {}", Strength::of(r).describe(subject)),
        None => format!(
            "Interpretation: the correlation between {} and win percentage is undefined for this data.",
            subject
        ),
    }
}

#[derive(Tabled)]
struct ThreePointLine {
    rank: usize,
    team: String,
    abbr: String,
    avg_three_pt_pct: String,
    avg_win_pct: String,
    seasons: i64,
}

pub struct ThreePointReport {
    pub generated_at: String,
    pub teams: Vec<ThreePointWinAverage>,
    pub correlation: Option<f64>,
    pub fit: Option<LinearFit>,
}

impl ThreePointReport {
    pub fn build(store: &StatsStore) -> Result<Self> {
        Ok(Self::from_averages(store.three_point_win_averages()?))
    }

    pub fn from_averages(teams: Vec<ThreePointWinAverage>) -> Self {
        let (xs, ys) = axes(&teams, |t| (t.avg_three_pt_pct, t.avg_win_pct));
        let correlation = pearson(&xs, &ys);
        ThreePointReport {
            generated_at: generated_at(),
            correlation,
            fit: correlation.and(linear_fit(&xs, &ys)),
            teams,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "NBA 3-Point Shooting and Win Percentage Analysis");
        let _ = writeln!(out, "Generated: {}", self.generated_at);
        let _ = writeln!(out, "Correlation between 3PT% and Win%: {}", format_correlation(self.correlation));
        if let Some(fit) = &self.fit {
            let _ = writeln!(out, "Regression: {}", fit.equation());
        }
        let _ = writeln!(out, "\nTeam Statistics (Ranked by Win Percentage):");
        let rows: Vec<ThreePointLine> = self
            .teams
            .iter()
            .enumerate()
            .map(|(i, t)| ThreePointLine {
                rank: i + 1,
                team: t.team_name.clone(),
                abbr: t.team_abbreviation.clone(),
                avg_three_pt_pct: format!("{:.4}", t.avg_three_pt_pct),
                avg_win_pct: format!("{:.4}", t.avg_win_pct),
                seasons: t.seasons,
            })
            .collect();
        let _ = writeln!(out, "{}", Table::new(rows));
        let _ = writeln!(out, "\n{}", interpretation(self.correlation, "3-point shooting percentage"));
        out
    }

    pub fn chart(&self) -> ScatterChart {
        let (xs, ys) = axes(&self.teams, |t| (t.avg_three_pt_pct, t.avg_win_pct));
        ScatterChart {
            title: "NBA 3-Point Shooting vs. Win Percentage".to_string(),
            x_label: "Average 3-Point Percentage".to_string(),
            y_label: "Average Win Percentage".to_string(),
            points: self
                .teams
                .iter()
                .map(|t| ChartPoint {
                    label: t.team_abbreviation.clone(),
                    x: t.avg_three_pt_pct,
                    y: t.avg_win_pct,
                })
                .collect(),
            correlation: self.correlation,
            fit: self.fit,
            median_x: median(&xs),
            median_y: median(&ys),
        }
    }
}

fn column<T, F: Fn(&T) -> f64>(rows: &[T], pick: F) -> Vec<f64> {
    rows.iter().map(pick).collect()
}

fn axes<T, F: Fn(&T) -> (f64, f64)>(rows: &[T], pick: F) -> (Vec<f64>, Vec<f64>) {
    rows.iter().map(pick).unzip()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatedDefense {
    pub averages: DefenseWinAverage,
    pub rating: f64,
}

#[derive(Tabled)]
struct DefenseLine {
    rank: usize,
    team: String,
    abbr: String,
    def_rating: String,
    reb_per_game: String,
    stl_per_game: String,
    blk_per_game: String,
    pf_per_game: String,
    win_pct: String,
}

pub struct DefenseReport {
    pub generated_at: String,
    pub teams: Vec<RatedDefense>,
    /// Component name and its correlation with win percentage, composite last.
    pub correlations: Vec<(&'static str, Option<f64>)>,
    pub correlation: Option<f64>,
    pub fit: Option<LinearFit>,
}

impl DefenseReport {
    pub fn build(store: &StatsStore) -> Result<Self> {
        Ok(Self::from_averages(store.defense_win_averages()?))
    }

    pub fn from_averages(averages: Vec<DefenseWinAverage>) -> Self {
        let teams: Vec<RatedDefense> = averages
            .into_iter()
            .map(|a| RatedDefense {
                rating: defensive_rating(a.blocks_per_game, a.steals_per_game, a.def_reb_per_game, a.fouls_per_game),
                averages: a,
            })
            .collect();
        let wins: Vec<f64> = teams.iter().map(|t| t.averages.avg_win_pct).collect();
        let ratings = column(&teams, |t| t.rating);
        let correlation = pearson(&ratings, &wins);
        let correlations = vec![
            ("Defensive Rebounds", pearson(&column(&teams, |t| t.averages.def_reb_per_game), &wins)),
            ("Steals", pearson(&column(&teams, |t| t.averages.steals_per_game), &wins)),
            ("Blocks", pearson(&column(&teams, |t| t.averages.blocks_per_game), &wins)),
            ("Personal Fouls", pearson(&column(&teams, |t| t.averages.fouls_per_game), &wins)),
            ("Composite Rating", correlation),
        ];
        DefenseReport {
            generated_at: generated_at(),
            fit: correlation.and(linear_fit(&ratings, &wins)),
            correlations,
            correlation,
            teams,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "NBA Defensive Statistics and Win Percentage Analysis");
        let _ = writeln!(out, "Generated: {}", self.generated_at);
        let _ = writeln!(out, "Defensive rating: {}", DEFENSIVE_RATING_FORMULA);
        let _ = writeln!(out, "\nCorrelation with Win Percentage:");
        for (stat, r) in &self.correlations {
            let _ = writeln!(out, "- {}: {}", stat, format_correlation(*r));
        }
        if let Some(fit) = &self.fit {
            let _ = writeln!(out, "Regression: {}", fit.equation());
        }
        let _ = writeln!(out, "\nTeam Statistics (Ranked by Win Percentage):");
        let rows: Vec<DefenseLine> = self
            .teams
            .iter()
            .enumerate()
            .map(|(i, t)| DefenseLine {
                rank: i + 1,
                team: t.averages.team_name.clone(),
                abbr: t.averages.team_abbreviation.clone(),
                def_rating: format!("{:.4}", t.rating),
                reb_per_game: format!("{:.2}", t.averages.def_reb_per_game),
                stl_per_game: format!("{:.2}", t.averages.steals_per_game),
                blk_per_game: format!("{:.2}", t.averages.blocks_per_game),
                pf_per_game: format!("{:.2}", t.averages.fouls_per_game),
                win_pct: format!("{:.4}", t.averages.avg_win_pct),
            })
            .collect();
        let _ = writeln!(out, "{}", Table::new(rows));
        let _ = writeln!(out, "\n{}", interpretation(self.correlation, "defensive rating"));
        out
    }

    pub fn chart(&self) -> ScatterChart {
        let (xs, ys) = axes(&self.teams, |t| (t.rating, t.averages.avg_win_pct));
        ScatterChart {
            title: "NBA Defensive Rating vs. Win Percentage".to_string(),
            x_label: "Defensive Rating".to_string(),
            y_label: "Average Win Percentage".to_string(),
            points: self
                .teams
                .iter()
                .map(|t| ChartPoint {
                    label: t.averages.team_abbreviation.clone(),
                    x: t.rating,
                    y: t.averages.avg_win_pct,
                })
                .collect(),
            correlation: self.correlation,
            fit: self.fit,
            median_x: median(&xs),
            median_y: median(&ys),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamEfficiency {
    pub team_name: String,
    pub team_abbreviation: String,
    pub avg_efficiency: f64,
    pub players: Vec<EfficiencyEntry>,
    pub tier: Tier,
}

#[derive(Tabled)]
struct EfficiencyLine {
    rank: usize,
    team: String,
    abbr: String,
    avg_efficiency: String,
    tier: &'static str,
}

pub struct EfficiencyReport {
    pub generated_at: String,
    pub season: Option<Season>,
    /// Best average first.
    pub teams: Vec<TeamEfficiency>,
    pub league_average: Option<f64>,
}

impl EfficiencyReport {
    /// Report for `season`, or for the latest season with stored efficiencies.
    pub fn build(store: &StatsStore, season: Option<&Season>) -> Result<Self> {
        let row = match season {
            Some(season) => Some(
                store
                    .season_row(season)?
                    .ok_or_else(|| anyhow!("{} is not one of the tracked seasons", season))?,
            ),
            None => store.latest_season_with(StatTable::Efficiency)?,
        };
        let row = match row {
            Some(row) => row,
            None => return Ok(Self::from_stored(&[])),
        };
        let mut report = Self::from_stored(&store.stored_efficiencies(row.season_id)?);
        report.season = Some(row.season);
        Ok(report)
    }

    pub fn from_stored(stored: &[StoredEfficiency]) -> Self {
        let mut teams: Vec<TeamEfficiency> = Vec::new();
        let mut start = 0;
        while start < stored.len() {
            let team_id = stored[start].team_id;
            let end = stored[start..]
                .iter()
                .position(|s| s.team_id != team_id)
                .map_or(stored.len(), |len| start + len);
            let group = &stored[start..end];
            let pairs: Vec<(String, f64)> = group.iter().map(|s| (s.player_name.clone(), s.efficiency)).collect();
            let players = top_efficiencies(&pairs, TOP_PLAYERS);
            let values: Vec<f64> = players.iter().map(|p| p.efficiency).collect();
            if let Some(avg_efficiency) = mean(&values) {
                teams.push(TeamEfficiency {
                    team_name: group[0].team_name.clone(),
                    team_abbreviation: group[0].team_abbreviation.clone(),
                    avg_efficiency,
                    players,
                    tier: Tier::Top,
                });
            }
            start = end;
        }
        teams.sort_by(|a, b| {
            b.avg_efficiency
                .partial_cmp(&a.avg_efficiency)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let n = teams.len();
        for (i, team) in teams.iter_mut().enumerate() {
            team.tier = tier(i, n);
        }
        let averages: Vec<f64> = teams.iter().map(|t| t.avg_efficiency).collect();
        EfficiencyReport {
            generated_at: generated_at(),
            season: None,
            league_average: mean(&averages),
            teams,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "NBA Team Player Efficiency Stats (Top {} Players)", TOP_PLAYERS);
        let _ = writeln!(out, "Generated: {}", self.generated_at);
        if let Some(season) = &self.season {
            let _ = writeln!(out, "Season: {}", season);
        }
        if self.teams.is_empty() {
            let _ = writeln!(out, "\nNo efficiency data stored.");
            return out;
        }
        let rows: Vec<EfficiencyLine> = self
            .teams
            .iter()
            .enumerate()
            .map(|(i, t)| EfficiencyLine {
                rank: i + 1,
                team: t.team_name.clone(),
                abbr: t.team_abbreviation.clone(),
                avg_efficiency: format!("{:.2}", t.avg_efficiency),
                tier: t.tier.label(),
            })
            .collect();
        let _ = writeln!(out, "\n{}", Table::new(rows));
        for (i, team) in self.teams.iter().enumerate() {
            let _ = writeln!(out, "\n{}. {} ({}):", i + 1, team.team_name, team.team_abbreviation);
            let _ = writeln!(out, "  Average Efficiency: {:.2}", team.avg_efficiency);
            let _ = writeln!(out, "  Top Players:");
            for (j, player) in team.players.iter().enumerate() {
                let _ = writeln!(out, "    {}. {}: {:.2}", j + 1, player.player_name, player.efficiency);
            }
        }
        if let Some(avg) = self.league_average {
            let _ = writeln!(out, "\nLeague Average Efficiency: {:.2}", avg);
        }
        if let (Some(best), Some(worst)) = (self.teams.first(), self.teams.last()) {
            let _ = writeln!(out, "Highest Team Efficiency: {:.2} ({})", best.avg_efficiency, best.team_name);
            let _ = writeln!(out, "Lowest Team Efficiency: {:.2} ({})", worst.avg_efficiency, worst.team_name);
        }
        out
    }

    pub fn chart(&self) -> BarChart {
        BarChart {
            title: "NBA Team Player Efficiency Comparison (Top 5 Players)".to_string(),
            x_label: "Average Player Efficiency Rating".to_string(),
            bars: self
                .teams
                .iter()
                .map(|t| Bar {
                    label: t.team_abbreviation.clone(),
                    value: t.avg_efficiency,
                    tier: t.tier,
                })
                .collect(),
            league_average: self.league_average,
        }
    }
}

/// Writes `{stem}.txt` and `{stem}.json` into `out_dir`.
pub fn write_report<C: Serialize>(out_dir: &Path, stem: &str, text: &str, chart: &C) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let text_path = out_dir.join(format!("{}.txt", stem));
    fs::write(&text_path, text).with_context(|| format!("writing {}", text_path.display()))?;
    let chart_path = out_dir.join(format!("{}.json", stem));
    let chart_file = fs::File::create(&chart_path).with_context(|| format!("creating {}", chart_path.display()))?;
    serde_json::to_writer_pretty(chart_file, chart)?;
    Ok((text_path, chart_path))
}

#[derive(Tabled)]
struct ProgressLine {
    season: String,
    three_point: String,
    wins: String,
    defense: String,
    efficiency: String,
}

pub fn render_progress(progress: &[SeasonProgress], team_count: i64) -> String {
    let done = |p: &SeasonProgress, table: StatTable| -> String {
        let slot = StatTable::ALL.iter().position(|t| *t == table).unwrap_or(0);
        format!("{}/{}", p.done[slot], team_count)
    };
    let rows: Vec<ProgressLine> = progress
        .iter()
        .map(|p| ProgressLine {
            season: p.season.season.to_string(),
            three_point: done(p, StatTable::ThreePoint),
            wins: done(p, StatTable::Win),
            defense: done(p, StatTable::Defensive),
            efficiency: done(p, StatTable::Efficiency),
        })
        .collect();
    Table::new(rows).to_string()
}

#[derive(Tabled)]
struct TeamLine {
    team_id: i64,
    team_name: String,
    abbreviation: String,
    reference_code: String,
}

pub fn render_teams(teams: &[Team]) -> String {
    let rows: Vec<TeamLine> = teams
        .iter()
        .map(|t| TeamLine {
            team_id: t.team_id,
            team_name: t.team_name.clone(),
            abbreviation: t.team_abbreviation.clone(),
            reference_code: t.franchise().map_or("-", |f| f.reference_code).to_string(),
        })
        .collect();
    Table::new(rows).to_string()
}
