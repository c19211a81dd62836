//! Team totals and conference standings scraped from basketball-reference.com
//! season pages.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info, warn};
use scraper::{ElementRef, Html, Selector};

use crate::error::FetchError;
use crate::nba::batch::{StatSource, WorkItem};
use crate::nba::db::{StatRow, StatTable, ThreePointLine, WinLine};
use crate::nba::http::PacedClient;
use crate::nba::season::Season;
use crate::nba::teams;

const REFERENCE_BASE_URL: &str = "https://www.basketball-reference.com/leagues";
const TOTALS_TABLE_ID: &str = "totals-team";
const STANDINGS_TABLE_IDS: [&str; 2] = ["confs_standings_E", "confs_standings_W"];

pub fn season_page_url(season: &Season) -> String {
    format!("{}/NBA_{}.html", REFERENCE_BASE_URL, season.reference_year())
}

/// The parts of one season page we keep, keyed by NBA.com abbreviation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SeasonPage {
    pub three_point: HashMap<&'static str, ThreePointLine>,
    pub wins: HashMap<&'static str, WinLine>,
}

pub fn parse_season_page(html: &str) -> Result<SeasonPage, FetchError> {
    let document = Html::parse_document(html);
    let mut page = SeasonPage::default();

    match find_table(&document, TOTALS_TABLE_ID)? {
        Some(table_html) => page.three_point = parse_totals(&table_html)?,
        None => warn!("no {} table on page", TOTALS_TABLE_ID),
    }
    for table_id in STANDINGS_TABLE_IDS.iter() {
        match find_table(&document, table_id)? {
            Some(table_html) => page.wins.extend(parse_standings(&table_html)?),
            None => warn!("no {} table on page", table_id),
        }
    }
    Ok(page)
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::payload(format!("bad selector {}: {:?}", css, e)))
}

/// Returns the outer HTML of `table#id`. basketball-reference ships many of
/// its tables inside HTML comments, so comments are searched when the live
/// DOM has no match.
fn find_table(document: &Html, id: &str) -> Result<Option<String>, FetchError> {
    let table_selector = selector(&format!("table#{}", id))?;
    if let Some(table) = document.select(&table_selector).next() {
        return Ok(Some(table.html()));
    }
    let marker = format!("id=\"{}\"", id);
    for node in document.tree.root().descendants() {
        if let Some(comment) = node.value().as_comment() {
            let text: &str = &comment.comment;
            if text.contains(&marker) {
                let fragment = Html::parse_fragment(text);
                if let Some(table) = fragment.select(&table_selector).next() {
                    debug!("found {} inside a comment", id);
                    return Ok(Some(table.html()));
                }
            }
        }
    }
    Ok(None)
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn int_cell(cells: &[ElementRef], idx: usize) -> Result<i64, String> {
    let cell = cells.get(idx).ok_or_else(|| format!("missing column {}", idx))?;
    let text = cell_text(cell);
    if text.is_empty() {
        return Ok(0);
    }
    text.replace(',', "")
        .parse::<i64>()
        .map_err(|e| format!("column {} '{}': {}", idx, text, e))
}

fn float_cell(cells: &[ElementRef], idx: usize) -> Result<f64, String> {
    let cell = cells.get(idx).ok_or_else(|| format!("missing column {}", idx))?;
    let text = cell_text(cell);
    if text.is_empty() {
        return Ok(0.0);
    }
    text.parse::<f64>().map_err(|e| format!("column {} '{}': {}", idx, text, e))
}

/// Team totals: Team, G, MP, FG, FGA, FG%, 3P, 3PA, 3P% in the data cells.
fn parse_totals(table_html: &str) -> Result<HashMap<&'static str, ThreePointLine>, FetchError> {
    let fragment = Html::parse_fragment(table_html);
    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;
    let mut lines = HashMap::new();
    for row in fragment.select(&row_selector) {
        let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
        if cells.is_empty() {
            continue;
        }
        let team_name = cell_text(&cells[0]);
        let franchise = match teams::by_name(&team_name) {
            Some(franchise) => franchise,
            None => continue,
        };
        let parsed = (|| -> Result<ThreePointLine, String> {
            Ok(ThreePointLine {
                games_played: int_cell(&cells, 1)?,
                three_pt_made: int_cell(&cells, 6)?,
                three_pt_attempts: int_cell(&cells, 7)?,
                three_pt_percentage: float_cell(&cells, 8)?,
            })
        })();
        match parsed {
            Ok(line) => {
                lines.insert(franchise.abbreviation, line);
            }
            Err(e) => warn!("error processing 3PT stats for {}: {}", team_name, e),
        }
    }
    Ok(lines)
}

/// Conference standings: team header cell, then W, L, W/L%.
fn parse_standings(table_html: &str) -> Result<HashMap<&'static str, WinLine>, FetchError> {
    let fragment = Html::parse_fragment(table_html);
    let row_selector = selector("tr")?;
    let cell_selector = selector("th, td")?;
    let anchor_selector = selector("a")?;
    let mut lines = HashMap::new();
    for row in fragment.select(&row_selector) {
        let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
        if cells.len() < 4 {
            continue;
        }
        let team_name = match cells[0].select(&anchor_selector).next() {
            Some(anchor) => cell_text(&anchor),
            None => cell_text(&cells[0]),
        };
        let franchise = match teams::by_name(strip_seed(&team_name)) {
            Some(franchise) => franchise,
            None => continue,
        };
        let parsed = (|| -> Result<WinLine, String> {
            let wins = int_cell(&cells, 1)?;
            let losses = int_cell(&cells, 2)?;
            let win_percentage = match float_cell(&cells, 3) {
                Ok(pct) if !cell_text(&cells[3]).is_empty() => pct,
                _ => win_percentage(wins, losses),
            };
            Ok(WinLine { win_percentage, wins, losses })
        })();
        match parsed {
            Ok(line) => {
                lines.insert(franchise.abbreviation, line);
            }
            Err(e) => warn!("error processing win stats for {}: {}", team_name, e),
        }
    }
    Ok(lines)
}

/// Drops a trailing seed such as ` (1)` from a standings team cell.
fn strip_seed(name: &str) -> &str {
    let trimmed = name.trim();
    match trimmed.rfind('(') {
        Some(open) if trimmed.ends_with(')') => trimmed[..open].trim_end(),
        _ => trimmed,
    }
}

pub fn win_percentage(wins: i64, losses: i64) -> f64 {
    let games = wins + losses;
    if games == 0 {
        0.0
    } else {
        wins as f64 / games as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceStat {
    ThreePoint,
    Wins,
}

/// Serves 3PT or win rows from season pages, fetching each page once per run.
pub struct ReferenceSource {
    client: PacedClient,
    stat: ReferenceStat,
    pages: HashMap<Season, SeasonPage>,
}

impl ReferenceSource {
    pub fn new(stat: ReferenceStat, pause: Duration) -> Self {
        ReferenceSource {
            client: PacedClient::new(pause),
            stat,
            pages: HashMap::new(),
        }
    }

    fn page(&mut self, season: Season) -> Result<&SeasonPage, FetchError> {
        if !self.pages.contains_key(&season) {
            let url = season_page_url(&season);
            info!("fetching data from: {}", url);
            let html = self.client.get_text(&url)?;
            let page = parse_season_page(&html)?;
            self.pages.insert(season, page);
        }
        self.pages
            .get(&season)
            .ok_or_else(|| FetchError::payload("season page cache miss"))
    }
}

impl StatSource for ReferenceSource {
    fn name(&self) -> &str {
        "basketball-reference"
    }

    fn table(&self) -> StatTable {
        match self.stat {
            ReferenceStat::ThreePoint => StatTable::ThreePoint,
            ReferenceStat::Wins => StatTable::Win,
        }
    }

    fn fetch(&mut self, item: &WorkItem) -> Result<Option<StatRow>, FetchError> {
        let abbreviation = match item.team.franchise() {
            Some(franchise) => franchise.abbreviation,
            None => return Ok(None),
        };
        let stat = self.stat;
        let page = self.page(item.season.season)?;
        let row = match stat {
            ReferenceStat::ThreePoint => page.three_point.get(abbreviation).cloned().map(StatRow::ThreePoint),
            ReferenceStat::Wins => page.wins.get(abbreviation).cloned().map(StatRow::Win),
        };
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOTALS: &str = r#"
        <table id="totals-team">
          <thead><tr><th>Rk</th><th>Team</th><th>G</th><th>MP</th><th>FG</th><th>FGA</th><th>FG%</th><th>3P</th><th>3PA</th><th>3P%</th></tr></thead>
          <tbody>
            <tr><th>1</th><td><a href="/teams/MIL/2020.html">Milwaukee Bucks</a>*</td><td>73</td><td>17780</td><td>3168</td><td>6706</td><td>.476</td><td>1016</td><td>2867</td><td>.355</td></tr>
            <tr><th>2</th><td>Brooklyn Nets</td><td>72</td><td>17430</td><td>2912</td><td>6613</td><td>.440</td><td>968</td><td>2757</td><td>.351</td></tr>
            <tr><th>3</th><td>Charlotte Hornets</td><td>65</td><td>15725</td><td>2446</td><td>5559</td><td>.440</td><td>bad</td><td>2100</td><td>.352</td></tr>
            <tr><th></th><td>League Average</td><td>70</td><td>16988</td><td>2886</td><td>6330</td><td>.456</td><td>860</td><td>2419</td><td>.358</td></tr>
          </tbody>
        </table>"#;

    const STANDINGS_E: &str = r#"
        <table id="confs_standings_E">
          <thead><tr><th>Eastern Conference</th><th>W</th><th>L</th><th>W/L%</th><th>GB</th></tr></thead>
          <tbody>
            <tr><th><a href="/teams/MIL/2020.html">Milwaukee Bucks</a>* (1)</th><td>56</td><td>17</td><td>.767</td><td>—</td></tr>
            <tr><th>Brooklyn Nets (7)</th><td>35</td><td>37</td><td></td><td>20.5</td></tr>
          </tbody>
        </table>"#;

    const STANDINGS_W: &str = r#"
        <table id="confs_standings_W">
          <tr><th>Western Conference</th><th>W</th><th>L</th><th>W/L%</th></tr>
          <tr><th><a href="/teams/LAL/2020.html">Los Angeles Lakers</a>*</th><td>52</td><td>19</td><td>.732</td></tr>
        </table>"#;

    fn page_html(totals_commented: bool) -> String {
        let totals = if totals_commented {
            format!("<div id=\"all_totals\"><!--{}--></div>", TOTALS)
        } else {
            TOTALS.to_string()
        };
        format!(
            "<html><body>{}{}{}</body></html>",
            STANDINGS_E, STANDINGS_W, totals
        )
    }

    #[test]
    fn url_uses_the_year_the_season_ends() {
        assert_eq!(
            season_page_url(&Season::starting(2019)),
            "https://www.basketball-reference.com/leagues/NBA_2020.html"
        );
    }

    #[test]
    fn totals_rows_map_to_franchises() {
        let page = parse_season_page(&page_html(false)).unwrap();
        assert_eq!(
            page.three_point.get("MIL"),
            Some(&ThreePointLine {
                three_pt_percentage: 0.355,
                three_pt_made: 1016,
                three_pt_attempts: 2867,
                games_played: 73,
            })
        );
        assert_eq!(page.three_point.get("BKN").unwrap().three_pt_made, 968);
        // malformed numeric cell and the league average row are skipped
        assert!(page.three_point.get("CHA").is_none());
        assert_eq!(page.three_point.len(), 2);
    }

    #[test]
    fn commented_out_tables_are_found() {
        let page = parse_season_page(&page_html(true)).unwrap();
        assert_eq!(page.three_point.len(), 2);
        assert_eq!(page.three_point.get("MIL").unwrap().three_pt_attempts, 2867);
    }

    #[test]
    fn standings_from_both_conferences() {
        let page = parse_season_page(&page_html(false)).unwrap();
        assert_eq!(page.wins.len(), 3);
        assert_eq!(
            page.wins.get("MIL"),
            Some(&WinLine { win_percentage: 0.767, wins: 56, losses: 17 })
        );
        assert_eq!(page.wins.get("LAL").unwrap().wins, 52);
        let nets = page.wins.get("BKN").unwrap();
        assert!((nets.win_percentage - 35.0 / 72.0).abs() < 1e-12);
    }

    #[test]
    fn missing_tables_give_an_empty_page() {
        let page = parse_season_page("<html><body><p>Rate limited</p></body></html>").unwrap();
        assert_eq!(page, SeasonPage::default());
    }

    #[test]
    fn seeds_are_stripped() {
        assert_eq!(strip_seed("Brooklyn Nets (7)"), "Brooklyn Nets");
        assert_eq!(strip_seed("Boston Celtics*"), "Boston Celtics*");
        assert_eq!(win_percentage(0, 0), 0.0);
        assert_eq!(win_percentage(3, 1), 0.75);
    }
}
