use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use log::{info, warn};

use crate::error::FetchError;
use crate::nba::db::{StatRow, StatTable, StatsStore};
use crate::nba::season::SeasonRow;
use crate::nba::teams::Team;

/// One team in one season.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub team: Team,
    pub season: SeasonRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionScope {
    /// Only the lowest season that still has teams missing.
    FirstIncompleteSeason,
    AllSeasons,
    Season(i64),
}

/// A remote source that can produce the row for one work item.
pub trait StatSource {
    fn name(&self) -> &str;
    fn table(&self) -> StatTable;
    /// `Ok(None)` means the source answered but had nothing for this item.
    fn fetch(&mut self, item: &WorkItem) -> Result<Option<StatRow>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub scope: SelectionScope,
    pub batch_size: usize,
    /// Sleep after a 429 before moving on to the next item.
    pub rate_limit_backoff: Duration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub selected: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub missing: usize,
    pub rate_limited: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn skipped(&self) -> usize {
        self.missing + self.rate_limited + self.failed
    }
}

/// Selects the next batch of unprocessed items for `source` and fetches them
/// one at a time. Items that fail are skipped and stay pending for the next run.
pub fn run_batch<S: StatSource + ?Sized>(
    store: &mut StatsStore,
    source: &mut S,
    options: &BatchOptions,
) -> Result<BatchReport> {
    let table = source.table();
    let items = store.pending_items(table, options.scope, options.batch_size)?;
    let mut report = BatchReport { selected: items.len(), ..Default::default() };
    if items.is_empty() {
        info!("{}: nothing left to fetch", source.name());
        return Ok(report);
    }
    info!("{}: processing {} item(s)", source.name(), items.len());

    for item in &items {
        match source.fetch(item) {
            Ok(Some(row)) => {
                if row.table() != table {
                    bail!(
                        "{} produced a {} row but feeds {}",
                        source.name(),
                        row.table().table_name(),
                        table.table_name()
                    );
                }
                if store.insert_row(item, &row)? {
                    report.inserted += 1;
                    info!("added {} stats for {} ({})", table.label(), item.team.team_name, item.season.season);
                } else {
                    report.duplicates += 1;
                    info!("{} already has {} stats for {}, skipping", item.team.team_name, table.label(), item.season.season);
                }
            }
            Ok(None) => {
                report.missing += 1;
                warn!("{}: no data for {} ({})", source.name(), item.team.team_name, item.season.season);
            }
            Err(e) if e.is_rate_limited() => {
                report.rate_limited += 1;
                warn!("{}; sleeping {:?} and skipping {}", e, options.rate_limit_backoff, item.team.team_name);
                thread::sleep(options.rate_limit_backoff);
            }
            Err(e) => {
                report.failed += 1;
                warn!("{}: failed {} ({}): {}", source.name(), item.team.team_name, item.season.season, e);
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nba::db::tests::{seeded_store, win};
    use std::collections::HashMap;

    /// Answers from a canned table keyed by (team_id, season_id); anything
    /// not in the table has no data.
    struct FakeSource {
        table: StatTable,
        answers: HashMap<(i64, i64), Result<Option<StatRow>, u16>>,
        calls: Vec<(i64, i64)>,
    }

    impl FakeSource {
        fn wins() -> Self {
            FakeSource { table: StatTable::Win, answers: HashMap::new(), calls: Vec::new() }
        }

        fn every_team_in(mut self, season_id: i64) -> Self {
            for team_id in 1..=30 {
                self.answers.insert((team_id, season_id), Ok(Some(win(0.5))));
            }
            self
        }
    }

    impl StatSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        fn table(&self) -> StatTable {
            self.table
        }

        fn fetch(&mut self, item: &WorkItem) -> Result<Option<StatRow>, FetchError> {
            let key = (item.team.team_id, item.season.season_id);
            self.calls.push(key);
            match self.answers.get(&key) {
                Some(Ok(row)) => Ok(row.clone()),
                Some(Err(status)) => Err(crate::nba::http::status_error("https://fake/", *status)),
                None => Ok(None),
            }
        }
    }

    fn options(batch_size: usize) -> BatchOptions {
        BatchOptions {
            scope: SelectionScope::FirstIncompleteSeason,
            batch_size,
            rate_limit_backoff: Duration::ZERO,
        }
    }

    #[test]
    fn second_run_without_new_data_inserts_nothing() {
        let mut store = seeded_store();
        let mut source = FakeSource::wins().every_team_in(1);

        let first = run_batch(&mut store, &mut source, &options(30)).unwrap();
        assert_eq!(first.inserted, 30);

        // season 1 is complete; season 2 has no data at all
        let second = run_batch(&mut store, &mut source, &options(30)).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.missing, 30);
        assert_eq!(store.row_count(StatTable::Win).unwrap(), 30);
    }

    #[test]
    fn batches_resume_where_the_last_one_stopped() {
        let mut store = seeded_store();
        let mut source = FakeSource::wins().every_team_in(1);

        let first = run_batch(&mut store, &mut source, &options(15)).unwrap();
        assert_eq!(first, BatchReport { selected: 15, inserted: 15, ..Default::default() });
        let second = run_batch(&mut store, &mut source, &options(15)).unwrap();
        assert_eq!(second.inserted, 15);

        let mut seen = source.calls.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 30, "no pair fetched twice");
        assert_eq!(store.completed_count(StatTable::Win, 1).unwrap(), 30);
    }

    #[test]
    fn rate_limited_items_are_skipped_and_retried_next_run() {
        let mut store = seeded_store();
        let mut source = FakeSource::wins().every_team_in(1);
        source.answers.insert((2, 1), Err(429));
        source.answers.insert((3, 1), Err(500));

        let first = run_batch(&mut store, &mut source, &options(5)).unwrap();
        assert_eq!(first.inserted, 3);
        assert_eq!(first.rate_limited, 1);
        assert_eq!(first.failed, 1);
        assert_eq!(first.skipped(), 2);
        // the 429 item was attempted exactly once in this run
        assert_eq!(source.calls.iter().filter(|k| **k == (2, 1)).count(), 1);

        source.answers.insert((2, 1), Ok(Some(win(0.7))));
        let retry = run_batch(&mut store, &mut source, &options(2)).unwrap();
        assert_eq!(retry.selected, 2);
        assert_eq!(retry.inserted, 1);
        assert_eq!(store.completed_count(StatTable::Win, 1).unwrap(), 4);
    }

    #[test]
    fn empty_selection_is_a_no_op() {
        let mut store = seeded_store();
        let mut source = FakeSource::wins();
        let opts = BatchOptions { batch_size: 0, ..options(0) };
        let report = run_batch(&mut store, &mut source, &opts).unwrap();
        assert_eq!(report, BatchReport::default());
        assert!(source.calls.is_empty());
    }

    #[test]
    fn rows_for_the_wrong_table_are_rejected() {
        let mut store = seeded_store();
        let mut source = FakeSource::wins().every_team_in(1);
        source.table = StatTable::ThreePoint;
        assert!(run_batch(&mut store, &mut source, &options(1)).is_err());
        assert_eq!(store.row_count(StatTable::ThreePoint).unwrap(), 0);
    }
}
