mod config;
mod error;
mod nba;

use std::env;

use anyhow::{anyhow, Context, Result};
use clap::{ArgEnum, Args, Parser, Subcommand};
use log::info;

use crate::config::{GlobalOpts, Settings, BBREF_PAUSE, NBA_STATS_PAUSE, SPORTRADAR_PAUSE};
use crate::nba::batch::{run_batch, SelectionScope, StatSource};
use crate::nba::db::StatsStore;
use crate::nba::endpoints::NbaDefenseSource;
use crate::nba::reference::{ReferenceSource, ReferenceStat};
use crate::nba::report::{
    render_progress, render_teams, write_report, DefenseReport, EfficiencyReport, ThreePointReport,
};
use crate::nba::season::Season;
use crate::nba::sportradar::{dump_rosters, EfficiencySource, SportradarClient};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct NBACli {
    #[clap(flatten)]
    opts: GlobalOpts,

    #[clap(subcommand)]
    cmd: Commands,
}

#[derive(Args, Debug)]
struct CollectArgs {
    /// Team/season pairs to fetch in this run
    #[clap(short, long, default_value = "15")]
    batch: usize,

    /// Select across every season instead of the first incomplete one
    #[clap(long)]
    all_seasons: bool,
}

impl CollectArgs {
    fn scope(&self) -> SelectionScope {
        if self.all_seasons {
            SelectionScope::AllSeasons
        } else {
            SelectionScope::FirstIncompleteSeason
        }
    }
}

#[derive(ArgEnum, Clone, Copy, Debug, PartialEq)]
enum ReportKind {
    ThreePoint,
    Defense,
    Efficiency,
    All,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the schema and seed teams and seasons
    Setup {
        /// Drop every stat table first
        #[clap(long)]
        reset: bool,
    },
    /// Team 3PT totals from basketball-reference
    ThreePoint(CollectArgs),
    /// Win/loss records from basketball-reference standings
    Wins(CollectArgs),
    /// Defensive totals from stats.nba.com
    Defense(CollectArgs),
    /// Top five player efficiencies per team from Sportradar
    Efficiency {
        /// Teams to fetch in this run; each costs one call per rostered player
        #[clap(short, long, default_value = "5")]
        batch: usize,

        /// Season to collect, written as 2023-2024
        #[clap(short, long, default_value = "2023-2024")]
        season: String,
    },
    /// Save the league hierarchy and every team profile as JSON
    Rosters,
    /// Show how many teams are stored per season and table
    Progress,
    /// Write correlation and comparison reports to the output directory
    Report {
        /// Which report to write
        #[clap(arg_enum)]
        kind: ReportKind,

        /// Season for the efficiency comparison; defaults to the latest one collected
        #[clap(long)]
        season: Option<String>,
    },
    /// Find teams by name or abbreviation
    Lookup {
        /// Part of a team name or abbreviation
        keyword: String,
    },
}

fn init_logging() {
    let filters = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    pretty_env_logger::formatted_builder().parse_filters(&filters).init();
}

fn open_store(settings: &Settings) -> Result<StatsStore> {
    let store = StatsStore::open(&settings.db)?;
    let seeded = store.seed().context("seeding teams and seasons")?;
    if seeded.teams_added > 0 || seeded.seasons_added > 0 {
        info!("seeded {} team(s) and {} season(s)", seeded.teams_added, seeded.seasons_added);
    }
    Ok(store)
}

fn print_progress(store: &StatsStore) -> Result<()> {
    println!("{}", render_progress(&store.progress()?, store.team_count()?));
    Ok(())
}

fn collect<S: StatSource>(
    store: &mut StatsStore,
    settings: &Settings,
    source: &mut S,
    scope: SelectionScope,
    batch: usize,
) -> Result<()> {
    let report = run_batch(store, source, &settings.batch_options(scope, batch))?;
    info!(
        "{}: {} selected, {} inserted, {} already stored, {} skipped",
        source.name(),
        report.selected,
        report.inserted,
        report.duplicates,
        report.skipped()
    );
    println!(
        "Inserted {} row(s) into {} ({} skipped: {} without data, {} rate limited, {} failed)",
        report.inserted,
        source.table().table_name(),
        report.skipped(),
        report.missing,
        report.rate_limited,
        report.failed
    );
    println!(
        "{} now holds {} row(s)",
        source.table().table_name(),
        store.row_count(source.table())?
    );
    print_progress(store)
}

fn write_reports(store: &StatsStore, settings: &Settings, kind: ReportKind, season: Option<&Season>) -> Result<()> {
    let out_dir = settings.out_dir.as_path();
    let mut written = Vec::new();
    if kind == ReportKind::ThreePoint || kind == ReportKind::All {
        let report = ThreePointReport::build(store)?;
        written.push(write_report(out_dir, "3pt_win_correlation", &report.render(), &report.chart())?);
    }
    if kind == ReportKind::Defense || kind == ReportKind::All {
        let report = DefenseReport::build(store)?;
        written.push(write_report(out_dir, "defense_win_correlation", &report.render(), &report.chart())?);
    }
    if kind == ReportKind::Efficiency || kind == ReportKind::All {
        let report = EfficiencyReport::build(store, season)?;
        written.push(write_report(out_dir, "team_efficiency_comparison", &report.render(), &report.chart())?);
    }
    for (text, chart) in written {
        println!("wrote {} and {}", text.display(), chart.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let args = NBACli::parse();
    let settings = Settings::from_opts(args.opts);
    match args.cmd {
        Commands::Setup { reset } => {
            let store = StatsStore::open(&settings.db)?;
            if reset {
                store.reset_stats().context("resetting stat tables")?;
                info!("stat tables dropped and recreated");
            }
            let seeded = store.seed()?;
            println!(
                "{}: {} team(s) and {} season(s) added",
                settings.db.display(),
                seeded.teams_added,
                seeded.seasons_added
            );
            print_progress(&store)?;
        }
        Commands::ThreePoint(args) => {
            let mut store = open_store(&settings)?;
            let mut source = ReferenceSource::new(ReferenceStat::ThreePoint, BBREF_PAUSE);
            collect(&mut store, &settings, &mut source, args.scope(), args.batch)?;
        }
        Commands::Wins(args) => {
            let mut store = open_store(&settings)?;
            let mut source = ReferenceSource::new(ReferenceStat::Wins, BBREF_PAUSE);
            collect(&mut store, &settings, &mut source, args.scope(), args.batch)?;
        }
        Commands::Defense(args) => {
            let mut store = open_store(&settings)?;
            let mut source = NbaDefenseSource::new(NBA_STATS_PAUSE);
            collect(&mut store, &settings, &mut source, args.scope(), args.batch)?;
        }
        Commands::Efficiency { batch, season } => {
            let season: Season = season.parse()?;
            let key = settings.sportradar_key()?;
            let mut store = open_store(&settings)?;
            let season_id = store
                .season_row(&season)?
                .map(|row| row.season_id)
                .ok_or_else(|| anyhow!("{} is not one of the tracked seasons", season))?;
            let mut source = EfficiencySource::new(SportradarClient::new(key, SPORTRADAR_PAUSE));
            collect(&mut store, &settings, &mut source, SelectionScope::Season(season_id), batch)?;
        }
        Commands::Rosters => {
            let mut api = SportradarClient::new(settings.sportradar_key()?, SPORTRADAR_PAUSE);
            let files = dump_rosters(&mut api, &settings.out_dir)?;
            println!("wrote {} file(s) to {}", files.len(), settings.out_dir.display());
        }
        Commands::Progress => {
            let store = open_store(&settings)?;
            print_progress(&store)?;
        }
        Commands::Report { kind, season } => {
            let season = season.map(|s| s.parse::<Season>()).transpose()?;
            let store = open_store(&settings)?;
            write_reports(&store, &settings, kind, season.as_ref())?;
        }
        Commands::Lookup { keyword } => {
            let store = open_store(&settings)?;
            let teams = store.search_teams(&keyword)?;
            if teams.is_empty() {
                println!("No teams match {:?}", keyword);
            } else {
                println!("{}", render_teams(&teams));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Commands {
        let mut argv = vec!["hoopstats"];
        argv.extend_from_slice(args);
        NBACli::try_parse_from(argv).unwrap().cmd
    }

    #[test]
    fn collectors_default_to_small_batches() {
        match parse(&["wins"]) {
            Commands::Wins(args) => {
                assert_eq!(args.batch, 15);
                assert_eq!(args.scope(), SelectionScope::FirstIncompleteSeason);
            }
            other => panic!("parsed {:?}", other),
        }
        match parse(&["defense", "--all-seasons"]) {
            Commands::Defense(args) => {
                assert_eq!(args.batch, 15);
                assert_eq!(args.scope(), SelectionScope::AllSeasons);
            }
            other => panic!("parsed {:?}", other),
        }
        match parse(&["efficiency"]) {
            Commands::Efficiency { batch, season } => {
                assert_eq!(batch, 5);
                assert_eq!(season, "2023-2024");
            }
            other => panic!("parsed {:?}", other),
        }
        match parse(&["three-point", "--batch", "8"]) {
            Commands::ThreePoint(args) => assert_eq!(args.batch, 8),
            other => panic!("parsed {:?}", other),
        }
    }

    #[test]
    fn report_season_is_optional() {
        match parse(&["report", "efficiency", "--season", "2022-2023"]) {
            Commands::Report { kind, season } => {
                assert_eq!(kind, ReportKind::Efficiency);
                assert_eq!(season.as_deref(), Some("2022-2023"));
            }
            other => panic!("parsed {:?}", other),
        }
        match parse(&["report", "all"]) {
            Commands::Report { season, .. } => assert!(season.is_none()),
            other => panic!("parsed {:?}", other),
        }
    }
}
