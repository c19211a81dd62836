use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};

/// Seasons seeded into the `Seasons` table, in `season_id` order.
pub const DEFAULT_SEASONS: [&str; 5] = [
    "2019-2020",
    "2020-2021",
    "2021-2022",
    "2022-2023",
    "2023-2024",
];

/// A regular season spanning two calendar years, stored as `2019-2020`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Season {
    start_year: i32,
}

impl Season {
    pub fn starting(start_year: i32) -> Self {
        Season { start_year }
    }

    pub fn end_year(&self) -> i32 {
        self.start_year + 1
    }

    /// `2019-20`, the `YEAR` column format on stats.nba.com.
    pub fn nba_code(&self) -> String {
        format!("{}-{:02}", self.start_year, self.end_year() % 100)
    }

    /// basketball-reference names a season page after the year it ends in.
    pub fn reference_year(&self) -> i32 {
        self.end_year()
    }

    /// Sportradar keys a season by the year it starts in.
    pub fn sportradar_year(&self) -> i32 {
        self.start_year
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.start_year, self.end_year())
    }
}

impl FromStr for Season {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (first, second) = match s.trim().split_once('-') {
            Some(parts) => parts,
            None => bail!("season '{}' is not in YYYY-YYYY form", s),
        };
        if first.len() != 4 || second.len() != 4 {
            bail!("season '{}' is not in YYYY-YYYY form", s);
        }
        let start: i32 = first.parse()?;
        let end: i32 = second.parse()?;
        if end != start + 1 {
            bail!("season '{}' must span consecutive years", s);
        }
        Ok(Season::starting(start))
    }
}

/// A season as stored in the database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeasonRow {
    pub season_id: i64,
    pub season: Season,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_every_source_format() {
        let season: Season = "2019-2020".parse().unwrap();
        assert_eq!(season.to_string(), "2019-2020");
        assert_eq!(season.nba_code(), "2019-20");
        assert_eq!(season.reference_year(), 2020);
        assert_eq!(season.sportradar_year(), 2019);
    }

    #[test]
    fn century_rollover_keeps_two_digits() {
        assert_eq!(Season::starting(1999).nba_code(), "1999-00");
        assert_eq!(Season::starting(2008).nba_code(), "2008-09");
    }

    #[test]
    fn rejects_malformed_seasons() {
        assert!("2019".parse::<Season>().is_err());
        assert!("2019-20".parse::<Season>().is_err());
        assert!("2019-2021".parse::<Season>().is_err());
        assert!("abcd-efgh".parse::<Season>().is_err());
    }

    #[test]
    fn default_seasons_parse_in_order() {
        let seasons: Vec<Season> = DEFAULT_SEASONS.iter().map(|s| s.parse().unwrap()).collect();
        let mut sorted = seasons.clone();
        sorted.sort();
        assert_eq!(seasons, sorted);
    }
}
