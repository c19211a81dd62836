/// One NBA franchise and the codes each data source knows it by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Franchise {
    pub name: &'static str,
    /// NBA.com abbreviation, also used as the Sportradar alias.
    pub abbreviation: &'static str,
    /// basketball-reference.com code.
    pub reference_code: &'static str,
    /// stats.nba.com TeamID.
    pub nba_team_id: i64,
}

const fn franchise(
    name: &'static str,
    abbreviation: &'static str,
    reference_code: &'static str,
    nba_team_id: i64,
) -> Franchise {
    Franchise { name, abbreviation, reference_code, nba_team_id }
}

/// Alphabetical by name; position + 1 is the `team_id` seeded into `Teams`.
pub const FRANCHISES: [Franchise; 30] = [
    franchise("Atlanta Hawks", "ATL", "ATL", 1610612737),
    franchise("Boston Celtics", "BOS", "BOS", 1610612738),
    franchise("Brooklyn Nets", "BKN", "BRK", 1610612751),
    franchise("Charlotte Hornets", "CHA", "CHO", 1610612766),
    franchise("Chicago Bulls", "CHI", "CHI", 1610612741),
    franchise("Cleveland Cavaliers", "CLE", "CLE", 1610612739),
    franchise("Dallas Mavericks", "DAL", "DAL", 1610612742),
    franchise("Denver Nuggets", "DEN", "DEN", 1610612743),
    franchise("Detroit Pistons", "DET", "DET", 1610612765),
    franchise("Golden State Warriors", "GSW", "GSW", 1610612744),
    franchise("Houston Rockets", "HOU", "HOU", 1610612745),
    franchise("Indiana Pacers", "IND", "IND", 1610612754),
    franchise("Los Angeles Clippers", "LAC", "LAC", 1610612746),
    franchise("Los Angeles Lakers", "LAL", "LAL", 1610612747),
    franchise("Memphis Grizzlies", "MEM", "MEM", 1610612763),
    franchise("Miami Heat", "MIA", "MIA", 1610612748),
    franchise("Milwaukee Bucks", "MIL", "MIL", 1610612749),
    franchise("Minnesota Timberwolves", "MIN", "MIN", 1610612750),
    franchise("New Orleans Pelicans", "NOP", "NOP", 1610612740),
    franchise("New York Knicks", "NYK", "NYK", 1610612752),
    franchise("Oklahoma City Thunder", "OKC", "OKC", 1610612760),
    franchise("Orlando Magic", "ORL", "ORL", 1610612753),
    franchise("Philadelphia 76ers", "PHI", "PHI", 1610612755),
    franchise("Phoenix Suns", "PHX", "PHO", 1610612756),
    franchise("Portland Trail Blazers", "POR", "POR", 1610612757),
    franchise("Sacramento Kings", "SAC", "SAC", 1610612758),
    franchise("San Antonio Spurs", "SAS", "SAS", 1610612759),
    franchise("Toronto Raptors", "TOR", "TOR", 1610612761),
    franchise("Utah Jazz", "UTA", "UTA", 1610612762),
    franchise("Washington Wizards", "WAS", "WAS", 1610612764),
];

pub fn by_abbreviation(abbreviation: &str) -> Option<&'static Franchise> {
    FRANCHISES
        .iter()
        .find(|f| f.abbreviation.eq_ignore_ascii_case(abbreviation) || f.reference_code.eq_ignore_ascii_case(abbreviation))
}

/// Matches a scraped team name, ignoring case, surrounding whitespace and the
/// playoff marker basketball-reference appends.
pub fn by_name(name: &str) -> Option<&'static Franchise> {
    let cleaned = clean_team_name(name);
    FRANCHISES.iter().find(|f| f.name.eq_ignore_ascii_case(&cleaned))
}

pub fn clean_team_name(name: &str) -> String {
    name.trim().trim_end_matches('*').trim().to_string()
}

/// A row of the `Teams` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub team_id: i64,
    pub team_name: String,
    pub team_abbreviation: String,
}

impl Team {
    pub fn franchise(&self) -> Option<&'static Franchise> {
        by_abbreviation(&self.team_abbreviation).or_else(|| by_name(&self.team_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_unique_franchises() {
        let mut abbreviations: Vec<&str> = FRANCHISES.iter().map(|f| f.abbreviation).collect();
        abbreviations.sort_unstable();
        abbreviations.dedup();
        assert_eq!(abbreviations.len(), 30);

        let mut ids: Vec<i64> = FRANCHISES.iter().map(|f| f.nba_team_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 30);
    }

    #[test]
    fn reference_codes_resolve_to_canonical_team() {
        assert_eq!(by_abbreviation("BRK").unwrap().abbreviation, "BKN");
        assert_eq!(by_abbreviation("cho").unwrap().abbreviation, "CHA");
        assert_eq!(by_abbreviation("PHO").unwrap().name, "Phoenix Suns");
        assert!(by_abbreviation("SEA").is_none());
    }

    #[test]
    fn scraped_names_match_with_playoff_marker() {
        assert_eq!(by_name("Boston Celtics*").unwrap().abbreviation, "BOS");
        assert_eq!(by_name("  los angeles lakers ").unwrap().abbreviation, "LAL");
        assert!(by_name("League Average").is_none());
    }
}
