    use core::fmt;
    use std::fmt::Display;

    pub enum LeagueID {
        NBA,
    }

    pub enum PerMode {
        Totals,
    }

    pub enum SeasonType {
        RegularSeason,
    }

    pub enum TeamID {
        ID(i64)
    }

    impl Display for LeagueID {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            match self {
                LeagueID::NBA => write!(f, "LeagueID=00")
            }
        }
    }

    impl Display for PerMode {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            match self {
                PerMode::Totals => write!(f, "PerMode=Totals"),
            }
        }
    }

    impl Display for SeasonType {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            match self {
                SeasonType::RegularSeason => write!(f, "SeasonType=Regular%20Season"),
            }
        }
    }

    impl Display for TeamID {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            match self {
                TeamID::ID(id) => write!(f, "TeamID={}", id)
            }
        }
    }

    impl Default for LeagueID {
        fn default() -> Self { LeagueID::NBA }
    }

    impl Default for PerMode {
        fn default() -> Self { PerMode::Totals }
    }

    impl Default for SeasonType {
        fn default() -> Self { SeasonType::RegularSeason }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn params_render_as_query_fragments() {
            let query = format!(
                "{}&{}&{}&{}",
                LeagueID::default(),
                PerMode::default(),
                SeasonType::default(),
                TeamID::ID(1610612738)
            );
            assert_eq!(
                query,
                "LeagueID=00&PerMode=Totals&SeasonType=Regular%20Season&TeamID=1610612738"
            );
        }
    }
