use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Args;

use crate::nba::batch::{BatchOptions, SelectionScope};

pub const BBREF_PAUSE: Duration = Duration::from_secs(3);
pub const NBA_STATS_PAUSE: Duration = Duration::from_secs(5);
pub const SPORTRADAR_PAUSE: Duration = Duration::from_secs(2);

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalOpts {
    /// SQLite database file
    #[clap(long, global = true, env = "HOOPSTATS_DB", default_value = "nba-stats.db")]
    pub db: PathBuf,

    /// Where reports and JSON dumps are written
    #[clap(long, global = true, env = "HOOPSTATS_OUT_DIR", default_value = ".")]
    pub out_dir: PathBuf,

    #[clap(long, global = true, env = "SPORTRADAR_API_KEY", hide_env_values = true)]
    pub sportradar_key: Option<String>,

    /// Seconds to sleep after an HTTP 429 before moving on
    #[clap(long, global = true, env = "HOOPSTATS_BACKOFF_SECS", default_value = "60")]
    pub backoff_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub db: PathBuf,
    pub out_dir: PathBuf,
    pub sportradar_key: Option<String>,
    pub rate_limit_backoff: Duration,
}

impl Settings {
    pub fn from_opts(opts: GlobalOpts) -> Self {
        Settings {
            db: opts.db,
            out_dir: opts.out_dir,
            sportradar_key: opts.sportradar_key.filter(|k| !k.trim().is_empty()),
            rate_limit_backoff: Duration::from_secs(opts.backoff_secs),
        }
    }

    pub fn sportradar_key(&self) -> Result<&str> {
        self.sportradar_key
            .as_deref()
            .ok_or_else(|| anyhow!("a Sportradar API key is required: pass --sportradar-key or set SPORTRADAR_API_KEY"))
    }

    pub fn batch_options(&self, scope: SelectionScope, batch_size: usize) -> BatchOptions {
        BatchOptions {
            scope,
            batch_size,
            rate_limit_backoff: self.rate_limit_backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(key: Option<&str>) -> GlobalOpts {
        GlobalOpts {
            db: PathBuf::from("nba-stats.db"),
            out_dir: PathBuf::from("."),
            sportradar_key: key.map(str::to_string),
            backoff_secs: 60,
        }
    }

    #[test]
    fn missing_key_is_an_error() {
        assert!(Settings::from_opts(opts(None)).sportradar_key().is_err());
        assert!(Settings::from_opts(opts(Some("  "))).sportradar_key().is_err());
        assert_eq!(Settings::from_opts(opts(Some("abc"))).sportradar_key().unwrap(), "abc");
    }

    #[test]
    fn batch_options_carry_backoff() {
        let settings = Settings::from_opts(opts(None));
        let options = settings.batch_options(SelectionScope::AllSeasons, 10);
        assert_eq!(options.rate_limit_backoff, Duration::from_secs(60));
        assert_eq!(options.batch_size, 10);
    }
}
