//! Environment-driven settings and command-line helpers shared by the
//! binaries.

use std::env;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use crate::metrics_catalog::PercentScale;
use crate::query::{DEFAULT_PER_PAGE, MAX_PER_PAGE};

const APP_DIR: &str = "football_stats";
const DB_FILE: &str = "stats.sqlite";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db_path: PathBuf,
    pub log_filter: String,
    pub percent_scale: PercentScale,
    pub page_size: usize,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(opt_env)
    }

    /// Builds settings from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = get("STATS_DB_PATH")
            .map(|p| PathBuf::from(p.trim()))
            .unwrap_or_else(|| default_db_path_from(&get));
        let log_filter = get("STATS_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let percent_scale = get("STATS_PERCENT_SOURCE")
            .and_then(|raw| PercentScale::parse(&raw))
            .unwrap_or_default();
        let page_size = get("STATS_PAGE_SIZE")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .map(|n| n.clamp(1, MAX_PER_PAGE))
            .unwrap_or(DEFAULT_PER_PAGE);

        Self {
            db_path,
            log_filter,
            percent_scale,
            page_size,
        }
    }
}

/// `.env.local` first, then `.env`; neither has to exist.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

/// Logs go to stderr so command output on stdout stays clean.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn default_db_path() -> PathBuf {
    default_db_path_from(&opt_env)
}

fn default_db_path_from(get: &impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(base) = get("XDG_DATA_HOME").filter(|v| !v.trim().is_empty()) {
        return PathBuf::from(base).join(APP_DIR).join(DB_FILE);
    }
    match get("HOME").filter(|v| !v.trim().is_empty()) {
        Some(home) => PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR)
            .join(DB_FILE),
        None => PathBuf::from(DB_FILE),
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|val| {
        if val.trim().is_empty() {
            None
        } else {
            Some(val)
        }
    })
}

/// Value of `--name value` or `--name=value`; blank values are ignored.
pub fn flag_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() && !next.starts_with("--") {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|arg| arg == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let settings = Settings::from_lookup(lookup(&[("HOME", "/home/coach")]));
        assert_eq!(
            settings.db_path,
            PathBuf::from("/home/coach/.local/share/football_stats/stats.sqlite")
        );
        assert_eq!(settings.log_filter, "info");
        assert_eq!(settings.percent_scale, PercentScale::Fraction);
        assert_eq!(settings.page_size, 50);
    }

    #[test]
    fn explicit_values_win_and_page_size_is_clamped() {
        let settings = Settings::from_lookup(lookup(&[
            ("STATS_DB_PATH", " /tmp/stats.db "),
            ("XDG_DATA_HOME", "/xdg"),
            ("STATS_LOG", "football_stats=debug"),
            ("STATS_PERCENT_SOURCE", "points"),
            ("STATS_PAGE_SIZE", "5000"),
        ]));
        assert_eq!(settings.db_path, PathBuf::from("/tmp/stats.db"));
        assert_eq!(settings.log_filter, "football_stats=debug");
        assert_eq!(settings.percent_scale, PercentScale::Points);
        assert_eq!(settings.page_size, 1000);
    }

    #[test]
    fn xdg_data_home_is_preferred_over_home() {
        let settings = Settings::from_lookup(lookup(&[("XDG_DATA_HOME", "/xdg"), ("HOME", "/h")]));
        assert_eq!(
            settings.db_path,
            PathBuf::from("/xdg/football_stats/stats.sqlite")
        );
    }

    #[test]
    fn flag_value_accepts_both_forms() {
        let args = ["--db=/a.sqlite", "--file", "mfl.csv", "--value", "--force-new-season"]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        assert_eq!(flag_value(&args, "--db"), Some("/a.sqlite".to_string()));
        assert_eq!(flag_value(&args, "--file"), Some("mfl.csv".to_string()));
        assert_eq!(flag_value(&args, "--value"), None);
        assert!(has_flag(&args, "--force-new-season"));
    }
}
