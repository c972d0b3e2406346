// ABOUTME: Default locations and user path expansion
// ABOUTME: Resolves ~ and $VAR in paths, finds Granola's cache and session files

use crate::{Error, Result};
use directories::BaseDirs;
use regex::{Captures, Regex};
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

pub const CACHE_FILE_NAME: &str = "cache-v3.json";
pub const SESSION_FILE_NAME: &str = "supabase.json";

pub const DEFAULT_NOTES_DIR: &str = "./notes";
pub const DEFAULT_TRANSCRIPTS_DIR: &str = "./transcripts";
pub const DEFAULT_EXPORT_DIR: &str = "./export";

pub fn home_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}

/// Granola's desktop data directory on macOS.
fn granola_app_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join("Library").join("Application Support").join("Granola"))
}

pub fn default_cache_path() -> Option<PathBuf> {
    granola_app_dir().map(|dir| dir.join(CACHE_FILE_NAME))
}

/// Session files tried in order when none is given explicitly.
pub fn default_session_paths() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = granola_app_dir()
        .map(|dir| dir.join(SESSION_FILE_NAME))
        .into_iter()
        .collect();

    if let Some(dirs) = BaseDirs::new() {
        let xdg = dirs.config_dir().join("granola").join(SESSION_FILE_NAME);
        if !paths.contains(&xdg) {
            paths.push(xdg);
        }
    }

    paths
}

fn env_vars() -> &'static Regex {
    static VARS: OnceLock<Regex> = OnceLock::new();
    VARS.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("static regex")
    })
}

/// Expands `$VAR` and `${VAR}` (unset variables become empty).
pub fn expand_env(input: &str) -> String {
    env_vars()
        .replace_all(input, |caps: &Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            env::var(name).unwrap_or_default()
        })
        .into_owned()
}

/// Expands environment variables and a leading `~` in a user-supplied path.
pub fn resolve_path(input: &str) -> Result<PathBuf> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::Config("path cannot be empty".into()));
    }

    let expanded = expand_env(trimmed);

    let Some(rest) = expanded.strip_prefix('~') else {
        return Ok(PathBuf::from(&expanded));
    };
    if !(rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\')) {
        return Ok(PathBuf::from(&expanded));
    }

    let home =
        home_dir().ok_or_else(|| Error::Config("could not determine home directory".into()))?;
    let rest = rest.trim_start_matches(['/', '\\']);
    if rest.is_empty() {
        Ok(home)
    } else {
        Ok(home.join(rest))
    }
}
