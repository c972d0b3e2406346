// ABOUTME: Filesystem-safe names for exported documents and folders
// ABOUTME: Sanitizing, per-run de-duplication, and short-id embedding/recovery

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Length of the id prefix embedded in fan-out filenames.
pub const SHORT_ID_LEN: usize = 8;

const MAX_NAME_CHARS: usize = 100;
const MAX_FANOUT_TITLE_CHARS: usize = 80;

fn invalid_chars() -> &'static Regex {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    INVALID.get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("static regex"))
}

fn underscore_runs() -> &'static Regex {
    static RUNS: OnceLock<Regex> = OnceLock::new();
    RUNS.get_or_init(|| Regex::new(r"_+").expect("static regex"))
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn clean(name: &str, fallback: &str, max_chars: usize) -> String {
    let replaced = invalid_chars().replace_all(name, "_");
    let collapsed = underscore_runs().replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');

    if trimmed.is_empty() {
        truncate_chars(fallback, max_chars)
    } else {
        truncate_chars(trimmed, max_chars)
    }
}

/// Base filename (no extension) for a document: its title, or its id when
/// the title is blank.
pub fn sanitize_filename(title: Option<&str>, id: &str) -> String {
    let name = match title.map(str::trim) {
        Some(title) if !title.is_empty() => title,
        _ => id.trim(),
    };
    clean(name, "untitled", MAX_NAME_CHARS)
}

/// Directory name for a folder title.
pub fn sanitize_folder_name(name: &str) -> String {
    clean(name.trim(), "unnamed_folder", MAX_NAME_CHARS)
}

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// `{title}_{short_id}.{ext}` used when one document may live in many folders.
pub fn fanout_filename(title: Option<&str>, id: &str, extension: &str) -> String {
    let name = clean(
        title.map(str::trim).unwrap_or_default(),
        "untitled",
        MAX_FANOUT_TITLE_CHARS,
    );
    format!("{}_{}.{}", name, short_id(id), extension)
}

/// Recovers the short id from a fan-out filename, if it carries one.
pub fn extract_short_id<'a>(file_name: &'a str, extension: &str) -> Option<&'a str> {
    let stem = file_name.strip_suffix(extension)?.strip_suffix('.')?;
    let (_, tail) = stem.rsplit_once('_')?;
    if tail.chars().count() < SHORT_ID_LEN {
        return None;
    }
    Some(short_id(tail))
}

/// Hands out unique names within one export run. The first claim of a name
/// keeps it; later claims get `_2`, `_3`, ... in the order they arrive.
#[derive(Debug, Default)]
pub struct UniqueNames {
    counts: HashMap<String, usize>,
    claimed: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, candidate: &str) -> String {
        let count = self.counts.entry(candidate.to_string()).or_insert(0);
        *count += 1;

        let mut name = if *count == 1 {
            candidate.to_string()
        } else {
            format!("{}_{}", candidate, count)
        };

        // A literal title such as "Standup_2" may already hold the generated name.
        while self.claimed.contains(&name) {
            *count += 1;
            name = format!("{}_{}", candidate, count);
        }

        self.claimed.insert(name.clone());
        name
    }
}
