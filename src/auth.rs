// ABOUTME: Token discovery with precedence chain
// ABOUTME: CLI flag → supabase.json session file → BEARER_TOKEN env var

use crate::config::default_session_paths;
use crate::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Finds the API bearer token. An explicit `supabase` path must hold a
/// token; the default session locations are only tried if present.
pub fn resolve_token(cli_token: Option<String>, supabase: Option<&Path>) -> Result<String> {
    let env_token = env::var("BEARER_TOKEN").ok();
    let defaults = if supabase.is_some() {
        Vec::new()
    } else {
        default_session_paths()
    };
    resolve_from(cli_token, supabase, &defaults, env_token)
}

fn resolve_from(
    cli_token: Option<String>,
    explicit: Option<&Path>,
    candidates: &[PathBuf],
    env_token: Option<String>,
) -> Result<String> {
    // 1. CLI flag
    if let Some(token) = cli_token.filter(|t| !t.trim().is_empty()) {
        return Ok(token.trim().to_string());
    }

    // 2. Session file
    if let Some(path) = explicit {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        return access_token(&content)?.ok_or_else(|| {
            Error::Auth(format!("no access token in {}", path.display()))
        });
    }

    for path in candidates {
        if let Some(token) = parse_session_file(path)? {
            debug!(path = %path.display(), "using session file");
            return Ok(token);
        }
    }

    // 3. Environment variable
    if let Some(token) = env_token.filter(|t| !t.trim().is_empty()) {
        return Ok(token.trim().to_string());
    }

    Err(Error::Auth(
        "No bearer token found. Provide via --token, --supabase, session file, or BEARER_TOKEN env var".into(),
    ))
}

fn parse_session_file(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    access_token(&content)
}

/// Pulls `access_token` out of the stringified JSON in `workos_tokens`.
fn access_token(session_json: &str) -> Result<Option<String>> {
    let json: serde_json::Value = serde_json::from_str(session_json)?;

    let Some(workos_str) = json.get("workos_tokens").and_then(|v| v.as_str()) else {
        return Ok(None);
    };

    let workos: serde_json::Value = serde_json::from_str(workos_str)?;
    Ok(workos
        .get("access_token")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string))
}
