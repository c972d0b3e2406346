// ABOUTME: Command-line interface definitions using clap
// ABOUTME: Defines the export subcommands and global flags with env fallbacks

use crate::api::DEFAULT_BASE_URL;
use crate::config::{DEFAULT_EXPORT_DIR, DEFAULT_NOTES_DIR, DEFAULT_TRANSCRIPTS_DIR};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "granary")]
#[command(about = "Export Granola notes and transcripts to local files", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Bearer token (overrides session/env)
    #[arg(long, global = true, env = "GRANARY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Granola session file holding the access token
    #[arg(long, global = true, env = "GRANARY_SUPABASE", value_name = "PATH")]
    pub supabase: Option<String>,

    /// API base URL
    #[arg(long, global = true, env = "GRANARY_API_BASE", default_value = DEFAULT_BASE_URL)]
    pub api_base: String,

    /// HTTP timeout in seconds
    #[arg(long, global = true, default_value_t = 120)]
    pub timeout_secs: u64,

    /// Disable throttling (not recommended)
    #[arg(long, global = true)]
    pub no_throttle: bool,

    /// Throttle range in ms (min:max)
    #[arg(long, global = true, value_parser = parse_throttle_range)]
    pub throttle_ms: Option<(u64, u64)>,

    /// Verbose diagnostics on stderr
    #[arg(long, global = true, env = "GRANARY_DEBUG")]
    pub debug: bool,
}

fn parse_throttle_range(s: &str) -> Result<(u64, u64), String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err("Expected format: min:max".into());
    }

    let min = parts[0].parse().map_err(|_| "Invalid min value")?;
    let max = parts[1].parse().map_err(|_| "Invalid max value")?;

    if min > max {
        return Err("min must be <= max".into());
    }

    Ok((min, max))
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Export notes from the API as Markdown with frontmatter
    Notes {
        /// Output directory
        #[arg(long, env = "GRANARY_NOTES_OUTPUT", default_value = DEFAULT_NOTES_DIR)]
        output: String,
    },

    /// Export transcripts from the local cache as text
    Transcripts {
        /// Output directory
        #[arg(long, env = "GRANARY_TRANSCRIPTS_OUTPUT", default_value = DEFAULT_TRANSCRIPTS_DIR)]
        output: String,

        /// Granola cache file
        #[arg(long, env = "GRANARY_CACHE", value_name = "PATH")]
        cache: Option<String>,
    },

    /// Export notes and transcripts together, mirrored into folders (default)
    Export {
        /// Output directory
        #[arg(long, env = "GRANARY_EXPORT_OUTPUT", default_value = DEFAULT_EXPORT_DIR)]
        output: String,

        /// Granola cache file
        #[arg(long, env = "GRANARY_CACHE", value_name = "PATH")]
        cache: Option<String>,

        /// Folder to leave out of the export (repeatable)
        #[arg(long = "exclude-folder", value_name = "NAME")]
        exclude_folders: Vec<String>,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or_else(|| Commands::Export {
            output: DEFAULT_EXPORT_DIR.into(),
            cache: None,
            exclude_folders: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        <Cli as CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_parse_throttle_range_valid() {
        let result = parse_throttle_range("100:300").unwrap();
        assert_eq!(result, (100, 300));
    }

    #[test]
    fn test_parse_throttle_range_invalid() {
        assert!(parse_throttle_range("300:100").is_err());
        assert!(parse_throttle_range("abc:def").is_err());
        assert!(parse_throttle_range("100").is_err());
    }

    #[test]
    fn test_default_command_is_export() {
        let cli = Cli::try_parse_from(["granary"]).unwrap();
        assert!(matches!(cli.command(), Commands::Export { .. }));
    }

    #[test]
    fn test_export_exclude_folders() {
        let cli = Cli::try_parse_from([
            "granary",
            "export",
            "--output",
            "/tmp/out",
            "--exclude-folder",
            "Personal",
            "--exclude-folder",
            "Archive",
        ])
        .unwrap();

        match cli.command() {
            Commands::Export {
                output,
                exclude_folders,
                ..
            } => {
                assert_eq!(output, "/tmp/out");
                assert_eq!(exclude_folders, vec!["Personal", "Archive"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "granary",
            "notes",
            "--token",
            "abc",
            "--throttle-ms",
            "10:20",
            "--timeout-secs",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.token.as_deref(), Some("abc"));
        assert_eq!(cli.throttle_ms, Some((10, 20)));
        assert_eq!(cli.timeout_secs, 5);
        assert!(matches!(cli.command(), Commands::Notes { .. }));
    }
}
