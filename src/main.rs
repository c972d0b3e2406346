// ABOUTME: CLI entrypoint for granary command
// ABOUTME: Handles error exit codes and command dispatch

use clap::Parser;
use granary::{
    api::ApiClient,
    auth::resolve_token,
    cache::read_cache,
    cli::{Cli, Commands},
    config::{default_cache_path, resolve_path},
    content::EmptyContent,
    export,
    fs::OsFs,
    logging::init_tracing,
    sync::{ExportDocument, Layout, SyncStats, SyncWriter},
    Error, Result,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

fn main() {
    if let Err(e) = run() {
        eprintln!("granary: [E{}] {}", e.exit_code(), e);
        std::process::exit(e.exit_code());
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.debug) {
        eprintln!("granary: logging disabled: {}", e);
    }

    match cli.command() {
        Commands::Notes { output } => run_notes(&cli, &output),
        Commands::Transcripts { output, cache } => run_transcripts(&output, cache.as_deref()),
        Commands::Export {
            output,
            cache,
            exclude_folders,
        } => run_export(&cli, &output, cache.as_deref(), &exclude_folders),
    }
}

fn api_client(cli: &Cli) -> Result<ApiClient> {
    let supabase = cli.supabase.as_deref().map(resolve_path).transpose()?;
    let token = resolve_token(cli.token.clone(), supabase.as_deref())?;
    let mut client = ApiClient::new(
        token,
        Some(cli.api_base.clone()),
        Duration::from_secs(cli.timeout_secs),
    )?;

    if cli.no_throttle {
        client = client.disable_throttle();
    } else if let Some((min, max)) = cli.throttle_ms {
        client = client.with_throttle(min, max);
    }

    Ok(client)
}

fn cache_path(arg: Option<&str>) -> Result<PathBuf> {
    match arg {
        Some(path) => resolve_path(path),
        None => default_cache_path().ok_or_else(|| {
            Error::Config("could not locate the Granola cache; pass --cache".into())
        }),
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} docs") {
        pb.set_style(style.progress_chars("##-"));
    }
    pb
}

fn write_all(
    writer: SyncWriter<'_, OsFs>,
    docs: &[ExportDocument],
    valid_ids: &HashSet<String>,
) -> Result<SyncStats> {
    println!("Writing {} documents to {}...", docs.len(), writer.output_dir().display());
    writer.with_progress(progress_bar(docs.len())).sync(docs, valid_ids)
}

fn run_notes(cli: &Cli, output: &str) -> Result<()> {
    let client = api_client(cli)?;

    println!("Fetching documents from Granola API...");
    let docs = export::dedupe_by_id(client.list_documents()?);
    let notes = export::notes_documents(&docs)?;

    let output = resolve_path(output)?;
    let writer = SyncWriter::new(&OsFs, output)
        .with_layout(Layout::flat("md"))
        .with_empty_content(EmptyContent::Emit);
    let stats = write_all(writer, &notes, &export::valid_ids(&docs))?;

    println!("Notes exported: {}", stats);
    Ok(())
}

fn run_transcripts(output: &str, cache: Option<&str>) -> Result<()> {
    println!("Reading Granola cache file...");
    let cache = read_cache(&cache_path(cache)?)?;
    let transcripts = export::transcript_documents(&cache);

    let output = resolve_path(output)?;
    let writer = SyncWriter::new(&OsFs, output)
        .with_layout(Layout::flat("txt"))
        .with_empty_content(EmptyContent::Skip);
    let ids = transcripts.iter().map(|doc| doc.id.clone()).collect();
    let stats = write_all(writer, &transcripts, &ids)?;

    println!("Transcripts exported: {}", stats);
    Ok(())
}

fn run_export(
    cli: &Cli,
    output: &str,
    cache: Option<&str>,
    exclude_folders: &[String],
) -> Result<()> {
    let client = api_client(cli)?;

    println!("Fetching documents from Granola API...");
    let docs = export::dedupe_by_id(client.list_documents()?);

    println!("Reading Granola cache file...");
    let cache = read_cache(&cache_path(cache)?)?;
    let combined = export::combined_documents(&docs, &cache);

    let output = resolve_path(output)?;
    let writer = SyncWriter::new(&OsFs, output)
        .with_layout(Layout::fan_out("txt"))
        .with_excluded_folders(exclude_folders);
    let stats = write_all(writer, &combined, &export::valid_ids(&docs))?;

    println!("Export completed: {}", stats);
    Ok(())
}
