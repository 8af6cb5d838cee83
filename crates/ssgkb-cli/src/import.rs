//! `ssgkb import`: run the orchestrator against a source tree.

use anyhow::{bail, Result};
use colored::Colorize;
use ssgkb_importer::{
    ImportManager, ImportRun, LocalTreeFetcher, RunState, SourceCategory, StorageHandlers,
};
use ssgkb_storage::Store;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;

pub fn cmd_import(config: &AppConfig, run_id: Option<String>, json: bool) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let run = rt.block_on(run_import(config, run_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_summary(&run);
    }
    if run.state == RunState::Failed {
        bail!(
            "import run {} failed: {}",
            run.run_id,
            run.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn run_import(config: &AppConfig, run_id: Option<String>) -> Result<ImportRun> {
    let store = Arc::new(Store::open(&config.store)?);
    let manager = ImportManager::new(
        Arc::new(LocalTreeFetcher::new(config.source.clone())),
        Arc::new(StorageHandlers::new(store)),
        config.importer.clone(),
    );
    eprintln!(
        "{} {} into {}",
        "Importing".green().bold(),
        config.source.root.display(),
        config.store.db_path.display()
    );
    let run_id = manager.start_import(run_id)?;

    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let mut last_line = String::new();
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                eprintln!("{} stopping run {run_id}", "interrupt:".yellow().bold());
                manager.stop()?;
            }
        }
        let Some(run) = manager.status() else {
            bail!("import run {run_id} disappeared");
        };
        let line = progress_line(&run);
        if line != last_line {
            eprintln!("{line}");
            last_line = line;
        }
        if run.state.is_terminal() {
            return Ok(run);
        }
    }
}

fn progress_line(run: &ImportRun) -> String {
    let counts: Vec<String> = SourceCategory::ORDER
        .iter()
        .map(|c| {
            let p = run.progress(*c);
            format!("{c} {}/{}", p.processed + p.failed, p.total)
        })
        .collect();
    format!(
        "  [{}] {}  {}",
        run.state,
        counts.join("  "),
        run.current_file.as_deref().unwrap_or("")
    )
}

fn print_summary(run: &ImportRun) {
    let state = match run.state {
        RunState::Completed => run.state.as_str().green().bold(),
        RunState::Failed => run.state.as_str().red().bold(),
        _ => run.state.as_str().yellow().bold(),
    };
    println!("run {} {}", run.run_id, state);
    for category in SourceCategory::ORDER {
        let p = run.progress(category);
        let failed = if p.failed > 0 {
            p.failed.to_string().red().to_string()
        } else {
            p.failed.to_string()
        };
        println!(
            "  {:<12} total {:>5}  ok {:>5}  failed {:>5}",
            category.as_str(),
            p.total,
            p.processed,
            failed
        );
    }
    if let Some(err) = &run.error {
        println!("  {} {err}", "error:".red().bold());
    }
    if let Some(err) = &run.cross_reference_error {
        println!("  {} cross-references: {err}", "warning:".yellow().bold());
    }
}
