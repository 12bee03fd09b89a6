//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::CommandFactory;
use clap_complete::generate;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, instrument};

use crate::application::services::{RefreshScheduler, RefreshService, TreeEvent};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{diff_trees, render_diff, MutationKind, TreeRender};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

/// Run the parsed command line.
pub fn execute(cli: Cli) -> CliResult<()> {
    let project_dir = match cli.project_dir {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(|e| InfraError::io("current directory", e))?,
    };
    debug!("execute: project_dir={}", project_dir.display());

    match cli.command {
        Commands::Tree => cmd_tree(&project_dir),
        Commands::Diff { old, new } => cmd_diff(&project_dir, &old, &new),
        Commands::Watch { interval } => cmd_watch(&project_dir, interval),
        Commands::Config { command } => cmd_config(&project_dir, command),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}

fn container(project_dir: &Path) -> CliResult<ServiceContainer> {
    let settings = Settings::load(project_dir)?;
    Ok(ServiceContainer::new(settings, project_dir)?)
}

#[instrument(level = "debug")]
fn cmd_tree(project_dir: &Path) -> CliResult<()> {
    let container = container(project_dir)?;
    let tree = container.scanner.scan()?;
    output::info(&tree.to_tree_string());
    output::detail(&format!("{} nodes", tree.node_count()));
    Ok(())
}

#[instrument(level = "debug")]
fn cmd_diff(project_dir: &Path, old: &Path, new: &Path) -> CliResult<()> {
    if same_directory(old, new) {
        return Err(CliError::InvalidArgs(format!(
            "old and new are the same directory: {}",
            old.display()
        )));
    }
    let container = container(project_dir)?;
    let old_tree = container.scanner_for(old)?.scan()?;
    let new_tree = container.scanner_for(new)?.scan()?;

    match diff_trees(&old_tree, &new_tree) {
        None => output::success("no structural changes"),
        Some(diff) => {
            output::info(&render_diff(&diff, &old_tree, &new_tree));
            let inserted = diff.iter().map(|d| d.inserts().count()).sum::<usize>();
            let removed = diff.iter().map(|d| d.removes().count()).sum::<usize>();
            output::header(&format!(
                "{} change(s): {} inserted, {} removed",
                diff.total_mutations(),
                inserted,
                removed
            ));
        }
    }
    Ok(())
}

/// One line typed on stdin while watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchCommand {
    Refresh,
    Interval(u64),
    Quit,
}

/// Parse a stdin line: empty or `r` refreshes, `i <secs>` sets the
/// interval, `q` quits.
pub fn parse_watch_command(line: &str) -> Result<WatchCommand, String> {
    let mut words = line.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (None, _, _) | (Some("r"), None, _) => Ok(WatchCommand::Refresh),
        (Some("q"), None, _) => Ok(WatchCommand::Quit),
        (Some("i"), Some(secs), None) => secs
            .parse()
            .map(WatchCommand::Interval)
            .map_err(|_| format!("not a number of seconds: {secs}")),
        _ => Err(format!("unknown command '{}' (r, i <secs>, q)", line.trim())),
    }
}

fn cmd_watch(project_dir: &Path, interval: Option<u64>) -> CliResult<()> {
    let container = container(project_dir)?;
    let interval = interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| container.settings.refresh_interval());
    let service = container.refresh_service()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| InfraError::runtime(format!("start async runtime: {e}")))?;
    runtime.block_on(watch(service, interval, container.project_dir.clone()))
}

async fn watch(service: Arc<RefreshService>, interval: Duration, project_dir: PathBuf) -> CliResult<()> {
    output::header(&format!("watching {}", project_dir.display()));
    service.with_live_tree(|tree| output::info(&tree.to_tree_string()));
    output::detail("r = refresh, i <secs> = interval, q = quit");

    let mut events = service.subscribe();
    let handle = RefreshScheduler::spawn(Arc::clone(&service), interval);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            event = events.recv() => match event {
                Ok(TreeEvent::Updated(report)) => {
                    output::header(&format!(
                        "[{}] {} change(s), {} nodes",
                        report.at.format("%H:%M:%S"),
                        report.applied.len(),
                        report.node_count
                    ));
                    for mutation in &report.applied {
                        let line = format!("{} / {}", mutation.parent.label(), mutation.node);
                        match mutation.kind {
                            MutationKind::Insert => output::diff_add(&line),
                            MutationKind::Remove => output::diff_remove(&line),
                        }
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    output::warning(&format!("missed {missed} update(s)"));
                }
                Err(RecvError::Closed) => break,
            },

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_watch_command(&line) {
                    Ok(WatchCommand::Refresh) => {
                        if !handle.refresh_now() {
                            output::detail("refresh already queued");
                        }
                    }
                    Ok(WatchCommand::Interval(secs)) => {
                        handle.set_interval(Duration::from_secs(secs));
                        output::success(&format!("interval set to {secs}s"));
                    }
                    Ok(WatchCommand::Quit) => break,
                    Err(msg) => output::warning(&msg),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    output::warning(&format!("stdin: {e}"));
                    stdin_open = false;
                }
            },
        }
    }

    handle.shutdown().await?;
    Ok(())
}

fn cmd_config(project_dir: &Path, command: ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(project_dir)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::info(&format!("global: {}", path.display())),
                None => output::warning("no global config directory on this platform"),
            }
            output::info(&format!("local:  {}", local_config_path(project_dir).display()));
        }
        ConfigCommands::Template => output::info(&Settings::template()),
    }
    Ok(())
}

/// Whether two paths name the same directory, e.g. `v1` and `./v1/`.
fn same_directory(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
