//! Run a discovered task.

use anyhow::bail;
use clap::Args;
use tracing::info;

use skaff_core::{
    ChangeStatus, InstallFlags, RunOptions, Skaff, TerminalSession, ValueStore,
};

use crate::commands::parse_key_value;
use crate::discovery;

#[derive(Args)]
pub struct RunArgs {
    /// Task name
    pub task: String,

    /// Positional values, mapped onto the task's declared argument names
    pub args: Vec<String>,

    /// Seed the value store (repeatable): -s name=blog
    #[arg(short = 's', long = "set", value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,

    /// Overwrite files that already exist
    #[arg(short, long)]
    pub force: bool,

    /// Skip files that already exist
    #[arg(long)]
    pub skip_existing: bool,

    /// Skip dependency installation entirely
    #[arg(long)]
    pub no_install: bool,

    /// Skip devDependencies installation
    #[arg(long)]
    pub no_install_dev: bool,

    /// Skip optionalDependencies installation
    #[arg(long)]
    pub no_install_opts: bool,
}

pub async fn execute(args: RunArgs, quiet: bool) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    let mut engine = Skaff::new(&cwd).with_options(RunOptions {
        force: args.force,
        quiet,
        skip_if_exists: args.skip_existing,
        install: InstallFlags {
            no_install: args.no_install,
            no_install_dev: args.no_install_dev,
            no_install_opts: args.no_install_opts,
        },
    });

    let loaded = discovery::load_into(&mut engine, &cwd);
    info!(
        "{} Skaffile{} found",
        loaded,
        if loaded == 1 { "" } else { "s" }
    );

    let mut defaults: ValueStore = args.set.into_iter().collect();
    if let Some(task) = engine.get(&args.task) {
        for (name, value) in task.arguments.iter().zip(&args.args) {
            defaults.set(name, value.as_str());
        }
    }

    let mut session = TerminalSession::stdio();
    let result = engine.run(&args.task, defaults, &mut session).await?;

    if !quiet {
        for change in &result.changes {
            let detail = change
                .dest
                .as_deref()
                .or(change.repository.as_deref())
                .unwrap_or("-");
            let marker = if change.status == ChangeStatus::Skipped {
                "-"
            } else {
                "+"
            };
            println!("  {marker} {:<8} {detail}", change.kind);
        }
    }
    for failure in &result.failures {
        eprintln!(
            "  ! {:<8} {} ({})",
            failure.kind,
            failure.dest.as_deref().unwrap_or("-"),
            failure.error
        );
    }

    if let Some(error) = result.error {
        bail!(error);
    }
    Ok(())
}
