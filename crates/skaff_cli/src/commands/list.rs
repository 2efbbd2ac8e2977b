//! List discovered tasks.

use clap::Args;

use skaff_core::Skaff;

use crate::discovery;

#[derive(Args)]
pub struct ListArgs {
    /// Also print where each manifest was found
    #[arg(long)]
    pub sources: bool,
}

pub async fn execute(args: ListArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    if args.sources {
        for path in discovery::manifest_paths(&cwd) {
            println!("# {}", path.display());
        }
    }

    let mut engine = Skaff::new(&cwd);
    discovery::load_into(&mut engine, &cwd);

    let tasks = engine.tasks();
    if tasks.is_empty() {
        println!("No tasks found. Create a Skaffile.yaml to define some.");
        return Ok(());
    }

    for task in tasks {
        match &task.description {
            Some(description) => println!("  {:<20} # {description}", task.name),
            None => println!("  {}", task.name),
        }
    }
    Ok(())
}
