//! Render a template string, for trying out helpers and values.

use clap::Args;

use skaff_core::{Skaff, ValueStore};

use crate::commands::parse_key_value;

#[derive(Args)]
pub struct RenderArgs {
    /// Template text, e.g. "{{snakeCase name}}"
    pub template: String,

    /// Values to render against (repeatable): -s name=BlogPost
    #[arg(short = 's', long = "set", value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,
}

pub async fn execute(args: RenderArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let engine = Skaff::new(cwd);

    let values: ValueStore = args.set.into_iter().collect();
    println!("{}", engine.render_str(&args.template, &values)?);
    Ok(())
}
