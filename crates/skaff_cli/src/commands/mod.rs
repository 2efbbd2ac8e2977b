//! CLI command definitions.

use clap::{Parser, Subcommand};

pub mod list;
pub mod render;
pub mod run;

/// skaff - declarative scaffolding and code generation
#[derive(Parser)]
#[command(name = "skaff")]
#[command(version, about = "skaff - declarative scaffolding and code generation")]
#[command(long_about = r#"
skaff runs generator tasks: interactive prompts followed by a sequence of
file-system and process actions (add, copy, modify, extend, clone, render,
clean, exec, install).

Tasks are declared in Skaffile.yaml manifests, discovered from the working
directory upward; nearer definitions shadow farther ones.

EXIT CODES:
  0 - Success
  1 - General error
  2 - Unknown task
  3 - Aborted by the operator
  4 - Action failure escalated by abort_on_fail
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress status output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List discovered tasks
    List(list::ListArgs),

    /// Run a task
    Run(run::RunArgs),

    /// Render a template string against supplied values
    Render(render::RenderArgs),
}

/// Parse a `key=value` pair.
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("name=blog"),
            Ok(("name".to_string(), "blog".to_string()))
        );
        assert_eq!(
            parse_key_value("url=https://a/b=c"),
            Ok(("url".to_string(), "https://a/b=c".to_string()))
        );
        assert!(parse_key_value("plain").is_err());
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
