//! # skaff_core
//!
//! Task-execution engine for skaff.
//!
//! A host registers named generator tasks (interactive prompts plus a
//! sequence of file-system/process actions); the engine resolves prompts
//! into a value store, renders templates against it, and executes the
//! action list under an interactive conflict-resolution policy and a
//! configurable failure-escalation policy.
//!
//! ## Example
//!
//! ```rust,no_run
//! use skaff_core::{ActionSpec, PromptSpec, ScriptedSession, Skaff, Task, ValueStore};
//!
//! # async fn demo() -> skaff_core::EngineResult<()> {
//! let mut engine = Skaff::new(".");
//! engine.register(
//!     Task::new("component")
//!         .with_description("Generate a component module")
//!         .prompt(PromptSpec::input("name").with_message("Component name:"))
//!         .action(
//!             ActionSpec::add("src/{{snakeCase name}}.rs")
//!                 .with_template("pub struct {{pascalCase name}};\n"),
//!         ),
//! );
//!
//! let mut session = ScriptedSession::default().text("BlogPost");
//! let result = engine.run("component", ValueStore::new(), &mut session).await?;
//! assert_eq!(result.changes.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod executor;
pub mod install;
pub mod prompt;
pub mod record;
pub mod repo;
pub mod report;
pub mod session;
pub mod task;
pub mod values;

pub use action::{Action, ActionItem, ActionSpec, ExtendFn, NormalizedAction, SideEffectFn};
pub use conflict::{ChoiceSet, ConflictChoice, ConflictPolicy};
pub use engine::Skaff;
pub use error::{EngineError, EngineResult};
pub use executor::{ActionExecutor, RunOptions};
pub use install::{
    DependencyCategory, InstallFlags, InstallOrchestrator, NpmInstaller, PackageInstaller,
};
pub use prompt::{resolve_prompts, resolve_tree_prompts, Choice, PromptKind, PromptSpec, Validator};
pub use record::{ChangeRecord, ChangeStatus, FailureRecord, TaskResult};
pub use repo::{GitFetcher, RepoFetcher};
pub use report::Reporter;
pub use session::{PromptAnswer, PromptRequest, PromptSession, ScriptedSession, TerminalSession};
pub use task::{ActionSource, PromptSource, Task, TaskRegistry};
pub use values::ValueStore;
