//! The engine facade.
//!
//! [`Skaff`] owns the task registry, the renderer with its helper
//! registry, and the external-process collaborators. Each `run` resolves
//! prompts into a fresh value store, executes the task's actions, and
//! aggregates a [`TaskResult`].

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use skaff_templates::Renderer;

use crate::conflict::ConflictPolicy;
use crate::error::{EngineError, EngineResult};
use crate::executor::{ActionExecutor, RunOptions};
use crate::install::{NpmInstaller, PackageInstaller};
use crate::prompt::resolve_prompts;
use crate::record::TaskResult;
use crate::repo::{GitFetcher, RepoFetcher};
use crate::report::Reporter;
use crate::session::PromptSession;
use crate::task::{Task, TaskRegistry};
use crate::values::ValueStore;

/// The scaffolding engine: registered tasks plus everything a run needs.
pub struct Skaff {
    cwd: PathBuf,
    renderer: Renderer,
    registry: TaskRegistry,
    options: RunOptions,
    fetcher: Box<dyn RepoFetcher>,
    installer: Box<dyn PackageInstaller>,
}

impl Skaff {
    /// Create an engine rooted at `cwd`, with the system collaborators.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            renderer: Renderer::new(),
            registry: TaskRegistry::new(),
            options: RunOptions::default(),
            fetcher: Box::new(GitFetcher::new()),
            installer: Box::new(NpmInstaller),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Swap the repository fetcher (tests use a scripted one).
    pub fn with_fetcher(mut self, fetcher: impl RepoFetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    /// Swap the package installer.
    pub fn with_installer(mut self, installer: impl PackageInstaller + 'static) -> Self {
        self.installer = Box::new(installer);
        self
    }

    /// The engine root directory.
    pub fn path(&self) -> &Path {
        &self.cwd
    }

    /// Resolve a path under the engine root.
    pub fn path_of(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.cwd.join(relative)
    }

    /// Register a task definition.
    pub fn register(&mut self, task: Task) {
        self.registry.register(task);
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.registry.get(name)
    }

    pub fn has_task(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Registered tasks, sorted by name.
    pub fn tasks(&self) -> Vec<&Task> {
        self.registry.tasks()
    }

    /// Register a raw-expression helper.
    pub fn add_helper<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&str, &dyn Fn(&str) -> String) -> String + Send + Sync + 'static,
    {
        self.renderer.helpers_mut().register_raw(name, f);
    }

    /// Register a pre-rendered-value helper.
    pub fn add_value_helper<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.renderer.helpers_mut().register_rendered(name, f);
    }

    /// All helper names, sorted.
    pub fn helper_names(&self) -> Vec<&str> {
        self.renderer.helpers().names()
    }

    /// Render a template string against a value store.
    pub fn render_str(&self, template: &str, values: &ValueStore) -> EngineResult<String> {
        Ok(self.renderer.render(template, &values.context())?)
    }

    /// Run a registered task by name.
    pub async fn run(
        &self,
        name: &str,
        defaults: ValueStore,
        session: &mut dyn PromptSession,
    ) -> EngineResult<TaskResult> {
        let task = self.registry.get_required(name)?;
        self.run_task(task, defaults, session).await
    }

    /// Run a task definition.
    ///
    /// Returns `Err` only when a fatal error escalates through the task's
    /// own `abort_on_fail`; otherwise failures (including a run-halting
    /// one) land in the returned result.
    pub async fn run_task(
        &self,
        task: &Task,
        defaults: ValueStore,
        session: &mut dyn PromptSession,
    ) -> EngineResult<TaskResult> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Running task '{}' ({})", task.name, run_id);

        let mut values = defaults;

        // supplied defaults are validated before anything runs
        for (name, validator) in &task.validate {
            if let Some(value) = values.get_str(name) {
                validator(&value).map_err(EngineError::Validation)?;
            }
        }

        let prompts = task.prompts.resolve(&values);
        resolve_prompts(&prompts, &task.validate, &mut values, session)?;

        let actions = task.actions.resolve(&values);
        debug!("Task '{}' resolved {} actions", task.name, actions.len());

        let base_path = task
            .base_path
            .clone()
            .unwrap_or_else(|| self.cwd.clone());
        let reporter = if task.quiet || self.options.quiet {
            Reporter::Null
        } else {
            Reporter::Tracing
        };
        let policy = ConflictPolicy::new(
            self.options.force,
            self.options.skip_if_exists || task.skip_if_exists,
        );

        let mut executor = ActionExecutor::new(
            &self.cwd,
            base_path,
            &self.renderer,
            self.fetcher.as_ref(),
            self.installer.as_ref(),
            reporter,
            policy,
            self.options.install,
        );

        let outcome = executor
            .execute(&actions, &mut values, task.abort_on_fail, session)
            .await;
        let (changes, failures) = executor.records();

        let mut result = TaskResult::new(run_id, started_at);
        result.values = values;
        result.changes = changes;
        result.failures = failures;
        result.completed_at = Utc::now();

        match outcome {
            Ok(()) => Ok(result),
            Err(error) if task.abort_on_fail => Err(error),
            Err(error) => {
                result.error = Some(error.to_string());
                Ok(result)
            }
        }
    }
}

impl std::fmt::Debug for Skaff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skaff")
            .field("cwd", &self.cwd)
            .field("tasks", &self.registry.names())
            .finish()
    }
}
