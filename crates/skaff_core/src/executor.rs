//! The action executor.
//!
//! Actions execute in strict sequence; later actions may depend on earlier
//! side effects, and interactive prompts share one session. Each action
//! resolves its destination, runs the conflict policy, mutates, and records
//! a change or failure. A failing action downgrades to a failure record
//! unless it (or the owning task) carries `abort_on_fail`; an operator
//! "abort" in the conflict policy always halts the run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use skaff_templates::{is_text_file, Renderer};

use crate::action::{Action, ActionItem, NormalizedAction};
use crate::conflict::{ChoiceSet, ConflictChoice, ConflictPolicy};
use crate::error::{EngineError, EngineResult};
use crate::install::{InstallFlags, InstallOrchestrator, PackageInstaller};
use crate::prompt::resolve_tree_prompts;
use crate::record::{ChangeRecord, ChangeStatus, FailureRecord};
use crate::repo::RepoFetcher;
use crate::report::Reporter;
use crate::session::PromptSession;
use crate::values::ValueStore;

/// Per-run execution options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Overwrite conflicting destinations without prompting.
    pub force: bool,
    /// Suppress status reporting.
    pub quiet: bool,
    /// Skip conflicting destinations without prompting.
    pub skip_if_exists: bool,
    pub install: InstallFlags,
}

/// Executes a task's action list against the file system.
pub struct ActionExecutor<'a> {
    /// Run root; destinations resolve under it.
    cwd: PathBuf,
    /// Task base path; sources and template files resolve under it.
    base_path: PathBuf,
    renderer: &'a Renderer,
    fetcher: &'a dyn RepoFetcher,
    installer: &'a dyn PackageInstaller,
    reporter: Reporter,
    policy: ConflictPolicy,
    install_flags: InstallFlags,
    /// Read-through template content cache, keyed by resolved path.
    cache: HashMap<PathBuf, String>,
    changes: Vec<ChangeRecord>,
    failures: Vec<FailureRecord>,
}

impl<'a> ActionExecutor<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cwd: impl Into<PathBuf>,
        base_path: impl Into<PathBuf>,
        renderer: &'a Renderer,
        fetcher: &'a dyn RepoFetcher,
        installer: &'a dyn PackageInstaller,
        reporter: Reporter,
        policy: ConflictPolicy,
        install_flags: InstallFlags,
    ) -> Self {
        Self {
            cwd: cwd.into(),
            base_path: base_path.into(),
            renderer,
            fetcher,
            installer,
            reporter,
            policy,
            install_flags,
            cache: HashMap::new(),
            changes: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Records accumulated so far.
    pub fn records(self) -> (Vec<ChangeRecord>, Vec<FailureRecord>) {
        (self.changes, self.failures)
    }

    /// Execute the action list in order.
    ///
    /// Returns `Err` only for run-fatal outcomes: an error on an action
    /// with `abort_on_fail` (or when the task carries it), or an operator
    /// abort. Everything else becomes a failure record and the pipeline
    /// continues.
    pub async fn execute(
        &mut self,
        items: &[ActionItem],
        values: &mut ValueStore,
        task_abort_on_fail: bool,
        session: &mut dyn PromptSession,
    ) -> EngineResult<()> {
        for item in items {
            match item {
                ActionItem::Call(callback) => {
                    if let Err(error) = callback.call(values) {
                        self.failures
                            .push(FailureRecord::new("callback", None, error.to_string()));
                        if task_abort_on_fail || error.is_always_fatal() {
                            return Err(error);
                        }
                    }
                }
                ActionItem::Spec(spec) => {
                    let abort_on_fail =
                        task_abort_on_fail || spec.abort_on_fail.unwrap_or(false);

                    let normalized: NormalizedAction = match spec.normalize() {
                        Ok(normalized) => normalized,
                        Err(error) => {
                            let kind = spec.kind_name().unwrap_or("unknown").to_string();
                            self.failures
                                .push(FailureRecord::new(kind, spec.dest.clone(), error.to_string()));
                            if abort_on_fail {
                                return Err(error);
                            }
                            continue;
                        }
                    };

                    let kind = normalized.action.kind_name();
                    let status = self.reporter.begin(kind, &action_label(&normalized.action));

                    match self.dispatch(&normalized.action, values, session).await {
                        Ok(()) => status.ok(),
                        Err(error) => {
                            status.fail(&error);
                            self.failures.push(FailureRecord::new(
                                kind,
                                action_dest(&normalized.action),
                                error.to_string(),
                            ));
                            // a batch-copy abort cancels only that action's
                            // remaining files and escalates normally; every
                            // other operator abort halts the run outright
                            let always_fatal = error.is_always_fatal()
                                && !matches!(normalized.action, Action::Copy { .. });
                            if always_fatal || abort_on_fail {
                                return Err(error);
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn dispatch(
        &mut self,
        action: &Action,
        values: &mut ValueStore,
        session: &mut dyn PromptSession,
    ) -> EngineResult<()> {
        let context = values.context();
        match action {
            Action::Add {
                dest,
                template,
                template_file,
                content,
            } => self.run_add(dest, template, template_file, content, &context, session),
            Action::Copy { src, dest } => self.run_copy(src, dest, &context, session),
            Action::Modify {
                dest,
                pattern,
                before,
                after,
                template,
                template_file,
                content,
                unless,
                delete_content,
                default_content,
            } => self.run_modify(
                dest,
                pattern.as_deref(),
                before.as_deref(),
                after.as_deref(),
                template,
                template_file,
                content,
                unless.as_deref(),
                *delete_content,
                default_content.as_deref(),
                &context,
            ),
            Action::Extend { dest, callback } => {
                self.run_extend(dest, callback, values, &context)
            }
            Action::Clone { git_url, dest } => {
                self.run_clone(git_url, dest, values, session).await
            }
            Action::Render { dest } => self.run_render(dest, &context),
            Action::Clean { dest } => self.run_clean(dest, &context, session),
            Action::Exec { command, quiet } => self.run_exec(command, *quiet, &context).await,
            Action::Install {
                dest,
                dependencies,
                dev_dependencies,
                optional_dependencies,
            } => {
                self.run_install(
                    dest,
                    dependencies,
                    dev_dependencies,
                    optional_dependencies,
                    &context,
                )
                .await
            }
        }
    }

    fn run_add(
        &mut self,
        dest: &str,
        template: &Option<String>,
        template_file: &Option<PathBuf>,
        content: &Option<String>,
        context: &Value,
        session: &mut dyn PromptSession,
    ) -> EngineResult<()> {
        let (abs, rel) = self.resolve_dest(dest, context)?;
        let exists = abs.exists();

        let choice = self
            .policy
            .decide(exists, &rel, ChoiceSet::Single, session)?;
        match choice {
            ConflictChoice::Abort => return Err(EngineError::ConflictAbort(rel)),
            ConflictChoice::Skip => {
                self.changes
                    .push(ChangeRecord::new("add", ChangeStatus::Skipped).with_dest(rel));
                return Ok(());
            }
            _ => {}
        }

        let body = self.body(template, template_file, content, context)?;
        write_file(&abs, &body)?;

        let status = if exists {
            ChangeStatus::Replaced
        } else {
            ChangeStatus::Created
        };
        self.changes
            .push(ChangeRecord::new("add", status).with_dest(rel));
        Ok(())
    }

    fn run_copy(
        &mut self,
        src: &str,
        dest: &str,
        context: &Value,
        session: &mut dyn PromptSession,
    ) -> EngineResult<()> {
        let src_rel = self.renderer.render(src, context)?;
        let src_abs = self.base_path.join(&src_rel);
        if !src_abs.exists() {
            return Err(EngineError::SourceMissing(PathBuf::from(src_rel)));
        }

        let (dest_abs, dest_rel) = self.resolve_dest(dest, context)?;

        // one destination per expanded source file, in sorted order
        let files: Vec<(PathBuf, PathBuf, String)> = if src_abs.is_dir() {
            WalkDir::new(&src_abs)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|entry| {
                    let relative = entry
                        .path()
                        .strip_prefix(&src_abs)
                        .unwrap_or(entry.path())
                        .to_path_buf();
                    let target = dest_abs.join(&relative);
                    let label = format!("{}/{}", dest_rel, relative.display());
                    (entry.into_path(), target, label)
                })
                .collect()
        } else {
            vec![(src_abs, dest_abs, dest_rel)]
        };

        // blanket choices persist across the remaining files of this action
        let mut replace_all = false;
        let mut skip_all = false;

        for (source, target, label) in files {
            let exists = target.exists();
            let choice = if !exists || replace_all {
                ConflictChoice::Replace
            } else if skip_all {
                ConflictChoice::Skip
            } else {
                self.policy
                    .decide(true, &label, ChoiceSet::Multiple, session)?
            };

            match choice {
                ConflictChoice::Abort => return Err(EngineError::ConflictAbort(label)),
                ConflictChoice::ReplaceAll => replace_all = true,
                ConflictChoice::SkipAll => skip_all = true,
                _ => {}
            }

            if choice.proceeds() {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(&source, &target)?;
                let status = if exists {
                    ChangeStatus::Replaced
                } else {
                    ChangeStatus::Created
                };
                self.changes
                    .push(ChangeRecord::new("copy", status).with_dest(label));
            } else {
                self.changes
                    .push(ChangeRecord::new("copy", ChangeStatus::Skipped).with_dest(label));
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn run_modify(
        &mut self,
        dest: &str,
        pattern: Option<&str>,
        before: Option<&str>,
        after: Option<&str>,
        template: &Option<String>,
        template_file: &Option<PathBuf>,
        content: &Option<String>,
        unless: Option<&str>,
        delete_content: bool,
        default_content: Option<&str>,
        context: &Value,
    ) -> EngineResult<()> {
        let (abs, rel) = self.resolve_dest(dest, context)?;
        if !abs.exists() {
            match default_content {
                Some(initial) => write_file(&abs, initial)?,
                None => return Err(EngineError::DestinationMissing(PathBuf::from(rel))),
            }
        }

        let current = std::fs::read_to_string(&abs)?;

        // idempotence guard
        if let Some(unless) = unless {
            let marker = self.compile(unless, context)?;
            if marker.is_match(&current) {
                debug!("Marker already present in '{}', skipping", rel);
                self.changes
                    .push(ChangeRecord::new("modify", ChangeStatus::Skipped).with_dest(rel));
                return Ok(());
            }
        }

        let updated = if delete_content {
            let pattern = pattern.ok_or_else(|| EngineError::MissingField {
                kind: "modify".to_string(),
                field: "pattern".to_string(),
            })?;
            let re = self.compile(pattern, context)?;
            re.replacen(&current, 1, "").to_string()
        } else {
            let body = self.body(template, template_file, content, context)?;
            if let Some(anchor) = before {
                let re = self.compile(anchor, context)?;
                match re.find(&current) {
                    Some(found) => {
                        let mut updated = current.clone();
                        updated.insert_str(found.start(), &body);
                        updated
                    }
                    None => current.clone(),
                }
            } else if let Some(anchor) = after {
                let re = self.compile(anchor, context)?;
                match re.find(&current) {
                    Some(found) => {
                        let mut updated = current.clone();
                        updated.insert_str(found.end(), &body);
                        updated
                    }
                    None => current.clone(),
                }
            } else {
                let pattern = pattern.ok_or_else(|| EngineError::MissingField {
                    kind: "modify".to_string(),
                    field: "pattern".to_string(),
                })?;
                let re = self.compile(pattern, context)?;
                re.replacen(&current, 1, body.as_str()).to_string()
            }
        };

        if updated == current {
            self.changes
                .push(ChangeRecord::new("modify", ChangeStatus::Skipped).with_dest(rel));
            return Ok(());
        }

        write_file(&abs, &updated)?;
        self.changes
            .push(ChangeRecord::new("modify", ChangeStatus::Modified).with_dest(rel));
        Ok(())
    }

    fn run_extend(
        &mut self,
        dest: &str,
        callback: &crate::action::ExtendFn,
        values: &ValueStore,
        context: &Value,
    ) -> EngineResult<()> {
        let (abs, rel) = self.resolve_dest(dest, context)?;
        let yaml = rel.ends_with(".yaml") || rel.ends_with(".yml");

        let mut document: Value = if abs.exists() {
            let text = std::fs::read_to_string(&abs)?;
            if text.trim().is_empty() {
                Value::Object(Default::default())
            } else if yaml {
                serde_yaml::from_str(&text)?
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            Value::Object(Default::default())
        };

        callback.call(&mut document, values);

        let serialized = if yaml {
            serde_yaml::to_string(&document)?
        } else {
            serde_json::to_string_pretty(&document)?
        };
        write_file(&abs, &serialized)?;

        self.changes
            .push(ChangeRecord::new("extend", ChangeStatus::Extended).with_dest(rel));
        Ok(())
    }

    async fn run_clone(
        &mut self,
        git_url: &str,
        dest: &str,
        values: &mut ValueStore,
        session: &mut dyn PromptSession,
    ) -> EngineResult<()> {
        let context = values.context();
        let repository = self.renderer.render(git_url, &context)?;
        let shape = Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").unwrap();
        if !shape.is_match(&repository) {
            return Err(EngineError::InvalidRepository(repository));
        }

        let (abs, rel) = self.resolve_dest(dest, &context)?;
        let occupied = abs.is_dir() && abs.read_dir()?.next().is_some();

        let choice = self
            .policy
            .decide(occupied, &rel, ChoiceSet::Single, session)?;
        match choice {
            ConflictChoice::Abort => return Err(EngineError::ConflictAbort(rel)),
            ConflictChoice::Skip => {
                self.changes
                    .push(ChangeRecord::new("clone", ChangeStatus::Skipped).with_dest(rel));
                return Ok(());
            }
            _ => {}
        }
        if occupied {
            std::fs::remove_dir_all(&abs)?;
        }

        self.fetcher.fetch(&repository, &abs).await?;

        // the fetched tree drives its own prompts, then renders in place
        resolve_tree_prompts(&abs, self.renderer, values, session)?;
        let context = values.context();
        self.render_tree(&abs, &context)?;

        self.changes.push(
            ChangeRecord::new("clone", ChangeStatus::Cloned)
                .with_dest(rel)
                .with_repository(repository),
        );
        Ok(())
    }

    fn run_render(&mut self, dest: &str, context: &Value) -> EngineResult<()> {
        let (abs, rel) = self.resolve_dest(dest, context)?;
        if !abs.exists() {
            return Err(EngineError::DestinationMissing(PathBuf::from(rel)));
        }
        let content = std::fs::read_to_string(&abs)?;
        let rendered = self.renderer.render(&content, context)?;
        std::fs::write(&abs, rendered)?;
        Ok(())
    }

    fn run_clean(
        &mut self,
        dest: &str,
        context: &Value,
        session: &mut dyn PromptSession,
    ) -> EngineResult<()> {
        let (abs, rel) = self.resolve_dest(dest, context)?;
        if !abs.exists() {
            self.changes
                .push(ChangeRecord::new("clean", ChangeStatus::Skipped).with_dest(rel));
            return Ok(());
        }

        let choice = self
            .policy
            .decide(true, &rel, ChoiceSet::Delete, session)?;
        match choice {
            ConflictChoice::Abort => return Err(EngineError::ConflictAbort(rel)),
            ConflictChoice::Skip => {
                self.changes
                    .push(ChangeRecord::new("clean", ChangeStatus::Skipped).with_dest(rel));
                Ok(())
            }
            _ => {
                fs_extra::remove_items(&[&abs])
                    .map_err(|e| EngineError::Io(std::io::Error::other(e.to_string())))?;
                self.changes
                    .push(ChangeRecord::new("clean", ChangeStatus::Deleted).with_dest(rel));
                Ok(())
            }
        }
    }

    async fn run_exec(&mut self, command: &str, quiet: bool, context: &Value) -> EngineResult<()> {
        let rendered = self.renderer.render(command, context)?;
        let parts = shell_words::split(&rendered).map_err(|e| EngineError::Process {
            command: rendered.clone(),
            message: e.to_string(),
        })?;
        let (program, args) = parts.split_first().ok_or_else(|| EngineError::MissingField {
            kind: "exec".to_string(),
            field: "command".to_string(),
        })?;

        let output = tokio::process::Command::new(program)
            .args(args)
            .current_dir(&self.cwd)
            .output()
            .await
            .map_err(|e| EngineError::Process {
                command: rendered.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(EngineError::Process {
                command: rendered,
                message: if stderr.is_empty() {
                    output.status.to_string()
                } else {
                    stderr
                },
            });
        }

        let mut record = ChangeRecord::new("exec", ChangeStatus::Executed);
        if !quiet {
            record = record.with_stdout(String::from_utf8_lossy(&output.stdout));
        }
        self.changes.push(record);
        Ok(())
    }

    async fn run_install(
        &mut self,
        dest: &str,
        dependencies: &[String],
        dev_dependencies: &[String],
        optional_dependencies: &[String],
        context: &Value,
    ) -> EngineResult<()> {
        let (abs, _rel) = self.resolve_dest(dest, context)?;
        std::fs::create_dir_all(&abs)?;

        let orchestrator = InstallOrchestrator::new(self.installer, self.install_flags);
        orchestrator
            .run(
                &abs,
                dependencies,
                dev_dependencies,
                optional_dependencies,
                &mut self.changes,
            )
            .await
    }

    /// Render a fetched template tree in place: every text file's content
    /// and every placeholder-bearing path.
    fn render_tree(&self, root: &Path, context: &Value) -> EngineResult<()> {
        let files: Vec<PathBuf> = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();

        for path in files {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            let rendered_relative = self
                .renderer
                .render(&relative.to_string_lossy(), context)?;
            let target = root.join(&rendered_relative);

            if is_text_file(&path) {
                if let Ok(content) = std::fs::read_to_string(&path) {
                    let rendered = self.renderer.render(&content, context)?;
                    write_file(&target, &rendered)?;
                    if target != path {
                        std::fs::remove_file(&path)?;
                    }
                    continue;
                }
            }
            if target != path {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::rename(&path, &target)?;
            }
        }

        // prune emptied directories that carried placeholder names
        let tagged_dirs: Vec<PathBuf> = WalkDir::new(root)
            .contents_first(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_dir() && e.file_name().to_string_lossy().contains("{{")
            })
            .map(|e| e.into_path())
            .collect();
        for dir in tagged_dirs {
            let _ = std::fs::remove_dir(dir);
        }

        Ok(())
    }

    /// Render the destination expression and resolve it under the run root.
    fn resolve_dest(&self, expr: &str, context: &Value) -> EngineResult<(PathBuf, String)> {
        let relative = self.renderer.render(expr, context)?;
        Ok((self.cwd.join(&relative), relative))
    }

    /// Resolve an action body: template file (cached, rendered), inline
    /// template (rendered), or raw content.
    fn body(
        &mut self,
        template: &Option<String>,
        template_file: &Option<PathBuf>,
        content: &Option<String>,
        context: &Value,
    ) -> EngineResult<String> {
        if let Some(file) = template_file {
            let path = self.base_path.join(file);
            if !path.exists() {
                return Err(EngineError::TemplateMissing(path));
            }
            if !self.cache.contains_key(&path) {
                let text = std::fs::read_to_string(&path)?;
                self.cache.insert(path.clone(), text);
            }
            let text = self.cache[&path].clone();
            return Ok(self.renderer.render(&text, context)?);
        }
        if let Some(template) = template {
            return Ok(self.renderer.render(template, context)?);
        }
        Ok(content.clone().unwrap_or_default())
    }

    fn compile(&self, expr: &str, context: &Value) -> EngineResult<Regex> {
        let rendered = self.renderer.render(expr, context)?;
        Regex::new(&rendered).map_err(|e| EngineError::Pattern {
            pattern: rendered,
            message: e.to_string(),
        })
    }
}

fn write_file(path: &Path, content: &str) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

fn action_label(action: &Action) -> String {
    match action {
        Action::Exec { command, .. } => command.clone(),
        Action::Clone { git_url, .. } => git_url.clone(),
        Action::Copy { src, dest } => format!("{src} -> {dest}"),
        other => action_dest(other).unwrap_or_default(),
    }
}

fn action_dest(action: &Action) -> Option<String> {
    match action {
        Action::Add { dest, .. }
        | Action::Copy { dest, .. }
        | Action::Modify { dest, .. }
        | Action::Extend { dest, .. }
        | Action::Clone { dest, .. }
        | Action::Render { dest }
        | Action::Clean { dest }
        | Action::Install { dest, .. } => Some(dest.clone()),
        Action::Exec { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionSpec;
    use crate::install::MockPackageInstaller;
    use crate::repo::MockRepoFetcher;
    use crate::session::ScriptedSession;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        renderer: Renderer,
        fetcher: MockRepoFetcher,
        installer: MockPackageInstaller,
        policy: ConflictPolicy,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                renderer: Renderer::new(),
                fetcher: MockRepoFetcher::new(),
                installer: MockPackageInstaller::new(),
                policy: ConflictPolicy::default(),
            }
        }

        fn executor(&self) -> ActionExecutor<'_> {
            ActionExecutor::new(
                self.dir.path(),
                self.dir.path(),
                &self.renderer,
                &self.fetcher,
                &self.installer,
                Reporter::Null,
                self.policy,
                InstallFlags::default(),
            )
        }

        fn read(&self, rel: &str) -> String {
            std::fs::read_to_string(self.dir.path().join(rel)).unwrap()
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.dir.path().join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
    }

    fn items(specs: Vec<ActionSpec>) -> Vec<ActionItem> {
        specs.into_iter().map(ActionItem::from).collect()
    }

    #[tokio::test]
    async fn test_add_renders_template_dest() {
        let fx = Fixture::new();
        let mut executor = fx.executor();
        let mut values: ValueStore = [("name", "BlogPost")].into_iter().collect();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::add("src/{{snakeCase name}}.rs")
                    .with_template("struct {{pascalCase name}};")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        assert_eq!(fx.read("src/blog_post.rs"), "struct BlogPost;");
        let (changes, failures) = executor.records();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, ChangeStatus::Created);
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_add_content_is_written_raw() {
        let fx = Fixture::new();
        let mut executor = fx.executor();
        let mut values: ValueStore = [("value", "foo")].into_iter().collect();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::add("a.txt").with_content("{{value}}")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        assert_eq!(fx.read("a.txt"), "{{value}}");
    }

    #[tokio::test]
    async fn test_add_conflict_skip_and_replace() {
        let fx = Fixture::new();
        fx.write("a.txt", "old");
        let mut values = ValueStore::new();

        // choose skip
        let mut executor = fx.executor();
        let mut session = ScriptedSession::default().index(1);
        executor
            .execute(
                &items(vec![ActionSpec::add("a.txt").with_content("new")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();
        assert_eq!(fx.read("a.txt"), "old");
        let (changes, _) = executor.records();
        assert_eq!(changes[0].status, ChangeStatus::Skipped);

        // choose replace
        let mut executor = fx.executor();
        let mut session = ScriptedSession::default().index(0);
        executor
            .execute(
                &items(vec![ActionSpec::add("a.txt").with_content("new")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();
        assert_eq!(fx.read("a.txt"), "new");
        let (changes, _) = executor.records();
        assert_eq!(changes[0].status, ChangeStatus::Replaced);
    }

    #[tokio::test]
    async fn test_add_conflict_abort_is_fatal_without_abort_on_fail() {
        let fx = Fixture::new();
        fx.write("a.txt", "old");
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default().index(2);

        let err = executor
            .execute(
                &items(vec![ActionSpec::add("a.txt").with_content("new")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::ConflictAbort(_)));
        assert_eq!(fx.read("a.txt"), "old");
    }

    #[tokio::test]
    async fn test_copy_directory_mirrors_relative_paths() {
        let fx = Fixture::new();
        fx.write("templates/pkg/a.txt", "A");
        fx.write("templates/pkg/nested/b.txt", "B");
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::copy("templates/pkg", "out")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        assert_eq!(fx.read("out/a.txt"), "A");
        assert_eq!(fx.read("out/nested/b.txt"), "B");
        let (changes, _) = executor.records();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.kind == "copy"));
    }

    #[tokio::test]
    async fn test_copy_replace_all_suppresses_later_prompts() {
        let fx = Fixture::new();
        fx.write("templates/pkg/a.txt", "newA");
        fx.write("templates/pkg/b.txt", "newB");
        fx.write("out/a.txt", "oldA");
        fx.write("out/b.txt", "oldB");
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        // one prompt only: replace-all carries to the second conflict
        let mut session = ScriptedSession::default().index(2);

        executor
            .execute(
                &items(vec![ActionSpec::copy("templates/pkg", "out")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        assert_eq!(fx.read("out/a.txt"), "newA");
        assert_eq!(fx.read("out/b.txt"), "newB");
        assert!(session.is_drained());
        assert_eq!(session.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_copy_abort_only_fails_current_action() {
        let fx = Fixture::new();
        fx.write("templates/pkg/a.txt", "newA");
        fx.write("templates/pkg/b.txt", "newB");
        fx.write("out/a.txt", "oldA");
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default().index(4);

        executor
            .execute(
                &items(vec![
                    ActionSpec::copy("templates/pkg", "out"),
                    ActionSpec::add("after.txt").with_content("still runs"),
                ]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        // the conflicting file stays, and the clean one was never copied
        assert_eq!(fx.read("out/a.txt"), "oldA");
        assert!(!fx.dir.path().join("out/b.txt").exists());
        // the abort cancelled only the copy; later actions still ran
        assert_eq!(fx.read("after.txt"), "still runs");
        let (_, failures) = executor.records();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].error.contains("Aborted"));
    }

    #[tokio::test]
    async fn test_copy_abort_escalates_with_abort_on_fail() {
        let fx = Fixture::new();
        fx.write("templates/pkg/a.txt", "newA");
        fx.write("out/a.txt", "oldA");
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default().index(4);

        let err = executor
            .execute(
                &items(vec![
                    ActionSpec::copy("templates/pkg", "out").with_abort_on_fail(),
                ]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::ConflictAbort(_)));
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let fx = Fixture::new();
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        let err = executor
            .execute(
                &items(vec![ActionSpec::copy("nope.txt", "b.txt")
                    .with_abort_on_fail()]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Source 'nope.txt' does not exist");
    }

    #[tokio::test]
    async fn test_modify_appends_at_anchor() {
        let fx = Fixture::new();
        fx.write("a.txt", "X");
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::modify("a.txt")
                    .with_pattern("$")
                    .with_content("Y")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        assert_eq!(fx.read("a.txt"), "XY");
        let (changes, _) = executor.records();
        assert_eq!(changes[0].status, ChangeStatus::Modified);
    }

    #[tokio::test]
    async fn test_modify_unless_marker_skips() {
        let fx = Fixture::new();
        fx.write("config.txt", "feature = on");
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::modify("config.txt")
                    .with_pattern("$")
                    .with_content("\nfeature = on")
                    .with_unless("feature = on")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        assert_eq!(fx.read("config.txt"), "feature = on");
        let (changes, _) = executor.records();
        assert_eq!(changes[0].status, ChangeStatus::Skipped);
    }

    #[tokio::test]
    async fn test_modify_missing_dest_without_default() {
        let fx = Fixture::new();
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::modify("none.txt").with_pattern("$")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        let (_, failures) = executor.records();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].error.contains("does not exist"));
    }

    #[tokio::test]
    async fn test_modify_default_content_bootstraps() {
        let fx = Fixture::new();
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::modify("list.txt")
                    .with_default_content("start\n")
                    .with_pattern("$")
                    .with_content("entry\n")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        assert_eq!(fx.read("list.txt"), "start\nentry\n");
    }

    #[tokio::test]
    async fn test_modify_delete_content() {
        let fx = Fixture::new();
        fx.write("a.txt", "keep DROP keep");
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::modify("a.txt")
                    .with_pattern("DROP ")
                    .with_delete_content()]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        assert_eq!(fx.read("a.txt"), "keep keep");
    }

    #[tokio::test]
    async fn test_extend_json_document() {
        let fx = Fixture::new();
        fx.write("example.json", r#"{"foo":"bar"}"#);
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::extend("example.json", |doc, _| {
                    doc["baz"] = Value::String("buzz".to_string());
                })]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        let written: Value = serde_json::from_str(&fx.read("example.json")).unwrap();
        assert_eq!(written["foo"], "bar");
        assert_eq!(written["baz"], "buzz");
        let (changes, _) = executor.records();
        assert_eq!(changes[0].status, ChangeStatus::Extended);
    }

    #[tokio::test]
    async fn test_extend_missing_document_starts_empty() {
        let fx = Fixture::new();
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::extend("fresh.json", |doc, _| {
                    doc["a"] = Value::from(1);
                })]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        let written: Value = serde_json::from_str(&fx.read("fresh.json")).unwrap();
        assert_eq!(written["a"], 1);
    }

    #[tokio::test]
    async fn test_render_in_place() {
        let fx = Fixture::new();
        fx.write("bar.txt", "{{value}}");
        let mut executor = fx.executor();
        let mut values: ValueStore = [("value", "foo")].into_iter().collect();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::render("bar.txt")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        assert_eq!(fx.read("bar.txt"), "foo");
        // render leaves no change record
        let (changes, _) = executor.records();
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn test_clean_removes_after_confirmation() {
        let fx = Fixture::new();
        fx.write("rm_dir/a.txt", "x");
        fx.write("rm_dir/b.txt", "y");
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default().index(0);

        executor
            .execute(
                &items(vec![ActionSpec::clean("rm_dir/a.txt")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        assert!(!fx.dir.path().join("rm_dir/a.txt").exists());
        assert_eq!(fx.read("rm_dir/b.txt"), "y");
        let (changes, _) = executor.records();
        assert_eq!(changes[0].status, ChangeStatus::Deleted);
    }

    #[tokio::test]
    async fn test_exec_captures_stdout() {
        let fx = Fixture::new();
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::exec("echo ok")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        let (changes, _) = executor.records();
        assert_eq!(changes[0].stdout.as_deref(), Some("ok\n"));
    }

    #[tokio::test]
    async fn test_exec_nonzero_exit_carries_stderr() {
        let fx = Fixture::new();
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::exec("sh -c 'echo boom >&2; exit 3'")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        let (_, failures) = executor.records();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].error.contains("boom"));
    }

    #[tokio::test]
    async fn test_exec_renders_command() {
        let fx = Fixture::new();
        let mut executor = fx.executor();
        let mut values: ValueStore = [("word", "hello")].into_iter().collect();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::exec("echo {{word}}")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        let (changes, _) = executor.records();
        assert_eq!(changes[0].stdout.as_deref(), Some("hello\n"));
    }

    #[tokio::test]
    async fn test_failure_without_abort_continues() {
        let fx = Fixture::new();
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![
                    ActionSpec::copy("missing.txt", "out.txt"),
                    ActionSpec::add("later.txt").with_content("still runs"),
                ]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        assert_eq!(fx.read("later.txt"), "still runs");
        let (changes, failures) = executor.records();
        assert_eq!(failures.len(), 1);
        assert_eq!(changes.len(), 1);
    }

    #[tokio::test]
    async fn test_action_abort_on_fail_halts() {
        let fx = Fixture::new();
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        let err = executor
            .execute(
                &items(vec![
                    ActionSpec::copy("missing.txt", "out.txt").with_abort_on_fail(),
                    ActionSpec::add("later.txt").with_content("never"),
                ]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::SourceMissing(_)));
        assert!(!fx.dir.path().join("later.txt").exists());
        let (_, failures) = executor.records();
        assert_eq!(failures.len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_action_recorded() {
        let fx = Fixture::new();
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        let mut spec = ActionSpec::default();
        spec.kind = Some("dunno".to_string());
        spec.dest = Some("a.txt".to_string());

        executor
            .execute(&items(vec![spec]), &mut values, false, &mut session)
            .await
            .unwrap();

        let (_, failures) = executor.records();
        assert_eq!(failures[0].error, "Unsupported 'dunno' action");
    }

    #[tokio::test]
    async fn test_callback_item_sees_values() {
        use crate::action::SideEffectFn;
        use std::sync::{Arc, Mutex};

        let fx = Fixture::new();
        let mut executor = fx.executor();
        let mut values: ValueStore = [("x", "y")].into_iter().collect();
        let mut session = ScriptedSession::default();

        let seen: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let callback = SideEffectFn::new(move |values| {
            *captured.lock().unwrap() = values.get_str("x");
            values.set("added", "by-callback");
            Ok(())
        });

        executor
            .execute(
                &[ActionItem::from(callback)],
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("y"));
        assert_eq!(values.get_str("added").as_deref(), Some("by-callback"));
    }

    #[tokio::test]
    async fn test_install_dispatch_records() {
        let mut fx = Fixture::new();
        fx.installer
            .expect_install()
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::install(".")
                    .with_dependencies(vec!["noop".to_string()])]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        let (changes, _) = executor.records();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].dependencies.as_deref(), Some(&["noop".to_string()][..]));
    }

    #[tokio::test]
    async fn test_clone_invalid_repository_shape() {
        let fx = Fixture::new();
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default();

        executor
            .execute(
                &items(vec![ActionSpec::clone_repo("not a repo", ".")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        let (_, failures) = executor.records();
        assert!(failures[0].error.contains("Invalid repository"));
    }

    #[tokio::test]
    async fn test_clone_fetches_prompts_and_renders() {
        let mut fx = Fixture::new();
        fx.fetcher.expect_fetch().times(1).returning(|_, dest| {
            std::fs::create_dir_all(dest).unwrap();
            std::fs::write(dest.join("README.md"), "# {{titleCase name}}\n").unwrap();
            std::fs::write(dest.join("{{name}}.txt"), "hello {{name}}\n").unwrap();
            Ok(())
        });
        let mut executor = fx.executor();
        let mut values = ValueStore::new();
        let mut session = ScriptedSession::default().text("demo");

        executor
            .execute(
                &items(vec![ActionSpec::clone_repo("acme/skeleton", "app")]),
                &mut values,
                false,
                &mut session,
            )
            .await
            .unwrap();

        assert_eq!(fx.read("app/README.md"), "# Demo\n");
        assert_eq!(fx.read("app/demo.txt"), "hello demo\n");
        assert!(!fx.dir.path().join("app/{{name}}.txt").exists());
        let (changes, _) = executor.records();
        assert_eq!(changes[0].repository.as_deref(), Some("acme/skeleton"));
        assert!(session.is_drained());
    }
}
