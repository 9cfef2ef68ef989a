//! External command invocations.
//!
//! A [`BuildStep`] is one planned invocation of an external build tool:
//! program, arguments, working directory, and environment overrides,
//! together with a short human-readable name used in progress output and
//! error messages. Steps are constructed by the per-platform planners,
//! executed once in order, and discarded. Execution is strictly
//! synchronous: each child is waited on to completion before the next step
//! runs, and output streams straight through to the console.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use indexmap::IndexMap;

use crate::error::{BuildError, Result};
use crate::fsutil;

#[derive(Debug, Clone)]
pub struct BuildStep {
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: IndexMap<String, String>,
    /// Directories prepended to the child's `PATH`.
    pub path_prepend: Vec<PathBuf>,
    /// Directories appended to the child's `PATH`.
    pub path_append: Vec<PathBuf>,
}

impl BuildStep {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        BuildStep {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: IndexMap::new(),
            path_prepend: Vec::new(),
            path_append: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn prepend_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.path_prepend.push(dir.into());
        self
    }

    pub fn append_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.path_append.push(dir.into());
        self
    }

    /// Shell-style rendering for progress output; arguments containing
    /// spaces are quoted.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        for arg in &self.args {
            if arg.contains(' ') {
                parts.push(format!("\"{}\"", arg));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }

    fn modified_path(&self) -> Option<OsString> {
        if self.path_prepend.is_empty() && self.path_append.is_empty() {
            return None;
        }
        let current = env::var_os("PATH").unwrap_or_default();
        let mut parts: Vec<PathBuf> = self.path_prepend.clone();
        parts.extend(env::split_paths(&current));
        parts.extend(self.path_append.iter().cloned());
        env::join_paths(parts).ok()
    }

    /// Runs the step, creating its working directory on demand, and waits
    /// for completion.
    pub fn run(&self) -> Result<()> {
        println!("Running command '{}': {}", self.name, self.command_line());

        let mut command = Command::new(&self.program);
        command.args(&self.args);

        if let Some(cwd) = &self.cwd {
            fsutil::mkdir_p(cwd)?;
            command.current_dir(cwd);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }
        if let Some(path) = self.modified_path() {
            command.env("PATH", path);
        }

        let status = command.status().map_err(|source| BuildError::StepSpawn {
            name: self.name.clone(),
            source,
        })?;

        if !status.success() {
            return Err(BuildError::Step {
                name: self.name.clone(),
                code: status.code().unwrap_or(-1),
            });
        }

        println!("Command '{}' completed successfully", self.name);
        Ok(())
    }
}

/// Executes steps in order, aborting on the first failure.
pub fn run_steps(steps: &[BuildStep]) -> Result<()> {
    for step in steps {
        step.run()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_quotes_arguments_with_spaces() {
        let step = BuildStep::new("configure", "/src/configure")
            .arg("--disable-nls")
            .arg("CFLAGS=-O2 -g");
        assert_eq!(
            step.command_line(),
            "/src/configure --disable-nls \"CFLAGS=-O2 -g\""
        );
    }

    #[test]
    fn failing_step_reports_exit_code() {
        let step = BuildStep::new("false", "false");
        match step.run() {
            Err(BuildError::Step { name, code }) => {
                assert_eq!(name, "false");
                assert_eq!(code, 1);
            }
            other => panic!("expected step failure, got {:?}", other),
        }
    }

    #[test]
    fn successful_step_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().join("nested/build");
        let step = BuildStep::new("true", "true").cwd(&cwd);
        step.run().unwrap();
        // Working directories are created on demand.
        assert!(cwd.is_dir());
    }
}
