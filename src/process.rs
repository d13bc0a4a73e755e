//! External process execution
//!
//! Three ways to run a tool:
//! - [`run_logged`]: stream output to the console and a log file at the same time
//! - [`probe`]: short captured invocation bounded by a timeout (version checks)
//! - [`run_inherited`]: interactive launch sharing our stdio
//! - [`run_until_interrupted`]: inherited stdio, stopped by Ctrl-C without
//!   taking this process down with it
//!
//! Environment a child needs (SDK roots, loader paths, `JAVA_HOME`) is carried
//! in a [`ToolEnv`] and applied to that child's command only. The parent
//! process environment is never mutated.

use crate::error::{SparkleError, SparkleResult};
use chrono::Local;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Timeout for auxiliary version probes
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for best-effort package manager installs
pub const PACKAGE_MANAGER_TIMEOUT: Duration = Duration::from_secs(300);

/// Environment entries applied to child processes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolEnv {
    vars: BTreeMap<String, String>,
    path_prefix: Vec<PathBuf>,
}

impl ToolEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Prepend `entry` to a list-valued variable.
    ///
    /// `inherited` is the value the child would otherwise see; the entry is
    /// not duplicated if already present.
    pub fn prepend_list(
        &mut self,
        key: &str,
        entry: &str,
        separator: &str,
        inherited: Option<String>,
    ) {
        let current = self.vars.get(key).cloned().or(inherited);
        let value = match current {
            Some(existing) if !existing.is_empty() => {
                if existing.split(separator).any(|e| e == entry) {
                    existing
                } else {
                    format!("{}{}{}", entry, separator, existing)
                }
            }
            _ => entry.to_string(),
        };
        self.vars.insert(key.to_string(), value);
    }

    /// Add a directory in front of the child's PATH
    pub fn prepend_path(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.path_prefix.contains(&dir) {
            self.path_prefix.push(dir);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn path_prefix(&self) -> &[PathBuf] {
        &self.path_prefix
    }

    /// Merge another environment into this one (other wins on conflicts)
    pub fn extend(&mut self, other: &ToolEnv) {
        for (k, v) in &other.vars {
            self.vars.insert(k.clone(), v.clone());
        }
        for dir in &other.path_prefix {
            self.prepend_path(dir.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty() && self.path_prefix.is_empty()
    }

    fn apply(&self, cmd: &mut Command) {
        cmd.envs(&self.vars);
        if !self.path_prefix.is_empty() {
            let mut entries: Vec<PathBuf> = self.path_prefix.clone();
            if let Some(existing) = std::env::var_os("PATH") {
                entries.extend(std::env::split_paths(&existing));
            }
            if let Ok(joined) = std::env::join_paths(entries) {
                cmd.env("PATH", joined);
            }
        }
    }
}

/// A fully described external command
#[derive(Debug, Clone)]
pub struct CommandLine {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    env: ToolEnv,
}

impl CommandLine {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: ToolEnv::default(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, env: &ToolEnv) -> Self {
        self.env.extend(env);
        self
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn tool_env(&self) -> &ToolEnv {
        &self.env
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        self.env.apply(&mut cmd);
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Run a command, streaming its output to the console and `log_path`.
///
/// Returns `Ok(true)` on a zero exit status. Spawn and log-file failures are
/// errors; a non-zero exit is reported as `Ok(false)` so the caller can map
/// it to its own failure class together with the log location.
pub async fn run_logged(cmd: &CommandLine, log_path: &Path, description: &str) -> SparkleResult<bool> {
    println!("{}... See {} for detailed logs.", description, log_path.display());
    println!("Running: {}", cmd);

    if let Some(parent) = log_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SparkleError::io(format!("creating log directory {}", parent.display()), e))?;
    }

    let mut log = File::create(log_path)
        .await
        .map_err(|e| SparkleError::io(format!("creating log file {}", log_path.display()), e))?;

    let header = format!("# {} at {}\n# {}\n", description, Local::now().to_rfc3339(), cmd);
    log.write_all(header.as_bytes())
        .await
        .map_err(|e| SparkleError::io("writing log header", e))?;

    let mut child = cmd
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SparkleError::command_failed(cmd.to_string(), e))?;

    stream_child_output(&mut child, &mut log).await?;

    let status = child
        .wait()
        .await
        .map_err(|e| SparkleError::command_failed(cmd.to_string(), e))?;

    log.flush().await.map_err(|e| SparkleError::io("flushing log file", e))?;

    if status.success() {
        println!("{} completed successfully!", description);
    } else {
        println!("{} failed! Check {} for details.", description, log_path.display());
    }
    Ok(status.success())
}

#[derive(Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

/// Read both pipes of a child in a single loop, echoing each line to the
/// console and appending it to the log.
///
/// Lines are decoded lossily; a pipe only stops being read at EOF so the
/// child can never block on a full pipe.
async fn stream_child_output(child: &mut tokio::process::Child, log: &mut File) -> SparkleResult<()> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SparkleError::Internal("child stdout not piped".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SparkleError::Internal("child stderr not piped".to_string()))?;

    let mut stdout = BufReader::new(stdout);
    let mut stderr = BufReader::new(stderr);
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();
    let mut stdout_done = false;
    let mut stderr_done = false;

    while !stdout_done || !stderr_done {
        let (pipe, read) = tokio::select! {
            read = stdout.read_until(b'\n', &mut stdout_buf), if !stdout_done => (Pipe::Stdout, read),
            read = stderr.read_until(b'\n', &mut stderr_buf), if !stderr_done => (Pipe::Stderr, read),
        };

        let (buf, done) = match pipe {
            Pipe::Stdout => (&mut stdout_buf, &mut stdout_done),
            Pipe::Stderr => (&mut stderr_buf, &mut stderr_done),
        };

        match read {
            Ok(0) => *done = true,
            Ok(_) => {
                let text = String::from_utf8_lossy(buf);
                let line = text.trim_end_matches(['\n', '\r']);
                println!("{}", line);
                log.write_all(format!("{}\n", line).as_bytes())
                    .await
                    .map_err(|e| SparkleError::io("writing log file", e))?;
                buf.clear();
            }
            Err(e) => return Err(SparkleError::io("reading child output", e)),
        }
    }

    Ok(())
}

/// Run a short command with captured output, killing it after `timeout`
pub async fn probe(cmd: &CommandLine, timeout: Duration) -> SparkleResult<Output> {
    debug!("Probing: {}", cmd);

    let child = cmd
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SparkleError::command_failed(cmd.to_string(), e))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output.map_err(|e| SparkleError::command_failed(cmd.to_string(), e)),
        Err(_) => Err(SparkleError::command_exec(
            cmd.to_string(),
            format!("timed out after {}s", timeout.as_secs()),
        )),
    }
}

/// Run a command with captured output and no timeout
pub async fn capture(cmd: &CommandLine) -> SparkleResult<Output> {
    debug!("Executing: {}", cmd);

    cmd.to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| SparkleError::command_failed(cmd.to_string(), e))
}

/// Run a command attached to our terminal and return its exit code
pub async fn run_inherited(cmd: &CommandLine) -> SparkleResult<i32> {
    debug!("Executing interactively: {}", cmd);

    let status = cmd
        .to_command()
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| SparkleError::command_failed(cmd.to_string(), e))?;

    Ok(status.code().unwrap_or(-1))
}

/// Run a long-lived command (log followers) until it exits or Ctrl-C arrives.
///
/// Returns the exit code, or `None` when the user interrupted.
pub async fn run_until_interrupted(cmd: &CommandLine) -> SparkleResult<Option<i32>> {
    debug!("Executing until interrupted: {}", cmd);

    let mut child = cmd
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SparkleError::command_failed(cmd.to_string(), e))?;

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| SparkleError::command_failed(cmd.to_string(), e))?;
            Ok(Some(status.code().unwrap_or(-1)))
        }
        _ = tokio::signal::ctrl_c() => {
            debug!("Interrupted, stopping {}", cmd);
            let _ = child.kill().await;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn tool_env_prepend_dedupes() {
        let mut env = ToolEnv::new();
        env.prepend_list("VK_LAYER_PATH", "/sdk/layers", ":", Some("/other".to_string()));
        assert_eq!(env.get("VK_LAYER_PATH"), Some("/sdk/layers:/other"));

        env.prepend_list("VK_LAYER_PATH", "/sdk/layers", ":", None);
        assert_eq!(env.get("VK_LAYER_PATH"), Some("/sdk/layers:/other"));
    }

    #[test]
    fn tool_env_prepend_without_inherited() {
        let mut env = ToolEnv::new();
        env.prepend_list("VK_ICD_FILENAMES", "/sdk/icd.json", ":", None);
        assert_eq!(env.get("VK_ICD_FILENAMES"), Some("/sdk/icd.json"));
    }

    #[test]
    fn command_line_display() {
        let cmd = CommandLine::new("cmake").args(["--build", "."]).arg("-j");
        assert_eq!(cmd.to_string(), "cmake --build . -j");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_logged_captures_both_streams() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("logs").join("build.log");
        let cmd = CommandLine::new("sh").args(["-c", "echo to-stdout; echo to-stderr 1>&2"]);

        let ok = run_logged(&cmd, &log, "Testing").await.unwrap();
        assert!(ok);

        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("to-stdout"));
        assert!(content.contains("to-stderr"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_logged_reports_failure() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("build.log");
        let cmd = CommandLine::new("sh").args(["-c", "echo broken; exit 3"]);

        let ok = run_logged(&cmd, &log, "Failing").await.unwrap();
        assert!(!ok);
        assert!(std::fs::read_to_string(&log).unwrap().contains("broken"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_logged_survives_invalid_utf8() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("build.log");
        // Invalid bytes first, then far more than a pipe buffer holds
        let script = "printf '\\377\\376 cl.exe: warnung\\n'; head -c 300000 /dev/zero | tr '\\0' a; echo; echo finished 1>&2";
        let cmd = CommandLine::new("sh").args(["-c", script]);

        let ok = tokio::time::timeout(Duration::from_secs(30), run_logged(&cmd, &log, "Noisy"))
            .await
            .expect("run_logged returned")
            .unwrap();
        assert!(ok);

        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("\u{FFFD}\u{FFFD} cl.exe: warnung"));
        assert!(content.contains("finished"));
        assert!(content.matches('a').count() >= 300_000);
    }

    #[tokio::test]
    async fn run_logged_missing_program_errors() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("build.log");
        let cmd = CommandLine::new("definitely-not-a-real-program-4242");

        let err = run_logged(&cmd, &log, "Missing").await.unwrap_err();
        assert!(matches!(err, SparkleError::CommandFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn probe_times_out() {
        let cmd = CommandLine::new("sleep").arg("5");
        let err = probe(&cmd, Duration::from_millis(100)).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_until_interrupted_reports_exit_code() {
        let cmd = CommandLine::new("sh").args(["-c", "exit 4"]);
        assert_eq!(run_until_interrupted(&cmd).await.unwrap(), Some(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn child_sees_tool_env() {
        let mut env = ToolEnv::new();
        env.set("SPARKLE_TEST_VALUE", "42");
        let cmd = CommandLine::new("sh")
            .args(["-c", "echo $SPARKLE_TEST_VALUE"])
            .env(&env);

        let output = probe(&cmd, PROBE_TIMEOUT).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "42");
        assert!(std::env::var("SPARKLE_TEST_VALUE").is_err());
    }
}
