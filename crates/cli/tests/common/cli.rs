//! CLI command execution helpers
//!
//! Wraps the `treewatch` binary with an isolated config home and
//! convenient assertion methods.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// CLI command builder
pub struct TwCommand {
    binary_path: PathBuf,
    working_dir: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl TwCommand {
    /// Create a command running in `working_dir`, with `XDG_CONFIG_HOME`
    /// pointed at `config_home` so no user configuration leaks in
    pub fn new(working_dir: impl AsRef<Path>, config_home: impl AsRef<Path>) -> Self {
        let mut env = HashMap::new();
        env.insert(
            "XDG_CONFIG_HOME".to_string(),
            config_home.as_ref().display().to_string(),
        );

        Self {
            binary_path: PathBuf::from(env!("CARGO_BIN_EXE_treewatch")),
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
            env,
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Add a path argument
    pub fn arg_path(&mut self, path: &Path) -> &mut Self {
        self.args.push(path.display().to_string());
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary_path);
        command
            .args(&self.args)
            .current_dir(&self.working_dir)
            .envs(&self.env);
        command
    }

    /// Run to completion
    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();
        let output = self.command().output().context("Failed to execute command")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }

        Ok(result)
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }

        Ok(result)
    }

    /// Spawn in the background and wait until stderr shows `ready`
    pub fn spawn_until(&self, ready: &str, timeout: Duration) -> Result<RunningCommand> {
        let mut child = self
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn command")?;

        let stderr = child.stderr.take().context("stderr was not captured")?;
        let (tx, rx) = std::sync::mpsc::channel();
        let ready = ready.to_string();
        std::thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(|line| line.ok()) {
                if line.contains(&ready) {
                    let _ = tx.send(());
                }
            }
        });

        if rx.recv_timeout(timeout).is_err() {
            let _ = child.kill();
            anyhow::bail!("Command did not become ready within {:?}", timeout);
        }

        Ok(RunningCommand { child })
    }
}

/// A spawned command
pub struct RunningCommand {
    child: Child,
}

impl RunningCommand {
    /// Wait for exit, killing the process after `timeout`
    pub fn wait(mut self, timeout: Duration) -> Result<CommandResult> {
        let start = Instant::now();

        loop {
            if self.child.try_wait()?.is_some() {
                break;
            }
            if start.elapsed() > timeout {
                let _ = self.child.kill();
                anyhow::bail!("Command did not exit within {:?}", timeout);
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        let output = self.child.wait_with_output()?;
        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }
}

/// Command execution result
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Check if stdout contains text
    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    /// Check if stderr contains text
    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }

    /// Parse stdout as one JSON document
    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.stdout).context("stdout is not valid JSON")
    }

    /// Parse stdout as one JSON document per line
    pub fn json_lines(&self) -> Result<Vec<serde_json::Value>> {
        self.stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("line is not valid JSON"))
            .collect()
    }
}
