use std::fmt;
use std::process::Command;

use crate::bin_path::tool_path;

/// A local command line, run without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCommand {
    /// A tool name, resolved with [`tool_path`] when the command is run.
    pub program: String,
    pub args: Vec<String>,
}

impl LocalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
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

    /// Whether any argument contains `needle`.
    pub fn has_arg_containing(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a.contains(needle))
    }
}

impl fmt::Display for LocalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&display_word(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", display_word(arg))?;
        }
        Ok(())
    }
}

fn display_word(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-.,:/@=%+".contains(c));
    if plain {
        word.to_string()
    } else {
        shellwords::escape(word)
    }
}

/// What a successful command printed, decoded lossily.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LocalProcessError {
    #[error("Cannot run '{command}': {reason}")]
    NotFound { command: String, reason: String },
    #[error("Failed to launch '{command}': {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },
    #[error("'{command}' exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Runs local commands to completion, blocking the caller.
pub trait ProcessRunner {
    fn execute(&self, command: &LocalCommand) -> Result<ProcessOutput, LocalProcessError>;

    /// Run a command, logging the failure if there is one.
    fn run(&self, command: &LocalCommand) -> bool {
        match self.execute(command) {
            Ok(_) => true,
            Err(e) => {
                log::error!("Error executing local command: {e}");
                false
            }
        }
    }
}

/// Runs commands on this machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProcessRunner;

impl ProcessRunner for LocalProcessRunner {
    fn execute(&self, command: &LocalCommand) -> Result<ProcessOutput, LocalProcessError> {
        let program = tool_path(&command.program).map_err(|e| LocalProcessError::NotFound {
            command: command.to_string(),
            reason: format!("{e:#}"),
        })?;

        log::debug!("Running local command: {command}");
        let output = Command::new(program)
            .args(&command.args)
            .output()
            .map_err(|source| LocalProcessError::Launch {
                command: command.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(LocalProcessError::Failed {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(ProcessOutput { stdout, stderr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_quoted_command_line() {
        let command = LocalCommand::new("dnspyre")
            .args(["--server", "192.0.2.10"])
            .arg("@output/domain 10.txt");
        assert_eq!(
            command.to_string(),
            r"dnspyre --server 192.0.2.10 @output/domain\ 10.txt"
        );
        assert!(command.has_arg_containing("domain"));
    }

    #[test]
    fn missing_tool_is_not_found() {
        let command = LocalCommand::new("dnsfw-definitely-missing-tool");
        let result = LocalProcessRunner.execute(&command);
        assert!(matches!(result, Err(LocalProcessError::NotFound { .. })));
        assert!(!LocalProcessRunner.run(&command));
    }

    #[cfg(unix)]
    #[test]
    fn captures_output_and_failure() {
        let ok = LocalProcessRunner
            .execute(&LocalCommand::new("sh").args(["-c", "echo hello"]))
            .unwrap();
        assert_eq!(ok.stdout, "hello\n");

        let failed = LocalProcessRunner
            .execute(&LocalCommand::new("sh").args(["-c", "echo nope >&2; exit 3"]))
            .unwrap_err();
        match failed {
            LocalProcessError::Failed { stderr, .. } => assert_eq!(stderr, "nope"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
