//! Sandboxed Python code execution.
//!
//! One-shot execution: the generated source is piped straight into the
//! interpreter's stdin and run to completion, stdout/stderr captured from
//! piped handles, with a hard wall-clock timeout. No scratch files on disk,
//! no long-lived child process to manage.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use dp_domain::error::{Error, Result};

use crate::traits::CodeExecutor;

pub struct SandboxCodeExecutor {
    interpreter: String,
    timeout: Duration,
}

impl SandboxCodeExecutor {
    pub fn new(interpreter: impl Into<String>, timeout_seconds: u64) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout: Duration::from_secs(timeout_seconds),
        }
    }
}

#[async_trait::async_trait]
impl CodeExecutor for SandboxCodeExecutor {
    async fn run(&self, python_source: &str) -> Result<String> {
        let mut child = Command::new(&self.interpreter)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(Error::Io)?;

        let mut stdin = child.stdin.take().expect("piped stdin");
        stdin.write_all(python_source.as_bytes()).await.map_err(Error::Io)?;
        drop(stdin);

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(Error::Io)?,
            Err(_) => {
                return Err(Error::Timeout(format!(
                    "code execution exceeded {:?}",
                    self.timeout
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(Error::Provider {
                provider: "code_exec".into(),
                message: if stderr.is_empty() {
                    format!("interpreter exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
