//! I/O collaborator: how the agent talks to its operator.

use std::io::BufRead;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, mpsc};
use tracing::warn;

use crate::error::AgentError;

const COLLABORATOR: &str = "io";

/// Operator-facing channel.
#[async_trait]
pub trait IoChannel: Send + Sync {
    /// Shows `prompt` and returns the operator's answer, trimmed.
    async fn ask(&self, prompt: &str) -> Result<String, AgentError>;

    /// Shows `text` to the operator.
    async fn tell(&self, text: &str) -> Result<(), AgentError>;
}

/// Terminal channel over stdin/stdout.
///
/// Lines are read on a detached OS thread and handed over through a
/// channel, so a pending [`IoChannel::ask`] never holds the runtime open
/// at shutdown.
#[derive(Debug)]
pub struct TerminalIo {
    lines: Mutex<mpsc::Receiver<std::io::Result<String>>>,
}

impl Default for TerminalIo {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalIo {
    /// Creates a channel on the process's standard streams.
    #[must_use]
    pub fn new() -> Self {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()))
    }

    /// Creates a channel that reads answers from `reader`.
    #[must_use]
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        Self {
            lines: Mutex::new(spawn_line_reader(reader)),
        }
    }

    async fn write(text: &str) -> Result<(), AgentError> {
        let mut out = tokio::io::stdout();
        out.write_all(text.as_bytes())
            .await
            .map_err(|e| AgentError::external(COLLABORATOR, e))?;
        out.flush()
            .await
            .map_err(|e| AgentError::external(COLLABORATOR, e))
    }
}

/// Feeds lines from `reader` into a channel until EOF, a read error, or
/// the receiver is dropped.
fn spawn_line_reader<R>(mut reader: R) -> mpsc::Receiver<std::io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    let spawned = std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            loop {
                let mut line = String::new();
                let item = match reader.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => Ok(line),
                    Err(e) => Err(e),
                };
                let failed = item.is_err();
                if tx.blocking_send(item).is_err() || failed {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        // The sender went down with the closure; every ask reports a closed stdin.
        warn!(error = %e, "failed to start stdin reader");
    }
    rx
}

#[async_trait]
impl IoChannel for TerminalIo {
    async fn ask(&self, prompt: &str) -> Result<String, AgentError> {
        Self::write(&format!("{prompt}\n> ")).await?;

        match self.lines.lock().await.recv().await {
            Some(Ok(line)) => Ok(line.trim().to_string()),
            Some(Err(e)) => Err(AgentError::external(COLLABORATOR, e)),
            None => Err(AgentError::external(COLLABORATOR, "stdin closed")),
        }
    }

    async fn tell(&self, text: &str) -> Result<(), AgentError> {
        Self::write(&format!("{text}\n")).await
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor, Read};
    use std::time::Duration;

    use super::*;

    /// A source that never yields a byte, like an idle terminal.
    struct Idle;

    impl Read for Idle {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            loop {
                std::thread::park();
            }
        }
    }

    #[tokio::test]
    async fn test_ask_returns_trimmed_lines_in_order() {
        let io = TerminalIo::from_reader(Cursor::new("first\n  second answer  \n"));

        let first = io.ask("q1").await.unwrap_or_else(|_| unreachable!());
        let second = io.ask("q2").await.unwrap_or_else(|_| unreachable!());

        assert_eq!(first, "first");
        assert_eq!(second, "second answer");
    }

    #[tokio::test]
    async fn test_ask_after_eof_is_an_error() {
        let io = TerminalIo::from_reader(Cursor::new("only\n"));
        let _ = io.ask("q1").await;

        let result = io.ask("q2").await;

        assert!(matches!(
            result,
            Err(AgentError::ExternalCall { ref message, .. }) if message == "stdin closed"
        ));
    }

    #[test]
    fn test_runtime_shuts_down_while_ask_is_pending() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap_or_else(|_| unreachable!());
        let io = TerminalIo::from_reader(BufReader::new(Idle));

        let result = rt.block_on(async {
            tokio::time::timeout(Duration::from_millis(20), io.ask("question")).await
        });

        assert!(result.is_err());
        // Returns promptly: the blocked read lives on its own thread.
        drop(rt);
    }
}
