use anyhow::{Context, Result, anyhow, bail};
use std::future::Future;
use std::io::ErrorKind;
use std::pin::Pin;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub type TranslateFuture = Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send>>;

/// Translation engine seam. One call per image: the returned list must match
/// `texts` in length and order.
pub trait BlockTranslator: Clone + Send + Sync {
    fn translate_blocks(self, texts: Vec<String>) -> TranslateFuture;
}

/// Returns the source text unchanged; useful for checking layout.
#[derive(Debug, Clone, Default)]
pub struct IdentityTranslator;

impl BlockTranslator for IdentityTranslator {
    fn translate_blocks(self, texts: Vec<String>) -> TranslateFuture {
        Box::pin(async move { Ok(texts) })
    }
}

/// Runs a shell command that reads a JSON array of strings on stdin and
/// writes a JSON array of translations to stdout.
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    command: String,
}

impl CommandTranslator {
    pub fn new(command: impl Into<String>) -> Result<Self> {
        let command = command.into();
        if command.trim().is_empty() {
            bail!("translate command is empty");
        }
        Ok(Self { command })
    }
}

impl BlockTranslator for CommandTranslator {
    fn translate_blocks(self, texts: Vec<String>) -> TranslateFuture {
        Box::pin(async move { run_command(&self.command, &texts).await })
    }
}

async fn run_command(command: &str, texts: &[String]) -> Result<Vec<String>> {
    let payload = serde_json::to_vec(texts)?;
    debug!(command, blocks = texts.len(), "spawning translate command");
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn translate command: {}", command))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("translate command has no stdin"))?;
    // stdout is drained while the payload is still being written
    let write_input = async move {
        match stdin.write_all(&payload).await {
            Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                debug!("translate command closed stdin early");
                Ok(())
            }
            result => result.with_context(|| "failed to write translate command input"),
        }
    };
    let wait_output = async move {
        child
            .wait_with_output()
            .await
            .with_context(|| "failed to wait for translate command")
    };
    let ((), output) = tokio::try_join!(write_input, wait_output)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "translate command exited with {}: {}",
            output.status,
            stderr.trim()
        );
    }
    let translations: Vec<String> = serde_json::from_slice(&output.stdout)
        .with_context(|| "translate command did not print a JSON array of strings")?;
    Ok(translations)
}
