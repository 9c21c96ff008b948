use crate::utils::error::{DeckError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Sends PDFs to a CUPS printer through `lp`.
#[derive(Debug, Clone)]
pub struct Printer {
    command: String,
    destination: Option<String>,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new("lp", None)
    }
}

impl Printer {
    pub fn new(command: impl Into<String>, destination: Option<String>) -> Self {
        Self {
            command: command.into(),
            destination,
        }
    }

    pub fn args(&self, pdf: &Path) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(dest) = &self.destination {
            args.push("-d".to_string());
            args.push(dest.clone());
        }
        args.push(pdf.display().to_string());
        args
    }

    pub async fn print(&self, pdf: &Path) -> Result<()> {
        if !tokio::fs::try_exists(pdf).await.unwrap_or(false) {
            return Err(DeckError::PrintError {
                message: format!("{} does not exist", pdf.display()),
            });
        }

        let output = Command::new(&self.command)
            .args(self.args(pdf))
            .output()
            .await
            .map_err(|e| DeckError::PrintError {
                message: format!("cannot run {}: {}", self.command, e),
            })?;

        if !output.status.success() {
            return Err(DeckError::PrintError {
                message: format!(
                    "{} exited with {}: {}",
                    self.command,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        tracing::info!(pdf = %pdf.display(), "🖨️  Sent to printer");
        Ok(())
    }

    /// 逐一送印；單一失敗只記錄，不中斷其他檔案
    pub async fn print_all(&self, pdfs: &[PathBuf]) -> Vec<(PathBuf, Result<()>)> {
        let mut outcomes = Vec::with_capacity(pdfs.len());
        for pdf in pdfs {
            let outcome = self.print(pdf).await;
            if let Err(e) = &outcome {
                tracing::error!(pdf = %pdf.display(), error = %e, "✗ Print failed");
            }
            outcomes.push((pdf.clone(), outcome));
        }
        outcomes
    }
}
