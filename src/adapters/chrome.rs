use crate::core::deck::file_url;
use crate::core::Renderer;
use crate::utils::error::{DeckError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

/// Drives an external headless Chrome/Chromium binary.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    binary: String,
    timeout: Duration,
    virtual_time_budget_ms: u64,
}

impl ChromeRenderer {
    pub fn new(binary: impl Into<String>, timeout: Duration, virtual_time_budget_ms: u64) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            virtual_time_budget_ms,
        }
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "--headless".to_string(),
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--hide-scrollbars".to_string(),
            "--force-device-scale-factor=1".to_string(),
            // 等待圖片載入後再截圖
            format!("--virtual-time-budget={}", self.virtual_time_budget_ms),
        ]
    }

    pub fn screenshot_args(&self, html: &Path, png: &Path, width_px: u32, height_px: u32) -> Vec<String> {
        let mut args = self.base_args();
        args.push(format!("--window-size={},{}", width_px, height_px));
        args.push(format!("--screenshot={}", png.display()));
        args.push(file_url(html));
        args
    }

    pub fn pdf_args(&self, html: &Path, pdf: &Path) -> Vec<String> {
        let mut args = self.base_args();
        args.push(format!("--print-to-pdf={}", pdf.display()));
        args.push("--no-pdf-header-footer".to_string());
        args.push(file_url(html));
        args
    }

    async fn run(&self, args: Vec<String>, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tracing::debug!(binary = %self.binary, ?args, "Launching headless browser");
        let child = Command::new(&self.binary)
            .args(&args)
            .kill_on_drop(true)
            .output();

        let result = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                DeckError::render(format!(
                    "{} did not finish within {}s",
                    self.binary,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| DeckError::render(format!("cannot launch {}: {}", self.binary, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(DeckError::render(format!(
                "{} exited with {}: {}",
                self.binary,
                result.status,
                stderr.trim()
            )));
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(DeckError::render(format!(
                "{} produced no output at {}",
                self.binary,
                output.display()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn screenshot(&self, html: &Path, png: &Path, width_px: u32, height_px: u32) -> Result<()> {
        let args = self.screenshot_args(html, png, width_px, height_px);
        self.run(args, png).await
    }

    async fn pdf(&self, html: &Path, pdf: &Path) -> Result<()> {
        let args = self.pdf_args(html, pdf);
        self.run(args, pdf).await
    }
}
