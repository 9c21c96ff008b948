use crate::domain::model::{TaskHandle, TaskState};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
    /// 檔案在本機上的完整路徑 (瀏覽器需要 file:// URL)
    fn resolve(&self, path: &str) -> PathBuf;
}

/// Paths and pacing shared by the deck stages.
pub trait ConfigProvider: Send + Sync {
    fn catalog_path(&self) -> &str;
    fn artwork_dir(&self) -> &str;
    fn output_dir(&self) -> &str;
    fn log_dir(&self) -> &str;
}

/// A text-to-image vendor that accepts prompts and hands back task ids.
#[async_trait]
pub trait ImageVendor: Send + Sync {
    fn name(&self) -> &str;
    fn endpoint(&self) -> &str;
    async fn submit(&self, prompt: &str) -> Result<TaskHandle>;
    async fn check(&self, task_id: &str) -> Result<TaskState>;
}

/// Turns an HTML file into a PNG or PDF.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn screenshot(&self, html: &Path, png: &Path, width_px: u32, height_px: u32) -> Result<()>;
    async fn pdf(&self, html: &Path, pdf: &Path) -> Result<()>;
}
