pub mod compare;
pub mod deck;
pub mod html;
pub mod layout;
pub mod printer;
pub mod probe;
pub mod prompts;
pub mod runner;
pub mod svg;

pub use crate::domain::model::{
    Card, CardCatalog, JobRecord, JobStatus, PromptCard, RunLog, SheetItem, TaskHandle, TaskState,
};
pub use crate::domain::ports::{ConfigProvider, ImageVendor, Renderer, Storage};
pub use crate::utils::error::Result;
