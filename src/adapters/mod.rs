// Adapters layer: concrete implementations for external systems (filesystem, vendor APIs, browser).

pub mod chrome;
pub mod http;
pub mod mulerouter;
pub mod replicate;
pub mod storage;

use crate::config::toml_config::{VendorConfig, VendorKind};
use crate::core::ImageVendor;
use crate::utils::error::Result;
use reqwest::Client;

pub use chrome::ChromeRenderer;
pub use mulerouter::MuleRouter;
pub use replicate::Replicate;
pub use storage::LocalStorage;

/// 依設定建立對應的 vendor client
pub fn build_vendor(config: &VendorConfig, client: Client, api_key: String) -> Result<Box<dyn ImageVendor>> {
    let vendor: Box<dyn ImageVendor> = match config.kind {
        VendorKind::Mulerouter => Box::new(MuleRouter::new(
            client,
            config.base_url(),
            config.model(),
            api_key,
        )?),
        VendorKind::Replicate => Box::new(Replicate::new(
            client,
            config.base_url(),
            config.model(),
            api_key,
        )?),
    };

    tracing::info!(
        vendor = vendor.name(),
        model = config.model(),
        endpoint = vendor.endpoint(),
        "Vendor client ready"
    );
    Ok(vendor)
}
