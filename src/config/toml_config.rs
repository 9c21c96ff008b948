use crate::core::layout::{PrintPreset, PrintSpec, SheetLayout};
use crate::core::prompts::StylePreset;
use crate::core::runner::Pacing;
use crate::core::ConfigProvider;
use crate::utils::error::{DeckError, Result};
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "deck.toml";
pub const MULEROUTER_KEY_ENV: &str = "MULEROUTER_API_KEY";
pub const REPLICATE_TOKEN_ENV: &str = "REPLICATE_API_TOKEN";
pub const CHROME_PATH_ENV: &str = "CHROME_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    pub catalog: CatalogConfig,
    pub paths: PathsConfig,
    pub vendor: VendorConfig,
    pub pacing: PacingConfig,
    pub print: PrintConfig,
    pub render: RenderConfig,
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: String,
    pub style_preset: Option<StylePreset>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: "data/futures-deck.json".to_string(),
            style_preset: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub artwork_dir: String,
    pub output_dir: String,
    pub log_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            artwork_dir: "assets/deck-artwork".to_string(),
            output_dir: "output/print-ready".to_string(),
            log_dir: "assets".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum VendorKind {
    #[default]
    Mulerouter,
    Replicate,
}

impl VendorKind {
    pub fn default_base_url(self) -> &'static str {
        match self {
            VendorKind::Mulerouter => "https://api.mulerouter.ai",
            VendorKind::Replicate => "https://api.replicate.com",
        }
    }

    pub fn key_env(self) -> &'static str {
        match self {
            VendorKind::Mulerouter => MULEROUTER_KEY_ENV,
            VendorKind::Replicate => REPLICATE_TOKEN_ENV,
        }
    }

    pub fn models(self) -> &'static [&'static str] {
        match self {
            VendorKind::Mulerouter => &["midjourney", "nano-banana", "wan"],
            VendorKind::Replicate => &["flux", "nano-banana"],
        }
    }

    pub fn default_model(self) -> &'static str {
        self.models()[0]
    }

    /// 各家的節流設定不同：(提交間隔, 輪詢間隔)
    fn default_pacing_secs(self) -> (u64, u64) {
        match self {
            VendorKind::Mulerouter => (3, 15),
            VendorKind::Replicate => (12, 2),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorConfig {
    pub kind: VendorKind,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for VendorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorConfig")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl VendorConfig {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.kind.default_model())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
            .trim_end_matches('/')
    }

    /// 設定檔優先；未替換的 ${VAR} 佔位字串視為未設定
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && !k.starts_with("${"))
            .map(str::to_string)
            .or_else(|| {
                std::env::var(self.kind.key_env())
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
    }

    pub fn require_api_key(&self) -> Result<String> {
        self.api_key().ok_or_else(|| DeckError::MissingConfigError {
            field: format!("vendor.api_key ({})", self.kind.key_env()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub submit_delay_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub max_polls: u32,
    pub request_timeout_secs: u64,
    pub download_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            submit_delay_secs: None,
            poll_interval_secs: None,
            max_polls: 60,
            request_timeout_secs: 60,
            download_retries: 3,
            retry_delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintConfig {
    pub preset: PrintPreset,
    pub bleed_in: Option<f64>,
    pub dpi: Option<u32>,
    pub gap_in: f64,
    /// 家用列印的拼版出血；九張含完整出血的卡放不進 Letter 頁面
    pub sheet_bleed_in: f64,
    pub sheet_name: String,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            preset: PrintPreset::Poker,
            bleed_in: None,
            dpi: None,
            gap_in: 0.08,
            sheet_bleed_in: 0.0,
            sheet_name: "futures-deck".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub chrome_path: Option<String>,
    pub timeout_secs: u64,
    pub virtual_time_budget_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            timeout_secs: 120,
            virtual_time_budget_ms: 2000,
        }
    }
}

impl RenderConfig {
    pub fn chrome_path(&self) -> String {
        self.chrome_path
            .clone()
            .filter(|p| !p.starts_with("${"))
            .or_else(|| std::env::var(CHROME_PATH_ENV).ok())
            .unwrap_or_else(|| "chromium".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub bases: Vec<String>,
    pub suffixes: Vec<String>,
    pub model_bases: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            bases: vec![
                "https://api.mulerouter.ai/v1".to_string(),
                "https://api.mulerouter.com/v1".to_string(),
                "https://mulerouter.ai/v1".to_string(),
            ],
            suffixes: vec![
                "/images/generations".to_string(),
                "/generate".to_string(),
                "/midjourney/imagine".to_string(),
            ],
            model_bases: vec!["https://api.mulerouter.ai".to_string()],
        }
    }
}

impl DeckConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DeckError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DeckError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 指定的檔案必須存在；未指定時 deck.toml 可有可無
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => {
                tracing::debug!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
                Ok(Self::default())
            }
        }
    }

    /// 替換環境變數 (例如 ${REPLICATE_API_TOKEN})，找不到的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DeckError::config(e.to_string()))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn pacing(&self) -> Pacing {
        let (submit, poll) = self.vendor.kind.default_pacing_secs();
        Pacing {
            submit_delay: Duration::from_secs(self.pacing.submit_delay_secs.unwrap_or(submit)),
            poll_interval: Duration::from_secs(self.pacing.poll_interval_secs.unwrap_or(poll)),
            max_polls: self.pacing.max_polls,
            download_retries: self.pacing.download_retries,
            retry_delay: Duration::from_secs(self.pacing.retry_delay_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.pacing.request_timeout_secs)
    }

    /// 單張卡片輸出 (專業印刷) 的規格
    pub fn card_spec(&self) -> PrintSpec {
        let mut spec = self.print.preset.spec();
        if let Some(bleed) = self.print.bleed_in {
            spec.bleed_in = bleed;
        }
        if let Some(dpi) = self.print.dpi {
            spec.dpi = dpi;
        }
        spec
    }

    /// 家用列印拼版
    pub fn sheet_layout(&self) -> Result<SheetLayout> {
        let spec = self.card_spec().with_bleed(self.print.sheet_bleed_in.min(self.card_spec().bleed_in));
        SheetLayout::letter(spec, self.print.gap_in)
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_path("catalog.path", &self.catalog.path)?;
        validate_path("paths.artwork_dir", &self.paths.artwork_dir)?;
        validate_path("paths.output_dir", &self.paths.output_dir)?;
        validate_path("paths.log_dir", &self.paths.log_dir)?;

        if let Some(base_url) = &self.vendor.base_url {
            validate_url("vendor.base_url", base_url)?;
        }

        let model = self.vendor.model();
        if !self.vendor.kind.models().contains(&model) {
            return Err(DeckError::InvalidConfigValueError {
                field: "vendor.model".to_string(),
                value: model.to_string(),
                reason: format!(
                    "Unsupported model. Valid models: {}",
                    self.vendor.kind.models().join(", ")
                ),
            });
        }

        validate_positive_number("pacing.max_polls", self.pacing.max_polls as u64, 1)?;
        validate_positive_number(
            "pacing.request_timeout_secs",
            self.pacing.request_timeout_secs,
            1,
        )?;

        validate_range("print.gap_in", self.print.gap_in, 0.0, 0.5)?;
        validate_range("print.sheet_bleed_in", self.print.sheet_bleed_in, 0.0, 0.25)?;
        if let Some(bleed) = self.print.bleed_in {
            validate_range("print.bleed_in", bleed, 0.0, 0.5)?;
        }
        if let Some(dpi) = self.print.dpi {
            validate_range("print.dpi", dpi, 72, 1200)?;
        }

        for base in self.probe.bases.iter().chain(&self.probe.model_bases) {
            validate_url("probe.bases", base)?;
        }

        // 拼版必須放得進頁面
        self.sheet_layout()?;

        Ok(())
    }
}

impl ConfigProvider for DeckConfig {
    fn catalog_path(&self) -> &str {
        &self.catalog.path
    }

    fn artwork_dir(&self) -> &str {
        &self.paths.artwork_dir
    }

    fn output_dir(&self) -> &str {
        &self.paths.output_dir
    }

    fn log_dir(&self) -> &str {
        &self.paths.log_dir
    }
}

impl Validate for DeckConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = DeckConfig::from_toml_str("").unwrap();

        assert_eq!(config.vendor.kind, VendorKind::Mulerouter);
        assert_eq!(config.vendor.model(), "midjourney");
        assert_eq!(config.vendor.base_url(), "https://api.mulerouter.ai");
        assert_eq!(config.paths.artwork_dir, "assets/deck-artwork");
        assert!(config.validate().is_ok());

        let pacing = config.pacing();
        assert_eq!(pacing.submit_delay, Duration::from_secs(3));
        assert_eq!(pacing.poll_interval, Duration::from_secs(15));
        assert_eq!(pacing.max_polls, 60);
    }

    #[test]
    fn test_parse_replicate_config() {
        let toml_content = r#"
[catalog]
path = "data/tarot.json"
style_preset = "tarot"

[vendor]
kind = "replicate"
model = "nano-banana"
base_url = "https://api.replicate.com/"

[pacing]
poll_interval_secs = 4
max_polls = 90

[print]
preset = "mpc-poker"
"#;

        let config = DeckConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.catalog.style_preset, Some(StylePreset::Tarot));
        assert_eq!(config.vendor.kind, VendorKind::Replicate);
        assert_eq!(config.vendor.base_url(), "https://api.replicate.com");
        assert_eq!(config.pacing().submit_delay, Duration::from_secs(12));
        assert_eq!(config.pacing().poll_interval, Duration::from_secs(4));
        assert_eq!(config.card_spec().total_width_px(), 819);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CARD_FORGE_TEST_KEY", "sk-test-123");

        let config = DeckConfig::from_toml_str(
            r#"
[vendor]
api_key = "${CARD_FORGE_TEST_KEY}"
"#,
        )
        .unwrap();
        assert_eq!(config.vendor.api_key().as_deref(), Some("sk-test-123"));

        std::env::remove_var("CARD_FORGE_TEST_KEY");
    }

    #[test]
    fn test_unresolved_placeholder_is_not_a_key() {
        let config = DeckConfig::from_toml_str(
            r#"
[vendor]
kind = "replicate"
api_key = "${CARD_FORGE_DEFINITELY_UNSET}"
"#,
        )
        .unwrap();

        assert_eq!(
            config.vendor.api_key,
            Some("${CARD_FORGE_DEFINITELY_UNSET}".to_string())
        );
        if std::env::var(REPLICATE_TOKEN_ENV).is_err() {
            assert!(config.vendor.require_api_key().is_err());
        }
    }

    #[test]
    fn test_debug_output_hides_api_key() {
        let config = DeckConfig::from_toml_str("[vendor]\napi_key = \"sk-secret\"\n").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let config = DeckConfig::from_toml_str(
            r#"
[vendor]
kind = "replicate"
model = "midjourney"
"#,
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, DeckError::InvalidConfigValueError { .. }));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let config = DeckConfig::from_toml_str(
            r#"
[vendor]
base_url = "not a url"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[paths]\nartwork_dir = \"art\"\n")
            .unwrap();

        let config = DeckConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.artwork_dir(), "art");
        assert_eq!(config.output_dir(), "output/print-ready");
    }

    #[test]
    fn test_missing_explicit_config_file_fails() {
        assert!(DeckConfig::load(Some("/definitely/not/here/deck.toml")).is_err());
    }
}
