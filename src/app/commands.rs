use crate::adapters::http::build_client;
use crate::adapters::{build_vendor, ChromeRenderer, LocalStorage};
use crate::config::toml_config::{DeckConfig, VendorConfig};
use crate::core::compare::{compare_models, ModelComparison, RESULTS_FILE};
use crate::core::deck::{DeckBuilder, DeckReport, DeckStage, SheetOutput};
use crate::core::html::SheetSides;
use crate::core::printer::Printer;
use crate::core::probe::{EndpointProbe, ProbeReport, SAMPLE_PROMPT};
use crate::core::prompts::PromptBuilder;
use crate::core::runner::{unfinished, JobRunner, RunOptions};
use crate::core::{Card, CardCatalog, ConfigProvider, Renderer, RunLog, Storage};
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

pub const STATUS_LOG_FILE: &str = "task-status.json";
pub const PROMPTS_FILE: &str = "prompts.json";
pub const COMPARE_DIR: &str = "test-models";

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// 空白代表整副牌
    pub cards: Vec<String>,
    pub dry_run: bool,
    pub force: bool,
    pub log: Option<String>,
}

/// Splits a file path into a storage rooted at its directory plus the file name.
fn storage_for(path: &str) -> (LocalStorage, String) {
    let path = Path::new(path);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    (LocalStorage::new(dir), name)
}

pub fn default_run_log(config: &DeckConfig) -> String {
    Path::new(config.log_dir())
        .join(format!("{}-results.json", config.vendor.model()))
        .display()
        .to_string()
}

pub fn load_catalog(config: &DeckConfig) -> Result<CardCatalog> {
    let catalog = CardCatalog::from_file(config.catalog_path())?;
    tracing::info!(
        path = config.catalog_path(),
        cards = catalog.cards.len(),
        prompt_cards = catalog.prompt_cards.len(),
        "📚 Catalog loaded"
    );
    Ok(catalog)
}

pub async fn save_run_log(path: &str, log: &RunLog) -> Result<PathBuf> {
    let (storage, file) = storage_for(path);
    storage.write_file(&file, &log.to_json_vec()?).await?;
    Ok(storage.resolve(&file))
}

pub fn job_runner(config: &DeckConfig, catalog: &CardCatalog, options: RunOptions) -> Result<JobRunner<LocalStorage>> {
    // 乾跑不需要金鑰
    let api_key = if options.dry_run {
        config.vendor.api_key().unwrap_or_default()
    } else {
        config.vendor.require_api_key()?
    };

    let client = build_client(config.request_timeout())?;
    let vendor = build_vendor(&config.vendor, client.clone(), api_key)?;

    Ok(JobRunner::new(
        vendor,
        LocalStorage::new(config.artwork_dir()),
        client,
        PromptBuilder::new(catalog, config.catalog.style_preset),
        config.pacing(),
        options,
    ))
}

/// Writes the full prompts of `cards` (styled by the catalog) as JSON.
pub async fn export_prompts(
    config: &DeckConfig,
    catalog: &CardCatalog,
    cards: &[Card],
    out: Option<&str>,
) -> Result<PathBuf> {
    let path = out.map(str::to_string).unwrap_or_else(|| {
        Path::new(config.log_dir())
            .join(PROMPTS_FILE)
            .display()
            .to_string()
    });

    let export = PromptBuilder::new(catalog, config.catalog.style_preset).export(cards);
    let (storage, file) = storage_for(&path);
    storage
        .write_file(&file, &serde_json::to_vec_pretty(&export)?)
        .await?;

    let written = storage.resolve(&file);
    tracing::info!(path = %written.display(), cards = export.cards.len(), "📝 Prompts exported");
    Ok(written)
}

/// `generate`: submit, poll, download and write the run log.
pub async fn generate(config: &DeckConfig, request: &GenerateRequest) -> Result<(RunLog, PathBuf)> {
    let catalog = load_catalog(config)?;
    let cards = catalog.select(&request.cards)?;

    let options = RunOptions {
        skip_existing: !request.force,
        dry_run: request.dry_run,
    };
    let runner = job_runner(config, &catalog, options)?;
    let log = runner.run(&cards).await?;

    if request.dry_run {
        export_prompts(config, &catalog, &cards, None).await?;
    }

    let log_path = request.log.clone().unwrap_or_else(|| default_run_log(config));
    let written = save_run_log(&log_path, &log).await?;
    tracing::info!(path = %written.display(), "📋 Run log saved");
    Ok((log, written))
}

/// `status`: re-check unfinished tasks from an earlier run log.
pub async fn status(config: &DeckConfig, log: Option<&str>) -> Result<(RunLog, PathBuf)> {
    let log_path = log.map(str::to_string).unwrap_or_else(|| default_run_log(config));
    let (storage, file) = storage_for(&log_path);
    let previous = RunLog::from_json_slice(&storage.read_file(&file).await?)?;

    let open = unfinished(&previous).len();
    tracing::info!(path = %log_path, open, total = previous.results.len(), "🔎 Re-checking tasks");

    let catalog = load_catalog(config)?;
    let runner = job_runner(config, &catalog, RunOptions::default())?;
    if previous.vendor != runner.vendor().name() {
        tracing::warn!(
            log_vendor = %previous.vendor,
            configured = runner.vendor().name(),
            "Run log came from a different vendor"
        );
    }

    let updated = runner.recheck(previous).await;
    let status_path = Path::new(config.log_dir()).join(STATUS_LOG_FILE);
    let written = save_run_log(&status_path.display().to_string(), &updated).await?;
    Ok((updated, written))
}

pub async fn probe(config: &DeckConfig, save: Option<&str>) -> Result<ProbeReport> {
    let client = build_client(config.request_timeout())?;
    let report = EndpointProbe::new(client, config.vendor.api_key())
        .run(&config.probe, SAMPLE_PROMPT)
        .await;

    if let Some(path) = save {
        let (storage, file) = storage_for(path);
        storage
            .write_file(&file, &serde_json::to_vec_pretty(&report)?)
            .await?;
    }
    Ok(report)
}

/// `compare`: sends one prompt to every model of the configured vendor and
/// writes the images plus `results.json` under `<log_dir>/test-models`.
pub async fn compare(config: &DeckConfig, prompt: Option<&str>) -> Result<(ModelComparison, PathBuf)> {
    let api_key = config.vendor.require_api_key()?;
    let client = build_client(config.request_timeout())?;
    let out_dir = Path::new(config.log_dir()).join(COMPARE_DIR);
    let prompts = PromptBuilder::unstyled();

    let mut runs = Vec::new();
    for model in config.vendor.kind.models() {
        let vendor_config = VendorConfig {
            model: Some(model.to_string()),
            ..config.vendor.clone()
        };
        let vendor = build_vendor(&vendor_config, client.clone(), api_key.clone())?;
        runs.push((
            model.to_string(),
            JobRunner::new(
                vendor,
                LocalStorage::new(out_dir.clone()),
                client.clone(),
                prompts.clone(),
                config.pacing(),
                RunOptions::default(),
            ),
        ));
    }

    let vendor_name = runs
        .first()
        .map(|(_, runner)| runner.vendor().name().to_string())
        .unwrap_or_default();
    let prompt = prompt.unwrap_or(SAMPLE_PROMPT);
    tracing::info!(vendor = %vendor_name, models = runs.len(), "🔬 Comparing models");

    let comparison = compare_models(&vendor_name, &runs, prompt).await;

    let storage = LocalStorage::new(out_dir);
    storage
        .write_file(RESULTS_FILE, &serde_json::to_vec_pretty(&comparison)?)
        .await?;
    let written = storage.resolve(RESULTS_FILE);
    tracing::info!(
        path = %written.display(),
        downloaded = comparison.downloaded(),
        "📋 Comparison saved"
    );
    Ok((comparison, written))
}

/// `svg`: vector card faces, no browser needed.
pub async fn svg(config: &DeckConfig) -> Result<Vec<PathBuf>> {
    deck_builder(config, chrome_renderer(config))?.svg().await
}

pub fn chrome_renderer(config: &DeckConfig) -> ChromeRenderer {
    ChromeRenderer::new(
        config.render.chrome_path(),
        std::time::Duration::from_secs(config.render.timeout_secs),
        config.render.virtual_time_budget_ms,
    )
}

pub fn deck_builder<R: Renderer>(config: &DeckConfig, renderer: R) -> Result<DeckBuilder<LocalStorage, R>> {
    Ok(DeckBuilder::new(
        load_catalog(config)?,
        LocalStorage::new(config.artwork_dir()),
        LocalStorage::new(config.output_dir()),
        renderer,
        config.card_spec(),
        config.sheet_layout()?,
        config.print.sheet_name.clone(),
    ))
}

/// `deck`: artwork generation and/or assembly of print-size PNGs.
pub async fn deck<R: Renderer>(config: &DeckConfig, renderer: R, stage: DeckStage, force: bool) -> Result<DeckReport> {
    let builder = deck_builder(config, renderer)?;

    let runner = if stage.generates_artwork() {
        let catalog = load_catalog(config)?;
        Some(job_runner(
            config,
            &catalog,
            RunOptions {
                skip_existing: !force,
                dry_run: false,
            },
        )?)
    } else {
        None
    };

    let report = builder.build(stage, runner.as_ref()).await?;
    if let Some(log) = &report.run_log {
        let written = save_run_log(&default_run_log(config), log).await?;
        tracing::info!(path = %written.display(), "📋 Run log saved");
    }
    Ok(report)
}

pub async fn sheet<R: Renderer>(config: &DeckConfig, renderer: R, sides: SheetSides) -> Result<SheetOutput> {
    deck_builder(config, renderer)?.sheet(sides).await
}

pub async fn bundle<R: Renderer>(config: &DeckConfig, renderer: R) -> Result<PathBuf> {
    deck_builder(config, renderer)?.bundle().await
}

/// `print`: renders fronts/backs PDFs and optionally sends them to `lp`.
/// Returns the PDFs and how many reached the printer.
pub async fn print<R: Renderer>(
    config: &DeckConfig,
    renderer: R,
    sides: SheetSides,
    printer: Option<Printer>,
) -> Result<(Vec<PathBuf>, usize)> {
    let pdfs = deck_builder(config, renderer)?.print_files(sides).await?;

    let sent = match printer {
        Some(printer) => printer
            .print_all(&pdfs)
            .await
            .iter()
            .filter(|(_, outcome)| outcome.is_ok())
            .count(),
        None => 0,
    };
    Ok((pdfs, sent))
}

pub fn specs(config: &DeckConfig) -> Result<Vec<String>> {
    let mut lines = vec![format!("Card preset: {:?}", config.print.preset)];
    lines.extend(config.card_spec().describe());

    let layout = config.sheet_layout()?;
    lines.push(format!(
        "Home sheet: {} per Letter page, {:.3}\" bleed, {:.2}\" gap, {} cut marks",
        layout.cards_per_page(),
        layout.spec.bleed_in,
        layout.gap_in,
        if layout.spec.has_bleed() {
            layout.cut_marks().len()
        } else {
            0
        }
    ));
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_for_splits_path() {
        let (storage, file) = storage_for("assets/logs/run.json");
        assert_eq!(file, "run.json");
        assert_eq!(storage.resolve(&file), Path::new("assets/logs/run.json"));

        let (storage, file) = storage_for("run.json");
        assert_eq!(storage.resolve(&file), Path::new("./run.json"));
    }

    #[test]
    fn test_default_run_log_uses_model() {
        let config = DeckConfig::from_toml_str("[vendor]\nkind = \"replicate\"\n").unwrap();
        assert_eq!(default_run_log(&config), "assets/flux-results.json");
    }

    #[test]
    fn test_specs_lines() {
        let config = DeckConfig::default();
        let lines = specs(&config).unwrap();
        assert!(lines.iter().any(|l| l.contains("825")));
        assert!(lines.last().unwrap().contains("9 per Letter page"));
    }
}
