use crate::core::html::{self, DeckBranding, SheetSides, Units};
use crate::core::layout::{paginate, PrintSpec, SheetLayout};
use crate::core::runner::JobRunner;
use crate::core::svg;
use crate::core::{Card, CardCatalog, Renderer, RunLog, SheetItem, Storage};
use crate::utils::error::{DeckError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::{FileOptions, ZipWriter};

pub const BACK_FILE: &str = "card-back.png";
pub const MANIFEST_FILE: &str = "manifest.csv";
const HTML_DIR: &str = "html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeckStage {
    #[default]
    All,
    ArtworkOnly,
    AssembleOnly,
}

impl DeckStage {
    pub fn from_flags(artwork_only: bool, assemble_only: bool) -> Self {
        match (artwork_only, assemble_only) {
            (true, _) => DeckStage::ArtworkOnly,
            (_, true) => DeckStage::AssembleOnly,
            _ => DeckStage::All,
        }
    }

    pub fn generates_artwork(self) -> bool {
        matches!(self, DeckStage::All | DeckStage::ArtworkOnly)
    }

    pub fn assembles(self) -> bool {
        matches!(self, DeckStage::All | DeckStage::AssembleOnly)
    }
}

#[derive(Debug, Default, Clone)]
pub struct AssembleReport {
    pub rendered: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Default)]
pub struct DeckReport {
    pub run_log: Option<RunLog>,
    pub assembled: Option<AssembleReport>,
}

#[derive(Debug, Clone)]
pub struct SheetOutput {
    pub html: PathBuf,
    pub pdf: PathBuf,
    pub pages: usize,
}

#[derive(Debug, Serialize)]
struct ManifestRow<'a> {
    id: &'a str,
    name: &'a str,
    category: &'a str,
    front_file: String,
}

/// Turns a catalog plus downloaded artwork into print files.
pub struct DeckBuilder<S: Storage, R: Renderer> {
    catalog: CardCatalog,
    artwork: S,
    output: S,
    renderer: R,
    card_spec: PrintSpec,
    layout: SheetLayout,
    sheet_name: String,
}

impl<S: Storage, R: Renderer> DeckBuilder<S, R> {
    pub fn new(
        catalog: CardCatalog,
        artwork: S,
        output: S,
        renderer: R,
        card_spec: PrintSpec,
        layout: SheetLayout,
        sheet_name: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            artwork,
            output,
            renderer,
            card_spec,
            layout,
            sheet_name: sheet_name.into(),
        }
    }

    fn branding(&self) -> DeckBranding {
        DeckBranding {
            title: self.catalog.title.clone(),
            subtitle: self.catalog.subtitle.clone(),
        }
    }

    fn artwork_src(&self, card: &Card) -> String {
        file_url(&self.artwork.resolve(&card.artwork_file()))
    }

    pub async fn build<A: Storage>(&self, stage: DeckStage, runner: Option<&JobRunner<A>>) -> Result<DeckReport> {
        let mut report = DeckReport::default();

        if stage.generates_artwork() {
            let runner = runner.ok_or_else(|| DeckError::MissingConfigError {
                field: "vendor.api_key".to_string(),
            })?;
            tracing::info!("🎨 Generating artwork");
            report.run_log = Some(runner.run(&self.catalog.cards).await?);
        }

        if stage.assembles() {
            tracing::info!("🃏 Assembling print files");
            report.assembled = Some(self.assemble().await?);
        }

        Ok(report)
    }

    /// Renders one PNG per card front plus the shared back at print size.
    pub async fn assemble(&self) -> Result<AssembleReport> {
        let mut report = AssembleReport::default();
        let units = Units::Px {
            dpi: self.card_spec.dpi,
        };
        let branding = self.branding();

        for item in self.catalog.sheet_items() {
            let (fragment, front_file) = match &item {
                SheetItem::Vision(card) => {
                    if !self.artwork.exists(&card.artwork_file()).await {
                        tracing::warn!(card = %card.id, "⚠️  No artwork, skipping");
                        report.skipped.push(card.id.clone());
                        continue;
                    }
                    (
                        html::card_front(card, &self.artwork_src(card), &self.card_spec, units),
                        card.front_file(),
                    )
                }
                SheetItem::Prompt(card) => (
                    html::prompt_card(card, &self.card_spec, units, &branding),
                    card.front_file(),
                ),
            };

            self.render_card(item.id(), &fragment, &front_file).await?;
            report.rendered.push(front_file);
        }

        let back = html::card_back(&self.card_spec, units, &branding);
        self.render_card("card-back", &back, BACK_FILE).await?;
        report.rendered.push(BACK_FILE.to_string());

        tracing::info!(
            rendered = report.rendered.len(),
            skipped = report.skipped.len(),
            "✓ Assembly finished"
        );
        Ok(report)
    }

    async fn render_card(&self, name: &str, fragment: &str, png_file: &str) -> Result<()> {
        let page = html::standalone_page(fragment, &self.card_spec, name);
        let html_file = format!("{}/{}.html", HTML_DIR, name);
        self.output.write_file(&html_file, page.as_bytes()).await?;

        self.renderer
            .screenshot(
                &self.output.resolve(&html_file),
                &self.output.resolve(png_file),
                self.card_spec.total_width_px(),
                self.card_spec.total_height_px(),
            )
            .await?;

        tracing::info!("  ✓ {}", png_file);
        Ok(())
    }

    /// Writes one print-size SVG per vision card, grouped by category.
    /// Needs no artwork and no renderer.
    pub async fn svg(&self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.catalog.cards.len());

        for card in &self.catalog.cards {
            let file = svg::svg_file(card);
            let document = svg::svg_card(card, &self.card_spec, &self.catalog.title);
            self.output.write_file(&file, document.as_bytes()).await?;
            tracing::debug!(card = %card.id, %file, "SVG written");
            written.push(self.output.resolve(&file));
        }

        tracing::info!(cards = written.len(), "✓ SVG cards written");
        Ok(written)
    }

    /// Writes the Letter sheet HTML and renders it to PDF.
    pub async fn sheet(&self, sides: SheetSides) -> Result<SheetOutput> {
        let items = self.catalog.sheet_items();
        for item in &items {
            if let SheetItem::Vision(card) = item {
                if !self.artwork.exists(&card.artwork_file()).await {
                    tracing::warn!(card = %card.id, "⚠️  Sheet references missing artwork");
                }
            }
        }

        let filler = self.catalog.filler();
        let pages = paginate(&items, self.layout.cards_per_page(), filler.as_ref());
        let counts = html::SheetCounts::from_items(&items);
        let document = html::print_sheet(&pages, counts, &self.layout, &self.branding(), sides, |card| {
            self.artwork_src(card)
        });

        let base = format!("{}{}", self.sheet_name, sides.suffix());
        let html_file = format!("{}.html", base);
        let pdf_file = format!("{}.pdf", base);
        self.output.write_file(&html_file, document.as_bytes()).await?;

        let html_path = self.output.resolve(&html_file);
        let pdf_path = self.output.resolve(&pdf_file);
        self.renderer.pdf(&html_path, &pdf_path).await?;

        tracing::info!(pdf = %pdf_path.display(), pages = pages.len(), "✓ Print sheet ready");
        Ok(SheetOutput {
            html: html_path,
            pdf: pdf_path,
            pages: pages.len(),
        })
    }

    /// PDFs for the `print` command: one per requested side.
    pub async fn print_files(&self, sides: SheetSides) -> Result<Vec<PathBuf>> {
        let wanted = match sides {
            SheetSides::Both => vec![SheetSides::Fronts, SheetSides::Backs],
            one => vec![one],
        };

        let mut pdfs = Vec::with_capacity(wanted.len());
        for side in wanted {
            pdfs.push(self.sheet(side).await?.pdf);
        }
        Ok(pdfs)
    }

    /// Zips the rendered PNGs with a manifest for upload to a print shop.
    pub async fn bundle(&self) -> Result<PathBuf> {
        let mut manifest = csv::Writer::from_writer(Vec::new());
        let mut files: Vec<(String, Vec<u8>)> = Vec::new();

        for item in self.catalog.sheet_items() {
            let (id, name, category, front_file) = match &item {
                SheetItem::Vision(card) => (
                    card.id.as_str(),
                    card.name.as_str(),
                    card.category.as_str(),
                    card.front_file(),
                ),
                SheetItem::Prompt(card) => (
                    card.id.as_str(),
                    card.title.as_str(),
                    "Prompt",
                    card.front_file(),
                ),
            };

            if !self.output.exists(&front_file).await {
                tracing::warn!(card = id, "Not rendered yet, left out of bundle");
                continue;
            }

            files.push((front_file.clone(), self.output.read_file(&front_file).await?));
            manifest.serialize(ManifestRow {
                id,
                name,
                category,
                front_file,
            })?;
        }

        if files.is_empty() {
            return Err(DeckError::render(
                "nothing to bundle; run `card-forge deck --assemble-only` first",
            ));
        }

        if self.output.exists(BACK_FILE).await {
            files.push((BACK_FILE.to_string(), self.output.read_file(BACK_FILE).await?));
        }

        let manifest = manifest
            .into_inner()
            .map_err(|e| DeckError::IoError(e.into_error()))?;

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

            zip.start_file::<_, ()>(MANIFEST_FILE, FileOptions::default())?;
            zip.write_all(&manifest)?;

            for (name, data) in &files {
                zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
                zip.write_all(data)?;
            }

            zip.finish()?.into_inner()
        };

        let bundle_file = format!("{}-bundle.zip", self.sheet_name);
        tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
        self.output.write_file(&bundle_file, &zip_data).await?;

        let path = self.output.resolve(&bundle_file);
        tracing::info!(bundle = %path.display(), files = files.len() + 1, "📦 Bundle ready");
        Ok(path)
    }
}

pub fn file_url(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    url::Url::from_file_path(&absolute)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("file://{}", absolute.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_flags() {
        assert_eq!(DeckStage::from_flags(false, false), DeckStage::All);
        assert_eq!(DeckStage::from_flags(true, false), DeckStage::ArtworkOnly);
        assert_eq!(DeckStage::from_flags(false, true), DeckStage::AssembleOnly);
        assert!(!DeckStage::AssembleOnly.generates_artwork());
        assert!(!DeckStage::ArtworkOnly.assembles());
    }

    #[test]
    fn test_file_url() {
        assert_eq!(file_url(Path::new("/art/a b.png")), "file:///art/a%20b.png");
    }
}
