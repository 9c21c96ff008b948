use crate::config::toml_config::{DeckConfig, VendorKind};
use crate::core::html::SheetSides;
use crate::core::layout::PrintPreset;
use crate::core::prompts::StylePreset;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "card-forge")]
#[command(version, about = "Generate card artwork with image vendors and build print-ready decks")]
pub struct Cli {
    /// Path to TOML configuration file (defaults to ./deck.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Default, Args)]
pub struct CatalogArgs {
    /// Card catalog JSON
    #[arg(long)]
    pub catalog: Option<String>,

    /// Directory holding `<id>.png` artwork
    #[arg(long)]
    pub artwork_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct VendorArgs {
    #[arg(long, value_enum)]
    pub vendor: Option<VendorKind>,

    /// Vendor model (midjourney, nano-banana, wan, flux)
    #[arg(long)]
    pub model: Option<String>,

    /// Style preset used when the catalog has no `style`
    #[arg(long, value_enum)]
    pub style: Option<StylePreset>,

    /// Seconds between submissions
    #[arg(long)]
    pub submit_delay: Option<u64>,

    /// Seconds between poll rounds
    #[arg(long)]
    pub poll_interval: Option<u64>,

    #[arg(long)]
    pub max_polls: Option<u32>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct PrintArgs {
    #[arg(long, value_enum)]
    pub preset: Option<PrintPreset>,

    /// Bleed in inches for individual card files
    #[arg(long)]
    pub bleed: Option<f64>,

    #[arg(long)]
    pub dpi: Option<u32>,

    #[arg(long)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit card prompts to the image vendor and download the results
    Generate {
        #[command(flatten)]
        catalog: CatalogArgs,
        #[command(flatten)]
        vendor: VendorArgs,
        /// Only these card ids (comma separated)
        #[arg(long, value_delimiter = ',')]
        cards: Vec<String>,
        /// Build prompts without contacting the vendor
        #[arg(long)]
        dry_run: bool,
        /// Regenerate cards whose artwork already exists
        #[arg(long)]
        force: bool,
        /// Where to write the run log
        #[arg(long)]
        log: Option<String>,
    },
    /// Re-check unfinished tasks from a run log and download finished images
    Status {
        #[command(flatten)]
        vendor: VendorArgs,
        #[arg(long)]
        log: Option<String>,
    },
    /// Try candidate vendor endpoints and report which one answers
    Probe {
        /// Save the report as JSON
        #[arg(long)]
        save: Option<String>,
    },
    /// Send one prompt to every model of the vendor and save the images side by side
    Compare {
        #[command(flatten)]
        vendor: VendorArgs,
        /// Prompt to send (defaults to a sample tarot card)
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Export full prompts for manual use
    Prompts {
        #[command(flatten)]
        catalog: CatalogArgs,
        #[arg(long, value_enum)]
        style: Option<StylePreset>,
        #[arg(short, long)]
        out: Option<String>,
    },
    /// Generate artwork and assemble print-size card images
    Deck {
        #[command(flatten)]
        catalog: CatalogArgs,
        #[command(flatten)]
        vendor: VendorArgs,
        #[command(flatten)]
        print: PrintArgs,
        #[arg(long, conflicts_with = "assemble_only")]
        artwork_only: bool,
        #[arg(long)]
        assemble_only: bool,
        #[arg(long)]
        force: bool,
    },
    /// Build the Letter print sheet (HTML + PDF)
    Sheet {
        #[command(flatten)]
        catalog: CatalogArgs,
        #[command(flatten)]
        print: PrintArgs,
        #[arg(long, value_enum, default_value = "both")]
        sides: SheetSides,
    },
    /// Write vector card faces with bleed, one folder per category
    Svg {
        #[command(flatten)]
        catalog: CatalogArgs,
        #[command(flatten)]
        print: PrintArgs,
    },
    /// Zip rendered cards with a manifest for a print shop
    Bundle {
        #[command(flatten)]
        catalog: CatalogArgs,
        #[command(flatten)]
        print: PrintArgs,
    },
    /// Render fronts/backs PDFs and optionally send them to the printer
    Print {
        #[arg(value_enum, default_value = "both")]
        sides: SheetSides,
        /// Send the PDFs to `lp`
        #[arg(long)]
        print: bool,
        /// lp destination (-d)
        #[arg(long)]
        printer: Option<String>,
        #[command(flatten)]
        catalog: CatalogArgs,
        #[command(flatten)]
        layout: PrintArgs,
    },
    /// Show card and sheet print specifications
    Specs {
        #[command(flatten)]
        print: PrintArgs,
    },
}

impl CatalogArgs {
    pub fn apply(&self, config: &mut DeckConfig) {
        if let Some(path) = &self.catalog {
            config.catalog.path = path.clone();
        }
        if let Some(dir) = &self.artwork_dir {
            config.paths.artwork_dir = dir.clone();
        }
    }
}

impl VendorArgs {
    pub fn apply(&self, config: &mut DeckConfig) {
        if let Some(kind) = self.vendor {
            if kind != config.vendor.kind {
                // 換 vendor 時沿用設定檔的 model/base_url 沒有意義
                config.vendor.model = None;
                config.vendor.base_url = None;
                config.vendor.api_key = None;
            }
            config.vendor.kind = kind;
        }
        if let Some(model) = &self.model {
            config.vendor.model = Some(model.clone());
        }
        if let Some(style) = self.style {
            config.catalog.style_preset = Some(style);
        }
        if let Some(delay) = self.submit_delay {
            config.pacing.submit_delay_secs = Some(delay);
        }
        if let Some(interval) = self.poll_interval {
            config.pacing.poll_interval_secs = Some(interval);
        }
        if let Some(max_polls) = self.max_polls {
            config.pacing.max_polls = max_polls;
        }
    }
}

impl PrintArgs {
    pub fn apply(&self, config: &mut DeckConfig) {
        if let Some(preset) = self.preset {
            config.print.preset = preset;
        }
        if let Some(bleed) = self.bleed {
            config.print.bleed_in = Some(bleed);
        }
        if let Some(dpi) = self.dpi {
            config.print.dpi = Some(dpi);
        }
        if let Some(dir) = &self.output_dir {
            config.paths.output_dir = dir.clone();
        }
    }
}

impl Cli {
    /// Loads deck.toml (if any) and applies command-line overrides.
    pub fn resolve_config(&self) -> crate::utils::error::Result<DeckConfig> {
        let mut config = DeckConfig::load(self.config.as_deref())?;

        match &self.command {
            Command::Generate { catalog, vendor, .. } => {
                catalog.apply(&mut config);
                vendor.apply(&mut config);
            }
            Command::Status { vendor, .. } | Command::Compare { vendor, .. } => {
                vendor.apply(&mut config)
            }
            Command::Probe { .. } => {}
            Command::Prompts { catalog, style, .. } => {
                catalog.apply(&mut config);
                if let Some(style) = style {
                    config.catalog.style_preset = Some(*style);
                }
            }
            Command::Deck {
                catalog,
                vendor,
                print,
                ..
            } => {
                catalog.apply(&mut config);
                vendor.apply(&mut config);
                print.apply(&mut config);
            }
            Command::Sheet { catalog, print, .. }
            | Command::Bundle { catalog, print }
            | Command::Svg { catalog, print } => {
                catalog.apply(&mut config);
                print.apply(&mut config);
            }
            Command::Print {
                catalog, layout, ..
            } => {
                catalog.apply(&mut config);
                layout.apply(&mut config);
            }
            Command::Specs { print } => print.apply(&mut config),
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_overrides() {
        let cli = Cli::parse_from([
            "card-forge",
            "--config",
            "/definitely/missing.toml",
            "generate",
            "--vendor",
            "replicate",
            "--model",
            "nano-banana",
            "--cards",
            "well-01,arc-01",
            "--dry-run",
        ]);

        match &cli.command {
            Command::Generate { cards, dry_run, .. } => {
                assert_eq!(cards, &vec!["well-01".to_string(), "arc-01".to_string()]);
                assert!(dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let mut config = DeckConfig::default();
        if let Command::Generate { vendor, .. } = &cli.command {
            vendor.apply(&mut config);
        }
        assert_eq!(config.vendor.kind, VendorKind::Replicate);
        assert_eq!(config.vendor.model(), "nano-banana");
    }

    #[test]
    fn test_artwork_only_conflicts_with_assemble_only() {
        let result = Cli::try_parse_from(["card-forge", "deck", "--artwork-only", "--assemble-only"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_print_sides_positional() {
        let cli = Cli::parse_from(["card-forge", "print", "fronts", "--print", "--preset", "mpc-poker"]);
        match cli.command {
            Command::Print {
                sides,
                print,
                layout,
                ..
            } => {
                assert_eq!(sides, SheetSides::Fronts);
                assert!(print);
                assert_eq!(layout.preset, Some(PrintPreset::MpcPoker));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_compare_and_svg_overrides() {
        let cli = Cli::parse_from([
            "card-forge",
            "--config",
            "/definitely/missing.toml",
            "compare",
            "--vendor",
            "replicate",
            "--prompt",
            "a lighthouse",
        ]);
        match &cli.command {
            Command::Compare { vendor, prompt } => {
                assert_eq!(vendor.vendor, Some(VendorKind::Replicate));
                assert_eq!(prompt.as_deref(), Some("a lighthouse"));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::parse_from(["card-forge", "svg", "--preset", "bleedless", "--dpi", "600"]);
        let mut config = DeckConfig::default();
        match &cli.command {
            Command::Svg { print, .. } => print.apply(&mut config),
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(config.card_spec().dpi, 600);
        assert!(!config.card_spec().has_bleed());
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let cli = Cli::parse_from(["card-forge", "--config", "/definitely/missing.toml", "specs"]);
        assert!(cli.resolve_config().is_err());
    }
}
