use card_forge::app::commands::{self, GenerateRequest};
use card_forge::config::{Cli, Command};
use card_forge::core::deck::DeckStage;
use card_forge::core::printer::Printer;
use card_forge::domain::model::RunLog;
use card_forge::utils::error::{DeckError, ErrorSeverity};
use card_forge::utils::{logger, validation::Validate};
use card_forge::DeckConfig;
use clap::Parser;

fn print_summary(log: &RunLog) {
    let summary = log.summary();
    println!(
        "✅ {} cards: {} downloaded, {} failed, {} pending, {} skipped, {} dry run",
        summary.total,
        summary.downloaded,
        summary.failed,
        summary.pending,
        summary.skipped,
        summary.dry_run
    );
    for record in log.results.iter().filter(|r| r.error.is_some()) {
        println!(
            "   ❌ {} ({}): {}",
            record.id,
            record.status,
            record.error.as_deref().unwrap_or_default()
        );
    }
}

async fn run(cli: Cli, config: DeckConfig) -> Result<(), DeckError> {
    match cli.command {
        Command::Generate {
            cards,
            dry_run,
            force,
            log,
            ..
        } => {
            let request = GenerateRequest {
                cards,
                dry_run,
                force,
                log,
            };
            let (log, path) = commands::generate(&config, &request).await?;
            print_summary(&log);
            println!("📋 Run log: {}", path.display());
        }
        Command::Status { log, .. } => {
            let (log, path) = commands::status(&config, log.as_deref()).await?;
            print_summary(&log);
            println!("📋 Status log: {}", path.display());
        }
        Command::Probe { save } => {
            let report = commands::probe(&config, save.as_deref()).await?;
            for attempt in report.attempts.iter().chain(&report.models) {
                let outcome = match (attempt.status, &attempt.error) {
                    (Some(status), _) => status.to_string(),
                    (None, Some(error)) => format!("error: {}", error),
                    (None, None) => "-".to_string(),
                };
                println!("{:4} {} -> {}", attempt.method, attempt.url, outcome);
                if !attempt.body_preview.is_empty() {
                    println!("     {}", attempt.body_preview);
                }
            }
            match &report.found {
                Some(url) => println!("✅ Working endpoint: {}", url),
                None => println!("❌ No endpoint answered with 2xx"),
            }
        }
        Command::Compare { prompt, .. } => {
            let (comparison, path) = commands::compare(&config, prompt.as_deref()).await?;
            for result in &comparison.results {
                match (&result.path, &result.error) {
                    (Some(file), _) => println!("✓ {}: {}", result.model, file),
                    (None, Some(error)) => println!("✗ {} ({}): {}", result.model, result.status, error),
                    (None, None) => println!("✗ {}: {}", result.model, result.status),
                }
            }
            println!(
                "📋 {}/{} models returned an image, results: {}",
                comparison.downloaded(),
                comparison.results.len(),
                path.display()
            );
        }
        Command::Prompts { out, .. } => {
            let catalog = commands::load_catalog(&config)?;
            let path = commands::export_prompts(&config, &catalog, &catalog.cards, out.as_deref()).await?;
            println!("📝 Prompts: {}", path.display());
        }
        Command::Deck {
            artwork_only,
            assemble_only,
            force,
            ..
        } => {
            let stage = DeckStage::from_flags(artwork_only, assemble_only);
            let report =
                commands::deck(&config, commands::chrome_renderer(&config), stage, force).await?;
            if let Some(log) = &report.run_log {
                print_summary(log);
            }
            if let Some(assembled) = &report.assembled {
                println!(
                    "🃏 {} files rendered into {}, {} cards without artwork",
                    assembled.rendered.len(),
                    config.paths.output_dir,
                    assembled.skipped.len()
                );
            }
        }
        Command::Sheet { sides, .. } => {
            let output = commands::sheet(&config, commands::chrome_renderer(&config), sides).await?;
            println!("📄 {} ({} sheets)", output.pdf.display(), output.pages);
            println!("   HTML: {}", output.html.display());
        }
        Command::Svg { .. } => {
            let files = commands::svg(&config).await?;
            println!("🖼️  {} SVG cards in {}/svg", files.len(), config.paths.output_dir);
        }
        Command::Bundle { .. } => {
            let path = commands::bundle(&config, commands::chrome_renderer(&config)).await?;
            println!("📦 {}", path.display());
        }
        Command::Print {
            sides,
            print,
            printer,
            ..
        } => {
            let printer = print.then(|| Printer::new("lp", printer));
            let (pdfs, sent) =
                commands::print(&config, commands::chrome_renderer(&config), sides, printer).await?;
            for pdf in &pdfs {
                println!("✓ Generated: {}", pdf.display());
            }
            if print {
                println!("🖨️  {}/{} sent to printer", sent, pdfs.len());
            } else {
                println!("To print, run again with --print");
            }
        }
        Command::Specs { .. } => {
            for line in commands::specs(&config)? {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting card-forge");

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };
    if cli.verbose {
        tracing::debug!("Config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        exit_with(&e);
    }

    if let Err(e) = run(cli, config).await {
        exit_with(&e);
    }
}

fn exit_with(e: &DeckError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ card-forge failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    // 輸出用戶友好的錯誤信息
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0, // 警告，但成功
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
