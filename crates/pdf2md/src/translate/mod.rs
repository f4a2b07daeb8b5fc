pub mod config;
pub mod prompt;
pub mod service;

use std::path::{Path, PathBuf};

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2md_core::ElementKey;
use prettytable::row;

use self::config::{Overrides, TranslatorConfig};
use self::prompt::PromptManager;
use self::service::{translate_all, OllamaCompleter, TranslationReport};
use crate::prelude::{eprintln, println, *};

#[derive(Debug, Clone, clap::Args)]
pub struct TranslateArgs {
    /// Translate only the chains behind these keys (repeatable)
    #[arg(long = "key")]
    pub keys: Vec<ElementKey>,

    /// Requests in flight at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Model used for translation
    #[arg(long)]
    pub model: Option<String>,

    /// Ollama server URL
    #[arg(long)]
    pub ollama_url: Option<String>,

    /// Target language
    #[arg(long)]
    pub language: Option<String>,

    /// Directory holding prompt templates (<name>.txt)
    #[arg(long)]
    pub prompt_dir: Option<PathBuf>,

    /// Extra attempts for rate-limited or timed out requests
    #[arg(long)]
    pub retries: Option<usize>,
}

impl TranslateArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            ollama_url: self.ollama_url.clone(),
            model: self.model.clone(),
            language: self.language.clone(),
            prompt_dir: self.prompt_dir.clone(),
            concurrency: self.concurrency,
            retries: self.retries,
        }
    }
}

fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| eyre!("Invalid progress template: {}", e))?
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

/// Translate pending chains of `source` and save the results.
pub async fn run(source: &Path, args: TranslateArgs, global: crate::Global) -> Result<()> {
    let mut session = global.open(source, false)?;
    let chains = session.chains();

    let keys = if args.keys.is_empty() {
        session.document.pending_translations(&chains)
    } else {
        args.keys.clone()
    };

    if keys.is_empty() {
        println!("{}", "Nothing to translate".yellow());
        return Ok(());
    }

    let config = TranslatorConfig::from_env().with_overrides(args.overrides());
    if global.verbose {
        eprintln!(
            "{} {} via {} ({} workers, {} retries)",
            "Translating to".green(),
            config.language,
            config.model,
            config.concurrency,
            config.retries
        );
    }

    let mut prompts = PromptManager::new(config.prompt_dir.clone());
    let completer = OllamaCompleter::new(&config.ollama_url, &config.model)?;

    let pb = progress_bar()?;
    let report = translate_all(
        &mut session.document,
        &keys,
        &completer,
        &mut prompts,
        &config,
        Some(&pb),
    )
    .await;
    pb.finish_and_clear();
    let report = report?;

    if !report.applied.is_empty() {
        let path = session.save()?;
        if global.verbose {
            eprintln!("{} {}", "Snapshot:".green(), path.display());
        }
    }

    print_report(&report);
    Ok(())
}

pub fn print_report(report: &TranslationReport) {
    println!(
        "{} {}  {} {}  {} {}  {} {}",
        "applied:".green().bold(),
        report.applied.len(),
        "failed:".red().bold(),
        report.failed.len(),
        "stale:".yellow().bold(),
        report.stale.len(),
        "skipped:".dimmed(),
        report.skipped.len()
    );

    if report.failed.is_empty() {
        return;
    }

    let mut table = new_table();
    table.add_row(row![b => "KEY", "STATUS", "REASON"]);
    for (key, status, reason) in &report.failed {
        table.add_row(row![key.to_string().cyan(), status.to_string().red(), reason]);
    }
    table.printstd();
}
