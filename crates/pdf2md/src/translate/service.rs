//! Concurrent translation of chain heads.
//!
//! Tickets are fanned out to a pool of workers over a bounded channel; the
//! results come back over a second channel and are applied to the document
//! one at a time, so the document is only ever touched from one place.

use std::collections::{HashMap, HashSet};

use indicatif::ProgressBar;
use pdf2md_core::translate::{
    extract_translation, CompletionData, CompletionStatus, TranslationTicket,
};
use pdf2md_core::{Document, ElementKey};
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::ollama;

use super::config::TranslatorConfig;
use super::prompt::{PromptManager, TRANSLATE_PROMPT};
use crate::prelude::*;

const SYSTEM_PREAMBLE: &str = "\
You translate text extracted from PDF documents.

Rules:
- Output the translation only. No markdown fences. No explanations. No commentary.
- Keep line breaks, list markers and numbers as they appear in the source.
- Leave names, code and formulas untranslated.";

/// Something that answers a prompt.
pub(crate) trait Completer {
    async fn complete(&self, prompt: &str) -> CompletionData;
}

/// Completer backed by a local Ollama server.
pub struct OllamaCompleter {
    client: ollama::Client,
    model: String,
}

impl OllamaCompleter {
    pub fn new(ollama_url: &str, model: &str) -> Result<Self> {
        use rig::client::Nothing;

        let client = ollama::Client::builder()
            .api_key(Nothing)
            .base_url(ollama_url)
            .build()
            .map_err(|e| eyre!("Failed to create Ollama client: {}", e))?;

        Ok(OllamaCompleter {
            client,
            model: model.to_string(),
        })
    }
}

impl Completer for OllamaCompleter {
    async fn complete(&self, prompt: &str) -> CompletionData {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(SYSTEM_PREAMBLE)
            .build();

        let prompt = prompt.to_string();
        match agent.prompt(&prompt).await {
            Ok(reply) => CompletionData::ok(reply),
            Err(e) => CompletionData::failed(e.to_string()),
        }
    }
}

/// What happened to each requested element.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TranslationReport {
    pub applied: Vec<ElementKey>,
    /// Results refused because the element changed while in flight.
    pub stale: Vec<ElementKey>,
    pub failed: Vec<(ElementKey, CompletionStatus, String)>,
    /// Requested keys that had nothing to translate.
    pub skipped: Vec<ElementKey>,
}

/// Issue one ticket per distinct chain head among `keys`.
fn tickets(document: &Document, keys: &[ElementKey], report: &mut TranslationReport) -> Vec<TranslationTicket> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for &key in keys {
        match document.begin_translation(key) {
            Some(ticket) => {
                if seen.insert(ticket.key) {
                    out.push(ticket);
                }
            }
            None => {
                log::debug!("nothing to translate for {}", key);
                report.skipped.push(key);
            }
        }
    }

    out
}

async fn complete_with_retry<C: Completer>(completer: &C, prompt: &str, config: &TranslatorConfig) -> CompletionData {
    let mut delay = config.retry_delay;
    let mut attempt = 0;

    loop {
        let data = completer.complete(prompt).await;
        if !data.status.is_retryable() || attempt >= config.retries {
            return data;
        }

        attempt += 1;
        log::warn!(
            "request failed ({}), retry {} of {} in {:?}",
            data.status,
            attempt,
            config.retries,
            delay
        );
        tokio::time::sleep(delay).await;
        delay *= 2;
    }
}

/// Translate the chains behind `keys` and write the results back.
pub(crate) async fn translate_all<C: Completer>(
    document: &mut Document,
    keys: &[ElementKey],
    completer: &C,
    prompts: &mut PromptManager,
    config: &TranslatorConfig,
    progress: Option<&ProgressBar>,
) -> Result<TranslationReport> {
    let mut report = TranslationReport::default();
    let tickets = tickets(document, keys, &mut report);

    let mut jobs = Vec::with_capacity(tickets.len());
    for ticket in tickets {
        let prompt = {
            let replacements = HashMap::from([
                ("language", config.language.as_str()),
                ("text", ticket.text.as_str()),
            ]);
            prompts.generate(TRANSLATE_PROMPT, &replacements)?
        };
        jobs.push((ticket, prompt));
    }

    if let Some(pb) = progress {
        pb.set_length(jobs.len() as u64);
    }
    log::debug!("translating {} chains with {} workers", jobs.len(), config.concurrency);

    let (job_tx, job_rx) = async_channel::bounded::<(TranslationTicket, String)>(config.concurrency.max(1));
    let (result_tx, result_rx) = async_channel::unbounded::<(TranslationTicket, CompletionData)>();

    let producer = async move {
        for job in jobs {
            if job_tx.send(job).await.is_err() {
                break;
            }
        }
    };

    let workers = futures::future::join_all((0..config.concurrency.max(1)).map(|_| {
        let job_rx = job_rx.clone();
        let result_tx = result_tx.clone();
        async move {
            while let Ok((ticket, prompt)) = job_rx.recv().await {
                let data = complete_with_retry(completer, &prompt, config).await;
                if result_tx.send((ticket, data)).await.is_err() {
                    break;
                }
            }
        }
    }));
    drop(job_rx);
    drop(result_tx);

    let collector = async {
        while let Ok((ticket, data)) = result_rx.recv().await {
            apply_result(document, &ticket, data, &mut report);
            if let Some(pb) = progress {
                pb.inc(1);
                pb.set_message(f!("element {}", ticket.key));
            }
        }
    };

    futures::join!(producer, workers, collector);

    Ok(report)
}

fn apply_result(
    document: &mut Document,
    ticket: &TranslationTicket,
    data: CompletionData,
    report: &mut TranslationReport,
) {
    let text = data
        .reply_text
        .as_deref()
        .map(extract_translation)
        .unwrap_or_default();

    if !data.status.is_ok() || text.is_empty() {
        let reason = data
            .status_text
            .unwrap_or_else(|| "empty reply".to_string());
        log::warn!("translation of {} failed: {} ({})", ticket.key, data.status, reason);
        report.failed.push((ticket.key, data.status, reason));
        return;
    }

    if let Some(total) = data.total_tokens() {
        log::debug!("element {}: {} tokens", ticket.key, total);
    }

    if document.apply_translation(ticket, text) {
        report.applied.push(ticket.key);
    } else {
        report.stale.push(ticket.key);
    }
}
