//! Console reports for batches and document listings

use crate::pipeline::{BatchReport, OutcomeKind};
use crate::storage::DocumentRecord;

/// Prints one line per document followed by the final tally
pub fn print_batch_report(report: &BatchReport) {
    for outcome in &report.outcomes {
        let marker = match outcome.kind {
            OutcomeKind::Completed { .. } | OutcomeKind::Deduplicated { .. } => "ok",
            OutcomeKind::Skipped => "skip",
            OutcomeKind::Failed { .. } => "FAILED",
        };
        println!("[{}] {}", marker, outcome);
    }

    println!();
    println!("{}", format_tally(report));
}

/// Final count summary of a batch
pub fn format_tally(report: &BatchReport) -> String {
    let mut tally = format!(
        "Processed: {} successful, {} failed",
        report.successful, report.failed
    );

    if report.deduplicated > 0 {
        tally.push_str(&format!(" ({} deduplicated)", report.deduplicated));
    }
    if report.skipped > 0 {
        tally.push_str(&format!(", {} already completed", report.skipped));
    }
    if report.not_started > 0 {
        tally.push_str(&format!(", {} not started (cancelled)", report.not_started));
    }

    tally
}

/// One-line description of a stored document
pub fn format_document_line(document: &DocumentRecord) -> String {
    let keywords: Vec<&str> = document
        .keywords
        .iter()
        .take(5)
        .map(|k| k.word.as_str())
        .collect();

    let mut line = format!(
        "{:<24} {:<10} {:<10}",
        document.filename,
        document.status.to_db_string(),
        document.processing_stage.to_db_string()
    );

    if let Some(pages) = document.page_count {
        line.push_str(&format!(" {} pages", pages));
    }
    if !keywords.is_empty() {
        line.push_str(&format!(" [{}]", keywords.join(", ")));
    }

    line
}

/// Prints a listing of stored documents
pub fn print_documents(documents: &[DocumentRecord]) {
    if documents.is_empty() {
        println!("No matching documents.");
        return;
    }

    for document in documents {
        println!("{}", format_document_line(document));
    }
    println!("\n{} document(s)", documents.len());
}
