//! One filter run: list the inbox, classify each message, relabel the
//! unnecessary ones and collect a summary.

use crate::classifier::EmailClassifier;
use crate::config::FilterConfig;
use crate::gmail::Mailbox;
use crate::ollama::CompletionBackend;
use crate::retry::retry_anyhow;
use anyhow::Result;
use chrono::Utc;
use shared_types::{truncate_chars, ClassificationRequest, Outcome, ProcessedEmail, RunSummary};

/// Run the filter once over the inbox.
///
/// Listing the inbox or preparing the label are the only failures that
/// abort the run. Anything that goes wrong with a single message is logged
/// and the run moves on to the next one.
pub async fn run<M, B>(
    config: &FilterConfig,
    mailbox: &M,
    classifier: &EmailClassifier<B>,
    dry_run: bool,
) -> Result<RunSummary>
where
    M: Mailbox + ?Sized,
    B: CompletionBackend,
{
    let policy = &config.retry;
    let label_name = config.label_name.as_str();
    let mut summary = RunSummary::new(label_name, dry_run);

    let label_id = if dry_run {
        tracing::info!("Dry run: label '{}' will not be touched", label_name);
        None
    } else {
        let id = retry_anyhow(policy, "ensure label", move || {
            mailbox.ensure_label(label_name)
        })
        .await?;
        tracing::info!("Label ready with ID: {}", id);
        Some(id)
    };

    let max_emails = config.max_emails;
    let message_ids = retry_anyhow(policy, "list emails", move || {
        mailbox.list_inbox(max_emails)
    })
    .await?;

    let total = message_ids.len();
    tracing::info!("Found {} emails to process", total);

    for (i, message_id) in message_ids.iter().enumerate() {
        let id = message_id.as_str();
        let email = match retry_anyhow(policy, "get email content", move || mailbox.fetch(id)).await
        {
            Ok(email) => email,
            Err(e) => {
                tracing::error!("Error processing email {}: {:#}", message_id, e);
                continue;
            }
        };

        tracing::info!(
            "Processing email {}/{}: '{}...'",
            i + 1,
            total,
            truncate_chars(&email.subject, 50)
        );

        let request = ClassificationRequest::from_email(&email, config.body_preview_length);
        let mut record = ProcessedEmail {
            id: message_id.clone(),
            subject: email.subject.clone(),
            sender: email.sender.clone(),
            outcome: Outcome::Unavailable,
            labeled: false,
            ambiguous: false,
            model_response: None,
            classified_at: Utc::now(),
        };

        let result = match classifier.classify(&request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    "Skipping email {} ({}): {}",
                    message_id,
                    record.outcome.as_str(),
                    e
                );
                summary.record(record);
                continue;
            }
        };

        record.outcome = Outcome::from(&result);
        record.ambiguous = result.ambiguous;
        record.model_response = Some(result.raw_model_text);
        record.classified_at = Utc::now();

        if record.outcome == Outcome::Unnecessary {
            match label_id.as_deref() {
                Some(label) => {
                    let moved = retry_anyhow(policy, "move email", move || {
                        mailbox.move_to_label(id, label)
                    })
                    .await;
                    match moved {
                        Ok(()) => {
                            record.labeled = true;
                            tracing::info!(
                                "  → Marked as unnecessary and moved to '{}'",
                                label_name
                            );
                        }
                        Err(e) => {
                            tracing::warn!(
                                "  → Determined to be unnecessary, but failed to move: {:#}",
                                e
                            );
                        }
                    }
                }
                None => tracing::info!("  → Determined to be unnecessary (dry run, not moved)"),
            }
        } else {
            tracing::info!("  → Determined to be necessary, keeping in inbox");
        }

        tracing::debug!("Recorded {} as {}", message_id, record.outcome.as_str());
        summary.record(record);
    }

    summary.finish();
    Ok(summary)
}
