//! Necessary/unnecessary classification through an LLM.
//!
//! The classifier builds one prompt per email, asks the completion backend
//! (retrying transient failures with a fixed delay) and reads a verdict out of
//! the completion text. A completion that contains no clear verdict is not an
//! error: the email is kept.

use crate::error::ClassifyError;
use crate::ollama::CompletionBackend;
use crate::retry::{retry, RetryExhausted};
use shared_types::{ClassificationRequest, ClassificationResult, RetryPolicy};

const NECESSARY_KEYWORD: &str = "necessary";
const UNNECESSARY_KEYWORD: &str = "unnecessary";

const INSTRUCTIONS: &str = "\
You are an assistant that decides whether an email is worth keeping in the inbox.

NECESSARY emails (answer NECESSARY):
1. Orders and shipping: purchase confirmations, shipment tracking, delivery notices, returns and refunds.
2. Financial: statements and alerts for real transactions, bill payment confirmations, tax documents, receipts.
3. Personal: messages written by friends, family or colleagues, replies to questions the recipient asked.
4. Work: mail from colleagues, clients or managers, project updates needing review, meeting invitations.
5. Account and security: requested password resets, security alerts, verification codes, important account changes.
6. Travel and events: flight, hotel or rental confirmations, boarding passes, tickets, reservations, appointment reminders.
7. Education: course communications from instructors, assignment feedback, announcements that affect the recipient.
8. Required actions: explicit requests for a response, legal notices, time-sensitive information.

UNNECESSARY emails (answer UNNECESSARY):
1. Marketing: sales, limited time offers, unrelated discount codes, product recommendations, deal digests.
2. Automated updates: social media notifications, news digests, usage summaries, \"we miss you\" mail.
3. Bulk mail: mass mailings, promotional content with the recipient's name inserted.
4. Banking marketing: credit card, loan, insurance or investment offers.
5. Subscriptions: blog posts, publication updates, feed and channel notifications.
6. Low-priority notifications: profile views, forum digests, likes and comments, \"see what's new\".
7. Repetition: repeated reminders, duplicate notifications, marketing follow-ups.

Consider whether the sender is a person, a company or an automated system, whether the subject uses
action words or marketing language, and whether the content is specific to the recipient or generic.

Answer with exactly one word first, NECESSARY or UNNECESSARY, followed by a very brief explanation.";

/// Build the full prompt for one email
pub fn build_prompt(request: &ClassificationRequest) -> String {
    format!(
        "{INSTRUCTIONS}\n\n\
         Subject: {}\n\
         From: {}\n\
         Date: {}\n\n\
         Email content:\n{}\n",
        request.subject, request.sender, request.date, request.body_preview
    )
}

/// Verdict read from a completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Necessary,
    Unnecessary,
    Ambiguous,
}

/// Read a verdict out of completion text.
///
/// Keywords are matched as whole words, case-insensitively, so "unnecessary"
/// never counts as "necessary". When both appear, the first word decides if it
/// is one of them.
///
/// Only keyword presence is read. Negation is not understood, so "not
/// unnecessary" reads as `Unnecessary` and "not necessary" as `Necessary`;
/// the prompt asks for the verdict word first to keep answers in that shape.
pub fn parse_verdict(text: &str) -> Verdict {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    let has = |keyword: &str| words.iter().any(|w| w == keyword);

    match (has(UNNECESSARY_KEYWORD), has(NECESSARY_KEYWORD)) {
        (true, false) => Verdict::Unnecessary,
        (false, true) => Verdict::Necessary,
        (true, true) => match words.first().map(String::as_str) {
            Some(UNNECESSARY_KEYWORD) => Verdict::Unnecessary,
            Some(NECESSARY_KEYWORD) => Verdict::Necessary,
            _ => Verdict::Ambiguous,
        },
        (false, false) => Verdict::Ambiguous,
    }
}

/// Classifies emails through a [`CompletionBackend`] with retries
pub struct EmailClassifier<B> {
    backend: B,
    policy: RetryPolicy,
}

impl<B: CompletionBackend> EmailClassifier<B> {
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Classify one email.
    ///
    /// Fails only when every attempt to reach the backend failed.
    pub async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<ClassificationResult, ClassifyError> {
        let prompt = build_prompt(request);
        let backend = &self.backend;
        let prompt = prompt.as_str();

        tracing::debug!("Analyzing email: {}", request.subject);

        let text = retry(&self.policy, backend.name(), move || backend.complete(prompt))
            .await
            .map_err(|RetryExhausted { attempts, last_error }| {
                if last_error.is_network() {
                    tracing::error!(
                        "{} could not be reached after {} attempt(s); is the server running?",
                        backend.name(),
                        attempts
                    );
                }
                ClassifyError::Unavailable {
                    attempts,
                    last_error,
                }
            })?;

        let verdict = parse_verdict(&text);
        match verdict {
            Verdict::Unnecessary => {
                tracing::debug!("Email deemed unnecessary: {}", request.subject)
            }
            Verdict::Necessary => tracing::debug!("Email deemed necessary: {}", request.subject),
            Verdict::Ambiguous => {
                tracing::warn!(
                    "Ambiguous response for email: {}. Defaulting to necessary.",
                    request.subject
                );
                tracing::warn!("Response was: {}", text);
            }
        }

        Ok(ClassificationResult {
            is_unnecessary: verdict == Verdict::Unnecessary,
            ambiguous: verdict == Verdict::Ambiguous,
            raw_model_text: text,
        })
    }
}
