use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Placeholder used when a message has no Subject header
pub const NO_SUBJECT: &str = "(No Subject)";
/// Placeholder used when a message has no From header
pub const NO_SENDER: &str = "(No Sender)";
/// Placeholder used when a message has no Date header
pub const NO_DATE: &str = "(No Date)";

/// Plain-text view of a fetched email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailContent {
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub snippet: String,
    pub body: String,
}

/// Input to one classification call.
///
/// `body_preview` never exceeds the configured preview length, counted in
/// characters rather than bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub body_preview: String,
}

impl ClassificationRequest {
    /// Build a request from extracted email content, truncating the body
    pub fn from_email(email: &EmailContent, preview_length: usize) -> Self {
        Self {
            subject: email.subject.clone(),
            sender: email.sender.clone(),
            date: email.date.clone(),
            body_preview: truncate_chars(&email.body, preview_length),
        }
    }
}

/// Truncate `text` to at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// What the model said about one email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_unnecessary: bool,
    /// Neither verdict could be read from the completion, so the email was kept
    pub ambiguous: bool,
    pub raw_model_text: String,
}

/// Rejected retry settings
#[derive(Debug, Error, PartialEq)]
pub enum RetryPolicyError {
    #[error("max_attempts must be at least 1")]
    NoAttempts,
    #[error("delay_seconds must be a finite, non-negative number (got {0})")]
    InvalidDelay(f64),
}

/// Fixed-delay retry policy, loaded once from configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay_seconds: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_seconds: f64) -> Result<Self, RetryPolicyError> {
        if max_attempts == 0 {
            return Err(RetryPolicyError::NoAttempts);
        }
        if !delay_seconds.is_finite() || delay_seconds < 0.0 {
            return Err(RetryPolicyError::InvalidDelay(delay_seconds));
        }
        Ok(Self {
            max_attempts,
            delay_seconds,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay_seconds(&self) -> f64 {
        self.delay_seconds
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_seconds)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_seconds: 2.0,
        }
    }
}

/// Final disposition of one email in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Necessary,
    Unnecessary,
    /// The classifier could not be reached; the email was left alone
    Unavailable,
}

impl Outcome {
    /// Name used in log lines and the results file
    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Necessary => "necessary",
            Outcome::Unnecessary => "unnecessary",
            Outcome::Unavailable => "unavailable",
        }
    }
}

impl From<&ClassificationResult> for Outcome {
    fn from(result: &ClassificationResult) -> Self {
        if result.is_unnecessary {
            Outcome::Unnecessary
        } else {
            Outcome::Necessary
        }
    }
}

/// One line of the results file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEmail {
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub outcome: Outcome,
    /// Whether the target label was applied
    pub labeled: bool,
    pub ambiguous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_response: Option<String>,
    pub classified_at: DateTime<Utc>,
}

/// Summary of a whole run, written to the results directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub label_name: String,
    pub dry_run: bool,
    pub total_processed: usize,
    pub unnecessary_count: usize,
    pub unavailable_count: usize,
    pub emails: Vec<ProcessedEmail>,
}

impl RunSummary {
    pub fn new(label_name: impl Into<String>, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            label_name: label_name.into(),
            dry_run,
            total_processed: 0,
            unnecessary_count: 0,
            unavailable_count: 0,
            emails: Vec::new(),
        }
    }

    /// Append a processed email and keep the counters in step
    pub fn record(&mut self, email: ProcessedEmail) {
        self.total_processed += 1;
        match email.outcome {
            Outcome::Unnecessary => self.unnecessary_count += 1,
            Outcome::Unavailable => self.unavailable_count += 1,
            Outcome::Necessary => {}
        }
        self.emails.push(email);
    }

    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    /// Emails that were judged unnecessary and actually moved
    pub fn moved(&self) -> impl Iterator<Item = &ProcessedEmail> {
        self.emails
            .iter()
            .filter(|e| e.outcome == Outcome::Unnecessary && e.labeled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(body: &str) -> EmailContent {
        EmailContent {
            id: "m1".to_string(),
            subject: "Invoice Due".to_string(),
            sender: "billing@example.com".to_string(),
            date: NO_DATE.to_string(),
            snippet: String::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_long_body_truncated_to_exact_length() {
        let body = "x".repeat(50);
        let request = ClassificationRequest::from_email(&email(&body), 20);
        assert_eq!(request.body_preview.chars().count(), 20);
    }

    #[test]
    fn test_short_body_unmodified() {
        let request = ClassificationRequest::from_email(&email("Please pay by Friday."), 1000);
        assert_eq!(request.body_preview, "Please pay by Friday.");
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("héllo wörld", 7), "héllo w");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_retry_policy_validation() {
        assert_eq!(RetryPolicy::new(0, 1.0), Err(RetryPolicyError::NoAttempts));
        assert!(matches!(
            RetryPolicy::new(3, -1.0),
            Err(RetryPolicyError::InvalidDelay(_))
        ));
        assert!(RetryPolicy::new(3, f64::NAN).is_err());

        let policy = RetryPolicy::new(3, 0.5).expect("valid policy");
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_outcome_name_matches_serialized_form() {
        for outcome in [Outcome::Necessary, Outcome::Unnecessary, Outcome::Unavailable] {
            let json = serde_json::to_string(&outcome).unwrap();
            assert_eq!(json, format!("\"{}\"", outcome.as_str()));
        }
    }

    #[test]
    fn test_summary_counters() {
        let mut summary = RunSummary::new("potential-unnecessary", false);
        let base = ProcessedEmail {
            id: "a".to_string(),
            subject: "s".to_string(),
            sender: "f".to_string(),
            outcome: Outcome::Necessary,
            labeled: false,
            ambiguous: false,
            model_response: None,
            classified_at: Utc::now(),
        };

        summary.record(base.clone());
        summary.record(ProcessedEmail {
            outcome: Outcome::Unnecessary,
            labeled: true,
            ..base.clone()
        });
        summary.record(ProcessedEmail {
            outcome: Outcome::Unnecessary,
            labeled: false,
            ..base.clone()
        });
        summary.record(ProcessedEmail {
            outcome: Outcome::Unavailable,
            ..base
        });

        assert_eq!(summary.total_processed, 4);
        assert_eq!(summary.unnecessary_count, 2);
        assert_eq!(summary.unavailable_count, 1);
        assert_eq!(summary.moved().count(), 1);
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        let json = serde_json::to_string(&Outcome::Unnecessary).unwrap();
        assert_eq!(json, "\"unnecessary\"");
    }
}
