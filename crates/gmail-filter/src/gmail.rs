//! Gmail API client: authentication, inbox listing, message fetch and
//! label management.

use crate::config::{FilterConfig, GMAIL_SCOPE};
use crate::extract::parse_message;
use anyhow::{Context, Result};
use async_trait::async_trait;
use google_gmail1::api::{Label, ModifyMessageRequest};
use google_gmail1::hyper_rustls::HttpsConnector;
use google_gmail1::Gmail;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use shared_types::EmailContent;

const INBOX: &str = "INBOX";
const ME: &str = "me";

/// Mailbox operations the pipeline needs.
///
/// Implemented by [`GmailClient`]; tests use an in-memory mailbox.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// IDs of up to `max_results` inbox messages, newest first
    async fn list_inbox(&self, max_results: u32) -> Result<Vec<String>>;

    /// Fetch and parse one message
    async fn fetch(&self, message_id: &str) -> Result<EmailContent>;

    /// Return the ID of the label called `name`, creating it if needed
    async fn ensure_label(&self, name: &str) -> Result<String>;

    /// Add `label_id` and remove the message from the inbox
    async fn move_to_label(&self, message_id: &str, label_id: &str) -> Result<()>;
}

/// Client for interacting with Gmail API
pub struct GmailClient {
    hub: Gmail<HttpsConnector<HttpConnector>>,
}

impl GmailClient {
    /// Authenticate with the installed-application flow.
    ///
    /// The first run opens a browser consent page; afterwards the token cache
    /// at `token_file` is reused and refreshed.
    pub async fn connect(config: &FilterConfig) -> Result<Self> {
        tracing::info!("Authenticating with Gmail API");

        let secret = google_gmail1::yup_oauth2::read_application_secret(&config.credentials_file)
            .await
            .with_context(|| {
                format!(
                    "Failed to read OAuth credentials from {}",
                    config.credentials_file.display()
                )
            })?;

        let auth = google_gmail1::yup_oauth2::InstalledFlowAuthenticator::builder(
            secret,
            google_gmail1::yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(&config.token_file)
        .build()
        .await
        .context("Failed to build authenticator")?;

        let connector = google_gmail1::hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .context("Failed to load native TLS roots")?
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new()).build(connector);
        let hub = Gmail::new(client, auth);

        tracing::info!("Gmail authentication successful");
        Ok(Self { hub })
    }
}

#[async_trait]
impl Mailbox for GmailClient {
    async fn list_inbox(&self, max_results: u32) -> Result<Vec<String>> {
        tracing::info!(
            "Fetching up to {} emails with labels: [{}]",
            max_results,
            INBOX
        );

        let (_, list_response) = self
            .hub
            .users()
            .messages_list(ME)
            .add_label_ids(INBOX)
            .max_results(max_results)
            .add_scope(GMAIL_SCOPE)
            .doit()
            .await
            .context("Failed to list messages")?;

        let ids: Vec<String> = list_response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect();

        tracing::info!("Found {} emails", ids.len());
        Ok(ids)
    }

    async fn fetch(&self, message_id: &str) -> Result<EmailContent> {
        tracing::debug!("Getting content for email {}", message_id);

        let (_, message) = self
            .hub
            .users()
            .messages_get(ME, message_id)
            .format("full")
            .add_scope(GMAIL_SCOPE)
            .doit()
            .await
            .with_context(|| format!("Failed to get message {}", message_id))?;

        Ok(parse_message(&message))
    }

    async fn ensure_label(&self, name: &str) -> Result<String> {
        tracing::info!("Ensuring label '{}' exists", name);

        let (_, labels) = self
            .hub
            .users()
            .labels_list(ME)
            .add_scope(GMAIL_SCOPE)
            .doit()
            .await
            .context("Failed to list labels")?;

        let existing = labels
            .labels
            .unwrap_or_default()
            .into_iter()
            .find(|l| l.name.as_deref() == Some(name))
            .and_then(|l| l.id);

        if let Some(id) = existing {
            tracing::info!("Label '{}' already exists with ID: {}", name, id);
            return Ok(id);
        }

        tracing::info!("Label '{}' not found, creating it", name);
        let label = Label {
            name: Some(name.to_string()),
            label_list_visibility: Some("labelShow".to_string()),
            message_list_visibility: Some("show".to_string()),
            ..Default::default()
        };

        let (_, created) = self
            .hub
            .users()
            .labels_create(label, ME)
            .add_scope(GMAIL_SCOPE)
            .doit()
            .await
            .with_context(|| format!("Failed to create label '{}'", name))?;

        let id = created.id.context("Created label has no ID")?;
        tracing::info!("Created label '{}' with ID: {}", name, id);
        Ok(id)
    }

    async fn move_to_label(&self, message_id: &str, label_id: &str) -> Result<()> {
        tracing::debug!("Moving email {} to label {}", message_id, label_id);

        let modify_request = ModifyMessageRequest {
            add_label_ids: Some(vec![label_id.to_string()]),
            remove_label_ids: Some(vec![INBOX.to_string()]),
        };

        self.hub
            .users()
            .messages_modify(modify_request, ME, message_id)
            .add_scope(GMAIL_SCOPE)
            .doit()
            .await
            .with_context(|| format!("Failed to move message {}", message_id))?;

        tracing::debug!("Successfully moved email {}", message_id);
        Ok(())
    }
}
