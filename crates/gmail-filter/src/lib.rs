//! Gmail inbox filter.
//!
//! Classifies inbox messages as necessary or unnecessary with a local Ollama
//! model and moves the unnecessary ones under a review label.

pub mod classifier;
pub mod config;
pub mod error;
pub mod extract;
pub mod gmail;
pub mod logging;
pub mod ollama;
pub mod pipeline;
pub mod results;
pub mod retry;

pub use classifier::EmailClassifier;
pub use config::FilterConfig;
pub use gmail::{GmailClient, Mailbox};
pub use ollama::{CompletionBackend, OllamaClient};
