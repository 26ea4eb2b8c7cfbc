//! Production collaborators for the CodeDrill engine
//!
//! - [`FileCatalog`] - Error catalog loaded from a JSON file
//! - [`ChatClient`] - OpenAI-compatible chat-completion client
//! - [`ChatBackend`] - Generation, evaluation, analysis, guidance and report
//!   services on top of a chat client

use std::sync::Arc;

use drill_engine::{Config, Services};

pub mod backend;
pub mod catalog;
pub mod chat;
pub mod error;
pub mod prompts;

pub use backend::ChatBackend;
pub use catalog::{CatalogEntry, FileCatalog, MAX_CATALOG_SIZE};
pub use chat::{ChatClient, ChatCompletion};
pub use error::{ProviderError, Result};

/// Wires a catalog and a chat client into the engine's service set.
#[must_use]
pub fn services(catalog: FileCatalog, chat: Arc<dyn ChatCompletion>) -> Services {
    let backend = Arc::new(ChatBackend::new(chat));
    Services {
        catalog: Arc::new(catalog),
        generator: backend.clone(),
        evaluator: backend.clone(),
        analyzer: backend.clone(),
        guidance: backend.clone(),
        reporter: backend,
    }
}

/// Builds the production service set described by `config`.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded or the API key is missing.
pub fn from_config(config: &Config) -> Result<Services> {
    let catalog = FileCatalog::load(&config.catalog)?;
    let chat = ChatClient::from_settings(&config.llm)?;
    Ok(services(catalog, Arc::new(chat)))
}
