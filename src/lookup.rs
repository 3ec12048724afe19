//! Ordered-fallback word lookup.
//!
//! Sources are tried strictly in order; the first success wins and its
//! [`Source`] tag is preserved in the result. Source failures are logged and
//! swallowed, only the chain's own outcome reaches callers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::catalog::LanguageCatalog;
use crate::dictionary::{http_client, FreeDictionarySource, WiktionarySource};
use crate::models::{Language, LookupResult, Source};

pub const LOCAL_NOTE: &str = "from local table (limited words)";

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("no definition")]
    NotFound,
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("upstream status {0}")]
    Status(u16),
    #[error("undecodable payload: {0}")]
    Decode(String),
}

#[derive(thiserror::Error, Debug)]
pub enum LookupError {
    #[error("Word is required")]
    EmptyWord,
    #[error("Language not supported. Supported languages: {}", .supported.join(", "))]
    UnsupportedLanguage { supported: Vec<String> },
    #[error("No definition found for \"{word}\" in {language}. The word might be misspelled or not in our databases.")]
    WordNotFound { word: String, language: String },
}

/// One step of the chain.
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    fn source(&self) -> Source;
    async fn define(&self, word: &str, language: &Language) -> Result<LookupResult, SourceError>;
}

/// Last resort: the catalog's static word table.
pub struct LocalTableSource {
    catalog: Arc<LanguageCatalog>,
}

impl LocalTableSource {
    pub fn new(catalog: Arc<LanguageCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl DefinitionSource for LocalTableSource {
    fn source(&self) -> Source {
        Source::LocalFallback
    }

    async fn define(&self, word: &str, language: &Language) -> Result<LookupResult, SourceError> {
        let meaning = self
            .catalog
            .fallback_meaning(&language.name, word)
            .ok_or(SourceError::NotFound)?;
        Ok(LookupResult {
            word: word.to_owned(),
            language: language.name.clone(),
            meaning: meaning.to_owned(),
            source: Source::LocalFallback,
            original_word: None,
            note: Some(LOCAL_NOTE.to_owned()),
        })
    }
}

pub struct LookupChain {
    catalog: Arc<LanguageCatalog>,
    sources: Vec<Box<dyn DefinitionSource>>,
}

impl LookupChain {
    pub fn new(catalog: Arc<LanguageCatalog>, sources: Vec<Box<dyn DefinitionSource>>) -> Self {
        Self { catalog, sources }
    }

    /// Wiktionary, then Free Dictionary, then the local table.
    pub fn standard(
        catalog: Arc<LanguageCatalog>,
        wiktionary_base: &str,
        free_dictionary_base: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = http_client(timeout)?;
        let sources: Vec<Box<dyn DefinitionSource>> = vec![
            Box::new(WiktionarySource::new(client.clone(), wiktionary_base)),
            Box::new(FreeDictionarySource::new(client, free_dictionary_base)),
            Box::new(LocalTableSource::new(catalog.clone())),
        ];
        Ok(Self::new(catalog, sources))
    }

    pub fn catalog(&self) -> &LanguageCatalog {
        &self.catalog
    }

    pub async fn lookup(&self, word: &str, language: &str) -> Result<LookupResult, LookupError> {
        // resolve before any source runs so unsupported languages never reach the network
        let lang = self
            .catalog
            .resolve(language)
            .ok_or_else(|| LookupError::UnsupportedLanguage { supported: self.catalog.names() })?;
        let word = word.trim();
        if word.is_empty() {
            return Err(LookupError::EmptyWord);
        }

        for source in &self.sources {
            match source.define(word, lang).await {
                Ok(found) => {
                    tracing::debug!(word, language = %lang.name, source = ?found.source, "definition found");
                    return Ok(found);
                }
                Err(SourceError::NotFound) => {
                    tracing::debug!(word, language = %lang.name, source = ?source.source(), "no definition, falling through");
                }
                Err(e) => {
                    tracing::warn!(word, language = %lang.name, source = ?source.source(), "source failed, falling through: {e}");
                }
            }
        }
        Err(LookupError::WordNotFound { word: word.to_owned(), language: lang.name.clone() })
    }
}
