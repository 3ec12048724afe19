//! Reqwest-backed external dictionary sources.
//!
//! Each adapter owns transport only: URL building, status mapping and JSON
//! decoding into a [`LookupResult`]. Every failure is a [`SourceError`] so
//! the chain can fall through to the next source.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::lookup::{DefinitionSource, SourceError};
use crate::models::{Language, LookupResult, Source};

pub const DEFAULT_WIKTIONARY_BASE: &str = "https://en.wiktionary.org/api/rest_v1";
pub const DEFAULT_FREE_DICTIONARY_BASE: &str = "https://api.dictionaryapi.dev/api/v2";
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = concat!("dialect-base/", env!("CARGO_PKG_VERSION"));

pub const SECONDARY_NOTE: &str = "translated via English dictionary";

/// Shared client for the upstream sources; `timeout` bounds each whole request.
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).user_agent(USER_AGENT).build()
}

/// Primary source: Wiktionary REST definitions, keyed by language code.
pub struct WiktionarySource {
    client: Client,
    base: String,
}

impl WiktionarySource {
    pub fn new(client: Client, base: impl Into<String>) -> Self {
        Self { client, base: base.into() }
    }
}

#[derive(Deserialize)]
struct WiktionaryUsage {
    #[serde(default)]
    definitions: Vec<WiktionaryDefinition>,
}

#[derive(Deserialize)]
struct WiktionaryDefinition {
    #[serde(default)]
    definition: String,
}

#[async_trait]
impl DefinitionSource for WiktionarySource {
    fn source(&self) -> Source {
        Source::PrimaryApi
    }

    async fn define(&self, word: &str, language: &Language) -> Result<LookupResult, SourceError> {
        let url = format!(
            "{}/page/definition/{}",
            self.base.trim_end_matches('/'),
            urlencoding::encode(word)
        );
        let body = get_json::<HashMap<String, Vec<WiktionaryUsage>>>(&self.client, &url).await?;
        let meaning = body
            .get(&language.code)
            .into_iter()
            .flatten()
            .flat_map(|usage| usage.definitions.iter())
            .map(|d| strip_markup(&d.definition))
            .find(|d| !d.is_empty())
            .ok_or(SourceError::NotFound)?;
        Ok(LookupResult {
            word: word.to_owned(),
            language: language.name.clone(),
            meaning,
            source: Source::PrimaryApi,
            original_word: None,
            note: None,
        })
    }
}

/// Secondary source: the English-only Free Dictionary API.
pub struct FreeDictionarySource {
    client: Client,
    base: String,
}

impl FreeDictionarySource {
    pub fn new(client: Client, base: impl Into<String>) -> Self {
        Self { client, base: base.into() }
    }
}

#[derive(Deserialize)]
struct FreeDictionaryEntry {
    #[serde(default)]
    meanings: Vec<FreeDictionaryMeaning>,
}

#[derive(Deserialize)]
struct FreeDictionaryMeaning {
    #[serde(default)]
    definitions: Vec<WiktionaryDefinition>,
}

#[async_trait]
impl DefinitionSource for FreeDictionarySource {
    fn source(&self) -> Source {
        Source::SecondaryApi
    }

    async fn define(&self, word: &str, _language: &Language) -> Result<LookupResult, SourceError> {
        let url = format!(
            "{}/entries/en/{}",
            self.base.trim_end_matches('/'),
            urlencoding::encode(word)
        );
        let entries = get_json::<Vec<FreeDictionaryEntry>>(&self.client, &url).await?;
        let meaning = entries
            .first()
            .and_then(|e| e.meanings.first())
            .and_then(|m| m.definitions.first())
            .map(|d| d.definition.trim().to_owned())
            .filter(|d| !d.is_empty())
            .ok_or(SourceError::NotFound)?;
        Ok(LookupResult {
            word: word.to_owned(),
            language: "english".to_owned(),
            meaning,
            source: Source::SecondaryApi,
            original_word: Some(word.to_owned()),
            note: Some(SECONDARY_NOTE.to_owned()),
        })
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(client: &Client, url: &str) -> Result<T, SourceError> {
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(map_transport_error)?;
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound);
    }
    if !status.is_success() {
        return Err(SourceError::Status(status.as_u16()));
    }
    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            SourceError::Timeout(e.to_string())
        } else {
            SourceError::Decode(e.to_string())
        }
    })
}

fn map_transport_error(error: reqwest::Error) -> SourceError {
    if error.is_timeout() {
        SourceError::Timeout(error.to_string())
    } else {
        SourceError::Transport(error.to_string())
    }
}

/// Wiktionary definitions embed HTML; keep the text only.
fn strip_markup(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
