use std::collections::HashMap;

use crate::models::Language;

const BUILTIN_LANGUAGES: &[(&str, &str)] = &[
    ("tamil", "ta"),
    ("telugu", "te"),
    ("hindi", "hi"),
    ("tulu", "tcy"),
    ("kannada", "kn"),
    ("malayalam", "ml"),
    ("bengali", "bn"),
];

const BUILTIN_FALLBACK: &[(&str, &str, &str)] = &[
    ("tamil", "vanakkam", "Hello/Welcome"),
    ("tamil", "nandri", "Thank you"),
    ("tamil", "sugam", "Well/Good"),
    ("telugu", "namaskaram", "Hello"),
    ("telugu", "dhanyavaadhamulu", "Thank you"),
    ("telugu", "bagunnana", "How are you?"),
    ("hindi", "namaste", "Hello"),
    ("hindi", "dhanyavaad", "Thank you"),
    ("hindi", "kaise ho", "How are you?"),
    ("tulu", "yenna", "What"),
    ("tulu", "aanda", "Yes"),
    ("tulu", "porluga", "Good"),
];

/// Supported languages and the last-resort word table. Built once, shared read-only.
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    languages: Vec<Language>,
    fallback: HashMap<(String, String), String>,
}

impl LanguageCatalog {
    pub fn builtin() -> Self {
        let languages = BUILTIN_LANGUAGES
            .iter()
            .map(|(name, code)| Language { name: (*name).to_owned(), code: (*code).to_owned() })
            .collect();
        let fallback = BUILTIN_FALLBACK
            .iter()
            .map(|(lang, word, meaning)| (((*lang).to_owned(), (*word).to_owned()), (*meaning).to_owned()))
            .collect();
        Self { languages, fallback }
    }

    /// Case-insensitive lookup by language name.
    pub fn resolve(&self, name: &str) -> Option<&Language> {
        let name = name.trim().to_lowercase();
        self.languages.iter().find(|l| l.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.languages.iter().map(|l| l.name.clone()).collect()
    }

    pub fn fallback_meaning(&self, language: &str, word: &str) -> Option<&str> {
        self.fallback
            .get(&(language.to_lowercase(), word.trim().to_lowercase()))
            .map(String::as_str)
    }
}

impl Default for LanguageCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
