//! Report language bundles.
//!
//! A language file maps a language code to a bundle of template strings.
//! Bundles may be partial: missing keys take the built-in English value, and
//! a language absent from the file gets the whole English bundle.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_LANGUAGE_FILE: &str = "language_config.json";

/// Supported report languages, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
    Fr,
    De,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::En, Language::Es, Language::Fr, Language::De];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::De => "de",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Es => "Spanish",
            Language::Fr => "French",
            Language::De => "German",
        }
    }

    /// Parse a menu answer: a 1-based index or a two-letter code.
    pub fn from_choice(choice: &str) -> Option<Self> {
        let choice = choice.trim().to_ascii_lowercase();
        if let Ok(n) = choice.parse::<usize>() {
            return n.checked_sub(1).and_then(|i| Self::ALL.get(i).copied());
        }
        Self::ALL.into_iter().find(|l| l.code() == choice)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_choice(s).ok_or_else(|| format!("unsupported language {s:?}, use 1-4 or en/es/fr/de"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageBundle {
    pub document_title: String,
    pub document_subtitle: String,
    pub export_date: String,
    pub original_file: String,
    pub total_messages: String,
    pub conversation_with: String,
    pub chain_of_custody: String,
    pub api_response_hash: String,
    pub session_metadata: String,
    pub authenticity_declaration: String,
    pub authenticity_text: String,
    pub complete_conversation: String,
    pub message: String,
    pub from: String,
    pub content: String,
    pub unidentified_user: String,
    pub unknown_user: String,
    pub final_certificate: String,
    pub certification_date: String,
    pub final_certificate_text: String,
}

impl Default for LanguageBundle {
    fn default() -> Self {
        Self::english()
    }
}

impl LanguageBundle {
    pub fn english() -> Self {
        Self {
            document_title: "MICROSOFT TEAMS CONVERSATION".into(),
            document_subtitle: "Official certified export".into(),
            export_date: "Export date:".into(),
            original_file: "Original file:".into(),
            total_messages: "Total messages:".into(),
            conversation_with: "Conversation Participants:".into(),
            chain_of_custody: "CHAIN OF CUSTODY CERTIFICATE".into(),
            api_response_hash: "API Response Hash:".into(),
            session_metadata: "Session Metadata:".into(),
            authenticity_declaration: "AUTHENTICITY DECLARATION".into(),
            authenticity_text: "This conversation has been officially exported from Microsoft Teams \
                using the official Microsoft Graph API. The chain of custody includes original API \
                responses, session metadata, and cryptographic hashes to guarantee data integrity \
                and authenticity."
                .into(),
            complete_conversation: "COMPLETE CONVERSATION".into(),
            message: "MESSAGE".into(),
            from: "From:".into(),
            content: "Content:".into(),
            unidentified_user: "Unidentified user".into(),
            unknown_user: "Unknown user".into(),
            final_certificate: "FINAL CERTIFICATE".into(),
            certification_date: "Certification date:".into(),
            final_certificate_text: "This document is a faithful conversion of the original data. \
                The chain of custody provides cryptographic proof of data integrity and authenticity."
                .into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("failed to read language file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse language file {path}: {message}")]
    Parse { path: String, message: String },
}

/// Every bundle available for this run.
#[derive(Debug, Clone, Default)]
pub struct Bundles {
    by_code: HashMap<String, LanguageBundle>,
}

impl Bundles {
    /// Load bundles from `path`. A missing file is not an error: the
    /// built-in English bundle is used for every language.
    pub fn load(path: &Path) -> Result<Self, BundleError> {
        if !path.exists() {
            info!(path = %path.display(), "language file not found, using built-in English");
            return Ok(Self::default());
        }
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| BundleError::Read {
            path: display.clone(),
            source,
        })?;
        let by_code = parse_bundles(path, &content).map_err(|message| BundleError::Parse {
            path: display,
            message,
        })?;
        debug!(languages = by_code.len(), "loaded language bundles");
        Ok(Self { by_code })
    }

    pub fn select(&self, language: Language) -> LanguageBundle {
        match self.by_code.get(language.code()) {
            Some(bundle) => bundle.clone(),
            None => {
                if language != Language::En {
                    info!(language = %language, "no bundle for language, falling back to English");
                }
                self.by_code
                    .get(Language::En.code())
                    .cloned()
                    .unwrap_or_default()
            }
        }
    }
}

fn parse_bundles(path: &Path, content: &str) -> Result<HashMap<String, LanguageBundle>, String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("toml") => toml::from_str(content).map_err(|e| e.to_string()),
        Some("yaml") | Some("yml") => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        _ => serde_json::from_str(content).map_err(|e| e.to_string()),
    }
}
