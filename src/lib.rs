//! # teams-chat-export
//!
//! A CLI tool that exports a Microsoft Teams chat to a JSON file and a
//! certified PDF report.
//!
//! ## What it does
//!
//! The tool pages through a chat's messages on the Microsoft Graph API,
//! following `@odata.nextLink` until the server stops handing out links. Every
//! page's raw response body is hashed with SHA-256 before it is parsed, and the
//! per-page digests are folded into a master hash. Together with session
//! metadata this forms the chain-of-custody ledger that the PDF reproduces.
//!
//! Messages are written **verbatim**, exactly as the API returned them, to
//! `complete_conversation_{timestamp}.json`. The ledger and the resolved
//! participant list go into a `.custody.json` sidecar so that the report can be
//! re-rendered or checked later without touching the network.
//!
//! ## Usage
//!
//! ```sh
//! # Interactive: prompts for chat ID, token and report language
//! teams-chat-export
//!
//! # Non-interactive
//! teams-chat-export export --chat-id '19:abc@thread.v2' --token "$TOKEN" --language es
//!
//! # Re-render the report from files on disk, then check the ledger
//! teams-chat-export render --messages out/complete_conversation_20240115_103005.json
//! teams-chat-export verify --manifest out/complete_conversation_20240115_103005.custody.json
//! ```
//!
//! Preferences can be persisted in `~/.config/teams-chat-export/config.toml`.
//! Report labels come from `language_config.json` (English is built in).
pub mod collector;
pub mod config;
pub mod custody;
pub mod export;
pub mod graph;
pub mod i18n;
pub mod model;
pub mod participants;
pub mod pipeline;
pub mod prompt;
pub mod render;
pub mod sanitize;
