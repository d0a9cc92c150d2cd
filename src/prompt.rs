//! Interactive acquisition of the chat id, bearer token and report language.
//!
//! Each prompt is a small loop over explicit states rather than a recursive
//! re-invocation, so hostile or scripted input can't grow the stack.
use crate::graph::BearerToken;
use crate::i18n::Language;
use eyre::{Result, WrapErr, eyre};
use std::io::{BufRead, Write};

pub const CHAT_ID_PREFIX: &str = "19:";
const GRAPH_EXPLORER: &str = "https://developer.microsoft.com/en-us/graph/graph-explorer";

enum ChatIdStep {
    Ask,
    Confirm(String),
    Done(String),
}

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .wrap_err("Failed to read from stdin")?;
        if read == 0 {
            return Err(eyre!("Input closed before an answer was given"));
        }
        Ok(line.trim().to_string())
    }

    pub fn chat_id(&mut self) -> Result<String> {
        writeln!(self.output, "=== CHAT ID ===")?;
        writeln!(self.output, "Find the chat id with Graph Explorer ({GRAPH_EXPLORER}):")?;
        writeln!(self.output, "  GET https://graph.microsoft.com/v1.0/me/chats?$expand=members")?;
        writeln!(self.output, "or copy it from a Teams chat URL (the part after /chat/).")?;
        writeln!(self.output, "Chat ids look like 19:xxxxx...@unq.gbl.spaces")?;
        writeln!(self.output)?;

        let mut step = ChatIdStep::Ask;
        loop {
            step = match step {
                ChatIdStep::Ask => {
                    let id = self.ask("Paste the Chat ID here: ")?;
                    if id.is_empty() {
                        return Err(eyre!("No Chat ID provided"));
                    }
                    if id.starts_with(CHAT_ID_PREFIX) {
                        ChatIdStep::Done(id)
                    } else {
                        ChatIdStep::Confirm(id)
                    }
                }
                ChatIdStep::Confirm(id) => {
                    writeln!(
                        self.output,
                        "Warning: Chat ID doesn't start with '{CHAT_ID_PREFIX}'. This might be incorrect."
                    )?;
                    let answer = self.ask("Continue anyway? (y/n): ")?;
                    if answer.eq_ignore_ascii_case("y") {
                        ChatIdStep::Done(id)
                    } else {
                        ChatIdStep::Ask
                    }
                }
                ChatIdStep::Done(id) => {
                    writeln!(self.output, "Chat ID accepted: {id}")?;
                    return Ok(id);
                }
            };
        }
    }

    pub fn token(&mut self) -> Result<BearerToken> {
        writeln!(self.output, "=== ACCESS TOKEN ===")?;
        writeln!(self.output, "Sign in to Graph Explorer ({GRAPH_EXPLORER}),")?;
        writeln!(self.output, "open the 'Access token' tab and copy the token.")?;
        writeln!(self.output)?;
        let raw = self.ask("Paste the token here: ")?;
        BearerToken::parse(&raw).ok_or_else(|| eyre!("No token provided"))
    }

    pub fn language(&mut self) -> Result<Language> {
        writeln!(self.output, "Available languages:")?;
        for (i, lang) in Language::ALL.iter().enumerate() {
            writeln!(self.output, "{}. {} ({})", i + 1, lang.name(), lang.code())?;
        }
        loop {
            let choice = self.ask("Enter language number or code (default: 1): ")?;
            if choice.is_empty() {
                return Ok(Language::default());
            }
            match Language::from_choice(&choice) {
                Some(lang) => return Ok(lang),
                None => writeln!(self.output, "Invalid choice. Please enter 1-4 or en/es/fr/de")?,
            }
        }
    }
}
