//! Certified PDF report.
//!
//! [`build_report`] turns the export into a flat list of [`Block`]s,
//! [`layout::layout`] flows them onto A4 pages and [`pdf::write_pdf`] draws
//! the result. Only the last step knows about PDF.
pub mod layout;
pub mod pdf;

use crate::custody::CustodyLedger;
use crate::i18n::LanguageBundle;
use crate::model::{ChatMessage, RawMessage};
use crate::participants::UNKNOWN_PARTICIPANTS;
use crate::sanitize::clean_html;
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};
use indicatif::ProgressBar;
use layout::{Block, Font, Geometry, Span};

pub use pdf::PdfError;

pub const DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
const SEPARATOR_EVERY: usize = 10;
const BODY_SIZE: f32 = 10.0;
const META_SIZE: f32 = 8.0;
const MESSAGE_INDENT: f32 = 7.0;

pub struct ReportInput<'a> {
    pub messages: &'a [RawMessage],
    pub ledger: &'a CustodyLedger,
    pub participants: &'a [String],
    pub bundle: &'a LanguageBundle,
    /// File name of the JSON export, shown in the metadata table.
    pub source_file: &'a str,
    pub generated_at: DateTime<Local>,
}

/// Parse a wire timestamp. Accepts RFC 3339 (including a trailing `Z`) and
/// offset-less ISO timestamps, which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw).ok().or_else(|| {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
    })
}

/// Local display form of a wire timestamp, or the raw string if unparseable.
pub fn format_timestamp(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(ts) => ts.with_timezone(&Local).format(DISPLAY_FORMAT).to_string(),
        None => raw.to_string(),
    }
}

/// Sender line for a message. A missing `from` and a `from` without any
/// display name get different placeholders.
pub fn sender_name<'a>(message: &'a ChatMessage, bundle: &'a LanguageBundle) -> &'a str {
    match &message.from {
        None => bundle.unidentified_user.as_str(),
        Some(from) => from.display_name().unwrap_or(bundle.unknown_user.as_str()),
    }
}

pub fn build_report(input: &ReportInput<'_>, pb: &ProgressBar) -> Vec<Block> {
    let texts = input.bundle;
    let mut blocks = vec![
        Block::Title(texts.document_title.clone()),
        Block::Heading(texts.document_subtitle.clone()),
        Block::Spacer(6.0),
    ];

    let participants = if input.participants.is_empty() {
        UNKNOWN_PARTICIPANTS.to_string()
    } else {
        input.participants.join(", ")
    };
    blocks.push(Block::Table(vec![
        (
            texts.export_date.clone(),
            input.generated_at.format(DISPLAY_FORMAT).to_string(),
        ),
        (texts.original_file.clone(), input.source_file.to_string()),
        (texts.total_messages.clone(), input.messages.len().to_string()),
        (texts.conversation_with.clone(), participants),
    ]));
    blocks.push(Block::Spacer(6.0));

    custody_section(&mut blocks, input.ledger, texts);
    blocks.push(Block::Spacer(6.0));

    blocks.push(Block::Heading(texts.authenticity_declaration.clone()));
    blocks.push(Block::text(texts.authenticity_text.clone(), Font::Regular, BODY_SIZE));
    blocks.push(Block::Spacer(6.0));

    blocks.push(Block::Heading(texts.complete_conversation.clone()));
    blocks.push(Block::Spacer(4.0));

    pb.set_length(input.messages.len() as u64);
    for (i, raw) in input.messages.iter().enumerate() {
        let ordinal = i + 1;
        message_blocks(&mut blocks, ordinal, &ChatMessage::view(raw), texts);
        if ordinal % SEPARATOR_EVERY == 0 {
            blocks.push(Block::Rule);
            blocks.push(Block::Spacer(3.0));
        }
        pb.inc(1);
    }

    blocks.push(Block::Heading(texts.final_certificate.clone()));
    blocks.push(Block::text(
        format!(
            "{} {}",
            texts.certification_date,
            input.generated_at.format(DISPLAY_FORMAT)
        ),
        Font::Regular,
        BODY_SIZE,
    ));
    blocks.push(Block::text(
        texts.final_certificate_text.clone(),
        Font::Regular,
        BODY_SIZE,
    ));
    blocks
}

fn custody_section(blocks: &mut Vec<Block>, ledger: &CustodyLedger, texts: &LanguageBundle) {
    let meta = &ledger.session_metadata;
    blocks.push(Block::Heading(texts.chain_of_custody.clone()));
    blocks.push(Block::text(texts.session_metadata.clone(), Font::Regular, BODY_SIZE));
    for line in [
        format!("Session ID: {}", meta.session_id),
        format!("Chat ID: {}", meta.chat_id),
        format!("Export Time: {}", meta.export_timestamp.to_rfc3339()),
        format!("API Endpoint: {}", meta.api_endpoint),
        format!("Total Pages: {}", ledger.total_pages),
    ] {
        blocks.push(Block::text(line, Font::Mono, META_SIZE));
    }
    blocks.push(Block::Spacer(3.0));

    blocks.push(Block::text(texts.api_response_hash.clone(), Font::Regular, BODY_SIZE));
    for page in &ledger.page_hashes {
        blocks.push(Block::text(
            format!("Page {}: {}", page.page, page.response_hash),
            Font::Mono,
            META_SIZE,
        ));
    }
    blocks.push(Block::Spacer(3.0));
    blocks.push(Block::text(
        format!("Master Hash: {}", ledger.master_hash),
        Font::Mono,
        META_SIZE,
    ));
}

fn message_blocks(
    blocks: &mut Vec<Block>,
    ordinal: usize,
    message: &ChatMessage,
    texts: &LanguageBundle,
) {
    let timestamp = message
        .created_date_time
        .as_deref()
        .map(format_timestamp)
        .unwrap_or_default();
    let paragraph = |spans| Block::Paragraph {
        spans,
        size: BODY_SIZE,
        indent: MESSAGE_INDENT,
    };

    blocks.push(paragraph(vec![
        Span::new(format!("{} {}", texts.message, ordinal), Font::Bold),
        Span::new(format!("- {timestamp}"), Font::Regular),
    ]));
    blocks.push(paragraph(vec![
        Span::new(texts.from.as_str(), Font::Bold),
        Span::new(sender_name(message, texts), Font::Regular),
    ]));
    blocks.push(paragraph(vec![Span::new(texts.content.as_str(), Font::Bold)]));
    blocks.push(paragraph(vec![Span::new(
        clean_html(message.content()),
        Font::Regular,
    )]));
    blocks.push(Block::Spacer(3.5));
}

/// Build, lay out and draw the report.
pub fn render_pdf(input: &ReportInput<'_>, pb: &ProgressBar) -> Result<Vec<u8>, PdfError> {
    let blocks = build_report(input, pb);
    let pages = layout::layout(&blocks, Geometry::A4);
    pdf::write_pdf(&pages, &input.bundle.document_title, Geometry::A4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::{PageHashRecord, SessionMetadata};
    use serde_json::json;

    fn ledger(messages: usize) -> CustodyLedger {
        let page = PageHashRecord::new(1, "https://x", 200, b"{}", messages);
        CustodyLedger::build(vec![page], SessionMetadata::start("19:c"), messages, Utc::now())
    }

    fn report(messages: &[RawMessage], participants: &[String]) -> Vec<Block> {
        let ledger = ledger(messages.len());
        let bundle = LanguageBundle::english();
        let input = ReportInput {
            messages,
            ledger: &ledger,
            participants,
            bundle: &bundle,
            source_file: "complete_conversation_20240115_103000.json",
            generated_at: Local::now(),
        };
        build_report(&input, &ProgressBar::hidden())
    }

    fn table(blocks: &[Block]) -> &[(String, String)] {
        blocks
            .iter()
            .find_map(|b| match b {
                Block::Table(rows) => Some(rows.as_slice()),
                _ => None,
            })
            .unwrap()
    }

    fn all_text(blocks: &[Block]) -> Vec<String> {
        blocks
            .iter()
            .filter_map(|b| match b {
                Block::Paragraph { spans, .. } => {
                    Some(spans.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" "))
                }
                Block::Title(t) | Block::Heading(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    fn messages(n: usize) -> Vec<RawMessage> {
        (0..n)
            .map(|i| {
                json!({
                    "id": i.to_string(),
                    "createdDateTime": "2024-01-15T10:30:00Z",
                    "from": {"user": {"displayName": "Alice"}},
                    "body": {"contentType": "html", "content": format!("<p>message {i}</p>")}
                })
            })
            .collect()
    }

    #[test]
    fn rfc3339_with_z_parses() {
        let ts = parse_timestamp("2024-01-15T10:30:00Z").unwrap();
        assert_eq!(ts.with_timezone(&Utc).to_rfc3339(), "2024-01-15T10:30:00+00:00");
        assert!(parse_timestamp("2024-01-15T10:30:00.123+02:00").is_some());
        assert!(parse_timestamp("2024-01-15T10:30:00.1234567").is_some());
    }

    #[test]
    fn unparseable_timestamp_is_shown_verbatim() {
        assert!(parse_timestamp("not-a-date").is_none());
        assert_eq!(format_timestamp("not-a-date"), "not-a-date");
    }

    #[test]
    fn valid_timestamp_uses_display_format() {
        let expected = Utc
            .with_ymd_and_hms(2024, 1, 15, 10, 30, 0)
            .unwrap()
            .with_timezone(&Local)
            .format(DISPLAY_FORMAT)
            .to_string();
        assert_eq!(format_timestamp("2024-01-15T10:30:00Z"), expected);
    }

    #[test]
    fn sender_placeholders_are_distinct() {
        let bundle = LanguageBundle::english();
        let missing = ChatMessage::view(&json!({"from": null}));
        let unnamed = ChatMessage::view(&json!({"from": {"user": {"id": "u1"}}}));
        let named = ChatMessage::view(&json!({"from": {"user": {"displayName": "Bob"}}}));
        assert_eq!(sender_name(&missing, &bundle), "Unidentified user");
        assert_eq!(sender_name(&unnamed, &bundle), "Unknown user");
        assert_eq!(sender_name(&named, &bundle), "Bob");
    }

    #[test]
    fn table_message_count_matches_export() {
        for n in [0, 1, 9, 10, 257] {
            let msgs = messages(n);
            let blocks = report(&msgs, &["Alice".to_string()]);
            let rows = table(&blocks);
            assert_eq!(rows[2].1, n.to_string());
        }
    }

    #[test]
    fn empty_participants_use_placeholder() {
        let blocks = report(&[], &[]);
        assert_eq!(table(&blocks)[3].1, UNKNOWN_PARTICIPANTS);
        let blocks = report(&[], &["A".to_string(), "B".to_string()]);
        assert_eq!(table(&blocks)[3].1, "A, B");
    }

    #[test]
    fn separator_after_every_tenth_message() {
        let blocks = report(&messages(25), &[]);
        let rules = blocks.iter().filter(|b| matches!(b, Block::Rule)).count();
        assert_eq!(rules, 2);
    }

    #[test]
    fn sections_appear_in_order() {
        let msgs = vec![json!({
            "createdDateTime": "garbage",
            "from": null,
            "body": {"content": "<p style='x'>Hello&nbsp;World</p>"}
        })];
        let text = all_text(&report(&msgs, &[]));
        let position = |needle: &str| {
            text.iter()
                .position(|t| t.contains(needle))
                .unwrap_or_else(|| panic!("missing {needle}"))
        };
        let order = [
            position("MICROSOFT TEAMS CONVERSATION"),
            position("CHAIN OF CUSTODY CERTIFICATE"),
            position("Master Hash:"),
            position("AUTHENTICITY DECLARATION"),
            position("COMPLETE CONVERSATION"),
            position("MESSAGE 1 - garbage"),
            position("From: Unidentified user"),
            position("Hello World"),
            position("FINAL CERTIFICATE"),
        ];
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{order:?}");
    }

    #[test]
    fn every_page_digest_is_listed() {
        let pages: Vec<_> = (1..=3)
            .map(|i| PageHashRecord::new(i, "https://x", 200, format!("p{i}").as_bytes(), 0))
            .collect();
        let ledger = CustodyLedger::build(pages, SessionMetadata::start("19:c"), 0, Utc::now());
        let bundle = LanguageBundle::english();
        let input = ReportInput {
            messages: &[],
            ledger: &ledger,
            participants: &[],
            bundle: &bundle,
            source_file: "x.json",
            generated_at: Local::now(),
        };
        let text = all_text(&build_report(&input, &ProgressBar::hidden()));
        for record in &ledger.page_hashes {
            let line = format!("Page {}: {}", record.page, record.response_hash);
            assert!(text.contains(&line));
        }
        assert!(text.contains(&format!("Master Hash: {}", ledger.master_hash)));
    }

    #[test]
    fn render_produces_pdf_bytes() {
        let msgs = messages(30);
        let ledger = ledger(msgs.len());
        let bundle = LanguageBundle::english();
        let input = ReportInput {
            messages: &msgs,
            ledger: &ledger,
            participants: &[],
            bundle: &bundle,
            source_file: "x.json",
            generated_at: Local::now(),
        };
        let bytes = render_pdf(&input, &ProgressBar::hidden()).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}
