use crate::collector::{self, Collection};
use crate::config::ExportConfig;
use crate::custody::{CustodyLedger, SessionMetadata};
use crate::export::{self, ExportFiles, ExportManifest};
use crate::graph::{FetchError, GraphClient, HttpTransport, Transport};
use crate::i18n::{Bundles, Language};
use crate::participants;
use crate::prompt::Prompter;
use crate::render::{self, ReportInput};
use chrono::{Local, Utc};
use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// What a finished export produced.
#[derive(Debug)]
pub struct ExportSummary {
    pub files: ExportFiles,
    pub pdf: Option<PathBuf>,
    pub language: Option<Language>,
    pub total_messages: usize,
    pub total_pages: usize,
    pub master_hash: String,
    pub participants: Vec<String>,
}

fn spinner(quiet: bool, message: &str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let s = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})") {
        s.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]));
    }
    s.set_message(message.to_string());
    s.enable_steady_tick(Duration::from_millis(80));
    s
}

fn bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
    {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar
}

/// True when the run failed because the API rejected the token.
pub fn is_credential_error(report: &eyre::Report) -> bool {
    report
        .downcast_ref::<FetchError>()
        .is_some_and(FetchError::is_unauthorized)
}

/// Interactive entry point: prompts for whatever the config left open, then
/// runs the export over HTTP.
pub fn execute(config: ExportConfig) -> Result<ExportSummary> {
    let stdin = std::io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), std::io::stdout());

    let chat_id = match config.chat_id.clone() {
        Some(id) => id,
        None => prompter.chat_id()?,
    };
    let token = match config.token.clone() {
        Some(t) => t,
        None => prompter.token()?,
    };

    let transport =
        HttpTransport::new(token, config.timeout).wrap_err("Failed to build HTTP client")?;
    let client = GraphClient::new(transport, config.api_base.as_str());
    run(&client, &chat_id, &config, &mut prompter)
}

/// The export itself, over any transport.
pub fn run<T, R, W>(
    client: &GraphClient<T>,
    chat_id: &str,
    config: &ExportConfig,
    prompter: &mut Prompter<R, W>,
) -> Result<ExportSummary>
where
    T: Transport,
    R: BufRead,
    W: Write,
{
    let started = Local::now();
    let session = SessionMetadata::start(chat_id);
    info!(chat_id, session = %session.session_id, "starting export");

    let pb = spinner(config.quiet, "Getting participants...");
    let resolved = participants::resolve(client, chat_id);
    pb.finish_and_clear();
    let participants = resolved.wrap_err("Failed to resolve chat participants")?;
    let names = participants::display_names(&participants);
    if participants.is_empty() {
        warn!("could not retrieve participants");
    }

    let pb = spinner(config.quiet, "Exporting...");
    let collected = collector::collect(client, chat_id, config.collect, &pb);
    pb.finish_and_clear();
    let Collection { messages, pages } = collected.wrap_err("Message export failed")?;
    info!(messages = messages.len(), pages = pages.len(), "export completed");

    let ledger = CustodyLedger::build(pages, session, messages.len(), Utc::now());

    let files = ExportFiles::new(&config.output_dir, started);
    export::write_json(&files.messages, &messages)?;
    let manifest = ExportManifest {
        participants,
        chain_of_custody: ledger,
    };
    export::write_json(&files.manifest, &manifest)?;
    info!(path = %files.messages.display(), "saved messages");

    let mut summary = ExportSummary {
        total_messages: messages.len(),
        total_pages: manifest.chain_of_custody.total_pages,
        master_hash: manifest.chain_of_custody.master_hash.clone(),
        participants: names,
        files,
        pdf: None,
        language: None,
    };

    if config.render_pdf {
        let language = match config.language {
            Some(l) => l,
            None => prompter.language()?,
        };
        render_report(
            &summary.files.messages,
            &messages,
            &manifest,
            language,
            &config.language_file,
            &config.pdf_path,
            config.quiet,
        )?;
        summary.pdf = Some(config.pdf_path.clone());
        summary.language = Some(language);
    }

    Ok(summary)
}

/// Render the PDF for an export that is already on disk.
pub fn render_from_files(
    messages_path: &Path,
    manifest_path: Option<&Path>,
    language: Language,
    language_file: &Path,
    pdf_path: &Path,
    quiet: bool,
) -> Result<()> {
    let messages = export::read_messages(messages_path)?;
    let manifest_path = manifest_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| export::manifest_path_for(messages_path));
    let manifest = export::read_manifest(&manifest_path)?;
    render_report(
        messages_path,
        &messages,
        &manifest,
        language,
        language_file,
        pdf_path,
        quiet,
    )
}

fn render_report(
    messages_path: &Path,
    messages: &[serde_json::Value],
    manifest: &ExportManifest,
    language: Language,
    language_file: &Path,
    pdf_path: &Path,
    quiet: bool,
) -> Result<()> {
    let bundles = Bundles::load(language_file)?;
    let bundle = bundles.select(language);
    let names = participants::display_names(&manifest.participants);
    let source_file = export::display_file_name(messages_path);

    let input = ReportInput {
        messages,
        ledger: &manifest.chain_of_custody,
        participants: &names,
        bundle: &bundle,
        source_file: &source_file,
        generated_at: Local::now(),
    };

    let pb = bar(quiet);
    let bytes = render::render_pdf(&input, &pb)?;
    pb.finish_and_clear();

    export::write_bytes(pdf_path, &bytes)
        .wrap_err_with(|| format!("Failed to write PDF: {}", pdf_path.display()))?;
    info!(path = %pdf_path.display(), language = %language, "PDF generated");
    Ok(())
}

/// Outcome of checking an export's manifest.
#[derive(Debug)]
pub struct Verification {
    pub problems: Vec<String>,
    pub master_hash: String,
    pub total_pages: usize,
    pub total_messages: usize,
}

pub fn verify(manifest_path: &Path, messages_path: Option<&Path>) -> Result<Verification> {
    let manifest = export::read_manifest(manifest_path)?;
    let ledger = &manifest.chain_of_custody;
    let mut problems: Vec<String> = ledger.verify().iter().map(ToString::to_string).collect();

    if let Some(path) = messages_path {
        let messages = export::read_messages(path)?;
        if messages.len() != ledger.total_messages {
            problems.push(format!(
                "{} holds {} messages but the ledger records {}",
                export::display_file_name(path),
                messages.len(),
                ledger.total_messages
            ));
        }
    }

    Ok(Verification {
        problems,
        master_hash: ledger.master_hash.clone(),
        total_pages: ledger.total_pages,
        total_messages: ledger.total_messages,
    })
}
