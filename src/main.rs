use clap::{Args, Parser, Subcommand};
use eyre::{Result, eyre};
use std::path::PathBuf;
use std::process::ExitCode;
use teams_chat_export::config::{self, ExportConfig, ExportOverrides, FileConfig};
use teams_chat_export::export;
use teams_chat_export::i18n::{DEFAULT_LANGUAGE_FILE, Language};
use teams_chat_export::pipeline::{self, ExportSummary};
use teams_chat_export::prompt::Prompter;
use tracing_subscriber::EnvFilter;
use url::Url;

const CREDENTIAL_EXIT: u8 = 2;

/// Export a Microsoft Teams chat to JSON and a certified PDF report.
/// Run without a command for the interactive export.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/teams-chat-export/config.toml
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log each page and milestone to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress progress bars and the final summary.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the chat, write the JSON export and render the report (default).
    Export(ExportArgs),
    /// Render the PDF report from an existing export.
    Render(RenderArgs),
    /// Check the chain-of-custody ledger of an existing export.
    Verify(VerifyArgs),
}

#[derive(Args, Default)]
struct ExportArgs {
    /// Chat id (19:...). Prompted for if omitted.
    #[arg(long, value_name = "ID")]
    chat_id: Option<String>,

    /// Graph access token, with or without the "Bearer " prefix.
    /// Prompted for if omitted.
    #[arg(long, env = "TEAMS_EXPORT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Report language: en, es, fr or de. Prompted for if omitted.
    #[arg(long, value_name = "CODE")]
    language: Option<Language>,

    /// Directory for the JSON export and its custody manifest.
    /// Defaults to ./exported_messages if not set in config.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Where to write the PDF report.
    #[arg(long, value_name = "PATH")]
    pdf: Option<PathBuf>,

    /// Label translations (JSON, TOML or YAML).
    #[arg(long, value_name = "PATH")]
    language_file: Option<PathBuf>,

    /// Pause between pages, in milliseconds.
    #[arg(long, value_name = "MS")]
    page_delay_ms: Option<u64>,

    /// Per-request timeout, in seconds.
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Graph API base URL.
    #[arg(long, value_name = "URL")]
    api_base: Option<Url>,

    /// Only write the JSON export.
    #[arg(long)]
    no_pdf: bool,
}

#[derive(Args)]
struct RenderArgs {
    /// The complete_conversation_*.json file.
    #[arg(long, value_name = "JSON")]
    messages: PathBuf,

    /// Custody manifest. Defaults to the .custody.json next to the messages.
    #[arg(long, value_name = "MANIFEST")]
    manifest: Option<PathBuf>,

    /// Report language: en, es, fr or de. Prompted for if omitted.
    #[arg(long, value_name = "CODE")]
    language: Option<Language>,

    /// Where to write the PDF report.
    #[arg(long, value_name = "PATH")]
    pdf: Option<PathBuf>,

    /// Label translations (JSON, TOML or YAML).
    #[arg(long, value_name = "PATH")]
    language_file: Option<PathBuf>,
}

#[derive(Args)]
struct VerifyArgs {
    /// Custody manifest to check.
    #[arg(long, value_name = "MANIFEST")]
    manifest: PathBuf,

    /// Also check the message count of this export.
    #[arg(long, value_name = "JSON")]
    messages: Option<PathBuf>,
}

fn init_tracing(verbose: bool, quiet: bool) {
    let fallback = if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // Config file (CLI path > default path)
    let file_cfg = config::load_file_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Export(ExportArgs::default())) {
        Command::Export(args) => export_chat(args, file_cfg, cli.quiet),
        Command::Render(args) => render(args, file_cfg, cli.quiet),
        Command::Verify(args) => verify(args, cli.quiet),
    }
}

fn export_chat(args: ExportArgs, file_cfg: FileConfig, quiet: bool) -> Result<ExitCode> {
    let overrides = ExportOverrides {
        chat_id: args.chat_id,
        token: args.token,
        language: args.language,
        output_dir: args.output_dir,
        pdf_path: args.pdf,
        language_file: args.language_file,
        api_base: args.api_base,
        page_delay_ms: args.page_delay_ms,
        timeout_secs: args.timeout_secs,
        no_pdf: args.no_pdf,
        quiet,
    };
    let config = ExportConfig::resolve(overrides, file_cfg)?;

    match pipeline::execute(config) {
        Ok(summary) => {
            if !quiet {
                print_summary(&summary);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(report) if pipeline::is_credential_error(&report) => {
            eprintln!("Error: {report:#}");
            eprintln!("Get a new token from Graph Explorer and try again.");
            Ok(ExitCode::from(CREDENTIAL_EXIT))
        }
        Err(report) => Err(report),
    }
}

fn print_summary(summary: &ExportSummary) {
    println!("=== EXPORT COMPLETE ===");
    println!("JSON: {}", summary.files.messages.display());
    println!("Custody manifest: {}", summary.files.manifest.display());
    if let (Some(pdf), Some(language)) = (&summary.pdf, summary.language) {
        println!("PDF: {} ({})", pdf.display(), language.name());
    }
    println!("Messages: {}", summary.total_messages);
    println!("Pages: {}", summary.total_pages);
    println!("Master hash: {}", summary.master_hash);
    println!("Participants: {}", summary.participants.join(", "));
}

fn render(args: RenderArgs, file_cfg: FileConfig, quiet: bool) -> Result<ExitCode> {
    let language = match args.language.or(file_cfg.language) {
        Some(l) => l,
        None => {
            let stdin = std::io::stdin();
            Prompter::new(stdin.lock(), std::io::stdout()).language()?
        }
    };
    let pdf_path = match args.pdf.or(file_cfg.pdf_path) {
        Some(p) => p,
        None => args.messages.with_file_name(export::DEFAULT_PDF_NAME),
    };
    let language_file = args
        .language_file
        .or(file_cfg.language_file)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LANGUAGE_FILE));

    pipeline::render_from_files(
        &args.messages,
        args.manifest.as_deref(),
        language,
        &language_file,
        &pdf_path,
        quiet,
    )?;
    if !quiet {
        println!("PDF: {} ({})", pdf_path.display(), language.name());
    }
    Ok(ExitCode::SUCCESS)
}

fn verify(args: VerifyArgs, quiet: bool) -> Result<ExitCode> {
    let report = pipeline::verify(&args.manifest, args.messages.as_deref())?;
    if !report.problems.is_empty() {
        for problem in &report.problems {
            eprintln!("- {problem}");
        }
        return Err(eyre!(
            "{} failed verification with {} problem(s)",
            args.manifest.display(),
            report.problems.len()
        ));
    }
    if !quiet {
        println!("Ledger OK");
        println!("Pages: {}", report.total_pages);
        println!("Messages: {}", report.total_messages);
        println!("Master hash: {}", report.master_hash);
    }
    Ok(ExitCode::SUCCESS)
}
