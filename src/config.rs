use crate::collector::{CollectOptions, DEFAULT_PAGE_DELAY, DEFAULT_PAGE_SIZE};
use crate::export::{DEFAULT_OUTPUT_DIR, DEFAULT_PDF_NAME};
use crate::graph::{BearerToken, DEFAULT_API_BASE, DEFAULT_TIMEOUT};
use crate::i18n::{DEFAULT_LANGUAGE_FILE, Language};
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const CONFIG_RELATIVE_PATH: &str = "teams-chat-export/config.toml";

/// Optional settings from `config.toml`.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub output_dir: Option<PathBuf>,
    pub pdf_path: Option<PathBuf>,
    pub language_file: Option<PathBuf>,
    pub language: Option<Language>,
    pub api_base: Option<Url>,
    pub page_size: Option<usize>,
    pub page_delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_RELATIVE_PATH))
}

/// Load the config file: an explicit path must exist, the default location
/// is optional.
pub fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        default_config_path().filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

/// Everything the export pipeline needs, independent of where each value
/// came from (flag, config file, prompt or default).
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub chat_id: Option<String>,
    pub token: Option<BearerToken>,
    pub language: Option<Language>,
    pub output_dir: PathBuf,
    pub pdf_path: PathBuf,
    pub language_file: PathBuf,
    pub api_base: Url,
    pub collect: CollectOptions,
    pub timeout: Duration,
    pub render_pdf: bool,
    pub quiet: bool,
}

/// Values given on the command line; each one overrides the config file.
#[derive(Debug, Default)]
pub struct ExportOverrides {
    pub chat_id: Option<String>,
    pub token: Option<String>,
    pub language: Option<Language>,
    pub output_dir: Option<PathBuf>,
    pub pdf_path: Option<PathBuf>,
    pub language_file: Option<PathBuf>,
    pub api_base: Option<Url>,
    pub page_delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub no_pdf: bool,
    pub quiet: bool,
}

impl ExportConfig {
    /// Resolve CLI > config file > default.
    pub fn resolve(cli: ExportOverrides, file: FileConfig) -> Result<Self> {
        let output_dir = cli
            .output_dir
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let pdf_path = cli
            .pdf_path
            .or(file.pdf_path)
            .unwrap_or_else(|| output_dir.join(DEFAULT_PDF_NAME));
        let language_file = cli
            .language_file
            .or(file.language_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LANGUAGE_FILE));

        let api_base = match cli.api_base.or(file.api_base) {
            Some(url) => url,
            None => Url::parse(DEFAULT_API_BASE).wrap_err("Invalid default API base")?,
        };
        if !matches!(api_base.scheme(), "http" | "https") {
            return Err(eyre!("API base must be an http(s) URL: {}", api_base));
        }

        let page_size = file.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(eyre!("page_size must be at least 1"));
        }
        let page_delay = cli
            .page_delay_ms
            .or(file.page_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PAGE_DELAY);
        let timeout = cli
            .timeout_secs
            .or(file.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let token = match cli.token {
            Some(raw) => Some(
                BearerToken::parse(&raw).ok_or_else(|| eyre!("The provided token is empty"))?,
            ),
            None => None,
        };

        Ok(Self {
            chat_id: cli.chat_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty()),
            token,
            language: cli.language.or(file.language),
            output_dir,
            pdf_path,
            language_file,
            api_base,
            collect: CollectOptions {
                page_size,
                page_delay,
            },
            timeout,
            render_pdf: !cli.no_pdf,
            quiet: cli.quiet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_overrides() {
        let cfg = ExportConfig::resolve(ExportOverrides::default(), FileConfig::default()).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("exported_messages"));
        assert_eq!(cfg.pdf_path, PathBuf::from("exported_messages/teams_conversation.pdf"));
        assert_eq!(cfg.language_file, PathBuf::from("language_config.json"));
        assert_eq!(cfg.api_base.as_str(), "https://graph.microsoft.com/v1.0");
        assert_eq!(cfg.collect.page_size, 50);
        assert_eq!(cfg.collect.page_delay, Duration::from_secs(1));
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert!(cfg.render_pdf);
        assert!(cfg.chat_id.is_none() && cfg.token.is_none() && cfg.language.is_none());
    }

    #[test]
    fn cli_beats_file_beats_default() {
        let file: FileConfig = toml::from_str(
            r#"
            output_dir = "from-file"
            language = "es"
            page_delay_ms = 250
            page_size = 20
            "#,
        )
        .unwrap();
        let cli = ExportOverrides {
            output_dir: Some(PathBuf::from("from-cli")),
            language: Some(Language::De),
            ..ExportOverrides::default()
        };
        let cfg = ExportConfig::resolve(cli, file).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("from-cli"));
        assert_eq!(cfg.pdf_path, PathBuf::from("from-cli/teams_conversation.pdf"));
        assert_eq!(cfg.language, Some(Language::De));
        assert_eq!(cfg.collect.page_delay, Duration::from_millis(250));
        assert_eq!(cfg.collect.page_size, 20);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let file: FileConfig = toml::from_str("page_size = 0").unwrap();
        assert!(ExportConfig::resolve(ExportOverrides::default(), file).is_err());

        let cli = ExportOverrides {
            token: Some("Bearer ".into()),
            ..ExportOverrides::default()
        };
        assert!(ExportConfig::resolve(cli, FileConfig::default()).is_err());

        let cli = ExportOverrides {
            api_base: Some(Url::parse("ftp://example.com").unwrap()),
            ..ExportOverrides::default()
        };
        assert!(ExportConfig::resolve(cli, FileConfig::default()).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("colour = \"blue\"").is_err());
    }

    #[test]
    fn explicit_config_must_exist() {
        assert!(load_file_config(Some(Path::new("/nonexistent/config.toml"))).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout_secs = 5").unwrap();
        let cfg = load_file_config(Some(file.path())).unwrap();
        assert_eq!(cfg.timeout_secs, Some(5));
    }
}
