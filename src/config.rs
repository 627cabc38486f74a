use anyhow::{bail, Context};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::metadata::fetchers::URL_PLACEHOLDER;
use crate::metadata::ParserKind;
use crate::template::TemplateKind;
use crate::vault::FsVault;

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_PRIMARY: &str = "microlink";
const DEFAULT_BACKUP: &str = "jsonlink";
const DEFAULT_ATTACHMENTS_DIR: &str = "attachments";
const DEFAULT_FALLBACK_EXTENSION: &str = "jpg";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

/// Request templates for the metadata services. `{{{url}}}` is replaced by
/// the link being embedded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_jsonlink")]
    pub jsonlink: String,
    #[serde(default = "default_microlink")]
    pub microlink: String,
    #[serde(default = "default_iframely")]
    pub iframely: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            jsonlink: default_jsonlink(),
            microlink: default_microlink(),
            iframely: default_iframely(),
        }
    }
}

fn default_jsonlink() -> String {
    "https://jsonlink.io/api/extract?url={{{url}}}".to_string()
}

fn default_microlink() -> String {
    "https://api.microlink.io?url={{{url}}}&palette=true&audio=true&video=true&iframe=true"
        .to_string()
}

fn default_iframely() -> String {
    "http://iframely.server.crestify.com/iframely?url={{{url}}}".to_string()
}

/// Settings for the page-scraping parser.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Render the page in headless Chromium before falling back to a plain request
    #[serde(default)]
    pub use_browser: bool,

    /// Chromium binary, `None` lets the launcher search for one
    #[serde(default)]
    pub chrome_path: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_primary")]
    pub primary: String,
    #[serde(default = "default_backup")]
    pub backup: String,

    /// Replace the selected link instead of keeping it above the embed
    #[serde(default)]
    pub in_place: bool,

    /// Pause before swapping the placeholder for the final block, in milliseconds
    #[serde(default)]
    pub delay_ms: u64,

    #[serde(default)]
    pub enable_error_wrapping: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_attachments_dir")]
    pub attachments_dir: String,

    #[serde(default)]
    pub template: TemplateKind,

    #[serde(default = "default_fallback_extension")]
    pub fallback_extension: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub local: LocalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            backup: default_backup(),
            in_place: false,
            delay_ms: 0,
            enable_error_wrapping: false,
            log_level: default_log_level(),
            attachments_dir: default_attachments_dir(),
            template: TemplateKind::default(),
            fallback_extension: default_fallback_extension(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            providers: ProvidersConfig::default(),
            local: LocalConfig::default(),
        }
    }
}

fn default_primary() -> String {
    DEFAULT_PRIMARY.to_string()
}

fn default_backup() -> String {
    DEFAULT_BACKUP.to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_attachments_dir() -> String {
    DEFAULT_ATTACHMENTS_DIR.to_string()
}

fn default_fallback_extension() -> String {
    DEFAULT_FALLBACK_EXTENSION.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.primary
            .parse::<ParserKind>()
            .with_context(|| "primary parser")?;
        self.backup
            .parse::<ParserKind>()
            .with_context(|| "backup parser")?;

        for (name, template) in [
            ("jsonlink", &self.providers.jsonlink),
            ("microlink", &self.providers.microlink),
            ("iframely", &self.providers.iframely),
        ] {
            if !template.contains(URL_PLACEHOLDER) {
                bail!("providers.{name} must contain {URL_PLACEHOLDER}");
            }
        }

        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than 0");
        }

        if self.attachments_dir.trim().is_empty() {
            bail!("attachments_dir cannot be empty");
        }

        self.level_filter()?;
        Ok(())
    }

    pub fn level_filter(&self) -> anyhow::Result<LevelFilter> {
        self.log_level
            .parse::<LevelFilter>()
            .with_context(|| format!("invalid log_level {:?}", self.log_level))
    }

    /// `[primary, backup]`, the chain used by the default embed command.
    pub fn default_chain(&self) -> anyhow::Result<Vec<ParserKind>> {
        let primary = self.primary.parse::<ParserKind>()?;
        let backup = self.backup.parse::<ParserKind>()?;
        Ok(vec![primary, backup])
    }

    /// Loads `config.yaml` from the vault, writing defaults when missing and
    /// re-saving when the stored file lacks newer keys.
    pub fn load_with(vault: &FsVault) -> anyhow::Result<Self> {
        if !vault.exists(CONFIG_FILE) {
            vault.write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str =
            String::from_utf8(vault.read(CONFIG_FILE)?).context("config file is not valid utf8")?;
        let config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.validate()?;

        if config_str != serde_yml::to_string(&config)? {
            config.save(vault)?;
        }

        Ok(config)
    }

    pub fn save(&self, vault: &FsVault) -> anyhow::Result<()> {
        let config_str = serde_yml::to_string(&self)?;
        vault.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }
}
