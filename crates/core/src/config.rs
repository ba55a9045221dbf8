use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub nlu: NluConfig,
    pub numbers: NumbersConfig,
    pub server: ServerConfig,
    pub broadcast: BroadcastConfig,
    pub conversation: ConversationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    pub verification_token: SecretString,
    pub slash_command: String,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct NluConfig {
    pub access_token: SecretString,
    pub base_url: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct NumbersConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct BroadcastConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    pub webhook_urls: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub session_idle_secs: u64,
    pub ambient_mode: AmbientMode,
    pub decorate_facts: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// How the bot reacts to a bare number posted in a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbientMode {
    /// Offer General / Math / Date buttons and answer on click.
    Buttons,
    /// Answer with the general fact right away.
    Immediate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_verification_token: Option<String>,
    pub nlu_access_token: Option<String>,
    pub numbers_base_url: Option<String>,
    pub server_port: Option<u16>,
    pub broadcast_enabled: Option<bool>,
    pub ambient_mode: Option<AmbientMode>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                bot_token: String::new().into(),
                verification_token: String::new().into(),
                slash_command: "/trivia".to_string(),
                api_base_url: "https://slack.com/api".to_string(),
            },
            nlu: NluConfig {
                access_token: String::new().into(),
                base_url: "https://api.wit.ai".to_string(),
                api_version: "20240304".to_string(),
                timeout_secs: 10,
            },
            numbers: NumbersConfig {
                base_url: "http://numbersapi.com".to_string(),
                timeout_secs: 5,
                max_retries: 1,
                retry_backoff_ms: 250,
            },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: 3000 },
            broadcast: BroadcastConfig {
                enabled: true,
                interval_ms: 86_400_000,
                webhook_urls: Vec::new(),
            },
            conversation: ConversationConfig {
                session_idle_secs: 900,
                ambient_mode: AmbientMode::Buttons,
                decorate_facts: true,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for AmbientMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "buttons" => Ok(Self::Buttons),
            "immediate" => Ok(Self::Immediate),
            other => Err(ConfigError::Validation(format!(
                "unsupported ambient mode `{other}` (expected buttons|immediate)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("triviabot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(bot_token) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token);
            }
            if let Some(verification_token) = slack.verification_token {
                self.slack.verification_token = secret_value(verification_token);
            }
            if let Some(slash_command) = slack.slash_command {
                self.slack.slash_command = slash_command;
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
        }

        if let Some(nlu) = patch.nlu {
            if let Some(access_token) = nlu.access_token {
                self.nlu.access_token = secret_value(access_token);
            }
            if let Some(base_url) = nlu.base_url {
                self.nlu.base_url = base_url;
            }
            if let Some(api_version) = nlu.api_version {
                self.nlu.api_version = api_version;
            }
            if let Some(timeout_secs) = nlu.timeout_secs {
                self.nlu.timeout_secs = timeout_secs;
            }
        }

        if let Some(numbers) = patch.numbers {
            if let Some(base_url) = numbers.base_url {
                self.numbers.base_url = base_url;
            }
            if let Some(timeout_secs) = numbers.timeout_secs {
                self.numbers.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = numbers.max_retries {
                self.numbers.max_retries = max_retries;
            }
            if let Some(retry_backoff_ms) = numbers.retry_backoff_ms {
                self.numbers.retry_backoff_ms = retry_backoff_ms;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(broadcast) = patch.broadcast {
            if let Some(enabled) = broadcast.enabled {
                self.broadcast.enabled = enabled;
            }
            if let Some(interval_ms) = broadcast.interval_ms {
                self.broadcast.interval_ms = interval_ms;
            }
            if let Some(webhook_urls) = broadcast.webhook_urls {
                self.broadcast.webhook_urls = webhook_urls;
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(session_idle_secs) = conversation.session_idle_secs {
                self.conversation.session_idle_secs = session_idle_secs;
            }
            if let Some(ambient_mode) = conversation.ambient_mode {
                self.conversation.ambient_mode = ambient_mode;
            }
            if let Some(decorate_facts) = conversation.decorate_facts {
                self.conversation.decorate_facts = decorate_facts;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TRIVIABOT_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        let verification_token = read_env("TRIVIABOT_SLACK_VERIFICATION_TOKEN")
            .or_else(|| read_env("SLACK_VERIFY_TOKEN"));
        if let Some(value) = verification_token {
            self.slack.verification_token = secret_value(value);
        }
        if let Some(value) = read_env("TRIVIABOT_SLACK_SLASH_COMMAND") {
            self.slack.slash_command = value;
        }
        if let Some(value) = read_env("TRIVIABOT_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }

        let access_token =
            read_env("TRIVIABOT_NLU_ACCESS_TOKEN").or_else(|| read_env("WIT_TOKEN"));
        if let Some(value) = access_token {
            self.nlu.access_token = secret_value(value);
        }
        if let Some(value) = read_env("TRIVIABOT_NLU_BASE_URL") {
            self.nlu.base_url = value;
        }
        if let Some(value) = read_env("TRIVIABOT_NLU_API_VERSION") {
            self.nlu.api_version = value;
        }
        if let Some(value) = read_env("TRIVIABOT_NLU_TIMEOUT_SECS") {
            self.nlu.timeout_secs = parse_u64("TRIVIABOT_NLU_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TRIVIABOT_NUMBERS_BASE_URL") {
            self.numbers.base_url = value;
        }
        if let Some(value) = read_env("TRIVIABOT_NUMBERS_TIMEOUT_SECS") {
            self.numbers.timeout_secs = parse_u64("TRIVIABOT_NUMBERS_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TRIVIABOT_NUMBERS_MAX_RETRIES") {
            self.numbers.max_retries = parse_u32("TRIVIABOT_NUMBERS_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("TRIVIABOT_NUMBERS_RETRY_BACKOFF_MS") {
            self.numbers.retry_backoff_ms =
                parse_u64("TRIVIABOT_NUMBERS_RETRY_BACKOFF_MS", &value)?;
        }

        if let Some(value) = read_env("TRIVIABOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TRIVIABOT_SERVER_PORT") {
            self.server.port = parse_u16("TRIVIABOT_SERVER_PORT", &value)?;
        } else if let Some(value) = read_env("PORT") {
            self.server.port = parse_u16("PORT", &value)?;
        }

        if let Some(value) = read_env("TRIVIABOT_BROADCAST_ENABLED") {
            self.broadcast.enabled = parse_bool("TRIVIABOT_BROADCAST_ENABLED", &value)?;
        }
        if let Some(value) = read_env("TRIVIABOT_BROADCAST_INTERVAL_MS") {
            self.broadcast.interval_ms = parse_u64("TRIVIABOT_BROADCAST_INTERVAL_MS", &value)?;
        } else if let Some(value) = read_env("SEND_TRIVIA_FREQ_MS") {
            self.broadcast.interval_ms = parse_u64("SEND_TRIVIA_FREQ_MS", &value)?;
        }
        if let Some(value) = read_env("TRIVIABOT_BROADCAST_WEBHOOK_URLS") {
            self.broadcast.webhook_urls = split_list(&value);
        }

        if let Some(value) = read_env("TRIVIABOT_CONVERSATION_SESSION_IDLE_SECS") {
            self.conversation.session_idle_secs =
                parse_u64("TRIVIABOT_CONVERSATION_SESSION_IDLE_SECS", &value)?;
        }
        if let Some(value) = read_env("TRIVIABOT_CONVERSATION_AMBIENT_MODE") {
            self.conversation.ambient_mode = value.parse()?;
        }
        if let Some(value) = read_env("TRIVIABOT_CONVERSATION_DECORATE_FACTS") {
            self.conversation.decorate_facts =
                parse_bool("TRIVIABOT_CONVERSATION_DECORATE_FACTS", &value)?;
        }

        let log_level =
            read_env("TRIVIABOT_LOGGING_LEVEL").or_else(|| read_env("TRIVIABOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TRIVIABOT_LOGGING_FORMAT").or_else(|| read_env("TRIVIABOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(bot_token);
        }
        if let Some(verification_token) = overrides.slack_verification_token {
            self.slack.verification_token = secret_value(verification_token);
        }
        if let Some(access_token) = overrides.nlu_access_token {
            self.nlu.access_token = secret_value(access_token);
        }
        if let Some(base_url) = overrides.numbers_base_url {
            self.numbers.base_url = base_url;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(enabled) = overrides.broadcast_enabled {
            self.broadcast.enabled = enabled;
        }
        if let Some(ambient_mode) = overrides.ambient_mode {
            self.conversation.ambient_mode = ambient_mode;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_nlu(&self.nlu)?;
        validate_numbers(&self.numbers)?;
        validate_server(&self.server)?;
        validate_broadcast(&self.broadcast)?;
        validate_conversation(&self.conversation)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("triviabot.toml"), PathBuf::from("config/triviabot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps \
             > Your App > OAuth & Permissions > Bot User OAuth Token"
                .to_string(),
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        return Err(ConfigError::Validation(
            "slack.bot_token must start with `xoxb-`. Get it from https://api.slack.com/apps"
                .to_string(),
        ));
    }

    if slack.verification_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.verification_token is required. Get it from https://api.slack.com/apps \
             > Your App > Basic Information > Verification Token"
                .to_string(),
        ));
    }

    let command = slack.slash_command.trim();
    if !command.starts_with('/') || command.len() < 2 || command.contains(char::is_whitespace) {
        return Err(ConfigError::Validation(
            "slack.slash_command must look like `/name` without whitespace".to_string(),
        ));
    }

    validate_http_url("slack.api_base_url", &slack.api_base_url)
}

fn validate_nlu(nlu: &NluConfig) -> Result<(), ConfigError> {
    if nlu.access_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "nlu.access_token is required. Get it from https://wit.ai > Your App > Settings"
                .to_string(),
        ));
    }

    if nlu.timeout_secs == 0 || nlu.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "nlu.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if nlu.api_version.trim().is_empty() {
        return Err(ConfigError::Validation("nlu.api_version must not be empty".to_string()));
    }

    validate_http_url("nlu.base_url", &nlu.base_url)
}

fn validate_numbers(numbers: &NumbersConfig) -> Result<(), ConfigError> {
    if numbers.timeout_secs == 0 || numbers.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "numbers.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if numbers.max_retries > 5 {
        return Err(ConfigError::Validation(
            "numbers.max_retries must be in range 0..=5".to_string(),
        ));
    }

    validate_http_url("numbers.base_url", &numbers.base_url)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    Ok(())
}

fn validate_broadcast(broadcast: &BroadcastConfig) -> Result<(), ConfigError> {
    if broadcast.interval_ms < 1_000 {
        return Err(ConfigError::Validation(
            "broadcast.interval_ms must be at least 1000".to_string(),
        ));
    }

    for url in &broadcast.webhook_urls {
        validate_http_url("broadcast.webhook_urls", url)?;
    }

    Ok(())
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    if conversation.session_idle_secs == 0 {
        return Err(ConfigError::Validation(
            "conversation.session_idle_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    nlu: Option<NluPatch>,
    numbers: Option<NumbersPatch>,
    server: Option<ServerPatch>,
    broadcast: Option<BroadcastPatch>,
    conversation: Option<ConversationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
    verification_token: Option<String>,
    slash_command: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NluPatch {
    access_token: Option<String>,
    base_url: Option<String>,
    api_version: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NumbersPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct BroadcastPatch {
    enabled: Option<bool>,
    interval_ms: Option<u64>,
    webhook_urls: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    session_idle_secs: Option<u64>,
    ambient_mode: Option<AmbientMode>,
    decorate_facts: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
