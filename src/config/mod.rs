//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, MigrateArgs, ServeArgs, ServeOverrides};

use std::{net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vitrine";
const ENV_PREFIX: &str = "VITRINE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_SITE_URL: &str = "http://localhost:3000";
const DEFAULT_SITE_TITLE: &str = "Vitrine";
const DEFAULT_SITE_LANGUAGE: &str = "en-US";
const DEFAULT_PAGE_SIZE: u64 = 10;
const DEFAULT_FEED_LIMIT: u64 = 999;
const DEFAULT_SITEMAP_LIMIT: u64 = 1000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FEED_TTL_SECS: u64 = 3600;
const DEFAULT_SITEMAP_TTL_SECS: u64 = 3600;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAIL_FROM: &str = "guestbook@localhost";
const DEFAULT_GUESTBOOK_READ_WINDOW_SECS: u64 = 60;
const DEFAULT_GUESTBOOK_READ_MAX_REQUESTS: u64 = 60;
const DEFAULT_GUESTBOOK_WRITE_WINDOW_SECS: u64 = 60;
const DEFAULT_GUESTBOOK_WRITE_MAX_REQUESTS: u64 = 5;
const DEFAULT_GUESTBOOK_ID_SALT: &str = "vitrine-guestbook";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub site: SiteSettings,
    pub content: ContentSettings,
    pub cache: CacheSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub mail: MailSettings,
    pub guestbook: GuestbookSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub url: Url,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub language: String,
    pub author: String,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    /// `None` serves from an empty in-memory source.
    pub api_url: Option<Url>,
    pub token: Option<String>,
    pub page_size: NonZeroU32,
    pub feed_limit: NonZeroU32,
    pub sitemap_limit: NonZeroU32,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// `None` keeps cached values in process memory.
    pub redis_url: Option<String>,
    pub feed_ttl_seconds: u64,
    pub sitemap_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// `None` treats every caller as anonymous.
    pub session_url: Option<Url>,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub transport: Option<MailTransport>,
    pub from: String,
    /// Recipient of guestbook notifications; `None` disables them.
    pub notify_to: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MailTransport {
    pub api_url: Url,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct GuestbookSettings {
    pub read: RateLimitSettings,
    pub write: RateLimitSettings,
    pub id_salt: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window_seconds: NonZeroU32,
    pub max_requests: NonZeroU32,
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.window_seconds.get()))
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    site: RawSiteSettings,
    content: RawContentSettings,
    cache: RawCacheSettings,
    database: RawDatabaseSettings,
    auth: RawAuthSettings,
    mail: RawMailSettings,
    guestbook: RawGuestbookSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.site_url.as_ref() {
            self.site.url = Some(url.clone());
        }
        if let Some(url) = overrides.content_api_url.as_ref() {
            self.content.api_url = Some(url.clone());
        }
        if let Some(size) = overrides.content_page_size {
            self.content.page_size = Some(size.into());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(max) = overrides.guestbook_write_max_requests {
            self.guestbook.write_max_requests = Some(max);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            site,
            content,
            cache,
            database,
            auth,
            mail,
            guestbook,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            site: build_site_settings(site)?,
            content: build_content_settings(content)?,
            cache: build_cache_settings(cache)?,
            database: build_database_settings(database)?,
            auth: build_auth_settings(auth)?,
            mail: build_mail_settings(mail)?,
            guestbook: build_guestbook_settings(guestbook)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let raw_url = site.url.unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
    let url = parse_http_url(&raw_url, "site.url")?;

    let title = non_empty(site.title).unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string());
    let language = non_empty(site.language).unwrap_or_else(|| DEFAULT_SITE_LANGUAGE.to_string());

    Ok(SiteSettings {
        url,
        title,
        description: site.description.unwrap_or_default(),
        image_url: non_empty(site.image_url),
        language,
        author: site.author.unwrap_or_default(),
    })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let api_url = non_empty(content.api_url)
        .map(|raw| parse_http_url(&raw, "content.api_url"))
        .transpose()?;

    let timeout_secs = content
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "content.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ContentSettings {
        api_url,
        token: non_empty(content.token),
        page_size: non_zero_u32(
            content.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            "content.page_size",
        )?,
        feed_limit: non_zero_u32(
            content.feed_limit.unwrap_or(DEFAULT_FEED_LIMIT),
            "content.feed_limit",
        )?,
        sitemap_limit: non_zero_u32(
            content.sitemap_limit.unwrap_or(DEFAULT_SITEMAP_LIMIT),
            "content.sitemap_limit",
        )?,
        request_timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let feed_ttl_seconds = cache.feed_ttl_seconds.unwrap_or(DEFAULT_FEED_TTL_SECS);
    if feed_ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.feed_ttl_seconds",
            "must be greater than zero",
        ));
    }
    let sitemap_ttl_seconds = cache
        .sitemap_ttl_seconds
        .unwrap_or(DEFAULT_SITEMAP_TTL_SECS);
    if sitemap_ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.sitemap_ttl_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        redis_url: non_empty(cache.redis_url),
        feed_ttl_seconds,
        sitemap_ttl_seconds,
    })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

    Ok(DatabaseSettings {
        url: non_empty(database.url),
        max_connections: non_zero_u32(max_connections.into(), "database.max_connections")?,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let session_url = non_empty(auth.session_url)
        .map(|raw| parse_http_url(&raw, "auth.session_url"))
        .transpose()?;

    let timeout_secs = auth
        .request_timeout_seconds
        .unwrap_or(DEFAULT_AUTH_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "auth.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(AuthSettings {
        session_url,
        request_timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_mail_settings(mail: RawMailSettings) -> Result<MailSettings, LoadError> {
    let transport = match (non_empty(mail.api_url), non_empty(mail.api_key)) {
        (Some(raw_url), Some(api_key)) => Some(MailTransport {
            api_url: parse_http_url(&raw_url, "mail.api_url")?,
            api_key,
        }),
        (None, None) => None,
        (Some(_), None) => {
            return Err(LoadError::invalid(
                "mail.api_key",
                "required when mail.api_url is set",
            ));
        }
        (None, Some(_)) => {
            return Err(LoadError::invalid(
                "mail.api_url",
                "required when mail.api_key is set",
            ));
        }
    };

    Ok(MailSettings {
        transport,
        from: non_empty(mail.from).unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
        notify_to: non_empty(mail.notify_to),
    })
}

fn build_guestbook_settings(
    guestbook: RawGuestbookSettings,
) -> Result<GuestbookSettings, LoadError> {
    let read = RateLimitSettings {
        window_seconds: non_zero_u32(
            guestbook
                .read_window_seconds
                .unwrap_or(DEFAULT_GUESTBOOK_READ_WINDOW_SECS),
            "guestbook.read_window_seconds",
        )?,
        max_requests: non_zero_u32(
            guestbook
                .read_max_requests
                .unwrap_or(DEFAULT_GUESTBOOK_READ_MAX_REQUESTS),
            "guestbook.read_max_requests",
        )?,
    };
    let write = RateLimitSettings {
        window_seconds: non_zero_u32(
            guestbook
                .write_window_seconds
                .unwrap_or(DEFAULT_GUESTBOOK_WRITE_WINDOW_SECS),
            "guestbook.write_window_seconds",
        )?,
        max_requests: non_zero_u32(
            guestbook
                .write_max_requests
                .unwrap_or(DEFAULT_GUESTBOOK_WRITE_MAX_REQUESTS),
            "guestbook.write_max_requests",
        )?,
    };

    Ok(GuestbookSettings {
        read,
        write,
        id_salt: non_empty(guestbook.id_salt)
            .unwrap_or_else(|| DEFAULT_GUESTBOOK_ID_SALT.to_string()),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    language: Option<String>,
    author: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    api_url: Option<String>,
    token: Option<String>,
    page_size: Option<u64>,
    feed_limit: Option<u64>,
    sitemap_limit: Option<u64>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    redis_url: Option<String>,
    feed_ttl_seconds: Option<u64>,
    sitemap_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    session_url: Option<String>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMailSettings {
    api_url: Option<String>,
    api_key: Option<String>,
    from: Option<String>,
    notify_to: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGuestbookSettings {
    read_window_seconds: Option<u64>,
    read_max_requests: Option<u64>,
    write_window_seconds: Option<u64>,
    write_max_requests: Option<u64>,
    id_salt: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_http_url(raw: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(raw).map_err(|err| LoadError::invalid(key, format!("invalid URL: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LoadError::invalid(
            key,
            format!("unsupported scheme `{other}`"),
        )),
    }
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
