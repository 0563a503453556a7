use std::fmt;
use std::time::Duration;

use serde::Deserialize;

const DEFAULTS: &str = include_str!("../config/default.toml");

// Upper bounds keep every configured duration addable to a clock reading
const MAX_RATE_LIMIT_SECS: u64 = 365 * 24 * 3600;
const MAX_TOKEN_LIFETIME_SECS: u64 = 10 * 365 * 24 * 3600;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    pub limit: u32,
    pub window_secs: u64,
    pub block_duration_secs: u64,
    pub sweep_interval_secs: u64,
    pub stale_after_secs: u64,
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_duration_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

#[derive(Clone, Deserialize)]
pub struct AuthSettings {
    pub secret: String,
    pub token_lifetime_secs: u64,
    pub refresh_lifetime_secs: u64,
    pub issuer: String,
    pub audience: Vec<String>,
}

// The secret never ends up in logs or panic messages
impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret", &"<redacted>")
            .field("token_lifetime_secs", &self.token_lifetime_secs)
            .field("refresh_lifetime_secs", &self.refresh_lifetime_secs)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub directory: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub rate_limit: RateLimitSettings,
    pub auth: AuthSettings,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

/// Loads the configuration: embedded defaults -> gatehouse.toml -> $GATEHOUSE_CONFIG -> env/.env.
pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: gatehouse.toml (in CWD)
        .add_source(::config::File::with_name("gatehouse").required(false));

    if let Ok(custom_path) = std::env::var("GATEHOUSE_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(
        ::config::Environment::with_prefix("GATEHOUSE")
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("auth.audience")
            .try_parsing(true),
    );

    let app_cfg: AppConfig = builder.build()?.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

/// Layers an inline TOML document over the embedded defaults, without touching the
/// environment or the filesystem.
pub fn load_from_str(overrides: &str) -> anyhow::Result<AppConfig> {
    let app_cfg: AppConfig = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        .add_source(::config::File::from_str(overrides, ::config::FileFormat::Toml))
        .build()?
        .try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    // Warn for privileged ports on Unix-like systems
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    // Rate limiting
    let rl = &cfg.rate_limit;
    if rl.limit == 0 {
        return Err(anyhow::anyhow!("rate_limit.limit must be > 0"));
    }
    if rl.window_secs == 0 {
        return Err(anyhow::anyhow!("rate_limit.window_secs must be > 0"));
    }
    if rl.block_duration_secs == 0 {
        return Err(anyhow::anyhow!("rate_limit.block_duration_secs must be > 0"));
    }
    if rl.sweep_interval_secs == 0 {
        return Err(anyhow::anyhow!("rate_limit.sweep_interval_secs must be > 0"));
    }
    if rl.stale_after_secs == 0 {
        return Err(anyhow::anyhow!("rate_limit.stale_after_secs must be > 0"));
    }
    for (name, secs) in [
        ("rate_limit.window_secs", rl.window_secs),
        ("rate_limit.block_duration_secs", rl.block_duration_secs),
        ("rate_limit.sweep_interval_secs", rl.sweep_interval_secs),
        ("rate_limit.stale_after_secs", rl.stale_after_secs),
    ] {
        if secs > MAX_RATE_LIMIT_SECS {
            return Err(anyhow::anyhow!("{} must be <= {} (one year)", name, MAX_RATE_LIMIT_SECS));
        }
    }

    // Auth
    let auth = &cfg.auth;
    if auth.secret.is_empty() {
        return Err(anyhow::anyhow!("auth.secret must not be empty"));
    }
    if auth.secret.len() < 32 {
        tracing::warn!("auth.secret is shorter than 32 bytes; use a longer random secret in production");
    }
    if auth.token_lifetime_secs == 0 {
        return Err(anyhow::anyhow!("auth.token_lifetime_secs must be > 0"));
    }
    if auth.refresh_lifetime_secs > MAX_TOKEN_LIFETIME_SECS {
        return Err(anyhow::anyhow!(
            "auth.refresh_lifetime_secs must be <= {} (ten years)",
            MAX_TOKEN_LIFETIME_SECS
        ));
    }
    if auth.refresh_lifetime_secs < auth.token_lifetime_secs {
        return Err(anyhow::anyhow!("auth.refresh_lifetime_secs must be >= token_lifetime_secs"));
    }
    if auth.issuer.trim().is_empty() {
        return Err(anyhow::anyhow!("auth.issuer must not be empty"));
    }
    if auth.audience.iter().all(|a| a.trim().is_empty()) {
        return Err(anyhow::anyhow!("auth.audience must contain at least one entry"));
    }

    Ok(())
}
