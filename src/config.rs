use anyhow::{Context, Result, bail};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Root prefix inside the bucket; requests are scoped beneath it.
    pub root_prefix: String,
    pub redis_url: Option<String>,
    pub cache_enabled: bool,
    pub page_size: u32,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Paginated S3 bucket browser with a Redis listing cache")]
pub struct Args {
    /// Host to bind to (overrides S3_EXPLORER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides S3_EXPLORER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Bucket to browse (overrides S3_EXPLORER_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Bucket region (overrides S3_EXPLORER_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3 endpoint for compatible providers (overrides S3_EXPLORER_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Root prefix inside the bucket (overrides S3_EXPLORER_PREFIX)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Redis connection URL (overrides S3_EXPLORER_REDIS_URL)
    #[arg(long)]
    pub redis_url: Option<String>,

    /// Disable the Redis listing cache entirely
    #[arg(long)]
    pub no_cache: bool,

    /// Default listing page size (overrides S3_EXPLORER_PAGE_SIZE)
    #[arg(long)]
    pub page_size: Option<u32>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    ///
    /// Credentials are environment-only (S3_EXPLORER_ACCESS_KEY_ID /
    /// S3_EXPLORER_SECRET_ACCESS_KEY); secrets do not belong in argv.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("S3_EXPLORER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("S3_EXPLORER_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing S3_EXPLORER_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading S3_EXPLORER_PORT"),
        };
        let env_page_size = match env::var("S3_EXPLORER_PAGE_SIZE") {
            Ok(value) => Some(
                value
                    .parse::<u32>()
                    .with_context(|| format!("parsing S3_EXPLORER_PAGE_SIZE value `{}`", value))?,
            ),
            Err(_) => None,
        };
        let cache_env_enabled = env::var("S3_EXPLORER_CACHE_ENABLED")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        // --- Merge ---
        let Some(bucket) = args.bucket.or_else(|| env::var("S3_EXPLORER_BUCKET").ok()) else {
            bail!("no bucket configured: pass --bucket or set S3_EXPLORER_BUCKET");
        };
        let access_key_id =
            env::var("S3_EXPLORER_ACCESS_KEY_ID").context("reading S3_EXPLORER_ACCESS_KEY_ID")?;
        let secret_access_key = env::var("S3_EXPLORER_SECRET_ACCESS_KEY")
            .context("reading S3_EXPLORER_SECRET_ACCESS_KEY")?;

        let redis_url = args
            .redis_url
            .or_else(|| env::var("S3_EXPLORER_REDIS_URL").ok());
        let cache_enabled = !args.no_cache && cache_env_enabled && redis_url.is_some();

        let page_size = args.page_size.or(env_page_size).unwrap_or(50);
        if page_size == 0 {
            bail!("page size must be a positive integer");
        }

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            bucket,
            region: args
                .region
                .or_else(|| env::var("S3_EXPLORER_REGION").ok())
                .unwrap_or_else(|| "us-east-1".into()),
            endpoint: args
                .endpoint
                .or_else(|| env::var("S3_EXPLORER_ENDPOINT").ok()),
            root_prefix: args
                .prefix
                .or_else(|| env::var("S3_EXPLORER_PREFIX").ok())
                .unwrap_or_default()
                .trim_matches('/')
                .to_string(),
            access_key_id,
            secret_access_key,
            redis_url,
            cache_enabled,
            page_size,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Redis URL to actually dial: `None` when caching is disabled.
    pub fn effective_redis_url(&self) -> Option<String> {
        if self.cache_enabled {
            self.redis_url.clone()
        } else {
            None
        }
    }
}
