use std::{
    env,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, anyhow};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config/app_config.toml";
const ENV_PREFIX: &str = "STUDIO";

pub const DEFAULT_FAL_MODEL: &str = "fal-ai/flux/dev/image-to-image";
const DEFAULT_QUEUE_BASE_URL: &str = "https://queue.fal.run";
const DEFAULT_STORAGE_BASE_URL: &str = "https://rest.alpha.fal.ai";
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8501";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct FalConfig {
    /// Key from the config file. `FAL_KEY` is consulted by the credential provider.
    pub api_key: Option<String>,
    pub model: String,
    pub queue_base_url: String,
    pub storage_base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub max_upload_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub fal: FalConfig,
    pub server: ServerConfig,
    pub staging_dir: PathBuf,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_path =
            env::var("APP_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Layers the optional TOML file under `STUDIO__*` environment overrides.
    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        let file_config: FileConfig = config::Config::builder()
            .add_source(config::File::from(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("读取配置文件 {:?} 失败", config_path))?
            .try_deserialize()
            .with_context(|| format!("解析配置文件 {:?} 失败", config_path))?;

        file_config.into_domain()
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    staging_dir: Option<String>,
    #[serde(default)]
    fal: Option<FileFalConfig>,
    #[serde(default)]
    server: Option<FileServerConfig>,
}

impl FileConfig {
    fn into_domain(self) -> anyhow::Result<AppConfig> {
        let staging_dir = self
            .staging_dir
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        Ok(AppConfig {
            fal: self.fal.unwrap_or_default().into_domain(),
            server: self.server.unwrap_or_default().into_domain()?,
            staging_dir,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileFalConfig {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    queue_base_url: Option<String>,
    #[serde(default)]
    storage_base_url: Option<String>,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
    #[serde(default)]
    request_timeout_seconds: Option<u64>,
}

impl FileFalConfig {
    fn into_domain(self) -> FalConfig {
        FalConfig {
            api_key: self.api_key.filter(|key| !key.trim().is_empty()),
            model: self.model.unwrap_or_else(|| DEFAULT_FAL_MODEL.to_string()),
            queue_base_url: trim_base(
                self.queue_base_url
                    .unwrap_or_else(|| DEFAULT_QUEUE_BASE_URL.to_string()),
            ),
            storage_base_url: trim_base(
                self.storage_base_url
                    .unwrap_or_else(|| DEFAULT_STORAGE_BASE_URL.to_string()),
            ),
            poll_interval: Duration::from_millis(
                self.poll_interval_ms
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
                    .max(50),
            ),
            request_timeout: Duration::from_secs(
                self.request_timeout_seconds
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS)
                    .max(5),
            ),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileServerConfig {
    #[serde(default)]
    bind_addr: Option<String>,
    #[serde(default)]
    max_upload_bytes: Option<usize>,
}

impl FileServerConfig {
    fn into_domain(self) -> anyhow::Result<ServerConfig> {
        let bind_addr_str = self
            .bind_addr
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .with_context(|| format!("解析 server.bind_addr 失败: {}", bind_addr_str))?;

        let max_upload_bytes = self.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        if max_upload_bytes == 0 {
            return Err(anyhow!("server.max_upload_bytes 必须大于 0"));
        }

        Ok(ServerConfig {
            bind_addr,
            max_upload_bytes,
        })
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
