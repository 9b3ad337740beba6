use std::env;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct Config {
    dir: PathBuf,
    url_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./uploads"),
            url_prefix: String::from("/uploads"),
        }
    }
}

impl Config {
    pub fn env() -> Self {
        let default = Self::default();
        Self {
            dir: env::var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(default.dir),
            url_prefix: env::var("UPLOAD_PATH")
                .map(|p| p.trim_end_matches('/').to_owned())
                .unwrap_or(default.url_prefix),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }
}

/// Where attachment bytes land.
#[async_trait]
pub trait FileStorage {
    /// Stores the bytes and returns the key they are addressable by.
    async fn put(&self, file_name: &str, bytes: &Bytes) -> super::Result<String>;

    async fn remove(&self, key: &str) -> super::Result<()>;

    fn url(&self, key: &str) -> String;
}

pub struct LocalStorage {
    cfg: Config,
}

impl LocalStorage {
    pub async fn new(cfg: Config) -> super::Result<Self> {
        fs::create_dir_all(cfg.dir()).await?;
        Ok(Self { cfg })
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    async fn put(&self, file_name: &str, bytes: &Bytes) -> super::Result<String> {
        let key = format!("{}-{}", Uuid::new_v4(), sanitize(file_name));

        let mut file = fs::File::create(self.cfg.dir().join(&key)).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!("stored {} bytes as {key}", bytes.len());
        Ok(key)
    }

    async fn remove(&self, key: &str) -> super::Result<()> {
        fs::remove_file(self.cfg.dir().join(sanitize(key))).await?;
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{key}", self.cfg.url_prefix())
    }
}

/// Keeps the name safe for a flat directory.
fn sanitize(file_name: &str) -> String {
    let name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");

    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        String::from("file")
    } else {
        cleaned
    }
}
