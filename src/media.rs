use std::path::PathBuf;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;
use uuid::Uuid;

static UNSAFE_FILE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

const UPLOAD_DIR: &str = "images";

/// Where uploaded choice images go. Returns the URL the image is served from.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    async fn save(&self, file_name: &str, data: &[u8]) -> anyhow::Result<String>;
}

pub struct FsImageStorage {
    root: PathBuf,
    url: String,
}

impl FsImageStorage {
    pub fn new(root: impl Into<PathBuf>, url: &str) -> Self {
        let url = if url.ends_with('/') {
            url.to_owned()
        } else {
            format!("{}/", url)
        };

        Self {
            root: root.into(),
            url,
        }
    }
}

/// Reduces a client-supplied file name to a safe base name.
pub fn clean_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned = UNSAFE_FILE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_owned()
    } else {
        cleaned.to_owned()
    }
}

#[async_trait]
impl ImageStorage for FsImageStorage {
    async fn save(&self, file_name: &str, data: &[u8]) -> anyhow::Result<String> {
        let dir = self.root.join(UPLOAD_DIR);
        fs::create_dir_all(&dir).await?;

        let name = format!("{}-{}", Uuid::new_v4().simple(), clean_file_name(file_name));
        fs::write(dir.join(&name), data).await?;

        Ok(format!("{}{}/{}", self.url, UPLOAD_DIR, name))
    }
}
