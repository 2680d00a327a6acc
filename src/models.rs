//! Trained-data (language model) management for Tesseract.
//!
//! Models live in a local directory as `<code>.traineddata`. A missing model is fetched
//! once from `<base_url>/<code>.traineddata`; the body is streamed into a `.part` file and
//! renamed into place so a concurrent reader never sees a truncated model.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;

const MODEL_EXTENSION: &str = "traineddata";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to fetch {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to fetch {url}: HTTP {status}")]
    Http { url: String, status: u16 },
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to create tokio runtime: {0}")]
    Runtime(std::io::Error),
}

/// A trained-data file, identified by its language code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageModel {
    pub language: String,
    pub local_path: PathBuf,
    pub present: bool,
}

pub struct LanguageModelProvider {
    model_dir: PathBuf,
    base_url: String,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl LanguageModelProvider {
    pub fn new(config: &PipelineConfig) -> Result<Self, ModelError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ModelError::Runtime)?;

        Ok(Self {
            model_dir: config.model_dir.clone(),
            base_url: config.model_base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            runtime,
        })
    }

    pub fn model_path(&self, language: &str) -> PathBuf {
        let file_name = format!("{}.{}", language, MODEL_EXTENSION);
        self.model_dir.join(file_name)
    }

    pub fn model_url(&self, language: &str) -> String {
        format!("{}/{}.{}", self.base_url, language, MODEL_EXTENSION)
    }

    pub fn model(&self, language: &str) -> LanguageModel {
        let local_path = self.model_path(language);
        LanguageModel {
            language: language.to_string(),
            present: local_path.is_file(),
            local_path,
        }
    }

    pub fn is_present(&self, language: &str) -> bool {
        self.model_path(language).is_file()
    }

    /// Makes sure `<language>.traineddata` exists locally, downloading it if needed.
    ///
    /// Returns `true` when the model is present afterwards. An already-present model
    /// returns immediately without touching the network. Any failure returns `false`;
    /// there is no retry.
    pub fn ensure(&self, language: &str) -> bool {
        if self.is_present(language) {
            debug!(language, "Language model already present");
            return true;
        }

        info!(language, url = %self.model_url(language), "Downloading language model");
        match self.runtime.block_on(self.download(language)) {
            Ok(bytes) => {
                info!(
                    language,
                    bytes,
                    path = %self.model_path(language).display(),
                    "Language model downloaded"
                );
                true
            }
            Err(e) => {
                warn!(language, error = %e, "Language model download failed");
                false
            }
        }
    }

    async fn download(&self, language: &str) -> Result<u64, ModelError> {
        fs::create_dir_all(&self.model_dir)
            .await
            .map_err(|source| ModelError::Io {
                path: self.model_dir.clone(),
                source,
            })?;

        let url = self.model_url(language);
        let final_path = self.model_path(language);
        let part_path = final_path.with_extension(format!("{}.part", MODEL_EXTENSION));

        let result = self.download_file(&url, &part_path).await;
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&part_path).await;
                return Err(e);
            }
        };

        fs::rename(&part_path, &final_path)
            .await
            .map_err(|source| ModelError::Io {
                path: final_path.clone(),
                source,
            })?;
        Ok(bytes)
    }

    async fn download_file(&self, url: &str, path: &Path) -> Result<u64, ModelError> {
        debug!(url = %url, path = %path.display(), "Starting file download");

        let network = |source| ModelError::Network {
            url: url.to_string(),
            source,
        };
        let io = |source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(network)?;

        if !response.status().is_success() {
            return Err(ModelError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut file = fs::File::create(path).await.map_err(io)?;
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        use futures_util::stream::StreamExt;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(network)?;
            file.write_all(&chunk).await.map_err(io)?;
            downloaded += chunk.len() as u64;
        }

        file.flush().await.map_err(io)?;
        file.sync_all().await.map_err(io)?;

        debug!(path = %path.display(), bytes = downloaded, "File downloaded successfully");
        Ok(downloaded)
    }

    /// Language codes with a trained-data file in the model directory, sorted.
    pub fn installed_languages(&self) -> Vec<String> {
        let Ok(read_dir) = std::fs::read_dir(&self.model_dir) else {
            return Vec::new();
        };

        let mut languages: Vec<String> = read_dir
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(MODEL_EXTENSION))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_string())
            })
            .collect();
        languages.sort();
        languages
    }
}
