//! HTTP downloader that fills the content cache

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::downloader::cache::ContentCache;
use crate::downloader::config::DownloadConfig;
use crate::downloader::core::files::{atomic_rename, create_temp_path, ensure_dir, remove_quietly};
use crate::downloader::core::progress::emit;
use crate::downloader::core::{DownloadError, FileOperation, ProgressCallback, ProgressEvent, Result};
use crate::downloader::metrics::DownloadMetrics;
use crate::downloader::sources::DownloadSource;
use crate::error::ErrorKind;
use crate::models::Mod;

/// Fetches mod archives into the content cache
///
/// Each piece of content is transferred at most once: a valid cache entry
/// short-circuits the network entirely, and the cache slot is only ever
/// written by renaming a fully validated temp file into place.
pub struct HttpDownloader {
    client: Client,
    config: DownloadConfig,
    cache: ContentCache,
    metrics: Arc<DownloadMetrics>,
}

impl HttpDownloader {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;
        let cache = ContentCache::from_config(&config);

        Ok(Self {
            client,
            config,
            cache,
            metrics: Arc::new(DownloadMetrics::default()),
        })
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    pub fn metrics(&self) -> &DownloadMetrics {
        &self.metrics
    }

    /// Return a cached archive for `m`, downloading it first when needed
    pub async fn download(
        &self,
        m: &Mod,
        cancel: &CancellationToken,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<PathBuf> {
        async move {
            let source = DownloadSource::resolve(&m.download_url)?;
            let dest_path = self.cache.entry_path(m);

            if self.cache.is_cached(m).await {
                let size = fs::metadata(&dest_path).await.map(|md| md.len()).unwrap_or(m.file_size);
                info!("Mod {} found in cache: {}", m.id, dest_path.display());
                self.metrics.record_cache_hit();
                emit(
                    progress_callback.as_ref(),
                    ProgressEvent::CacheHit {
                        path: dest_path.display().to_string(),
                        size,
                    },
                );
                return Ok(dest_path);
            }

            if cancel.is_cancelled() {
                return Err(DownloadError::Cancelled { url: m.download_url.clone() });
            }

            ensure_dir(&self.config.temp_dir).await?;
            let temp_path = create_temp_path(&self.config.temp_dir, &self.cache.cache_key(m));
            self.metrics.record_download_started();
            info!("Downloading mod {} from {}", m.id, source.fetch_url());

            let result = self
                .download_and_commit(m, &source, &temp_path, &dest_path, cancel, progress_callback.as_ref())
                .await;

            match result {
                Ok(size) => {
                    self.metrics.record_download_completed(size);
                    emit(
                        progress_callback.as_ref(),
                        ProgressEvent::DownloadComplete {
                            url: m.download_url.clone(),
                            final_size: size,
                        },
                    );
                    info!("Mod {} cached at {}", m.id, dest_path.display());
                    Ok(dest_path)
                }
                Err(e) => {
                    remove_quietly(&temp_path).await;
                    self.metrics.record_download_failed();
                    if e.kind() == ErrorKind::Integrity {
                        self.metrics.record_integrity_failure();
                    }
                    warn!("Download of {} failed: {}", m.id, e);
                    emit(
                        progress_callback.as_ref(),
                        ProgressEvent::Error {
                            url: m.download_url.clone(),
                            error: e.to_string(),
                        },
                    );
                    Err(e)
                }
            }
        }
        .instrument(info_span!("http_download", mod_id = %m.id, url = %m.download_url))
        .await
    }

    /// Stream into `temp_path`, validate, then move into the cache slot
    async fn download_and_commit(
        &self,
        m: &Mod,
        source: &DownloadSource,
        temp_path: &Path,
        dest_path: &Path,
        cancel: &CancellationToken,
        progress_callback: Option<&ProgressCallback>,
    ) -> Result<u64> {
        self.fetch_to_file(source.fetch_url(), &m.download_url, temp_path, cancel, progress_callback)
            .await?;

        let size = self
            .cache
            .validation_for(m)
            .validate_file(temp_path, progress_callback)
            .await?;

        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled { url: m.download_url.clone() });
        }

        atomic_rename(temp_path, dest_path).await?;
        Ok(size)
    }

    fn request_error(&self, error: reqwest::Error) -> DownloadError {
        DownloadError::request(error, self.config.timeout)
    }

    async fn fetch_to_file(
        &self,
        url: &str,
        reported_url: &str,
        dest_path: &Path,
        cancel: &CancellationToken,
        progress_callback: Option<&ProgressCallback>,
    ) -> Result<u64> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(DownloadError::Cancelled { url: reported_url.to_string() });
            }
            response = self.client.get(url).send() => response.map_err(|e| self.request_error(e))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if content_type.contains("text/html") {
            return Err(DownloadError::HtmlResponse {
                url: url.to_string(),
                content_type,
            });
        }

        let total_size = response.content_length();
        emit(
            progress_callback,
            ProgressEvent::DownloadStarted {
                url: reported_url.to_string(),
                total_size,
            },
        );

        let file = fs::File::create(dest_path)
            .await
            .map_err(|e| DownloadError::file_system(dest_path, FileOperation::Create, e))?;
        let mut writer = BufWriter::with_capacity(self.config.chunk_size, file);

        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Cancellation requested after {} bytes", downloaded);
                    return Err(DownloadError::Cancelled { url: reported_url.to_string() });
                }
                next = stream.next() => match next {
                    Some(chunk) => chunk.map_err(|e| self.request_error(e))?,
                    None => break,
                },
            };

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::file_system(dest_path, FileOperation::Write, e))?;
            downloaded += chunk.len() as u64;

            emit(
                progress_callback,
                ProgressEvent::DownloadProgress {
                    url: reported_url.to_string(),
                    downloaded,
                    total: total_size,
                },
            );
        }

        writer
            .flush()
            .await
            .map_err(|e| DownloadError::file_system(dest_path, FileOperation::Write, e))?;

        debug!("Transfer finished: {} bytes", downloaded);
        Ok(downloaded)
    }
}
