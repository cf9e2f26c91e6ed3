//! Download metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for downloads handled by one downloader
#[derive(Debug, Default)]
pub struct DownloadMetrics {
    pub total_bytes: AtomicU64,
    pub total_downloads: AtomicU64,
    pub successful_downloads: AtomicU64,
    pub failed_downloads: AtomicU64,
    pub integrity_failures: AtomicU64,
    pub cache_hits: AtomicU64,
}

impl DownloadMetrics {
    pub fn record_download_started(&self) {
        self.total_downloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download_completed(&self, size: u64) {
        self.successful_downloads.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(size, Ordering::Relaxed);
    }

    pub fn record_download_failed(&self) {
        self.failed_downloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_integrity_failure(&self) {
        self.integrity_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DownloadMetricsSnapshot {
        DownloadMetricsSnapshot {
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            total_downloads: self.total_downloads.load(Ordering::Relaxed),
            successful_downloads: self.successful_downloads.load(Ordering::Relaxed),
            failed_downloads: self.failed_downloads.load(Ordering::Relaxed),
            integrity_failures: self.integrity_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadMetricsSnapshot {
    pub total_bytes: u64,
    /// Network transfers attempted; cache hits are not counted
    pub total_downloads: u64,
    pub successful_downloads: u64,
    pub failed_downloads: u64,
    pub integrity_failures: u64,
    pub cache_hits: u64,
}

impl DownloadMetricsSnapshot {
    pub fn success_rate(&self) -> f64 {
        if self.total_downloads == 0 {
            0.0
        } else {
            self.successful_downloads as f64 / self.total_downloads as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = DownloadMetrics::default();
        metrics.record_download_started();
        metrics.record_download_completed(2048);
        metrics.record_download_started();
        metrics.record_download_failed();
        metrics.record_cache_hit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_downloads, 2);
        assert_eq!(snapshot.total_bytes, 2048);
        assert_eq!(snapshot.cache_hits, 1);
        assert!((snapshot.success_rate() - 0.5).abs() < f64::EPSILON);
    }
}
