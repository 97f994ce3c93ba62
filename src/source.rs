use crate::error::DashboardError;
use crate::table::{Dataset, SurveyTable};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Published CSV export of the survey responses sheet
pub const DEFAULT_CSV_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vT5HpURwDWt6S0KkQbiS8ugZksNm8yTokNeKE4X-oBHmLMubOvOKIsuU4q6_onLta2cd0brCBQc-cHA/pub?gid=1578087772&single=true&output=csv";

/// How long a loaded sheet (or a failed load) is reused
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Somewhere the survey CSV text can be read from
#[async_trait]
pub trait SurveySource: Send + Sync {
    async fn fetch(&self) -> Result<String, DashboardError>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Reads the sheet's published CSV export over HTTP
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DashboardError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DashboardError::DataUnavailable(e.to_string()))?;
        Ok(HttpSource {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SurveySource for HttpSource {
    async fn fetch(&self) -> Result<String, DashboardError> {
        let unavailable = |e: reqwest::Error| DashboardError::DataUnavailable(e.to_string());
        self.client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(unavailable)?
            .text()
            .await
            .map_err(unavailable)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Reads a CSV export saved on disk
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }
}

#[async_trait]
impl SurveySource for FileSource {
    async fn fetch(&self) -> Result<String, DashboardError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DashboardError::DataUnavailable(format!("{}: {}", self.path.display(), e)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A validated sheet and when it was fetched
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub dataset: Arc<Dataset>,
    pub fetched_at: DateTime<Local>,
}

struct CacheEntry {
    expires_at: Instant,
    outcome: Result<Snapshot, DashboardError>,
}

/// Time-boxed memo of the last load attempt
///
/// Successful and failed loads are both kept until the window closes. The
/// entry lock is held across a fetch, so callers arriving mid-fetch wait for
/// that result instead of starting their own.
pub struct SurveyCache {
    source: Box<dyn SurveySource>,
    ttl: Duration,
    entry: Mutex<Option<CacheEntry>>,
}

impl SurveyCache {
    pub fn new(source: Box<dyn SurveySource>, ttl: Duration) -> Self {
        SurveyCache {
            source,
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current snapshot, fetching only when the window has expired
    pub async fn load(&self) -> Result<Snapshot, DashboardError> {
        let mut entry = self.entry.lock().await;
        if let Some(cached) = entry.as_ref() {
            if Instant::now() < cached.expires_at {
                log::debug!("serving cached survey sheet");
                return cached.outcome.clone();
            }
        }
        self.fill(&mut entry).await
    }

    /// Refetch now, regardless of the window
    pub async fn refresh(&self) -> Result<Snapshot, DashboardError> {
        let mut entry = self.entry.lock().await;
        self.fill(&mut entry).await
    }

    /// Drop the cached outcome so the next `load` fetches
    pub async fn invalidate(&self) {
        self.entry.lock().await.take();
    }

    async fn fill(&self, entry: &mut Option<CacheEntry>) -> Result<Snapshot, DashboardError> {
        log::info!("fetching survey sheet from {}", self.source.describe());
        let outcome = self.fetch_snapshot().await;
        match &outcome {
            Ok(snapshot) => log::info!(
                "loaded {} survey responses",
                snapshot.dataset.total_responses()
            ),
            Err(e) => log::warn!("survey sheet unavailable: {}", e),
        }

        *entry = Some(CacheEntry {
            expires_at: Instant::now() + self.ttl,
            outcome: outcome.clone(),
        });
        outcome
    }

    async fn fetch_snapshot(&self) -> Result<Snapshot, DashboardError> {
        let text = self.source.fetch().await?;
        let table = SurveyTable::from_csv_str(&text)?;
        let dataset = Dataset::from_table(&table)?;
        Ok(Snapshot {
            dataset: Arc::new(dataset),
            fetched_at: Local::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SAMPLE_CSV;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        body: Option<&'static str>,
    }

    #[async_trait]
    impl SurveySource for CountingSource {
        async fn fetch(&self) -> Result<String, DashboardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.body
                .map(str::to_string)
                .ok_or_else(|| DashboardError::DataUnavailable("connection refused".to_string()))
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    fn cache(body: Option<&'static str>) -> (SurveyCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            calls: calls.clone(),
            body,
        };
        (SurveyCache::new(Box::new(source), DEFAULT_TTL), calls)
    }

    #[tokio::test(start_paused = true)]
    async fn loads_within_window_share_one_fetch() {
        let (cache, calls) = cache(Some(SAMPLE_CSV));
        assert_eq!(cache.ttl(), DEFAULT_TTL);
        let first = cache.load().await.unwrap();
        tokio::time::advance(Duration::from_secs(299)).await;
        let second = cache.load().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first.dataset, &second.dataset));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_window_refetches() {
        let (cache, calls) = cache(Some(SAMPLE_CSV));
        cache.load().await.unwrap();
        tokio::time::advance(Duration::from_secs(301)).await;
        cache.load().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_memoized_for_the_window() {
        let (cache, calls) = cache(None);
        let err = cache.load().await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(cache.load().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(DEFAULT_TTL).await;
        assert!(cache.load().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refresh_and_invalidate_force_a_fetch() {
        let (cache, calls) = cache(Some(SAMPLE_CSV));
        cache.load().await.unwrap();
        cache.refresh().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.invalidate().await;
        cache.load().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn concurrent_loads_wait_for_the_same_fetch() {
        let (cache, calls) = cache(Some(SAMPLE_CSV));
        let (a, b) = tokio::join!(cache.load(), cache.load());
        assert!(Arc::ptr_eq(&a.unwrap().dataset, &b.unwrap().dataset));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unparsable_schema_is_unavailable() {
        let (cache, _) = cache(Some("just,some,columns\n1,2,3\n"));
        let err = cache.load().await.unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn { .. }));
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn file_source_reads_csv_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();

        let cache = SurveyCache::new(Box::new(FileSource::new(&path)), DEFAULT_TTL);
        let snapshot = cache.load().await.unwrap();
        assert_eq!(snapshot.dataset.total_responses(), 6);

        let missing = FileSource::new(dir.path().join("absent.csv"));
        assert!(missing.fetch().await.unwrap_err().is_unavailable());
    }
}
