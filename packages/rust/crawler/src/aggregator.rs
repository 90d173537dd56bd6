//! Session-scoped record collector.

use std::sync::Arc;

use jobscraper_shared::JobListingRecord;
use tokio::sync::Mutex;

/// Append-only, lock-guarded collection of records shared by worker tasks.
///
/// Records keep completion order. Nothing is deduplicated.
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    records: Arc<Mutex<Vec<JobListingRecord>>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, record: JobListingRecord) {
        self.records.lock().await.push(record);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Copy of everything collected so far.
    pub async fn snapshot(&self) -> Vec<JobListingRecord> {
        self.records.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobscraper_shared::SALARY_PLACEHOLDER;

    fn record(link: &str) -> JobListingRecord {
        JobListingRecord {
            title: Some("Analista".into()),
            company: None,
            location: None,
            salary: SALARY_PLACEHOLDER.into(),
            posted_date: None,
            contract_type: None,
            requirements: None,
            description: None,
            link: link.into(),
            source_page_number: 1,
        }
    }

    #[tokio::test]
    async fn concurrent_pushes_are_all_kept() {
        let aggregator = ResultAggregator::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let agg = aggregator.clone();
            handles.push(tokio::spawn(async move {
                agg.push(record(&format!("https://example.com/s#{i}"))).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(aggregator.len().await, 16);
        assert!(!aggregator.is_empty().await);
    }

    #[tokio::test]
    async fn duplicates_are_not_collapsed() {
        let aggregator = ResultAggregator::new();
        aggregator.push(record("https://example.com/s#A")).await;
        aggregator.push(record("https://example.com/s#A")).await;

        let snapshot = aggregator.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0], snapshot[1]);
    }
}
