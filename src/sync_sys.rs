use std::sync::{Arc, RwLock};

use crate::error::StoreError;
use crate::report::{self, Report, Snapshot};
use crate::store::{ReportStore, Subscription};
use crate::util;


const FEED_ERROR: &'static str =
    "Failed to load community flood reports. Check the report store configuration.";


/// Latest report list published by a synchronizer.
#[derive(Default)]
struct ReportFeed {
    reports: Vec<Report>,
    error: Option<String>,
    revision: u64,
}

impl ReportFeed {
    fn replace(&mut self, snapshot: &Snapshot) {
        self.reports = report::reports_from_snapshot(snapshot, util::now_millis());
        self.error = None;
        self.revision += 1;
    }

    fn fail(&mut self, err: &StoreError) {
        warn!("Report subscription error: {}", err);
        self.error = Some(FEED_ERROR.to_owned());
    }
}


/// Keeps a sorted copy of the report collection for one consumer.
pub struct ReportSynchronizer {
    feed: Arc<RwLock<ReportFeed>>,
    subscription: Option<Subscription>,
}

impl ReportSynchronizer {
    pub fn start(store: &dyn ReportStore, collection: &str) -> Self {
        let feed = Arc::new(RwLock::new(ReportFeed::default()));

        let t_feed = feed.clone();
        let on_change = Arc::new(move |snapshot: &Snapshot| {
            util::write(&t_feed).replace(snapshot);
        });
        let t_feed = feed.clone();
        let on_error = Arc::new(move |err: &StoreError| {
            util::write(&t_feed).fail(err);
        });

        let subscription = store.subscribe(collection, on_change, on_error);

        ReportSynchronizer {
            feed,
            subscription: Some(subscription),
        }
    }

    /// A synchronizer for a session whose store never came up.
    pub fn unavailable(reason: &str) -> Self {
        let feed = ReportFeed {
            error: Some(reason.to_owned()),
            ..ReportFeed::default()
        };

        ReportSynchronizer {
            feed: Arc::new(RwLock::new(feed)),
            subscription: None,
        }
    }

    pub fn reports(&self) -> Vec<Report> {
        util::read(&self.feed).reports.clone()
    }

    pub fn error(&self) -> Option<String> {
        util::read(&self.feed).error.clone()
    }

    /// Bumped every time a snapshot replaces the list.
    pub fn revision(&self) -> u64 {
        util::read(&self.feed).revision
    }

    /// Whether a store subscription backs this feed.
    pub fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    #[cfg(test)]
    pub fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}


#[cfg(test)]
mod tests {
    use crate::report::{FloodLevel, ReportRecord};
    use crate::store::{report_path, ChangeFn, DbReportStore, ErrorFn};
    use super::*;

    const COLLECTION: &str = "artifacts/sync/public/data/currentFloodStatusByUsers";

    fn record(timestamp: i64) -> ReportRecord {
        ReportRecord {
            latitude: 15.0,
            longitude: 120.5,
            flood_level: FloodLevel::AllGood,
            message: String::new(),
            timestamp: Some(timestamp),
        }
    }

    fn ids(sync: &ReportSynchronizer) -> Vec<(String, i64)> {
        sync.reports().into_iter().map(|r| (r.id, r.timestamp)).collect()
    }

    #[test]
    fn follows_store_in_timestamp_order() {
        let store = DbReportStore::open(":memory:", COLLECTION).unwrap();
        store.set(&report_path(COLLECTION, "a"), &record(100)).unwrap();
        store.set(&report_path(COLLECTION, "b"), &record(200)).unwrap();

        let sync = ReportSynchronizer::start(&store, COLLECTION);
        assert_eq!(ids(&sync), vec![("b".to_owned(), 200), ("a".to_owned(), 100)]);

        store.set(&report_path(COLLECTION, "a"), &record(300)).unwrap();
        assert_eq!(ids(&sync), vec![("a".to_owned(), 300), ("b".to_owned(), 200)]);
    }

    #[test]
    fn revision_counts_snapshots() {
        let store = DbReportStore::open(":memory:", COLLECTION).unwrap();
        let sync = ReportSynchronizer::start(&store, COLLECTION);
        assert_eq!(sync.revision(), 1);

        store.set(&report_path(COLLECTION, "a"), &record(1)).unwrap();
        assert_eq!(sync.revision(), 2);
    }

    #[test]
    fn stop_releases_subscription() {
        let store = DbReportStore::open(":memory:", COLLECTION).unwrap();
        let mut sync = ReportSynchronizer::start(&store, COLLECTION);
        assert_eq!(store.subscriber_count(), 1);

        sync.stop();
        store.set(&report_path(COLLECTION, "a"), &record(1)).unwrap();

        assert_eq!(store.subscriber_count(), 0);
        assert!(sync.reports().is_empty());
        assert!(!sync.is_live());
    }

    #[test]
    fn drop_releases_subscription() {
        let store = DbReportStore::open(":memory:", COLLECTION).unwrap();
        {
            let _sync = ReportSynchronizer::start(&store, COLLECTION);
            assert_eq!(store.subscriber_count(), 1);
        }
        assert_eq!(store.subscriber_count(), 0);
    }

    /// Delivers one snapshot and then an error on subscribe.
    struct FlakyStore;

    impl ReportStore for FlakyStore {
        fn set(&self, _: &str, _: &ReportRecord) -> Result<(), StoreError> {
            Ok(())
        }

        fn subscribe(&self, collection: &str, on_change: ChangeFn, on_error: ErrorFn) -> Subscription {
            let mut snapshot = Snapshot::new();
            snapshot.insert("a".into(), record(10));
            on_change(&snapshot);
            on_error(&StoreError::InvalidPath(collection.to_owned()));
            Subscription::detached()
        }
    }

    #[test]
    fn error_keeps_last_known_list() {
        let sync = ReportSynchronizer::start(&FlakyStore, COLLECTION);

        assert_eq!(ids(&sync), vec![("a".to_owned(), 10)]);
        assert!(sync.error().is_some());
    }

    #[test]
    fn unavailable_store_surfaces_reason() {
        let sync = ReportSynchronizer::unavailable("offline");

        assert_eq!(sync.error().as_deref(), Some("offline"));
        assert!(sync.reports().is_empty());
        assert!(!sync.is_live());
    }
}
