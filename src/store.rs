use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, Weak,
};

use diesel::sqlite::SqliteConnection;

use crate::db::{self, models::{NewReport, ReportRow}};
use crate::error::StoreError;
use crate::report::{ReportRecord, Snapshot};
use crate::util;


pub type ChangeFn = Arc<dyn Fn(&Snapshot) + Send + Sync>;
pub type ErrorFn = Arc<dyn Fn(&StoreError) + Send + Sync>;


/// Realtime collection of reports keyed by identity.
pub trait ReportStore: Send + Sync {
    /// Writes `record` at `{collection}/{identity}`, replacing what was there.
    fn set(&self, path: &str, record: &ReportRecord) -> Result<(), StoreError>;

    /// Delivers the current snapshot right away and again after every change.
    fn subscribe(&self, collection: &str, on_change: ChangeFn, on_error: ErrorFn) -> Subscription;
}

pub fn report_path(collection: &str, identity: &str) -> String {
    format!("{}/{}", collection, identity)
}

fn split_path(path: &str) -> Result<(&str, &str), StoreError> {
    match path.rsplit_once('/') {
        Some((collection, identity)) if !collection.is_empty() && !identity.is_empty() =>
            Ok((collection, identity)),
        _ => Err(StoreError::InvalidPath(path.to_owned())),
    }
}


struct Subscriber {
    id: u64,
    collection: String,
    on_change: ChangeFn,
    on_error: ErrorFn,
}

#[derive(Default)]
struct SubscriberList {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl SubscriberList {
    fn add(&self, collection: &str, on_change: ChangeFn, on_error: ErrorFn) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        util::lock(&self.subscribers).push(Subscriber {
            id,
            collection: collection.to_owned(),
            on_change,
            on_error,
        });
        id
    }

    fn remove(&self, id: u64) {
        util::lock(&self.subscribers).retain(|s| s.id != id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        util::lock(&self.subscribers).len()
    }

    fn of_collection(&self, collection: &str) -> Vec<(ChangeFn, ErrorFn)> {
        util::lock(&self.subscribers).iter()
            .filter(|s| s.collection == collection)
            .map(|s| (s.on_change.clone(), s.on_error.clone()))
            .collect()
    }

    fn publish(&self, collection: &str, result: &Result<Snapshot, StoreError>) {
        // Callbacks run without the list lock so they may unsubscribe.
        for (on_change, on_error) in self.of_collection(collection) {
            match result {
                Ok(snapshot) => on_change(snapshot),
                Err(err) => on_error(err),
            }
        }
    }
}


/// Live subscription. Dropping it stops further deliveries.
pub struct Subscription {
    id: u64,
    subscribers: Weak<SubscriberList>,
}

impl Subscription {
    fn new(id: u64, subscribers: &Arc<SubscriberList>) -> Self {
        Subscription {
            id,
            subscribers: Arc::downgrade(subscribers),
        }
    }

    /// A subscription that was never registered anywhere.
    #[cfg(test)]
    pub fn detached() -> Self {
        Subscription {
            id: 0,
            subscribers: Weak::new(),
        }
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.remove(self.id);
        }
    }
}


/// Report store backed by one SQLite connection.
///
/// Writes and snapshot deliveries happen under the connection lock, so
/// subscribers see snapshots in write order.
pub struct DbReportStore {
    collection: String,
    conn: Mutex<SqliteConnection>,
    subscribers: Arc<SubscriberList>,
}

impl DbReportStore {
    pub fn open(database_url: &str, collection: &str) -> Result<Self, StoreError> {
        let mut conn = db::establish_connection(database_url)?;
        db::create_tables(&mut conn)?;

        info!("Report store ready at {} for {}", database_url, collection);

        Ok(DbReportStore {
            collection: collection.to_owned(),
            conn: Mutex::new(conn),
            subscribers: Arc::new(SubscriberList::default()),
        })
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn check_collection(&self, collection: &str) -> Result<(), StoreError> {
        if collection == self.collection {
            Ok(())
        }
        else {
            Err(StoreError::InvalidPath(collection.to_owned()))
        }
    }

    fn load_snapshot(conn: &mut SqliteConnection) -> Result<Snapshot, StoreError> {
        let rows = db::get_reports(conn)?;
        Ok(rows.into_iter().map(row_to_entry).collect())
    }
}

fn row_to_entry(row: ReportRow) -> (String, ReportRecord) {
    let record = ReportRecord {
        latitude: row.latitude,
        longitude: row.longitude,
        flood_level: row.flood_level.into(),
        message: row.message,
        timestamp: Some(row.created_time),
    };
    (row.user_id, record)
}

impl ReportStore for DbReportStore {
    fn set(&self, path: &str, record: &ReportRecord) -> Result<(), StoreError> {
        let (collection, identity) = split_path(path)?;
        self.check_collection(collection)?;

        let mut conn = util::lock(&self.conn);
        db::upsert_report(&mut conn, &NewReport {
            user_id: identity,
            latitude: record.latitude,
            longitude: record.longitude,
            flood_level: record.flood_level.label(),
            message: &record.message,
            created_time: record.timestamp.unwrap_or_else(util::now_millis),
        })?;

        let snapshot = Self::load_snapshot(&mut conn);
        if let Err(err) = &snapshot {
            warn!("Fail to load reports after write: {}", err);
        }
        self.subscribers.publish(collection, &snapshot);

        Ok(())
    }

    fn subscribe(&self, collection: &str, on_change: ChangeFn, on_error: ErrorFn) -> Subscription {
        let mut conn = util::lock(&self.conn);
        let id = self.subscribers.add(collection, on_change.clone(), on_error.clone());
        let subscription = Subscription::new(id, &self.subscribers);

        let initial = self.check_collection(collection)
            .and_then(|_| Self::load_snapshot(&mut conn));
        match initial {
            Ok(snapshot) => on_change(&snapshot),
            Err(err) => on_error(&err),
        }

        subscription
    }
}
