use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use rand::{
    thread_rng, Rng,
    distributions,
};


pub fn generate_rand_id(length: usize) -> String {
    thread_rng()
        .sample_iter(&distributions::Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Milliseconds since the unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn format_coordinates(lat: f64, lon: f64) -> String {
    format!("Lat: {:.4}, Lon: {:.4}", lat, lon)
}

pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn read<T>(rw: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

pub fn write<T>(rw: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}


/// Keeps only the result of the most recently issued request.
///
/// Every request takes a sequence number from `begin`. A result is accepted
/// only if no newer request was issued in the meantime.
#[derive(Debug)]
pub struct Latest<T> {
    issued: u64,
    value: Option<T>,
    pending: bool,
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Latest {
            issued: 0,
            value: None,
            pending: false,
        }
    }
}

impl<T> Latest<T> {
    pub fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.pending = true;
        self.issued
    }

    pub fn resolve(&mut self, seq: u64, value: T) -> bool {
        if seq != self.issued {
            return false;
        }

        self.value = Some(value);
        self.pending = false;
        true
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rand_id_has_requested_length() {
        let id = generate_rand_id(28);
        assert_eq!(id.len(), 28);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn coordinates_use_four_decimals() {
        assert_eq!(format_coordinates(14.79213, 120.87821), "Lat: 14.7921, Lon: 120.8782");
    }

    #[test]
    fn stale_result_is_dropped() {
        let mut latest = Latest::default();
        let first = latest.begin();
        let second = latest.begin();

        assert!(latest.resolve(second, "new"));
        assert!(!latest.resolve(first, "old"));
        assert_eq!(latest.value(), Some(&"new"));
        assert!(!latest.is_pending());
    }

    #[test]
    fn pending_until_latest_resolves() {
        let mut latest = Latest::default();
        let first = latest.begin();
        let _second = latest.begin();

        assert!(!latest.resolve(first, 1));
        assert!(latest.is_pending());
        assert_eq!(latest.value(), None);
    }
}
