use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use chrono::{Local, TimeZone};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use crate::report::Report;


/// Coordinates closer than this on both axes are the same place.
pub const COORDINATE_TOLERANCE: f64 = 0.000001;
pub const FOCUS_ZOOM: u8 = 14;
pub const DEFAULT_ZOOM: u8 = 7;
pub const TEMP_MARKER_LIFETIME: Duration = Duration::from_secs(5);
const NO_DETAILS: &'static str = "No additional details.";


#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        LatLon { lat, lon }
    }

    /// Coordinates from outside, or `None` when they are not a point on Earth.
    pub fn checked(lat: f64, lon: f64) -> Option<Self> {
        let valid = lat.is_finite() && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);

        Some(LatLon::new(lat, lon)).filter(|_| valid)
    }

    pub fn is_near(&self, other: &LatLon) -> bool {
        (self.lat - other.lat).abs() < COORDINATE_TOLERANCE
            && (self.lon - other.lon).abs() < COORDINATE_TOLERANCE
    }
}


#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Popup {
    pub title: String,
    pub level: Option<String>,
    pub details: String,
    pub reported: Option<String>,
}

impl Popup {
    pub fn for_report(report: &Report) -> Self {
        Popup {
            title: "Report".into(),
            level: Some(report.flood_level.label().to_owned()),
            details: details_or_default(&report.message),
            reported: Some(format_timestamp(report.timestamp)),
        }
    }

    pub fn for_location(message: &str) -> Self {
        Popup {
            title: "Reported Location".into(),
            level: None,
            details: details_or_default(message),
            reported: None,
        }
    }
}

fn details_or_default(message: &str) -> String {
    if message.trim().is_empty() {
        NO_DETAILS.to_owned()
    }
    else {
        message.to_owned()
    }
}

/// Local date and time of a millisecond timestamp.
pub fn format_timestamp(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => millis.to_string(),
    }
}


#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub position: LatLon,
    /// Fill color of a round report marker; `None` draws the default pin.
    pub color: Option<&'static str>,
    pub popup: Popup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MarkerId(u64);


/// Something markers can be drawn on.
pub trait MapSurface {
    fn add_marker(&mut self, marker: MarkerSpec) -> MarkerId;
    fn remove_marker(&mut self, id: MarkerId) -> bool;
    fn has_marker(&self, id: MarkerId) -> bool;
    fn marker_position(&self, id: MarkerId) -> Option<LatLon>;
    fn open_popup(&mut self, id: MarkerId);
    fn set_view(&mut self, center: LatLon, zoom: u8);
}


#[derive(Debug, Serialize)]
struct PlacedMarker {
    #[serde(flatten)]
    spec: MarkerSpec,
    popup_open: bool,
}

/// Server-side model of the page's map, sent to the page as JSON.
#[derive(Debug)]
pub struct MarkerLayer {
    center: LatLon,
    zoom: u8,
    markers: BTreeMap<MarkerId, PlacedMarker>,
    next_id: u64,
}

impl MarkerLayer {
    pub fn new(center: LatLon) -> Self {
        MarkerLayer {
            center,
            zoom: DEFAULT_ZOOM,
            markers: BTreeMap::new(),
            next_id: 0,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[cfg(test)]
    pub fn center(&self) -> LatLon {
        self.center
    }

    #[cfg(test)]
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Moves the view, keeping the zoom.
    pub fn pan_to(&mut self, center: LatLon) {
        self.center = center;
    }

    #[cfg(test)]
    pub fn marker(&self, id: MarkerId) -> Option<&MarkerSpec> {
        self.markers.get(&id).map(|m| &m.spec)
    }

    #[cfg(test)]
    pub fn is_popup_open(&self, id: MarkerId) -> bool {
        self.markers.get(&id).map_or(false, |m| m.popup_open)
    }

    pub fn to_json(&self) -> JsonValue {
        let markers = self.markers.iter()
            .map(|(id, m)| {
                let mut value = json!(m);
                value["id"] = json!(id);
                value
            })
            .collect::<Vec<_>>();

        json!({
            "center": self.center,
            "zoom": self.zoom,
            "markers": markers,
            "size": markers.len(),
        })
    }
}

impl MapSurface for MarkerLayer {
    fn add_marker(&mut self, marker: MarkerSpec) -> MarkerId {
        let id = MarkerId(self.next_id);
        self.next_id += 1;
        self.markers.insert(id, PlacedMarker {
            spec: marker,
            popup_open: false,
        });
        id
    }

    fn remove_marker(&mut self, id: MarkerId) -> bool {
        self.markers.remove(&id).is_some()
    }

    fn has_marker(&self, id: MarkerId) -> bool {
        self.markers.contains_key(&id)
    }

    fn marker_position(&self, id: MarkerId) -> Option<LatLon> {
        self.markers.get(&id).map(|m| m.spec.position)
    }

    fn open_popup(&mut self, id: MarkerId) {
        // One popup at a time.
        for (marker_id, marker) in self.markers.iter_mut() {
            marker.popup_open = *marker_id == id;
        }
    }

    fn set_view(&mut self, center: LatLon, zoom: u8) {
        self.center = center;
        self.zoom = zoom;
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusOutcome {
    Existing(MarkerId),
    Temporary(MarkerId),
}


/// Keeps report markers on a map in line with the report list.
#[derive(Debug, Default)]
pub struct MarkerReconciler {
    placed: Vec<MarkerId>,
    temporary: Vec<(MarkerId, Instant)>,
}

impl MarkerReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn placed(&self) -> &[MarkerId] {
        &self.placed
    }

    /// Clears every marker of the previous pass, then draws one per report.
    pub fn reconcile<M: MapSurface>(&mut self, reports: &[Report], map: &mut M) {
        for id in self.placed.drain(..) {
            if map.has_marker(id) {
                map.remove_marker(id);
            }
        }

        for report in reports {
            let id = map.add_marker(MarkerSpec {
                position: LatLon::new(report.latitude, report.longitude),
                color: Some(report.flood_level.marker_color()),
                popup: Popup::for_report(report),
            });
            self.placed.push(id);
        }
    }

    /// Centers the map on `target` and shows what is there.
    ///
    /// Opens the popup of a report marker at the same place, otherwise drops a
    /// temporary marker that `sweep_expired` removes after
    /// `TEMP_MARKER_LIFETIME`.
    pub fn focus<M: MapSurface>(&mut self, target: LatLon, message: &str, map: &mut M, now: Instant)
        -> FocusOutcome {

        map.set_view(target, FOCUS_ZOOM);

        let existing = self.placed.iter()
            .cloned()
            .find(|&id| map.marker_position(id).map_or(false, |pos| pos.is_near(&target)));

        if let Some(id) = existing {
            map.open_popup(id);
            return FocusOutcome::Existing(id);
        }

        let id = map.add_marker(MarkerSpec {
            position: target,
            color: None,
            popup: Popup::for_location(message),
        });
        map.open_popup(id);
        self.temporary.push((id, now + TEMP_MARKER_LIFETIME));

        FocusOutcome::Temporary(id)
    }

    /// Removes temporary markers whose time is up. Returns how many went away.
    pub fn sweep_expired<M: MapSurface>(&mut self, map: &mut M, now: Instant) -> usize {
        let mut removed = 0;

        self.temporary.retain(|&(id, deadline)| {
            if deadline > now {
                return true;
            }
            if map.has_marker(id) && map.remove_marker(id) {
                removed += 1;
            }
            false
        });

        removed
    }

    #[cfg(test)]
    pub fn pending_temporary(&self) -> usize {
        self.temporary.len()
    }
}
