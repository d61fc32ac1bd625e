use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};


const NEUTRAL_COLOR: &'static str = "#9E9E9E";


/// Self-reported status at the reporter's location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FloodLevel {
    AllGood,
    MinorInjury,
    MedicalAssistance,
    UrgentCareNeeded,
    EmergencySituation,
    /// A label written by some other client. Kept verbatim.
    Unrecognized(String),
}

impl FloodLevel {
    pub const ALL: [FloodLevel; 5] = [
        FloodLevel::AllGood,
        FloodLevel::MinorInjury,
        FloodLevel::MedicalAssistance,
        FloodLevel::UrgentCareNeeded,
        FloodLevel::EmergencySituation,
    ];

    pub fn label(&self) -> &str {
        match self {
            FloodLevel::AllGood => "All Good!",
            FloodLevel::MinorInjury => "Minor Injury",
            FloodLevel::MedicalAssistance => "Medical Assistance",
            FloodLevel::UrgentCareNeeded => "Urgent Care Needed",
            FloodLevel::EmergencySituation => "Emergency Situation",
            FloodLevel::Unrecognized(label) => label,
        }
    }

    pub fn marker_color(&self) -> &'static str {
        match self {
            FloodLevel::AllGood => "#4CAF50",
            FloodLevel::MinorInjury => "#8BC34A",
            FloodLevel::MedicalAssistance => "#FFEB3B",
            FloodLevel::UrgentCareNeeded => "#FFC107",
            FloodLevel::EmergencySituation => "#F44336",
            FloodLevel::Unrecognized(_) => NEUTRAL_COLOR,
        }
    }
}

impl Default for FloodLevel {
    fn default() -> Self {
        FloodLevel::AllGood
    }
}

impl From<String> for FloodLevel {
    fn from(label: String) -> Self {
        FloodLevel::ALL.iter()
            .find(|level| level.label() == label)
            .cloned()
            .unwrap_or(FloodLevel::Unrecognized(label))
    }
}

impl From<FloodLevel> for String {
    fn from(level: FloodLevel) -> Self {
        match level {
            FloodLevel::Unrecognized(label) => label,
            known => known.label().to_owned(),
        }
    }
}

impl fmt::Display for FloodLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}


/// A report as it is stored under its identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub flood_level: FloodLevel,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Whole collection: identity -> record. Ordered by identity.
pub type Snapshot = BTreeMap<String, ReportRecord>;


#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub flood_level: FloodLevel,
    pub message: String,
    pub timestamp: i64,
}

impl Report {
    fn from_record(id: &str, record: &ReportRecord, now: i64) -> Self {
        Report {
            id: id.to_owned(),
            user_id: id.to_owned(),
            latitude: record.latitude,
            longitude: record.longitude,
            flood_level: record.flood_level.clone(),
            message: record.message.clone(),
            timestamp: record.timestamp.unwrap_or(now),
        }
    }
}

/// Builds the report list of a snapshot, newest first.
///
/// Records without a timestamp are stamped with `now`. Equal timestamps keep
/// identity order.
pub fn reports_from_snapshot(snapshot: &Snapshot, now: i64) -> Vec<Report> {
    let mut reports = snapshot.iter()
        .map(|(id, record)| Report::from_record(id, record, now))
        .collect::<Vec<_>>();

    reports.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    reports
}


#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::*;

    fn record(timestamp: Option<i64>) -> ReportRecord {
        ReportRecord {
            latitude: 14.0,
            longitude: 120.0,
            flood_level: FloodLevel::AllGood,
            message: String::new(),
            timestamp,
        }
    }

    #[test]
    fn labels_round_trip_through_strings() {
        for level in FloodLevel::ALL.iter() {
            assert_eq!(FloodLevel::from(level.label().to_owned()), *level);
        }
    }

    #[test]
    fn unknown_label_is_kept_and_neutral() {
        let level = FloodLevel::from("Knee deep".to_owned());

        assert_eq!(level.label(), "Knee deep");
        assert_eq!(level.marker_color(), "#9E9E9E");
        assert_eq!(String::from(level), "Knee deep");
    }

    #[test]
    fn colors_follow_severity_table() {
        assert_eq!(FloodLevel::AllGood.marker_color(), "#4CAF50");
        assert_eq!(FloodLevel::MinorInjury.marker_color(), "#8BC34A");
        assert_eq!(FloodLevel::MedicalAssistance.marker_color(), "#FFEB3B");
        assert_eq!(FloodLevel::UrgentCareNeeded.marker_color(), "#FFC107");
        assert_eq!(FloodLevel::EmergencySituation.marker_color(), "#F44336");
    }

    #[test]
    fn record_reads_camel_case_with_missing_fields() {
        let record: ReportRecord = serde_json::from_value(json!({
            "latitude": 14.5,
            "longitude": 121.0,
            "floodLevel": "Urgent Care Needed",
        })).unwrap();

        assert_eq!(record.flood_level, FloodLevel::UrgentCareNeeded);
        assert_eq!(record.message, "");
        assert_eq!(record.timestamp, None);
    }

    #[test]
    fn snapshot_sorts_newest_first() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("a".into(), record(Some(100)));
        snapshot.insert("b".into(), record(Some(200)));

        let ids = reports_from_snapshot(&snapshot, 0).into_iter()
            .map(|r| r.id)
            .collect::<Vec<_>>();

        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn missing_timestamp_defaults_to_now() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("a".into(), record(Some(100)));
        snapshot.insert("b".into(), record(None));

        let reports = reports_from_snapshot(&snapshot, 5_000);

        assert_eq!(reports[0].id, "b");
        assert_eq!(reports[0].timestamp, 5_000);
        assert_eq!(reports[0].user_id, "b");
    }

    #[test]
    fn ties_keep_identity_order() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("z".into(), record(Some(7)));
        snapshot.insert("m".into(), record(Some(7)));

        let ids = reports_from_snapshot(&snapshot, 0).into_iter()
            .map(|r| r.id)
            .collect::<Vec<_>>();

        assert_eq!(ids, vec!["m", "z"]);
    }
}
