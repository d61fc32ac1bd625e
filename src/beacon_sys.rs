use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rocket::FromFormField;

use crate::marker_sys::LatLon;
use crate::util;


// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');


#[derive(Debug, Clone, Copy, PartialEq, Eq, FromFormField)]
pub enum BeaconStatus {
    #[field(value = "safe_and_sound")]
    SafeAndSound,
    #[field(value = "need_assistance")]
    NeedAssistance,
    #[field(value = "stranded")]
    Stranded,
    #[field(value = "injured")]
    Injured,
    #[field(value = "moved_to_safe_zone")]
    MovedToSafeZone,
}

impl BeaconStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BeaconStatus::SafeAndSound => "Safe and sound",
            BeaconStatus::NeedAssistance => "Need assistance (food, water)",
            BeaconStatus::Stranded => "Stranded (cannot move)",
            BeaconStatus::Injured => "Injured / Medical attention needed",
            BeaconStatus::MovedToSafeZone => "Moved to a safe zone",
        }
    }
}

impl Default for BeaconStatus {
    fn default() -> Self {
        BeaconStatus::SafeAndSound
    }
}


/// Inputs of a safety message. Empty strings count as not given.
#[derive(Debug, Clone, Default)]
pub struct Beacon {
    pub status: BeaconStatus,
    pub location: String,
    pub custom_message: String,
    pub contact_number: String,
}

impl Beacon {
    pub fn compose(&self, position: LatLon) -> String {
        let mut message = format!("Crisis Update: I am {}.", self.status.label());

        let location = self.location.trim();
        if !location.is_empty() {
            message += &format!(" My approximate location is: {}.", location);
        }
        else {
            message += &format!(" My approximate coordinates are {}.",
                util::format_coordinates(position.lat, position.lon));
        }

        let custom = self.custom_message.trim();
        if !custom.is_empty() {
            message += &format!(" Additional info: {}.", custom);
        }

        let contact = self.contact_number.trim();
        if !contact.is_empty() {
            message += &format!(" Please contact me at: {}.", contact);
        }

        message
    }
}

/// Link that opens the SMS app with `message` filled in.
pub fn sms_link(message: &str) -> String {
    format!("sms:?body={}", utf8_percent_encode(message, URI_COMPONENT))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_message() {
        let beacon = Beacon {
            status: BeaconStatus::Injured,
            location: "Malolos, Bulacan".into(),
            custom_message: "Sugatan ako, need ng rescue!".into(),
            contact_number: "+639171234567".into(),
        };

        assert_eq!(beacon.compose(LatLon::new(0.0, 0.0)),
            "Crisis Update: I am Injured / Medical attention needed. \
             My approximate location is: Malolos, Bulacan. \
             Additional info: Sugatan ako, need ng rescue!. \
             Please contact me at: +639171234567.");
    }

    #[test]
    fn coordinates_when_location_blank() {
        let beacon = Beacon {
            location: "  ".into(),
            ..Beacon::default()
        };

        assert_eq!(beacon.compose(LatLon::new(14.79213, 120.87821)),
            "Crisis Update: I am Safe and sound. \
             My approximate coordinates are Lat: 14.7921, Lon: 120.8782.");
    }

    #[test]
    fn sms_link_encodes_like_uri_component() {
        assert_eq!(sms_link("I am safe (home) & ok: +63"),
            "sms:?body=I%20am%20safe%20(home)%20%26%20ok%3A%20%2B63");
    }

    #[test]
    fn every_status_reads_naturally() {
        let message = Beacon {
            status: BeaconStatus::MovedToSafeZone,
            location: "Evacuation center".into(),
            ..Beacon::default()
        }.compose(LatLon::new(0.0, 0.0));

        assert!(message.starts_with("Crisis Update: I am Moved to a safe zone."));
    }
}
