use serde::Deserialize;

use crate::error::GeocodeError;
use crate::marker_sys::LatLon;
use crate::util;


#[derive(Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

pub fn parse_display_name(json: &str) -> Result<String, GeocodeError> {
    serde_json::from_str::<ReverseResponse>(json)
        .ok()
        .and_then(|res| res.display_name)
        .filter(|name| !name.trim().is_empty())
        .ok_or(GeocodeError::MissingName)
}

/// Place name for the page, or plain coordinates when the lookup failed.
pub fn location_label(result: Result<String, GeocodeError>, position: LatLon) -> String {
    match result {
        Ok(name) => name,
        Err(err) => {
            warn!("Fail to reverse geocode {:?}: {}", position, err);
            util::format_coordinates(position.lat, position.lon)
        },
    }
}


#[derive(Clone)]
pub struct GeocodeClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeocodeClient {
    /// `http` must carry an identifying User-Agent; the public service
    /// refuses anonymous clients.
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        GeocodeClient {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    pub async fn reverse(&self, position: LatLon) -> Result<String, GeocodeError> {
        let res = self.http
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "json".to_owned()),
                ("lat", position.lat.to_string()),
                ("lon", position.lon.to_string()),
            ])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(GeocodeError::Http(res.status().as_u16()));
        }

        parse_display_name(&res.text().await?)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_display_name() {
        let name = parse_display_name(r#"{"place_id": 1, "display_name": "Malolos, Bulacan, Philippines"}"#);

        assert_eq!(name.unwrap(), "Malolos, Bulacan, Philippines");
    }

    #[test]
    fn error_body_has_no_name() {
        assert!(matches!(parse_display_name(r#"{"error": "Unable to geocode"}"#), Err(GeocodeError::MissingName)));
        assert!(matches!(parse_display_name("<html>"), Err(GeocodeError::MissingName)));
    }

    #[test]
    fn failure_falls_back_to_coordinates() {
        let label = location_label(Err(GeocodeError::Http(503)), LatLon::new(14.79213, 120.87821));

        assert_eq!(label, "Lat: 14.7921, Lon: 120.8782");
    }

    #[test]
    fn success_uses_name() {
        let label = location_label(Ok("Hagonoy".into()), LatLon::new(0.0, 0.0));

        assert_eq!(label, "Hagonoy");
    }
}
