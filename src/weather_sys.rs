use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::WeatherError;
use crate::marker_sys::LatLon;


#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Weather {
    pub location: String,
    pub country: String,
    pub temperature: f64,
    pub description: String,
    pub icon: String,
    pub humidity: f64,
    pub wind_speed: f64,
}

impl Weather {
    pub fn icon_url(&self) -> String {
        format!("https://openweathermap.org/img/wn/{}@2x.png", self.icon)
    }
}


// Fields of the current weather response we read.
#[derive(Deserialize)]
struct CurrentWeather {
    #[serde(default)]
    name: String,
    #[serde(default)]
    sys: CurrentSys,
    main: CurrentMain,
    #[serde(default)]
    weather: Vec<CurrentCondition>,
    #[serde(default)]
    wind: CurrentWind,
}

#[derive(Deserialize, Default)]
struct CurrentSys {
    #[serde(default)]
    country: String,
}

#[derive(Deserialize)]
struct CurrentMain {
    temp: f64,
    humidity: f64,
}

#[derive(Deserialize)]
struct CurrentCondition {
    description: String,
    icon: String,
}

#[derive(Deserialize, Default)]
struct CurrentWind {
    #[serde(default)]
    speed: f64,
}

impl From<CurrentWeather> for Weather {
    fn from(res: CurrentWeather) -> Self {
        let (description, icon) = res.weather.into_iter()
            .next()
            .map(|c| (c.description, c.icon))
            .unwrap_or_default();

        Weather {
            location: res.name,
            country: res.sys.country,
            temperature: res.main.temp,
            description,
            icon,
            humidity: res.main.humidity,
            wind_speed: res.wind.speed,
        }
    }
}

pub fn parse_weather(json: &str) -> Result<Weather, serde_json::Error> {
    serde_json::from_str::<CurrentWeather>(json).map(Weather::from)
}

pub fn check_status(status: StatusCode) -> Result<(), WeatherError> {
    if status == StatusCode::UNAUTHORIZED {
        Err(WeatherError::Unauthorized)
    }
    else if !status.is_success() {
        Err(WeatherError::Http(status.as_u16()))
    }
    else {
        Ok(())
    }
}

/// Text shown in place of the weather card.
pub fn describe_failure(err: &WeatherError) -> String {
    match err {
        WeatherError::MissingKey => format!("{}.", err),
        _ => format!("Failed to fetch weather data: {}.", err),
    }
}


#[derive(Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl WeatherClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        WeatherClient {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Current weather at `position`, metric units.
    pub async fn fetch(&self, position: LatLon) -> Result<Weather, WeatherError> {
        let api_key = self.api_key.as_ref().ok_or(WeatherError::MissingKey)?;

        let res = self.http
            .get(format!("{}/data/2.5/weather", self.base_url))
            .query(&[
                ("lat", position.lat.to_string()),
                ("lon", position.lon.to_string()),
                ("appid", api_key.clone()),
                ("units", "metric".to_owned()),
            ])
            .send()
            .await?;

        check_status(res.status())?;

        let body = res.text().await?;
        parse_weather(&body).map_err(|err| {
            warn!("Unexpected weather response: {}", err);
            WeatherError::Malformed
        })
    }
}
