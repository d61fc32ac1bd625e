use thiserror::Error;


#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Fail to connect to the report store: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Report store query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Invalid report path: {0}")]
    InvalidPath(String),
}


#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Password environment variable not set.")]
    Misconfigured,

    #[error("Incorrect password. Please try again.")]
    IncorrectPassword,
}


#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Please wait for authentication and database to initialize.")]
    NotReady,

    #[error("There is no report waiting for confirmation.")]
    NotAwaitingConfirmation,

    #[error("Failed to send report. Please try again.")]
    Write(#[from] StoreError),
}


#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Please get your OpenWeatherMap API key and set OPENWEATHER_API_KEY")]
    MissingKey,

    #[error("Unauthorized: Please check your OpenWeatherMap API key. It might be incorrect or not activated yet")]
    Unauthorized,

    #[error("HTTP error! status: {0}")]
    Http(u16),

    #[error("Unexpected response from the weather service")]
    Malformed,

    #[error("{0}")]
    Request(#[from] reqwest::Error),
}


#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP error! status: {0}")]
    Http(u16),

    #[error("No display name for this location")]
    MissingName,
}


#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {key} value: {value}")]
    Invalid { key: String, value: String },
}
