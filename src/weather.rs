//! Live observation source
//!
//! Supplies the seed observation a forecast starts from. The shipped provider
//! summarises the next 24 hours of the OpenWeatherMap 5-day/3-hour forecast.

use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::RetryTransientMiddleware;
use reqwest_retry::policies::ExponentialBackoff;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::config::WeatherConfig;
use crate::models::SeedObservation;
use crate::{Result, SkycastError};

/// Anything that can supply a forecast seed for a city
pub trait ObservationSource {
    /// Current conditions for `city`, dated today
    async fn fetch_seed(&self, city: &str) -> Result<SeedObservation>;
}

/// OpenWeatherMap forecast client
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: ClientWithMiddleware,
    api_key: Option<String>,
    base_url: String,
    window_entries: usize,
}

impl OpenWeatherClient {
    /// Create a client with retrying transport
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("skycast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SkycastError::upstream(format!("failed to create HTTP client: {e}")))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            window_entries: config.window_entries,
        })
    }

    fn forecast_url(&self, api_key: &str, city: &str) -> String {
        format!(
            "{}/forecast?appid={}&q={}&units=metric",
            self.base_url,
            urlencoding::encode(api_key),
            urlencoding::encode(city)
        )
    }
}

impl ObservationSource for OpenWeatherClient {
    #[instrument(name = "fetch_seed", skip(self))]
    async fn fetch_seed(&self, city: &str) -> Result<SeedObservation> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SkycastError::upstream("no weather API key configured (set weather.api_key)"))?;

        info!("Fetching live conditions for {city}");
        let start = Instant::now();

        let response = self
            .client
            .get(self.forecast_url(api_key, city))
            .send()
            .await
            .map_err(|e| SkycastError::upstream(format!("request failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SkycastError::upstream(format!("failed to read response body: {e}")))?;
        debug!(%status, bytes = body.len(), elapsed_ms = start.elapsed().as_millis() as u64, "Weather API responded");

        let seed = parse_observation(&body, self.window_entries, Local::now().date_naive())?;
        info!(
            "Live data for {city}: high {:.2}°C, low {:.2}°C, humidity {:.0}%",
            seed.features.max_temp, seed.features.min_temp, seed.features.humidity
        );
        Ok(seed)
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    cod: serde_json::Value,
    #[serde(default)]
    message: Option<serde_json::Value>,
    #[serde(default)]
    list: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    main: MainReadings,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp_min: f64,
    temp_max: f64,
    humidity: f64,
}

impl ForecastResponse {
    /// `cod` arrives as a string on success and sometimes as a number on errors
    fn is_ok(&self) -> bool {
        match &self.cod {
            serde_json::Value::String(code) => code == "200",
            serde_json::Value::Number(code) => code.as_u64() == Some(200),
            _ => false,
        }
    }
}

/// Build a seed from a forecast response body.
///
/// Uses the first `window` entries: the highest `temp_max`, the lowest
/// `temp_min`, and the humidity of the first entry. The seed is dated `today`.
pub fn parse_observation(body: &str, window: usize, today: NaiveDate) -> Result<SeedObservation> {
    let response: ForecastResponse = serde_json::from_str(body)
        .map_err(|e| SkycastError::upstream(format!("unexpected response format: {e}")))?;

    if !response.is_ok() {
        let detail = response
            .message
            .as_ref()
            .map(|message| message.as_str().map_or_else(|| message.to_string(), str::to_string))
            .unwrap_or_default();
        warn!(cod = %response.cod, "Weather API reported an error");
        return Err(SkycastError::upstream(format!("API returned code {}: {detail}", response.cod)));
    }

    let entries = &response.list[..window.min(response.list.len())];
    let first = entries
        .first()
        .ok_or_else(|| SkycastError::upstream("response contains no forecast entries"))?;

    let max_temp = entries.iter().map(|entry| entry.main.temp_max).fold(f64::NEG_INFINITY, f64::max);
    let min_temp = entries.iter().map(|entry| entry.main.temp_min).fold(f64::INFINITY, f64::min);

    Ok(SeedObservation::new(today, max_temp, min_temp, first.main.humidity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SkycastConfig;
    use crate::models::day_of_year;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 7, 19).unwrap()
    }

    fn entry(temp_min: f64, temp_max: f64, humidity: u32) -> serde_json::Value {
        json!({
            "dt": 1_658_210_400,
            "main": { "temp": (temp_min + temp_max) / 2.0, "temp_min": temp_min, "temp_max": temp_max, "humidity": humidity },
            "dt_txt": "2022-07-19 06:00:00"
        })
    }

    #[test]
    fn test_summarises_first_window() {
        let mut list: Vec<_> = (0..8).map(|i| entry(27.0 - f64::from(i) * 0.1, 29.0 + f64::from(i) * 0.3, 78 + i)).collect();
        list[5] = entry(26.0, 32.0, 90);
        // Outside the window; must be ignored
        list.push(entry(10.0, 45.0, 10));
        let body = json!({ "cod": "200", "message": 0, "cnt": list.len(), "list": list }).to_string();

        let seed = parse_observation(&body, 8, today()).unwrap();

        assert_eq!(seed.date, today());
        assert_eq!(seed.features.max_temp, 32.0);
        assert_eq!(seed.features.min_temp, 26.0);
        assert_eq!(seed.features.humidity, 78.0);
        assert_eq!(seed.features.day_of_year, day_of_year(today()));
        assert!(seed.is_consistent());
    }

    #[test]
    fn test_short_list_uses_what_is_there() {
        let body = json!({ "cod": "200", "list": [entry(24.0, 30.0, 70), entry(23.0, 31.0, 72)] }).to_string();
        let seed = parse_observation(&body, 8, today()).unwrap();
        assert_eq!(seed.features.max_temp, 31.0);
        assert_eq!(seed.features.min_temp, 23.0);
        assert_eq!(seed.features.humidity, 70.0);
    }

    #[test]
    fn test_error_codes_are_upstream_failures() {
        let not_found = json!({ "cod": "404", "message": "city not found" }).to_string();
        let err = parse_observation(&not_found, 8, today()).unwrap_err();
        assert!(matches!(err, SkycastError::UpstreamUnavailable { .. }));
        assert!(err.to_string().contains("city not found"));

        let unauthorised = json!({ "cod": 401, "message": "Invalid API key" }).to_string();
        let err = parse_observation(&unauthorised, 8, today()).unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_numeric_success_code_is_accepted() {
        let body = json!({ "cod": 200, "list": [entry(24.0, 30.0, 70)] }).to_string();
        assert!(parse_observation(&body, 8, today()).is_ok());
    }

    #[test]
    fn test_empty_or_malformed_response() {
        let empty = json!({ "cod": "200", "list": [] }).to_string();
        assert!(matches!(
            parse_observation(&empty, 8, today()),
            Err(SkycastError::UpstreamUnavailable { .. })
        ));
        assert!(matches!(
            parse_observation("<html>busy</html>", 8, today()),
            Err(SkycastError::UpstreamUnavailable { .. })
        ));
    }

    #[test]
    fn test_forecast_url_encodes_city() {
        let client = OpenWeatherClient::new(&SkycastConfig::default().weather).unwrap();
        let url = client.forecast_url("abcdef123456", "New Delhi");
        assert_eq!(
            url,
            "https://api.openweathermap.org/data/2.5/forecast?appid=abcdef123456&q=New%20Delhi&units=metric"
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_request() {
        let mut config = SkycastConfig::default().weather;
        config.api_key = None;
        config.base_url = "http://127.0.0.1:9".to_string();
        let client = OpenWeatherClient::new(&config).unwrap();

        let err = client.fetch_seed("Kolkata").await.unwrap_err();
        assert!(matches!(err, SkycastError::UpstreamUnavailable { .. }));
        assert!(err.to_string().contains("API key"));
    }
}
