//! Weather lookup via WeatherAPI.com current conditions

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::ContentResponder;
use crate::types::{ConversationThread, Responder};

/// Words that end a location phrase ("weather in Paris today")
const LOCATION_STOPWORDS: &[&str] = &[
    "today", "tomorrow", "tonight", "now", "please", "right", "this", "next", "week",
];

/// Current-conditions lookup against WeatherAPI.com
pub struct WeatherLookup {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for WeatherLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked_key = if self.api_key.len() > 7 {
            format!(
                "{}...{}",
                &self.api_key[..3],
                &self.api_key[self.api_key.len() - 4..]
            )
        } else {
            "***".to_string()
        };
        f.debug_struct("WeatherLookup")
            .field("api_key", &masked_key)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct WeatherData {
    location: Location,
    current: Current,
}

#[derive(Debug, Deserialize)]
struct Location {
    name: String,
    region: String,
    country: String,
    localtime: String,
}

#[derive(Debug, Deserialize)]
struct Current {
    temp_c: f64,
    temp_f: f64,
    feelslike_c: f64,
    feelslike_f: f64,
    condition: Condition,
    humidity: f64,
    wind_kph: f64,
    wind_mph: f64,
    wind_dir: String,
    vis_km: f64,
    vis_miles: f64,
    pressure_mb: f64,
    pressure_in: f64,
    uv: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    text: String,
}

impl WeatherLookup {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: "https://api.weatherapi.com".to_string(),
        }
    }

    /// Set a custom base URL (e.g. for a stub server)
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Fetch and format current conditions for a location.
    ///
    /// "Location not found" and "auth failure" both surface as
    /// human-readable message strings, not distinct error types.
    async fn fetch(&self, location: &str) -> Result<String> {
        debug!("Fetching weather data for: {}", location);

        let url = format!("{}/v1/current.json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("q", location), ("aqi", "no")])
            .send()
            .await
            .context("Failed to reach weather service")?;

        let status = response.status();
        if status.as_u16() == 400 {
            warn!("Weather location not found: {}", location);
            return Ok(format!(
                "Location '{location}' not found. Please check the spelling."
            ));
        }
        if status.as_u16() == 401 {
            warn!("Weather API authentication failed");
            return Ok("Weather service authentication failed.".to_string());
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Weather request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let data: WeatherData = response
            .json()
            .await
            .context("Failed to parse weather response")?;

        Ok(format_weather(&data))
    }
}

#[async_trait]
impl ContentResponder for WeatherLookup {
    fn responder(&self) -> Responder {
        Responder::WeatherLookup
    }

    async fn respond(&self, input: &str, _thread: &ConversationThread) -> Result<String> {
        match extract_location(input) {
            Some(location) => self.fetch(&location).await,
            None => Ok(
                "I can look up current weather for you — which city or location \
                 would you like?"
                    .to_string(),
            ),
        }
    }
}

fn format_weather(data: &WeatherData) -> String {
    let location = &data.location;
    let current = &data.current;
    format!(
        "Weather for {}, {}, {}:\n\
         Local time: {}\n\
         Temperature: {}°C ({}°F)\n\
         Feels like: {}°C ({}°F)\n\
         Condition: {}\n\
         Humidity: {}%\n\
         Wind: {} km/h ({} mph) {}\n\
         Visibility: {} km ({} miles)\n\
         Pressure: {} mb ({} in)\n\
         UV Index: {}",
        location.name,
        location.region,
        location.country,
        location.localtime,
        current.temp_c,
        current.temp_f,
        current.feelslike_c,
        current.feelslike_f,
        current.condition.text,
        current.humidity,
        current.wind_kph,
        current.wind_mph,
        current.wind_dir,
        current.vis_km,
        current.vis_miles,
        current.pressure_mb,
        current.pressure_in,
        current.uv,
    )
}

/// Pull a location name out of the request: the words following "in" or
/// "for", up to punctuation or a stopword.
fn extract_location(input: &str) -> Option<String> {
    let words: Vec<&str> = input.split_whitespace().collect();

    for (i, word) in words.iter().enumerate() {
        let marker = word.trim_matches([',', '.', '?', '!']).to_lowercase();
        if marker != "in" && marker != "for" {
            continue;
        }

        let mut location_words = Vec::new();
        for candidate in &words[i + 1..] {
            let cleaned = candidate.trim_matches([',', '.', '?', '!']);
            if cleaned.is_empty() || LOCATION_STOPWORDS.contains(&cleaned.to_lowercase().as_str())
            {
                break;
            }
            let ended_by_punctuation = candidate.len() != cleaned.len();
            location_words.push(cleaned);
            if ended_by_punctuation {
                break;
            }
        }

        if !location_words.is_empty() {
            return Some(location_words.join(" "));
        }
    }

    None
}
