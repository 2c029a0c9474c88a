// SPDX-License-Identifier: MIT

//! Weather lookups through the Open-Meteo geocoding and forecast APIs

use crate::adk::error::ToolError;
use crate::adk::tool::{parse_input, Tool};
use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

const CURRENT_FIELDS: &str = "temperature_2m,rain,relative_humidity_2m,wind_speed_10m";
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,rain_sum";

static OPENMETEO_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "location_name": {
                "type": "string",
                "description": "The name of the location to retrieve weather information."
            },
            "country": {
                "type": "string",
                "description": "Country name."
            },
            "start_date": {
                "type": "string",
                "description": "Start date for the weather forecast in the format YYYY-MM-DD (UTC)"
            },
            "end_date": {
                "type": "string",
                "description": "End date for the weather forecast in the format YYYY-MM-DD (UTC)"
            },
            "temperature_unit": {
                "type": "string",
                "enum": ["celsius", "fahrenheit"],
                "default": "celsius"
            }
        },
        "required": ["location_name"]
    })
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    fn as_str(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "celsius",
            TemperatureUnit::Fahrenheit => "fahrenheit",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenMeteoInput {
    pub location_name: String,
    pub country: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
}

/// Date range checked against the `YYYY-MM-DD` format
#[derive(Debug, PartialEq)]
struct DateRange {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl OpenMeteoInput {
    fn date_range(&self) -> Result<DateRange, ToolError> {
        let start = parse_date("start_date", self.start_date.as_deref())?;
        let end = parse_date("end_date", self.end_date.as_deref())?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ToolError::InputValidation(format!(
                    "start_date {} is after end_date {}",
                    start, end
                )));
            }
        }
        Ok(DateRange { start, end })
    }
}

fn parse_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, ToolError> {
    raw.map(|value| {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
            ToolError::InputValidation(format!(
                "{} must be in the format YYYY-MM-DD, got '{}'",
                field, value
            ))
        })
    })
    .transpose()
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<Location>,
}

#[derive(Debug, Deserialize)]
struct Location {
    latitude: f64,
    longitude: f64,
}

pub struct OpenMeteoTool {
    client: Client,
}

impl OpenMeteoTool {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn geocode(&self, input: &OpenMeteoInput) -> Result<Location, ToolError> {
        let mut params = vec![
            ("name", input.location_name.clone()),
            ("count", "1".to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ];
        if let Some(country) = &input.country {
            params.push(("country", country.clone()));
        }
        let url = Url::parse_with_params(GEOCODING_URL, &params)
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        let resp = self.client.get(url).send().await?.error_for_status()?;
        let body: GeocodingResponse = resp.json().await?;
        body.results.into_iter().next().ok_or_else(|| {
            ToolError::Execution(format!("Location '{}' was not found", input.location_name))
        })
    }
}

impl Default for OpenMeteoTool {
    fn default() -> Self {
        Self::new()
    }
}

fn forecast_params(
    location: &Location,
    range: &DateRange,
    unit: TemperatureUnit,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("latitude", location.latitude.to_string()),
        ("longitude", location.longitude.to_string()),
        ("current", CURRENT_FIELDS.to_string()),
        ("daily", DAILY_FIELDS.to_string()),
        ("timezone", "UTC".to_string()),
        ("temperature_unit", unit.as_str().to_string()),
    ];
    if let Some(start) = range.start {
        params.push(("start_date", start.to_string()));
    }
    if let Some(end) = range.end {
        params.push(("end_date", end.to_string()));
    }
    params
}

#[async_trait]
impl Tool for OpenMeteoTool {
    fn name(&self) -> &str {
        "openmeteo"
    }

    fn description(&self) -> &str {
        "Retrieve current, past, or future weather forecasts for a location."
    }

    fn schema(&self) -> &Value {
        &OPENMETEO_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let input: OpenMeteoInput = parse_input(input)?;
        if input.location_name.trim().is_empty() {
            return Err(ToolError::InputValidation(
                "location_name must not be empty".to_string(),
            ));
        }
        let range = input.date_range()?;

        let location = self.geocode(&input).await?;
        log::debug!(
            "Resolved {} to {}, {}",
            input.location_name,
            location.latitude,
            location.longitude
        );

        let params = forecast_params(&location, &range, input.temperature_unit);
        let url = Url::parse_with_params(FORECAST_URL, &params)
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(value: Value) -> OpenMeteoInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_input_defaults() {
        let input = input(json!({"location_name": "White Plains"}));
        assert_eq!(input.temperature_unit, TemperatureUnit::Celsius);
        assert!(input.country.is_none());
        assert_eq!(
            input.date_range().unwrap(),
            DateRange {
                start: None,
                end: None
            }
        );
    }

    #[test]
    fn test_bad_start_date_format() {
        let input = input(json!({
            "location_name": "White Plains",
            "start_date": "2025:01:01",
            "end_date": "2025:01:02"
        }));
        let err = input.date_range().unwrap_err();
        assert!(matches!(err, ToolError::InputValidation(msg) if msg.contains("start_date")));
    }

    #[test]
    fn test_bad_end_date_format() {
        let input = input(json!({
            "location_name": "White Plains",
            "start_date": "2025-01-01",
            "end_date": "2025:01:02"
        }));
        let err = input.date_range().unwrap_err();
        assert!(matches!(err, ToolError::InputValidation(msg) if msg.contains("end_date")));
    }

    #[test]
    fn test_start_after_end() {
        let input = input(json!({
            "location_name": "White Plains",
            "start_date": "2025-02-02",
            "end_date": "2025-02-01"
        }));
        assert!(matches!(
            input.date_range(),
            Err(ToolError::InputValidation(_))
        ));
    }

    #[test]
    fn test_forecast_params() {
        let location = Location {
            latitude: 41.03,
            longitude: -73.76,
        };
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2025, 1, 1),
            end: None,
        };
        let params = forecast_params(&location, &range, TemperatureUnit::Fahrenheit);

        assert!(params.contains(&("temperature_unit", "fahrenheit".to_string())));
        assert!(params.contains(&("start_date", "2025-01-01".to_string())));
        assert!(params.contains(&("current", CURRENT_FIELDS.to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "end_date"));
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_request() {
        let tool = OpenMeteoTool::new();

        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InputValidation(_)));

        let err = tool.execute(json!({"location_name": 1})).await.unwrap_err();
        assert!(matches!(err, ToolError::InputValidation(_)));

        let err = tool
            .execute(json!({"location_name": "Cambridge", "temperature_unit": "kelvin"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InputValidation(_)));
    }
}
