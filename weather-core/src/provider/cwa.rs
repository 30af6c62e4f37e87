use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;

use crate::{
    error::{Endpoint, FetchError},
    model::{CurrentObservation, ForecastSummary, taiwan_offset},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://opendata.cwa.gov.tw/api/v1/rest/datastore";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the CWA open-data datastore.
#[derive(Debug, Clone)]
pub struct CwaProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl CwaProvider {
    pub fn with_options(
        api_key: String,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key,
            base_url: base_url.into(),
            http,
        })
    }

    async fn get_dataset<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        location_name: &str,
    ) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint.dataset_id());
        debug!(%endpoint, location_name, "requesting CWA dataset");

        let res = self
            .http
            .get(&url)
            .query(&[
                ("Authorization", self.api_key.as_str()),
                ("locationName", location_name),
            ])
            .send()
            .await
            .map_err(|e| FetchError::network(endpoint, e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| FetchError::network(endpoint, e))?;

        if !status.is_success() {
            return Err(FetchError::http_status(endpoint, status.as_u16(), truncate_body(&body)));
        }

        serde_json::from_str(&body).map_err(|e| FetchError::parse(endpoint, e.to_string()))
    }
}

#[async_trait]
impl WeatherProvider for CwaProvider {
    async fn current_observation(
        &self,
        location_name: &str,
    ) -> Result<CurrentObservation, FetchError> {
        let parsed: ObservationResponse =
            self.get_dataset(Endpoint::Observation, location_name).await?;
        parsed
            .into_observation()
            .map_err(|detail| FetchError::parse(Endpoint::Observation, detail))
    }

    async fn forecast(&self, city_name: &str) -> Result<ForecastSummary, FetchError> {
        let parsed: ForecastResponse = self.get_dataset(Endpoint::Forecast, city_name).await?;
        parsed.into_summary().map_err(|detail| FetchError::parse(Endpoint::Forecast, detail))
    }
}

#[derive(Debug, Deserialize)]
struct ObservationResponse {
    records: ObservationRecords,
}

#[derive(Debug, Deserialize)]
struct ObservationRecords {
    location: Vec<ObservationLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationLocation {
    time: ObservationTime,
    location_name: String,
    weather_element: Vec<ObservationElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationTime {
    obs_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationElement {
    element_name: String,
    element_value: serde_json::Value,
}

impl ObservationResponse {
    fn into_observation(self) -> Result<CurrentObservation, String> {
        let location = self
            .records
            .location
            .into_iter()
            .next()
            .ok_or_else(|| "response contained no location".to_string())?;

        let mut temperature = None;
        let mut wind_speed = None;
        for element in &location.weather_element {
            match element.element_name.as_str() {
                "TEMP" => temperature = Some(numeric_value(&element.element_value, "TEMP")?),
                "WDSD" => wind_speed = Some(numeric_value(&element.element_value, "WDSD")?),
                _ => {}
            }
        }

        Ok(CurrentObservation {
            observation_time: parse_obs_time(&location.time.obs_time)?,
            location_name: location.location_name,
            temperature: temperature.ok_or("missing element TEMP")?,
            wind_speed: wind_speed.ok_or("missing element WDSD")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    records: ForecastRecords,
}

#[derive(Debug, Deserialize)]
struct ForecastRecords {
    location: Vec<ForecastLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastLocation {
    weather_element: Vec<ForecastElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastElement {
    element_name: String,
    /// Only decoded for the elements we read.
    #[serde(default)]
    time: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ForecastBucket {
    parameter: ForecastParameter,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastParameter {
    parameter_name: String,
    #[serde(default)]
    parameter_value: Option<String>,
}

impl ForecastResponse {
    fn into_summary(self) -> Result<ForecastSummary, String> {
        let location = self
            .records
            .location
            .into_iter()
            .next()
            .ok_or_else(|| "response contained no location".to_string())?;

        let mut wx = None;
        let mut pop = None;
        let mut ci = None;
        for element in location.weather_element {
            let slot = match element.element_name.as_str() {
                "Wx" => &mut wx,
                "PoP" => &mut pop,
                "CI" => &mut ci,
                _ => continue,
            };
            *slot = first_parameter(element.time, &element.element_name)?;
        }

        let wx = wx.ok_or("missing element Wx")?;
        let pop = pop.ok_or("missing element PoP")?;
        let ci = ci.ok_or("missing element CI")?;

        let code = wx.parameter_value.as_deref().ok_or("Wx has no parameterValue")?;
        let weather_code =
            code.trim().parse().map_err(|_| format!("invalid Wx parameterValue '{code}'"))?;
        let rain_possibility = pop
            .parameter_name
            .trim()
            .parse()
            .map_err(|_| format!("invalid PoP parameterName '{}'", pop.parameter_name))?;

        Ok(ForecastSummary {
            description: wx.parameter_name,
            weather_code,
            rain_possibility,
            comfortability: ci.parameter_name,
        })
    }
}

fn first_parameter(
    time: serde_json::Value,
    name: &str,
) -> Result<Option<ForecastParameter>, String> {
    let buckets: Vec<ForecastBucket> =
        serde_json::from_value(time).map_err(|e| format!("invalid {name} time series: {e}"))?;
    Ok(buckets.into_iter().next().map(|bucket| bucket.parameter))
}

/// `elementValue` is a string in older payloads, a number or `{ "value": .. }`
/// in newer ones.
fn numeric_value(value: &serde_json::Value, name: &str) -> Result<f64, String> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Object(map) => {
            return map
                .get("value")
                .ok_or_else(|| format!("{name} has no value"))
                .and_then(|inner| numeric_value(inner, name));
        }
        _ => None,
    };
    parsed.ok_or_else(|| format!("{name} is not numeric: {value}"))
}

fn parse_obs_time(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .and_then(|naive| taiwan_offset().from_local_datetime(&naive).single())
        .ok_or_else(|| format!("invalid obsTime '{raw}'"))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;
    use crate::location::resolve;
    use crate::provider::fetch_snapshot;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn observation_body(temp: serde_json::Value, wdsd: serde_json::Value) -> serde_json::Value {
        json!({
            "success": "true",
            "records": {
                "location": [{
                    "lat": "25.039410",
                    "lon": "121.506779",
                    "locationName": "臺北",
                    "stationId": "466920",
                    "time": { "obsTime": "2024-03-01 14:00:00" },
                    "weatherElement": [
                        { "elementName": "ELEV", "elementValue": "5.3" },
                        { "elementName": "WDSD", "elementValue": wdsd },
                        { "elementName": "TEMP", "elementValue": temp },
                        { "elementName": "HUMD", "elementValue": "0.81" }
                    ]
                }]
            }
        })
    }

    fn forecast_body() -> serde_json::Value {
        json!({
            "success": "true",
            "records": {
                "datasetDescription": "三十六小時天氣預報",
                "location": [{
                    "locationName": "臺北市",
                    "weatherElement": [
                        { "elementName": "Wx", "time": [
                            { "startTime": "2024-03-01 12:00:00", "endTime": "2024-03-01 18:00:00",
                              "parameter": { "parameterName": "多雲", "parameterValue": "4" } },
                            { "startTime": "2024-03-01 18:00:00", "endTime": "2024-03-02 06:00:00",
                              "parameter": { "parameterName": "陰天", "parameterValue": "7" } }
                        ]},
                        { "elementName": "PoP", "time": [
                            { "parameter": { "parameterName": "30", "parameterUnit": "百分比" } }
                        ]},
                        { "elementName": "MinT", "time": [
                            { "parameter": { "parameterName": "18", "parameterUnit": "C" } }
                        ]},
                        { "elementName": "CI", "time": [
                            { "parameter": { "parameterName": "舒適" } }
                        ]}
                    ]
                }]
            }
        })
    }

    async fn mount(server: &MockServer, dataset: &str, location: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/{dataset}")))
            .and(query_param("Authorization", "TEST-KEY"))
            .and(query_param("locationName", location))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn provider_for(server: &MockServer) -> CwaProvider {
        CwaProvider::with_options("TEST-KEY".into(), server.uri(), DEFAULT_TIMEOUT).unwrap()
    }

    #[tokio::test]
    async fn merges_observation_and_forecast_fixtures() {
        let server = MockServer::start().await;
        let observation = observation_body(json!("21.3"), json!("2.1"));
        mount(&server, "O-A0003-001", "臺北", observation).await;
        mount(&server, "F-C0032-001", "臺北市", forecast_body()).await;

        let provider = provider_for(&server);
        let snapshot = fetch_snapshot(&provider, resolve("臺北市").unwrap()).await.unwrap();

        assert_eq!(snapshot.temperature, 21.3);
        assert_eq!(snapshot.wind_speed, 2.1);
        assert_eq!(snapshot.description, "多雲");
        assert_eq!(snapshot.weather_code, 4);
        assert_eq!(snapshot.rain_possibility, 30);
        assert_eq!(snapshot.comfortability, "舒適");
        assert_eq!(snapshot.location_name, "臺北");
        assert_eq!(snapshot.observation_time.to_rfc3339(), "2024-03-01T14:00:00+08:00");
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn accepts_numeric_and_nested_element_values() {
        let server = MockServer::start().await;
        let observation = observation_body(json!(18.5), json!({ "value": "3.4" }));
        mount(&server, "O-A0003-001", "臺北", observation).await;

        let obs = provider_for(&server).current_observation("臺北").await.unwrap();
        assert_eq!(obs.temperature, 18.5);
        assert_eq!(obs.wind_speed, 3.4);
    }

    #[tokio::test]
    async fn non_success_status_is_reported_per_endpoint() {
        let server = MockServer::start().await;
        let observation = observation_body(json!("21.3"), json!("2.1"));
        mount(&server, "O-A0003-001", "臺北", observation).await;
        Mock::given(method("GET"))
            .and(path("/F-C0032-001"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let err = fetch_snapshot(&provider_for(&server), resolve("臺北市").unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.endpoint, Endpoint::Forecast);
        match err.kind {
            FetchErrorKind::HttpStatus { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Unauthorized");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/O-A0003-001"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = provider_for(&server).current_observation("臺北").await.unwrap_err();
        assert_eq!(err.endpoint, Endpoint::Observation);
        assert!(matches!(err.kind, FetchErrorKind::Parse(_)));
    }

    #[tokio::test]
    async fn missing_required_element_is_a_parse_error() {
        let server = MockServer::start().await;
        let mut body = forecast_body();
        body["records"]["location"][0]["weatherElement"]
            .as_array_mut()
            .unwrap()
            .retain(|e| e["elementName"] != "CI");
        mount(&server, "F-C0032-001", "臺北市", body).await;

        let err = provider_for(&server).forecast("臺北市").await.unwrap_err();
        match err.kind {
            FetchErrorKind::Parse(detail) => assert!(detail.contains("CI")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unread_elements_may_have_any_shape() {
        let server = MockServer::start().await;
        let mut body = forecast_body();
        let elements = body["records"]["location"][0]["weatherElement"].as_array_mut().unwrap();
        elements.push(json!({ "elementName": "MaxT", "time": { "note": "not a list" } }));
        elements.push(json!({ "elementName": "UVI" }));
        mount(&server, "F-C0032-001", "臺北市", body).await;

        let summary = provider_for(&server).forecast("臺北市").await.unwrap();
        assert_eq!(summary.description, "多雲");
        assert_eq!(summary.rain_possibility, 30);
    }

    #[tokio::test]
    async fn malformed_wanted_element_is_a_parse_error() {
        let server = MockServer::start().await;
        let mut body = forecast_body();
        body["records"]["location"][0]["weatherElement"][1]["time"] = json!("30");
        mount(&server, "F-C0032-001", "臺北市", body).await;

        let err = provider_for(&server).forecast("臺北市").await.unwrap_err();
        match err.kind {
            FetchErrorKind::Parse(detail) => assert!(detail.contains("PoP")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_location_list_is_a_parse_error() {
        let server = MockServer::start().await;
        mount(&server, "O-A0003-001", "臺北", json!({ "records": { "location": [] } })).await;

        let err = provider_for(&server).current_observation("臺北").await.unwrap_err();
        assert!(err.to_string().contains("no location"));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let provider = CwaProvider::with_options(
            "TEST-KEY".into(),
            "http://127.0.0.1:9",
            Duration::from_secs(2),
        )
        .unwrap();

        let err = provider.forecast("臺北市").await.unwrap_err();
        assert_eq!(err.endpoint, Endpoint::Forecast);
        assert!(matches!(err.kind, FetchErrorKind::Network(_)));
    }

    #[test]
    fn obs_time_accepts_both_formats() {
        let plain = parse_obs_time("2024-03-01 14:00:00").unwrap();
        let rfc = parse_obs_time("2024-03-01T14:00:00+08:00").unwrap();
        assert_eq!(plain, rfc);
        assert!(parse_obs_time("yesterday").is_err());
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "雨".repeat(300);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.chars().count(), 203);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }
}
