//! Amap (高德) place search client.

use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Poi, Result};

const PLACE_TEXT_URL: &str = "https://restapi.amap.com/v3/place/text";
const PLACE_AROUND_URL: &str = "https://restapi.amap.com/v3/place/around";

/// Default radius for around-search, in meters.
pub const DEFAULT_RADIUS: u32 = 1000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Amap REST API client.
pub struct MapsClient {
    http: reqwest::Client,
    key: String,
}

impl MapsClient {
    /// Create a client with the given API key.
    pub fn new(key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            key: key.into(),
        }
    }

    /// Create a client that reuses an existing HTTP client.
    pub fn with_http(http: reqwest::Client, key: impl Into<String>) -> Self {
        Self {
            http,
            key: key.into(),
        }
    }

    /// Search for places by keyword, optionally scoped to a city.
    pub async fn search_poi(&self, keywords: &str, city: Option<&str>) -> Result<Vec<Poi>> {
        tracing::debug!(keywords, city = city.unwrap_or(""), "amap place search");
        let response = self
            .http
            .get(PLACE_TEXT_URL)
            .query(&[
                ("key", self.key.as_str()),
                ("keywords", keywords),
                ("city", city.unwrap_or("")),
                ("offset", "5"),
                ("page", "1"),
                ("extensions", "all"),
            ])
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        parse_place_response(body)
    }

    /// Search for facilities around a coordinate (`"lng,lat"`).
    pub async fn search_nearby(
        &self,
        location: &str,
        keywords: &str,
        radius: u32,
    ) -> Result<Vec<Poi>> {
        tracing::debug!(location, keywords, radius, "amap around search");
        let radius = radius.to_string();
        let response = self
            .http
            .get(PLACE_AROUND_URL)
            .query(&[
                ("key", self.key.as_str()),
                ("location", location),
                ("keywords", keywords),
                ("radius", radius.as_str()),
                ("offset", "5"),
                ("page", "1"),
                ("extensions", "all"),
            ])
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        parse_place_response(body)
    }
}

// Amap wraps everything in a 200 response; errors are signaled by
// status = "0" with a human-readable `info` field.
#[derive(Debug, Deserialize)]
struct PlaceResponse {
    status: String,
    #[serde(default)]
    info: String,
    #[serde(default)]
    count: String,
    #[serde(default)]
    pois: Vec<RawPoi>,
}

// Amap emits `[]` for absent string fields, so every field is lenient.
#[derive(Debug, Deserialize)]
struct RawPoi {
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    location: String,
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    poi_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    tel: String,
    #[serde(default, deserialize_with = "lenient_string")]
    distance: String,
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

pub(crate) fn parse_place_response(body: serde_json::Value) -> Result<Vec<Poi>> {
    let response: PlaceResponse =
        serde_json::from_value(body).map_err(|e| Error::InvalidResponse(e.to_string()))?;

    if response.status != "1" {
        let info = if response.info.is_empty() {
            "unknown error".to_string()
        } else {
            response.info
        };
        return Err(Error::Api(info));
    }

    let count: usize = response.count.parse().unwrap_or(0);
    if count == 0 {
        return Ok(Vec::new());
    }

    let pois = response
        .pois
        .into_iter()
        .map(|raw| Poi {
            name: raw.name,
            address: raw.address,
            location: raw.location,
            poi_type: raw.poi_type,
            tel: if raw.tel.is_empty() {
                "N/A".to_string()
            } else {
                raw.tel
            },
            distance: raw.distance.parse().ok(),
        })
        .collect();

    Ok(pois)
}
