//! Place (POI) types.

use serde::{Deserialize, Serialize};

/// A point of interest returned by a place search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poi {
    /// Place name.
    pub name: String,
    /// Street address.
    pub address: String,
    /// Coordinate as `"lng,lat"`.
    pub location: String,
    /// Amap category string.
    #[serde(rename = "type")]
    pub poi_type: String,
    /// Contact telephone, `"N/A"` when absent.
    pub tel: String,
    /// Distance in meters from the search center (around-search only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<u32>,
}
