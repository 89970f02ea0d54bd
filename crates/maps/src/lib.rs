//! Amap (高德地图) place search.
//!
//! Thin typed client over the Amap REST API, covering the two searches the
//! assistant's tools need:
//!
//! - keyword place search (`/v3/place/text`)
//! - around-search for facilities near a coordinate (`/v3/place/around`)
//!
//! Amap signals errors inside a 200 response (`status = "0"` plus an `info`
//! string); the client surfaces those as [`Error::Api`] so callers never have
//! to inspect raw bodies.

mod client;
mod error;
mod poi;

pub use client::{DEFAULT_RADIUS, MapsClient};
pub use error::{Error, Result};
pub use poi::Poi;
