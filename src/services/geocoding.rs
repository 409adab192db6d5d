// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reverse geocoding through OpenRouteService.

use crate::error::AppError;
use async_trait::async_trait;
use geojson::GeoJson;

const ORS_BASE_URL: &str = "https://api.openrouteservice.org";

/// Name used when no feature in a preferred layer was found.
pub const UNKNOWN_LOCATION: &str = "unknown location";

/// Layers requested when naming a journey position.
pub const LOCATION_LAYERS: [&str; 4] = ["country", "region", "locality", "localadmin"];

/// Number of features requested when naming a journey position.
pub const LOCATION_MAX_RESULTS: u32 = 10;

/// Layers in order of preference for a human-readable location name.
const LAYER_PREFERENCE: [&str; 4] = ["locality", "localadmin", "region", "country"];

/// One reverse-geocoding hit.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeFeature {
    pub layer: String,
    pub label: String,
}

/// Coordinate to place-name lookup.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse_geocode(
        &self,
        lon: f64,
        lat: f64,
        max_results: u32,
        layers: &[&str],
    ) -> Result<Vec<GeocodeFeature>, AppError>;
}

/// Pick the most specific label available.
///
/// The first feature seen for each layer wins.
pub fn preferred_location_name(features: &[GeocodeFeature]) -> String {
    LAYER_PREFERENCE
        .iter()
        .find_map(|layer| features.iter().find(|f| f.layer == *layer))
        .map(|f| f.label.clone())
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
}

/// Extract `(layer, label)` pairs from an ORS GeoJSON response.
pub fn parse_features(body: &str) -> Result<Vec<GeocodeFeature>, AppError> {
    let geojson: GeoJson = body
        .parse()
        .map_err(|e: geojson::Error| AppError::Geocoding(e.to_string()))?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(AppError::Geocoding(
            "Expected a FeatureCollection".to_string(),
        ));
    };

    Ok(collection
        .features
        .iter()
        .filter_map(|feature| {
            let layer = feature.property("layer")?.as_str()?;
            let label = feature.property("label")?.as_str()?;
            Some(GeocodeFeature {
                layer: layer.to_string(),
                label: label.to_string(),
            })
        })
        .collect())
}

/// OpenRouteService geocoding client.
#[derive(Clone)]
pub struct OpenRouteService {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenRouteService {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: ORS_BASE_URL.to_string(),
            api_key,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Geocoder for OpenRouteService {
    async fn reverse_geocode(
        &self,
        lon: f64,
        lat: f64,
        max_results: u32,
        layers: &[&str],
    ) -> Result<Vec<GeocodeFeature>, AppError> {
        let url = format!("{}/geocode/reverse", self.base_url);

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .query(&[
                ("point.lon", lon.to_string()),
                ("point.lat", lat.to_string()),
                ("size", max_results.to_string()),
                ("layers", layers.join(",")),
            ])
            .send()
            .await
            .map_err(|e| AppError::Geocoding(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AppError::Geocoding(format!("HTTP {}: {}", status, body)));
        }

        let features = parse_features(&body)?;
        tracing::debug!(lon, lat, count = features.len(), "Reverse geocode");
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(layer: &str, label: &str) -> GeocodeFeature {
        GeocodeFeature {
            layer: layer.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn test_prefers_locality() {
        let features = vec![
            feature("country", "Serbia"),
            feature("region", "Vojvodina"),
            feature("localadmin", "Grad Novi Sad"),
            feature("locality", "Novi Sad"),
        ];
        assert_eq!(preferred_location_name(&features), "Novi Sad");
    }

    #[test]
    fn test_region_beats_country() {
        let features = vec![feature("country", "Serbia"), feature("region", "Vojvodina")];
        assert_eq!(preferred_location_name(&features), "Vojvodina");
    }

    #[test]
    fn test_first_feature_per_layer_wins() {
        let features = vec![
            feature("localadmin", "Sremski Karlovci"),
            feature("localadmin", "Petrovaradin"),
        ];
        assert_eq!(preferred_location_name(&features), "Sremski Karlovci");
    }

    #[test]
    fn test_unknown_when_no_preferred_layer() {
        assert_eq!(preferred_location_name(&[]), UNKNOWN_LOCATION);
        assert_eq!(
            preferred_location_name(&[feature("venue", "Cafe")]),
            UNKNOWN_LOCATION
        );
    }

    #[test]
    fn test_parse_features() {
        let body = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [19.84, 45.25]},
                    "properties": {"layer": "locality", "label": "Novi Sad, Serbia"}
                },
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [19.84, 45.25]},
                    "properties": {"name": "missing layer"}
                }
            ]
        }"#;

        let features = parse_features(body).unwrap();
        assert_eq!(features, vec![feature("locality", "Novi Sad, Serbia")]);
    }

    #[test]
    fn test_parse_rejects_non_collection() {
        let body = r#"{"type": "Point", "coordinates": [19.84, 45.25]}"#;
        assert!(matches!(
            parse_features(body),
            Err(AppError::Geocoding(_))
        ));
    }
}
