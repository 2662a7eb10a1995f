use async_trait::async_trait;
use goldenvan_core::distance::{DistanceError, DistanceEstimate, DistanceResolver};
use goldenvan_core::Coordinates;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const GOOGLE_DISTANCE_MATRIX_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    rows: Vec<MatrixRow>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<MatrixValue>,
    duration: Option<MatrixValue>,
}

#[derive(Debug, Deserialize)]
struct MatrixValue {
    value: u64,
}

/// Driving distance from the Google Distance Matrix API.
pub struct GoogleDistanceResolver {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleDistanceResolver {
    pub fn new(base_url: Option<String>, api_key: String, timeout: Duration) -> Result<Self, DistanceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DistanceError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| GOOGLE_DISTANCE_MATRIX_URL.to_string()),
            api_key,
        })
    }
}

fn transport_error(err: reqwest::Error) -> DistanceError {
    if err.is_timeout() {
        DistanceError::Timeout
    } else {
        DistanceError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl DistanceResolver for GoogleDistanceResolver {
    async fn resolve(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<DistanceEstimate, DistanceError> {
        let origins = format!("{},{}", origin.lat, origin.lng);
        let destinations = format!("{},{}", destination.lat, destination.lng);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("origins", origins.as_str()),
                ("destinations", destinations.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!("Distance Matrix responded {}", status);
            return Err(DistanceError::Unavailable(format!("provider responded {}", status)));
        }

        let matrix: MatrixResponse = response.json().await.map_err(transport_error)?;
        if matrix.status != "OK" {
            return Err(DistanceError::Unavailable(format!(
                "{}: {}",
                matrix.status,
                matrix.error_message.unwrap_or_default()
            )));
        }

        let element = matrix
            .rows
            .first()
            .and_then(|row| row.elements.first())
            .ok_or_else(|| DistanceError::NoRoute("empty distance matrix".to_string()))?;

        match (element.status.as_str(), &element.distance, &element.duration) {
            ("OK", Some(distance), Some(duration)) => {
                debug!("Resolved {} -> {}: {}m", origins, destinations, distance.value);
                Ok(DistanceEstimate { meters: distance.value, seconds: duration.value })
            }
            (status, _, _) => Err(DistanceError::NoRoute(status.to_string())),
        }
    }
}

/// Fixed answer for development and tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticDistanceResolver {
    estimate: DistanceEstimate,
}

impl StaticDistanceResolver {
    pub fn new(meters: u64, seconds: u64) -> Self {
        Self { estimate: DistanceEstimate { meters, seconds } }
    }
}

#[async_trait]
impl DistanceResolver for StaticDistanceResolver {
    async fn resolve(&self, _origin: Coordinates, _destination: Coordinates) -> Result<DistanceEstimate, DistanceError> {
        Ok(self.estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_response_shape() {
        let body = r#"{
            "status": "OK",
            "rows": [{ "elements": [{ "status": "OK", "distance": { "text": "20.4 km", "value": 20450 }, "duration": { "text": "26 mins", "value": 1530 } }] }]
        }"#;
        let matrix: MatrixResponse = serde_json::from_str(body).unwrap();
        let element = &matrix.rows[0].elements[0];
        assert_eq!(element.distance.as_ref().unwrap().value, 20450);
        assert_eq!(element.duration.as_ref().unwrap().value, 1530);

        let denied: MatrixResponse =
            serde_json::from_str(r#"{"status":"REQUEST_DENIED","error_message":"bad key","rows":[]}"#).unwrap();
        assert_eq!(denied.status, "REQUEST_DENIED");
    }

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticDistanceResolver::new(20_000, 1_800);
        let point = Coordinates { lat: 41.0, lng: 29.0 };
        let estimate = resolver.resolve(point, point).await.unwrap();
        assert_eq!(estimate.kilometers(), rust_decimal::Decimal::from(20));
    }
}
