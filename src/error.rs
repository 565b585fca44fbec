//! Error types for loading, scoring, validating and submitting allocations.

use thiserror::Error;

/// Failures raised while scoring a (baseline, delta) pair.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("no valid locations with refill stations were placed for map {map}")]
    NoServedLocations { map: String },
    #[error("location {location} has refill stations but no sales capacity")]
    NoCapacity { location: String },
    #[error("location {key} is not part of the map")]
    UnknownLocation { key: String },
    #[error("sandbox location {key} has no coordinates")]
    MissingPosition { key: String },
    #[error("sandbox location {key} has no location type")]
    MissingType { key: String },
}

/// Structural problems with an allocation, only checked on the verification path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("location name {name} must be 'location' followed by a number in 1..={max}")]
    InvalidName { name: String, max: usize },
    #[error("latitude {latitude} is out of bounds for location {key}")]
    LatitudeOutOfBounds { key: String, latitude: f64 },
    #[error("longitude {longitude} is out of bounds for location {key}")]
    LongitudeOutOfBounds { key: String, longitude: f64 },
    #[error("coordinates are missing for location {key}")]
    MissingPosition { key: String },
    #[error("location type is missing for location {key}")]
    MissingType { key: String },
    #[error("number of allowed locations exceeded for location type {location_type}")]
    QuotaExceeded { location_type: String, quota: u32 },
    #[error("location {key} is not part of the map")]
    UnknownLocation { key: String },
    #[error("location {key} has {f3} f3100 and {f9} f9100 stations, allowed range is 0..={max}")]
    CountOutOfRange { key: String, f3: u32, f9: u32, max: u32 },
}

/// Top level error for the crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to load {what}: {reason}")]
    DataUnavailable { what: String, reason: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),
    #[error("unable to start scoring workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
