//! Backend endpoint paths

/// Samples list / create / patch / delete
pub const SAMPLES: &str = "/api/samples/";
/// Sample-marker analyses
pub const SAMPLE_MARKER_ANALYSIS: &str = "/api/sample-marker-analysis/";
/// Species options
pub const SPECIES: &str = "/api/species/";
/// Sample type options
pub const SAMPLE_TYPES: &str = "/api/sample-types/";
/// Location options
pub const LOCATIONS: &str = "/api/locations/";
/// Marker options
pub const MARKERS: &str = "/api/markers/";

/// `POST` target for bulk creation under `endpoint`
#[must_use]
pub fn bulk(endpoint: &str) -> String {
    format!("{}/bulk/", endpoint.trim_end_matches('/'))
}

/// `POST` target for bulk deletion under `endpoint`
#[must_use]
pub fn bulk_delete(endpoint: &str) -> String {
    format!("{}/bulk-delete/", endpoint.trim_end_matches('/'))
}

/// Detail path of row `id` under `endpoint`
#[must_use]
pub fn detail(endpoint: &str, id: impl std::fmt::Display) -> String {
    format!("{}/{id}/", endpoint.trim_end_matches('/'))
}
