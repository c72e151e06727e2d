//! Technician profile and availability.

use serde::{Deserialize, Serialize};

use super::TechnicianId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicianProfile {
    pub id: TechnicianId,
    pub full_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Area the technician covers.
    #[serde(default)]
    pub zone: Option<String>,
    pub is_available: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityResponse {
    #[serde(default)]
    pub message: String,
    pub is_available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_defaults_active() {
        let json = r#"{"id": 3, "full_name": "Carlos Ruiz", "phone": "3012223344", "is_available": false}"#;
        let profile: TechnicianProfile = serde_json::from_str(json).unwrap();
        assert!(profile.is_active);
        assert!(!profile.is_available);
        assert_eq!(profile.zone, None);
    }
}
