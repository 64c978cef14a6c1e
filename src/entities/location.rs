use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, address: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            address: address.into(),
        }
    }

    /// Coordinates must be finite and on the globe, and the address must not be blank.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && !self.address.trim().is_empty()
    }
}

#[test]
fn location_validity_test() {
    assert!(Location::new(40.7128, -74.0060, "New York, NY").is_valid());
    assert!(!Location::new(91.0, 0.0, "North of north").is_valid());
    assert!(!Location::new(0.0, -180.5, "Off the map").is_valid());
    assert!(!Location::new(f64::NAN, 0.0, "Nowhere").is_valid());
    assert!(!Location::new(10.0, 10.0, "   ").is_valid());
}
