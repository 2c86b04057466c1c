//! Great-circle distance between coordinates.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordenadas {
    pub latitud: f64,
    pub longitud: f64,
}

impl Coordenadas {
    #[must_use]
    pub const fn new(latitud: f64, longitud: f64) -> Self {
        Self { latitud, longitud }
    }

    /// Whether both components are finite and inside their valid ranges.
    #[must_use]
    pub fn es_valida(&self) -> bool {
        self.latitud.is_finite()
            && self.longitud.is_finite()
            && (-90.0..=90.0).contains(&self.latitud)
            && (-180.0..=180.0).contains(&self.longitud)
    }

    /// Build coordinates from two nullable columns.
    #[must_use]
    pub const fn from_columns(latitud: Option<f64>, longitud: Option<f64>) -> Option<Self> {
        match (latitud, longitud) {
            (Some(latitud), Some(longitud)) => Some(Self { latitud, longitud }),
            _ => None,
        }
    }
}

/// Haversine distance in kilometres.
#[must_use]
pub fn distancia_km(a: Coordenadas, b: Coordenadas) -> f64 {
    let lat1 = a.latitud.to_radians();
    let lat2 = b.latitud.to_radians();
    let dlat = (b.latitud - a.latitud).to_radians();
    let dlon = (b.longitud - a.longitud).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        let plaza = Coordenadas::new(-12.0464, -77.0428);
        assert!(distancia_km(plaza, plaza).abs() < 1e-9);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Coordenadas::new(-12.0464, -77.0428);
        let b = Coordenadas::new(-12.1211, -77.0297);
        assert!((distancia_km(a, b) - distancia_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_lima_centro_to_miraflores() {
        // Plaza de Armas to Parque Kennedy, roughly 8.4 km
        let centro = Coordenadas::new(-12.0464, -77.0428);
        let miraflores = Coordenadas::new(-12.1211, -77.0297);
        let d = distancia_km(centro, miraflores);
        assert!((8.0..9.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = distancia_km(Coordenadas::new(0.0, 0.0), Coordenadas::new(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.1, "got {d}");
    }

    #[test]
    fn test_validity() {
        assert!(Coordenadas::new(-12.0, -77.0).es_valida());
        assert!(!Coordenadas::new(95.0, 0.0).es_valida());
        assert!(!Coordenadas::new(0.0, f64::NAN).es_valida());
    }

    #[test]
    fn test_from_columns_requires_both() {
        assert!(Coordenadas::from_columns(Some(1.0), None).is_none());
        assert_eq!(
            Coordenadas::from_columns(Some(1.0), Some(2.0)),
            Some(Coordenadas::new(1.0, 2.0))
        );
    }
}
