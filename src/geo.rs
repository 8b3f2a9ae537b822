//! Great-circle distance, in Rust and as a PostgreSQL expression.
//!
//! Both renderings use the same haversine form so distances computed in a
//! query and in a handler agree once rounded for display.

use serde::{de::Error as _, Deserialize, Deserializer};

use crate::error::ApiError;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ApiError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ApiError::validation(
                "Latitud inválida (debe estar entre -90 y 90)",
            ));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ApiError::validation(
                "Longitud inválida (debe estar entre -180 y 180)",
            ));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Degrees {
    Number(f64),
    Text(String),
}

/// Reads an optional coordinate sent either as a JSON number or as a
/// numeric string such as `"40.4168"`.
pub fn deserialize_degrees<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Degrees>::deserialize(d)? {
        None => Ok(None),
        Some(Degrees::Number(n)) => Ok(Some(n)),
        Some(Degrees::Text(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("coordenada no numérica: {s:?}"))),
    }
}

pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Rounds a distance to two decimals for display.
pub fn round2(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

/// SQL rendering of [`haversine_km`] between the bound point
/// (`lat_param`, `lon_param`, both `float8`) and `alias.latitude/longitude`.
pub fn haversine_sql(lat_param: &str, lon_param: &str, alias: &str) -> String {
    format!(
        "(2 * {r} * asin(least(1.0, sqrt(\
            power(sin(radians({alias}.latitude::float8 - {lat}) / 2), 2) \
            + cos(radians({lat})) * cos(radians({alias}.latitude::float8)) \
            * power(sin(radians({alias}.longitude::float8 - {lon}) / 2), 2)\
        ))))",
        r = EARTH_RADIUS_KM,
        alias = alias,
        lat = lat_param,
        lon = lon_param,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lon: f64) -> Coordinates {
        Coordinates::new(lat, lon).unwrap()
    }

    #[test]
    fn distance_to_self_is_zero() {
        for p in [c(0.0, 0.0), c(40.4168, -3.7038), c(-89.9, 179.9), c(90.0, -180.0)] {
            assert_eq!(haversine_km(p, p), 0.0);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let points = [
            c(40.4168, -3.7038),
            c(40.4200, -3.7100),
            c(-33.8688, 151.2093),
            c(51.5074, -0.1278),
            c(0.0, 179.99),
            c(0.0, -179.99),
        ];
        for a in points {
            for b in points {
                let ab = haversine_km(a, b);
                let ba = haversine_km(b, a);
                assert!((ab - ba).abs() < 1e-9, "{ab} vs {ba}");
            }
        }
    }

    #[test]
    fn madrid_neighbours_are_well_inside_five_km() {
        let a = c(40.4168, -3.7038);
        let b = c(40.4200, -3.7100);
        let d = round2(haversine_km(a, b));
        assert!(d > 0.5 && d < 0.8, "got {d}");
        assert!(d <= 5.0);
    }

    #[test]
    fn antipodes_are_half_the_circumference() {
        let d = haversine_km(c(0.0, 0.0), c(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(0.634_9), 0.63);
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round2(4.999), 5.0);
    }

    #[test]
    fn coordinates_reject_out_of_range() {
        assert!(Coordinates::new(90.0, 180.0).is_ok());
        assert!(Coordinates::new(-90.0, -180.0).is_ok());
        let err = Coordinates::new(90.1, 0.0).unwrap_err();
        assert!(err.to_string().contains("Latitud"));
        let err = Coordinates::new(0.0, -180.5).unwrap_err();
        assert!(err.to_string().contains("Longitud"));
    }

    #[test]
    fn sql_expression_uses_the_given_binds() {
        let sql = haversine_sql("$1", "$2", "u");
        assert!(sql.contains("radians($1)"));
        assert!(sql.contains("u.longitude::float8 - $2"));
        assert!(sql.contains("6371"));
        assert_eq!(sql.matches('(').count(), sql.matches(')').count());
    }

    #[derive(Debug, Deserialize)]
    struct Point {
        #[serde(default, deserialize_with = "deserialize_degrees")]
        lat: Option<f64>,
    }

    #[test]
    fn degrees_accept_numbers_and_numeric_strings() {
        let p: Point = serde_json::from_str(r#"{"lat": 40.4168}"#).unwrap();
        assert_eq!(p.lat, Some(40.4168));
        let p: Point = serde_json::from_str(r#"{"lat": "40.4"}"#).unwrap();
        assert_eq!(p.lat, Some(40.4));
        let p: Point = serde_json::from_str(r#"{"lat": -3}"#).unwrap();
        assert_eq!(p.lat, Some(-3.0));
        let p: Point = serde_json::from_str(r#"{"lat": null}"#).unwrap();
        assert_eq!(p.lat, None);
        let p: Point = serde_json::from_str("{}").unwrap();
        assert_eq!(p.lat, None);
        assert!(serde_json::from_str::<Point>(r#"{"lat": "norte"}"#).is_err());
        assert!(serde_json::from_str::<Point>(r#"{"lat": "NaN"}"#).is_err());
    }
}
