use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

const GEOMETRY_PSEUDO_TYPE: &str = "GEOMETRY";

/// A geographic coordinate in degrees.
///
/// On the wire a point travels in the store's geometry pseudo-type form:
/// `{"$reql_type$": "GEOMETRY", "type": "Point", "coordinates": [lon, lat]}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeometryRepr", into = "GeometryRepr")]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Point { lon, lat }
    }

    /// Whether the store would accept this point: both coordinates finite,
    /// longitude in [-180, 180] and latitude in [-90, 90].
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }

    /// Great-circle distance on a spherical earth, expressed in `unit`.
    ///
    /// Only an approximation of the geodesic distance the store computes on
    /// the WGS84 ellipsoid; the two differ by well under one percent.
    pub fn haversine_distance(&self, other: &Point, unit: Unit) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lon = (other.lon - self.lon).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        unit.from_meters(EARTH_RADIUS_METERS * c)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lon, self.lat)
    }
}

#[derive(Serialize, Deserialize)]
struct GeometryRepr {
    #[serde(rename = "$reql_type$")]
    reql_type: String,
    coordinates: Vec<f64>,
    #[serde(rename = "type")]
    kind: String,
}

impl From<Point> for GeometryRepr {
    fn from(point: Point) -> Self {
        GeometryRepr {
            reql_type: GEOMETRY_PSEUDO_TYPE.to_string(),
            coordinates: vec![point.lon, point.lat],
            kind: "Point".to_string(),
        }
    }
}

impl TryFrom<GeometryRepr> for Point {
    type Error = String;

    fn try_from(repr: GeometryRepr) -> Result<Self, Self::Error> {
        if repr.reql_type != GEOMETRY_PSEUDO_TYPE {
            return Err(format!("expected GEOMETRY pseudo-type, got {}", repr.reql_type));
        }
        if repr.kind != "Point" {
            return Err(format!("expected a Point geometry, got {}", repr.kind));
        }
        match repr.coordinates.as_slice() {
            [lon, lat] => Ok(Point::new(*lon, *lat)),
            other => Err(format!("a point has two coordinates, got {}", other.len())),
        }
    }
}

/// Distance units understood by `get_nearest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    #[default]
    Meter,
    Kilometer,
    Mile,
    NauticalMile,
    Foot,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Meter => "m",
            Unit::Kilometer => "km",
            Unit::Mile => "mi",
            Unit::NauticalMile => "nm",
            Unit::Foot => "ft",
        }
    }

    fn meters(&self) -> f64 {
        match self {
            Unit::Meter => 1.0,
            Unit::Kilometer => 1_000.0,
            Unit::Mile => 1_609.344,
            Unit::NauticalMile => 1_852.0,
            Unit::Foot => 0.3048,
        }
    }

    pub fn to_meters(&self, value: f64) -> f64 {
        value * self.meters()
    }

    pub fn from_meters(&self, meters: f64) -> f64 {
        meters / self.meters()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m" => Ok(Unit::Meter),
            "km" => Ok(Unit::Kilometer),
            "mi" => Ok(Unit::Mile),
            "nm" => Ok(Unit::NauticalMile),
            "ft" => Ok(Unit::Foot),
            other => Err(Error::InvalidInput(format!("unknown distance unit `{other}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_serializes_as_geometry_pseudo_type() {
        let value = serde_json::to_value(Point::new(-122.423246, 37.77929790366427)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "$reql_type$": "GEOMETRY",
                "coordinates": [-122.423246, 37.77929790366427],
                "type": "Point",
            })
        );
    }

    #[test]
    fn test_point_rejects_other_geometries() {
        let line = serde_json::json!({
            "$reql_type$": "GEOMETRY",
            "coordinates": [[0.0, 0.0], [1.0, 1.0]],
            "type": "LineString",
        });
        assert!(serde_json::from_value::<Point>(line).is_err());

        let time = serde_json::json!({
            "$reql_type$": "TIME",
            "coordinates": [0.0, 0.0],
            "type": "Point",
        });
        assert!(serde_json::from_value::<Point>(time).is_err());
    }

    #[test]
    fn test_point_validity() {
        assert!(Point::new(-122.4, 37.7).is_valid());
        assert!(Point::new(180.0, -90.0).is_valid());
        assert!(!Point::new(180.5, 0.0).is_valid());
        assert!(!Point::new(0.0, 91.0).is_valid());
        assert!(!Point::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_haversine_distance_to_self_is_zero() {
        let point = Point::new(-122.4153346282659, 37.77874812639591);
        assert_eq!(point.haversine_distance(&point, Unit::Meter), 0.0);
    }

    #[test]
    fn test_haversine_distance_one_degree_of_latitude() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 1.0);
        let km = a.haversine_distance(&b, Unit::Kilometer);
        assert!((km - 111.195).abs() < 0.01, "{km}");
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!("mi".parse::<Unit>().unwrap(), Unit::Mile);
        assert_eq!("nm".parse::<Unit>().unwrap(), Unit::NauticalMile);
        assert!("furlong".parse::<Unit>().is_err());
        assert_eq!(Unit::Mile.to_meters(1.0), 1_609.344);
        assert_eq!(Unit::Kilometer.from_meters(2_500.0), 2.5);
    }
}
