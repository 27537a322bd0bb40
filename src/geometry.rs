//! Planar geometry primitives for coverage polygons.
//!
//! Axis order is (longitude, latitude) everywhere inside the engine; the
//! wire codecs normalize whatever order the external stores use. Containment
//! treats the polygon boundary as part of the interior, so an address
//! geocoded exactly onto a drawn edge still counts as covered.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance for coincidence, on-edge, and collinearity tests. Far below
/// the precision of any geocoder output.
const EPS: f64 = 1e-12;

/// A (longitude, latitude) pair in finite decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    /// Build a point, rejecting non-finite or out-of-range coordinates.
    pub fn new(lon: f64, lat: f64) -> Result<Self, GeometryError> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(GeometryError::NonFinite);
        }
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(GeometryError::OutOfRange { lon, lat });
        }
        Ok(Self { lon, lat })
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lon, self.lat)
    }
}

/// Polygon construction errors.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    TooFewPoints(usize),
    NonFinite,
    OutOfRange { lon: f64, lat: f64 },
    ZeroLengthEdge(usize),
    Collinear,
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewPoints(n) => {
                write!(f, "Polygon needs at least 3 distinct points, got {}", n)
            }
            Self::NonFinite => write!(f, "Coordinate is not a finite number"),
            Self::OutOfRange { lon, lat } => {
                write!(f, "Coordinate ({}, {}) outside lon -180..180 / lat -90..90", lon, lat)
            }
            Self::ZeroLengthEdge(i) => write!(f, "Zero-length edge at vertex {}", i),
            Self::Collinear => write!(f, "Polygon vertices are collinear"),
        }
    }
}

impl std::error::Error for GeometryError {}

/// A simple ring of at least 3 vertices, implicitly closed.
///
/// Constructed only through [`Polygon::new`]; an explicit closing vertex
/// equal to the first is accepted and dropped. Serialized as the bare
/// vertex list, revalidated on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Polygon {
    points: Vec<Point>,
}

impl TryFrom<Vec<Point>> for Polygon {
    type Error = GeometryError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        Polygon::new(points)
    }
}

impl From<Polygon> for Vec<Point> {
    fn from(p: Polygon) -> Self {
        p.points
    }
}

impl Polygon {
    pub fn new(mut points: Vec<Point>) -> Result<Self, GeometryError> {
        // Drop an explicit closing vertex; the ring is implicitly closed.
        if points.len() > 1 && coincident(points[0], points[points.len() - 1]) {
            points.pop();
        }
        if points.len() < 3 {
            return Err(GeometryError::TooFewPoints(points.len()));
        }
        for p in &points {
            Point::new(p.lon, p.lat)?;
        }
        let n = points.len();
        for i in 0..n {
            if coincident(points[i], points[(i + 1) % n]) {
                return Err(GeometryError::ZeroLengthEdge(i));
            }
        }
        if all_collinear(&points) {
            return Err(GeometryError::Collinear);
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Inclusive point-in-polygon test: boundary points are contained.
    ///
    /// Ray casting over the implicitly closed ring, independent of winding
    /// direction and starting vertex. An explicit on-segment pass runs first
    /// so that edge and vertex hits never fall victim to crossing-parity
    /// rounding.
    pub fn contains(&self, p: Point) -> bool {
        let (min, max) = self.bounding_box();
        if p.lon < min.lon - EPS || p.lon > max.lon + EPS
            || p.lat < min.lat - EPS || p.lat > max.lat + EPS
        {
            return false;
        }

        let n = self.points.len();
        for i in 0..n {
            if on_segment(self.points[i], self.points[(i + 1) % n], p) {
                return true;
            }
        }

        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[j];
            if (a.lat > p.lat) != (b.lat > p.lat) {
                let x = a.lon + (p.lat - a.lat) / (b.lat - a.lat) * (b.lon - a.lon);
                if p.lon < x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Axis-aligned bounding box as (min corner, max corner).
    pub fn bounding_box(&self) -> (Point, Point) {
        let mut min = self.points[0];
        let mut max = self.points[0];
        for p in &self.points[1..] {
            min.lon = min.lon.min(p.lon);
            min.lat = min.lat.min(p.lat);
            max.lon = max.lon.max(p.lon);
            max.lat = max.lat.max(p.lat);
        }
        (min, max)
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }
}

fn coincident(a: Point, b: Point) -> bool {
    (a.lon - b.lon).abs() < EPS && (a.lat - b.lat).abs() < EPS
}

/// Cross product of (b - a) × (c - a).
fn cross(a: Point, b: Point, c: Point) -> f64 {
    (b.lon - a.lon) * (c.lat - a.lat) - (b.lat - a.lat) * (c.lon - a.lon)
}

fn all_collinear(points: &[Point]) -> bool {
    let a = points[0];
    let b = points[1];
    points[2..].iter().all(|&c| cross(a, b, c).abs() < EPS)
}

/// True if q lies on the closed segment a-b.
fn on_segment(a: Point, b: Point, q: Point) -> bool {
    if cross(a, b, q).abs() > EPS {
        return false;
    }
    let dot = (q.lon - a.lon) * (b.lon - a.lon) + (q.lat - a.lat) * (b.lat - a.lat);
    let len2 = (b.lon - a.lon).powi(2) + (b.lat - a.lat).powi(2);
    dot >= -EPS && dot <= len2 + EPS
}
