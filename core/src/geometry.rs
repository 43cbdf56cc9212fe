//! Boundary polygons and the point-in-polygon test.
//!
//! Every coordinate in this module is `(longitude, latitude)`. Records carry
//! latitude and longitude as named fields; the swap into `Point` happens in
//! exactly one place (`LocationRecord::point`).

use geo::{BoundingRect, Centroid, Coord, LineString, MultiPolygon, Polygon, Rect};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Squared planar distance in degrees. Only used for ranking.
    pub fn distance_sq(&self, other: &Point) -> f64 {
        let dx = self.lon - other.lon;
        let dy = self.lat - other.lat;
        dx * dx + dy * dy
    }
}

impl From<geo::Point<f64>> for Point {
    fn from(p: geo::Point<f64>) -> Self {
        Self::new(p.x(), p.y())
    }
}

/// GeoJSON-style geometry as it appears in config files and the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum BoundaryGeometry {
    Polygon(Vec<Vec<[f64; 2]>>),
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
}

/// A region's extent with its bounding rectangle and centroid cached.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    shape:    MultiPolygon<f64>,
    bbox:     Option<Rect<f64>>,
    centroid: Option<Point>,
}

impl Boundary {
    pub fn new(shape: MultiPolygon<f64>) -> Self {
        let bbox = shape.bounding_rect();
        let centroid = shape.centroid().map(Point::from);
        Self { shape, bbox, centroid }
    }

    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    pub fn bbox(&self) -> Option<&Rect<f64>> {
        self.bbox.as_ref()
    }

    pub fn centroid(&self) -> Option<Point> {
        self.centroid
    }

    /// Cheap rejection test. A boundary without vertices rejects everything.
    pub fn bbox_contains(&self, p: &Point) -> bool {
        self.bbox.as_ref().is_some_and(|r| {
            p.lon >= r.min().x && p.lon <= r.max().x && p.lat >= r.min().y && p.lat <= r.max().y
        })
    }

    /// True when any polygon contains the point.
    pub fn contains(&self, p: &Point) -> bool {
        self.shape.0.iter().any(|polygon| polygon_contains(polygon, p))
    }
}

/// Even-odd rule across the exterior and every hole, so a point inside a
/// hole is outside.
fn polygon_contains(polygon: &Polygon<f64>, p: &Point) -> bool {
    let crossings: usize = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring_crossings(ring, p))
        .sum();
    crossings % 2 == 1
}

/// Number of times a ray cast eastward from `p` crosses the ring's edges.
/// Rings are closed, so fewer than four coordinates means fewer than three
/// distinct vertices and no crossings.
fn ring_crossings(ring: &LineString<f64>, p: &Point) -> usize {
    let coords = &ring.0;
    if coords.len() < 4 {
        return 0;
    }
    let mut crossings = 0;
    let mut j = coords.len() - 1;
    for i in 0..coords.len() {
        let (a, b) = (coords[i], coords[j]);
        if (a.y > p.lat) != (b.y > p.lat) {
            let x_at = a.x + (p.lat - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.lon < x_at {
                crossings += 1;
            }
        }
        j = i;
    }
    crossings
}

fn ring_from(coords: Vec<[f64; 2]>) -> LineString<f64> {
    LineString::new(coords.into_iter().map(|[x, y]| Coord { x, y }).collect())
}

/// First ring is the exterior, the rest are holes. `Polygon::new` closes
/// every ring.
fn polygon_from(rings: Vec<Vec<[f64; 2]>>) -> Polygon<f64> {
    let mut rings = rings.into_iter().map(ring_from);
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Polygon::new(exterior, rings.collect())
}

fn rings_of(polygon: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring.0.iter().map(|c| [c.x, c.y]).collect())
        .collect()
}

impl From<BoundaryGeometry> for Boundary {
    fn from(geometry: BoundaryGeometry) -> Self {
        let polygons = match geometry {
            BoundaryGeometry::Polygon(rings) => vec![polygon_from(rings)],
            BoundaryGeometry::MultiPolygon(polys) => polys.into_iter().map(polygon_from).collect(),
        };
        Boundary::new(MultiPolygon::new(polygons))
    }
}

impl From<&Boundary> for BoundaryGeometry {
    fn from(boundary: &Boundary) -> Self {
        match boundary.shape.0.as_slice() {
            [single] => BoundaryGeometry::Polygon(rings_of(single)),
            polygons => BoundaryGeometry::MultiPolygon(polygons.iter().map(rings_of).collect()),
        }
    }
}

/// Convenience for tests and fixtures: an axis-aligned rectangle.
pub fn rectangle(west: f64, south: f64, east: f64, north: f64) -> Boundary {
    let rect = Rect::new(Coord { x: west, y: south }, Coord { x: east, y: north });
    Boundary::new(MultiPolygon::new(vec![rect.to_polygon()]))
}
