//! Footprint geometry: validation, intersection across the antimeridian,
//! equal-area measurement and WKT text.
use std::panic::{AssertUnwindSafe, catch_unwind};

use geo::{
    Area, BooleanOps, BoundingRect, ConvexHull, Coord, HaversineDistance, Intersects, LineString,
    MapCoords, MultiPoint, MultiPolygon, Point, Polygon, Rect,
};
use tracing::warn;
use wkt::ToWkt;

/// Radius of the authalic sphere of WGS84, in kilometres.
pub const AUTHALIC_RADIUS_KM: f64 = 6371.0072;

/// Maximum edge length, in degrees, before projecting to the equal-area plane.
const DENSIFY_STEP_DEG: f64 = 0.25;

/// Why a footprint was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidGeometry {
    Empty,
    NonFinite,
    UnclosedRing,
    TooFewPoints,
    ZeroArea,
    SelfIntersection,
}

impl std::fmt::Display for InvalidGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            InvalidGeometry::Empty => "empty geometry",
            InvalidGeometry::NonFinite => "non-finite coordinate",
            InvalidGeometry::UnclosedRing => "ring is not closed",
            InvalidGeometry::TooFewPoints => "ring has fewer than 4 positions",
            InvalidGeometry::ZeroArea => "polygon has zero area",
            InvalidGeometry::SelfIntersection => "ring crosses itself",
        };
        write!(f, "{}", msg)
    }
}

pub fn validate(footprint: &MultiPolygon<f64>) -> Result<(), InvalidGeometry> {
    if footprint.0.is_empty() {
        return Err(InvalidGeometry::Empty);
    }
    for polygon in &footprint.0 {
        validate_ring(polygon.exterior())?;
        for interior in polygon.interiors() {
            validate_ring(interior)?;
        }
        if polygon.unsigned_area() <= 0.0 {
            return Err(InvalidGeometry::ZeroArea);
        }
    }
    Ok(())
}

fn validate_ring(ring: &LineString<f64>) -> Result<(), InvalidGeometry> {
    let coords = &ring.0;
    if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(InvalidGeometry::NonFinite);
    }
    if coords.len() < 4 {
        return Err(InvalidGeometry::TooFewPoints);
    }
    if coords.first() != coords.last() {
        return Err(InvalidGeometry::UnclosedRing);
    }
    let n = coords.len() - 1;
    for i in 0..n {
        for j in (i + 2)..n {
            // First and last segments share the closing vertex.
            if i == 0 && j == n - 1 {
                continue;
            }
            if segments_touch(coords[i], coords[i + 1], coords[j], coords[j + 1]) {
                return Err(InvalidGeometry::SelfIntersection);
            }
        }
    }
    Ok(())
}

fn orientation(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn on_segment(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

fn segments_touch(p1: Coord<f64>, p2: Coord<f64>, q1: Coord<f64>, q2: Coord<f64>) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

/// Rings spanning within this many degrees of a full turn are global.
const GLOBAL_SPAN_TOLERANCE_DEG: f64 = 0.5;

fn lon_span(ring: &LineString<f64>) -> f64 {
    let (lo, hi) = ring
        .0
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
            (lo.min(c.x), hi.max(c.x))
        });
    hi - lo
}

/// True when consecutive vertices of `ring` jump across the antimeridian.
///
/// A ring covering (almost) every longitude, such as a global grid, is never
/// crossing even though its edges run from -180 to +180.
pub fn crosses_antimeridian(ring: &LineString<f64>) -> bool {
    if lon_span(ring) >= 360.0 - GLOBAL_SPAN_TOLERANCE_DEG {
        return false;
    }
    ring.0.windows(2).any(|w| (w[1].x - w[0].x).abs() > 180.0)
}

/// Make rings that cross the antimeridian continuous by moving their western
/// part past +180. A ring left invalid by the move is kept as given.
pub fn unwrap_antimeridian(footprint: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon::new(
        footprint
            .0
            .iter()
            .map(|p| {
                if !crosses_antimeridian(p.exterior()) {
                    return p.clone();
                }
                let moved = p.map_coords(|c| Coord {
                    x: if c.x < 0.0 { c.x + 360.0 } else { c.x },
                    y: c.y,
                });
                if validate(&MultiPolygon::new(vec![moved.clone()])).is_ok() {
                    moved
                } else {
                    p.clone()
                }
            })
            .collect(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LonCoverage {
    Regional,
    /// Straddles the antimeridian: the widest empty gap lies inside [-180, 180].
    Crossing,
    /// Wraps around the globe: no gap is wider than the one across the line.
    Global,
}

fn lon_coverage(lons: &[f64]) -> LonCoverage {
    let mut sorted: Vec<f64> = lons.to_vec();
    sorted.sort_by(f64::total_cmp);
    let (Some(&first), Some(&last)) = (sorted.first(), sorted.last()) else {
        return LonCoverage::Regional;
    };
    let across = first + 360.0 - last;
    let inside = sorted
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(0.0, f64::max);
    if inside > 180.0 && inside > across {
        LonCoverage::Crossing
    } else if across <= inside {
        LonCoverage::Global
    } else {
        LonCoverage::Regional
    }
}

fn shift_lon(footprint: &MultiPolygon<f64>, dx: f64) -> MultiPolygon<f64> {
    footprint.map_coords(|c| Coord { x: c.x + dx, y: c.y })
}

fn boolean_intersection(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    // The sweep in geo's boolean ops may panic on near-degenerate input.
    match catch_unwind(AssertUnwindSafe(|| a.intersection(b))) {
        Ok(mp) => mp,
        Err(_) => {
            warn!("Footprint intersection failed on degenerate input; treating as disjoint");
            MultiPolygon::new(vec![])
        }
    }
}

/// Geometric intersection of two footprints in geographic coordinates.
///
/// Invalid inputs and empty or zero-area results yield `None`. The second
/// footprint is also tried shifted by ±360° so products on either side of the
/// antimeridian still meet.
pub fn intersect(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    if validate(a).is_err() || validate(b).is_err() {
        return None;
    }
    let a = unwrap_antimeridian(a);
    let b = unwrap_antimeridian(b);
    let mut pieces: Vec<Polygon<f64>> = Vec::new();
    for dx in [0.0, 360.0, -360.0] {
        let shifted = if dx == 0.0 { b.clone() } else { shift_lon(&b, dx) };
        pieces.extend(
            boolean_intersection(&a, &shifted)
                .0
                .into_iter()
                .filter(|p| p.unsigned_area() > 0.0),
        );
    }
    if pieces.is_empty() {
        None
    } else {
        Some(MultiPolygon::new(pieces))
    }
}

fn densify_ring(ring: &LineString<f64>) -> LineString<f64> {
    let mut out: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for w in ring.0.windows(2) {
        let (a, b) = (w[0], w[1]);
        let len = (b.x - a.x).hypot(b.y - a.y);
        let steps = (len / DENSIFY_STEP_DEG).ceil().max(1.0) as usize;
        for k in 0..steps {
            let t = k as f64 / steps as f64;
            out.push(Coord {
                x: a.x + (b.x - a.x) * t,
                y: a.y + (b.y - a.y) * t,
            });
        }
    }
    if let Some(last) = ring.0.last() {
        out.push(*last);
    }
    LineString::new(out)
}

/// Area in km² on the Lambert cylindrical equal-area projection of the authalic
/// sphere, after densifying edges.
pub fn equal_area_km2(geometry: &MultiPolygon<f64>) -> f64 {
    let projected: MultiPolygon<f64> = geometry
        .0
        .iter()
        .map(|p| {
            Polygon::new(
                densify_ring(p.exterior()),
                p.interiors().iter().map(densify_ring).collect(),
            )
        })
        .collect::<Vec<_>>()
        .into();
    projected
        .map_coords(|c| Coord {
            x: AUTHALIC_RADIUS_KM * c.x.to_radians(),
            y: AUTHALIC_RADIUS_KM * c.y.to_radians().sin(),
        })
        .unsigned_area()
}

/// True if `(lon, lat)` lies inside or on the boundary of `geometry`, modulo 360°.
pub fn covers_point(geometry: &MultiPolygon<f64>, lon: f64, lat: f64) -> bool {
    if !lon.is_finite() || !lat.is_finite() {
        return false;
    }
    [0.0, 360.0, -360.0].iter().any(|dx| {
        let pt = Point::new(lon + dx, lat);
        geometry.0.iter().any(|p| p.intersects(&pt))
    })
}

pub fn bounding_rect(geometry: &MultiPolygon<f64>) -> Option<Rect<f64>> {
    geometry.bounding_rect()
}

/// Convex hull of the valid points, or `None` when it has no area.
///
/// Swaths straddling the antimeridian are hulled in continuous longitudes;
/// grids wrapping around the globe become the full latitude band.
pub fn convex_hull_footprint(points: &[(f64, f64)]) -> Option<Polygon<f64>> {
    let mut finite: Vec<Point<f64>> = points
        .iter()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|&(x, y)| Point::new(x, y))
        .collect();
    if finite.len() < 3 {
        return None;
    }
    let lons: Vec<f64> = finite.iter().map(|p| p.x()).collect();
    match lon_coverage(&lons) {
        LonCoverage::Crossing => {
            for p in finite.iter_mut() {
                if p.x() < 0.0 {
                    p.set_x(p.x() + 360.0);
                }
            }
        }
        LonCoverage::Global => {
            let (lo, hi) = finite
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                    (lo.min(p.y()), hi.max(p.y()))
                });
            let band = Rect::new(Coord { x: -180.0, y: lo }, Coord { x: 180.0, y: hi });
            return (hi > lo).then(|| band.to_polygon());
        }
        LonCoverage::Regional => {}
    }
    let hull = MultiPoint::new(finite).convex_hull();
    (hull.unsigned_area() > 0.0).then_some(hull)
}

pub fn haversine_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    Point::new(lon1, lat1).haversine_distance(&Point::new(lon2, lat2)) / 1000.0
}

pub fn to_wkt(geometry: &MultiPolygon<f64>) -> String {
    geometry.wkt_string()
}

/// Parse a `POLYGON` or `MULTIPOLYGON` WKT string.
pub fn parse_wkt(text: &str) -> Result<MultiPolygon<f64>, String> {
    let parsed: wkt::Wkt<f64> = text.parse().map_err(|e: &str| e.to_string())?;
    let geometry = geo::Geometry::<f64>::try_from(parsed).map_err(|e| format!("{:?}", e))?;
    match geometry {
        geo::Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        other => Err(format!(
            "expected POLYGON or MULTIPOLYGON, got {}",
            geometry_kind(&other)
        )),
    }
}

fn geometry_kind(g: &geo::Geometry<f64>) -> &'static str {
    match g {
        geo::Geometry::Point(_) => "POINT",
        geo::Geometry::Line(_) => "LINE",
        geo::Geometry::LineString(_) => "LINESTRING",
        geo::Geometry::Polygon(_) => "POLYGON",
        geo::Geometry::MultiPoint(_) => "MULTIPOINT",
        geo::Geometry::MultiLineString(_) => "MULTILINESTRING",
        geo::Geometry::MultiPolygon(_) => "MULTIPOLYGON",
        geo::Geometry::GeometryCollection(_) => "GEOMETRYCOLLECTION",
        geo::Geometry::Rect(_) => "RECT",
        geo::Geometry::Triangle(_) => "TRIANGLE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ]])
    }

    #[test]
    fn bow_tie_is_invalid() {
        let bow = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 0.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]]);
        assert_eq!(validate(&bow), Err(InvalidGeometry::SelfIntersection));
        assert!(intersect(&bow, &rect(0.0, 0.0, 1.0, 1.0)).is_none());
    }

    #[test]
    fn nan_coordinates_are_invalid() {
        let bad = rect(0.0, 0.0, f64::NAN, 1.0);
        assert_eq!(validate(&bad), Err(InvalidGeometry::NonFinite));
    }

    #[test]
    fn overlapping_rectangles_intersect() {
        let inter = intersect(&rect(0.0, 0.0, 2.0, 2.0), &rect(1.0, 1.0, 3.0, 3.0)).unwrap();
        let bbox = bounding_rect(&inter).unwrap();
        assert!((bbox.min().x - 1.0).abs() < 1e-9);
        assert!((bbox.max().y - 2.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_rectangles_do_not_intersect() {
        assert!(intersect(&rect(0.0, 0.0, 1.0, 1.0), &rect(5.0, 5.0, 6.0, 6.0)).is_none());
    }

    #[test]
    fn edge_contact_has_no_area() {
        assert!(intersect(&rect(0.0, 0.0, 1.0, 1.0), &rect(1.0, 0.0, 2.0, 1.0)).is_none());
    }

    #[test]
    fn one_degree_cell_at_equator_area() {
        // 1° x 1° at the equator is about 12364 km² on the authalic sphere.
        let area = equal_area_km2(&rect(0.0, 0.0, 1.0, 1.0));
        let expected = AUTHALIC_RADIUS_KM.powi(2) * 1f64.to_radians() * 1f64.to_radians().sin();
        assert!((area - expected).abs() / expected < 1e-9);
    }

    #[test]
    fn area_shrinks_towards_the_pole() {
        let equator = equal_area_km2(&rect(0.0, 0.0, 1.0, 1.0));
        let north = equal_area_km2(&rect(0.0, 60.0, 1.0, 61.0));
        assert!(north < equator * 0.52 && north > equator * 0.47);
    }

    #[test]
    fn antimeridian_footprints_meet() {
        // Eastern product expressed with negative longitudes past the line.
        let east = rect(178.0, 0.0, 182.0, 2.0);
        let west = rect(-179.0, 0.0, -177.0, 2.0);
        let inter = intersect(&east, &west).unwrap();
        let area = equal_area_km2(&inter);
        let expected = equal_area_km2(&rect(0.0, 0.0, 1.0, 2.0));
        assert!((area - expected).abs() / expected < 1e-6);
    }

    #[test]
    fn global_footprint_is_not_unwrapped() {
        let world = rect(-180.0, -90.0, 180.0, 90.0);
        assert!(!crosses_antimeridian(world.0[0].exterior()));
        assert_eq!(unwrap_antimeridian(&world), world);

        let inter = intersect(&world, &rect(1.0, 1.0, 2.0, 2.0)).unwrap();
        let expected = equal_area_km2(&rect(1.0, 1.0, 2.0, 2.0));
        assert!((equal_area_km2(&inter) - expected).abs() / expected < 1e-6);
    }

    #[test]
    fn global_grid_hull_is_the_latitude_band() {
        let mut points = Vec::new();
        for i in 0..1440 {
            let lon = -180.0 + 0.25 * i as f64;
            points.push((lon, -60.0));
            points.push((lon, 60.0));
        }
        let hull: MultiPolygon<f64> = convex_hull_footprint(&points).unwrap().into();
        let bbox = bounding_rect(&hull).unwrap();
        assert_eq!((bbox.min().x, bbox.max().x), (-180.0, 180.0));
        assert_eq!((bbox.min().y, bbox.max().y), (-60.0, 60.0));
        assert_eq!(unwrap_antimeridian(&hull), hull);
        assert!(intersect(&hull, &rect(10.0, 0.0, 11.0, 1.0)).is_some());
    }

    #[test]
    fn crossing_swath_hull_is_continuous() {
        let points = [(179.0, 0.0), (179.5, 1.0), (-179.5, 0.0), (-179.0, 1.0)];
        let hull: MultiPolygon<f64> = convex_hull_footprint(&points).unwrap().into();
        let bbox = bounding_rect(&hull).unwrap();
        assert_eq!(bbox.min().x, 179.0);
        assert_eq!(bbox.max().x, 181.0);
    }

    #[test]
    fn narrow_crossing_ring_is_unwrapped() {
        let ring = MultiPolygon::new(vec![polygon![
            (x: 179.5, y: 0.0),
            (x: -179.5, y: 0.0),
            (x: -179.5, y: 1.0),
            (x: 179.5, y: 1.0),
            (x: 179.5, y: 0.0),
        ]]);
        assert!(crosses_antimeridian(ring.0[0].exterior()));
        let bbox = bounding_rect(&unwrap_antimeridian(&ring)).unwrap();
        assert_eq!(bbox.min().x, 179.5);
        assert_eq!(bbox.max().x, 180.5);
    }

    #[test]
    fn covers_point_includes_boundary_and_wraps() {
        let r = rect(179.0, 0.0, 181.0, 1.0);
        assert!(covers_point(&r, 180.0, 0.5));
        assert!(covers_point(&r, -179.5, 0.5));
        assert!(covers_point(&r, 179.0, 1.0));
        assert!(!covers_point(&r, 0.0, 0.5));
    }

    #[test]
    fn wkt_round_trip_keeps_polygon() {
        let r = rect(0.0, 0.0, 1.0, 1.0);
        let text = to_wkt(&r);
        assert!(text.starts_with("MULTIPOLYGON"));
        assert_eq!(parse_wkt(&text).unwrap(), r);
        assert!(parse_wkt("POINT(1 2)").is_err());
    }

    #[test]
    fn convex_hull_of_collinear_points_is_none() {
        assert!(convex_hull_footprint(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]).is_none());
        let hull = convex_hull_footprint(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (0.2, 0.2)]).unwrap();
        assert!((hull.unsigned_area() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn haversine_one_degree_of_latitude() {
        let d = haversine_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.19).abs() < 0.1);
    }
}
