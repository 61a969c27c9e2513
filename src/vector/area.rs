//! Polygon areas in an area-preserving projection.
//!
//! Geographic coordinates are projected with the Lambert cylindrical
//! equal-area projection on the WGS84 authalic sphere. Areas measured in the
//! projected plane equal areas on the ellipsoid, so the plain shoelace
//! formula gives square metres directly.

use super::{Coord, Polygon};

/// WGS84 semi-major axis (meters)
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Projection constants derived once from the ellipsoid.
#[derive(Debug, Clone, Copy)]
pub struct EqualArea {
    e: f64,
    e2: f64,
    /// q at the pole
    qp: f64,
    /// Radius of the sphere with the same surface area as the ellipsoid
    authalic_radius: f64,
}

impl Default for EqualArea {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl EqualArea {
    pub fn wgs84() -> Self {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let e = e2.sqrt();
        let mut proj = Self {
            e,
            e2,
            qp: 0.0,
            authalic_radius: 0.0,
        };
        proj.qp = proj.q(std::f64::consts::FRAC_PI_2);
        proj.authalic_radius = WGS84_A * (proj.qp / 2.0).sqrt();
        proj
    }

    pub fn authalic_radius(&self) -> f64 {
        self.authalic_radius
    }

    fn q(&self, lat_rad: f64) -> f64 {
        let s = lat_rad.sin();
        (1.0 - self.e2)
            * (s / (1.0 - self.e2 * s * s)
                - (1.0 / (2.0 * self.e)) * ((1.0 - self.e * s) / (1.0 + self.e * s)).ln())
    }

    /// Project (lon, lat) in degrees to planar meters.
    pub fn project(&self, (lon_deg, lat_deg): Coord) -> (f64, f64) {
        let lat = lat_deg.clamp(-90.0, 90.0).to_radians();
        let x = self.authalic_radius * lon_deg.to_radians();
        let y = self.authalic_radius * self.q(lat) / self.qp;
        (x, y)
    }

    /// Unsigned area of a closed or open ring, in square meters.
    pub fn ring_area(&self, ring: &[Coord]) -> f64 {
        if ring.len() < 3 {
            return 0.0;
        }
        // unwrap longitudes so rings crossing the antimeridian stay contiguous
        let mut prev_lon = ring[0].0;
        let pts: Vec<(f64, f64)> = ring
            .iter()
            .map(|&(lon, lat)| {
                let mut lon = lon;
                while lon - prev_lon > 180.0 {
                    lon -= 360.0;
                }
                while lon - prev_lon < -180.0 {
                    lon += 360.0;
                }
                prev_lon = lon;
                self.project((lon, lat))
            })
            .collect();

        let mut twice = 0.0;
        for i in 0..pts.len() {
            let (x1, y1) = pts[i];
            let (x2, y2) = pts[(i + 1) % pts.len()];
            twice += x1 * y2 - x2 * y1;
        }
        (twice / 2.0).abs()
    }

    /// Exterior area minus holes, in square meters.
    pub fn polygon_area(&self, polygon: &Polygon) -> f64 {
        let holes: f64 = polygon.holes.iter().map(|h| self.ring_area(h)).sum();
        (self.ring_area(&polygon.exterior) - holes).max(0.0)
    }
}
