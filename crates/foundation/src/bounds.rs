use crate::math::GeoPoint;

/// Geographic bounding box in degrees.
///
/// Fields are public so callers can build boxes from loose data; every
/// consumer checks [`BoundsBox::is_valid`] and treats an invalid box as
/// "no region" rather than failing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundsBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundsBox {
    /// Validated constructor.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Option<Self> {
        let b = Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        };
        b.is_valid().then_some(b)
    }

    pub fn is_valid(&self) -> bool {
        self.min_lat.is_finite()
            && self.max_lat.is_finite()
            && self.min_lon.is_finite()
            && self.max_lon.is_finite()
            && self.min_lat <= self.max_lat
            && self.min_lon <= self.max_lon
    }

    /// Smallest box containing every finite point; `None` if there are none.
    pub fn from_points<I: IntoIterator<Item = GeoPoint>>(points: I) -> Option<Self> {
        let mut out: Option<Self> = None;
        for p in points.into_iter().filter(|p| p.is_finite()) {
            out = Some(match out {
                None => Self {
                    min_lat: p.lat,
                    max_lat: p.lat,
                    min_lon: p.lon,
                    max_lon: p.lon,
                },
                Some(b) => Self {
                    min_lat: b.min_lat.min(p.lat),
                    max_lat: b.max_lat.max(p.lat),
                    min_lon: b.min_lon.min(p.lon),
                    max_lon: b.max_lon.max(p.lon),
                },
            });
        }
        out
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) * 0.5,
            (self.min_lon + self.max_lon) * 0.5,
        )
    }

    /// Corners in ring order: SW, SE, NE, NW.
    pub fn corners(&self) -> [GeoPoint; 4] {
        [
            GeoPoint::new(self.min_lat, self.min_lon),
            GeoPoint::new(self.min_lat, self.max_lon),
            GeoPoint::new(self.max_lat, self.max_lon),
            GeoPoint::new(self.max_lat, self.min_lon),
        ]
    }

    /// Closed four-edge ring with `samples_per_edge` points per edge
    /// (linear in lat/lon), ending on the starting corner.
    pub fn outline_ring(&self, samples_per_edge: usize) -> Vec<GeoPoint> {
        let samples = samples_per_edge.max(1);
        let corners = self.corners();
        let mut out = Vec::with_capacity(samples * 4 + 1);
        for i in 0..4 {
            let a = corners[i];
            let b = corners[(i + 1) % 4];
            for s in 0..samples {
                let t = s as f64 / samples as f64;
                out.push(GeoPoint::new(
                    a.lat + (b.lat - a.lat) * t,
                    a.lon + (b.lon - a.lon) * t,
                ));
            }
        }
        out.push(corners[0]);
        out
    }
}
