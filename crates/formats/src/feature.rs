use foundation::bounds::BoundsBox;
use foundation::math::GeoPoint;
use serde_json::{Map, Value};

/// Ordered list of positions; the first ring of a polygon is the outer
/// boundary, the rest are holes.
pub type Ring = Vec<GeoPoint>;

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(GeoPoint),
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    /// Polygons as ring slices; empty for points.
    pub fn polygons(&self) -> Vec<&[Ring]> {
        match self {
            Geometry::Point(_) => Vec::new(),
            Geometry::Polygon(rings) => vec![rings.as_slice()],
            Geometry::MultiPolygon(polys) => polys.iter().map(|p| p.as_slice()).collect(),
        }
    }

    /// Outer rings only.
    pub fn outer_rings(&self) -> Vec<&Ring> {
        self.polygons()
            .into_iter()
            .filter_map(|rings| rings.first())
            .collect()
    }

    pub fn bounds(&self) -> Option<BoundsBox> {
        match self {
            Geometry::Point(p) => BoundsBox::from_points([*p]),
            _ => BoundsBox::from_points(self.outer_rings().into_iter().flatten().copied()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Option<String>,
    pub properties: Map<String, Value>,
    pub geometry: Geometry,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: None,
            properties: Map::new(),
            geometry,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(Value::as_str)
    }
}

/// Parsed feature collection. Malformed features and rings are dropped
/// during parsing and counted, never fatal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    pub skipped_features: usize,
    pub skipped_rings: usize,
}

#[derive(Debug)]
pub enum FeatureCollectionError {
    Json(serde_json::Error),
    NotAFeatureCollection,
}

impl std::fmt::Display for FeatureCollectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureCollectionError::Json(e) => write!(f, "JSON parse error: {e}"),
            FeatureCollectionError::NotAFeatureCollection => {
                write!(f, "expected a FeatureCollection object")
            }
        }
    }
}

impl std::error::Error for FeatureCollectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FeatureCollectionError::Json(e) => Some(e),
            FeatureCollectionError::NotAFeatureCollection => None,
        }
    }
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            features,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn bounds(&self) -> Option<BoundsBox> {
        let boxes: Vec<BoundsBox> = self
            .features
            .iter()
            .filter_map(|f| f.geometry.bounds())
            .collect();
        BoundsBox::from_points(boxes.iter().flat_map(|b| b.corners()))
    }

    pub fn from_geojson_str(payload: &str) -> Result<Self, FeatureCollectionError> {
        let value: Value = serde_json::from_str(payload).map_err(FeatureCollectionError::Json)?;
        Self::from_geojson_value(&value)
    }

    pub fn from_geojson_value(value: &Value) -> Result<Self, FeatureCollectionError> {
        let obj = value
            .as_object()
            .ok_or(FeatureCollectionError::NotAFeatureCollection)?;
        let ty = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(FeatureCollectionError::NotAFeatureCollection)?;
        if ty != "FeatureCollection" {
            return Err(FeatureCollectionError::NotAFeatureCollection);
        }
        let features_val = obj
            .get("features")
            .and_then(|v| v.as_array())
            .ok_or(FeatureCollectionError::NotAFeatureCollection)?;

        let mut out = FeatureCollection::default();
        for feat_val in features_val {
            match parse_feature(feat_val, &mut out.skipped_rings) {
                Some(feature) => out.features.push(feature),
                None => out.skipped_features += 1,
            }
        }
        Ok(out)
    }
}

fn parse_feature(value: &Value, skipped_rings: &mut usize) -> Option<Feature> {
    let obj = value.as_object()?;
    let id = match obj.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let properties = obj
        .get("properties")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();
    let geometry = parse_geometry(obj.get("geometry")?, skipped_rings)?;

    Some(Feature {
        id,
        properties,
        geometry,
    })
}

fn parse_geometry(value: &Value, skipped_rings: &mut usize) -> Option<Geometry> {
    let obj = value.as_object()?;
    let ty = obj.get("type")?.as_str()?;
    let coords = obj.get("coordinates")?;

    match ty {
        "Point" => parse_position(coords).map(Geometry::Point),
        "Polygon" => parse_polygon(coords, skipped_rings).map(Geometry::Polygon),
        "MultiPolygon" => {
            let polys: Vec<Vec<Ring>> = coords
                .as_array()?
                .iter()
                .filter_map(|p| parse_polygon(p, skipped_rings))
                .collect();
            (!polys.is_empty()).then_some(Geometry::MultiPolygon(polys))
        }
        _ => None,
    }
}

/// A polygon survives if its outer ring does; a bad hole is dropped alone.
fn parse_polygon(value: &Value, skipped_rings: &mut usize) -> Option<Vec<Ring>> {
    let rings_val = value.as_array()?;
    let mut rings = Vec::with_capacity(rings_val.len());
    for (i, ring_val) in rings_val.iter().enumerate() {
        match parse_ring(ring_val) {
            Some(ring) => rings.push(ring),
            None => {
                *skipped_rings += 1;
                if i == 0 {
                    return None;
                }
            }
        }
    }
    (!rings.is_empty()).then_some(rings)
}

fn parse_ring(value: &Value) -> Option<Ring> {
    let positions = value.as_array()?;
    let ring: Option<Ring> = positions.iter().map(parse_position).collect();
    ring.filter(|r| r.len() >= 2)
}

fn parse_position(value: &Value) -> Option<GeoPoint> {
    let arr = value.as_array()?;
    let lon = arr.first()?.as_f64()?;
    let lat = arr.get(1)?.as_f64()?;
    let p = GeoPoint::from_lon_lat([lon, lat]);
    p.is_finite().then_some(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": 7, "properties": {"name": "Leeds", "rank": 2},
             "geometry": {"type": "Point", "coordinates": [-1.55, 53.8]}},
            {"type": "Feature", "properties": {"name": "Ward"},
             "geometry": {"type": "Polygon", "coordinates": [
                [[0, 0], [1, 0], [1, 1], [0, 0]],
                [[0.2, 0.2], ["bad", 0.3], [0.3, 0.3]]
             ]}},
            {"type": "Feature", "properties": {},
             "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}},
            {"type": "Feature", "properties": {}, "geometry": null}
        ]
    }"#;

    #[test]
    fn parses_points_and_polygons_and_skips_the_rest() {
        let fc = FeatureCollection::from_geojson_str(SAMPLE).unwrap();
        assert_eq!(fc.len(), 2);
        assert_eq!(fc.skipped_features, 2);
        assert_eq!(fc.skipped_rings, 1);

        let city = &fc.features[0];
        assert_eq!(city.id.as_deref(), Some("7"));
        assert_eq!(city.property_str("name"), Some("Leeds"));
        assert_eq!(city.geometry, Geometry::Point(GeoPoint::new(53.8, -1.55)));

        let Geometry::Polygon(rings) = &fc.features[1].geometry else {
            panic!("expected polygon");
        };
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0][1], GeoPoint::new(0.0, 1.0));
    }

    #[test]
    fn polygon_without_valid_outer_ring_is_skipped() {
        let fc = FeatureCollection::from_geojson_str(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": {"type": "MultiPolygon", "coordinates": [
                    [[[0, 0]]],
                    [[[5, 5], [6, 5], [6, 6]]]
                ]}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(fc.len(), 1);
        assert_eq!(fc.features[0].geometry.polygons().len(), 1);
        assert_eq!(fc.skipped_rings, 1);
    }

    #[test]
    fn rejects_non_collections() {
        assert!(matches!(
            FeatureCollection::from_geojson_str(r#"{"type": "Feature"}"#),
            Err(FeatureCollectionError::NotAFeatureCollection)
        ));
        assert!(matches!(
            FeatureCollection::from_geojson_str("{"),
            Err(FeatureCollectionError::Json(_))
        ));
    }

    #[test]
    fn collection_bounds_cover_all_features() {
        let fc = FeatureCollection::from_geojson_str(SAMPLE).unwrap();
        let b = fc.bounds().unwrap();
        assert_eq!(b.min_lat, 0.0);
        assert_eq!(b.max_lat, 53.8);
        assert_eq!(b.min_lon, -1.55);
        assert_eq!(b.max_lon, 1.0);
    }
}
