use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use formats::feature::{Feature, FeatureCollection, Geometry};
use formats::predicate::property_equals;
use foundation::math::GeoPoint;
use futures::future::FutureExt;
use layers::{FeatureSource, LayerId, LoadError, LoadFuture, RegistryError};
use pretty_assertions::assert_eq;
use runtime::frame::Frame;
use runtime::status::StatusLevel;
use scene::graph::{SceneGraph, SceneStats};
use scene::sink::{FrameSink, NullSink};
use serde_json::Value;
use viewer_native::config::ViewerConfig;
use viewer_native::highlight::Flash;
use viewer_native::{Viewer, ViewerError};

/// Resolves every fetch immediately from an in-memory table.
#[derive(Default)]
struct MapSource {
    collections: HashMap<String, FeatureCollection>,
    fetches: Cell<usize>,
}

impl MapSource {
    fn with(mut self, key: &str, collection: FeatureCollection) -> Self {
        self.collections.insert(key.to_string(), collection);
        self
    }
}

impl FeatureSource for MapSource {
    fn fetch(&self, source: &str) -> LoadFuture {
        self.fetches.set(self.fetches.get() + 1);
        let result = self
            .collections
            .get(source)
            .cloned()
            .ok_or_else(|| LoadError::Io(format!("{source} not found")));
        async move { result }.boxed_local()
    }
}

#[derive(Default)]
struct RecordingSink {
    frames: Vec<(u64, SceneStats)>,
}

impl FrameSink for RecordingSink {
    fn present(&mut self, frame: &Frame, scene: &SceneGraph) {
        self.frames.push((frame.index, scene.stats()));
    }
}

fn square(lat: f64, lon: f64, half: f64) -> Geometry {
    Geometry::Polygon(vec![vec![
        GeoPoint::new(lat - half, lon - half),
        GeoPoint::new(lat - half, lon + half),
        GeoPoint::new(lat + half, lon + half),
        GeoPoint::new(lat + half, lon - half),
        GeoPoint::new(lat - half, lon - half),
    ]])
}

fn wards() -> FeatureCollection {
    FeatureCollection::new(vec![
        Feature::new(square(53.8, -1.55, 0.05))
            .with_property("ward", "Headingley")
            .with_property("council", "Leeds"),
        Feature::new(square(53.96, -1.08, 0.05))
            .with_property("ward", "Micklegate")
            .with_property("council", "York"),
    ])
}

/// Ten towns, two per rank 1..=5.
fn towns() -> FeatureCollection {
    FeatureCollection::new(
        (0..10)
            .map(|i| {
                Feature::new(Geometry::Point(GeoPoint::new(50.0 + i as f64 * 0.5, -3.0)))
                    .with_property("name", format!("town-{i}"))
                    .with_property("rank", (i / 2 + 1) as u64)
            })
            .collect(),
    )
}

const CONFIG: &str = r#"{
    "regions": {
        "leeds": {"min_lat": 53.7, "max_lat": 53.95, "min_lon": -1.8, "max_lon": -1.3}
    },
    "layers": [
        {"id": "wards", "kind": "boundary", "source": "wards.geojson", "enabled": true},
        {"id": "leeds-wards", "kind": "boundary", "source": "wards.geojson",
         "filter": {"property": "council", "equals": "Leeds"}},
        {"id": "towns", "kind": "points", "source": "towns.geojson",
         "labels": {}, "enabled": true}
    ]
}"#;

fn viewer() -> (Viewer, Rc<MapSource>) {
    let source = Rc::new(
        MapSource::default()
            .with("wards.geojson", wards())
            .with("towns.geojson", towns()),
    );
    let config = ViewerConfig::from_json_str(CONFIG).unwrap();
    let viewer = Viewer::from_config(&config, source.clone()).unwrap();
    (viewer, source)
}

fn owned(viewer: &Viewer, id: &str) -> usize {
    viewer
        .layers()
        .into_iter()
        .find(|l| l.id.as_str() == id)
        .map(|l| l.owned_objects)
        .unwrap()
}

#[test]
fn loads_resolve_on_the_next_tick() {
    let (mut viewer, source) = viewer();
    assert_eq!(owned(&viewer, "wards"), 0);
    assert_eq!(source.fetches.get(), 2);

    let mut sink = RecordingSink::default();
    viewer.tick(0.0, &mut sink);
    // Both ward outlines share one line set.
    assert_eq!(owned(&viewer, "wards"), 1);
    assert_eq!(owned(&viewer, "leeds-wards"), 0);
    // Drawn in the same frame the load was delivered.
    assert_eq!(sink.frames[0].1.lines, 1);
    assert_eq!(sink.frames[0].1.points, 1);
}

#[test]
fn enabling_after_load_uses_the_cache() {
    let (mut viewer, source) = viewer();
    viewer.tick(0.0, &mut NullSink);
    let id = LayerId::from("leeds-wards");
    assert!(viewer.enable_layer(&id).unwrap());
    assert_eq!(owned(&viewer, "leeds-wards"), 1);
    assert_eq!(source.fetches.get(), 2);

    assert!(viewer.disable_layer(&id).unwrap());
    assert_eq!(owned(&viewer, "leeds-wards"), 0);
    assert!(!viewer.toggle_layer(&id, false).unwrap());
}

#[test]
fn unknown_layer_is_an_error() {
    let (mut viewer, _) = viewer();
    let err = viewer.enable_layer(&LayerId::from("rivers")).unwrap_err();
    assert_eq!(
        err,
        ViewerError::Registry(RegistryError::UnknownLayer(LayerId::from("rivers")))
    );
}

#[test]
fn zooming_in_raises_the_label_tier_on_the_next_tick() {
    let (mut viewer, _) = viewer();
    viewer.tick(0.0, &mut NullSink);
    assert_eq!(viewer.label_tier().index, 0);
    // Tier 0 admits rank 1 only.
    assert_eq!(viewer.scene().stats().labels, 2);

    assert!(viewer.camera_mut().ensure_zoom_at_least(4.0, 64));
    // Policies observe the camera during the tick, not before.
    assert_eq!(viewer.label_tier().index, 0);

    viewer.tick(16.0, &mut NullSink);
    assert_eq!(viewer.label_tier().index, 2);
    assert_eq!(viewer.scene().stats().labels, 6);
}

#[test]
fn tier_is_not_reapplied_for_small_zoom_changes() {
    let (mut viewer, _) = viewer();
    viewer.tick(0.0, &mut NullSink);
    let before = viewer.label_tier();

    // One zoom step from the base stays inside tier 0 (zoom < 1.5).
    viewer.camera_mut().zoom_in();
    assert!(viewer.camera().zoom_factor() < 1.5);
    viewer.tick(16.0, &mut NullSink);
    assert_eq!(viewer.label_tier(), before);
    assert_eq!(viewer.scene().stats().labels, 2);
}

#[test]
fn focus_region_uses_the_region_table() {
    let (mut viewer, _) = viewer();
    viewer.focus_region("leeds").unwrap();
    let center = viewer.camera().look_at().unwrap();
    assert!((center.lat - 53.825).abs() < 1e-9);
    assert!((center.lon - -1.55).abs() < 1e-9);

    let before = viewer.camera().state();
    assert_eq!(
        viewer.focus_region("atlantis").unwrap_err(),
        ViewerError::UnknownRegion("atlantis".into())
    );
    assert_eq!(viewer.camera().state(), before);
}

#[test]
fn focus_layer_fits_the_loaded_extent() {
    let (mut viewer, _) = viewer();
    let wards = LayerId::from("wards");
    let before = viewer.camera().state();
    assert!(!viewer.focus_layer(&wards).unwrap());
    assert_eq!(viewer.camera().state(), before);

    viewer.tick(0.0, &mut NullSink);
    assert!(viewer.focus_layer(&wards).unwrap());
    // Extent spans 53.75..54.01 by -1.6..-1.03.
    let center = viewer.camera().look_at().unwrap();
    assert!((center.lat - 53.88).abs() < 1e-9, "{center:?}");
    assert!((center.lon - -1.315).abs() < 1e-9, "{center:?}");

    assert!(matches!(
        viewer.focus_layer(&LayerId::from("rivers")),
        Err(ViewerError::Registry(RegistryError::UnknownLayer(_)))
    ));
}

#[test]
fn region_flash_expires_and_releases_objects() {
    let (mut viewer, _) = viewer();
    viewer.tick(1000.0, &mut NullSink);
    let baseline = viewer.scene().len();

    let flash = Flash::new([1.0, 0.0, 0.0, 1.0], 100.0);
    let id = viewer.flash_region("leeds", flash).unwrap().unwrap();
    assert_eq!(viewer.scene().len(), baseline + 2);

    viewer.tick(1050.0, &mut NullSink);
    assert!(viewer.highlights().is_active(id));
    viewer.tick(1100.0, &mut NullSink);
    assert!(!viewer.highlights().is_active(id));
    assert_eq!(viewer.scene().len(), baseline);
}

#[test]
fn flash_feature_needs_loaded_data() {
    let (mut viewer, _) = viewer();
    let leeds = property_equals("council", Value::from("Leeds"));
    let flash = || Flash::new([0.0, 1.0, 0.0, 1.0], 500.0);

    let wards = LayerId::from("wards");
    assert_eq!(viewer.flash_feature(&wards, &*leeds, flash()).unwrap(), None);

    viewer.tick(0.0, &mut NullSink);
    assert!(viewer.flash_feature(&wards, &*leeds, flash()).unwrap().is_some());
    assert_eq!(viewer.highlights().active_len(), 1);

    let err = viewer
        .flash_feature(&LayerId::from("rivers"), &*leeds, flash())
        .unwrap_err();
    assert!(matches!(err, ViewerError::Registry(RegistryError::UnknownLayer(_))));
}

#[test]
fn failed_load_becomes_a_notice() {
    let config = ViewerConfig::from_json_str(
        r#"{"layers": [{"id": "rivers", "kind": "boundary", "source": "rivers.geojson", "enabled": true}]}"#,
    )
    .unwrap();
    let mut viewer = Viewer::from_config(&config, Rc::new(MapSource::default())).unwrap();

    viewer.tick(0.0, &mut NullSink);
    viewer.tick(16.0, &mut NullSink);
    let notices: Vec<_> = viewer
        .drain_notices()
        .into_iter()
        .filter(|n| n.level == StatusLevel::Warning)
        .collect();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, StatusLevel::Warning);
    assert_eq!(notices[0].source, "rivers");
    assert_eq!(notices[0].frame_index, 0);
    assert_eq!(owned(&viewer, "rivers"), 0);
}

#[test]
fn auto_rotation_advances_with_frame_time() {
    let config = ViewerConfig::from_json_str(r#"{"camera": {"auto_rotate_rad_per_s": 0.5}}"#)
        .unwrap();
    let mut viewer = Viewer::new(&config, Rc::new(MapSource::default())).unwrap();
    let start = viewer.camera().state().theta;
    viewer.tick(0.0, &mut NullSink);
    assert_eq!(viewer.camera().state().theta, start);
    viewer.tick(100.0, &mut NullSink);
    let moved = viewer.camera().state().theta - start;
    assert!((moved - 0.05).abs() < 1e-12, "{moved}");
}

#[test]
fn invalid_tier_table_is_rejected() {
    let config = ViewerConfig::from_json_str(
        r#"{"label_tiers": [
            {"max_zoom": 4.0, "rank_cutoff": 2, "label_cap": 10},
            {"max_zoom": 2.0, "rank_cutoff": 3, "label_cap": 20}
        ]}"#,
    )
    .unwrap();
    let err = Viewer::new(&config, Rc::new(MapSource::default())).unwrap_err();
    assert!(matches!(err, ViewerError::LabelTable(_)));
}

#[test]
fn shutdown_releases_everything() {
    let (mut viewer, _) = viewer();
    viewer.tick(0.0, &mut NullSink);
    viewer.flash_region("leeds", Flash::new([1.0; 4], 1000.0)).unwrap();
    assert!(!viewer.scene().is_empty());

    viewer.shutdown();
    assert!(viewer.scene().is_empty());
    assert!(viewer.layers().is_empty());
}
