use std::f64::consts::PI;

use formats::feature::{Feature, FeatureCollection, Geometry};
use formats::predicate::{PredicateResult, first_match};
use foundation::bounds::BoundsBox;
use foundation::math::{Chord, DEFAULT_MAX_STEP_RAD, Vec3, chords_to_line_list, tessellate_path};
use scene::graph::{ObjectHandle, SceneGraph};
use scene::object::{Material, RenderObject, Rgba};
use scene::owned::OwnedObjects;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub core_radius: f64,
    pub halo_radius: f64,
    pub core_opacity: f32,
    pub halo_opacity: f32,
    pub max_step_rad: f64,
    /// Points sampled along each edge of a bounding-box outline.
    pub samples_per_edge: usize,
    pub duration_ms: f64,
    pub color: Rgba,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            core_radius: 1.004,
            halo_radius: 1.008,
            core_opacity: 1.0,
            halo_opacity: 0.35,
            max_step_rad: DEFAULT_MAX_STEP_RAD,
            samples_per_edge: 16,
            duration_ms: 1800.0,
            color: [1.0, 0.9, 0.3, 1.0],
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HighlightId(pub u64);

/// Parameters of one flash.
#[derive(Debug, Clone, PartialEq)]
pub struct Flash {
    pub color: Rgba,
    pub duration_ms: f64,
    /// A new flash with the same key replaces the running one.
    pub replace_key: Option<String>,
}

impl Flash {
    pub fn new(color: Rgba, duration_ms: f64) -> Self {
        Self {
            color,
            duration_ms,
            replace_key: None,
        }
    }

    pub fn replacing(mut self, key: impl Into<String>) -> Self {
        self.replace_key = Some(key.into());
        self
    }
}

/// Fade and pulse envelope at progress `t` in `[0, 1]`: a steep quadratic
/// fade times a single sine bump that starts at 0.15.
pub fn pulse_envelope(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    let fade = (1.0 - t) * (1.0 - t);
    let pulse = 0.15 + 0.85 * (t * PI).sin();
    fade * pulse
}

#[derive(Debug)]
struct Highlight {
    id: HighlightId,
    key: Option<String>,
    core: ObjectHandle,
    halo: ObjectHandle,
    start_ms: f64,
    duration_ms: f64,
}

/// Runs time-bounded pulse animations over tessellated outlines.
///
/// Each highlight owns two line objects (a core and a wider, dimmer halo)
/// that are released exactly once, when the animation completes or is
/// cancelled.
#[derive(Debug)]
pub struct HighlightAnimator {
    config: HighlightConfig,
    owned: OwnedObjects,
    active: Vec<Highlight>,
    next_id: u64,
}

impl HighlightAnimator {
    pub fn new(scene: &mut SceneGraph, config: HighlightConfig) -> Self {
        Self {
            config,
            owned: OwnedObjects::register(scene, "highlights"),
            active: Vec::new(),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &HighlightConfig {
        &self.config
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn owned_len(&self) -> usize {
        self.owned.len()
    }

    pub fn is_active(&self, id: HighlightId) -> bool {
        self.active.iter().any(|h| h.id == id)
    }

    /// Flashes every ring of a polygon or multipolygon. Points and
    /// geometry without a drawable ring produce nothing.
    pub fn flash_geometry(
        &mut self,
        scene: &mut SceneGraph,
        geometry: &Geometry,
        flash: Flash,
        now_ms: f64,
    ) -> Option<HighlightId> {
        let unit: Vec<Chord> = geometry
            .polygons()
            .into_iter()
            .flatten()
            .flat_map(|ring| tessellate_path(ring, true, self.config.max_step_rad, 1.0))
            .collect();
        self.start(scene, &unit, flash, now_ms)
    }

    /// Flashes the outline of a bounding box. Invalid bounds are a no-op.
    pub fn flash_bounds(
        &mut self,
        scene: &mut SceneGraph,
        bounds: &BoundsBox,
        flash: Flash,
        now_ms: f64,
    ) -> Option<HighlightId> {
        if !bounds.is_valid() {
            return None;
        }
        let ring = bounds.outline_ring(self.config.samples_per_edge.max(1));
        let unit = tessellate_path(&ring, true, self.config.max_step_rad, 1.0);
        self.start(scene, &unit, flash, now_ms)
    }

    /// Flashes the first feature the predicate accepts; features whose
    /// predicate errors count as non-matching.
    pub fn flash_matching(
        &mut self,
        scene: &mut SceneGraph,
        collection: &FeatureCollection,
        predicate: &dyn Fn(&Feature) -> PredicateResult,
        flash: Flash,
        now_ms: f64,
    ) -> Option<HighlightId> {
        let feature = first_match(collection, predicate)?;
        self.flash_geometry(scene, &feature.geometry, flash, now_ms)
    }

    fn start(
        &mut self,
        scene: &mut SceneGraph,
        unit_chords: &[Chord],
        flash: Flash,
        now_ms: f64,
    ) -> Option<HighlightId> {
        if unit_chords.is_empty() || !(flash.duration_ms > 0.0) || !now_ms.is_finite() {
            return None;
        }
        if let Some(key) = &flash.replace_key {
            let replaced: Vec<HighlightId> = self
                .active
                .iter()
                .filter(|h| h.key.as_ref() == Some(key))
                .map(|h| h.id)
                .collect();
            for id in replaced {
                self.cancel(scene, id);
            }
        }

        let unit = chords_to_line_list(unit_chords);
        let scaled = |radius: f64| -> Vec<Vec3> { unit.iter().map(|v| *v * radius).collect() };
        let envelope = pulse_envelope(0.0) as f32;
        let core = self.owned.add(
            scene,
            RenderObject::Lines {
                vertices: scaled(self.config.core_radius),
                material: Material::new(flash.color, self.config.core_opacity * envelope),
            },
        );
        let halo = self.owned.add(
            scene,
            RenderObject::Lines {
                vertices: scaled(self.config.halo_radius),
                material: Material::new(flash.color, self.config.halo_opacity * envelope),
            },
        );

        let id = HighlightId(self.next_id);
        self.next_id += 1;
        self.active.push(Highlight {
            id,
            key: flash.replace_key,
            core,
            halo,
            start_ms: now_ms,
            duration_ms: flash.duration_ms,
        });
        debug!(highlight = id.0, segments = unit_chords.len(), "started highlight");
        Some(id)
    }

    /// Advances every highlight to `now_ms`. Finished highlights are
    /// released; returns how many finished.
    pub fn tick(&mut self, scene: &mut SceneGraph, now_ms: f64) -> usize {
        let mut finished = Vec::new();
        for h in &self.active {
            let t = (now_ms - h.start_ms) / h.duration_ms;
            if t >= 1.0 {
                finished.push(h.id);
                continue;
            }
            let envelope = pulse_envelope(t) as f32;
            if let Ok(core) = self.owned.object_mut(scene, h.core) {
                core.material_mut().opacity = self.config.core_opacity * envelope;
            }
            if let Ok(halo) = self.owned.object_mut(scene, h.halo) {
                halo.material_mut().opacity = self.config.halo_opacity * envelope;
            }
        }
        let count = finished.len();
        for id in finished {
            self.cancel(scene, id);
        }
        count
    }

    /// Current `(core, halo)` opacity of a running highlight.
    pub fn opacity(&self, scene: &SceneGraph, id: HighlightId) -> Option<(f32, f32)> {
        let h = self.active.iter().find(|h| h.id == id)?;
        let core = scene.object(h.core)?.material().opacity;
        let halo = scene.object(h.halo)?.material().opacity;
        Some((core, halo))
    }

    /// Stops a highlight and releases its objects. Returns `false` if it was
    /// not running.
    pub fn cancel(&mut self, scene: &mut SceneGraph, id: HighlightId) -> bool {
        let Some(index) = self.active.iter().position(|h| h.id == id) else {
            return false;
        };
        let h = self.active.swap_remove(index);
        self.owned.remove(scene, h.core);
        self.owned.remove(scene, h.halo);
        true
    }

    pub fn clear(&mut self, scene: &mut SceneGraph) -> usize {
        let count = self.active.len();
        self.active.clear();
        self.owned.release_all(scene);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formats::predicate::property_equals;
    use foundation::math::GeoPoint;
    use serde_json::Value;

    fn flash() -> Flash {
        Flash::new([1.0, 0.0, 0.0, 1.0], 1000.0)
    }

    fn animator() -> (SceneGraph, HighlightAnimator) {
        let mut scene = SceneGraph::new();
        let anim = HighlightAnimator::new(&mut scene, HighlightConfig::default());
        (scene, anim)
    }

    fn uk() -> BoundsBox {
        BoundsBox::new(50.0, 58.0, -6.0, 2.0).unwrap()
    }

    #[test]
    fn envelope_shape() {
        assert!((pulse_envelope(0.0) - 0.15).abs() < 1e-12);
        assert!(pulse_envelope(0.25) > pulse_envelope(0.0));
        assert!(pulse_envelope(0.25) > pulse_envelope(0.75));
        assert!(pulse_envelope(0.999) < 1e-4);
        assert_eq!(pulse_envelope(1.0), 0.0);
    }

    #[test]
    fn lifecycle_releases_exactly_once() {
        let (mut scene, mut anim) = animator();
        let id = anim.flash_bounds(&mut scene, &uk(), flash(), 0.0).unwrap();
        assert_eq!(scene.len(), 2);
        assert_eq!(anim.active_len(), 1);

        let (core0, halo0) = anim.opacity(&scene, id).unwrap();
        assert!(core0 < 0.2);
        assert!(halo0 < core0);

        assert_eq!(anim.tick(&mut scene, 250.0), 0);
        let (core_peak, _) = anim.opacity(&scene, id).unwrap();
        assert!(core_peak > core0);

        assert_eq!(anim.tick(&mut scene, 1000.0), 1);
        assert!(scene.is_empty());
        assert_eq!(anim.owned_len(), 0);
        assert!(!anim.is_active(id));

        assert_eq!(anim.tick(&mut scene, 2000.0), 0);
        assert!(!anim.cancel(&mut scene, id));
    }

    #[test]
    fn halo_is_wider_than_core() {
        let (mut scene, mut anim) = animator();
        anim.flash_bounds(&mut scene, &uk(), flash(), 0.0).unwrap();
        let radii: Vec<f64> = scene
            .iter()
            .map(|(_, _, obj)| match obj {
                RenderObject::Lines { vertices, .. } => vertices[0].length(),
                _ => 0.0,
            })
            .collect();
        assert_eq!(radii.len(), 2);
        assert!(radii.iter().any(|r| (r - 1.004).abs() < 1e-9));
        assert!(radii.iter().any(|r| (r - 1.008).abs() < 1e-9));
    }

    #[test]
    fn replace_key_drops_earlier_flash() {
        let (mut scene, mut anim) = animator();
        let a = anim
            .flash_bounds(&mut scene, &uk(), flash().replacing("selection"), 0.0)
            .unwrap();
        let other = anim.flash_bounds(&mut scene, &uk(), flash(), 0.0).unwrap();
        let b = anim
            .flash_bounds(&mut scene, &uk(), flash().replacing("selection"), 10.0)
            .unwrap();
        assert!(!anim.is_active(a));
        assert!(anim.is_active(b));
        assert!(anim.is_active(other));
        assert_eq!(scene.len(), 4);
    }

    #[test]
    fn invalid_inputs_are_noops() {
        let (mut scene, mut anim) = animator();
        let bad = BoundsBox {
            min_lat: 10.0,
            max_lat: 5.0,
            min_lon: 0.0,
            max_lon: 1.0,
        };
        assert!(anim.flash_bounds(&mut scene, &bad, flash(), 0.0).is_none());
        assert!(
            anim.flash_bounds(&mut scene, &uk(), Flash::new([1.0; 4], 0.0), 0.0)
                .is_none()
        );
        let point = Geometry::Point(GeoPoint::new(1.0, 1.0));
        assert!(anim.flash_geometry(&mut scene, &point, flash(), 0.0).is_none());
        assert!(scene.is_empty());
    }

    #[test]
    fn matching_feature_is_flashed() {
        let (mut scene, mut anim) = animator();
        let square = |lat: f64| {
            Geometry::Polygon(vec![vec![
                GeoPoint::new(lat, 0.0),
                GeoPoint::new(lat, 1.0),
                GeoPoint::new(lat + 1.0, 1.0),
                GeoPoint::new(lat, 0.0),
            ]])
        };
        let fc = FeatureCollection::new(vec![
            Feature::new(square(10.0)),
            Feature::new(square(20.0)).with_property("ward", "Headingley"),
        ]);
        let pred = property_equals("ward", Value::from("Headingley"));
        assert!(
            anim.flash_matching(&mut scene, &fc, pred.as_ref(), flash(), 0.0)
                .is_some()
        );

        let missing = property_equals("ward", Value::from("Nowhere"));
        assert!(
            anim.flash_matching(&mut scene, &fc, missing.as_ref(), flash(), 0.0)
                .is_none()
        );
        assert_eq!(anim.active_len(), 1);
    }

    #[test]
    fn clear_releases_everything() {
        let (mut scene, mut anim) = animator();
        anim.flash_bounds(&mut scene, &uk(), flash(), 0.0);
        anim.flash_bounds(&mut scene, &uk(), flash(), 0.0);
        assert_eq!(anim.clear(&mut scene), 2);
        assert!(scene.is_empty());
        assert_eq!(anim.owned_len(), 0);
    }
}
