use std::sync::Arc;

use earcutr::earcut;
use formats::feature::{Feature, FeatureCollection, Ring};
use formats::predicate::{FeaturePredicate, filter_fail_closed};
use foundation::math::{Vec3, chords_to_line_list, tessellate_path, unit_vector};
use scene::graph::SceneGraph;
use scene::object::{Material, RenderObject};
use tracing::{debug, warn};

use crate::data::{Accepted, LayerData};
use crate::layer::{Layer, LayerContext, LayerCore, LayerId, LayerKind};
use crate::loader::LoadCompletion;
use crate::symbology::BoundaryStyle;

/// Polygon outlines drawn as great-circle line sets, optionally restricted to
/// the features a predicate accepts and optionally filled.
pub struct BoundaryLayer {
    core: LayerCore,
    data: LayerData,
    style: BoundaryStyle,
    filter: Option<FeaturePredicate>,
}

impl BoundaryLayer {
    pub fn new(
        id: impl Into<LayerId>,
        name: impl Into<String>,
        data: LayerData,
        style: BoundaryStyle,
    ) -> Self {
        Self {
            core: LayerCore::new(id, name),
            data,
            style,
            filter: None,
        }
    }

    /// A boundary subset: only features the predicate accepts are drawn.
    /// Features whose predicate errors are left out.
    pub fn filtered(
        id: impl Into<LayerId>,
        name: impl Into<String>,
        data: LayerData,
        style: BoundaryStyle,
        predicate: FeaturePredicate,
    ) -> Self {
        Self {
            filter: Some(predicate),
            ..Self::new(id, name, data, style)
        }
    }

    pub fn style(&self) -> &BoundaryStyle {
        &self.style
    }

    pub fn data(&self) -> &LayerData {
        &self.data
    }

    fn selected<'a>(&self, collection: &'a FeatureCollection) -> Vec<&'a Feature> {
        let Some(filter) = &self.filter else {
            return collection.features.iter().collect();
        };
        let (kept, errors) = filter_fail_closed(collection, filter.as_ref());
        if errors > 0 {
            warn!(layer = %self.core.id(), errors, "features excluded by failing predicate");
        }
        kept
    }

    fn build(&mut self, scene: &mut SceneGraph, collection: &FeatureCollection) {
        let features = self.selected(collection);
        let mut outline = Vec::new();
        let mut fill = Vec::new();
        let mut skipped = 0usize;

        for feature in features {
            for rings in feature.geometry.polygons() {
                for ring in rings {
                    let chords =
                        tessellate_path(ring, true, self.style.max_step_rad, self.style.radius);
                    if chords.is_empty() {
                        skipped += 1;
                        continue;
                    }
                    outline.extend(chords_to_line_list(&chords));
                }
                if let Some(fill_style) = self.style.fill {
                    fill.extend(triangulate_polygon(rings, fill_style.radius));
                }
            }
        }
        if skipped > 0 {
            debug!(layer = %self.core.id(), skipped, "skipped degenerate rings");
        }

        let material = self.style.material();
        let fill_material = self
            .style
            .fill
            .map(|f| Material::new(f.color, f.opacity));
        let owned = self.core.owned(scene);
        if let Some(material) = fill_material
            && !fill.is_empty()
        {
            owned.add(
                scene,
                RenderObject::Mesh {
                    triangles: fill,
                    material,
                },
            );
        }
        if !outline.is_empty() {
            owned.add(
                scene,
                RenderObject::Lines {
                    vertices: outline,
                    material,
                },
            );
        }
    }
}

impl Layer for BoundaryLayer {
    fn id(&self) -> &LayerId {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> LayerKind {
        if self.filter.is_some() {
            LayerKind::FilteredBoundary
        } else {
            LayerKind::Boundary
        }
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn init(&mut self, ctx: &mut LayerContext<'_>) {
        self.core.owned(ctx.scene);
    }

    fn enable(&mut self, ctx: &mut LayerContext<'_>) {
        if self.core.is_enabled() {
            return;
        }
        self.core.set_enabled(true);
        let id = self.core.id().clone();
        if let Some(collection) = self.data.ensure(&id, ctx.loader, ctx.status) {
            self.build(ctx.scene, &collection);
        }
    }

    fn disable(&mut self, ctx: &mut LayerContext<'_>) {
        self.core.set_enabled(false);
        self.core.release(ctx.scene);
    }

    fn refresh(&mut self, ctx: &mut LayerContext<'_>) {
        self.core.release(ctx.scene);
        self.data.invalidate(ctx.loader);
        if self.core.is_enabled() {
            let id = self.core.id().clone();
            if let Some(collection) = self.data.ensure(&id, ctx.loader, ctx.status) {
                self.build(ctx.scene, &collection);
            }
        }
    }

    fn destroy(&mut self, ctx: &mut LayerContext<'_>) {
        self.disable(ctx);
    }

    fn on_load(&mut self, ctx: &mut LayerContext<'_>, completion: LoadCompletion) {
        match self.data.accept(completion) {
            Accepted::Loaded(collection) => {
                if self.core.is_enabled() && self.core.owned_len() == 0 {
                    self.build(ctx.scene, &collection);
                }
            }
            Accepted::Failed(e) => {
                warn!(layer = %self.core.id(), error = %e, "boundary load failed");
                ctx.status
                    .warn(self.core.id().as_str(), format!("failed to load {}: {e}", self.core.name()));
            }
            Accepted::Stale => debug!(layer = %self.core.id(), "discarding stale load"),
        }
    }

    fn features(&self) -> Option<Arc<FeatureCollection>> {
        self.data.features()
    }

    fn owned_len(&self) -> usize {
        self.core.owned_len()
    }

    fn release_owned(&mut self, scene: &mut SceneGraph) -> usize {
        self.core.release(scene)
    }
}

/// Triangulates a polygon (outer ring plus holes) in the tangent plane at the
/// outer ring's centroid and returns a triangle list at `radius`.
pub fn triangulate_polygon(rings: &[Ring], radius: f64) -> Vec<Vec3> {
    let Some(outer) = rings.first() else {
        return Vec::new();
    };
    if outer.len() < 3 || outer.iter().any(|p| !p.is_finite()) {
        return Vec::new();
    }

    let outer_units: Vec<Vec3> = outer.iter().map(|p| unit_vector(*p)).collect();
    let Some(normal) = centroid(&outer_units).normalized() else {
        return Vec::new();
    };
    let up = if normal.y.abs() < 0.99 {
        Vec3::new(0.0, 1.0, 0.0)
    } else {
        Vec3::new(1.0, 0.0, 0.0)
    };
    let Some(east) = up.cross(normal).normalized() else {
        return Vec::new();
    };
    let north = normal.cross(east);

    let mut vertices: Vec<Vec3> = Vec::new();
    let mut coords_2d: Vec<f64> = Vec::new();
    let mut hole_indices: Vec<usize> = Vec::new();

    for (ring_i, ring) in rings.iter().enumerate() {
        if ring.iter().any(|p| !p.is_finite()) {
            continue;
        }
        let mut pts: Vec<Vec3> = ring.iter().map(|p| unit_vector(*p)).collect();
        drop_closing_duplicate(&mut pts);
        if pts.len() < 3 {
            continue;
        }
        if ring_i > 0 {
            hole_indices.push(vertices.len());
        }
        for p in pts {
            // Gnomonic projection keeps great-circle edges straight in 2D.
            let along = p.dot(normal);
            if along <= 1e-6 {
                return Vec::new();
            }
            let q = p * (1.0 / along);
            coords_2d.push(q.dot(east));
            coords_2d.push(q.dot(north));
            vertices.push(p);
        }
    }

    if vertices.len() < 3 {
        return Vec::new();
    }
    let Ok(indices) = earcut(&coords_2d, &hole_indices, 2) else {
        return Vec::new();
    };
    indices
        .into_iter()
        .filter_map(|i| vertices.get(i).map(|v| *v * radius))
        .collect()
}

fn drop_closing_duplicate(points: &mut Vec<Vec3>) {
    if points.len() >= 2 {
        let first = points[0];
        let last = points[points.len() - 1];
        if (first - last).length() < 1e-9 {
            points.pop();
        }
    }
}

fn centroid(vertices: &[Vec3]) -> Vec3 {
    let sum = vertices.iter().fold(Vec3::ZERO, |acc, v| acc + *v);
    sum * (1.0 / vertices.len().max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation::math::GeoPoint;

    fn square(lat: f64, lon: f64, size: f64) -> Ring {
        vec![
            GeoPoint::new(lat, lon),
            GeoPoint::new(lat, lon + size),
            GeoPoint::new(lat + size, lon + size),
            GeoPoint::new(lat + size, lon),
            GeoPoint::new(lat, lon),
        ]
    }

    #[test]
    fn square_triangulates_into_two_triangles() {
        let tris = triangulate_polygon(&[square(50.0, -2.0, 1.0)], 1.0);
        assert_eq!(tris.len(), 6);
        for v in tris {
            assert!((v.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn hole_adds_triangles() {
        let with_hole = triangulate_polygon(
            &[square(50.0, -2.0, 2.0), square(50.5, -1.5, 0.5)],
            1.0,
        );
        assert!(with_hole.len() > 6);
        assert_eq!(with_hole.len() % 3, 0);
    }

    #[test]
    fn degenerate_rings_produce_nothing() {
        assert!(triangulate_polygon(&[], 1.0).is_empty());
        let line = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0)];
        assert!(triangulate_polygon(&[line], 1.0).is_empty());
        let bad = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(f64::NAN, 1.0),
            GeoPoint::new(1.0, 1.0),
        ];
        assert!(triangulate_polygon(&[bad], 1.0).is_empty());
    }
}
