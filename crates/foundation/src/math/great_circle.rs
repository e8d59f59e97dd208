//! Great-circle tessellation.
//!
//! Boundary rings, bounds outlines and highlight flashes all go through
//! [`tessellate_unit`] so arc density is identical everywhere.

use super::{GeoPoint, Vec3, angle_between, unit_vector};

/// Default maximum angular step between consecutive vertices (1 degree).
pub const DEFAULT_MAX_STEP_RAD: f64 = std::f64::consts::PI / 180.0;

/// Below this, arcs are treated as a single point and `sin(omega)` as zero.
pub const ARC_EPSILON: f64 = 1e-9;

/// One straight segment of a tessellated arc.
pub type Chord = [Vec3; 2];

/// Spherical linear interpolation between unit vectors `a` and `b` separated
/// by `omega` radians.
///
/// Falls back to a renormalized linear blend when `sin(omega)` vanishes
/// (coincident or antipodal endpoints). The antipodal midpoint has no defined
/// direction; an arbitrary perpendicular is returned instead of NaN.
pub fn slerp_unit(a: Vec3, b: Vec3, omega: f64, t: f64) -> Vec3 {
    let sin_omega = omega.sin();
    if sin_omega.abs() < ARC_EPSILON {
        return a.lerp(b, t).normalized().unwrap_or_else(|| a.any_orthogonal());
    }
    let a_scale = ((1.0 - t) * omega).sin() / sin_omega;
    let b_scale = (t * omega).sin() / sin_omega;
    a * a_scale + b * b_scale
}

/// Number of chords used for an arc of `omega` radians:
/// `max(1, ceil(omega / max_step_rad))`. Every chord spans at most
/// `max_step_rad`.
pub fn arc_steps(omega: f64, max_step_rad: f64) -> usize {
    if !max_step_rad.is_finite() || max_step_rad <= 0.0 || !omega.is_finite() {
        return 1;
    }
    let steps = (omega / max_step_rad).ceil();
    if steps <= 1.0 { 1 } else { steps as usize }
}

/// Tessellates the geodesic between unit vectors `a` and `b` into chords at
/// `radius`. Endpoints are emitted exactly (no accumulated drift), so
/// consecutive arcs of a ring share vertices bit-for-bit.
pub fn tessellate_unit(a: Vec3, b: Vec3, max_step_rad: f64, radius: f64) -> Vec<Chord> {
    let omega = angle_between(a, b);
    if omega < ARC_EPSILON {
        return vec![[a * radius, b * radius]];
    }

    let steps = arc_steps(omega, max_step_rad);
    let mut out = Vec::with_capacity(steps);
    let mut prev = a * radius;
    for i in 1..=steps {
        let next = if i == steps {
            b * radius
        } else {
            slerp_unit(a, b, omega, i as f64 / steps as f64) * radius
        };
        out.push([prev, next]);
        prev = next;
    }
    out
}

/// Tessellates the geodesic between two geographic points.
pub fn tessellate(a: GeoPoint, b: GeoPoint, max_step_rad: f64, radius: f64) -> Vec<Chord> {
    tessellate_unit(unit_vector(a), unit_vector(b), max_step_rad, radius)
}

/// Tessellates a polyline or ring of geographic points.
///
/// With `close` set, an edge from the last point back to the first is added
/// unless the ring is already explicitly closed. Returns an empty list for
/// fewer than two points or any non-finite coordinate.
pub fn tessellate_path(
    points: &[GeoPoint],
    close: bool,
    max_step_rad: f64,
    radius: f64,
) -> Vec<Chord> {
    if points.len() < 2 || points.iter().any(|p| !p.is_finite()) {
        return Vec::new();
    }

    let units: Vec<Vec3> = points.iter().map(|p| unit_vector(*p)).collect();
    let mut out = Vec::new();
    for pair in units.windows(2) {
        out.extend(tessellate_unit(pair[0], pair[1], max_step_rad, radius));
    }

    let (first, last) = (points[0], points[points.len() - 1]);
    if close && first != last {
        out.extend(tessellate_unit(
            units[units.len() - 1],
            units[0],
            max_step_rad,
            radius,
        ));
    }
    out
}

/// Flattens chords into a line-list vertex buffer (two vertices per chord).
pub fn chords_to_line_list(chords: &[Chord]) -> Vec<Vec3> {
    chords.iter().flat_map(|c| [c[0], c[1]]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::project;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn chord_angle_sum(chords: &[Chord]) -> f64 {
        chords
            .iter()
            .map(|c| {
                let a = c[0].normalized().unwrap();
                let b = c[1].normalized().unwrap();
                angle_between(a, b)
            })
            .sum()
    }

    #[test]
    fn segment_count_is_ceil_of_angle_over_step() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 10.0);
        let step = 3.0_f64.to_radians();
        let chords = tessellate(a, b, step, 1.0);
        // 10 / 3 -> 4 segments.
        assert_eq!(chords.len(), 4);
        assert_close(chord_angle_sum(&chords), 10.0_f64.to_radians(), 1e-9);
    }

    #[test]
    fn fine_step_is_never_coarsened() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 90.0);
        let step = 0.005_f64.to_radians();
        let chords = tessellate(a, b, step, 1.0);

        let omega = angle_between(unit_vector(a), unit_vector(b));
        assert_eq!(chords.len(), arc_steps(omega, step));
        // 90 / 0.005 = 18000, give or take one for rounding in acos.
        assert!((18_000..=18_001).contains(&chords.len()), "{}", chords.len());
        for c in &chords {
            // atan2 stays accurate for tiny angles where acos does not.
            let angle = c[0].cross(c[1]).length().atan2(c[0].dot(c[1]));
            assert!(angle <= step * (1.0 + 1e-9), "chord {angle} exceeds step {step}");
        }
    }

    #[test]
    fn vertices_lie_on_the_geodesic_plane_and_radius() {
        let a = GeoPoint::new(51.0, -1.0);
        let b = GeoPoint::new(-20.0, 70.0);
        let ua = unit_vector(a);
        let ub = unit_vector(b);
        let normal = ua.cross(ub).normalized().unwrap();

        let chords = tessellate(a, b, 2.0_f64.to_radians(), 1.5);
        for c in &chords {
            for v in c {
                assert_close(v.length(), 1.5, 1e-9);
                assert_close(v.dot(normal), 0.0, 1e-9);
            }
        }
        assert_close(chord_angle_sum(&chords), angle_between(ua, ub), 1e-9);
    }

    #[test]
    fn endpoints_are_exact() {
        let a = GeoPoint::new(10.0, 20.0);
        let b = GeoPoint::new(12.0, 25.0);
        let chords = tessellate(a, b, 0.5_f64.to_radians(), 2.0);
        assert_eq!(chords.first().unwrap()[0], project(10.0, 20.0, 2.0));
        assert_eq!(chords.last().unwrap()[1], project(12.0, 25.0, 2.0));
        for pair in chords.windows(2) {
            assert_eq!(pair[0][1], pair[1][0]);
        }
    }

    #[test]
    fn coincident_points_emit_single_chord() {
        let p = GeoPoint::new(45.0, 45.0);
        let chords = tessellate(p, p, DEFAULT_MAX_STEP_RAD, 1.0);
        assert_eq!(chords.len(), 1);
        assert_eq!(chords[0][0], chords[0][1]);
    }

    #[test]
    fn antipodal_points_do_not_produce_nan() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 180.0);
        let chords = tessellate(a, b, 7.0_f64.to_radians(), 1.0);
        // 180 / 7 -> 26 segments; the midpoint direction is arbitrary.
        assert_eq!(chords.len(), 26);
        for c in &chords {
            assert!(c[0].is_finite() && c[1].is_finite());
            assert_close(c[1].length(), 1.0, 1e-9);
        }
    }

    #[test]
    fn invalid_step_falls_back_to_one_chord() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 40.0);
        assert_eq!(tessellate(a, b, 0.0, 1.0).len(), 1);
        assert_eq!(tessellate(a, b, f64::NAN, 1.0).len(), 1);
    }

    #[test]
    fn ring_is_closed_once() {
        let ring = [
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(1.0, 1.0),
        ];
        let open = tessellate_path(&ring, true, 10.0_f64.to_radians(), 1.0);
        assert_eq!(open.len(), 3);
        assert_eq!(open.last().unwrap()[1], open.first().unwrap()[0]);

        let closed = [ring[0], ring[1], ring[2], ring[0]];
        let chords = tessellate_path(&closed, true, 10.0_f64.to_radians(), 1.0);
        assert_eq!(chords.len(), 3);
    }

    #[test]
    fn ring_with_non_finite_coordinate_is_skipped() {
        let ring = [GeoPoint::new(0.0, 0.0), GeoPoint::new(f64::NAN, 1.0)];
        assert!(tessellate_path(&ring, true, DEFAULT_MAX_STEP_RAD, 1.0).is_empty());
        assert!(tessellate_path(&ring[..1], true, DEFAULT_MAX_STEP_RAD, 1.0).is_empty());
    }
}
