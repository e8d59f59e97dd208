//! Orbit camera around the unit globe with two-stage zoom and region fitting.
//!
//! The camera sits at polar angle `phi` / azimuth `theta` (the same convention
//! as [`foundation::math::project`]) at `distance` from the center and always
//! looks at the center.

use std::f64::consts::PI;

use foundation::bounds::BoundsBox;
use foundation::math::{GeoPoint, Vec3, angular_distance, azimuth, from_spherical, polar_angle, unproject};
use serde::Deserialize;

/// Tolerance used when comparing against clamp bounds.
const BOUND_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub initial_lat: f64,
    pub initial_lon: f64,
    pub base_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    /// Vertical field of view, degrees.
    pub base_fov_deg: f64,
    pub min_fov_deg: f64,
    pub max_fov_deg: f64,
    /// Keeps the polar angle this far (radians) from either pole.
    pub pole_margin_rad: f64,
    /// Distance multiplier per zoom-in step (< 1).
    pub distance_step: f64,
    /// Field-of-view multiplier per zoom-in step (< 1).
    pub fov_step: f64,
    /// Fraction of the half field of view a focused region may fill.
    pub fit_margin: f64,
    /// Radians of rotation per pixel of drag at zoom factor 1.
    pub drag_sensitivity: f64,
    /// Idle rotation speed, radians per second; 0 disables it.
    pub auto_rotate_rad_per_s: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            initial_lat: 54.0,
            initial_lon: -2.0,
            base_distance: 3.0,
            min_distance: 1.02,
            max_distance: 6.0,
            base_fov_deg: 45.0,
            min_fov_deg: 4.0,
            max_fov_deg: 45.0,
            pole_margin_rad: 0.05,
            distance_step: 0.8,
            fov_step: 0.8,
            fit_margin: 0.85,
            drag_sensitivity: 0.005,
            auto_rotate_rad_per_s: 0.0,
        }
    }
}

impl CameraConfig {
    /// Orders the bounds and pulls the base values inside them, so a
    /// hand-written config can never produce an unclampable state.
    pub fn normalized(mut self) -> Self {
        if self.min_distance > self.max_distance {
            std::mem::swap(&mut self.min_distance, &mut self.max_distance);
        }
        if self.min_fov_deg > self.max_fov_deg {
            std::mem::swap(&mut self.min_fov_deg, &mut self.max_fov_deg);
        }
        self.min_distance = self.min_distance.max(1.0 + BOUND_EPSILON);
        self.max_distance = self.max_distance.max(self.min_distance);
        self.min_fov_deg = self.min_fov_deg.clamp(0.1, 179.0);
        self.max_fov_deg = self.max_fov_deg.clamp(self.min_fov_deg, 179.0);
        self.base_distance = self.base_distance.clamp(self.min_distance, self.max_distance);
        self.base_fov_deg = self.base_fov_deg.clamp(self.min_fov_deg, self.max_fov_deg);
        self.pole_margin_rad = self.pole_margin_rad.clamp(1e-6, PI / 4.0);
        if !(self.distance_step > 0.0 && self.distance_step < 1.0) {
            self.distance_step = 0.8;
        }
        if !(self.fov_step > 0.0 && self.fov_step < 1.0) {
            self.fov_step = 0.8;
        }
        if !(self.fit_margin > 0.0 && self.fit_margin <= 1.0) {
            self.fit_margin = 0.85;
        }
        self
    }

    pub fn min_polar(&self) -> f64 {
        self.pole_margin_rad
    }

    pub fn max_polar(&self) -> f64 {
        PI - self.pole_margin_rad
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraState {
    /// Azimuth, radians, wrapped to `[0, 2π)`.
    pub theta: f64,
    /// Polar angle from the north pole, radians.
    pub phi: f64,
    pub distance: f64,
    /// Vertical field of view, degrees.
    pub fov_deg: f64,
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct Drag {
    pointer_id: u32,
    last_px: [f64; 2],
}

/// Zoom observer; receives the zoom factor after every state change.
pub type ZoomObserver = Box<dyn FnMut(f64)>;

pub struct CameraController {
    config: CameraConfig,
    state: CameraState,
    drag: Option<Drag>,
    observers: Vec<ZoomObserver>,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}

impl CameraController {
    pub fn new(config: CameraConfig) -> Self {
        let config = config.normalized();
        let state = initial_state(&config);
        Self {
            config,
            state,
            drag: None,
            observers: Vec::new(),
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    /// `(base_distance / distance) × (base_fov / fov)`.
    pub fn zoom_factor(&self) -> f64 {
        (self.config.base_distance / self.state.distance)
            * (self.config.base_fov_deg / self.state.fov_deg)
    }

    /// Registers an observer that is called synchronously after every change.
    pub fn on_change(&mut self, observer: ZoomObserver) {
        self.observers.push(observer);
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Starts a drag with `pointer_id`. Ignored while another pointer drags.
    pub fn pointer_down(&mut self, pointer_id: u32, pos_px: [f64; 2]) -> bool {
        if self.drag.is_some() {
            return false;
        }
        self.drag = Some(Drag {
            pointer_id,
            last_px: pos_px,
        });
        true
    }

    /// Rotates by the drag delta, scaled down as the zoom factor grows so the
    /// globe moves at a similar on-screen speed at every zoom level.
    pub fn pointer_move(&mut self, pointer_id: u32, pos_px: [f64; 2]) -> bool {
        let Some(drag) = self.drag.as_mut() else {
            return false;
        };
        if drag.pointer_id != pointer_id {
            return false;
        }
        let dx = pos_px[0] - drag.last_px[0];
        let dy = pos_px[1] - drag.last_px[1];
        drag.last_px = pos_px;
        if !(dx.is_finite() && dy.is_finite()) || (dx == 0.0 && dy == 0.0) {
            return false;
        }

        let scale = self.config.drag_sensitivity / self.zoom_factor();
        self.state.theta = wrap_angle(self.state.theta - dx * scale);
        self.state.phi = self.clamp_polar(self.state.phi - dy * scale);
        self.notify();
        true
    }

    /// Ends the drag if `pointer_id` owns it (pointer up, cancel or leave).
    pub fn pointer_up(&mut self, pointer_id: u32) -> bool {
        match self.drag {
            Some(drag) if drag.pointer_id == pointer_id => {
                self.drag = None;
                true
            }
            _ => false,
        }
    }

    /// Narrows a widened field of view back to its base first, then moves
    /// closer; once at minimum distance, narrows the field of view further.
    pub fn zoom_in(&mut self) -> bool {
        let c = &self.config;
        let s = &mut self.state;
        if s.fov_deg > c.base_fov_deg + BOUND_EPSILON {
            s.fov_deg = (s.fov_deg * c.fov_step).max(c.base_fov_deg);
        } else if s.distance > c.min_distance + BOUND_EPSILON {
            s.distance = (s.distance * c.distance_step).max(c.min_distance);
        } else if s.fov_deg > c.min_fov_deg + BOUND_EPSILON {
            s.distance = c.min_distance;
            s.fov_deg = (s.fov_deg * c.fov_step).max(c.min_fov_deg);
        } else {
            return false;
        }
        self.notify();
        true
    }

    /// Reverse of [`zoom_in`](Self::zoom_in): widens a narrowed field of view
    /// back to its base first, then backs away, then widens to the maximum.
    pub fn zoom_out(&mut self) -> bool {
        let c = &self.config;
        let s = &mut self.state;
        if s.fov_deg < c.base_fov_deg - BOUND_EPSILON {
            s.fov_deg = (s.fov_deg / c.fov_step).min(c.base_fov_deg);
        } else if s.distance < c.max_distance - BOUND_EPSILON {
            s.distance = (s.distance / c.distance_step).min(c.max_distance);
        } else if s.fov_deg < c.max_fov_deg - BOUND_EPSILON {
            s.fov_deg = (s.fov_deg / c.fov_step).min(c.max_fov_deg);
        } else {
            return false;
        }
        self.notify();
        true
    }

    /// Zooms in until the zoom factor reaches `target`, at most `max_steps`
    /// times. Returns whether the target was reached.
    pub fn ensure_zoom_at_least(&mut self, target: f64, max_steps: usize) -> bool {
        let reached = |cam: &Self| cam.zoom_factor() >= target - BOUND_EPSILON;
        for _ in 0..max_steps {
            if reached(self) || !self.zoom_in() {
                break;
            }
        }
        reached(self)
    }

    /// Points the camera at the center of `bounds` and picks the distance at
    /// which the whole box fits inside `fit_margin` of the half field of
    /// view. Invalid bounds leave the camera untouched and return `false`.
    pub fn focus_on(&mut self, bounds: &BoundsBox) -> bool {
        if !bounds.is_valid() {
            return false;
        }
        let center = bounds.center();
        let alpha = bounds
            .corners()
            .iter()
            .map(|corner| angular_distance(center, *corner))
            .fold(0.0_f64, f64::max);

        self.state.fov_deg = self.config.base_fov_deg;
        self.state.phi = self.clamp_polar(polar_angle(center.lat));
        self.state.theta = wrap_angle(azimuth(center.lon));
        self.state.distance = fit_distance(alpha, self.fit_half_angle())
            .clamp(self.config.min_distance, self.config.max_distance);
        self.notify();
        true
    }

    pub fn reset_view(&mut self) {
        self.state = initial_state(&self.config);
        self.drag = None;
        self.notify();
    }

    /// Per-frame step: idle auto-rotation while no drag is in progress.
    pub fn update(&mut self, dt_s: f64) -> bool {
        let rate = self.config.auto_rotate_rad_per_s;
        if rate == 0.0 || self.drag.is_some() || !(dt_s > 0.0) {
            return false;
        }
        self.state.theta = wrap_angle(self.state.theta + rate * dt_s.min(0.1));
        self.notify();
        true
    }

    pub fn eye_position(&self) -> Vec3 {
        from_spherical(self.state.phi, self.state.theta, self.state.distance)
    }

    /// Unit view direction, from the eye toward the globe center.
    pub fn forward(&self) -> Vec3 {
        from_spherical(self.state.phi, self.state.theta, -1.0)
    }

    /// Geographic point directly below the camera.
    pub fn look_at(&self) -> Option<GeoPoint> {
        unproject(self.eye_position())
    }

    /// Half-angle (radians) a fitted region may occupy.
    pub fn fit_half_angle(&self) -> f64 {
        self.config.fit_margin * (self.config.base_fov_deg.to_radians() * 0.5)
    }

    fn clamp_polar(&self, phi: f64) -> f64 {
        phi.clamp(self.config.min_polar(), self.config.max_polar())
    }

    fn notify(&mut self) {
        let zoom = self.zoom_factor();
        for observer in &mut self.observers {
            observer(zoom);
        }
    }
}

impl std::fmt::Debug for CameraController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraController")
            .field("state", &self.state)
            .field("dragging", &self.drag.is_some())
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Distance from the center at which a cap of angular radius `alpha` seen
/// from outside spans exactly `half_angle` off the view axis.
pub fn fit_distance(alpha: f64, half_angle: f64) -> f64 {
    alpha.cos() + alpha.sin() / half_angle.tan()
}

fn initial_state(config: &CameraConfig) -> CameraState {
    let lat = if config.initial_lat.is_finite() { config.initial_lat } else { 0.0 };
    let lon = if config.initial_lon.is_finite() { config.initial_lon } else { 0.0 };
    CameraState {
        theta: wrap_angle(azimuth(lon)),
        phi: polar_angle(lat).clamp(config.min_polar(), config.max_polar()),
        distance: config.base_distance,
        fov_deg: config.base_fov_deg,
    }
}

fn wrap_angle(a: f64) -> f64 {
    a.rem_euclid(2.0 * PI)
}
