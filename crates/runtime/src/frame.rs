/// Per-tick frame metadata.
///
/// The frame loop stamps every tick with a monotonically increasing index and
/// the host clock in milliseconds. Everything that animates (camera
/// auto-rotation, highlight pulses) reads time from here, never from the wall
/// clock, so a recorded sequence of frames replays identically.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Host clock at the start of the frame (milliseconds).
    pub now_ms: f64,
    /// Seconds since the previous frame; zero for the first frame.
    pub dt_s: f64,
}

impl Frame {
    pub fn first(now_ms: f64) -> Self {
        Self {
            index: 0,
            now_ms,
            dt_s: 0.0,
        }
    }

    /// Next frame at `now_ms`. A clock that runs backwards yields `dt_s = 0`.
    pub fn next(self, now_ms: f64) -> Self {
        let dt_ms = now_ms - self.now_ms;
        let dt_s = if dt_ms.is_finite() && dt_ms > 0.0 {
            dt_ms / 1000.0
        } else {
            0.0
        };
        Self {
            index: self.index + 1,
            now_ms,
            dt_s,
        }
    }
}
