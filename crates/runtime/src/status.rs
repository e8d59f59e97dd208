use crate::frame::Frame;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// Transient, user-facing notification (e.g. "failed to load wards").
///
/// The surrounding UI drains these once per frame; nothing in the core
/// depends on them being read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusNotice {
    pub frame_index: u64,
    pub level: StatusLevel,
    /// Short machine-readable origin, usually a layer id.
    pub source: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct StatusBus {
    frame_index: u64,
    notices: Vec<StatusNotice>,
}

impl StatusBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices emitted from now on are stamped with `frame`.
    pub fn begin_frame(&mut self, frame: Frame) {
        self.frame_index = frame.index;
    }

    pub fn emit(
        &mut self,
        level: StatusLevel,
        source: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.notices.push(StatusNotice {
            frame_index: self.frame_index,
            level,
            source: source.into(),
            message: message.into(),
        });
    }

    pub fn info(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.emit(StatusLevel::Info, source, message);
    }

    pub fn warn(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.emit(StatusLevel::Warning, source, message);
    }

    pub fn notices(&self) -> &[StatusNotice] {
        &self.notices
    }

    pub fn drain(&mut self) -> Vec<StatusNotice> {
        std::mem::take(&mut self.notices)
    }
}

#[cfg(test)]
mod tests {
    use super::{StatusBus, StatusLevel};
    use crate::frame::Frame;

    #[test]
    fn records_notices_with_frame_index() {
        let mut bus = StatusBus::new();
        bus.begin_frame(Frame::first(0.0).next(16.0).next(32.0));
        bus.warn("wards", "load failed");
        assert_eq!(bus.notices().len(), 1);
        assert_eq!(bus.notices()[0].frame_index, 2);
        assert_eq!(bus.notices()[0].level, StatusLevel::Warning);
    }

    #[test]
    fn drain_clears_notices() {
        let mut bus = StatusBus::new();
        bus.info("k", "m");
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert!(bus.notices().is_empty());
    }
}
