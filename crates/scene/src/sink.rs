use runtime::frame::Frame;

use crate::graph::SceneGraph;

/// Drawing surface collaborator. Called once at the end of every tick with
/// the fully updated scene.
pub trait FrameSink {
    fn present(&mut self, frame: &Frame, scene: &SceneGraph);
}

/// Discards frames; used by headless runs and tests.
#[derive(Debug, Default, Copy, Clone)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &Frame, _scene: &SceneGraph) {}
}
