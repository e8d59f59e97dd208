use std::collections::BTreeSet;

use crate::graph::{ObjectHandle, OwnerId, SceneError, SceneGraph};
use crate::object::RenderObject;

/// The explicit set of scene objects one owner is responsible for.
///
/// All additions and removals for an owner go through this set, so after
/// [`OwnedObjects::release_all`] the owner provably holds nothing in the scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedObjects {
    owner: OwnerId,
    handles: BTreeSet<ObjectHandle>,
}

impl OwnedObjects {
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            handles: BTreeSet::new(),
        }
    }

    /// Registers a fresh owner in `scene` and returns its (empty) set.
    pub fn register(scene: &mut SceneGraph, label: impl Into<String>) -> Self {
        Self::new(scene.register_owner(label))
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.handles.contains(&handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.handles.iter().copied()
    }

    pub fn add(&mut self, scene: &mut SceneGraph, object: RenderObject) -> ObjectHandle {
        let handle = scene.add_object(self.owner, object);
        self.handles.insert(handle);
        handle
    }

    pub fn remove(&mut self, scene: &mut SceneGraph, handle: ObjectHandle) -> bool {
        if !self.handles.remove(&handle) {
            return false;
        }
        scene.remove_object(self.owner, handle).is_ok()
    }

    pub fn object_mut<'s>(
        &self,
        scene: &'s mut SceneGraph,
        handle: ObjectHandle,
    ) -> Result<&'s mut RenderObject, SceneError> {
        scene.object_mut(self.owner, handle)
    }

    /// Removes every owned object from `scene`. Returns how many were removed.
    pub fn release_all(&mut self, scene: &mut SceneGraph) -> usize {
        let handles = std::mem::take(&mut self.handles);
        handles
            .into_iter()
            .filter(|h| scene.remove_object(self.owner, *h).is_ok())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::OwnedObjects;
    use crate::graph::SceneGraph;
    use crate::object::{LabelStyle, Material, RenderObject};
    use foundation::math::Vec3;

    fn label(text: &str) -> RenderObject {
        RenderObject::Label {
            text: text.to_string(),
            position: Vec3::new(0.0, 1.0, 0.0),
            style: LabelStyle::default(),
            material: Material::opaque([1.0; 4]),
        }
    }

    #[test]
    fn release_all_empties_owner() {
        let mut scene = SceneGraph::new();
        let mut owned = OwnedObjects::register(&mut scene, "labels");
        owned.add(&mut scene, label("a"));
        owned.add(&mut scene, label("b"));
        assert_eq!(owned.len(), 2);

        assert_eq!(owned.release_all(&mut scene), 2);
        assert!(owned.is_empty());
        assert!(scene.is_empty());
        assert_eq!(owned.release_all(&mut scene), 0);
    }

    #[test]
    fn release_leaves_other_owners_alone() {
        let mut scene = SceneGraph::new();
        let mut a = OwnedObjects::register(&mut scene, "a");
        let mut b = OwnedObjects::register(&mut scene, "b");
        a.add(&mut scene, label("a"));
        let hb = b.add(&mut scene, label("b"));

        a.release_all(&mut scene);
        assert!(scene.contains(hb));
        assert!(!a.remove(&mut scene, hb));
        assert_eq!(b.len(), 1);
    }
}
