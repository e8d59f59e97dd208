use foundation::arena::Arena;
use foundation::handles::Handle;

use crate::object::{ObjectKind, RenderObject};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectHandle(pub Handle);

/// Identifies who may remove or mutate an object. Every layer and the
/// highlight animator register their own owner; handles are never shared.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    UnknownObject(ObjectHandle),
    NotOwner {
        handle: ObjectHandle,
        owner: OwnerId,
        caller: OwnerId,
    },
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneError::UnknownObject(h) => write!(f, "unknown scene object {:?}", h.0),
            SceneError::NotOwner {
                handle,
                owner,
                caller,
            } => write!(
                f,
                "object {:?} belongs to owner {} but owner {} tried to modify it",
                handle.0, owner.0, caller.0
            ),
        }
    }
}

impl std::error::Error for SceneError {}

#[derive(Debug)]
struct Entry {
    owner: OwnerId,
    object: RenderObject,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SceneStats {
    pub objects: usize,
    pub lines: usize,
    pub points: usize,
    pub meshes: usize,
    pub labels: usize,
    pub vertices: usize,
}

/// Scene-graph sink: the set of objects the drawing surface renders.
#[derive(Debug, Default)]
pub struct SceneGraph {
    objects: Arena<Entry>,
    owners: Vec<String>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_owner(&mut self, label: impl Into<String>) -> OwnerId {
        let id = OwnerId(self.owners.len() as u32);
        self.owners.push(label.into());
        id
    }

    pub fn owner_label(&self, owner: OwnerId) -> Option<&str> {
        self.owners.get(owner.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn add_object(&mut self, owner: OwnerId, object: RenderObject) -> ObjectHandle {
        ObjectHandle(self.objects.insert(Entry { owner, object }))
    }

    pub fn remove_object(
        &mut self,
        caller: OwnerId,
        handle: ObjectHandle,
    ) -> Result<RenderObject, SceneError> {
        let owner = self.owner_of(handle).ok_or(SceneError::UnknownObject(handle))?;
        if owner != caller {
            return Err(SceneError::NotOwner {
                handle,
                owner,
                caller,
            });
        }
        self.objects
            .remove(handle.0)
            .map(|e| e.object)
            .ok_or(SceneError::UnknownObject(handle))
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.objects.contains(handle.0)
    }

    pub fn owner_of(&self, handle: ObjectHandle) -> Option<OwnerId> {
        self.objects.get(handle.0).map(|e| e.owner)
    }

    pub fn object(&self, handle: ObjectHandle) -> Option<&RenderObject> {
        self.objects.get(handle.0).map(|e| &e.object)
    }

    /// Mutable access, granted only to the owning caller.
    pub fn object_mut(
        &mut self,
        caller: OwnerId,
        handle: ObjectHandle,
    ) -> Result<&mut RenderObject, SceneError> {
        let entry = self
            .objects
            .get_mut(handle.0)
            .ok_or(SceneError::UnknownObject(handle))?;
        if entry.owner != caller {
            return Err(SceneError::NotOwner {
                handle,
                owner: entry.owner,
                caller,
            });
        }
        Ok(&mut entry.object)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectHandle, OwnerId, &RenderObject)> + '_ {
        self.objects
            .iter()
            .map(|(h, e)| (ObjectHandle(h), e.owner, &e.object))
    }

    pub fn stats(&self) -> SceneStats {
        let mut stats = SceneStats::default();
        for (_, _, object) in self.iter() {
            stats.objects += 1;
            stats.vertices += object.vertex_count();
            match object.kind() {
                ObjectKind::Lines => stats.lines += 1,
                ObjectKind::Points => stats.points += 1,
                ObjectKind::Mesh => stats.meshes += 1,
                ObjectKind::Label => stats.labels += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::{SceneError, SceneGraph};
    use crate::object::{Material, RenderObject};
    use foundation::math::Vec3;

    fn points() -> RenderObject {
        RenderObject::Points {
            positions: vec![Vec3::new(1.0, 0.0, 0.0)],
            size_px: 4.0,
            material: Material::opaque([1.0, 0.0, 0.0, 1.0]),
        }
    }

    #[test]
    fn add_and_remove_by_owner() {
        let mut scene = SceneGraph::new();
        let owner = scene.register_owner("cities");
        let h = scene.add_object(owner, points());
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.owner_label(owner), Some("cities"));
        assert!(scene.remove_object(owner, h).is_ok());
        assert!(scene.is_empty());
        assert_eq!(
            scene.remove_object(owner, h),
            Err(SceneError::UnknownObject(h))
        );
    }

    #[test]
    fn other_owner_cannot_remove_or_mutate() {
        let mut scene = SceneGraph::new();
        let a = scene.register_owner("a");
        let b = scene.register_owner("b");
        let h = scene.add_object(a, points());

        assert!(matches!(
            scene.remove_object(b, h),
            Err(SceneError::NotOwner { .. })
        ));
        assert!(scene.object_mut(b, h).is_err());
        assert!(scene.contains(h));

        scene.object_mut(a, h).unwrap().material_mut().opacity = 0.5;
        assert_eq!(scene.object(h).unwrap().material().opacity, 0.5);
    }

    #[test]
    fn stats_count_by_kind() {
        let mut scene = SceneGraph::new();
        let owner = scene.register_owner("x");
        scene.add_object(owner, points());
        scene.add_object(
            owner,
            RenderObject::Lines {
                vertices: vec![Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0)],
                material: Material::opaque([1.0; 4]),
            },
        );
        let stats = scene.stats();
        assert_eq!(stats.objects, 2);
        assert_eq!(stats.points, 1);
        assert_eq!(stats.lines, 1);
        assert_eq!(stats.vertices, 3);
    }
}
