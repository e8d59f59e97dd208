use foundation::math::Vec3;

pub type Rgba = [f32; 4];

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Material {
    pub color: Rgba,
    pub opacity: f32,
}

impl Material {
    pub const fn new(color: Rgba, opacity: f32) -> Self {
        Self { color, opacity }
    }

    pub const fn opaque(color: Rgba) -> Self {
        Self::new(color, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelStyle {
    pub font_size_px: f32,
    pub color: Rgba,
    pub halo_color: Rgba,
    pub halo_width_px: f32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font_size_px: 14.0,
            color: [1.0, 1.0, 1.0, 1.0],
            halo_color: [0.0, 0.0, 0.0, 0.85],
            halo_width_px: 2.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Lines,
    Points,
    Mesh,
    Label,
}

/// Renderable payload handed to the drawing surface.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderObject {
    /// Line list: two vertices per segment.
    Lines {
        vertices: Vec<Vec3>,
        material: Material,
    },
    Points {
        positions: Vec<Vec3>,
        size_px: f32,
        material: Material,
    },
    /// Triangle list: three vertices per triangle.
    Mesh {
        triangles: Vec<Vec3>,
        material: Material,
    },
    /// Floating text anchored at a world position.
    Label {
        text: String,
        position: Vec3,
        style: LabelStyle,
        material: Material,
    },
}

impl RenderObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            RenderObject::Lines { .. } => ObjectKind::Lines,
            RenderObject::Points { .. } => ObjectKind::Points,
            RenderObject::Mesh { .. } => ObjectKind::Mesh,
            RenderObject::Label { .. } => ObjectKind::Label,
        }
    }

    pub fn material(&self) -> &Material {
        match self {
            RenderObject::Lines { material, .. }
            | RenderObject::Points { material, .. }
            | RenderObject::Mesh { material, .. }
            | RenderObject::Label { material, .. } => material,
        }
    }

    pub fn material_mut(&mut self) -> &mut Material {
        match self {
            RenderObject::Lines { material, .. }
            | RenderObject::Points { material, .. }
            | RenderObject::Mesh { material, .. }
            | RenderObject::Label { material, .. } => material,
        }
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            RenderObject::Lines { vertices, .. } => vertices.len(),
            RenderObject::Points { positions, .. } => positions.len(),
            RenderObject::Mesh { triangles, .. } => triangles.len(),
            RenderObject::Label { .. } => 1,
        }
    }
}
