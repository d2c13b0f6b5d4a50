// viewer.rs - What the renderer consumes
//
// Two payload kinds: a depth surface the viewer turns into a displaced
// plane, or an opaque binary model passed through untouched. The wasm
// bridge hands the browser flat position/normal/index buffers.

use wasm_bindgen::prelude::*;

use crate::depth::DepthGrid;
use crate::mesh::MeshGeometry;

/// An externally produced binary 3D asset (e.g. binary glTF). The core
/// never parses it, only forwards bytes plus the declared content type.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAsset {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl GeneratedAsset {
    pub fn glb(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: "model/gltf-binary".into(),
        }
    }
}

/// Payload contract to the viewer.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneAsset {
    /// Depth data that becomes a displaced plane.
    DepthSurface {
        grid: DepthGrid,
        texture_url: Option<String>,
    },
    /// A ready-made model, forwarded as-is.
    Model {
        asset: GeneratedAsset,
        texture_url: Option<String>,
    },
}

impl SceneAsset {
    /// Build renderable geometry. `None` for opaque model passthrough.
    pub fn geometry(&self, scale: f32) -> Option<MeshGeometry> {
        match self {
            SceneAsset::DepthSurface { grid, .. } => Some(MeshGeometry::displaced(
                grid.values(),
                grid.width(),
                grid.height(),
                scale,
            )),
            SceneAsset::Model { .. } => None,
        }
    }

    pub fn texture_url(&self) -> Option<&str> {
        match self {
            SceneAsset::DepthSurface { texture_url, .. } => texture_url.as_deref(),
            SceneAsset::Model { texture_url, .. } => texture_url.as_deref(),
        }
    }
}

/// Browser-side mesh handle. The JS viewer reads the buffers straight
/// out of wasm memory by pointer and length, or copies them out as
/// typed arrays.
#[wasm_bindgen]
pub struct SurfaceMesh {
    mesh: MeshGeometry,
}

#[wasm_bindgen]
impl SurfaceMesh {
    /// Displaced plane from a flat depth array. A wrong-length array
    /// yields the flat plane, mirroring the viewer contract.
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32, depth: &[f32], scale: f32) -> SurfaceMesh {
        SurfaceMesh {
            mesh: MeshGeometry::displaced(depth, width as usize, height as usize, scale),
        }
    }

    /// The deterministic fallback dome as a mesh.
    pub fn fallback(width: u32, height: u32, scale: f32) -> SurfaceMesh {
        let grid = DepthGrid::fallback(width as usize, height as usize);
        SurfaceMesh {
            mesh: MeshGeometry::displaced(grid.values(), grid.width(), grid.height(), scale),
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.mesh.vertex_count() as u32
    }

    pub fn triangle_count(&self) -> u32 {
        self.mesh.triangle_count() as u32
    }

    pub fn positions_ptr(&self) -> *const f32 {
        self.mesh.positions().as_ptr()
    }

    pub fn positions_len(&self) -> usize {
        self.mesh.positions().len()
    }

    pub fn normals_ptr(&self) -> *const f32 {
        self.mesh.normals().as_ptr()
    }

    pub fn normals_len(&self) -> usize {
        self.mesh.normals().len()
    }

    pub fn indices_ptr(&self) -> *const u32 {
        self.mesh.indices().as_ptr()
    }

    pub fn indices_len(&self) -> usize {
        self.mesh.indices().len()
    }

    #[cfg(target_arch = "wasm32")]
    pub fn positions(&self) -> js_sys::Float32Array {
        js_sys::Float32Array::from(self.mesh.positions())
    }

    #[cfg(target_arch = "wasm32")]
    pub fn normals(&self) -> js_sys::Float32Array {
        js_sys::Float32Array::from(self.mesh.normals())
    }

    #[cfg(target_arch = "wasm32")]
    pub fn indices(&self) -> js_sys::Uint32Array {
        js_sys::Uint32Array::from(self.mesh.indices())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_surface_builds_geometry() {
        let grid = DepthGrid::fallback(32, 32);
        let asset = SceneAsset::DepthSurface {
            grid,
            texture_url: Some("blob:texture".into()),
        };
        let mesh = asset.geometry(2.0).unwrap();
        assert_eq!(mesh.vertex_count(), 1024);
        assert_eq!(mesh.triangle_count(), 2 * 31 * 31);
        assert_eq!(asset.texture_url(), Some("blob:texture"));
    }

    #[test]
    fn model_is_passthrough() {
        let asset = SceneAsset::Model {
            asset: GeneratedAsset::glb(vec![0x67, 0x6c, 0x54, 0x46]),
            texture_url: None,
        };
        assert!(asset.geometry(2.0).is_none());
        let SceneAsset::Model { asset, .. } = &asset else {
            unreachable!();
        };
        assert_eq!(asset.content_type, "model/gltf-binary");
        assert_eq!(asset.bytes.len(), 4);
    }

    #[test]
    fn surface_mesh_buffer_protocol() {
        let depth = vec![0.25f32; 16];
        let surface = SurfaceMesh::new(4, 4, &depth, 2.0);
        assert_eq!(surface.vertex_count(), 16);
        assert_eq!(surface.triangle_count(), 18);
        assert_eq!(surface.positions_len(), 48);
        assert_eq!(surface.normals_len(), 48);
        assert_eq!(surface.indices_len(), 54);
        assert!(!surface.positions_ptr().is_null());
    }

    #[test]
    fn fallback_mesh_matches_fallback_grid() {
        let surface = SurfaceMesh::fallback(32, 32, 2.0);
        let grid = DepthGrid::fallback(32, 32);
        let direct = MeshGeometry::displaced(grid.values(), 32, 32, 2.0);
        let ptr_len = surface.positions_len();
        assert_eq!(ptr_len, direct.positions().len());
        assert_eq!(surface.triangle_count() as usize, direct.triangle_count());
    }
}
