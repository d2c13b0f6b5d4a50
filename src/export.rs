// export.rs - Write geometry to OBJ or binary STL
//
// Binary STL layout: 80-byte header, u32 triangle count, then per
// triangle a face normal, three vertices and a zero attribute word
// (50 bytes each), all little-endian.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::{ReliefError, Result};
use crate::mesh::MeshGeometry;

const STL_HEADER_SIZE: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Obj,
    Stl,
}

impl MeshFormat {
    /// Detect format from file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "obj" => Some(Self::Obj),
            "stl" => Some(Self::Stl),
            _ => None,
        }
    }
}

/// Wavefront OBJ: positions, per-vertex normals, 1-based `f a//a` faces.
pub fn save_obj<W: Write>(mesh: &MeshGeometry, out: &mut W) -> io::Result<()> {
    writeln!(out, "o relief")?;
    for p in mesh.positions().chunks_exact(3) {
        writeln!(out, "v {} {} {}", p[0], p[1], p[2])?;
    }
    for n in mesh.normals().chunks_exact(3) {
        writeln!(out, "vn {} {} {}", n[0], n[1], n[2])?;
    }
    for t in mesh.indices().chunks_exact(3) {
        writeln!(
            out,
            "f {0}//{0} {1}//{1} {2}//{2}",
            t[0] + 1,
            t[1] + 1,
            t[2] + 1
        )?;
    }
    Ok(())
}

/// Binary STL with per-face normals recomputed from the triangle corners.
pub fn save_stl<W: Write>(mesh: &MeshGeometry, out: &mut W) -> io::Result<()> {
    out.write_all(&[0u8; STL_HEADER_SIZE])?;
    out.write_all(&(mesh.triangle_count() as u32).to_le_bytes())?;

    for t in 0..mesh.triangle_count() {
        let [a, b, c] = mesh.triangle(t);
        for v in face_normal(a, b, c) {
            out.write_all(&v.to_le_bytes())?;
        }
        for vert in [a, b, c] {
            for v in vert {
                out.write_all(&v.to_le_bytes())?;
            }
        }
        out.write_all(&0u16.to_le_bytes())?;
    }
    Ok(())
}

/// Write a mesh to disk, format chosen by the output extension.
pub fn save_mesh<P: AsRef<Path>>(mesh: &MeshGeometry, path: P) -> Result<()> {
    let path = path.as_ref();
    let format = MeshFormat::from_path(path).ok_or_else(|| {
        ReliefError::input(format!(
            "unknown mesh format for {} (expected .obj or .stl)",
            path.display()
        ))
    })?;
    let mut out = BufWriter::new(File::create(path)?);
    match format {
        MeshFormat::Obj => save_obj(mesh, &mut out)?,
        MeshFormat::Stl => save_stl(mesh, &mut out)?,
    }
    Ok(out.flush()?)
}

fn face_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let n = [
        ab[1] * ac[2] - ab[2] * ac[1],
        ab[2] * ac[0] - ab[0] * ac[2],
        ab[0] * ac[1] - ab[1] * ac[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > 1e-8 {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 1.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection() {
        assert_eq!(MeshFormat::from_path("a/relief.obj"), Some(MeshFormat::Obj));
        assert_eq!(MeshFormat::from_path("relief.STL"), Some(MeshFormat::Stl));
        assert_eq!(MeshFormat::from_path("relief.glb"), None);
        assert_eq!(MeshFormat::from_path("relief"), None);
    }

    #[test]
    fn obj_line_counts() {
        let mesh = MeshGeometry::plane(4, 4);
        let mut buf = Vec::new();
        save_obj(&mesh, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 16);
        assert_eq!(text.lines().filter(|l| l.starts_with("vn ")).count(), 16);
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 18);
        assert!(text.contains("f 1//1 5//5 2//2"));
    }

    #[test]
    fn stl_byte_layout() {
        let mesh = MeshGeometry::plane(3, 3);
        let mut buf = Vec::new();
        save_stl(&mesh, &mut buf).unwrap();
        let tris = mesh.triangle_count();
        assert_eq!(buf.len(), STL_HEADER_SIZE + 4 + tris * 50);
        let count = u32::from_le_bytes(buf[80..84].try_into().unwrap());
        assert_eq!(count as usize, tris);
    }

    #[test]
    fn flat_plane_stl_normals_point_up() {
        let mesh = MeshGeometry::plane(2, 2);
        let mut buf = Vec::new();
        save_stl(&mesh, &mut buf).unwrap();
        let nz = f32::from_le_bytes(buf[84 + 8..84 + 12].try_into().unwrap());
        assert!((nz - 1.0).abs() < 1e-6);
    }

    #[test]
    fn save_mesh_rejects_unknown_extension() {
        let mesh = MeshGeometry::plane(2, 2);
        let err = save_mesh(&mesh, "/tmp/relief-test.xyz").unwrap_err();
        assert!(matches!(err, ReliefError::Input(_)));
    }
}
