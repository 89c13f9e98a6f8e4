use crate::core::surface::mesh::Mesh;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Wavefront OBJ export of surface meshes.
pub struct ObjFile;

impl ObjFile {
    /// Writes `mesh` as a single named object. Normals are emitted when the
    /// mesh has one per vertex.
    pub fn write_mesh(name: &str, mesh: &Mesh, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "# molview surface")?;
        writeln!(
            writer,
            "# {} vertices, {} triangles",
            mesh.vertex_count(),
            mesh.triangle_count()
        )?;
        writeln!(writer, "o {}", name)?;

        for [x, y, z] in &mesh.positions {
            writeln!(writer, "v {:.4} {:.4} {:.4}", x, y, z)?;
        }

        let with_normals = !mesh.normals.is_empty() && mesh.normals.len() == mesh.positions.len();
        if with_normals {
            for [x, y, z] in &mesh.normals {
                writeln!(writer, "vn {:.4} {:.4} {:.4}", x, y, z)?;
            }
        }

        for [a, b, c] in mesh.triangles() {
            // OBJ indices are 1-based.
            let (a, b, c) = (a + 1, b + 1, c + 1);
            if with_normals {
                writeln!(writer, "f {a}//{a} {b}//{b} {c}//{c}")?;
            } else {
                writeln!(writer, "f {a} {b} {c}")?;
            }
        }
        Ok(())
    }

    pub fn write_mesh_to_path<P: AsRef<Path>>(name: &str, mesh: &Mesh, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_mesh(name, mesh, &mut writer)?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn triangle() -> Mesh {
        let vertices = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        Mesh::from_parts(&vertices, &[[0, 1, 2]], vec![0, 0, 0])
    }

    #[test]
    fn writes_faces_with_one_based_indices() {
        let mut out = Vec::new();
        ObjFile::write_mesh("tri", &triangle(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.contains(&"o tri"));
        assert!(lines.contains(&"v 1.0000 0.0000 0.0000"));
        assert!(lines.contains(&"f 1 2 3"));
        assert!(!text.contains("vn "));
    }

    #[test]
    fn writes_normals_when_present() {
        let mut mesh = triangle();
        mesh.compute_normals(true);
        let mut out = Vec::new();
        ObjFile::write_mesh("tri", &mesh, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("vn 0.0000 0.0000 1.0000").count(), 3);
        assert!(text.contains("f 1//1 2//2 3//3"));
    }

    #[test]
    fn writes_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface.obj");
        ObjFile::write_mesh_to_path("tri", &triangle(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 3);
    }
}
