use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use nalgebra::Point3;
use tracing::{debug, info, instrument};

use super::Viewer;
use crate::core::color::Color;
use crate::core::io::cube::CubeFile;
use crate::core::models::ids::{LabelId, ShapeId};
use crate::core::models::style::MaterialStyle;
use crate::core::surface::mesh::Mesh;
use crate::engine::config::ConfigError;
use crate::engine::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelStyle {
    pub position: Point3<f64>,
    pub font_size: f32,
    pub font_color: Color,
    /// No background is drawn when unset.
    pub background_color: Option<Color>,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            font_size: 18.0,
            font_color: Color::from_rgb(255, 255, 255),
            background_color: Some(Color::from_rgb(0, 0, 0)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub style: LabelStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Sphere {
        center: Point3<f64>,
        radius: f64,
    },
    Arrow {
        start: Point3<f64>,
        end: Point3<f64>,
        radius: f64,
    },
    Cylinder {
        start: Point3<f64>,
        end: Point3<f64>,
        radius: f64,
    },
    /// Caller-supplied or computed triangle geometry.
    Custom {
        mesh: Arc<Mesh>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub kind: ShapeKind,
    pub material: MaterialStyle,
}

impl Viewer {
    pub fn add_label(&mut self, text: &str, style: LabelStyle) -> LabelId {
        let id = LabelId(self.next_label);
        self.next_label += 1;
        self.labels.insert(
            id,
            Label {
                text: text.to_string(),
                style,
            },
        );
        debug!(label = %id, "Label added");
        id
    }

    pub fn label(&self, id: LabelId) -> Result<&Label, EngineError> {
        self.labels.get(&id).ok_or(EngineError::LabelNotFound(id))
    }

    pub fn labels(&self) -> impl Iterator<Item = (LabelId, &Label)> {
        self.labels.iter().map(|(id, label)| (*id, label))
    }

    pub fn remove_label(&mut self, id: LabelId) -> Result<Label, EngineError> {
        self.labels.remove(&id).ok_or(EngineError::LabelNotFound(id))
    }

    pub fn remove_all_labels(&mut self) {
        self.labels.clear();
    }

    pub fn set_label_style(&mut self, id: LabelId, style: LabelStyle) -> Result<(), EngineError> {
        self.label_mut(id)?.style = style;
        Ok(())
    }

    pub fn set_label_text(&mut self, id: LabelId, text: &str) -> Result<(), EngineError> {
        self.label_mut(id)?.text = text.to_string();
        Ok(())
    }

    fn label_mut(&mut self, id: LabelId) -> Result<&mut Label, EngineError> {
        self.labels.get_mut(&id).ok_or(EngineError::LabelNotFound(id))
    }

    pub fn add_shape(&mut self, kind: ShapeKind, material: MaterialStyle) -> ShapeId {
        let id = ShapeId(self.next_shape);
        self.next_shape += 1;
        self.shapes.insert(id, Shape { kind, material });
        debug!(shape = %id, "Shape added");
        id
    }

    pub fn add_sphere(&mut self, center: Point3<f64>, radius: f64, material: MaterialStyle) -> ShapeId {
        self.add_shape(ShapeKind::Sphere { center, radius }, material)
    }

    pub fn add_arrow(
        &mut self,
        start: Point3<f64>,
        end: Point3<f64>,
        radius: f64,
        material: MaterialStyle,
    ) -> ShapeId {
        self.add_shape(ShapeKind::Arrow { start, end, radius }, material)
    }

    /// Adds arbitrary triangle geometry drawn with `material`.
    pub fn add_custom(&mut self, mesh: Mesh, material: MaterialStyle) -> ShapeId {
        self.add_shape(
            ShapeKind::Custom {
                mesh: Arc::new(mesh),
            },
            material,
        )
    }

    /// Parses Gaussian cube `data` and adds its `iso` isosurface as a custom shape.
    ///
    /// Nothing is added when the data is malformed or `iso` is not finite. A level the
    /// volume never reaches gives a shape with an empty mesh.
    #[instrument(skip_all, name = "add_volumetric_data", fields(bytes = data.len(), iso))]
    pub fn add_volumetric_data(
        &mut self,
        data: &str,
        iso: f64,
        material: MaterialStyle,
    ) -> Result<ShapeId, EngineError> {
        if !iso.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "iso",
                reason: format!("must be a finite level (got {iso})"),
            }
            .into());
        }
        let volume = CubeFile::read_volume_str(data)?;
        let mesh = volume
            .isosurface(iso, &AtomicBool::new(false))
            .map_err(|_| EngineError::Internal("uncancellable isosurface was cancelled".into()))?;
        info!(
            dims = ?volume.dims,
            triangles = mesh.triangle_count(),
            "Volumetric isosurface added"
        );
        Ok(self.add_custom(mesh, material))
    }

    pub fn shape(&self, id: ShapeId) -> Result<&Shape, EngineError> {
        self.shapes.get(&id).ok_or(EngineError::ShapeNotFound(id))
    }

    pub fn shapes(&self) -> impl Iterator<Item = (ShapeId, &Shape)> {
        self.shapes.iter().map(|(id, shape)| (*id, shape))
    }

    pub fn remove_shape(&mut self, id: ShapeId) -> Result<Shape, EngineError> {
        self.shapes.remove(&id).ok_or(EngineError::ShapeNotFound(id))
    }

    pub fn remove_all_shapes(&mut self) {
        self.shapes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod labels {
        use super::*;

        #[test]
        fn text_and_style_can_be_changed() {
            let mut viewer = Viewer::default();
            let id = viewer.add_label("CA", LabelStyle::default());
            viewer.set_label_text(id, "Cα").unwrap();
            let style = LabelStyle {
                font_size: 12.0,
                background_color: None,
                ..LabelStyle::default()
            };
            viewer.set_label_style(id, style.clone()).unwrap();
            let label = viewer.label(id).unwrap();
            assert_eq!(label.text, "Cα");
            assert_eq!(label.style, style);
        }

        #[test]
        fn removed_labels_are_not_found() {
            let mut viewer = Viewer::default();
            let id = viewer.add_label("x", LabelStyle::default());
            assert_eq!(viewer.remove_label(id).unwrap().text, "x");
            assert!(matches!(viewer.remove_label(id), Err(EngineError::LabelNotFound(_))));
            assert!(viewer.set_label_text(id, "y").unwrap_err().is_not_found());
            assert!(viewer.set_label_style(id, LabelStyle::default()).is_err());
        }

        #[test]
        fn ids_are_not_reused() {
            let mut viewer = Viewer::default();
            let first = viewer.add_label("a", LabelStyle::default());
            viewer.remove_all_labels();
            let second = viewer.add_label("b", LabelStyle::default());
            assert_ne!(first, second);
            assert_eq!(viewer.labels().count(), 1);
        }
    }

    mod shapes {
        use super::*;

        #[test]
        fn helpers_record_their_geometry() {
            let mut viewer = Viewer::default();
            let sphere = viewer.add_sphere(Point3::new(1.0, 2.0, 3.0), 0.5, MaterialStyle::default());
            let arrow = viewer.add_arrow(
                Point3::origin(),
                Point3::new(0.0, 0.0, 5.0),
                0.2,
                MaterialStyle::default(),
            );
            assert!(matches!(
                viewer.shape(sphere).unwrap().kind,
                ShapeKind::Sphere { radius, .. } if radius == 0.5
            ));
            assert!(matches!(viewer.shape(arrow).unwrap().kind, ShapeKind::Arrow { .. }));
            assert_eq!(viewer.shapes().count(), 2);
        }

        #[test]
        fn removed_shapes_are_not_found() {
            let mut viewer = Viewer::default();
            let id = viewer.add_shape(
                ShapeKind::Cylinder {
                    start: Point3::origin(),
                    end: Point3::new(1.0, 0.0, 0.0),
                    radius: 0.1,
                },
                MaterialStyle::default(),
            );
            viewer.remove_shape(id).unwrap();
            assert!(matches!(viewer.shape(id), Err(EngineError::ShapeNotFound(_))));
            assert!(viewer.remove_shape(id).unwrap_err().is_not_found());
        }

        #[test]
        fn custom_meshes_are_shared_not_copied() {
            let mut viewer = Viewer::default();
            let triangle = Mesh::from_parts(
                &[
                    Point3::origin(),
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                ],
                &[[0, 1, 2]],
                Vec::new(),
            );
            let material = MaterialStyle::default().with_opacity(0.4);
            let id = viewer.add_custom(triangle.clone(), material.clone());
            let shape = viewer.shape(id).unwrap();
            let ShapeKind::Custom { mesh } = &shape.kind else {
                panic!("expected a custom shape");
            };
            assert_eq!(**mesh, triangle);
            assert_eq!(shape.material, material);
            let copy = shape.clone();
            let ShapeKind::Custom { mesh: shared } = &copy.kind else {
                panic!("expected a custom shape");
            };
            assert!(Arc::ptr_eq(mesh, shared));
        }
    }

    mod volumetric {
        use super::*;
        use crate::core::surface::volume::VolumeData;

        /// A 7-cubed cube file in Angstroms, peaking at 1.0 in the centre sample.
        fn peaked_cube() -> String {
            let mut text = String::from("peak\nvalues in angstrom\n    0 -1.5 -1.5 -1.5\n");
            for axis in ["   -7 0.5 0.0 0.0", "   -7 0.0 0.5 0.0", "   -7 0.0 0.0 0.5"] {
                text.push_str(axis);
                text.push('\n');
            }
            for x in 0..7i32 {
                for y in 0..7i32 {
                    for z in 0..7i32 {
                        let d2 = [x, y, z].iter().map(|&i| f64::from(i - 3).powi(2)).sum::<f64>();
                        text.push_str(&format!("{:.6}\n", (-d2 * 0.25).exp()));
                    }
                }
            }
            text
        }

        #[test]
        fn isosurface_becomes_a_custom_shape() {
            let mut viewer = Viewer::default();
            let red = MaterialStyle::default().with_color(Color::from_rgb(255, 0, 0));
            let id = viewer.add_volumetric_data(&peaked_cube(), 0.5, red.clone()).unwrap();
            let shape = viewer.shape(id).unwrap();
            let ShapeKind::Custom { mesh } = &shape.kind else {
                panic!("expected a custom shape");
            };
            assert!(mesh.triangle_count() > 0);
            assert_eq!(mesh.normals.len(), mesh.vertex_count());
            assert_eq!(shape.material, red);
            // Every vertex sits inside the sampled box.
            for p in &mesh.positions {
                assert!(p.iter().all(|c| c.abs() <= 1.5 + 1e-4));
            }
        }

        #[test]
        fn matches_the_isosurface_of_the_parsed_volume() {
            let data = peaked_cube();
            let mut viewer = Viewer::default();
            let id = viewer.add_volumetric_data(&data, 0.3, MaterialStyle::default()).unwrap();
            let volume: VolumeData = CubeFile::read_volume_str(&data).unwrap();
            let expected = volume.isosurface(0.3, &AtomicBool::new(false)).unwrap();
            let ShapeKind::Custom { mesh } = &viewer.shape(id).unwrap().kind else {
                panic!("expected a custom shape");
            };
            assert_eq!(**mesh, expected);
        }

        #[test]
        fn malformed_data_adds_nothing() {
            let mut viewer = Viewer::default();
            let error = viewer
                .add_volumetric_data("title\ncomment\n", 0.5, MaterialStyle::default())
                .unwrap_err();
            assert!(matches!(error, EngineError::InvalidFormat(_)));
            let error = viewer
                .add_volumetric_data(&peaked_cube(), f64::NAN, MaterialStyle::default())
                .unwrap_err();
            assert!(matches!(error, EngineError::Config(_)));
            assert_eq!(viewer.shapes().count(), 0);
        }

        #[test]
        fn unreached_level_gives_an_empty_shape() {
            let mut viewer = Viewer::default();
            let id = viewer
                .add_volumetric_data(&peaked_cube(), 5.0, MaterialStyle::default())
                .unwrap();
            let ShapeKind::Custom { mesh } = &viewer.shape(id).unwrap().kind else {
                panic!("expected a custom shape");
            };
            assert!(mesh.is_empty());
        }
    }
}
