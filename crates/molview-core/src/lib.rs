//! # MolView Core Library
//!
//! The data and geometry engine behind a molecular structure viewer: it loads
//! atomic coordinates, keeps an atom and bond store consistent under edits,
//! answers declarative selections, resolves per-atom styles and turns sets of
//! atom spheres into triangle meshes for the four classic molecular surfaces.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data and algorithms: the per-model
//!   atom store (`Model`), selections, styles and colour schemes, structure
//!   readers and writers, and the surface pipeline (grid, distance field,
//!   marching cubes, mesh).
//!
//! - **[`engine`]: The Machinery.** Stateful pieces shared by the viewer:
//!   validated configuration, the error taxonomy, surface jobs with status and
//!   cancellation, the renderable-object cache and progress reporting.
//!
//! - **[`viewer`]: The Public API.** The [`viewer::Viewer`] type ties models,
//!   surfaces and annotations together and keeps them consistent as atoms are
//!   added, removed and restyled.
//!
//! ## Example
//!
//! ```
//! use molview::core::io::format::Format;
//! use molview::core::selection::Selection;
//! use molview::core::surface::SurfaceType;
//! use molview::viewer::{SurfaceRequest, Viewer};
//!
//! let mut viewer = Viewer::default();
//! viewer.add_model("2\nCO\nC 0 0 0\nO 1.5 0 0\n", Format::Xyz)?;
//! let surface = viewer.add_surface_with(
//!     SurfaceRequest::new(SurfaceType::Vdw).display(Selection::element("O")),
//! )?;
//! let mesh = viewer.surface_mesh(surface)?.expect("sync surfaces are ready");
//! assert!(mesh.triangle_count() > 0);
//! # Ok::<(), molview::engine::error::EngineError>(())
//! ```

pub mod core;
pub mod engine;
pub mod viewer;
