//! # Viewer
//!
//! The public orchestration layer. A [`Viewer`] owns models, surfaces, labels
//! and shapes, and keeps them consistent: structural edits invalidate the
//! surfaces built from the edited model, removing a model retires them, and
//! the render cache is rebuilt only when a model's generation moves.
//!
//! Operations taking a [`Selection`] run across every model in insertion order.
//! Lookups of unknown handles fail with a not-found [`EngineError`] and never
//! change state.

mod annotations;
mod surfaces;

pub use annotations::{Label, LabelStyle, Shape, ShapeKind};
pub use surfaces::{RenderableSurface, SurfaceRequest};

use std::collections::BTreeMap;
use std::sync::Arc;

use nalgebra::Point3;
use tracing::{debug, info, instrument, warn};

use self::surfaces::SurfaceRecord;
use crate::core::color::elements::ElementColorMap;
use crate::core::color::scheme::ColorScheme;
use crate::core::io::format::Format;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::StructureWriter;
use crate::core::models::atom::Atom;
use crate::core::models::ids::{AtomId, LabelId, ModelId, ShapeId, SurfaceId};
use crate::core::models::model::{BatchBond, Model};
use crate::core::models::style::AtomStyle;
use crate::core::selection::Selection;
use crate::engine::cache::{RenderCache, RenderableObject};
use crate::engine::config::ViewerConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};

pub struct Viewer {
    config: ViewerConfig,
    /// Models in insertion order.
    models: Vec<Model>,
    next_model: u32,
    surfaces: BTreeMap<SurfaceId, SurfaceRecord>,
    next_surface: u32,
    labels: BTreeMap<LabelId, Label>,
    next_label: u32,
    shapes: BTreeMap<ShapeId, Shape>,
    next_shape: u32,
    cache: RenderCache,
    reporter: Arc<ProgressReporter<'static>>,
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("models", &self.model_ids())
            .field("surfaces", &self.surfaces.keys().collect::<Vec<_>>())
            .field("labels", &self.labels.len())
            .field("shapes", &self.shapes.len())
            .finish()
    }
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self::with_reporter(config, ProgressReporter::new())
    }

    /// A viewer forwarding load and surface progress to `reporter`.
    pub fn with_reporter(config: ViewerConfig, reporter: ProgressReporter<'static>) -> Self {
        Self {
            config,
            models: Vec::new(),
            next_model: 0,
            surfaces: BTreeMap::new(),
            next_surface: 0,
            labels: BTreeMap::new(),
            next_label: 0,
            shapes: BTreeMap::new(),
            next_shape: 0,
            cache: RenderCache::new(),
            reporter: Arc::new(reporter),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    // --- Models ---

    /// Parses `data` and adds the result as a new model.
    #[instrument(skip_all, name = "add_model", fields(format = %format, bytes = data.len()))]
    pub fn add_model(&mut self, data: &str, format: Format) -> Result<ModelId, EngineError> {
        self.reporter.report(Progress::PhaseStart {
            name: "Parsing structure",
        });
        let parsed = format.parse(data);
        self.reporter.report(Progress::PhaseFinish);
        let parsed = parsed?;

        self.reporter.report(Progress::PhaseStart {
            name: "Building model",
        });
        let id = ModelId(self.next_model);
        let mut model = Model::with_element_colors(id, self.config.element_colors.clone());
        let added = model.add_atoms_with(parsed.atoms, &parsed.bonds, parsed.infer_bonds);
        self.reporter.report(Progress::PhaseFinish);
        added?;

        if !self.config.default_style.is_empty() {
            model.set_style(&Selection::all(), &self.config.default_style);
        }
        info!(model = %id, atoms = model.len(), bonds = model.bonds().len(), "Model added");
        self.next_model += 1;
        self.models.push(model);
        self.invalidate_surfaces_joined_by(id);
        Ok(id)
    }

    pub fn add_empty_model(&mut self) -> ModelId {
        let id = ModelId(self.next_model);
        self.next_model += 1;
        self.models
            .push(Model::with_element_colors(id, self.config.element_colors.clone()));
        debug!(model = %id, "Empty model added");
        id
    }

    /// The model `id`, or the most recently added one when `id` is `None`.
    pub fn model(&self, id: Option<ModelId>) -> Result<&Model, EngineError> {
        let index = self.model_index(id)?;
        Ok(&self.models[index])
    }

    pub fn model_mut(&mut self, id: Option<ModelId>) -> Result<&mut Model, EngineError> {
        let index = self.model_index(id)?;
        Ok(&mut self.models[index])
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn model_ids(&self) -> Vec<ModelId> {
        self.models.iter().map(Model::id).collect()
    }

    /// Removes a model, retiring every surface drawn from it and its cached geometry.
    pub fn remove_model(&mut self, id: ModelId) -> Result<(), EngineError> {
        let index = self.model_index(Some(id))?;
        self.models.remove(index);
        self.removegl(id);
        let retired = self.retire_surfaces_of(id);
        info!(model = %id, retired_surfaces = retired, "Model removed");
        Ok(())
    }

    pub fn remove_all_models(&mut self) {
        for id in self.model_ids() {
            // Every id came from the live list.
            let _ = self.remove_model(id);
        }
    }

    fn model_index(&self, id: Option<ModelId>) -> Result<usize, EngineError> {
        match id {
            None if self.models.is_empty() => Err(EngineError::NoModels),
            None => Ok(self.models.len() - 1),
            Some(id) => self
                .models
                .iter()
                .position(|m| m.id() == id)
                .ok_or(EngineError::ModelNotFound(id)),
        }
    }

    /// Indices of models holding at least one atom matching `selection`.
    fn touched_models(&self, selection: &Selection) -> Vec<usize> {
        self.models
            .iter()
            .enumerate()
            .filter(|(_, m)| selection.may_touch_model(m.id()))
            .filter(|(_, m)| m.atoms().any(|(_, atom)| selection.matches(m.id(), atom)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Runs `action` against the viewer, restoring the listed models if it fails.
    fn transaction<F, R>(&mut self, models: &[usize], action: F) -> Result<R, EngineError>
    where
        F: FnOnce(&mut Self) -> Result<R, EngineError>,
    {
        let snapshots: Vec<Model> = models.iter().map(|&i| self.models[i].clone()).collect();
        let model_count = self.models.len();
        let result = action(self);
        if result.is_err() {
            warn!(models = snapshots.len(), "Operation failed, restoring models");
            self.models.truncate(model_count);
            for (&i, snapshot) in models.iter().zip(snapshots) {
                self.models[i] = snapshot;
            }
        }
        result
    }

    // --- Styles ---

    /// Replaces the style of every matching atom. Returns the number of atoms styled.
    pub fn set_style(&mut self, selection: &Selection, style: &AtomStyle) -> usize {
        self.restyle(selection, |model| model.set_style(selection, style))
    }

    /// Merges `style` into every matching atom by representation kind.
    pub fn add_style(&mut self, selection: &Selection, style: &AtomStyle) -> usize {
        self.restyle(selection, |model| model.add_style(selection, style))
    }

    pub fn set_color_by_element(&mut self, selection: &Selection, colors: &ElementColorMap) -> usize {
        self.restyle(selection, |model| model.set_color_by_element(selection, colors))
    }

    /// Colours matching atoms by a numeric property. Without a configured range,
    /// each model scales over its own matched values.
    pub fn set_color_by_property(
        &mut self,
        selection: &Selection,
        property: &str,
        scheme: &dyn ColorScheme,
    ) -> usize {
        self.restyle(selection, |model| {
            model.set_color_by_property(selection, property, scheme)
        })
    }

    fn restyle(&mut self, selection: &Selection, mut apply: impl FnMut(&mut Model) -> usize) -> usize {
        let styled: usize = self
            .models
            .iter_mut()
            .filter(|m| selection.may_touch_model(m.id()))
            .map(&mut apply)
            .sum();
        debug!(styled, "Restyled atoms");
        styled
    }

    // --- Atoms ---

    /// Appends atoms to a model. Bonds are inferred when `bonds` is empty.
    pub fn add_atoms(
        &mut self,
        model: ModelId,
        atoms: Vec<Atom>,
        bonds: &[BatchBond],
    ) -> Result<Vec<AtomId>, EngineError> {
        let index = self.model_index(Some(model))?;
        let ids = self.models[index].add_atoms(atoms, bonds)?;
        if !ids.is_empty() {
            self.invalidate_surfaces_of(model);
        }
        Ok(ids)
    }

    /// Removes every matching atom from every model, all or nothing.
    pub fn remove_atoms(&mut self, selection: &Selection) -> Result<Vec<(ModelId, Atom)>, EngineError> {
        let touched = self.touched_models(selection);
        for &i in &touched {
            self.models[i].validate()?;
        }
        let removed = self.transaction(&touched, |viewer| {
            let mut removed = Vec::new();
            for &i in &touched {
                let model = &mut viewer.models[i];
                let id = model.id();
                removed.extend(model.remove_atoms(selection)?.into_iter().map(|a| (id, a)));
            }
            Ok(removed)
        })?;
        for &i in &touched {
            let id = self.models[i].id();
            self.invalidate_surfaces_of(id);
        }
        debug!(removed = removed.len(), models = touched.len(), "Atoms removed");
        Ok(removed)
    }

    /// Matching atoms as (model, atom) pairs, in model order then storage order.
    pub fn selected_atoms(&self, selection: &Selection) -> Vec<(ModelId, AtomId)> {
        self.models
            .iter()
            .filter(|m| selection.may_touch_model(m.id()))
            .flat_map(|m| m.selected_atoms(selection).into_iter().map(move |id| (m.id(), id)))
            .collect()
    }

    pub fn atom(&self, model: ModelId, atom: AtomId) -> Option<&Atom> {
        self.model(Some(model)).ok()?.atom(atom)
    }

    /// Moves every atom of a model, in storage order.
    pub fn set_positions(
        &mut self,
        model: ModelId,
        positions: &[Point3<f64>],
    ) -> Result<(), EngineError> {
        let index = self.model_index(Some(model))?;
        self.models[index].set_positions(positions)?;
        self.invalidate_surfaces_of(model);
        Ok(())
    }

    /// Builds a new model from the matching atoms and the bonds among them.
    ///
    /// With `extract`, the atoms are also removed from their source models. Either
    /// the new model exists and the sources lost the atoms, or nothing changed.
    #[instrument(skip_all, name = "create_model_from", fields(extract = extract))]
    pub fn create_model_from(
        &mut self,
        selection: &Selection,
        extract: bool,
    ) -> Result<ModelId, EngineError> {
        let touched = self.touched_models(selection);
        for &i in &touched {
            self.models[i].validate()?;
        }

        let mut atoms = Vec::new();
        let mut bonds = Vec::new();
        for &i in &touched {
            let model = &self.models[i];
            let (batch, batch_bonds) = model.extract_batch(&model.selected_atoms(selection));
            let offset = atoms.len();
            bonds.extend(
                batch_bonds
                    .into_iter()
                    .map(|b| BatchBond::new(b.a + offset, b.b + offset, b.order)),
            );
            atoms.extend(batch);
        }

        let id = ModelId(self.next_model);
        let count = atoms.len();
        self.transaction(&touched, |viewer| {
            let mut model = Model::with_element_colors(id, viewer.config.element_colors.clone());
            model.add_atoms_with(atoms, &bonds, false)?;
            if extract {
                for &i in &touched {
                    viewer.models[i].remove_atoms(selection)?;
                }
            }
            viewer.models.push(model);
            Ok(())
        })?;
        self.next_model += 1;

        self.invalidate_surfaces_joined_by(id);
        if extract {
            for &i in &touched {
                let source = self.models[i].id();
                self.invalidate_surfaces_of(source);
            }
        }
        info!(model = %id, atoms = count, sources = touched.len(), "Model created from selection");
        Ok(id)
    }

    /// Matching atoms as PDB text, with `CONECT` records for bonds among them.
    pub fn pdb_data(&self, selection: &Selection) -> String {
        let mut atoms: Vec<&Atom> = Vec::new();
        let mut bonds = Vec::new();
        for model in self.models.iter().filter(|m| selection.may_touch_model(m.id())) {
            let ids = model.selected_atoms(selection);
            let (_, batch_bonds) = model.extract_batch(&ids);
            let offset = atoms.len();
            bonds.extend(
                batch_bonds
                    .into_iter()
                    .map(|b| BatchBond::new(b.a + offset, b.b + offset, b.order)),
            );
            atoms.extend(ids.iter().filter_map(|&id| model.atom(id)));
        }
        PdbFile::write_string(&atoms, &bonds)
    }

    // --- Render cache ---

    /// Renderable geometry for a model, rebuilt only when its generation moved.
    pub fn globj(&mut self, model: ModelId) -> Result<Arc<RenderableObject>, EngineError> {
        let index = self.model_index(Some(model))?;
        Ok(self.cache.get_or_build(&mut self.models[index]))
    }

    /// Drops a model's cached geometry. Returns whether anything was cached.
    pub fn removegl(&mut self, model: ModelId) -> bool {
        self.cache.remove(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::color::Color;
    use crate::core::color::scheme::Rwb;
    use crate::core::io::traits::StructureReader;
    use crate::core::models::style::{Representation, RepresentationStyle};

    pub(super) const CO_XYZ: &str = "2\ncarbon monoxide\nC 0.0 0.0 0.0\nO 1.5 0.0 0.0\n";

    pub(super) const DIPEPTIDE_PDB: &str = "\
ATOM      1  N   ALA A   1      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  ALA A   1      11.639   6.071  -5.147  1.00  0.00           C
ATOM      3  C   ALA A   1      13.149   6.200  -5.200  1.00  0.00           C
ATOM      4  N   GLY B   2      13.800   6.900  -4.300  1.00 12.50           N
ATOM      5  CA  GLY B   2      15.250   7.050  -4.350  1.00 12.50           C
END
";

    fn sphere(radius: f64) -> AtomStyle {
        AtomStyle::only(
            Representation::Sphere,
            RepresentationStyle::new().with_radius(radius),
        )
    }

    fn sphere_radius(viewer: &Viewer, model: ModelId, atom: AtomId) -> Option<f64> {
        viewer.atom(model, atom)?.style.sphere.as_ref()?.radius
    }

    mod models {
        use super::*;

        #[test]
        fn latest_model_is_the_default() {
            let mut viewer = Viewer::default();
            assert!(matches!(viewer.model(None), Err(EngineError::NoModels)));
            let first = viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            let second = viewer.add_empty_model();
            assert_ne!(first, second);
            assert_eq!(viewer.model(None).unwrap().id(), second);
            assert_eq!(viewer.model(Some(first)).unwrap().len(), 2);
        }

        #[test]
        fn loaded_model_has_inferred_bond() {
            let mut viewer = Viewer::default();
            let id = viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            assert_eq!(viewer.model(Some(id)).unwrap().bonds().len(), 1);
        }

        #[test]
        fn cube_header_atoms_load_as_a_model() {
            let water_cube = "\
water density
bohr units
    2    0.0    0.0    0.0
    1    1.0    0.0    0.0
    1    0.0    1.0    0.0
    1    0.0    0.0    1.0
    8    0.0    0.0    0.0    0.0
    1    0.0    1.814    0.0    0.0
  0.25
";
            let mut viewer = Viewer::default();
            let id = viewer.add_model(water_cube, Format::Cube).unwrap();
            let model = viewer.model(Some(id)).unwrap();
            assert_eq!(model.len(), 2);
            assert_eq!(model.bonds().len(), 1);
        }

        #[test]
        fn unknown_model_is_not_found() {
            let mut viewer = Viewer::default();
            viewer.add_empty_model();
            let error = viewer.remove_model(ModelId(42)).unwrap_err();
            assert!(matches!(error, EngineError::ModelNotFound(ModelId(42))));
            assert!(error.is_not_found());
            assert_eq!(viewer.model_ids().len(), 1);
        }

        #[test]
        fn invalid_data_is_reported_and_nothing_is_added() {
            let mut viewer = Viewer::default();
            let error = viewer.add_model("two\n\nC 0 0 0\n", Format::Xyz).unwrap_err();
            assert!(matches!(error, EngineError::InvalidFormat(_)));
            assert!(viewer.model_ids().is_empty());
        }

        #[test]
        fn model_ids_are_never_reused() {
            let mut viewer = Viewer::default();
            let first = viewer.add_empty_model();
            viewer.remove_all_models();
            let second = viewer.add_empty_model();
            assert_ne!(first, second);
            assert_eq!(viewer.model_ids(), vec![second]);
        }

        #[test]
        fn default_style_is_applied_on_load() {
            let config = ViewerConfig {
                default_style: sphere(0.3),
                ..ViewerConfig::default()
            };
            let mut viewer = Viewer::new(config);
            let id = viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            let model = viewer.model(Some(id)).unwrap();
            assert!(model.atoms().all(|(_, a)| a.style == sphere(0.3)));
        }

        #[test]
        fn progress_phases_are_reported_for_loads() {
            let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            let reporter = ProgressReporter::with_callback(Box::new(move |event| {
                if let Progress::PhaseStart { name } = event {
                    sink.lock().unwrap().push(name);
                }
            }));
            let mut viewer = Viewer::with_reporter(ViewerConfig::default(), reporter);
            viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            assert_eq!(
                *seen.lock().unwrap(),
                vec!["Parsing structure", "Building model"]
            );
        }
    }

    mod styles {
        use super::*;

        #[test]
        fn set_then_add_style_merges_by_representation() {
            let mut viewer = Viewer::default();
            let id = viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            assert_eq!(viewer.set_style(&Selection::all(), &sphere(1.0)), 2);

            let atoms = viewer.selected_atoms(&Selection::all());
            let (carbon, oxygen) = (atoms[0].1, atoms[1].1);
            assert_eq!(sphere_radius(&viewer, id, carbon), Some(1.0));
            assert_eq!(sphere_radius(&viewer, id, oxygen), Some(1.0));

            assert_eq!(viewer.add_style(&Selection::element("O"), &sphere(1.5)), 1);
            assert_eq!(sphere_radius(&viewer, id, carbon), Some(1.0));
            assert_eq!(sphere_radius(&viewer, id, oxygen), Some(1.5));
        }

        #[test]
        fn add_style_keeps_unmentioned_representations() {
            let mut viewer = Viewer::default();
            let id = viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            let stick = AtomStyle::only(Representation::Stick, RepresentationStyle::new());
            viewer.add_style(&Selection::all(), &sphere(1.0));
            viewer.add_style(&Selection::all(), &stick);
            let model = viewer.model(Some(id)).unwrap();
            for (_, atom) in model.atoms() {
                assert!(atom.style.sphere.is_some());
                assert!(atom.style.stick.is_some());
            }
        }

        #[test]
        fn set_style_is_idempotent_and_bumps_generation_once_per_call() {
            let mut viewer = Viewer::default();
            let id = viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            let before = viewer.model(Some(id)).unwrap().style_generation();
            viewer.set_style(&Selection::all(), &sphere(1.0));
            let once: Vec<AtomStyle> = viewer
                .model(Some(id))
                .unwrap()
                .atoms()
                .map(|(_, a)| a.style.clone())
                .collect();
            viewer.set_style(&Selection::all(), &sphere(1.0));
            let model = viewer.model(Some(id)).unwrap();
            let twice: Vec<AtomStyle> = model.atoms().map(|(_, a)| a.style.clone()).collect();
            assert_eq!(once, twice);
            assert_eq!(model.style_generation(), before + 2);
        }

        #[test]
        fn styles_respect_model_predicates() {
            let mut viewer = Viewer::default();
            let first = viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            let second = viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            assert_eq!(viewer.set_style(&Selection::model(second), &sphere(2.0)), 2);
            let untouched = viewer.model(Some(first)).unwrap();
            assert!(untouched.atoms().all(|(_, a)| a.style.is_empty()));
        }

        #[test]
        fn colour_by_property_uses_the_scheme() {
            let mut viewer = Viewer::default();
            let id = viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            {
                let model = viewer.model_mut(Some(id)).unwrap();
                let ids: Vec<AtomId> = model.atoms().map(|(id, _)| id).collect();
                for (value, atom) in [0.0, 1.0].into_iter().zip(ids) {
                    if let Some(atom) = model.atom_mut(atom) {
                        atom.set_property("charge", value);
                    }
                }
            }
            let scheme = Rwb::new(0.0, 1.0);
            assert_eq!(viewer.set_color_by_property(&Selection::all(), "charge", &scheme), 2);
            let colors: Vec<Option<Color>> = viewer
                .model(Some(id))
                .unwrap()
                .atoms()
                .map(|(_, a)| a.color)
                .collect();
            assert_eq!(colors[0], Some(scheme.value_to_hex(0.0, None)));
            assert_eq!(colors[1], Some(scheme.value_to_hex(1.0, None)));
        }

        #[test]
        fn colour_by_element_sets_base_colours() {
            let mut viewer = Viewer::default();
            viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            let colors = ElementColorMap::rasmol();
            assert_eq!(viewer.set_color_by_element(&Selection::element("C"), &colors), 1);
            let model = viewer.model(None).unwrap();
            let carbon = model.atoms().next().map(|(_, a)| a.color);
            assert_eq!(carbon, Some(Some(colors.color_of("C"))));
        }
    }

    mod atoms {
        use super::*;

        #[test]
        fn empty_selection_returns_everything_in_storage_order() {
            let mut viewer = Viewer::default();
            let id = viewer.add_model(DIPEPTIDE_PDB, Format::Pdb).unwrap();
            let selected = viewer.selected_atoms(&Selection::all());
            let stored: Vec<(ModelId, AtomId)> = viewer
                .model(Some(id))
                .unwrap()
                .atoms()
                .map(|(atom, _)| (id, atom))
                .collect();
            assert_eq!(selected, stored);
            assert_eq!(selected.len(), 5);
        }

        #[test]
        fn bonds_stay_in_range_after_remove_then_add() {
            let mut viewer = Viewer::default();
            let id = viewer.add_model(DIPEPTIDE_PDB, Format::Pdb).unwrap();
            let removed = viewer.remove_atoms(&Selection::chain("A")).unwrap();
            assert_eq!(removed.len(), 3);

            let extra = vec![Atom::new("C", "C", Point3::new(16.7, 7.1, -4.3))];
            viewer.add_atoms(id, extra, &[]).unwrap();

            let model = viewer.model(Some(id)).unwrap();
            model.validate().unwrap();
            assert_eq!(model.len(), 3);
            for bond in model.bonds() {
                for atom in [bond.atom1_id, bond.atom2_id] {
                    let index = model.index_of(atom).unwrap();
                    assert!(index < model.len());
                }
            }
        }

        #[test]
        fn removing_nothing_is_not_an_error() {
            let mut viewer = Viewer::default();
            viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            assert!(viewer.remove_atoms(&Selection::element("Xe")).unwrap().is_empty());
        }

        #[test]
        fn invalid_bond_batch_leaves_model_untouched() {
            let mut viewer = Viewer::default();
            let id = viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            let atoms = vec![Atom::new("N", "N", Point3::new(3.0, 0.0, 0.0))];
            let bonds = [BatchBond::new(0, 5, Default::default())];
            let error = viewer.add_atoms(id, atoms, &bonds).unwrap_err();
            assert!(matches!(error, EngineError::InvariantViolation(_)));
            assert_eq!(viewer.model(Some(id)).unwrap().len(), 2);
        }
    }

    mod extraction {
        use super::*;

        #[test]
        fn copy_leaves_the_source_intact() {
            let mut viewer = Viewer::default();
            let source = viewer.add_model(DIPEPTIDE_PDB, Format::Pdb).unwrap();
            let copy = viewer.create_model_from(&Selection::chain("A"), false).unwrap();
            assert_eq!(viewer.model(Some(copy)).unwrap().len(), 3);
            assert_eq!(viewer.model(Some(source)).unwrap().len(), 5);
        }

        #[test]
        fn extract_moves_atoms_and_their_bonds() {
            let mut viewer = Viewer::default();
            let source = viewer.add_model(DIPEPTIDE_PDB, Format::Pdb).unwrap();
            let source_bonds_in_a = viewer
                .model(Some(source))
                .unwrap()
                .bonds()
                .iter()
                .filter(|b| {
                    let model = viewer.model(Some(source)).unwrap();
                    [b.atom1_id, b.atom2_id]
                        .iter()
                        .all(|&id| model.atom(id).is_some_and(|a| a.chain == "A"))
                })
                .count();

            let extracted = viewer.create_model_from(&Selection::chain("A"), true).unwrap();
            let new_model = viewer.model(Some(extracted)).unwrap();
            assert_eq!(new_model.len(), 3);
            assert_eq!(new_model.bonds().len(), source_bonds_in_a);
            let remaining = viewer.model(Some(source)).unwrap();
            assert_eq!(remaining.len(), 2);
            remaining.validate().unwrap();
        }

        #[test]
        fn empty_selection_creates_an_empty_model() {
            let mut viewer = Viewer::default();
            viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            let id = viewer.create_model_from(&Selection::element("Xe"), true).unwrap();
            assert!(viewer.model(Some(id)).unwrap().is_empty());
        }

        #[test]
        fn failed_transaction_restores_models() {
            let mut viewer = Viewer::default();
            let id = viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            let before = viewer.model(Some(id)).unwrap().clone();
            let result: Result<(), EngineError> = viewer.transaction(&[0], |viewer| {
                viewer.models[0].remove_atoms(&Selection::all())?;
                viewer.add_empty_model();
                Err(EngineError::Internal("abort".into()))
            });
            assert!(result.is_err());
            assert_eq!(viewer.model_ids(), vec![id]);
            assert_eq!(viewer.model(Some(id)).unwrap().len(), before.len());
        }
    }

    mod export {
        use super::*;
        use crate::core::io::pdb::PdbFile;
        use crate::core::models::topology::BondOrder;

        #[test]
        fn pdb_round_trip_keeps_identity_fields() {
            let mut viewer = Viewer::default();
            viewer.add_model(DIPEPTIDE_PDB, Format::Pdb).unwrap();
            let text = viewer.pdb_data(&Selection::all());
            let reparsed = PdbFile::read_str(&text).unwrap();

            let original: Vec<&Atom> = viewer.model(None).unwrap().atoms().map(|(_, a)| a).collect();
            assert_eq!(reparsed.atoms.len(), original.len());
            for (before, after) in original.iter().zip(&reparsed.atoms) {
                assert_eq!(before.element, after.element);
                assert_eq!(before.chain, after.chain);
                assert_eq!(before.residue_index, after.residue_index);
                assert_eq!(before.residue_name, after.residue_name);
                assert!((before.position - after.position).norm() < 1e-3);
            }
        }

        const CARBON_MONOXIDE_PDB: &str = "\
HETATM    1  C1  CMO A   1       0.000   0.000   0.000  1.00  0.00           C
HETATM    2  O1  CMO A   1       1.200   0.000   0.000  1.00  0.00           O
CONECT    1    2    2
END
";

        const HYDRAZINE_PDB: &str = "\
HETATM    1  N1  HYZ B   1       5.000   0.000   0.000  1.00  0.00           N
HETATM    2  N2  HYZ B   1       6.450   0.000   0.000  1.00  0.00           N
HETATM    3  C1  HYZ B   1      12.000   0.000   0.000  1.00  0.00           C
CONECT    1    2
END
";

        #[test]
        fn pdb_data_across_models_keeps_each_bond() {
            let mut viewer = Viewer::default();
            viewer.add_model(CARBON_MONOXIDE_PDB, Format::Pdb).unwrap();
            viewer.add_model(HYDRAZINE_PDB, Format::Pdb).unwrap();
            let text = viewer.pdb_data(&Selection::all());
            let reparsed = PdbFile::read_str(&text).unwrap();

            let serials: Vec<u32> = reparsed.atoms.iter().map(|a| a.serial).collect();
            assert_eq!(serials, vec![1, 2, 3, 4, 5]);
            let bonds: Vec<(&str, &str, BondOrder)> = reparsed
                .bonds
                .iter()
                .map(|b| {
                    let (a, c) = (&reparsed.atoms[b.a], &reparsed.atoms[b.b]);
                    (a.name.as_str(), c.name.as_str(), b.order)
                })
                .collect();
            assert_eq!(
                bonds,
                vec![("C1", "O1", BondOrder::Double), ("N1", "N2", BondOrder::Single)]
            );
        }

        #[test]
        fn pdb_data_of_a_selection_only_holds_matches() {
            let mut viewer = Viewer::default();
            viewer.add_model(DIPEPTIDE_PDB, Format::Pdb).unwrap();
            let text = viewer.pdb_data(&Selection::chain("B"));
            let reparsed = PdbFile::read_str(&text).unwrap();
            assert_eq!(reparsed.atoms.len(), 2);
            assert!(reparsed.atoms.iter().all(|a| a.chain == "B"));
        }
    }

    mod render_cache {
        use super::*;

        #[test]
        fn globj_is_cached_until_restyled() {
            let mut viewer = Viewer::default();
            let id = viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            let first = viewer.globj(id).unwrap();
            assert!(Arc::ptr_eq(&first, &viewer.globj(id).unwrap()));

            viewer.set_style(&Selection::all(), &sphere(1.0));
            let restyled = viewer.globj(id).unwrap();
            assert!(!Arc::ptr_eq(&first, &restyled));
            assert_eq!(restyled.spheres.len(), 2);
        }

        #[test]
        fn removegl_forces_a_rebuild() {
            let mut viewer = Viewer::default();
            let id = viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            let first = viewer.globj(id).unwrap();
            assert!(viewer.removegl(id));
            assert!(!viewer.removegl(id));
            assert!(!Arc::ptr_eq(&first, &viewer.globj(id).unwrap()));
        }

        #[test]
        fn removed_models_have_no_geometry() {
            let mut viewer = Viewer::default();
            let id = viewer.add_model(CO_XYZ, Format::Xyz).unwrap();
            viewer.globj(id).unwrap();
            viewer.remove_model(id).unwrap();
            assert!(matches!(viewer.globj(id), Err(EngineError::ModelNotFound(_))));
            assert!(!viewer.removegl(id));
        }
    }
}
