use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use itertools::Itertools;
use nalgebra::Point3;
use tracing::{debug, instrument, trace};

use crate::core::color::Color;
use crate::core::models::atom::{Atom, SecondaryStructure};
use crate::core::models::ids::{AtomId, ModelId};
use crate::core::models::model::Model;
use crate::core::models::style::{
    DEFAULT_CARTOON_WIDTH, DEFAULT_CROSS_RADIUS, DEFAULT_LINE_WIDTH, DEFAULT_STICK_RADIUS,
    Representation, RepresentationStyle,
};

/// Atom name of the trace atom followed by cartoons.
const TRACE_ATOM: &str = "CA";

#[derive(Debug, Clone, PartialEq)]
pub struct LineSegment {
    pub start: [f32; 3],
    pub end: [f32; 3],
    pub color: Color,
    pub width: f32,
    pub multiple: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossMarker {
    pub center: [f32; 3],
    /// Half length of each arm.
    pub size: f32,
    pub color: Color,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SphereInstance {
    pub center: [f32; 3],
    pub radius: f32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cylinder {
    pub start: [f32; 3],
    pub end: [f32; 3],
    pub radius: f32,
    pub color: Color,
    pub multiple: bool,
}

/// A continuous backbone trace through consecutive residues of one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct CartoonTrace {
    pub chain: String,
    pub points: Vec<[f32; 3]>,
    pub colors: Vec<Color>,
    pub secondary_structure: Vec<SecondaryStructure>,
    pub width: f32,
}

/// Per-representation geometry of one model, built for a render backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderableObject {
    pub model: ModelId,
    /// The (structure, style) generation pair this object was built from.
    pub generation: (u64, u64),
    pub lines: Vec<LineSegment>,
    pub crosses: Vec<CrossMarker>,
    pub spheres: Vec<SphereInstance>,
    pub sticks: Vec<Cylinder>,
    pub stick_joints: Vec<SphereInstance>,
    pub cartoons: Vec<CartoonTrace>,
}

impl RenderableObject {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
            && self.crosses.is_empty()
            && self.spheres.is_empty()
            && self.sticks.is_empty()
            && self.cartoons.is_empty()
    }

    pub fn build(model: &Model) -> Self {
        Self::assemble(model, &AtomGeometry::collect(model, None))
    }

    /// Concatenates per-atom geometry in storage order and traces the cartoons.
    #[instrument(skip_all, name = "renderable_build", fields(model = %model.id()))]
    fn assemble(model: &Model, fragments: &HashMap<AtomId, AtomGeometry>) -> Self {
        let mut object = Self {
            model: model.id(),
            generation: model.generation(),
            lines: Vec::new(),
            crosses: Vec::new(),
            spheres: Vec::new(),
            sticks: Vec::new(),
            stick_joints: Vec::new(),
            cartoons: Vec::new(),
        };
        for fragment in model.atoms().filter_map(|(id, _)| fragments.get(&id)) {
            object.lines.extend_from_slice(&fragment.lines);
            object.crosses.extend_from_slice(&fragment.crosses);
            object.spheres.extend_from_slice(&fragment.spheres);
            object.sticks.extend_from_slice(&fragment.sticks);
            object.stick_joints.extend_from_slice(&fragment.stick_joints);
        }
        object.build_cartoons(model);
        debug!(
            lines = object.lines.len(),
            crosses = object.crosses.len(),
            spheres = object.spheres.len(),
            sticks = object.sticks.len(),
            cartoons = object.cartoons.len(),
            "Built renderable object"
        );
        object
    }

    /// Traces split wherever the chain changes or residue numbering jumps.
    fn build_cartoons(&mut self, model: &Model) {
        let trace_atoms = model.atoms().filter(|(_, atom)| {
            atom.name == TRACE_ATOM && atom.style.visible(Representation::Cartoon).is_some()
        });
        let by_chain = trace_atoms.chunk_by(|(_, atom)| atom.chain.clone());
        for (chain, residues) in &by_chain {
            let residues: Vec<(AtomId, &Atom)> = residues.collect();
            let mut start = 0;
            for end in 1..=residues.len() {
                let broken = end == residues.len()
                    || residues[end].1.residue_index - residues[end - 1].1.residue_index != 1;
                if broken {
                    self.push_trace(model, &chain, &residues[start..end]);
                    start = end;
                }
            }
        }
    }

    fn push_trace(&mut self, model: &Model, chain: &str, residues: &[(AtomId, &Atom)]) {
        if residues.len() < 2 {
            trace!(chain, "Skipping single-residue cartoon segment");
            return;
        }
        let width = residues[0]
            .1
            .style
            .visible(Representation::Cartoon)
            .and_then(|s| s.line_width)
            .unwrap_or(DEFAULT_CARTOON_WIDTH);
        self.cartoons.push(CartoonTrace {
            chain: chain.to_string(),
            points: residues.iter().map(|(_, a)| to_f32(&a.position)).collect(),
            colors: residues
                .iter()
                .map(|(id, _)| model.resolve_color(*id, Representation::Cartoon))
                .collect(),
            secondary_structure: residues.iter().map(|(_, a)| a.secondary_structure).collect(),
            width: width as f32,
        });
    }
}

/// Geometry owned by one atom: its glyphs plus its half of every bond, so that a
/// restyle of the atom never touches geometry owned by its neighbours.
#[derive(Debug, Clone, Default, PartialEq)]
struct AtomGeometry {
    lines: Vec<LineSegment>,
    crosses: Vec<CrossMarker>,
    spheres: Vec<SphereInstance>,
    sticks: Vec<Cylinder>,
    stick_joints: Vec<SphereInstance>,
}

impl AtomGeometry {
    /// Geometry of every atom, or only of the atoms in `only`.
    fn collect(model: &Model, only: Option<&HashSet<AtomId>>) -> HashMap<AtomId, AtomGeometry> {
        let wanted = |id: &AtomId| only.is_none_or(|ids| ids.contains(id));
        let mut fragments: HashMap<AtomId, AtomGeometry> = model
            .atoms()
            .filter(|(id, _)| wanted(id))
            .map(|(id, _)| (id, AtomGeometry::default()))
            .collect();

        for bond in model.bonds() {
            let (Some(a), Some(b)) = (model.atom(bond.atom1_id), model.atom(bond.atom2_id)) else {
                continue;
            };
            let middle = Point3::from((a.position.coords + b.position.coords) / 2.0);
            for (id, atom) in [(bond.atom1_id, a), (bond.atom2_id, b)] {
                if let Some(fragment) = fragments.get_mut(&id) {
                    fragment.push_bond_half(model, id, atom, &middle, bond.multiple);
                }
            }
        }
        for (id, atom) in model.atoms() {
            if let Some(fragment) = fragments.get_mut(&id) {
                fragment.push_atomic(model, id, atom);
            }
        }
        fragments
    }

    /// The half of a bond drawn from `atom` to the bond midpoint, in that atom's colour.
    fn push_bond_half(
        &mut self,
        model: &Model,
        id: AtomId,
        atom: &Atom,
        middle: &Point3<f64>,
        multiple: bool,
    ) {
        if let Some(style) = atom.style.visible(Representation::Line) {
            self.lines.push(LineSegment {
                start: to_f32(&atom.position),
                end: to_f32(middle),
                color: model.resolve_color(id, Representation::Line),
                width: style.line_width.unwrap_or(DEFAULT_LINE_WIDTH) as f32,
                multiple,
            });
        }
        if let Some(style) = atom.style.visible(Representation::Stick) {
            self.sticks.push(Cylinder {
                start: to_f32(&atom.position),
                end: to_f32(middle),
                radius: stick_radius(style),
                color: model.resolve_color(id, Representation::Stick),
                multiple,
            });
        }
    }

    fn push_atomic(&mut self, model: &Model, id: AtomId, atom: &Atom) {
        let center = to_f32(&atom.position);
        let unbonded = model.bonded_neighbors(id).is_none_or(|n| n.is_empty());

        // Bondless atoms shown as lines are drawn as crosses so they stay visible.
        let cross = atom.style.visible(Representation::Cross).map(|s| (s, Representation::Cross));
        let lone_line = atom
            .style
            .visible(Representation::Line)
            .filter(|_| unbonded)
            .map(|s| (s, Representation::Line));
        for (style, representation) in cross.into_iter().chain(lone_line) {
            self.crosses.push(CrossMarker {
                center,
                size: (style.radius.unwrap_or(DEFAULT_CROSS_RADIUS) * style.scale.unwrap_or(1.0))
                    as f32,
                color: model.resolve_color(id, representation),
                width: style.line_width.unwrap_or(DEFAULT_LINE_WIDTH) as f32,
            });
        }

        if let Some(style) = atom.style.visible(Representation::Sphere) {
            self.spheres.push(SphereInstance {
                center,
                radius: (style.radius.unwrap_or_else(|| atom.vdw_radius())
                    * style.scale.unwrap_or(1.0)) as f32,
                color: model.resolve_color(id, Representation::Sphere),
            });
        }

        if let Some(style) = atom.style.visible(Representation::Stick) {
            self.stick_joints.push(SphereInstance {
                center,
                radius: stick_radius(style),
                color: model.resolve_color(id, Representation::Stick),
            });
        }
    }
}

fn stick_radius(style: &RepresentationStyle) -> f32 {
    (style.radius.unwrap_or(DEFAULT_STICK_RADIUS) * style.scale.unwrap_or(1.0)) as f32
}

fn to_f32(p: &Point3<f64>) -> [f32; 3] {
    [p.x as f32, p.y as f32, p.z as f32]
}

#[derive(Debug)]
struct CacheEntry {
    object: Arc<RenderableObject>,
    fragments: HashMap<AtomId, AtomGeometry>,
}

/// Renderable objects keyed by model, rebuilt only when a model's generation moves.
///
/// When only the style generation moved, the geometry of the model's dirty atoms is
/// regenerated and every other atom's cached geometry is reused. A structural edit
/// rebuilds the whole object.
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: HashMap<ModelId, CacheEntry>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached object for `model`, brought up to date first if it is stale.
    /// Drains the model's dirty set.
    pub fn get_or_build(&mut self, model: &mut Model) -> Arc<RenderableObject> {
        let id = model.id();
        let generation = model.generation();
        if let Some(entry) = self
            .entries
            .get(&id)
            .filter(|entry| entry.object.generation == generation)
        {
            trace!(model = %id, "Renderable cache hit");
            return Arc::clone(&entry.object);
        }

        let dirty: HashSet<AtomId> = model.take_dirty().into_iter().collect();
        let fragments = match self.entries.remove(&id) {
            Some(mut entry) if entry.object.generation.0 == generation.0 => {
                debug!(
                    model = %id,
                    dirty = dirty.len(),
                    style = generation.1,
                    "Regenerating restyled atoms"
                );
                entry.fragments.extend(AtomGeometry::collect(model, Some(&dirty)));
                entry.fragments
            }
            _ => {
                debug!(
                    model = %id,
                    structure = generation.0,
                    style = generation.1,
                    "Rebuilding stale renderable object"
                );
                AtomGeometry::collect(model, None)
            }
        };
        let object = Arc::new(RenderableObject::assemble(model, &fragments));
        self.entries.insert(
            id,
            CacheEntry {
                object: Arc::clone(&object),
                fragments,
            },
        );
        object
    }

    pub fn get(&self, model: ModelId) -> Option<&Arc<RenderableObject>> {
        self.entries.get(&model).map(|entry| &entry.object)
    }

    /// Drops the cached object regardless of its generation.
    pub fn remove(&mut self, model: ModelId) -> bool {
        self.entries.remove(&model).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::model::BatchBond;
    use crate::core::models::style::AtomStyle;
    use crate::core::models::topology::BondOrder;
    use crate::core::selection::Selection;

    fn carbon_monoxide() -> Model {
        let mut model = Model::new(ModelId(0));
        model
            .add_atoms(
                vec![
                    Atom::new("C", "C", Point3::new(0.0, 0.0, 0.0)),
                    Atom::new("O", "O", Point3::new(1.5, 0.0, 0.0)),
                ],
                &[BatchBond::new(0, 1, BondOrder::Double)],
            )
            .unwrap();
        model
    }

    fn backbone(residues: &[(&str, isize)]) -> Model {
        let mut model = Model::new(ModelId(1));
        let atoms = residues
            .iter()
            .enumerate()
            .map(|(i, (chain, index))| {
                Atom::new("CA", "C", Point3::new(i as f64 * 3.8, 0.0, 0.0))
                    .with_residue("ALA", *index, chain)
            })
            .collect();
        model.add_atoms_with(atoms, &[], false).unwrap();
        model.set_style(
            &Selection::all(),
            &AtomStyle::only(Representation::Cartoon, RepresentationStyle::new()),
        );
        model
    }

    mod geometry {
        use super::*;

        #[test]
        fn unstyled_model_builds_nothing() {
            assert!(RenderableObject::build(&carbon_monoxide()).is_empty());
        }

        #[test]
        fn sticks_are_split_at_the_bond_midpoint() {
            let mut model = carbon_monoxide();
            model.set_style(
                &Selection::all(),
                &AtomStyle::only(Representation::Stick, RepresentationStyle::new()),
            );
            let object = RenderableObject::build(&model);
            assert_eq!(object.sticks.len(), 2);
            assert_eq!(object.stick_joints.len(), 2);
            for stick in &object.sticks {
                assert_eq!(stick.end, [0.75, 0.0, 0.0]);
                assert!(stick.multiple);
                assert_eq!(stick.radius, DEFAULT_STICK_RADIUS as f32);
            }
            let colors = model.element_colors();
            assert_eq!(object.sticks[0].color, colors.color_of("C"));
            assert_eq!(object.sticks[1].color, colors.color_of("O"));
        }

        #[test]
        fn sphere_radius_defaults_to_vdw_and_scales() {
            let mut model = carbon_monoxide();
            model.set_style(
                &Selection::all(),
                &AtomStyle::only(Representation::Sphere, RepresentationStyle::new().with_scale(0.5)),
            );
            let object = RenderableObject::build(&model);
            let expected = (crate::core::models::element::vdw_radius("C") * 0.5) as f32;
            assert_eq!(object.spheres[0].radius, expected);
        }

        #[test]
        fn hidden_representations_are_skipped() {
            let mut model = carbon_monoxide();
            model.set_style(
                &Selection::all(),
                &AtomStyle::only(Representation::Sphere, RepresentationStyle::new().hidden()),
            );
            assert!(RenderableObject::build(&model).spheres.is_empty());
        }

        #[test]
        fn lone_line_atoms_become_crosses() {
            let mut model = Model::new(ModelId(2));
            model
                .add_atoms(vec![Atom::new("NA", "Na", Point3::origin())], &[])
                .unwrap();
            model.set_style(
                &Selection::all(),
                &AtomStyle::only(Representation::Line, RepresentationStyle::new()),
            );
            let object = RenderableObject::build(&model);
            assert!(object.lines.is_empty());
            assert_eq!(object.crosses.len(), 1);
        }

        #[test]
        fn bonded_line_atoms_draw_half_segments() {
            let mut model = carbon_monoxide();
            model.set_style(
                &Selection::all(),
                &AtomStyle::only(Representation::Line, RepresentationStyle::new()),
            );
            let object = RenderableObject::build(&model);
            assert_eq!(object.lines.len(), 2);
            assert!(object.crosses.is_empty());
        }

        #[test]
        fn cartoon_traces_break_on_chain_and_gap() {
            let model = backbone(&[("A", 1), ("A", 2), ("A", 3), ("A", 7), ("A", 8), ("B", 9), ("B", 10)]);
            let object = RenderableObject::build(&model);
            let lengths: Vec<(String, usize)> = object
                .cartoons
                .iter()
                .map(|c| (c.chain.clone(), c.points.len()))
                .collect();
            assert_eq!(
                lengths,
                vec![("A".into(), 3), ("A".into(), 2), ("B".into(), 2)]
            );
        }

        #[test]
        fn single_residue_segments_are_dropped() {
            let model = backbone(&[("A", 1), ("A", 5)]);
            assert!(RenderableObject::build(&model).cartoons.is_empty());
        }
    }

    mod caching {
        use super::*;

        #[test]
        fn unchanged_model_hits_the_cache() {
            let mut model = carbon_monoxide();
            let mut cache = RenderCache::new();
            let first = cache.get_or_build(&mut model);
            let second = cache.get_or_build(&mut model);
            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(cache.len(), 1);
        }

        #[test]
        fn restyle_triggers_a_rebuild_and_clears_dirty_atoms() {
            let mut model = carbon_monoxide();
            let mut cache = RenderCache::new();
            let first = cache.get_or_build(&mut model);
            model.set_style(
                &Selection::all(),
                &AtomStyle::only(Representation::Sphere, RepresentationStyle::new()),
            );
            let second = cache.get_or_build(&mut model);
            assert!(!Arc::ptr_eq(&first, &second));
            assert_eq!(second.spheres.len(), 2);
            assert!(model.take_dirty().is_empty());
        }

        #[test]
        fn restyle_of_some_atoms_matches_a_full_build() {
            let mut model = carbon_monoxide();
            let mut cache = RenderCache::new();
            model.set_style(
                &Selection::all(),
                &AtomStyle::only(Representation::Stick, RepresentationStyle::new()),
            );
            cache.get_or_build(&mut model);

            model.add_style(
                &Selection::element("O"),
                &AtomStyle::only(Representation::Sphere, RepresentationStyle::new()),
            );
            model.set_style(
                &Selection::element("C"),
                &AtomStyle::only(Representation::Line, RepresentationStyle::new()),
            );
            let patched = cache.get_or_build(&mut model);
            assert_eq!(*patched, RenderableObject::build(&model));
            assert_eq!(patched.lines.len(), 1);
            assert_eq!(patched.sticks.len(), 1);
            assert_eq!(patched.spheres.len(), 1);
        }

        #[test]
        fn clean_atoms_keep_their_cached_geometry() {
            let mut model = carbon_monoxide();
            let mut cache = RenderCache::new();
            let sphere = |radius| {
                AtomStyle::only(
                    Representation::Sphere,
                    RepresentationStyle::new().with_radius(radius),
                )
            };
            model.set_style(&Selection::all(), &sphere(1.0));
            cache.get_or_build(&mut model);

            // Edits through `atom_mut` neither mark the atom dirty nor move a generation.
            let carbon = model.id_at(0).unwrap();
            model.atom_mut(carbon).unwrap().style = sphere(3.0);
            model.set_style(&Selection::element("O"), &sphere(2.0));

            let patched = cache.get_or_build(&mut model);
            let radii: Vec<f32> = patched.spheres.iter().map(|s| s.radius).collect();
            assert_eq!(radii, vec![1.0, 2.0]);
            assert!(!model.is_dirty(carbon));
        }

        #[test]
        fn structural_edits_rebuild_every_atom() {
            let mut model = carbon_monoxide();
            let mut cache = RenderCache::new();
            let style = AtomStyle::only(
                Representation::Sphere,
                RepresentationStyle::new().with_radius(1.0),
            );
            model.set_style(&Selection::all(), &style);
            cache.get_or_build(&mut model);

            let carbon = model.id_at(0).unwrap();
            model.atom_mut(carbon).unwrap().style = AtomStyle::default();
            model
                .add_atoms(vec![Atom::new("N", "N", Point3::new(9.0, 0.0, 0.0))], &[])
                .unwrap();
            let rebuilt = cache.get_or_build(&mut model);
            assert_eq!(*rebuilt, RenderableObject::build(&model));
            assert_eq!(rebuilt.spheres.len(), 1);
        }

        #[test]
        fn remove_forces_a_rebuild() {
            let mut model = carbon_monoxide();
            let mut cache = RenderCache::new();
            let first = cache.get_or_build(&mut model);
            assert!(cache.remove(model.id()));
            assert!(!cache.remove(model.id()));
            assert!(cache.is_empty());
            let second = cache.get_or_build(&mut model);
            assert!(!Arc::ptr_eq(&first, &second));
            assert_eq!(*first, *second);
        }
    }
}
