use super::atom::Atom;
use super::ids::{AtomId, ModelId};
use super::style::{AtomStyle, Representation};
use super::topology::{Bond, BondOrder};
use crate::core::color::Color;
use crate::core::color::elements::ElementColorMap;
use crate::core::color::scheme::ColorScheme;
use crate::core::selection::Selection;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point3;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, trace};

/// Extra distance allowed beyond the sum of covalent radii when inferring bonds.
pub const BOND_TOLERANCE: f64 = 0.45;
/// Pairs closer than this are treated as overlapping alternates, not bonds.
pub const MIN_BOND_DISTANCE: f64 = 0.4;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Bond #{bond} references atom {atom} outside a batch of {len} atoms")]
    BondOutOfRange { bond: usize, atom: usize, len: usize },
    #[error("Bond #{bond} connects atom {atom} to itself")]
    SelfBond { bond: usize, atom: usize },
    #[error("Bond references an atom that is not in the model: {0:?}")]
    DanglingBond(Bond),
    #[error("Storage order and index map disagree: {0}")]
    IndexMap(String),
    #[error("Expected {expected} positions, got {actual}")]
    PositionCount { expected: usize, actual: usize },
}

/// An explicit bond between two atoms of a batch, by position within that batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchBond {
    pub a: usize,
    pub b: usize,
    pub order: BondOrder,
}

impl BatchBond {
    pub fn new(a: usize, b: usize, order: BondOrder) -> Self {
        Self { a, b, order }
    }
}

/// A model: ordered atoms, their bonds, and the counters consumed by caches.
///
/// Atoms live in a generation-tagged arena so that an [`AtomId`] held after the atom is
/// removed resolves to nothing instead of to a different atom. Storage order is a separate
/// dense vector; the id to index map is rebuilt whenever that vector compacts.
#[derive(Debug, Clone)]
pub struct Model {
    id: ModelId,
    atoms: SlotMap<AtomId, Atom>,
    /// Dense storage order.
    order: Vec<AtomId>,
    /// Stable id to current storage index.
    index: SecondaryMap<AtomId, usize>,
    bonds: Vec<Bond>,
    bond_adjacency: SecondaryMap<AtomId, Vec<AtomId>>,
    element_colors: ElementColorMap,
    structure_generation: u64,
    style_generation: u64,
    dirty: HashSet<AtomId>,
}

impl Model {
    pub fn new(id: ModelId) -> Self {
        Self::with_element_colors(id, ElementColorMap::default())
    }

    pub fn with_element_colors(id: ModelId, element_colors: ElementColorMap) -> Self {
        Self {
            id,
            atoms: SlotMap::with_key(),
            order: Vec::new(),
            index: SecondaryMap::new(),
            bonds: Vec::new(),
            bond_adjacency: SecondaryMap::new(),
            element_colors,
            structure_generation: 0,
            style_generation: 0,
            dirty: HashSet::new(),
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    /// Current storage index of `id`.
    pub fn index_of(&self, id: AtomId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// The atom id at storage index `index`.
    pub fn id_at(&self, index: usize) -> Option<AtomId> {
        self.order.get(index).copied()
    }

    /// Atoms in storage order.
    pub fn atoms(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.order.iter().map(|&id| (id, &self.atoms[id]))
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn bonded_neighbors(&self, id: AtomId) -> Option<&[AtomId]> {
        self.bond_adjacency.get(id).map(|v| v.as_slice())
    }

    pub fn element_colors(&self) -> &ElementColorMap {
        &self.element_colors
    }

    pub fn structure_generation(&self) -> u64 {
        self.structure_generation
    }

    pub fn style_generation(&self) -> u64 {
        self.style_generation
    }

    /// The (structure, style) generation pair keying cached geometry.
    pub fn generation(&self) -> (u64, u64) {
        (self.structure_generation, self.style_generation)
    }

    /// Ids of the atoms matching `selection`, in storage order.
    pub fn selected_atoms(&self, selection: &Selection) -> Vec<AtomId> {
        self.atoms()
            .filter(|(_, atom)| selection.matches(self.id, atom))
            .map(|(id, _)| id)
            .collect()
    }

    /// Checks that every bond endpoint is live and that the order and index map agree.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.order.len() != self.atoms.len() {
            return Err(ModelError::IndexMap(format!(
                "{} ordered ids for {} atoms",
                self.order.len(),
                self.atoms.len()
            )));
        }
        for (i, &id) in self.order.iter().enumerate() {
            if self.index.get(id) != Some(&i) {
                return Err(ModelError::IndexMap(format!(
                    "atom at storage index {} maps to {:?}",
                    i,
                    self.index.get(id)
                )));
            }
        }
        if let Some(bond) = self
            .bonds
            .iter()
            .find(|b| !self.atoms.contains_key(b.atom1_id) || !self.atoms.contains_key(b.atom2_id))
        {
            return Err(ModelError::DanglingBond(*bond));
        }
        Ok(())
    }

    /// Appends `atoms` in order and connects them.
    ///
    /// Explicit `bonds` index into `atoms`. When none are given, bonds are inferred
    /// between the new atoms and between new and existing atoms.
    pub fn add_atoms(
        &mut self,
        atoms: Vec<Atom>,
        bonds: &[BatchBond],
    ) -> Result<Vec<AtomId>, ModelError> {
        let infer = bonds.is_empty();
        self.add_atoms_with(atoms, bonds, infer)
    }

    /// Appends `atoms`, adds the explicit `bonds`, and when `infer` is set also connects
    /// the new atoms by distance. Explicit bonds win over inferred ones for the same pair.
    ///
    /// Atoms keep their serial when it is non-zero and unused in this model, otherwise
    /// they receive the next free one. Nothing is mutated when validation fails.
    pub fn add_atoms_with(
        &mut self,
        atoms: Vec<Atom>,
        bonds: &[BatchBond],
        infer: bool,
    ) -> Result<Vec<AtomId>, ModelError> {
        self.validate()?;
        for (i, bond) in bonds.iter().enumerate() {
            for atom in [bond.a, bond.b] {
                if atom >= atoms.len() {
                    return Err(ModelError::BondOutOfRange {
                        bond: i,
                        atom,
                        len: atoms.len(),
                    });
                }
            }
            if bond.a == bond.b {
                return Err(ModelError::SelfBond {
                    bond: i,
                    atom: bond.a,
                });
            }
        }
        if atoms.is_empty() {
            return Ok(Vec::new());
        }

        let first_new = self.order.len();
        let mut used: HashSet<u32> = self.atoms.values().map(|a| a.serial).collect();
        let mut next_serial = used.iter().copied().max().unwrap_or(0) + 1;

        let mut ids = Vec::with_capacity(atoms.len());
        for mut atom in atoms {
            if atom.serial == 0 || used.contains(&atom.serial) {
                while used.contains(&next_serial) {
                    next_serial += 1;
                }
                atom.serial = next_serial;
            }
            used.insert(atom.serial);
            let id = self.atoms.insert(atom);
            self.index.insert(id, self.order.len());
            self.order.push(id);
            self.bond_adjacency.insert(id, Vec::new());
            self.dirty.insert(id);
            ids.push(id);
        }

        for bond in bonds {
            self.add_bond(ids[bond.a], ids[bond.b], bond.order);
        }
        let inferred = if infer { self.infer_bonds(first_new) } else { 0 };
        debug!(
            model = %self.id,
            added = ids.len(),
            explicit = bonds.len(),
            inferred,
            "Added atoms."
        );

        self.structure_generation += 1;
        Ok(ids)
    }

    /// Adds a bond if both atoms exist and are not already bonded. Returns whether it was added.
    pub fn add_bond(&mut self, a: AtomId, b: AtomId, order: BondOrder) -> bool {
        if a == b || !self.atoms.contains_key(a) || !self.atoms.contains_key(b) {
            return false;
        }
        if self
            .bond_adjacency
            .get(a)
            .is_some_and(|neighbors| neighbors.contains(&b))
        {
            return false;
        }
        self.bonds.push(Bond::new(a, b, order));
        if let Some(n) = self.bond_adjacency.get_mut(a) {
            n.push(b);
        }
        if let Some(n) = self.bond_adjacency.get_mut(b) {
            n.push(a);
        }
        true
    }

    fn infer_bonds(&mut self, first_new: usize) -> usize {
        let positions: Vec<[f64; 3]> = self
            .order
            .iter()
            .map(|&id| {
                let p = self.atoms[id].position;
                [p.x, p.y, p.z]
            })
            .collect();
        let radii: Vec<f64> = self
            .order
            .iter()
            .map(|&id| self.atoms[id].covalent_radius())
            .collect();
        let max_radius = radii.iter().copied().fold(0.0, f64::max);
        let kdtree: KdTree<f64, 3> = (&positions).into();

        let mut pairs = Vec::new();
        for i in first_new..positions.len() {
            let reach = radii[i] + max_radius + BOND_TOLERANCE;
            for neighbor in kdtree.within_unsorted::<SquaredEuclidean>(&positions[i], reach * reach)
            {
                let j = neighbor.item as usize;
                // Pairs of new atoms are visited from both ends; keep one.
                if j == i || (j >= first_new && j < i) {
                    continue;
                }
                let distance = neighbor.distance.sqrt();
                if (MIN_BOND_DISTANCE..=radii[i] + radii[j] + BOND_TOLERANCE).contains(&distance) {
                    pairs.push((self.order[i], self.order[j]));
                }
            }
        }
        let mut added = 0;
        for (a, b) in pairs {
            if self.add_bond(a, b, BondOrder::Single) {
                added += 1;
            }
        }
        added
    }

    /// Removes the atoms matching `selection` and every bond touching them, then compacts
    /// storage. Returns the removed atoms in their former storage order.
    pub fn remove_atoms(&mut self, selection: &Selection) -> Result<Vec<Atom>, ModelError> {
        self.validate()?;
        let doomed: HashSet<AtomId> = self.selected_atoms(selection).into_iter().collect();
        if doomed.is_empty() {
            return Ok(Vec::new());
        }

        self.bonds
            .retain(|b| !doomed.contains(&b.atom1_id) && !doomed.contains(&b.atom2_id));
        for neighbors in self.bond_adjacency.values_mut() {
            neighbors.retain(|n| !doomed.contains(n));
        }

        let mut removed = Vec::with_capacity(doomed.len());
        let order = std::mem::take(&mut self.order);
        for id in order {
            if doomed.contains(&id) {
                self.index.remove(id);
                self.bond_adjacency.remove(id);
                self.dirty.remove(&id);
                if let Some(atom) = self.atoms.remove(id) {
                    removed.push(atom);
                }
            } else {
                self.index.insert(id, self.order.len());
                self.order.push(id);
            }
        }

        self.structure_generation += 1;
        debug!(model = %self.id, removed = removed.len(), remaining = self.order.len(), "Removed atoms.");
        Ok(removed)
    }

    /// Replaces every atom position, in storage order.
    pub fn set_positions(&mut self, positions: &[Point3<f64>]) -> Result<(), ModelError> {
        if positions.len() != self.order.len() {
            return Err(ModelError::PositionCount {
                expected: self.order.len(),
                actual: positions.len(),
            });
        }
        for (&id, position) in self.order.iter().zip(positions) {
            self.atoms[id].position = *position;
        }
        self.structure_generation += 1;
        Ok(())
    }

    /// Applies `update` to every matching atom, marking them dirty and bumping the style
    /// generation once if anything matched.
    fn restyle(&mut self, selection: &Selection, update: impl FnMut(&mut Atom)) -> usize {
        let ids = self.selected_atoms(selection);
        self.restyle_ids(&ids, update)
    }

    fn restyle_ids(&mut self, ids: &[AtomId], mut update: impl FnMut(&mut Atom)) -> usize {
        for &id in ids {
            if let Some(atom) = self.atoms.get_mut(id) {
                update(atom);
                self.dirty.insert(id);
            }
        }
        if !ids.is_empty() {
            self.style_generation += 1;
        }
        trace!(model = %self.id, matched = ids.len(), "Restyled atoms.");
        ids.len()
    }

    /// Replaces the full style record of matching atoms. Returns the match count.
    pub fn set_style(&mut self, selection: &Selection, style: &AtomStyle) -> usize {
        self.restyle(selection, |atom| atom.style = style.clone())
    }

    /// Merges `style` into matching atoms by representation kind. Returns the match count.
    pub fn add_style(&mut self, selection: &Selection, style: &AtomStyle) -> usize {
        self.restyle(selection, |atom| atom.style.merge(style))
    }

    /// Sets the base colour of matching atoms from an element colour map.
    pub fn set_color_by_element(&mut self, selection: &Selection, colors: &ElementColorMap) -> usize {
        self.restyle(selection, |atom| atom.color = Some(colors.color_of(&atom.element)))
    }

    /// Sets the base colour of matching atoms from a numeric property through `scheme`.
    ///
    /// The scheme's configured range is used when present; otherwise the range spans the
    /// property values of the matched atoms. Atoms without a numeric value are left alone.
    pub fn set_color_by_property(
        &mut self,
        selection: &Selection,
        property: &str,
        scheme: &dyn ColorScheme,
    ) -> usize {
        let values: HashMap<AtomId, f64> = self
            .selected_atoms(selection)
            .into_iter()
            .filter_map(|id| {
                self.atoms[id]
                    .property(property)
                    .and_then(|v| v.as_number())
                    .map(|v| (id, v))
            })
            .collect();
        if values.is_empty() {
            return 0;
        }
        let range = scheme.range().unwrap_or_else(|| {
            values
                .values()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                })
        });
        let ids: Vec<AtomId> = self
            .order
            .iter()
            .copied()
            .filter(|id| values.contains_key(id))
            .collect();
        let mut colors = ids
            .iter()
            .map(|id| scheme.value_to_hex(values[id], Some(range)))
            .collect::<Vec<_>>()
            .into_iter();
        self.restyle_ids(&ids, |atom| atom.color = colors.next())
    }

    /// Effective colour of `id` for `representation`: the representation's own colour, then the
    /// atom's base colour, then the model's element map.
    pub fn resolve_color(&self, id: AtomId, representation: Representation) -> Color {
        let Some(atom) = self.atoms.get(id) else {
            return self.element_colors.default_color();
        };
        atom.style
            .get(representation)
            .and_then(|s| s.color)
            .or(atom.color)
            .unwrap_or_else(|| self.element_colors.color_of(&atom.element))
    }

    pub fn is_dirty(&self, id: AtomId) -> bool {
        self.dirty.contains(&id)
    }

    /// Drains the dirty set, returning the ids in storage order.
    pub(crate) fn take_dirty(&mut self) -> Vec<AtomId> {
        let dirty = std::mem::take(&mut self.dirty);
        self.order
            .iter()
            .copied()
            .filter(|id| dirty.contains(id))
            .collect()
    }

    /// Clones the given atoms and the bonds among them as a batch for another model.
    pub fn extract_batch(&self, ids: &[AtomId]) -> (Vec<Atom>, Vec<BatchBond>) {
        let positions: HashMap<AtomId, usize> =
            ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let atoms = ids
            .iter()
            .filter_map(|&id| self.atoms.get(id).cloned())
            .collect();
        let bonds = self
            .bonds
            .iter()
            .filter_map(|b| {
                Some(BatchBond::new(
                    *positions.get(&b.atom1_id)?,
                    *positions.get(&b.atom2_id)?,
                    b.order,
                ))
            })
            .collect();
        (atoms, bonds)
    }
}
