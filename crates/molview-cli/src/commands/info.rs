use super::load_structure;
use crate::cli::InfoArgs;
use crate::error::Result;
use molview::core::models::atom::SecondaryStructure;
use molview::core::models::model::Model;
use molview::viewer::Viewer;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;

/// Counts describing one loaded model.
#[derive(Debug, Default, PartialEq)]
pub struct StructureSummary {
    pub atoms: usize,
    pub bonds: usize,
    pub hetero_atoms: usize,
    pub chains: BTreeSet<String>,
    pub residues: usize,
    pub elements: BTreeMap<String, usize>,
    pub helix_atoms: usize,
    pub sheet_atoms: usize,
}

impl StructureSummary {
    pub fn of(model: &Model) -> Self {
        let mut summary = Self {
            atoms: model.len(),
            bonds: model.bonds().len(),
            ..Self::default()
        };
        let mut residues = BTreeSet::new();
        for (_, atom) in model.atoms() {
            if atom.hetflag {
                summary.hetero_atoms += 1;
            }
            if !atom.chain.is_empty() {
                summary.chains.insert(atom.chain.clone());
            }
            if !atom.residue_name.is_empty() {
                residues.insert((&atom.chain, atom.residue_index, atom.insertion_code));
            }
            *summary.elements.entry(atom.element.clone()).or_default() += 1;
            match atom.secondary_structure {
                SecondaryStructure::Helix => summary.helix_atoms += 1,
                SecondaryStructure::Sheet => summary.sheet_atoms += 1,
                SecondaryStructure::Coil => {}
            }
        }
        summary.residues = residues.len();
        summary
    }
}

impl fmt::Display for StructureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Atoms:     {} ({} hetero)", self.atoms, self.hetero_atoms)?;
        writeln!(f, "Bonds:     {}", self.bonds)?;
        if !self.chains.is_empty() {
            let chains: Vec<&str> = self.chains.iter().map(String::as_str).collect();
            writeln!(f, "Chains:    {}", chains.join(", "))?;
        }
        if self.residues > 0 {
            writeln!(f, "Residues:  {}", self.residues)?;
        }
        if self.helix_atoms + self.sheet_atoms > 0 {
            writeln!(
                f,
                "Secondary: {} helix atoms, {} sheet atoms",
                self.helix_atoms, self.sheet_atoms
            )?;
        }
        let elements: Vec<String> = self
            .elements
            .iter()
            .map(|(element, count)| format!("{element}:{count}"))
            .collect();
        write!(f, "Elements:  {}", elements.join(" "))
    }
}

pub fn run(args: InfoArgs) -> Result<()> {
    let mut viewer = Viewer::default();
    let id = load_structure(&mut viewer, &args.input)?;
    let summary = StructureSummary::of(viewer.model(Some(id))?);
    info!(atoms = summary.atoms, bonds = summary.bonds, "Structure summarized");

    println!("{}", args.input.input.display());
    println!("{summary}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::*;
    use molview::core::io::format::Format;

    fn summarize(data: &str, format: Format) -> StructureSummary {
        let mut viewer = Viewer::default();
        let id = viewer.add_model(data, format).unwrap();
        StructureSummary::of(viewer.model(Some(id)).unwrap())
    }

    #[test]
    fn counts_chains_residues_and_elements() {
        let summary = summarize(DIPEPTIDE_PDB, Format::Pdb);
        assert_eq!(summary.atoms, 5);
        assert_eq!(summary.hetero_atoms, 1);
        assert_eq!(summary.residues, 3);
        assert_eq!(
            summary.chains.iter().map(String::as_str).collect::<Vec<_>>(),
            ["A", "B"]
        );
        assert_eq!(summary.elements.get("C"), Some(&2));
        assert_eq!(summary.elements.get("N"), Some(&2));
        assert_eq!(summary.elements.get("O"), Some(&1));
    }

    #[test]
    fn chainless_structures_omit_chain_lines() {
        let summary = summarize("2\nCO\nC 0.0 0.0 0.0\nO 1.13 0.0 0.0\n", Format::Xyz);
        assert!(summary.chains.is_empty());
        let text = summary.to_string();
        assert!(!text.contains("Chains:"));
        assert!(text.contains("Atoms:     2 (0 hetero)"));
        assert!(text.ends_with("Elements:  C:1 O:1"));
    }

    #[test]
    fn run_prints_a_summary_for_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "dipeptide.pdb", DIPEPTIDE_PDB);
        let args = InfoArgs {
            input: crate::cli::InputArgs {
                input: path,
                format: None,
            },
        };
        assert!(run(args).is_ok());
    }
}
