use super::load_structure;
use crate::cli::SelectArgs;
use crate::error::Result;
use crate::utils::parser::parse_selection;
use molview::core::models::atom::Atom;
use molview::viewer::Viewer;
use tracing::{info, warn};

fn describe(atom: &Atom) -> String {
    let icode = atom.insertion_code.map(String::from).unwrap_or_default();
    format!(
        "{:>6} {:<4} {:>3} {:>1}{:>4}{:<1} {:<2} {:>8.3} {:>8.3} {:>8.3}",
        atom.serial,
        atom.name,
        atom.residue_name,
        atom.chain,
        atom.residue_index,
        icode,
        atom.element,
        atom.position.x,
        atom.position.y,
        atom.position.z
    )
}

pub fn run(args: SelectArgs) -> Result<()> {
    let selection = parse_selection(&args.selection)?;
    let mut viewer = Viewer::default();
    let model = load_structure(&mut viewer, &args.input)?;

    let matched = viewer.selected_atoms(&selection);
    let total = viewer.model(Some(model))?.len();
    info!(matched = matched.len(), total, "Selection evaluated");
    println!("{} of {} atoms selected.", matched.len(), total);

    if args.list {
        for (model, atom) in &matched {
            if let Some(atom) = viewer.atom(*model, *atom) {
                println!("{}", describe(atom));
            }
        }
    }

    if let Some(output) = &args.output {
        if matched.is_empty() {
            warn!("Selection matched no atoms; writing an empty PDB file.");
        }
        std::fs::write(output, viewer.pdb_data(&selection))?;
        println!("✓ Selected atoms written to: {}", output.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::InputArgs;
    use crate::commands::fixtures::*;
    use crate::error::CliError;
    use molview::core::io::format::Format;
    use std::path::Path;

    fn args(input: &Path, selection: &[&str], output: Option<&Path>) -> SelectArgs {
        SelectArgs {
            input: InputArgs {
                input: input.to_path_buf(),
                format: None,
            },
            selection: selection.iter().map(|s| s.to_string()).collect(),
            output: output.map(Path::to_path_buf),
            list: true,
        }
    }

    #[test]
    fn writes_only_the_selected_atoms() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "dipeptide.pdb", DIPEPTIDE_PDB);
        let output = dir.path().join("chain_a.pdb");

        run(args(&input, &["chain=A"], Some(&output))).unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        let mut viewer = Viewer::default();
        let id = viewer.add_model(&written, Format::Pdb).unwrap();
        let model = viewer.model(Some(id)).unwrap();
        assert_eq!(model.len(), 3);
        assert!(model.atoms().all(|(_, a)| a.chain == "A"));
    }

    #[test]
    fn invalid_terms_fail_before_loading() {
        let result = run(args(Path::new("/nonexistent.pdb"), &["chain"], None));
        assert!(matches!(result, Err(CliError::Selection(_))));
    }

    #[test]
    fn atom_lines_show_residue_and_coordinates() {
        let mut viewer = Viewer::default();
        let id = viewer.add_model(DIPEPTIDE_PDB, Format::Pdb).unwrap();
        let model = viewer.model(Some(id)).unwrap();
        let (_, ca) = model.atoms().find(|(_, a)| a.name == "CA").unwrap();
        let line = describe(ca);
        assert!(line.contains("CA"));
        assert!(line.contains("ALA A   1"));
        assert!(line.ends_with("1.458    0.000    0.000"));
    }
}
