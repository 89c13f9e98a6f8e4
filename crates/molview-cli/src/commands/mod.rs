pub mod info;
pub mod select;
pub mod surface;

use crate::cli::InputArgs;
use crate::error::{CliError, Result};
use molview::core::io::format::Format;
use molview::core::models::ids::ModelId;
use molview::engine::error::EngineError;
use molview::viewer::Viewer;
use tracing::info;

/// Reads `input` and adds it to `viewer` as a new model.
pub fn load_structure(viewer: &mut Viewer, input: &InputArgs) -> Result<ModelId> {
    let path = &input.input;
    let format = input
        .format
        .or_else(|| Format::from_path(path))
        .ok_or_else(|| {
            CliError::Argument(format!(
                "Cannot infer the format of '{}'. Pass --format explicitly.",
                path.display()
            ))
        })?;

    info!("Loading {} structure from {:?}", format, path);
    let data = std::fs::read_to_string(path)?;
    viewer.add_model(&data, format).map_err(|e| match e {
        EngineError::InvalidFormat(source) => CliError::FileParsing {
            path: path.clone(),
            source: source.into(),
        },
        other => other.into(),
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::{Path, PathBuf};

    pub const DIPEPTIDE_PDB: &str = "\
ATOM      1  N   ALA A   1       0.000   0.000   0.000  1.00  0.00           N
ATOM      2  CA  ALA A   1       1.458   0.000   0.000  1.00  0.00           C
ATOM      3  C   ALA A   1       2.009   1.420   0.000  1.00  0.00           C
ATOM      4  N   GLY B   2       3.300   1.600   0.000  1.00  0.00           N
HETATM    5  O   HOH B 101       6.000   4.000   0.000  1.00  0.00           O
END
";

    pub fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}
