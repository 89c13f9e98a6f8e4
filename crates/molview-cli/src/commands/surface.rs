use super::load_structure;
use crate::cli::SurfaceArgs;
use crate::config::PartialViewerConfig;
use crate::error::{CliError, Result};
use crate::utils::parser::parse_selection;
use crate::utils::progress::CliProgressHandler;
use molview::core::io::obj::ObjFile;
use molview::engine::job::SurfaceStatus;
use molview::viewer::{SurfaceRequest, Viewer};
use tracing::{info, warn};

pub fn run(args: SurfaceArgs, progress: CliProgressHandler) -> Result<()> {
    let display = parse_selection(&args.display)?;
    let context = parse_selection(&args.context)?;
    let focus = if args.focus.is_empty() {
        None
    } else {
        Some(parse_selection(&args.focus)?)
    };

    info!("Merging configuration from file and CLI arguments...");
    let config = PartialViewerConfig::load(&args)?.merge_with_cli(&args)?;
    let surface_config = config.viewer.surface;

    let mut viewer = Viewer::with_reporter(config.viewer, progress.reporter());
    load_structure(&mut viewer, &args.input)?;

    let mut request = SurfaceRequest::new(args.surface_type)
        .material(config.material)
        .display(display)
        .context(context);
    if let Some(focus) = focus {
        request = request.focus(focus);
    }

    println!(
        "Extracting {} surface (probe {:.2} Å, grid {:.2} Å, {} mode)...",
        args.surface_type, surface_config.probe_radius, surface_config.resolution, surface_config.mode
    );
    let id = viewer.add_surface_with(request)?;
    let status = viewer.wait_for_surface(id)?;
    if status != SurfaceStatus::Ready {
        return Err(CliError::Other(anyhow::anyhow!(
            "Surface {} finished as {:?} instead of ready",
            id,
            status
        )));
    }
    let mesh = viewer
        .surface_mesh(id)?
        .ok_or_else(|| CliError::Other(anyhow::anyhow!("Surface {} has no mesh", id)))?;

    if mesh.is_empty() {
        warn!("The extracted surface is empty; check the display and context selections.");
        println!("Warning: the extracted surface has no triangles.");
    }

    ObjFile::write_mesh_to_path(&args.surface_type.to_string(), &mesh, &args.output)?;
    info!(
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "Surface written to {:?}",
        &args.output
    );
    println!(
        "✓ {} vertices, {} triangles, {:.1} Å² written to: {}",
        mesh.vertex_count(),
        mesh.triangle_count(),
        mesh.area(),
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::commands::fixtures::*;
    use clap::Parser;

    const CO_XYZ: &str = "2\ncarbon monoxide\nC 0.0 0.0 0.0\nO 1.13 0.0 0.0\n";

    fn surface_args(argv: &[&str]) -> SurfaceArgs {
        let mut full = vec!["molview", "surface"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Surface(args) => args,
            other => panic!("expected the surface subcommand, got {:?}", other),
        }
    }

    fn obj_counts(text: &str) -> (usize, usize) {
        let vertices = text.lines().filter(|l| l.starts_with("v ")).count();
        let faces = text.lines().filter(|l| l.starts_with("f ")).count();
        (vertices, faces)
    }

    #[test]
    fn writes_a_closed_mesh_for_a_small_molecule() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "co.xyz", CO_XYZ);
        let output = dir.path().join("co.obj");
        let (input, output_arg) = (input.to_string_lossy(), output.to_string_lossy());

        run(
            surface_args(&["-i", &input, "-o", &output_arg, "-t", "vdw"]),
            CliProgressHandler::hidden(),
        )
        .unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.contains("o VDW"));
        let (vertices, faces) = obj_counts(&text);
        assert!(vertices > 0);
        assert!(faces > 0);
        assert!(text.contains("vn "));
    }

    #[test]
    fn async_mode_and_display_selection_shrink_the_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "co.xyz", CO_XYZ);
        let full = dir.path().join("full.obj");
        let carbon = dir.path().join("carbon.obj");
        let input = input.to_string_lossy();
        let (full_arg, carbon_arg) = (full.to_string_lossy(), carbon.to_string_lossy());

        run(
            surface_args(&["-i", &input, "-o", &full_arg, "-t", "sas", "--async"]),
            CliProgressHandler::hidden(),
        )
        .unwrap();
        run(
            surface_args(&[
                "-i", &input, "-o", &carbon_arg, "-t", "sas", "--flat-normals", "--display",
                "elem=C",
            ]),
            CliProgressHandler::hidden(),
        )
        .unwrap();

        let (_, full_faces) = obj_counts(&std::fs::read_to_string(&full).unwrap());
        let (_, carbon_faces) = obj_counts(&std::fs::read_to_string(&carbon).unwrap());
        assert!(carbon_faces > 0);
        assert!(carbon_faces < full_faces);
    }

    #[test]
    fn invalid_overrides_are_rejected_before_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "dipeptide.pdb", DIPEPTIDE_PDB);
        let output = dir.path().join("never.obj");
        let (input, output_arg) = (input.to_string_lossy(), output.to_string_lossy());

        let result = run(
            surface_args(&["-i", &input, "-o", &output_arg, "--probe-radius=-1.0"]),
            CliProgressHandler::hidden(),
        );
        assert!(matches!(result, Err(CliError::Config(_))));
        assert!(!output.exists());
    }
}
