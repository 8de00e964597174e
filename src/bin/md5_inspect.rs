use anyhow::{anyhow, Result};
use merlin_engine::animation::skinning;
use merlin_engine::material::DEFAULT_COLOR;
use merlin_engine::md5::{Md5Anim, Md5Model};
use merlin_engine::mesh::{SkinnedMesh, MAX_WEIGHTS};
use std::env;
use std::path::PathBuf;
use std::process;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("md5_inspect error: {err:?}");
        process::exit(1);
    }
}

struct CliOptions {
    mesh: Option<PathBuf>,
    anim: Option<PathBuf>,
    verbose: bool,
    show_help: bool,
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = parse_cli_args(&args)?;
    if options.show_help {
        print_usage();
        return Ok(());
    }
    let Some(mesh_path) = options.mesh else {
        print_usage();
        return Err(anyhow!("--mesh <path> is required"));
    };

    let model = Md5Model::load(&mesh_path)?;
    println!("model {} (MD5Version {})", mesh_path.display(), model.header.version);
    println!("  {} joints, {} meshes", model.joints.len(), model.meshes.len());
    if options.verbose {
        for (index, joint) in model.joints.iter().enumerate() {
            println!(
                "  joint {index:3} `{}` parent {} at ({:.3} {:.3} {:.3})",
                joint.name,
                joint.parent,
                joint.bind_position.x,
                joint.bind_position.y,
                joint.bind_position.z
            );
        }
    }
    for (index, mesh) in model.meshes.iter().enumerate() {
        let over_limit =
            mesh.vertices.iter().filter(|vertex| vertex.weight_count > MAX_WEIGHTS).count();
        println!(
            "  mesh {index}: {} verts, {} tris, {} weights, shader {}",
            mesh.vertices.len(),
            mesh.triangles.len(),
            mesh.weights.len(),
            mesh.texture.as_deref().unwrap_or("(none)")
        );
        if over_limit > 0 {
            println!("    {over_limit} verts carry more than {MAX_WEIGHTS} weights (buffers truncate)");
        }
    }

    match options.anim {
        Some(anim_path) => {
            let anim = Md5Anim::load(&anim_path)?;
            println!("anim {} (MD5Version {})", anim_path.display(), anim.header.version);
            println!(
                "  {} frames at {} fps, {} hierarchy entries, {} animated components",
                anim.frames.len(),
                anim.header.frame_rate,
                anim.hierarchy.len(),
                anim.header.num_animated_components
            );
            if options.verbose {
                for entry in &anim.hierarchy {
                    println!(
                        "  joint `{}` flags {:#04x} start {}",
                        entry.name,
                        entry.flags.bits(),
                        entry.start_index
                    );
                }
            }
            let item = skinning::process(model, anim, DEFAULT_COLOR)?;
            println!(
                "resolved {} frames for {} joints",
                item.frame_count(),
                item.inverse_bind_matrices().len()
            );
            report_meshes(item.meshes(), options.verbose);
        }
        None => {
            let meshes = skinning::bind_pose_meshes(&model, DEFAULT_COLOR)?;
            report_meshes(&meshes, options.verbose);
        }
    }
    Ok(())
}

fn report_meshes(meshes: &[SkinnedMesh], verbose: bool) {
    for (index, mesh) in meshes.iter().enumerate() {
        println!(
            "skin mesh {index}: {} verts, {} indices, radius {:.3}",
            mesh.vertices.len(),
            mesh.indices.len(),
            mesh.bounds.radius
        );
        if verbose {
            println!(
                "    bounds ({:.3} {:.3} {:.3}) .. ({:.3} {:.3} {:.3}), material {}",
                mesh.bounds.min.x,
                mesh.bounds.min.y,
                mesh.bounds.min.z,
                mesh.bounds.max.x,
                mesh.bounds.max.y,
                mesh.bounds.max.z,
                if mesh.material.is_textured() { "textured" } else { "flat color" }
            );
        }
    }
}

fn print_usage() {
    eprintln!(
        "MD5 Inspect

Usage:
  md5_inspect --mesh <path.md5mesh> [--anim <path.md5anim>] [--verbose]

Parses the mesh (and animation, when given), resolves the animation
frames, and prints joint/mesh/frame summaries. --verbose adds per-joint
and per-mesh detail.
"
    );
}

fn parse_cli_args(args: &[String]) -> Result<CliOptions> {
    let mut options = CliOptions { mesh: None, anim: None, verbose: false, show_help: false };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--mesh" => {
                let value = iter.next().ok_or_else(|| anyhow!("--mesh expects a path"))?;
                options.mesh = Some(PathBuf::from(value));
            }
            "--anim" => {
                let value = iter.next().ok_or_else(|| anyhow!("--anim expects a path"))?;
                options.anim = Some(PathBuf::from(value));
            }
            "--verbose" | "-v" => options.verbose = true,
            "--help" | "-h" => options.show_help = true,
            other => return Err(anyhow!("unknown argument '{other}'")),
        }
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_args_reads_paths_and_flags() {
        let args: Vec<String> =
            ["--mesh", "a.md5mesh", "--anim", "a.md5anim", "--verbose"].iter().map(|s| s.to_string()).collect();
        let options = parse_cli_args(&args).expect("parse args");
        assert_eq!(options.mesh.as_deref(), Some(std::path::Path::new("a.md5mesh")));
        assert_eq!(options.anim.as_deref(), Some(std::path::Path::new("a.md5anim")));
        assert!(options.verbose);
        assert!(!options.show_help);
    }

    #[test]
    fn parse_args_errors_on_missing_value() {
        let args = vec!["--mesh".to_string()];
        assert!(parse_cli_args(&args).is_err());
    }

    #[test]
    fn parse_args_errors_on_unknown_flag() {
        let args = vec!["--frames".to_string()];
        assert!(parse_cli_args(&args).is_err());
    }
}
