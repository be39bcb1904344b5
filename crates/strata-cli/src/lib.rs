//! # Strata CLI
//!
//! Command-line front end for the Strata LOD builder.
//!
//! ## Commands
//! - `build` - Build a hierarchy for a procedural mesh and report each generation
//! - `select` - Build a hierarchy, then cut it for a grid of instances

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use glam::Vec3;
use serde::Serialize;
use strata_lod::instance::DEFAULT_INSTANCE_SPACING;
use strata_lod::{
    GenerationSummary, HierarchyConfig, InstanceParams, LodHierarchy, LodHierarchyBuilder, Mesh,
    Selection, ViewState, grid_instances, primitives,
};

/// Strata LOD CLI
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Procedural source meshes
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MeshKind {
    /// Latitude/longitude sphere
    Sphere,
    /// Open wave terrain
    Grid,
    /// 20-triangle icosahedron
    Icosahedron,
}

/// Options shared by every command that builds a hierarchy
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Source mesh
    #[arg(short, long, value_enum, default_value_t = MeshKind::Sphere)]
    pub mesh: MeshKind,

    /// Slices of the sphere or cells per side of the grid
    #[arg(short, long, default_value_t = 100)]
    pub resolution: u32,

    /// Hierarchy configuration (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the generation budget
    #[arg(long)]
    pub max_generations: Option<u32>,

    /// Assign debug colours to clusters
    #[arg(long)]
    pub debug_colors: bool,

    /// Print the report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Build a hierarchy and report its generations
    Build {
        #[command(flatten)]
        build: BuildArgs,
    },

    /// Build a hierarchy and select clusters for a grid of instances
    Select {
        #[command(flatten)]
        build: BuildArgs,

        /// Camera distance from the instance grid
        #[arg(short, long, default_value_t = 50.0)]
        distance: f32,

        /// Error threshold in pixels
        #[arg(short, long, default_value_t = InstanceParams::DEFAULT_ERROR_THRESHOLD)]
        threshold: f32,

        /// Number of instances
        #[arg(short = 'n', long, default_value_t = 1)]
        instances: usize,

        /// Instances per grid row
        #[arg(long, default_value_t = 3)]
        row_len: usize,

        /// Distance between neighbouring instances
        #[arg(long, default_value_t = DEFAULT_INSTANCE_SPACING)]
        spacing: f32,

        /// Viewport width in pixels
        #[arg(long, default_value_t = 1920.0)]
        width: f32,

        /// Horizontal field of view in degrees
        #[arg(long, default_value_t = 60.0)]
        fov: f32,
    },
}

#[derive(Serialize)]
struct BuildReport<'a> {
    mesh_triangles: usize,
    mesh_extent: [f32; 3],
    clusters: usize,
    roots: usize,
    generations: &'a [GenerationSummary],
}

#[derive(Serialize)]
struct InstanceReport {
    position: [f32; 3],
    clusters: usize,
    triangles: usize,
    vertex_count: usize,
    average_generation: f32,
}

impl InstanceReport {
    fn new(instance: &InstanceParams, selection: &Selection) -> Self {
        Self {
            position: instance.position.to_array(),
            clusters: selection.clusters.len(),
            triangles: selection.triangle_count(),
            vertex_count: selection.vertex_count,
            average_generation: selection.average_generation,
        }
    }
}

/// Source mesh for `kind` at `resolution`
pub fn make_mesh(kind: MeshKind, resolution: u32) -> Mesh {
    match kind {
        MeshKind::Sphere => primitives::uv_sphere(1.0, resolution, resolution / 2 + 1),
        MeshKind::Grid => primitives::wave_terrain(resolution, 2.0),
        MeshKind::Icosahedron => primitives::icosahedron(1.0),
    }
}

/// Configuration from `path` (defaults when absent) with command-line overrides applied
pub fn load_config(args: &BuildArgs) -> Result<HierarchyConfig> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => HierarchyConfig::default(),
    };
    if let Some(max_generations) = args.max_generations {
        config.max_generations = max_generations;
    }
    config.debug_colors |= args.debug_colors;
    Ok(config)
}

fn read_config(path: &Path) -> Result<HierarchyConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    HierarchyConfig::from_json(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn build_hierarchy(args: &BuildArgs) -> Result<(Mesh, LodHierarchy)> {
    let config = load_config(args)?;
    let mesh = make_mesh(args.mesh, args.resolution);
    log::info!(
        "Building {:?} mesh: {} triangles, {} vertices",
        args.mesh,
        mesh.triangle_count(),
        mesh.vertex_count()
    );

    let hierarchy = LodHierarchyBuilder::new(config)
        .build(&mesh)
        .context("hierarchy construction failed")?;
    Ok((mesh, hierarchy))
}

fn report_build(mesh: &Mesh, hierarchy: &LodHierarchy, json: bool) -> Result<()> {
    let report = BuildReport {
        mesh_triangles: mesh.triangle_count(),
        mesh_extent: mesh.bounds().size().to_array(),
        clusters: hierarchy.clusters().len(),
        roots: hierarchy.roots().count(),
        generations: hierarchy.generations(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for summary in report.generations {
        log::info!(
            "  Generation {}: {} clusters, {} triangles, {} groups, error {:.6}",
            summary.index,
            summary.cluster_range.len(),
            summary.triangle_count,
            summary.group_count,
            summary.error
        );
    }
    log::info!(
        "{} clusters, {} roots, mesh extent {:?}",
        report.clusters,
        report.roots,
        report.mesh_extent
    );
    Ok(())
}

/// Execute the CLI command
pub fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    match cli.command {
        Commands::Build { build } => {
            let (mesh, hierarchy) = build_hierarchy(&build)?;
            report_build(&mesh, &hierarchy, build.json)?;
        }

        Commands::Select {
            build,
            distance,
            threshold,
            instances,
            row_len,
            spacing,
            width,
            fov,
        } => {
            let (mesh, hierarchy) = build_hierarchy(&build)?;
            report_build(&mesh, &hierarchy, false)?;

            let instances = grid_instances(instances, row_len, spacing, 1.0, threshold);
            let view = camera_for(&instances, distance, width, fov.to_radians());
            let selections = hierarchy.select_instances(&view, &instances);

            let reports: Vec<InstanceReport> = instances
                .iter()
                .zip(&selections)
                .map(|(instance, selection)| InstanceReport::new(instance, selection))
                .collect();

            if build.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                log::info!("Selection at distance {distance}, threshold {threshold}px:");
                for report in &reports {
                    log::info!(
                        "  Instance at {:?}: {} clusters, {} triangles, {} vertices, average generation {:.2}",
                        report.position,
                        report.clusters,
                        report.triangles,
                        report.vertex_count,
                        report.average_generation
                    );
                }
            }
        }
    }

    Ok(())
}

/// Camera `distance` units in front of the centre of `instances`, looking at it
pub fn camera_for(instances: &[InstanceParams], distance: f32, width: f32, fov: f32) -> ViewState {
    let center = if instances.is_empty() {
        Vec3::ZERO
    } else {
        instances.iter().map(|instance| instance.position).sum::<Vec3>() / instances.len() as f32
    };
    ViewState::look_at(center + Vec3::Z * distance, center, width, fov)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::parse_from(["strata", "build"]);
        match cli.command {
            Commands::Build { build } => {
                assert_eq!(build.mesh, MeshKind::Sphere);
                assert_eq!(build.resolution, 100);
                assert!(build.config.is_none());
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_select_command() {
        let cli = Cli::parse_from([
            "strata", "select", "-m", "grid", "-r", "32", "-d", "12.5", "-t", "2", "-n", "6", "--json",
        ]);
        if let Commands::Select {
            build,
            distance,
            threshold,
            instances,
            ..
        } = cli.command
        {
            assert_eq!(build.mesh, MeshKind::Grid);
            assert_eq!(build.resolution, 32);
            assert!(build.json);
            assert_eq!(distance, 12.5);
            assert_eq!(threshold, 2.0);
            assert_eq!(instances, 6);
        } else {
            panic!("Expected Select command");
        }
    }

    #[test]
    fn test_config_overrides() {
        let cli = Cli::parse_from(["strata", "build", "--max-generations", "3", "--debug-colors"]);
        let Commands::Build { build } = cli.command else {
            panic!("Expected Build command");
        };
        let config = load_config(&build).unwrap();
        assert_eq!(config.max_generations, 3);
        assert!(config.debug_colors);
        assert_eq!(config.target_group_size, HierarchyConfig::default().target_group_size);
    }

    #[test]
    fn test_missing_config_file() {
        let cli = Cli::parse_from(["strata", "build", "-c", "/nonexistent/strata.json"]);
        let Commands::Build { build } = cli.command else {
            panic!("Expected Build command");
        };
        assert!(load_config(&build).is_err());
    }

    #[test]
    fn test_make_mesh() {
        assert_eq!(make_mesh(MeshKind::Icosahedron, 7).triangle_count(), 20);
        assert_eq!(make_mesh(MeshKind::Sphere, 100).triangle_count(), 10_000);
        assert_eq!(make_mesh(MeshKind::Grid, 8).triangle_count(), 128);
    }

    #[test]
    fn test_camera_faces_instance_grid() {
        let instances = grid_instances(4, 2, 10.0, 1.0, 1.0);
        let view = camera_for(&instances, 20.0, 1280.0, 1.0);
        let center = view.view.transform_point3(Vec3::new(15.0, -5.0, 0.0));
        assert!((center - Vec3::new(0.0, 0.0, -20.0)).length() < 1e-4);
    }
}
