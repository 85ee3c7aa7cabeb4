use carto_dds::config::{self, ExportConfig, ToolsConfig};
use carto_dds::orchestrate::CancelToken;
use carto_dds::pipeline::{PipelineEvent, PipelineOutcome, RunOptions, run_pipeline};
use carto_dds::render::{CompositorRenderer, LayerSourceKind, Project};
use carto_dds::tools::SystemToolRunner;
use carto_dds::types::{Extent, HideRule, LevelPolicy, RenderRequest, TextureFormat};
use carto_dds::{output, plan, visibility};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "carto-dds")]
#[command(about = "Render a map project into a mip-mapped DDS texture")]
#[command(long_about = "\
Render a map project into a mip-mapped DDS texture

The project extent is rendered once per mip level, each level half the size
of the previous one. Layers can be hidden from a given level onward so small
levels stay readable. The images are assembled and compressed with
DirectXTex (texassemble + texconv).

Files:

  my-map/
  ├── config.toml        # Export settings (carto-dds gen-config)
  ├── project.toml       # Layers, CRS, canvas state
  └── rasters/           # Georeferenced layer images

Run 'carto-dds gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing config.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    /// Show debug diagnostics (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Overrides for `config.toml`, shared by `export` and `plan`.
#[derive(clap::Args, Clone)]
struct ExportArgs {
    /// Project file
    project: PathBuf,

    /// Render extent as xmin,ymin,xmax,ymax (default: project extent)
    #[arg(long, allow_hyphen_values = true)]
    extent: Option<Extent>,

    /// Square base size preset
    #[arg(long)]
    size: Option<u32>,

    /// Custom base width
    #[arg(long)]
    width: Option<u32>,

    /// Custom base height
    #[arg(long)]
    height: Option<u32>,

    /// bc7 | bc1 | bc3 | rgba8
    #[arg(long)]
    format: Option<TextureFormat>,

    /// auto | none | total level count
    #[arg(long)]
    levels: Option<LevelPolicy>,

    /// Drop levels whose width or height falls below this
    #[arg(long)]
    min_dimension: Option<u32>,

    /// Hide layers from a level onward: LEVEL=id[,id...] (repeatable)
    #[arg(long = "hide", value_name = "LEVEL=IDS")]
    hide: Vec<HideRule>,

    /// Candidate layers: canvas (checked layers) or project (all layers)
    #[arg(long, default_value = "canvas")]
    layers: LayerSourceKind,

    /// Output folder
    #[arg(long)]
    folder: Option<PathBuf>,

    /// Output file name (.dds is appended)
    #[arg(long)]
    filename: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Render, assemble, compress and save the texture
    Export {
        #[command(flatten)]
        args: ExportArgs,

        /// Path to texassemble
        #[arg(long)]
        texassemble: Option<String>,

        /// Path to texconv
        #[arg(long)]
        texconv: Option<String>,

        /// Remember the tool paths in config.toml
        #[arg(long)]
        save_tools: bool,
    },
    /// Show the mip levels and visible layers without rendering
    Plan {
        #[command(flatten)]
        args: ExportArgs,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the candidate layers of a project
    Layers {
        /// Project file
        project: PathBuf,

        /// canvas (checked layers) or project (all layers)
        #[arg(long, default_value = "canvas")]
        layers: LayerSourceKind,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Export {
            args,
            texassemble,
            texconv,
            save_tools,
        } => {
            let mut config = load_with_overrides(&cli.config_dir, &args)?;
            if let Some(path) = texassemble {
                config.tools.texassemble = path;
            }
            if let Some(path) = texconv {
                config.tools.texconv = path;
            }
            let tools = config.tools.resolve();
            if save_tools {
                tools.validate()?;
                let saved = config::save_tool_paths(
                    &cli.config_dir,
                    &ToolsConfig {
                        texassemble: tools.assembler.display().to_string(),
                        texconv: tools.compressor.display().to_string(),
                    },
                )?;
                println!("Tool paths saved to {}", saved.display());
            }

            let project = Project::load(&args.project)?;
            let request = build_request(&config, &project, &args)?;
            init_thread_pool(&config.render);
            let renderer = CompositorRenderer::new(project).parallel(config.render.parallel);

            let cancel = CancelToken::new();
            let handler_token = cancel.clone();
            ctrlc::set_handler(move || handler_token.cancel())
                .map_err(|e| format!("Failed to set Ctrl-C handler: {e}"))?;

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    if let PipelineEvent::Progress { step, total } = event {
                        debug!(percent = output::progress_percent(step, total), "progress");
                        continue;
                    }
                    for line in output::format_event(&event) {
                        println!("{}", line);
                    }
                }
            });

            let options = RunOptions {
                cancel,
                events: Some(tx),
                temp_root: config.output.temp_dir.clone(),
            };
            let result = run_pipeline(
                &request,
                &tools,
                &renderer,
                &SystemToolRunner,
                &options,
            );
            drop(options);
            printer.join().map_err(|_| "output thread panicked")?;

            match result {
                Ok(PipelineOutcome::Completed(_)) => {}
                Ok(PipelineOutcome::Cancelled) => std::process::exit(130),
                Err(e) => {
                    for line in output::format_error(&e) {
                        eprintln!("{}", line);
                    }
                    std::process::exit(1);
                }
            }
        }
        Command::Plan { args, json } => {
            let config = load_with_overrides(&cli.config_dir, &args)?;
            let project = Project::load(&args.project)?;
            let request = build_request(&config, &project, &args)?;
            request.validate()?;

            let mut levels = plan::plan_levels(
                request.base_width,
                request.base_height,
                request.levels,
                request.min_dimension,
            );
            for level in &mut levels {
                level.visible_layers =
                    visibility::resolve(&request.hide_rules, &request.layers, level.index);
            }

            if json {
                println!("{}", output::plan_json(&levels)?);
            } else {
                output::print_plan(request.levels, &levels, &request.destination);
            }
        }
        Command::Layers { project, layers } => {
            let project = Project::load(&project)?;
            let ids = layers.source(&project).layer_ids();
            output::print_layers(&project, &ids);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Stderr diagnostics. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "carto_dds=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on render config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(render: &config::RenderConfig) {
    let threads = config::effective_threads(render);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// `config.toml` with command-line values applied on top, re-validated.
fn load_with_overrides(config_dir: &Path, args: &ExportArgs) -> Result<ExportConfig, Box<dyn Error>> {
    let mut config = config::load_config(config_dir)?;
    let texture = &mut config.texture;
    if let Some(size) = args.size {
        texture.size = size;
    }
    if args.width.is_some() {
        texture.width = args.width;
    }
    if args.height.is_some() {
        texture.height = args.height;
    }
    if let Some(format) = args.format {
        texture.format = format;
    }
    if let Some(levels) = args.levels {
        texture.levels = levels;
    }
    if let Some(min) = args.min_dimension {
        texture.min_dimension = min;
    }
    config.hide.extend(args.hide.iter().cloned());
    if let Some(folder) = &args.folder {
        config.output.folder = folder.clone();
    }
    if let Some(filename) = &args.filename {
        config.output.filename = filename.clone();
    }
    config.validate()?;
    Ok(config)
}

fn build_request(
    config: &ExportConfig,
    project: &Project,
    args: &ExportArgs,
) -> Result<RenderRequest, Box<dyn Error>> {
    let extent = args
        .extent
        .or(project.extent)
        .or_else(|| project.full_extent())
        .ok_or("no render extent: pass --extent or set one in the project")?;
    let (base_width, base_height) = config.texture.base_size();

    Ok(RenderRequest {
        extent,
        base_width,
        base_height,
        levels: config.texture.levels,
        min_dimension: config.texture.min_dimension,
        format: config.texture.format,
        hide_rules: config.hide.clone(),
        layers: args.layers.candidates(project)?,
        crs: project.crs.clone(),
        background: project.background,
        destination: config.destination(),
    })
}
