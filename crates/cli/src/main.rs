#![deny(unsafe_code)]
//! CLI for inspecting segfx passes, background crops and effect configs.
//!
//! Subcommands:
//! - `list` -- print the available passes and blur kinds
//! - `shader <pass>` -- print the assembled GLSL for a pass
//! - `crop` -- print the centred crop of a background image
//! - `config` -- validate and print an effect configuration

mod error;

use clap::{Parser, Subcommand, ValueEnum};
use error::CliError;
use segfx_core::effects::fit_background;
use segfx_core::{BlurKind, EffectConfig, PassKind, ShaderType};
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "segfx", about = "Camera segmentation effects toolkit")]
struct Cli {
    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputType {
    /// External camera texture (`samplerExternalOES`).
    Oes,
    /// Ordinary 2D texture.
    Rgb,
}

impl From<InputType> for ShaderType {
    fn from(t: InputType) -> Self {
        match t {
            InputType::Oes => ShaderType::Oes,
            InputType::Rgb => ShaderType::Rgb,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List the available passes and blur kinds.
    List,
    /// Print the vertex and fragment shader a pass compiles.
    Shader {
        /// Pass name (see `list`).
        pass: String,

        /// Input texture type the fragment shader samples.
        #[arg(long = "type", value_enum, default_value_t = InputType::Oes)]
        input_type: InputType,
    },
    /// Print the centred crop that fits an image to a target aspect ratio.
    Crop {
        /// Image size as WIDTHxHEIGHT.
        #[arg(long, value_parser = parse_dims)]
        image: (u32, u32),

        /// Target size as WIDTHxHEIGHT.
        #[arg(long, value_parser = parse_dims)]
        target: (u32, u32),
    },
    /// Validate an effect config and print it with defaults filled in.
    Config {
        /// Parameters as a JSON string.
        #[arg(long, conflicts_with = "file")]
        params: Option<String>,

        /// Path to a JSON file with parameters.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn parse_dims(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|e| format!("bad dimension {v:?}: {e}"))
    };
    Ok((parse(w)?, parse(h)?))
}

fn load_params(params: Option<String>, file: Option<PathBuf>) -> Result<serde_json::Value, CliError> {
    let text = match (params, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .map_err(|e| CliError::Io(format!("cannot read {}: {e}", path.display())))?,
        (None, None) => "{}".to_owned(),
    };
    serde_json::from_str(&text).map_err(|e| CliError::Input(format!("invalid params JSON: {e}")))
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::List => {
            let passes: Vec<&str> = PassKind::all().iter().map(|p| p.name()).collect();
            let blurs = [BlurKind::Gaussian.name(), BlurKind::Box.name()];
            if cli.json {
                let info = serde_json::json!({
                    "passes": passes,
                    "blur_kinds": blurs,
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("Passes:");
                for name in passes {
                    println!("  {name}");
                }
                println!("Blur kinds:");
                println!("  {}", blurs.join(", "));
            }
        }
        Command::Shader { pass, input_type } => {
            let kind = PassKind::from_name(&pass)
                .ok_or_else(|| CliError::Input(format!("unknown pass: {pass}")))?;
            let (vertex, fragment) = kind.program_sources(input_type.into());
            debug!(pass = kind.name(), "assembled shader sources");
            if cli.json {
                let info = serde_json::json!({
                    "pass": kind.name(),
                    "vertex": vertex,
                    "fragment": fragment,
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("// vertex\n{vertex}");
                println!("// fragment\n{fragment}");
            }
        }
        Command::Crop { image, target } => {
            let rect = fit_background(image.0, image.1, target.0, target.1)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&rect)?);
            } else {
                println!(
                    "crop {}x{} at ({}, {}) from {}x{} for {}x{}",
                    rect.width, rect.height, rect.x, rect.y, image.0, image.1, target.0, target.1
                );
            }
        }
        Command::Config { params, file } => {
            let params = load_params(params, file)?;
            let config = EffectConfig::from_json(&params)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("enabled:           {}", config.enabled);
                println!("blur_radius:       {}", config.blur_radius);
                println!("downsample_factor: {}", config.downsample_factor);
                println!("mask_blur_radius:  {}", config.mask_blur_radius);
                println!("background_blur:   {}", config.background_blur.name());
            }
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json_mode = cli.json;
    if let Err(e) = run(cli) {
        if json_mode {
            let j = serde_json::json!({"error": e.to_string(), "exit_code": e.exit_code()});
            eprintln!("{}", serde_json::to_string_pretty(&j).unwrap_or_default());
        } else {
            eprintln!("error: {e}");
        }
        process::exit(e.exit_code());
    }
}
