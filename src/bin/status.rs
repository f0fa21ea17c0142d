//! LVFace environment status report.
//!
//! Checks whether this machine is ready to run LVFace inference:
//! - which ONNX Runtime execution providers are available
//! - which ONNX Runtime library was loaded
//! - whether the configured model file is present (with its SHA-256)
//! - where CUDA runtime libraries were found
//!
//! ## Usage
//!
//! ```bash
//! lvface-status
//! lvface-status --model ./models/LVFace-B_Glint360K.onnx --python-env ./venv
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use lvface::status::StatusReport;
use lvface::{logging, Config};

#[derive(Default)]
struct StatusArgs {
    model: Option<PathBuf>,
    python_env: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = parse_args();

    if let Err(e) = logging::init(None) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            println!("❌ {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(args: StatusArgs) -> Result<bool> {
    let config = match &args.config_path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };

    let model_path = args.model.unwrap_or(config.model_path);

    // Default to the virtual environment of the calling shell, if any
    let python_env = args
        .python_env
        .or_else(|| std::env::var_os("VIRTUAL_ENV").map(PathBuf::from));

    let report = StatusReport::collect(
        &model_path,
        python_env.as_deref(),
        config.backend.runtime_library.as_deref(),
    );
    info!(
        model_found = report.model.exists(),
        cpu_ready = report.cpu_ready(),
        gpu_ready = report.gpu_ready(),
        cuda_dirs = report.cuda_library_dirs.len(),
        "Status collected"
    );

    print!("{}", report);
    Ok(report.cpu_ready() || report.gpu_ready())
}

fn parse_args() -> StatusArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = StatusArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--model" | "-m" => {
                if i + 1 < args.len() {
                    parsed.model = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --model requires a path argument");
                    std::process::exit(1);
                }
            }
            "--python-env" | "-p" => {
                if i + 1 < args.len() {
                    parsed.python_env = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --python-env requires a path argument");
                    std::process::exit(1);
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"lvface-status - Check LVFace inference readiness

USAGE:
    lvface-status [OPTIONS]

OPTIONS:
    --model, -m PATH        Model file to check (default: from config)
    --python-env, -p DIR    Python environment with pip-installed NVIDIA
                            libraries (default: $VIRTUAL_ENV)
    --config, -c PATH       Path to config file
    --help, -h              Show this help message

ENVIRONMENT:
    LVFACE_CONFIG           Path to config file (overrides default location)
    LVFACE_LOG              Log level (trace, debug, info, warn, error)
    CUDA_PATH               CUDA toolkit root, searched for libraries
    ORT_DYLIB_PATH          ONNX Runtime shared library to load

Exits 0 when the model file is present and ONNX Runtime loads, 1 otherwise."#
    );
}
