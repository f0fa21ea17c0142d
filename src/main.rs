use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use lvface::batch::{self, discover_images};
use lvface::benchmark;
use lvface::export::{export_embeddings, ExportFormat};
use lvface::{logging, Config, Embedding, Error, FaceEmbedder, OrtBackend, Verdict};

#[derive(Debug, Default)]
struct Args {
    model: Option<PathBuf>,
    img1: Option<PathBuf>,
    img2: Option<PathBuf>,
    url: Option<String>,
    cpu: bool,
    benchmark: Option<usize>,
    dir: Option<PathBuf>,
    query: Option<PathBuf>,
    top: usize,
    export: Option<PathBuf>,
    format: Option<ExportFormat>,
    config: Option<PathBuf>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        top: 5,
        ..Args::default()
    };

    let value = |i: usize, flag: &str| -> String {
        match args.get(i + 1) {
            Some(v) => v.clone(),
            None => {
                eprintln!("Error: {} requires a value", flag);
                std::process::exit(1);
            }
        }
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("lvface {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--model" | "-m" => {
                parsed.model = Some(PathBuf::from(value(i, "--model")));
                i += 1;
            }
            "--img1" => {
                parsed.img1 = Some(PathBuf::from(value(i, "--img1")));
                i += 1;
            }
            "--img2" => {
                parsed.img2 = Some(PathBuf::from(value(i, "--img2")));
                i += 1;
            }
            "--url" => {
                parsed.url = Some(value(i, "--url"));
                i += 1;
            }
            "--cpu" | "--cpu-only" => parsed.cpu = true,
            "--benchmark" => {
                // Optional run count
                match args.get(i + 1).and_then(|v| v.parse().ok()) {
                    Some(n) => {
                        parsed.benchmark = Some(n);
                        i += 1;
                    }
                    None => parsed.benchmark = Some(5),
                }
            }
            "--dir" => {
                parsed.dir = Some(PathBuf::from(value(i, "--dir")));
                i += 1;
            }
            "--query" => {
                parsed.query = Some(PathBuf::from(value(i, "--query")));
                i += 1;
            }
            "--top" => {
                let raw = value(i, "--top");
                parsed.top = raw.parse().unwrap_or_else(|_| {
                    eprintln!("Error: --top expects a number, got {}", raw);
                    std::process::exit(1);
                });
                i += 1;
            }
            "--export" | "-o" => {
                parsed.export = Some(PathBuf::from(value(i, "--export")));
                i += 1;
            }
            "--format" => {
                let raw = value(i, "--format");
                parsed.format = Some(ExportFormat::parse(&raw).unwrap_or_else(|| {
                    eprintln!("Error: unknown export format {}", raw);
                    std::process::exit(1);
                }));
                i += 1;
            }
            "--config" | "-c" => {
                parsed.config = Some(PathBuf::from(value(i, "--config")));
                i += 1;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
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
        r#"lvface - LVFace face embedding demo

USAGE:
    lvface [OPTIONS]

OPTIONS:
    --model, -m PATH      Path to ONNX model file
    --img1 PATH           First (or only) image
    --img2 PATH           Second image, compared against --img1
    --url URL             Image to fetch and embed
    --cpu, --cpu-only     Force CPU inference (default: try GPU first)
    --benchmark [N]       Time N inference runs (default: 5)
    --dir DIR             Embed every image under DIR
    --query PATH          With --dir, rank DIR images against this face
    --top N               Number of matches to show with --query (default: 5)
    --export, -o PATH     With --dir, write embeddings to PATH
    --format json|csv     Export format (default: from PATH extension)
    --config, -c PATH     Path to config file
    --version, -V         Show version
    --help, -h            Show this help message

ENVIRONMENT:
    LVFACE_CONFIG         Path to config file (overrides default location)
    LVFACE_LOG            Log level (trace, debug, info, warn, error)
    ORT_DYLIB_PATH        ONNX Runtime shared library to load

EXAMPLES:
    lvface --img1 face1.jpg --img2 face2.jpg
    lvface --url https://example.com/face.jpg
    lvface --dir photos/ --query face.jpg --top 10
    lvface --cpu --benchmark 20

See also: lvface-status --help"#
    );
}

fn main() -> ExitCode {
    let args = parse_args();

    if let Err(e) = logging::init(None) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "lvface failed");
            println!("❌ {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let model_path = args.model.clone().unwrap_or_else(|| config.model_path.clone());
    if !model_path.exists() {
        bail!(
            "Model file not found: {}\nDownload an LVFace ONNX model first.",
            model_path.display()
        );
    }

    let has_work = args.img1.is_some()
        || args.url.is_some()
        || args.dir.is_some()
        || args.benchmark.is_some();
    if !has_work {
        println!("❌ Please provide images to process:");
        println!("  --img1 IMAGE_PATH                    (single image)");
        println!("  --img1 IMG1 --img2 IMG2              (compare two images)");
        println!("  --url IMAGE_URL                      (image from URL)");
        println!("  --dir DIR [--query IMG] [-o FILE]    (batch)");
        println!("  --benchmark [N]                      (timing)");
        bail!("nothing to do");
    }

    let model_name = model_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    println!("🚀 Initializing LVFace with model: {}", model_name);

    let prefer_gpu = config.backend.prefer_gpu && !args.cpu;
    let (embedder, device) = create_embedder(&model_path, &config, prefer_gpu)?;
    let mut embedder = embedder
        .with_filter(config.preprocess.filter)
        .with_timeout(Duration::from_secs(config.network.timeout_secs));
    println!("✅ Model loaded on {} ({})", device, embedder.describe());

    if let Some(runs) = args.benchmark {
        run_benchmark(&mut embedder, device, runs)?;
    }

    if let (Some(img1), Some(img2)) = (&args.img1, &args.img2) {
        compare_images(&mut embedder, &config, img1, img2, device)?;
    } else if let Some(img1) = &args.img1 {
        println!("\n📸 Processing single image using {}...", device);
        let start = Instant::now();
        let features = embedder
            .embed_file(img1)
            .with_context(|| format!("Error processing image {}", img1.display()))?;
        println!("✅ Successfully extracted features from {}", img1.display());
        print_features(&features, start.elapsed());
    } else if let Some(url) = &args.url {
        println!("\n🌐 Processing image from URL using {}...", device);
        let start = Instant::now();
        let features = embedder
            .embed_url(url)
            .context("Error processing URL")?;
        println!("✅ Successfully extracted features from URL");
        print_features(&features, start.elapsed());
    }

    if let Some(dir) = &args.dir {
        process_directory(&mut embedder, &config, &model_path, &args, dir)?;
    }

    println!("\n🎉 Demo completed using {}!", device);
    Ok(())
}

/// Try the GPU first when preferred and fall back to CPU if the CUDA
/// provider cannot be initialized.
fn create_embedder(
    model_path: &Path,
    config: &Config,
    prefer_gpu: bool,
) -> Result<(FaceEmbedder<OrtBackend>, &'static str)> {
    if prefer_gpu {
        println!("🚀 Attempting GPU acceleration...");
        match FaceEmbedder::with_options(model_path, &config.backend.gpu()) {
            Ok(embedder) => return Ok((embedder, "GPU")),
            Err(e @ Error::ModelLoad { .. }) => {
                let message = e.full_message();
                tracing::warn!(error = %message, "GPU backend unavailable, falling back to CPU");
                println!("⚠️  GPU failed ({}), falling back to CPU", message);
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("🔄 Using CPU inference...");
    let embedder = FaceEmbedder::with_options(model_path, &config.backend.cpu())
        .context("Failed to load model")?;
    Ok((embedder, "CPU"))
}

fn compare_images(
    embedder: &mut FaceEmbedder<OrtBackend>,
    config: &Config,
    img1: &Path,
    img2: &Path,
    device: &str,
) -> Result<()> {
    println!("\n📸 Comparing two images using {}...", device);
    let start = Instant::now();

    let similarity = embedder
        .compare_files(img1, img2)
        .context("Error processing images")?;
    let elapsed = start.elapsed();

    println!("Image 1: {}", img1.display());
    println!("Image 2: {}", img2.display());
    println!("🎯 Similarity Score: {:.6}", similarity);
    println!("⏱️  Total time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);

    let verdict = Verdict::from_score(similarity, &config.matching.thresholds());
    let mark = match verdict {
        Verdict::SamePerson => "✅",
        Verdict::PossiblySame => "⚠️",
        Verdict::Different => "❌",
    };
    println!("📝 Interpretation: {} {}", verdict, mark);

    Ok(())
}

fn print_features(features: &Embedding, elapsed: Duration) {
    println!("📊 Feature shape: {:?}", features.shape());
    println!("⏱️  Time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
    println!("🔢 Feature sample: {:?}", features.head(5));
}

fn run_benchmark(
    embedder: &mut FaceEmbedder<OrtBackend>,
    device: &str,
    runs: usize,
) -> Result<()> {
    println!("\n📊 Benchmarking {} inference ({} runs)...", device, runs);

    let result = benchmark::run(embedder, runs).context("Benchmark failed")?;
    for (i, elapsed) in result.runs.iter().enumerate() {
        println!("  Run {}: {:.2}ms", i + 1, elapsed.as_secs_f64() * 1000.0);
    }

    println!(
        "\n⚡ Average {} inference time: {:.2}ms ({:.1} images/s)",
        device,
        result.average().as_secs_f64() * 1000.0,
        result.images_per_second()
    );
    println!("🔢 Feature shape: {:?}", result.embedding_shape);
    Ok(())
}

fn process_directory(
    embedder: &mut FaceEmbedder<OrtBackend>,
    config: &Config,
    model_path: &Path,
    args: &Args,
    dir: &Path,
) -> Result<()> {
    let discovery = discover_images(dir, &config.batch.image_extensions);
    println!("\n🗂️  Found {} images under {}", discovery.images.len(), dir.display());
    for skipped in &discovery.skipped {
        match &skipped.path {
            Some(path) => println!("  ⚠️  Skipped {}: {}", path.display(), skipped.reason),
            None => println!("  ⚠️  Skipped entry: {}", skipped.reason),
        }
    }
    if discovery.images.is_empty() {
        return Err(anyhow!("No images found in {}", dir.display()));
    }

    let outcome = batch::embed_all(embedder, &discovery.images);
    println!(
        "✅ Embedded {} images ({} failed)",
        outcome.records.len(),
        outcome.failures.len()
    );
    for failure in &outcome.failures {
        println!("  ⚠️  {}: {}", failure.path.display(), failure.message);
    }

    if let Some(query_path) = &args.query {
        let query = embedder
            .embed_file(query_path)
            .with_context(|| format!("Error processing query {}", query_path.display()))?;
        let ranked = batch::rank_against(&query, &outcome.records, args.top)?;
        let thresholds = config.matching.thresholds();

        println!("\n🎯 Top matches for {}:", query_path.display());
        for (i, m) in ranked.iter().enumerate() {
            println!(
                "  {:>2}. {:.6}  {}  ({})",
                i + 1,
                m.score,
                m.record.path.display(),
                Verdict::from_score(m.score, &thresholds)
            );
        }
    }

    if let Some(output) = &args.export {
        let format = args.format.unwrap_or_else(|| ExportFormat::from_path(output));
        let count = export_embeddings(&outcome.records, model_path, output, format)?;
        println!("💾 Exported {} embeddings to {}", count, output.display());
    }

    Ok(())
}
