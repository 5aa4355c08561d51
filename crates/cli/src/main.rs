use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use faceverify_core::embedder::domain::face_embedder::FaceEmbedder;
use faceverify_core::embedder::domain::frame_source::FrameSource;
use faceverify_core::embedder::infrastructure::image_frame_source::ImageFileFrameSource;
use faceverify_core::embedder::infrastructure::onnx_face_embedder::{
    OnnxFaceEmbedder, DEFAULT_CONFIDENCE,
};
use faceverify_core::scoring::domain::similarity::Metric;
use faceverify_core::shared::constants::{
    DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, EMBEDDING_DIMENSION, ENCODER_MODEL_NAME,
    ENCODER_MODEL_URL, IMAGE_EXTENSIONS,
};
use faceverify_core::shared::model_resolver::ModelFile;
use faceverify_core::store::domain::reference_store::ReferenceStore;
use faceverify_core::store::infrastructure::json_file_store::JsonFileReferenceStore;
use faceverify_core::verification::enroll_identity_use_case::EnrollIdentityUseCase;
use faceverify_core::verification::frame_aggregator::AggregationPolicy;
use faceverify_core::verification::verification_logger::AttemptLogger;
use faceverify_core::verification::verify_identity_use_case::{
    VerificationConfig, VerifyIdentityUseCase,
};

/// Face identity enrollment and verification against a local reference store.
#[derive(Parser)]
#[command(name = "faceverify")]
struct Cli {
    /// Reference store directory (defaults to $FACEVERIFY_STORE_DIR or the
    /// platform data directory).
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enroll reference images for an identity (one embedding per image).
    Enroll {
        identity: String,

        /// Images to enroll, each appended as one reference.
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Face detection confidence threshold (0.0-1.0).
        #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
        confidence: f64,
    },

    /// Verify an identity against a burst of captured frames.
    Verify {
        identity: String,

        /// Frames of the capture burst, in order.
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Similarity metric: cosine or euclidean.
        #[arg(long, default_value = "cosine")]
        metric: String,

        /// Accept threshold; defaults to the metric's standard value.
        #[arg(long)]
        threshold: Option<f64>,

        /// Aggregation policy: all-match or single-best.
        #[arg(long, default_value = "all-match")]
        aggregation: String,

        /// Frame budget; defaults to the number of images given.
        #[arg(long)]
        frames: Option<usize>,

        /// Face detection confidence threshold (0.0-1.0).
        #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
        confidence: f64,
    },

    /// Print the embedding for one image without storing anything.
    Encode {
        image: PathBuf,

        /// Face detection confidence threshold (0.0-1.0).
        #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
        confidence: f64,
    },

    /// List enrolled identities with their reference counts.
    Identities,

    /// Remove every reference for an identity (administrative).
    Remove { identity: String },
}

fn main() {
    env_logger::init();

    match run() {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    }
}

fn run() -> Result<i32, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let store: Arc<dyn ReferenceStore> =
        Arc::new(JsonFileReferenceStore::open_default(cli.store_dir.as_deref())?);

    match cli.command {
        Command::Enroll {
            identity,
            images,
            confidence,
        } => run_enroll(store, &identity, &images, confidence),
        Command::Verify {
            identity,
            images,
            metric,
            threshold,
            aggregation,
            frames,
            confidence,
        } => {
            let metric = parse_metric(&metric)?;
            let aggregation = parse_aggregation(&aggregation)?;
            let mut config = VerificationConfig::new(metric, aggregation)
                .with_frame_count(frames.unwrap_or(images.len()));
            if let Some(threshold) = threshold {
                config = config.with_threshold(threshold);
            }
            run_verify(store, &identity, &images, confidence, &config)
        }
        Command::Encode { image, confidence } => run_encode(&image, confidence),
        Command::Identities => run_identities(store.as_ref()),
        Command::Remove { identity } => {
            store.clear(&identity)?;
            log::info!("removed references for '{identity}'");
            Ok(0)
        }
    }
}

fn run_enroll(
    store: Arc<dyn ReferenceStore>,
    identity: &str,
    images: &[PathBuf],
    confidence: f64,
) -> Result<i32, Box<dyn std::error::Error>> {
    validate_images(images)?;
    let embedder = build_embedder(confidence)?;
    let mut use_case = EnrollIdentityUseCase::new(store, embedder);

    for path in images {
        let frame = load_frame(path)?;
        let record = use_case.execute(identity, &frame)?;
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(0)
}

fn run_verify(
    store: Arc<dyn ReferenceStore>,
    identity: &str,
    images: &[PathBuf],
    confidence: f64,
    config: &VerificationConfig,
) -> Result<i32, Box<dyn std::error::Error>> {
    validate_images(images)?;
    let embedder = build_embedder(confidence)?;
    let mut source = ImageFileFrameSource::new(images.to_vec());
    let mut use_case =
        VerifyIdentityUseCase::new(store, embedder, Box::new(AttemptLogger::new()));

    let verdict = use_case.execute(identity, &mut source, config)?;
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(if verdict.matched { 0 } else { 1 })
}

fn run_encode(image: &Path, confidence: f64) -> Result<i32, Box<dyn std::error::Error>> {
    let mut embedder = build_embedder(confidence)?;
    let frame = load_frame(image)?;
    match embedder.embed(&frame)? {
        Some(embedding) => {
            println!("{}", serde_json::to_string(&embedding)?);
            Ok(0)
        }
        None => Err(format!("no face detected in {}", image.display()).into()),
    }
}

fn run_identities(store: &dyn ReferenceStore) -> Result<i32, Box<dyn std::error::Error>> {
    for identity in store.identities()? {
        let references = store.lookup(&identity)?;
        let dimension = references.first().map_or(0, |r| r.dimension());
        println!("{identity}\treferences={}\tdimension={dimension}", references.len());
    }
    Ok(0)
}

fn build_embedder(confidence: f64) -> Result<Box<dyn FaceEmbedder>, Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!("Confidence must be between 0.0 and 1.0, got {confidence}").into());
    }

    let detector = ModelFile {
        name: DETECTOR_MODEL_NAME,
        url: DETECTOR_MODEL_URL,
    };
    let encoder = ModelFile {
        name: ENCODER_MODEL_NAME,
        url: ENCODER_MODEL_URL,
    };

    log::info!("Resolving model: {DETECTOR_MODEL_NAME}");
    let detector_path = detector.resolve(Some(Box::new(download_progress)))?;
    log::info!("Resolving model: {ENCODER_MODEL_NAME}");
    let encoder_path = encoder.resolve(Some(Box::new(download_progress)))?;
    eprintln!();

    Ok(Box::new(OnnxFaceEmbedder::new(
        &detector_path,
        &encoder_path,
        confidence,
        EMBEDDING_DIMENSION,
    )?))
}

fn load_frame(path: &Path) -> Result<faceverify_core::shared::frame::Frame, Box<dyn std::error::Error>> {
    let mut source = ImageFileFrameSource::new(vec![path.to_path_buf()]);
    source
        .capture()
        .ok_or_else(|| format!("could not read image: {}", path.display()).into())
}

fn validate_images(images: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    for path in images {
        if !path.exists() {
            return Err(format!("Input file not found: {}", path.display()).into());
        }
        let known = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()));
        if !known {
            return Err(format!("Unsupported image type: {}", path.display()).into());
        }
    }
    Ok(())
}

fn parse_metric(value: &str) -> Result<Metric, Box<dyn std::error::Error>> {
    match value {
        "cosine" => Ok(Metric::Cosine),
        "euclidean" => Ok(Metric::Euclidean),
        other => Err(format!("Unknown metric '{other}' (expected cosine or euclidean)").into()),
    }
}

fn parse_aggregation(value: &str) -> Result<AggregationPolicy, Box<dyn std::error::Error>> {
    match value {
        "all-match" => Ok(AggregationPolicy::AllFramesMatch),
        "single-best" => Ok(AggregationPolicy::SingleBestFrame),
        other => {
            Err(format!("Unknown aggregation '{other}' (expected all-match or single-best)").into())
        }
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = downloaded as f64 / total as f64 * 100.0;
        eprint!("\rDownloading model: {pct:.0}%");
    } else {
        eprint!("\rDownloading model: {downloaded} bytes");
    }
}
