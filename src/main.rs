//! ocr-harness - evaluate text recognition models against ground truth
//!
//! Recognizes single text-line images with a registered model and reports
//! character accuracy per image and per batch.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ocr_harness::analysis::{
    evaluate_all, evaluate_file, BatchSummary, FileEvaluation, GroundTruth, StatisticsStore,
    TestRecord,
};
use ocr_harness::config::{self, AppConfig};
use ocr_harness::storage;
use ocr_harness::vision::{load_model, Dictionary, Recognizer, Runtimes};

/// Evaluate OCR recognition models
#[derive(Parser, Debug)]
#[command(name = "ocr-harness")]
#[command(about = "Evaluate text recognition models against ground truth")]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model id from the registry
    #[arg(short, long)]
    model: Option<String>,

    /// Recognize the given images
    #[arg(short, long, num_args = 1.., conflicts_with = "test_all")]
    image: Vec<PathBuf>,

    /// Evaluate every image listed in the ground truth table
    #[arg(long)]
    test_all: bool,

    /// List registered models and exit
    #[arg(long)]
    list_models: bool,

    /// Write collected statistics as JSON after the run
    /// (defaults to the user data directory when no path is given)
    #[arg(long, value_name = "PATH")]
    export_stats: Option<Option<PathBuf>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging, RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = load_app_config(args.config.as_deref())?;

    if args.list_models {
        print_models(&config);
        return Ok(());
    }

    if args.image.is_empty() && !args.test_all {
        bail!("Nothing to do: pass --image FILE, --test-all or --list-models");
    }

    let model_id = args
        .model
        .as_deref()
        .unwrap_or_else(|| config.default_model_id());
    let model_config = config
        .model_config(model_id)
        .with_context(|| format!("Unknown model id {:?}", model_id))?;
    if !model_config.available {
        warn!("Model {} is not marked available, loading anyway", model_id);
    }

    let runtimes = Runtimes::new().with_onnx()?;
    let dictionary = Dictionary::load(&model_config.dictionary_path)?;
    let corrector = Arc::new(config.correction.build_corrector()?);
    let handle = Arc::new(
        load_model(model_config, &runtimes)
            .await
            .with_context(|| format!("Failed to load model {}", model_id))?,
    );
    let recognizer = Recognizer::new(Arc::clone(&handle), dictionary, corrector);

    let result = run(&args, &config, &recognizer).await;

    handle.dispose();
    info!("ocr-harness finished");

    result
}

/// Load configuration from the given file, or the default location
fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            config::load_config(path)
        }
        None => {
            let path = storage::default_config_path()?;
            if path.exists() {
                info!("Loaded configuration from {:?}", path);
            } else {
                info!("Using default configuration");
            }
            config::load_or_default(&path)
        }
    }
}

async fn run(args: &Args, config: &AppConfig, recognizer: &Recognizer) -> Result<()> {
    let ground_truth_path = &config.evaluation.ground_truth;
    let ground_truth = if args.test_all || ground_truth_path.exists() {
        GroundTruth::load(ground_truth_path)?
    } else {
        info!("No ground truth at {:?}, accuracy will not be scored", ground_truth_path);
        GroundTruth::default()
    };

    let mut store = StatisticsStore::new();

    for path in &args.image {
        let evaluation = evaluate_file(recognizer, path, &ground_truth)
            .await
            .with_context(|| format!("Failed to process {:?}", path))?;
        print_evaluation(&evaluation);

        if evaluation.ground_truth.is_some() {
            store.record(
                recognizer.model_id(),
                TestRecord {
                    file_name: evaluation.file_name.clone(),
                    accuracy: evaluation.accuracy,
                    processing_time_ms: evaluation.recognition.processing_time_ms,
                },
            );
        }
    }

    if args.test_all {
        let summary = evaluate_all(
            recognizer,
            &ground_truth,
            &config.evaluation.tests_dir,
            &mut store,
        )
        .await
        .context("Batch evaluation failed")?;
        print_summary(&summary);
    }

    if let Some(path) = &args.export_stats {
        let path = match path {
            Some(path) => path.clone(),
            None => storage::default_stats_path()?,
        };
        let json = store.export_json()?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write statistics to {:?}", path))?;
        println!("Statistics written to {}", path.display());
    }

    Ok(())
}

fn print_models(config: &AppConfig) {
    println!("Registered models:");
    for model in &config.models {
        println!(
            "  {:<26} {:<12} v{:<4} {}{}",
            model.id,
            model.backend,
            model.version,
            model.name,
            if model.available { "" } else { " (unavailable)" }
        );
        if !model.description.is_empty() {
            println!("  {:<26} {}", "", model.description);
        }
    }
    println!("Default: {}", config.default_model_id());
}

fn print_evaluation(evaluation: &FileEvaluation) {
    let recognition = &evaluation.recognition;
    println!("{}", evaluation.file_name);
    println!(
        "  OCR:   {}",
        if recognition.text.is_empty() { "(no text detected)" } else { recognition.text.as_str() }
    );
    if recognition.raw_text != recognition.text {
        println!("  Raw:   {}", recognition.raw_text);
    }
    println!("  Time:  {:.2}ms", recognition.processing_time_ms);
    if let Some(degraded) = &recognition.degraded {
        println!("  Warning: output shape assumed ({})", degraded.reason);
    }

    match &evaluation.ground_truth {
        Some(truth) => {
            let accuracy = &evaluation.accuracy;
            println!("  Truth: {}", truth);
            println!(
                "  Accuracy: {:.2}% ({}/{} characters){}",
                accuracy.percentage,
                accuracy.correct,
                accuracy.total,
                if accuracy.exact_match { ", exact match" } else { "" }
            );
        }
        None => println!("  No ground truth available"),
    }
}

fn print_summary(summary: &BatchSummary) {
    for evaluation in &summary.results {
        print_evaluation(evaluation);
    }

    println!();
    println!("Overall statistics ({})", summary.model_id);
    println!("  Average accuracy: {:.2}%", summary.avg_accuracy);
    println!("  Average time:     {:.2}ms", summary.avg_time_ms);
    println!("  Characters:       {}/{}", summary.total_correct, summary.total_chars);
    println!(
        "  Perfect matches:  {}/{}",
        summary.perfect_matches,
        summary.results.len()
    );
}
