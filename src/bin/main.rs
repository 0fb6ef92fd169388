//! nestsvm Command Line Interface
//!
//! Nested cross-validation of a linear SVM on a feature table, a LibSVM file
//! or a precomputed kernel matrix.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use nestsvm::api::{HoldoutWorkflow, KFoldWorkflow, NestedConfig};
use nestsvm::core::{CGrid, CVError, FoldSplit, Label, Result, Validatable, ValidationOutcome};
use nestsvm::data::{load_kernel, load_labels, load_splits, save_splits, Dataset};
use nestsvm::kernel::PrecomputedKernel;
use nestsvm::metrics::nan_mean;
use nestsvm::persistence::save_classifier;
use nestsvm::split::{stratified_kfold, stratified_shuffle_split};
use nestsvm::validation::{KFoldValidation, RepeatedHoldout};
use nestsvm::TrainedSvm;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "nestsvm")]
#[command(about = "Nested cross-validation for linear Support Vector Machines")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Nested repeated stratified holdout
    Holdout(HoldoutArgs),
    /// Nested stratified k-fold
    Kfold(KFoldArgs),
    /// Generate outer splits and write them to JSON
    Split(SplitArgs),
}

#[derive(Args)]
struct InputArgs {
    /// Labelled feature data (CSV, TSV or LibSVM format)
    #[arg(long, conflicts_with = "kernel")]
    data: Option<PathBuf>,

    /// Precomputed N x N kernel matrix (CSV or TSV, no labels)
    #[arg(long, requires = "labels")]
    kernel: Option<PathBuf>,

    /// One label per line, in kernel row order
    #[arg(long)]
    labels: Option<PathBuf>,
}

#[derive(Args)]
struct SearchArgs {
    /// Number of inner folds for the grid search
    #[arg(long, default_value = "10")]
    inner_folds: usize,

    /// Smallest C as a power of ten
    #[arg(long, default_value = "-6", allow_hyphen_values = true)]
    c_min: f64,

    /// Largest C as a power of ten
    #[arg(long, default_value = "2", allow_hyphen_values = true)]
    c_max: f64,

    /// Number of log-spaced C candidates
    #[arg(long, default_value = "17")]
    c_num: usize,

    /// Use the same C for both classes instead of balanced weights
    #[arg(long)]
    unbalanced: bool,

    /// Workers for the inner grid search
    #[arg(long, default_value = "15")]
    inner_threads: usize,

    /// Workers for concurrent outer splits
    #[arg(long, default_value = "15")]
    outer_threads: usize,

    /// Random seed (drawn at random when omitted)
    #[arg(long)]
    seed: Option<u64>,
}

impl SearchArgs {
    fn to_config(&self) -> Result<NestedConfig> {
        let mut config = NestedConfig::new()
            .with_c_grid(CGrid::logspace(self.c_min, self.c_max, self.c_num)?)
            .with_inner_folds(self.inner_folds)
            .with_balanced(!self.unbalanced)
            .with_inner_threads(self.inner_threads)
            .with_outer_threads(self.outer_threads);
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        Ok(config)
    }
}

#[derive(Args)]
struct HoldoutArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    search: SearchArgs,

    /// Output directory for tables and classifier artifacts
    #[arg(short, long)]
    output: PathBuf,

    /// Outer splits as JSON (generated when omitted)
    #[arg(long)]
    splits: Option<PathBuf>,

    /// Number of holdout iterations
    #[arg(long, default_value = "100")]
    n_iterations: usize,

    /// Fraction of samples held out per iteration
    #[arg(long, default_value = "0.2")]
    test_size: f64,
}

#[derive(Args)]
struct KFoldArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    search: SearchArgs,

    /// Output directory for tables and classifier artifacts
    #[arg(short, long)]
    output: PathBuf,

    /// Outer splits as JSON (generated when omitted)
    #[arg(long)]
    splits: Option<PathBuf>,

    /// Number of outer folds
    #[arg(long, default_value = "10")]
    n_folds: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SplitStrategy {
    /// Stratified k-fold
    #[value(name = "kfold")]
    KFold,
    /// Repeated stratified holdout
    #[value(name = "holdout")]
    Holdout,
}

#[derive(Args)]
struct SplitArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Output JSON file
    #[arg(short, long)]
    output: PathBuf,

    /// Splitting scheme
    #[arg(long, default_value = "kfold")]
    strategy: SplitStrategy,

    /// Number of folds (kfold)
    #[arg(long, default_value = "10")]
    n_folds: usize,

    /// Number of iterations (holdout)
    #[arg(long, default_value = "100")]
    n_iterations: usize,

    /// Held-out fraction (holdout)
    #[arg(long, default_value = "0.2")]
    test_size: f64,

    /// Random seed
    #[arg(long, default_value = "0")]
    seed: u64,
}

/// Loaded samples: either raw features or a precomputed kernel
enum Input {
    Features(Dataset),
    Kernel(PrecomputedKernel, Vec<Label>),
}

impl Input {
    fn load(args: &InputArgs) -> Result<Self> {
        match (&args.data, &args.kernel, &args.labels) {
            (_, Some(kernel), Some(labels)) => {
                info!("Loading kernel matrix from {kernel:?}");
                Ok(Input::Kernel(load_kernel(kernel)?, load_labels(labels)?))
            }
            (Some(data), None, _) => {
                info!("Loading dataset from {data:?}");
                let dataset = Dataset::from_file(data)?;
                info!(
                    "Loaded {} samples with {} features",
                    dataset.len(),
                    dataset.dim()
                );
                Ok(Input::Features(dataset))
            }
            _ => Err(CVError::Configuration(
                "either --data or --kernel with --labels is required".to_string(),
            )),
        }
    }

    fn labels(&self) -> &[Label] {
        match self {
            Input::Features(dataset) => dataset.labels(),
            Input::Kernel(_, labels) => labels,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Holdout(args) => holdout_command(args),
        Commands::Kfold(args) => kfold_command(args),
        Commands::Split(args) => split_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn read_splits(path: Option<&PathBuf>) -> Result<Option<Vec<FoldSplit>>> {
    path.map(|p| {
        info!("Loading outer splits from {p:?}");
        load_splits(p)
    })
    .transpose()
}

/// Validate on a precomputed kernel and write tables plus the classifier (no weights)
fn run_on_kernel<V: Validatable<Model = TrainedSvm>>(
    mut validation: V,
    splits: Option<Vec<FoldSplit>>,
    output: &Path,
) -> Result<ValidationOutcome<TrainedSvm>> {
    let outcome = validation.validate(splits)?;
    fs::create_dir_all(output)?;
    save_classifier(
        output.join("classifier"),
        &outcome.model,
        &outcome.best_parameters,
        None,
    )?;
    validation.save_results(output)?;
    Ok(outcome)
}

fn holdout_command(args: HoldoutArgs) -> Result<()> {
    let config = args.search.to_config()?;
    let splits = read_splits(args.splits.as_ref())?;

    let outcome = match Input::load(&args.input)? {
        Input::Features(dataset) => HoldoutWorkflow::new(dataset, &args.output, config)
            .with_n_iterations(args.n_iterations)
            .with_test_size(args.test_size)
            .run(splits)?,
        Input::Kernel(kernel, labels) => {
            let seed = config.resolve_seed();
            let validation = RepeatedHoldout::new(
                config.algorithm(kernel, labels, seed)?,
                args.n_iterations,
                args.test_size,
            )
            .with_outer_threads(config.outer_threads)
            .with_seed(seed);
            run_on_kernel(validation, splits, &args.output)?
        }
    };

    print_summary("Repeated holdout", &outcome, &args.output);
    Ok(())
}

fn kfold_command(args: KFoldArgs) -> Result<()> {
    let config = args.search.to_config()?;
    let splits = read_splits(args.splits.as_ref())?;

    let outcome = match Input::load(&args.input)? {
        Input::Features(dataset) => KFoldWorkflow::new(dataset, &args.output, config)
            .with_n_folds(args.n_folds)
            .run(splits)?,
        Input::Kernel(kernel, labels) => {
            let seed = config.resolve_seed();
            let validation = KFoldValidation::new(
                config.algorithm(kernel, labels, seed)?,
                args.n_folds,
            )
            .with_outer_threads(config.outer_threads)
            .with_seed(seed);
            run_on_kernel(validation, splits, &args.output)?
        }
    };

    print_summary("K-fold", &outcome, &args.output);
    Ok(())
}

fn split_command(args: SplitArgs) -> Result<()> {
    let labels: Vec<Label> = match &args.input.labels {
        Some(path) => load_labels(path)?,
        None => Input::load(&args.input)?.labels().to_vec(),
    };

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let splits = match args.strategy {
        SplitStrategy::KFold => stratified_kfold(&labels, args.n_folds, &mut rng)?,
        SplitStrategy::Holdout => {
            stratified_shuffle_split(&labels, args.n_iterations, args.test_size, &mut rng)?
        }
    };

    save_splits(&splits, &args.output)?;
    println!(
        "Wrote {} {:?} splits over {} samples to {:?}",
        splits.len(),
        args.strategy,
        labels.len(),
        args.output
    );
    Ok(())
}

fn print_summary(name: &str, outcome: &ValidationOutcome<TrainedSvm>, output: &Path) {
    let balanced_accuracy = nan_mean(
        outcome
            .results
            .iter()
            .map(|r| r.evaluation.balanced_accuracy),
    );
    let auc = nan_mean(outcome.results.iter().map(|r| r.auc));

    println!("=== {name} Results ===");
    println!("Outer splits: {}", outcome.results.len());
    println!("Mean balanced accuracy: {balanced_accuracy:.4}");
    println!("Mean AUC: {auc:.4}");
    println!("Selected C: {}", outcome.best_parameters.c);
    println!("Support vectors: {}", outcome.model.n_support_vectors());
    println!("Results written to: {output:?}");
}
