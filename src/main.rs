use anyhow::Context;
use clap::{Parser, Subcommand};
use linkx::output::{write_clusters, write_linked, write_search_results};
use linkx::{
    read_settings, read_training, write_settings, write_training, ComparatorRegistry, ConsoleOracle, CsvSource,
    CsvTable, FieldSchema, IndexBackend, LabeledPair, Matcher, PipelineConfig, RecordSet, TrainedModel, Trainer,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Trainable record linkage and deduplication
#[derive(Parser, Debug)]
#[command(name = "linkx")]
#[command(about = "Link, deduplicate and search messy records", long_about = None)]
struct Args {
    /// JSON pipeline config; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct Overrides {
    /// Output CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Learned settings; when present training is skipped
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Labeled training pairs (JSON)
    #[arg(long)]
    training: Option<PathBuf>,

    /// Block index backend: memory or lmdb:<dir>
    #[arg(long)]
    backend: Option<IndexBackend>,

    /// How much more recall matters than precision
    #[arg(long)]
    recall_weight: Option<f64>,

    /// Number of candidate pairs sampled for active learning
    #[arg(long)]
    sample_size: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Columns merged into a single Address field
    #[arg(long, value_delimiter = ',')]
    merge_address: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Link a messy file against a canonical one
    Link {
        #[arg(long)]
        canonical: PathBuf,
        #[arg(long)]
        messy: PathBuf,
        /// Also write rows that matched nothing
        #[arg(long)]
        outer_join: bool,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Cluster duplicate rows within one file
    Dedupe {
        #[arg(long)]
        input: PathBuf,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Look up every messy row in an index of the canonical file
    Search {
        #[arg(long)]
        canonical: PathBuf,
        #[arg(long)]
        messy: PathBuf,
        /// Keep at most this many matches per row
        #[arg(long)]
        limit: Option<usize>,
        #[command(flatten)]
        overrides: Overrides,
    },
}

impl Overrides {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(output) = self.output {
            config.output_file = output;
        }
        if let Some(settings) = self.settings {
            config.settings_file = settings;
        }
        if let Some(training) = self.training {
            config.training_file = training;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(recall_weight) = self.recall_weight {
            config.recall_weight = recall_weight;
        }
        if let Some(sample_size) = self.sample_size {
            config.sample_size = sample_size;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if !self.merge_address.is_empty() {
            config.merge_address_fields = self.merge_address;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting LinkX v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    let registry = ComparatorRegistry::new();

    match args.command {
        Command::Link {
            canonical,
            messy,
            outer_join,
            overrides,
        } => {
            overrides.apply(&mut config);
            config.validate()?;
            if outer_join {
                config.inner_join = false;
            }
            run_link(&config, &registry, canonical, messy)
        }
        Command::Dedupe { input, overrides } => {
            overrides.apply(&mut config);
            config.validate()?;
            run_dedupe(&config, &registry, input)
        }
        Command::Search {
            canonical,
            messy,
            limit,
            overrides,
        } => {
            overrides.apply(&mut config);
            if limit.is_some() {
                config.matching.search_limit = limit;
            }
            config.validate()?;
            run_search(&config, &registry, canonical, messy)
        }
    }
}

fn load(config: &PipelineConfig, path: PathBuf, prefix: &str) -> anyhow::Result<(CsvTable, RecordSet)> {
    info!("importing {}", path.display());
    CsvSource::new(&path, prefix)
        .with_merged_address(&config.merge_address_fields)
        .load()
        .with_context(|| format!("failed to read {}", path.display()))
}

fn run_link(
    config: &PipelineConfig,
    registry: &ComparatorRegistry,
    canonical: PathBuf,
    messy: PathBuf,
) -> anyhow::Result<()> {
    let (canonical_table, canonical_set) = load(config, canonical, "canonical")?;
    let (messy_table, messy_set) = load(config, messy, "messy")?;

    let model = load_or_train(config, registry, &canonical_set, Some(&messy_set))?;
    let mut matcher = Matcher::with_index(model, config.backend.open()?).with_config(config.matching.clone());

    let threshold = matcher
        .threshold(&canonical_set, &messy_set, config.recall_weight)
        .context("failed to learn a threshold")?;
    info!("clustering with threshold {:.4}", threshold);
    let clusters = matcher.match_sets(&canonical_set, &messy_set, threshold)?;
    info!("# duplicate sets {}", clusters.len());

    let out = create_output(config)?;
    write_linked(out, &clusters, &canonical_table, &messy_table, config.inner_join)?;
    Ok(())
}

fn run_dedupe(config: &PipelineConfig, registry: &ComparatorRegistry, input: PathBuf) -> anyhow::Result<()> {
    let (table, set) = load(config, input, "input")?;

    let model = load_or_train(config, registry, &set, None)?;
    let mut matcher = Matcher::with_index(model, config.backend.open()?).with_config(config.matching.clone());

    let threshold = matcher
        .threshold_dedupe(&set, config.recall_weight)
        .context("failed to learn a threshold")?;
    let clusters = matcher.dedupe(&set, threshold)?;
    info!("# duplicate sets {}", clusters.len());

    let out = create_output(config)?;
    write_clusters(out, &clusters, &table)?;
    Ok(())
}

fn run_search(
    config: &PipelineConfig,
    registry: &ComparatorRegistry,
    canonical: PathBuf,
    messy: PathBuf,
) -> anyhow::Result<()> {
    let (canonical_table, canonical_set) = load(config, canonical, "canonical")?;
    let (messy_table, messy_set) = load(config, messy, "messy")?;

    let model = load_or_train(config, registry, &canonical_set, Some(&messy_set))?;
    let mut matcher = Matcher::with_index(model, config.backend.open()?).with_config(config.matching.clone());

    let threshold = matcher
        .threshold(&canonical_set, &messy_set, config.recall_weight)
        .context("failed to learn a threshold")?;
    matcher.set_threshold(threshold)?;
    matcher.index(&canonical_set).context("failed to index canonical records")?;
    let results = matcher.search(&messy_set)?;

    let out = create_output(config)?;
    write_search_results(out, &results, &messy_table, &canonical_table)?;
    Ok(())
}

fn create_output(config: &PipelineConfig) -> anyhow::Result<BufWriter<File>> {
    info!("saving results to: {}", config.output_file.display());
    let file = File::create(&config.output_file)
        .with_context(|| format!("failed to create {}", config.output_file.display()))?;
    Ok(BufWriter::with_capacity(512 * 1024, file))
}

/// Load learned settings when they exist; otherwise sample, label on the
/// console, train and save both the training pairs and the settings.
fn load_or_train(
    config: &PipelineConfig,
    registry: &ComparatorRegistry,
    left: &RecordSet,
    right: Option<&RecordSet>,
) -> anyhow::Result<TrainedModel> {
    if config.settings_file.exists() {
        info!("reading from {}", config.settings_file.display());
        return read_settings(&config.settings_file, registry)
            .with_context(|| format!("failed to load settings {}", config.settings_file.display()));
    }

    let schema = FieldSchema::new(config.fields.clone(), registry).context("invalid field declarations")?;
    let shown: Vec<String> = schema.record_fields().into_iter().map(str::to_string).collect();
    let mut trainer = Trainer::new(schema).with_seed(config.seed);

    let sampled = match right {
        Some(right) => trainer.sample(left, right, config.sample_size)?,
        None => trainer.sample_dedupe(left, config.sample_size)?,
    };
    info!("sampled {} candidate pairs", sampled);

    if config.training_file.exists() {
        info!("reading labeled examples from {}", config.training_file.display());
        let pairs = read_training(&config.training_file)?;
        let sets: Vec<&RecordSet> = std::iter::once(left).chain(right).collect();
        trainer.mark_pairs_by_id(&pairs, &sets)?;
    }
    trainer.seed_exact_matches(config.exact_seed)?;

    let mut oracle = ConsoleOracle::stdio(shown);
    let labeling = trainer.label(&mut oracle);

    // Labels given so far survive a cancelled session
    let labeled: Vec<LabeledPair> = trainer.labeled_pairs().cloned().collect();
    write_training(&config.training_file, &labeled)?;
    labeling?;

    let (model, report) = trainer.train(&config.train).context("training failed")?;
    if !report.uncovered.is_empty() {
        warn!("{} labeled duplicates are not covered by any blocking predicate", report.uncovered.len());
    }
    info!(
        "learned {} predicates from {} matches and {} distincts",
        report.predicates.len(),
        report.matches,
        report.distincts
    );

    write_settings(&config.settings_file, &model)?;
    Ok(model)
}
