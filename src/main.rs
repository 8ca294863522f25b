use clap::Parser;
use proteome::{
    config::ExperimentConfig,
    experiment::{run, ExperimentReport},
    metrics::ModelComparison,
    network::EarlyStopping,
    parse::Dataset,
};
use std::path::PathBuf;

/// Compare a one- and a two-hidden-layer classifier on the mice protein
/// expression data.
#[derive(Parser)]
#[command(name = "proteome", about = "Mice protein expression classifier comparison")]
struct Cli {
    /// Expression table: identifier column followed by the protein columns.
    #[arg(long, default_value = "data3.csv")]
    features: PathBuf,

    /// Class table with labels 1..=8.
    #[arg(long, default_value = "class3.csv")]
    labels: PathBuf,

    /// Name of the identifier column in the expression table.
    #[arg(long, default_value = "MouseID")]
    id_column: String,

    /// Name of the label column in the class table.
    #[arg(long, default_value = "x")]
    label_column: String,

    #[arg(long, default_value = "42")]
    seed: u64,

    #[arg(long, default_value = "50")]
    epochs: usize,

    #[arg(long, default_value = "32")]
    batch_size: usize,

    #[arg(long, default_value = "0.001")]
    learning_rate: f64,

    /// Early stopping patience on validation accuracy; 0 disables it.
    #[arg(long, default_value = "5")]
    patience: usize,

    /// Rows shown when previewing the data.
    #[arg(long, default_value = "5")]
    head: usize,
}

impl Cli {
    fn into_config(self) -> ExperimentConfig {
        let mut config = ExperimentConfig {
            features_path: self.features,
            labels_path: self.labels,
            id_column: self.id_column,
            label_column: self.label_column,
            seed: self.seed,
            head_rows: self.head,
            ..ExperimentConfig::default()
        };

        config.train.epochs = self.epochs;
        config.train.batch_size = self.batch_size;
        config.train.learning_rate = self.learning_rate;
        config.train.early_stopping = (self.patience > 0).then_some(EarlyStopping {
            patience: self.patience,
            restore_best_weights: true,
        });

        config
    }
}

const PREVIEW_COLUMNS: usize = 5;

fn print_report(dataset: &Dataset, report: &ExperimentReport, config: &ExperimentConfig) {
    println!("Combined data:");
    print!("{}", dataset.head(config.head_rows, PREVIEW_COLUMNS));
    println!(
        "\nX shape: ({}, {})  y shape: ({},)",
        dataset.n_samples(),
        dataset.n_features(),
        dataset.labels.len()
    );

    let exploration = &report.exploration;

    println!("\nClass frequencies:");
    for (class, count) in &exploration.class_frequencies {
        println!("  class {class}: {count}");
    }

    println!("\nDescriptive statistics (first {PREVIEW_COLUMNS} columns):");
    print!("{}", exploration.summary.first(PREVIEW_COLUMNS));

    println!("\nStrongest correlations:");
    for (a, b, r) in &exploration.strongest_correlations {
        println!("  {a} ~ {b}: {r:.3}");
    }

    println!("\nPCA explained variance ratio:");
    for (index, ratio) in exploration.pca.explained_variance_ratio.iter().enumerate() {
        println!("  PC{}: {:.4}", index + 1, ratio);
    }

    let prepared = &report.prepared;
    println!(
        "\nTrain: {} rows, test: {} rows",
        prepared.partition.train.len(),
        prepared.partition.test.len()
    );

    for trained in &report.models {
        println!("\n{}:", trained.spec.name);
        println!("{}", trained.model.summary());
        if let Some(stopped) = trained.history.stopped_epoch {
            println!("Early stopping at epoch {stopped}");
        }
        if let Some(best) = trained.history.best() {
            println!("Kept weights from {best}");
        }
    }

    let evaluations = report.evaluations();
    for evaluation in &evaluations {
        println!("\n{evaluation}");
        println!("\n{}", "-".repeat(46));
    }

    println!("\nComparison:");
    println!(
        "{}",
        ModelComparison {
            evaluations: &evaluations
        }
    );
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_config();

    match run(&config) {
        Ok((dataset, report)) => print_report(&dataset, &report, &config),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
