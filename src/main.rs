mod config;
mod dataset;
mod loader;
mod ml;
mod pipeline;
mod types;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::ForecastConfig;
use loader::{load_price_csv, load_trade_history};
use ml::DenseEngine;
use pipeline::{ForecastSession, TradeHistoryForecaster};

#[derive(Parser)]
#[command(name = "sma-forecast")]
#[command(version = "0.1.0")]
#[command(about = "Train a small dense network to forecast SMA prices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "forecast.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the SMA dataset and print sample training examples
    Sma {
        /// Daily price CSV (newest row first, ClosePrice/GDate columns)
        #[arg(short, long)]
        file: String,

        /// Sliding window length in days
        #[arg(short, long)]
        window_size: Option<usize>,
    },
    /// Train on the price CSV, evaluate both splits and project forward
    Forecast {
        /// Daily price CSV
        #[arg(short, long)]
        file: String,

        #[arg(short, long)]
        window_size: Option<usize>,

        /// Training prefix as a percentage of the dataset
        #[arg(short, long)]
        training_size: Option<f64>,

        #[arg(short, long)]
        epochs: Option<usize>,

        #[arg(short, long)]
        learning_rate: Option<f64>,

        #[arg(long)]
        hidden_layers: Option<usize>,

        /// Write the trained model as JSON to this path
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Train a next-day price model from a trade-history JSON file
    TradeHistory {
        /// Trade-history JSON (V/MN/MX/F/L records)
        #[arg(short, long)]
        file: String,

        /// Days to project forward
        #[arg(short, long)]
        days: Option<usize>,

        #[arg(short, long)]
        epochs: Option<usize>,

        #[arg(short, long)]
        learning_rate: Option<f64>,

        #[arg(long)]
        hidden_layers: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ForecastConfig::load(&cli.config)?;

    match cli.command {
        Commands::Sma { file, window_size } => {
            run_sma(&file, window_size.unwrap_or(config.window_size))
        }
        Commands::Forecast {
            file,
            window_size,
            training_size,
            epochs,
            learning_rate,
            hidden_layers,
            output,
        } => {
            run_forecast(
                &file,
                window_size.unwrap_or(config.window_size),
                training_size.unwrap_or(config.training_size_pct),
                epochs.unwrap_or(config.epochs),
                learning_rate.unwrap_or(config.learning_rate),
                hidden_layers.unwrap_or(config.hidden_layers),
                output.as_deref(),
            )
            .await
        }
        Commands::TradeHistory {
            file,
            days,
            epochs,
            learning_rate,
            hidden_layers,
        } => {
            run_trade_history(
                &file,
                days.unwrap_or(config.forward_days),
                epochs.unwrap_or(config.epochs),
                learning_rate.unwrap_or(config.learning_rate),
                hidden_layers.unwrap_or(config.hidden_layers),
            )
            .await
        }
    }
}

fn run_sma(file: &str, window_size: usize) -> Result<()> {
    let loaded = load_price_csv(file)?;
    if let Some(symbol) = &loaded.symbol {
        info!("symbol: {} (last traded {})", symbol, loaded.last_traded);
    }

    let mut session = ForecastSession::new(DenseEngine::new(), window_size, 100.0)?;
    session.load_series(loaded.series);
    let dataset = session.compute_sma()?;

    println!("#    Input (X)                                Label (Y)");
    for (index, example) in dataset.examples.iter().take(25).enumerate() {
        let window: Vec<String> = example
            .window
            .iter()
            .map(|p| format!("{:.4}", p.price))
            .collect();
        println!(
            "{:<4} [{}] {:.4}",
            index + 1,
            window.join(", "),
            example.label
        );
    }
    Ok(())
}

async fn run_forecast(
    file: &str,
    window_size: usize,
    training_size: f64,
    epochs: usize,
    learning_rate: f64,
    hidden_layers: usize,
    output: Option<&str>,
) -> Result<()> {
    let loaded = load_price_csv(file)?;
    if let Some(symbol) = &loaded.symbol {
        info!("symbol: {} (last traded {})", symbol, loaded.last_traded);
    }

    let mut session = ForecastSession::new(DenseEngine::new(), window_size, training_size)?;
    session.load_series(loaded.series);
    let examples = session.compute_sma()?.len();
    info!("{} training examples at window size {}", examples, window_size);

    session
        .train(epochs, learning_rate, hidden_layers, &mut |event| {
            info!(
                "Epoch: {} (of {}), loss: {}",
                event.epoch + 1,
                epochs,
                event.loss
            );
        })
        .await?;

    let (train_preds, holdout_preds) = session.evaluate()?;
    info!(
        "validated: {} training predictions, {} holdout predictions",
        train_preds.len(),
        holdout_preds.len()
    );

    let forward = session.predict_forward()?;
    println!("Date        Predicted price");
    for (date, price) in forward.dated_points() {
        println!("{}  {:.4}", date, price);
    }

    if let (Some(path), Some(model)) = (output, session.model()) {
        std::fs::write(path, model.save_to_json()?)?;
        info!("model written to {}", path);
    }
    Ok(())
}

async fn run_trade_history(
    file: &str,
    days: usize,
    epochs: usize,
    learning_rate: f64,
    hidden_layers: usize,
) -> Result<()> {
    let history = load_trade_history(file)?;

    let mut forecaster = TradeHistoryForecaster::new(DenseEngine::with_hidden_units(24));
    forecaster
        .train(&history, epochs, learning_rate, hidden_layers, &mut |event| {
            info!(
                "Epoch: {} (of {}), loss: {}",
                event.epoch + 1,
                epochs,
                event.loss
            );
        })
        .await?;

    let last_day = history
        .last()
        .ok_or_else(|| anyhow::anyhow!("trade history is empty"))?;
    let futures = forecaster.predict_later_days(last_day, days)?;

    println!("Day  Predicted last price");
    for (offset, price) in futures.iter().enumerate() {
        println!("+{:<3} {:.4}", offset + 1, price);
    }
    Ok(())
}
