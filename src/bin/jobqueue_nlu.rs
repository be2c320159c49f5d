use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use jobqueue_nlu::{run_training, NluConfig, Result, SolutionPredictor};

#[derive(Parser)]
#[command(
    name = "jobqueue-nlu",
    about = "Train and query the job queue solution prediction model"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full training pipeline and persist the model artifacts
    Train {
        /// Path to the configuration file
        #[arg(long, default_value = "data/config.json")]
        config: PathBuf,
    },
    /// Predict the remediation for an error message
    Predict {
        /// Path to the configuration file
        #[arg(long, default_value = "data/config.json")]
        config: PathBuf,
        /// Error message to classify; without it an interactive prompt starts
        #[arg(long)]
        message: Option<String>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        let body = serde_json::json!({ "error": format!("{}", error) });
        eprintln!("{}", body);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Train { config } => {
            let config = NluConfig::from_path(&config)?;
            let output = run_training(&config)?;
            println!("{}", output.evaluation.report);
            println!(
                "mean loss: {:.4}  mean accuracy: {:.4}",
                output.evaluation.mean_loss, output.evaluation.mean_accuracy
            );
            Ok(())
        }
        Command::Predict { config, message } => {
            let config = NluConfig::from_path(&config)?;
            let predictor = SolutionPredictor::from_path(&config.paths.model_dir, &config)?;
            match message {
                Some(message) => {
                    let prediction = predictor.predict(&message)?;
                    println!("{}", serde_json::to_string_pretty(&prediction)?);
                    Ok(())
                }
                None => interactive(&predictor),
            }
        }
    }
}

fn interactive(predictor: &SolutionPredictor) -> Result<()> {
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut query = String::new();
        if io::stdin().read_line(&mut query)? == 0 {
            return Ok(());
        }
        match predictor.predict(query.trim()) {
            Ok(prediction) => println!("{}", serde_json::to_string_pretty(&prediction)?),
            Err(error) => println!("{}", serde_json::json!({ "error": format!("{}", error) })),
        }
    }
}
