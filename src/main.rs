use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cnn_recognition::cli::{self, Cli, Command, ModelArgs, ServeArgs};
use cnn_recognition::{ClassifyError, Classifier, report, run_server};

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "cnn_recognition=info".into()),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            if e.use_stderr() {
                eprintln!("\n{}", report::usage());
                return ExitCode::FAILURE;
            }
            return ExitCode::SUCCESS;
        }
    };

    let outcome = match &cli.command {
        Command::Run { image } => run(&cli.model, image),
        Command::Serve(args) => serve(&cli.model, args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_failure(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &ModelArgs, image: &Path) -> anyhow::Result<()> {
    cli::check_image_path(image)?;

    let options = args.options();
    println!("Loading model {}...", options.variant.name());
    let classifier = Classifier::load(&options)?;
    println!("Model loaded.\n");

    println!("Processing image: {}", image.display());
    println!("Analysing image...");
    let result = cli::run_image(&classifier, image, args.top_k)?;

    println!("{}", report::render(&result));
    Ok(())
}

fn serve(args: &ModelArgs, serve_args: &ServeArgs) -> anyhow::Result<()> {
    // Startup failures abort here, before anything is bound.
    let classifier = Arc::new(Classifier::load(&args.options())?);
    let config = serve_args.config(args.top_k);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_server(config, classifier))
}

fn report_failure(e: &anyhow::Error) {
    match e.downcast_ref::<ClassifyError>() {
        Some(err @ ClassifyError::Inference(_)) => {
            error!(detail = %err, "Inference failed");
            eprintln!("\nError: the image could not be analysed.");
        }
        Some(err @ ClassifyError::Input(_)) => {
            eprintln!("\nError: {}", err);
            eprintln!("\nCheck that the file path is correct.");
        }
        Some(err @ ClassifyError::Decode(_)) => {
            eprintln!("\nError: {}", err);
            eprintln!("\nCheck that the file is a valid image.");
        }
        Some(err @ ClassifyError::Startup(_)) => {
            eprintln!("\nError: {}", err);
            eprintln!("\nCheck --model/--labels, or network access for the first download.");
        }
        None => eprintln!("\nError: {:#}", e),
    }
}
