use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::error::{ClassifyError, Result};
use crate::model::{ModelOptions, ModelVariant};
use crate::postprocess::PredictionResult;
use crate::server::{DEFAULT_MAX_UPLOAD_SIZE, ServerConfig};
use crate::service::{Classifier, DEFAULT_TOP_K};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Classify images with a pretrained CNN", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub model: ModelArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Classify one image and print the ranked predictions
    Run {
        /// image path
        image: PathBuf,
    },
    /// Serve the upload page and the JSON prediction API
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Pretrained network to load
    #[arg(long, global = true, value_enum, default_value_t = ModelVariant::default())]
    pub variant: ModelVariant,

    /// ONNX model path, instead of the cached download
    #[arg(long, global = true, env = "CNN_MODEL_PATH")]
    pub model: Option<PathBuf>,

    /// Label vocabulary (class index .json, synset .txt or one label per line)
    #[arg(long, global = true, env = "CNN_LABELS_PATH")]
    pub labels: Option<PathBuf>,

    /// Where downloaded weights and labels are kept
    #[arg(long, global = true, env = "CNN_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Run on the CUDA execution provider
    #[arg(long, global = true)]
    pub cuda: bool,

    /// Number of predictions to report
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_TOP_K,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub top_k: usize,
}

impl ModelArgs {
    pub fn options(&self) -> ModelOptions {
        ModelOptions {
            variant: self.variant,
            model_path: self.model.clone(),
            labels_path: self.labels.clone(),
            cache_dir: self.cache_dir.clone(),
            cuda: self.cuda,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Comma-separated origins allowed to call the API
    #[arg(long, env = "ALLOWED_ORIGINS")]
    pub allowed_origins: Option<String>,

    /// Largest accepted upload in bytes
    #[arg(long, env = "MAX_UPLOAD_SIZE", default_value_t = DEFAULT_MAX_UPLOAD_SIZE)]
    pub max_upload_size: usize,
}

impl ServeArgs {
    pub fn config(&self, top_k: usize) -> ServerConfig {
        let allowed_origins = match self.allowed_origins.as_deref() {
            Some(list) if !list.trim().is_empty() => ServerConfig::parse_origins(list),
            _ => ServerConfig::default_origins(),
        };
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            allowed_origins,
            max_upload_size: self.max_upload_size,
            top_k,
        }
    }
}

/// Fails with an input error unless `path` names an existing file.
pub fn check_image_path(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ClassifyError::Input(format!("file not found: {}", path.display())))
    }
}

/// Reads the image at `path` and classifies it.
pub fn run_image(classifier: &Classifier, path: &Path, top_k: usize) -> Result<PredictionResult> {
    check_image_path(path)?;
    let bytes = fs::read(path)
        .map_err(|e| ClassifyError::Input(format!("cannot read {}: {}", path.display(), e)))?;
    classifier.classify(&bytes, top_k)
}
