pub mod cli;
pub mod error;
pub mod fetch;
pub mod mapping;
pub mod model;
pub mod postprocess;
pub mod preprocess;
pub mod report;
pub mod server;
pub mod service;

pub use crate::cli::{Cli, Command};
pub use crate::error::{ClassifyError, Result};
pub use crate::mapping::{Label, LabelVocabulary};
pub use crate::model::{InferenceBackend, ModelOptions, ModelVariant, OnnxBackend, ScoreKind};
pub use crate::postprocess::{Prediction, PredictionResult, format_label, softmax, top_k};
pub use crate::preprocess::{DecodedImage, PreprocessConfig, Processor, TensorLayout};
pub use crate::server::{ServerConfig, create_router, run_server};
pub use crate::service::{Classifier, DEFAULT_TOP_K};
