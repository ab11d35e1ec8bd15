use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array4, CowArray};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch};
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::ValueType;

use crate::error::{ClassifyError, Result};
use crate::preprocess::PreprocessConfig;

const MOBILENET_V2_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/classification/mobilenet/model/mobilenetv2-12.onnx";

/// Whether a network's output row is raw logits or already a probability distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    Logits,
    Probabilities,
}

/// The pretrained ImageNet classifiers this crate knows how to feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ModelVariant {
    /// MobileNetV2 from the ONNX model zoo
    #[default]
    #[value(name = "mobilenet-v2")]
    MobileNetV2,
    /// Keras MobileNetV2 exported to ONNX; weights must be supplied with --model
    #[value(name = "mobilenet-v2-keras")]
    MobileNetV2Keras,
}

impl ModelVariant {
    pub fn name(&self) -> &'static str {
        match self {
            ModelVariant::MobileNetV2 => "MobileNetV2",
            ModelVariant::MobileNetV2Keras => "MobileNetV2 (Keras)",
        }
    }

    /// The pixel transform the weights were trained with.
    pub fn preprocess_config(&self) -> PreprocessConfig {
        match self {
            ModelVariant::MobileNetV2 => PreprocessConfig::imagenet(),
            ModelVariant::MobileNetV2Keras => PreprocessConfig::tf_scaled(),
        }
    }

    pub fn score_kind(&self) -> ScoreKind {
        match self {
            ModelVariant::MobileNetV2 => ScoreKind::Logits,
            ModelVariant::MobileNetV2Keras => ScoreKind::Probabilities,
        }
    }

    /// Where the weights can be downloaded from, if anywhere.
    pub fn weights_url(&self) -> Option<&'static str> {
        match self {
            ModelVariant::MobileNetV2 => Some(MOBILENET_V2_URL),
            ModelVariant::MobileNetV2Keras => None,
        }
    }

    pub fn weights_file_name(&self) -> &'static str {
        match self {
            ModelVariant::MobileNetV2 => "mobilenetv2-12.onnx",
            ModelVariant::MobileNetV2Keras => "mobilenet_v2_keras.onnx",
        }
    }
}

/// Everything needed to bring a classifier up at startup.
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    pub variant: ModelVariant,
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub cuda: bool,
}

/// A loaded network that maps one batched input tensor to a row of class scores.
///
/// Implementations are immutable after construction and shared read-only between
/// concurrent callers.
pub trait InferenceBackend: Send + Sync {
    fn infer(&self, input: Array4<f32>) -> Result<Array1<f32>>;

    /// Width of the score row, when the network declares it statically.
    fn num_classes(&self) -> Option<usize> {
        None
    }
}

pub struct OnnxModel {
    provider: [ExecutionProviderDispatch; 1],
}

impl OnnxModel {
    pub fn new(cuda: bool) -> Self {
        let provider = if cuda {
            [CUDAExecutionProvider::default().build().error_on_failure()]
        } else {
            [CPUExecutionProvider::default().build()]
        };
        Self { provider }
    }

    pub fn load_model(&self, model_path: &Path) -> Result<Session> {
        // The runtime library is opened on the first ort call and a failed load panics.
        quietly(|| self.build_session(model_path)).map_err(|payload| {
            ClassifyError::Startup(format!("ONNX Runtime unavailable: {}", panic_message(&*payload)))
        })?
    }

    fn build_session(&self, model_path: &Path) -> Result<Session> {
        let startup = |e: ort::Error| ClassifyError::Startup(format!("{}: {}", model_path.display(), e));
        let session = SessionBuilder::new()
            .map_err(startup)?
            .with_execution_providers(self.provider.clone())
            .map_err(startup)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(startup)?
            .commit_from_file(model_path)
            .map_err(startup)?;
        Ok(session)
    }
}

/// Runs `f`, turning a panic into an error without printing it through the panic hook.
fn quietly<T>(f: impl FnOnce() -> T) -> std::thread::Result<T> {
    let hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    panic::set_hook(hook);
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown error".to_string()
    }
}

/// ONNX Runtime session behind the [`InferenceBackend`] seam.
#[derive(Debug)]
pub struct OnnxBackend {
    session: Session,
    num_classes: Option<usize>,
}

impl OnnxBackend {
    pub fn load(model_path: &Path, cuda: bool) -> Result<Self> {
        if !model_path.exists() {
            return Err(ClassifyError::Startup(format!(
                "model file not found: {}",
                model_path.display()
            )));
        }
        let session = OnnxModel::new(cuda).load_model(model_path)?;

        if session.inputs.len() != 1 || session.outputs.is_empty() {
            return Err(ClassifyError::Startup(format!(
                "expected a single-input classifier, model has {} inputs and {} outputs",
                session.inputs.len(),
                session.outputs.len()
            )));
        }

        let num_classes = match &session.outputs[0].output_type {
            ValueType::Tensor { dimensions, .. } => dimensions
                .last()
                .and_then(|d| usize::try_from(*d).ok())
                .filter(|d| *d > 0),
            _ => None,
        };

        Ok(Self { session, num_classes })
    }
}

impl InferenceBackend for OnnxBackend {
    fn infer(&self, input: Array4<f32>) -> Result<Array1<f32>> {
        let xs = CowArray::from(input.into_dyn());
        let input_data = ort::inputs![xs.view()]?;
        let ys = self.session.run(input_data)?;

        let (_name, scores) = ys
            .iter()
            .next()
            .ok_or_else(|| ClassifyError::Inference("model produced no outputs".to_string()))?;
        let scores = scores.try_extract_tensor::<f32>()?;
        Ok(scores.iter().copied().collect())
    }

    fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::TensorLayout;

    #[test]
    fn test_variant_contracts() {
        let zoo = ModelVariant::MobileNetV2;
        assert_eq!(zoo.preprocess_config().layout, TensorLayout::Nchw);
        assert_eq!(zoo.score_kind(), ScoreKind::Logits);
        assert!(zoo.weights_url().is_some());

        let keras = ModelVariant::MobileNetV2Keras;
        assert_eq!(keras.preprocess_config().layout, TensorLayout::Nhwc);
        assert_eq!(keras.preprocess_config().mean, [0.5; 3]);
        assert_eq!(keras.score_kind(), ScoreKind::Probabilities);
        assert!(keras.weights_url().is_none());
    }

    #[test]
    fn test_unloadable_model_is_startup_error() {
        // Holds whether or not the runtime library can be found on this machine.
        let path = std::env::temp_dir().join("cnn-recognition-test-garbage.onnx");
        std::fs::write(&path, b"not an onnx graph").unwrap();
        match OnnxBackend::load(&path, false) {
            Err(ClassifyError::Startup(_)) => {}
            other => panic!("expected startup error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_panic_becomes_message() {
        let payload = quietly::<()>(|| panic!("cannot open shared object file")).unwrap_err();
        assert_eq!(panic_message(&*payload), "cannot open shared object file");

        let payload = quietly::<()>(|| panic!("{} missing", "libonnxruntime.so")).unwrap_err();
        assert_eq!(panic_message(&*payload), "libonnxruntime.so missing");
        assert_eq!(quietly(|| 7).unwrap(), 7);
    }

    #[test]
    fn test_missing_weights_is_startup_error() {
        let path = std::env::temp_dir().join("cnn-recognition-test-missing.onnx");
        match OnnxBackend::load(&path, false) {
            Err(ClassifyError::Startup(msg)) => assert!(msg.contains("not found")),
            other => panic!("expected startup error, got {:?}", other.map(|_| ())),
        }
    }
}
