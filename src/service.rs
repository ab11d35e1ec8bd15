use std::fmt;
use std::time::Instant;

use tracing::{debug, info};

use crate::error::{ClassifyError, Result};
use crate::fetch::{AssetCache, IMAGENET_CLASS_INDEX_FILE, IMAGENET_CLASS_INDEX_URL};
use crate::mapping::LabelVocabulary;
use crate::model::{InferenceBackend, ModelOptions, OnnxBackend, ScoreKind};
use crate::postprocess::{Prediction, PredictionResult, format_label, softmax, top_k};
use crate::preprocess::{DecodedImage, Processor};

pub const DEFAULT_TOP_K: usize = 5;

/// The inference service: raw image bytes in, ranked labels out.
///
/// Built once at startup and shared read-only (behind an `Arc`) by every caller.
pub struct Classifier {
    model_name: String,
    backend: Box<dyn InferenceBackend>,
    processor: Processor,
    labels: LabelVocabulary,
    scores: ScoreKind,
}

// The backend is an opaque trait object.
impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("model_name", &self.model_name)
            .field("processor", &self.processor)
            .field("labels", &self.labels.len())
            .field("scores", &self.scores)
            .finish()
    }
}

impl Classifier {
    /// Assembles a classifier, checking the network and the vocabulary agree on the class count.
    pub fn new(
        model_name: impl Into<String>,
        backend: Box<dyn InferenceBackend>,
        processor: Processor,
        labels: LabelVocabulary,
        scores: ScoreKind,
    ) -> Result<Self> {
        if let Some(classes) = backend.num_classes() {
            if classes != labels.len() {
                return Err(ClassifyError::Startup(format!(
                    "model has {} output classes but the vocabulary has {} labels",
                    classes,
                    labels.len()
                )));
            }
        }
        Ok(Self {
            model_name: model_name.into(),
            backend,
            processor,
            labels,
            scores,
        })
    }

    /// Resolves weights and labels (downloading them when not given) and loads the network.
    pub fn load(options: &ModelOptions) -> Result<Self> {
        let variant = options.variant;
        let cache = AssetCache::new(options.cache_dir.clone())?;

        let model_path = match &options.model_path {
            Some(path) => path.clone(),
            None => {
                let url = variant.weights_url().ok_or_else(|| {
                    ClassifyError::Startup(format!(
                        "{} weights cannot be downloaded; pass --model",
                        variant.name()
                    ))
                })?;
                cache.fetch(url, variant.weights_file_name())?
            }
        };
        let labels_path = match &options.labels_path {
            Some(path) => path.clone(),
            None => cache.fetch(IMAGENET_CLASS_INDEX_URL, IMAGENET_CLASS_INDEX_FILE)?,
        };

        let labels = LabelVocabulary::load(&labels_path)?;

        info!(model = variant.name(), path = %model_path.display(), cuda = options.cuda, "Loading model");
        let t = Instant::now();
        let backend = OnnxBackend::load(&model_path, options.cuda)?;
        info!(model = variant.name(), classes = labels.len(), elapsed = ?t.elapsed(), "Model loaded");

        Self::new(
            variant.name(),
            Box::new(backend),
            Processor::new(variant.preprocess_config()),
            labels,
            variant.score_kind(),
        )
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub fn labels(&self) -> &LabelVocabulary {
        &self.labels
    }

    pub fn preprocess(&self, bytes: &[u8]) -> Result<DecodedImage> {
        self.processor.preprocess(bytes)
    }

    /// Runs one forward pass and returns the `top_k` best classes.
    ///
    /// `top_k` larger than the vocabulary is clamped to it.
    pub fn predict(&self, image: &DecodedImage, top_k_count: usize) -> Result<PredictionResult> {
        if top_k_count == 0 {
            return Err(ClassifyError::Input("top_k must be at least 1".to_string()));
        }
        let config = &self.processor.config;
        let expected = (config.height, config.width, config.channels);
        if image.shape() != expected {
            return Err(ClassifyError::Inference(format!(
                "input is {:?}, model expects {:?}",
                image.shape(),
                expected
            )));
        }

        let t = Instant::now();
        let raw = self.backend.infer(image.to_batch(config.layout))?;
        debug!(model = %self.model_name, elapsed = ?t.elapsed(), "Forward pass");

        if raw.len() != self.labels.len() {
            return Err(ClassifyError::Inference(format!(
                "model produced {} scores for {} labels",
                raw.len(),
                self.labels.len()
            )));
        }
        if raw.iter().any(|s| !s.is_finite()) {
            return Err(ClassifyError::Inference("model produced non-finite scores".to_string()));
        }

        let scores = match self.scores {
            ScoreKind::Logits => softmax(&raw),
            ScoreKind::Probabilities => raw,
        };

        let predictions = top_k(&scores, top_k_count)
            .into_iter()
            .map(|(index, confidence)| {
                let label = &self.labels[index];
                Prediction {
                    class_id: label.class_id.clone(),
                    name: format_label(&label.name),
                    confidence: confidence.clamp(0.0, 1.0),
                }
            })
            .collect();
        Ok(PredictionResult { predictions })
    }

    /// Preprocessing followed by [`Classifier::predict`].
    pub fn classify(&self, bytes: &[u8], top_k_count: usize) -> Result<PredictionResult> {
        let image = self.preprocess(bytes)?;
        self.predict(&image, top_k_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Label;
    use crate::preprocess::PreprocessConfig;
    use image::{DynamicImage, Rgb, RgbImage};
    use ndarray::{Array1, Array4};

    struct FixedScores(Vec<f32>);

    impl InferenceBackend for FixedScores {
        fn infer(&self, _input: Array4<f32>) -> Result<Array1<f32>> {
            Ok(Array1::from(self.0.clone()))
        }

        fn num_classes(&self) -> Option<usize> {
            Some(self.0.len())
        }
    }

    fn vocab(names: &[&str]) -> LabelVocabulary {
        let labels = names
            .iter()
            .enumerate()
            .map(|(i, n)| Label { class_id: format!("n{:08}", i), name: n.to_string() })
            .collect();
        LabelVocabulary::new(labels).unwrap()
    }

    fn classifier(scores: Vec<f32>, kind: ScoreKind) -> Classifier {
        let names = ["tench", "golden_retriever", "tabby_cat", "red_wine"];
        Classifier::new(
            "Stub",
            Box::new(FixedScores(scores)),
            Processor::new(PreprocessConfig::imagenet()),
            vocab(&names),
            kind,
        )
        .unwrap()
    }

    fn red_image() -> DecodedImage {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([255, 0, 0])));
        Processor::new(PreprocessConfig::imagenet()).preprocess_image(&img).unwrap()
    }

    #[test]
    fn test_predict_ranks_and_formats() {
        let c = classifier(vec![0.1, 0.6, 0.25, 0.05], ScoreKind::Probabilities);
        let result = c.predict(&red_image(), 3).unwrap();
        let names: Vec<_> = result.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Golden Retriever", "Tabby Cat", "Tench"]);
        assert_eq!(result.top().unwrap().class_id, "n00000001");
        assert_eq!(result.top().unwrap().confidence, 0.6);
    }

    #[test]
    fn test_logits_are_softmaxed() {
        let c = classifier(vec![2.0, 1.0, 0.0, -1.0], ScoreKind::Logits);
        let result = c.predict(&red_image(), 4).unwrap();
        let total: f32 = result.iter().map(|p| p.confidence).sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(result.iter().all(|p| (0.0..=1.0).contains(&p.confidence)));
        assert_eq!(result.top().unwrap().name, "Tench");
    }

    #[test]
    fn test_top_k_zero_and_clamp() {
        let c = classifier(vec![0.1, 0.2, 0.3, 0.4], ScoreKind::Probabilities);
        assert!(matches!(c.predict(&red_image(), 0), Err(ClassifyError::Input(_))));
        assert_eq!(c.predict(&red_image(), 10).unwrap().len(), 4);
    }

    #[test]
    fn test_class_count_mismatch_is_startup_error() {
        let result = Classifier::new(
            "Stub",
            Box::new(FixedScores(vec![0.5, 0.5])),
            Processor::new(PreprocessConfig::imagenet()),
            vocab(&["a", "b", "c"]),
            ScoreKind::Probabilities,
        );
        assert!(matches!(result, Err(ClassifyError::Startup(_))));
    }

    #[test]
    fn test_non_finite_scores_rejected() {
        let c = classifier(vec![0.1, f32::NAN, 0.3, 0.4], ScoreKind::Probabilities);
        assert!(matches!(c.predict(&red_image(), 2), Err(ClassifyError::Inference(_))));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let c = classifier(vec![0.1, 0.2, 0.3, 0.4], ScoreKind::Probabilities);
        let small = Processor::new(PreprocessConfig { height: 8, width: 8, ..PreprocessConfig::imagenet() });
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])));
        let decoded = small.preprocess_image(&img).unwrap();
        assert!(matches!(c.predict(&decoded, 1), Err(ClassifyError::Inference(_))));
    }

    #[test]
    fn test_classify_rejects_garbage() {
        let c = classifier(vec![0.1, 0.2, 0.3, 0.4], ScoreKind::Probabilities);
        assert!(matches!(c.classify(b"not an image", 5), Err(ClassifyError::Decode(_))));
    }
}
