//! Error taxonomy shared by the inference service and both front-ends.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    /// The model or its label vocabulary could not be made ready. Fatal.
    #[error("failed to load model: {0}")]
    Startup(String),

    /// Missing argument, missing file or malformed upload.
    #[error("{0}")]
    Input(String),

    /// The bytes are not a recognizable image.
    #[error("invalid image: {0}")]
    Decode(String),

    /// Unexpected failure inside the forward pass.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl ClassifyError {
    /// Whether the message is safe and useful to show to the end user as-is.
    pub fn is_user_error(&self) -> bool {
        matches!(self, ClassifyError::Input(_) | ClassifyError::Decode(_))
    }
}

impl From<image::ImageError> for ClassifyError {
    fn from(e: image::ImageError) -> Self {
        ClassifyError::Decode(e.to_string())
    }
}

impl From<ort::Error> for ClassifyError {
    fn from(e: ort::Error) -> Self {
        ClassifyError::Inference(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClassifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors() {
        assert!(ClassifyError::Input("no file".into()).is_user_error());
        assert!(ClassifyError::Decode("bad header".into()).is_user_error());
        assert!(!ClassifyError::Inference("shape".into()).is_user_error());
        assert!(!ClassifyError::Startup("weights".into()).is_user_error());
    }

    #[test]
    fn test_decode_message() {
        let e = ClassifyError::Decode("unsupported format".into());
        assert_eq!(e.to_string(), "invalid image: unsupported format");
    }
}
