//! Console rendering for the `run` command.

use std::fmt::Write;

use crate::postprocess::PredictionResult;

const RULE_WIDTH: usize = 60;
const BAR_WIDTH: usize = 50;

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// A 50 cell bar, one filled cell per two percentage points.
pub fn progress_bar(percent: f32) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 2.0) as usize).min(BAR_WIDTH);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

pub fn usage() -> String {
    let bin = env!("CARGO_PKG_NAME");
    format!(
        "{rule}\nCNN Image Recognition - Demo CLI\n{rule}\n\nUsage:\n    {bin} run <IMAGE>\n\nExample:\n    {bin} run test_image.jpg\n\nSupported formats: JPG, JPEG, PNG, BMP, GIF\n{rule}",
        rule = rule(),
    )
}

/// Ranked list with a textual bar per confidence.
pub fn render(result: &PredictionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", rule());
    let _ = writeln!(out, "TOP {} PREDICTIONS", result.len());
    let _ = writeln!(out, "{}", rule());
    for (rank, prediction) in result.iter().enumerate() {
        let percent = prediction.confidence * 100.0;
        let _ = writeln!(out, "\n{}. {}", rank + 1, prediction.name);
        let _ = writeln!(out, "   [{}] {:.2}%", progress_bar(percent), percent);
    }
    let _ = writeln!(out, "\n{}", rule());
    let _ = writeln!(out, "Analysis complete!");
    let _ = write!(out, "{}", rule());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprocess::Prediction;

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0).chars().count(), BAR_WIDTH);
        assert_eq!(progress_bar(100.0), "█".repeat(50));
        assert_eq!(progress_bar(37.9).chars().filter(|c| *c == '█').count(), 18);
        assert_eq!(progress_bar(250.0), "█".repeat(50));
    }

    #[test]
    fn test_render() {
        let result = PredictionResult {
            predictions: vec![
                Prediction { class_id: "n02099601".into(), name: "Golden Retriever".into(), confidence: 0.8123 },
                Prediction { class_id: "n02099712".into(), name: "Labrador Retriever".into(), confidence: 0.1 },
            ],
        };
        let text = render(&result);
        assert!(text.contains("TOP 2 PREDICTIONS"));
        assert!(text.contains("\n1. Golden Retriever\n"));
        assert!(text.contains("] 81.23%"));
        assert!(text.contains("2. Labrador Retriever"));
        assert!(text.ends_with(&rule()));
    }

    #[test]
    fn test_usage_lists_formats() {
        assert!(usage().contains("JPG, JPEG, PNG, BMP, GIF"));
    }
}
