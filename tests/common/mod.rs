//! Shared fixtures: a deterministic stand-in network and synthetic images.

#![allow(dead_code)]

use std::io::Cursor;

use cnn_recognition::{
    Classifier, InferenceBackend, Label, LabelVocabulary, PreprocessConfig, Processor, Result,
    ScoreKind,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::{Array1, Array4};

pub const NUM_CLASSES: usize = 1000;

/// Logits that depend only on the input tensor, like a frozen network.
pub struct StubBackend {
    classes: usize,
}

impl InferenceBackend for StubBackend {
    fn infer(&self, input: Array4<f32>) -> Result<Array1<f32>> {
        let mean = input.mean().unwrap_or(0.0);
        Ok(Array1::from_shape_fn(self.classes, |i| {
            (i as f32 * 0.731).sin() * 4.0 + mean * (i % 13) as f32 / 13.0
        }))
    }

    fn num_classes(&self) -> Option<usize> {
        Some(self.classes)
    }
}

pub fn vocabulary(classes: usize) -> LabelVocabulary {
    let labels = (0..classes)
        .map(|i| Label {
            class_id: format!("n{:08}", i),
            name: format!("class_number_{}", i),
        })
        .collect();
    LabelVocabulary::new(labels).unwrap()
}

pub fn classifier() -> Classifier {
    Classifier::new(
        "Stub",
        Box::new(StubBackend { classes: NUM_CLASSES }),
        Processor::new(PreprocessConfig::imagenet()),
        vocabulary(NUM_CLASSES),
        ScoreKind::Logits,
    )
    .unwrap()
}

/// A solid red disk on a white background.
pub fn red_disk(size: u32) -> RgbImage {
    let center = size as f32 / 2.0;
    let radius = size as f32 * 0.35;
    RgbImage::from_fn(size, size, |x, y| {
        let (dx, dy) = (x as f32 - center, y as f32 - center);
        if dx * dx + dy * dy <= radius * radius {
            Rgb([255, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

pub fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

pub fn red_disk_jpeg() -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(red_disk(224)), ImageFormat::Jpeg)
}
