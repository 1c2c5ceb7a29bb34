pub mod admission;
pub mod normalizer;
pub mod ocr_service;

pub use ocr_service::{extract_json_block, OcrExtractor, RawExtraction, RemoteOcrService};
