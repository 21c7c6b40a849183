//! gatekeeper-core — Face roster matching and licence plate reading.
//!
//! Uses YOLO for face, plate and character detection and ArcFace for face
//! embeddings, all running via ONNX Runtime for CPU inference.

pub mod annotate;
pub mod detector;
pub mod enhance;
pub mod faces;
pub mod labels;
pub mod plate;
pub mod recognizer;
pub mod roster;
pub mod types;

pub use detector::{DetectorOptions, ObjectDetector, YoloDetector};
pub use faces::{recognize_faces, FaceReport};
pub use labels::LabelTable;
pub use plate::{read_plate, LetterOrder, PlateOptions, PlateReading};
pub use recognizer::{FaceEmbedder, FaceRecognizer};
pub use types::{BoundingBox, CosineMatcher, Detection, Embedding, MatchResult, Matcher, PixelRect, RosterEntry};
