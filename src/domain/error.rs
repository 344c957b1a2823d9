//! Typed failures raised while assembling sample tables and datasets.

use std::path::PathBuf;
use thiserror::Error;

pub type DataResult<T> = Result<T, DataError>;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("path does not exist: {path}")]
    MissingPath { path: PathBuf },
    #[error("expected a directory at {path}: {msg}")]
    NotADirectory { path: PathBuf, msg: String },
    #[error("found 0 {dir_type} images in {path}")]
    NoImages { dir_type: String, path: PathBuf },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot pair {left} with {right}: {left_count} vs {right_count} files")]
    CountMismatch {
        left:        String,
        right:       String,
        left_count:  usize,
        right_count: usize,
    },
    #[error(
        "mismatch between anomalous images and depth images: {image} does not match {depth}; \
         depth files must follow the naming of the anomalous images (e.g. image '000.png', depth '000.tiff')"
    )]
    DepthNameMismatch { image: PathBuf, depth: PathBuf },
    #[error("missing {kind} file: {path}")]
    MissingFile { kind: &'static str, path: PathBuf },
    #[error("unsupported {kind}: {value}")]
    UnsupportedValue { kind: &'static str, value: String },
    #[error("split ratio must lie in [0, 1], got {0}")]
    InvalidRatio(f64),
    #[error("invalid transform: {0}")]
    InvalidTransform(String),
    #[error("mask_dir is set but the task is classification; use segmentation or detection")]
    MaskWithClassification,
    #[error("abnormal sample {path} has no mask but the {task} task needs one")]
    MaskRequired { path: PathBuf, task: String },
    #[error("dataset is not set up; call setup() first")]
    NotSetUp,
    #[error("subsample indices must be unique")]
    DuplicateIndices,
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("synthetic anomalies need all-normal source samples, found abnormal {path}")]
    AbnormalSource { path: PathBuf },
    #[error("{0}")]
    Other(String),
}
