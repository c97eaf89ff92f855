//! Run artifact export: fixed-layout CSVs plus the JSON manifest.

pub mod artifacts;

pub use artifacts::{write_run_artifacts, ArtifactPaths, RunArtifacts};
