//! assetpipe - a front-end asset build pipeline
//!
//! Bundles ES modules into one hash-named script, compiles SCSS into one
//! hash-named and vendor-prefixed stylesheet, copies HTML pages and points
//! their marker blocks at the current artifacts. A development mode serves
//! the output directory and rebuilds what changed.

pub mod cli;
pub mod domain;
pub mod pipeline;
pub mod storage;

pub use domain::ContentHash;
pub use pipeline::{Artifact, ArtifactKind, AssetManifest, Pipeline};
pub use storage::Project;
