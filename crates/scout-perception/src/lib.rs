//! `scout-perception` – what the steps do with perception results.
//!
//! # Modules
//!
//! - [`fusion`] – [`merge`][fusion::merge]: folds newly observed
//!   [`Candidate`][scout_types::Candidate]s into a running
//!   [`ResultSet`][fusion::ResultSet], keeping the best-scoring candidate per
//!   subject.
//! - [`transform`] – [`TransformService`][transform::TransformService]: the
//!   seam steps use to re-express poses in another frame, with the in-process
//!   [`TfListener`][transform::TfListener] implementation backed by a
//!   [`FrameTree`][transform::FrameTree].

pub mod fusion;
pub mod transform;

pub use fusion::{Completeness, ResultSet, merge};
pub use transform::{FrameTree, TfListener, Transform, TransformError, TransformService};
