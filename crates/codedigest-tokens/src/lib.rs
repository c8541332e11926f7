//! Heuristic token estimation for codedigest.
//!
//! Estimates are character-count based: the text is split into plain and
//! comment-like characters, comment characters are scaled by a weight, and
//! the total is divided by the model's characters-per-token divisor.

pub mod comments;
mod estimator;
mod model;

pub use comments::{CharSplit, split_chars, split_chars_for};
pub use estimator::{TokenEstimator, estimate, estimate_weighted};
pub use model::{ModelFamily, TokenModel};
