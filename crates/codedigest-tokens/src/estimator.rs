//! Token estimation.

use std::collections::BTreeMap;

use codedigest_core::{DigestConfig, DigestError};

use crate::comments::{CharSplit, split_chars, split_chars_for};
use crate::model::TokenModel;

/// Estimate tokens for `text` with a comment weight of 1.0.
///
/// `divisor_override` replaces the model's divisor when set.
pub fn estimate(text: &str, model: TokenModel, divisor_override: Option<f64>) -> usize {
    estimate_weighted(text, divisor_override.unwrap_or(model.divisor()), 1.0)
}

/// `ceil((plain + comment * weight) / divisor)`.
pub fn estimate_weighted(text: &str, divisor: f64, comment_weight: f64) -> usize {
    if text.is_empty() {
        return 0;
    }
    weigh(split_chars(text), divisor, comment_weight)
}

fn weigh(split: CharSplit, divisor: f64, comment_weight: f64) -> usize {
    if divisor <= 0.0 {
        return 0;
    }
    let weighted = split.plain as f64 + split.comment as f64 * comment_weight.max(0.0);
    (weighted / divisor).ceil() as usize
}

/// Model, per-extension divisor overrides and comment weight bundled
/// together.
#[derive(Debug, Clone)]
pub struct TokenEstimator {
    model: TokenModel,
    overrides: BTreeMap<String, f64>,
    comment_weight: f64,
}

impl TokenEstimator {
    pub fn new(model: TokenModel) -> Self {
        Self {
            model,
            overrides: BTreeMap::new(),
            comment_weight: 1.0,
        }
    }

    /// Build from configuration. Unknown model identifiers and
    /// non-positive overrides are configuration errors.
    pub fn from_config(config: &DigestConfig) -> Result<Self, DigestError> {
        let model = TokenModel::parse(&config.token_model)?;
        let mut estimator = Self::new(model).with_comment_weight(config.comment_weight);
        for (ext, divisor) in &config.token_divisor_overrides {
            estimator = estimator.with_override(ext, *divisor)?;
        }
        tracing::debug!(
            model = %estimator.model,
            comment_weight = estimator.comment_weight,
            overrides = estimator.overrides.len(),
            "Token estimator configured"
        );
        Ok(estimator)
    }

    pub fn with_comment_weight(mut self, weight: f64) -> Self {
        self.comment_weight = weight.max(0.0);
        self
    }

    pub fn with_override(mut self, extension: &str, divisor: f64) -> Result<Self, DigestError> {
        if !divisor.is_finite() || divisor <= 0.0 {
            return Err(DigestError::config(format!(
                "Token divisor override for '{extension}' must be positive, got {divisor}"
            )));
        }
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        self.overrides.insert(ext, divisor);
        Ok(self)
    }

    pub fn model(&self) -> TokenModel {
        self.model
    }

    pub fn comment_weight(&self) -> f64 {
        self.comment_weight
    }

    /// Divisor used for a file extension.
    pub fn divisor_for(&self, extension: Option<&str>) -> f64 {
        extension
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .and_then(|ext| self.overrides.get(&ext).copied())
            .unwrap_or(self.model.divisor())
    }

    /// Estimate tokens for the content of a file with the given extension.
    pub fn estimate(&self, text: &str, extension: Option<&str>) -> usize {
        if text.is_empty() {
            return 0;
        }
        weigh(
            split_chars_for(text, extension),
            self.divisor_for(extension),
            self.comment_weight,
        )
    }

    /// Sum of estimates over `(text, extension)` pairs.
    pub fn estimate_all<'a>(
        &self,
        items: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
    ) -> usize {
        items
            .into_iter()
            .map(|(text, ext)| self.estimate(text, ext))
            .sum()
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(TokenModel::default())
    }
}
