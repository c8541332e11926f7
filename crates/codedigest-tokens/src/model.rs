//! Token models and their characters-per-token divisors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use codedigest_core::DigestError;

/// Named model families with a built-in divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ModelFamily {
    Default,
    Gpt,
    Claude,
    Llama,
    Gemini,
    Code,
}

impl ModelFamily {
    /// Average characters per token.
    pub fn divisor(self) -> f64 {
        match self {
            Self::Default | Self::Gpt => 4.0,
            Self::Claude => 3.5,
            Self::Llama => 3.8,
            Self::Gemini => 4.2,
            Self::Code => 3.2,
        }
    }
}

/// Model used for token estimation.
///
/// Parsed from `default`, `gpt`, `claude`, `llama`, `gemini`, `code`, or
/// `custom:<divisor>` (also accepted as `custom(<divisor>)`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenModel {
    Family(ModelFamily),
    Custom(f64),
}

impl TokenModel {
    /// Average characters per token for this model.
    pub fn divisor(self) -> f64 {
        match self {
            Self::Family(family) => family.divisor(),
            Self::Custom(divisor) => divisor,
        }
    }

    /// Every named model.
    pub fn families() -> impl Iterator<Item = TokenModel> {
        ModelFamily::iter().map(Self::Family)
    }

    /// Parse a model identifier, mapping failures to a configuration error.
    pub fn parse(identifier: &str) -> Result<Self, DigestError> {
        identifier.parse()
    }
}

impl Default for TokenModel {
    fn default() -> Self {
        Self::Family(ModelFamily::Default)
    }
}

impl fmt::Display for TokenModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Family(family) => write!(f, "{family}"),
            Self::Custom(divisor) => write!(f, "custom:{divisor}"),
        }
    }
}

impl FromStr for TokenModel {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(family) = s.parse::<ModelFamily>() {
            return Ok(Self::Family(family));
        }

        let lower = s.to_ascii_lowercase();
        let custom = lower
            .strip_prefix("custom:")
            .or_else(|| lower.strip_prefix("custom(").and_then(|r| r.strip_suffix(')')));
        let Some(value) = custom else {
            let known: Vec<String> = ModelFamily::iter().map(|f| f.to_string()).collect();
            return Err(DigestError::config(format!(
                "Unknown token model '{s}' (expected one of {}, or custom:<divisor>)",
                known.join(", ")
            )));
        };

        match value.trim().parse::<f64>() {
            Ok(divisor) if divisor.is_finite() && divisor > 0.0 => Ok(Self::Custom(divisor)),
            _ => Err(DigestError::config(format!(
                "Custom token divisor must be a positive number, got '{value}'"
            ))),
        }
    }
}

impl Serialize for TokenModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TokenModel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
