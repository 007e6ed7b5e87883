//! Token metadata and its merge rule.

use serde::{Deserialize, Serialize};

use crate::pubkey::Pubkey;

/// Display metadata for a mint. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Metadata {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            symbol: Some(symbol.into()),
            image: Some(image.into()),
        }
    }

    /// True when any field is absent or empty.
    pub fn is_partial(&self) -> bool {
        [&self.name, &self.symbol, &self.image]
            .iter()
            .any(|f| is_blank(f))
    }

    /// True when every field is absent or empty.
    pub fn is_empty(&self) -> bool {
        [&self.name, &self.symbol, &self.image]
            .iter()
            .all(|f| is_blank(f))
    }

    /// Fill blank fields from `other`. Populated fields are never overwritten.
    pub fn merge(&mut self, other: &Metadata) {
        fill(&mut self.name, &other.name);
        fill(&mut self.symbol, &other.symbol);
        fill(&mut self.image, &other.image);
    }
}

fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, str::is_empty)
}

fn fill(field: &mut Option<String>, from: &Option<String>) {
    if is_blank(field) && !is_blank(from) {
        *field = from.clone();
    }
}

/// A mint with resolved decimals and whatever metadata is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub mint: Pubkey,
    pub decimals: u8,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl Token {
    pub fn new(mint: Pubkey, decimals: u8) -> Self {
        Self {
            mint,
            decimals,
            metadata: Metadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_partial(&self) -> bool {
        self.metadata.is_partial()
    }
}
