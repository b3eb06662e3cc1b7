//! JSON document form of a tokenization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use items::{ItemDefinition, Recipe};

use crate::error::ArchiveError;
use crate::payload::PayloadCatalog;
use crate::tokenization::{ArchiveTokenization, Chunk};

/// Flat, list-based form written to `source.json` / `target.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct TokenizationDocument {
    #[serde(rename = "Type")]
    format: String,
    archive_item: ItemDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_item: Option<ItemDefinition>,
    #[serde(default)]
    chunks: Vec<Chunk>,
    #[serde(default)]
    payload: Vec<ItemDefinition>,
    #[serde(default)]
    forward_recipes: Vec<Recipe>,
    #[serde(default)]
    reverse_recipes: Vec<Recipe>,
}

impl From<ArchiveTokenization> for TokenizationDocument {
    fn from(tokens: ArchiveTokenization) -> Self {
        Self {
            chunks: tokens.chunks().collect(),
            payload: tokens.payload_items(),
            format: tokens.format,
            archive_item: tokens.archive_item,
            source_item: tokens.source_item,
            forward_recipes: tokens.forward.into_values().collect(),
            reverse_recipes: tokens.reverse.into_values().collect(),
        }
    }
}

impl TryFrom<TokenizationDocument> for ArchiveTokenization {
    type Error = ArchiveError;

    fn try_from(document: TokenizationDocument) -> Result<Self, Self::Error> {
        let mut tokens = Self::new(document.format, document.archive_item);
        tokens.source_item = document.source_item;

        for chunk in document.chunks {
            tokens.insert_chunk(chunk.offset, chunk.item)?;
        }

        let mut payload = PayloadCatalog::new();
        for item in document.payload {
            for name in item.names() {
                payload.add(name, item.clone());
            }
        }
        tokens.payload = payload;

        tokens.forward = index_unique(document.forward_recipes, "forward recipe")?;
        tokens.reverse = index_unique(document.reverse_recipes, "reverse recipe")?;
        Ok(tokens)
    }
}

fn index_unique(
    recipes: Vec<Recipe>,
    what: &'static str,
) -> Result<BTreeMap<ItemDefinition, Recipe>, ArchiveError> {
    let mut map = BTreeMap::new();
    for recipe in recipes {
        let key = recipe.result().without_names();
        if map.contains_key(&key) {
            return Err(ArchiveError::Duplicate {
                what,
                key: recipe.result().to_string(),
            });
        }
        map.insert(key, recipe);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_recipe_results_are_fatal() {
        let archive = ItemDefinition::from_bytes(b"aaaa");
        let part = ItemDefinition::from_bytes(b"aa");
        let recipe = Recipe::region(part, archive.clone(), 0).expect("region");
        let document = TokenizationDocument {
            format: "test".to_string(),
            archive_item: archive,
            source_item: None,
            chunks: Vec::new(),
            payload: Vec::new(),
            forward_recipes: Vec::new(),
            reverse_recipes: vec![recipe.clone(), recipe],
        };
        let err = ArchiveTokenization::try_from(document).expect_err("duplicate");
        assert!(matches!(err, ArchiveError::Duplicate { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn duplicate_chunk_offsets_are_fatal() {
        let archive = ItemDefinition::from_bytes(b"abab");
        let chunk = Chunk {
            offset: 0,
            item: ItemDefinition::from_bytes(b"ab"),
        };
        let json = serde_json::json!({
            "Type": "test",
            "ArchiveItem": archive,
            "Chunks": [chunk.clone(), chunk],
        });
        let err = serde_json::from_value::<ArchiveTokenization>(json).expect_err("duplicate");
        assert!(err.to_string().contains("Duplicate chunk offset"));
    }
}
