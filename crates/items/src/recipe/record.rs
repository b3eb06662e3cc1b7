//! Name-tagged recipe representation used at serialization boundaries.

use serde::{Deserialize, Serialize};

use compress::algorithm::CompressionFormat;

use super::{DeltaFormat, Recipe, RecipeKind};
use crate::error::ItemError;
use crate::item::ItemDefinition;

/// Flat form of a recipe: a name plus positional ingredients.
///
/// This is the shape recipes take in JSON documents and in the patch
/// encoding; [`Recipe`] converts to and from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecipeRecord {
    /// Boundary name of the variant.
    pub name: String,
    /// Item produced.
    pub result: ItemDefinition,
    /// Numeric ingredients.
    #[serde(default)]
    pub number_ingredients: Vec<u64>,
    /// Item ingredients.
    #[serde(default)]
    pub item_ingredients: Vec<ItemDefinition>,
}

impl From<Recipe> for RecipeRecord {
    fn from(recipe: Recipe) -> Self {
        Self {
            name: recipe.name().to_string(),
            number_ingredients: recipe.number_ingredients(),
            item_ingredients: recipe.item_ingredients().into_iter().cloned().collect(),
            result: recipe.result,
        }
    }
}

impl TryFrom<RecipeRecord> for Recipe {
    type Error = ItemError;

    fn try_from(record: RecipeRecord) -> Result<Self, Self::Error> {
        let RecipeRecord {
            name,
            result,
            number_ingredients: numbers,
            item_ingredients: items,
        } = record;

        let kind = match name.as_str() {
            "Copy" => {
                let ([], [item]) = shape::<0, 1>(&name, &numbers, items)?;
                RecipeKind::Copy { item }
            }
            "Region" => {
                let ([offset, length], [item]) = shape::<2, 1>(&name, &numbers, items)?;
                check_length(&name, length, &result)?;
                RecipeKind::Region { item, offset }
            }
            "Concatenation" => {
                if !numbers.is_empty() {
                    return Err(ItemError::invalid(&name, "takes no numeric ingredients"));
                }
                RecipeKind::Concatenation { items }
            }
            "BsDiffDelta" | "ZstdDelta" => {
                let ([], [delta, basis]) = shape::<0, 2>(&name, &numbers, items)?;
                let format = if name == "BsDiffDelta" {
                    DeltaFormat::BsDiff
                } else {
                    DeltaFormat::Zstd
                };
                RecipeKind::ApplyDelta {
                    format,
                    delta,
                    basis,
                }
            }
            "ZstdDecompression" | "GzDecompression" | "ZlibDecompression" => {
                let ([], [item]) = shape::<0, 1>(&name, &numbers, items)?;
                let format = match name.as_str() {
                    "GzDecompression" => CompressionFormat::Gzip,
                    "ZlibDecompression" => CompressionFormat::Zlib,
                    _ => CompressionFormat::Zstd,
                };
                RecipeKind::Decompression { format, item }
            }
            "ZstdCompression" => {
                let ([major, minor, level], [item]) = shape::<3, 1>(&name, &numbers, items)?;
                RecipeKind::Compression {
                    format: CompressionFormat::Zstd,
                    item,
                    major,
                    minor,
                    level,
                }
            }
            "AllZero" => {
                let ([length], []) = shape::<1, 0>(&name, &numbers, items)?;
                check_length(&name, length, &result)?;
                RecipeKind::AllZero
            }
            "Slice" => {
                let ([offset], [blob]) = shape::<1, 1>(&name, &numbers, items)?;
                RecipeKind::Slice { blob, offset }
            }
            "InlineAssetCopy" => {
                let ([offset], []) = shape::<1, 0>(&name, &numbers, items)?;
                RecipeKind::InlineAssetCopy { offset }
            }
            "CopySource" => {
                let ([offset], []) = shape::<1, 0>(&name, &numbers, items)?;
                RecipeKind::CopySource { offset }
            }
            "ApplyNestedDiff" => {
                let ([], [diff, basis]) = shape::<0, 2>(&name, &numbers, items)?;
                RecipeKind::NestedDiff { diff, basis }
            }
            _ => return Err(ItemError::UnknownRecipe(name)),
        };

        Recipe::new(result, kind)
    }
}

/// Splits positional ingredients into fixed-size arrays, rejecting any other arity.
fn shape<const N: usize, const I: usize>(
    name: &str,
    numbers: &[u64],
    items: Vec<ItemDefinition>,
) -> Result<([u64; N], [ItemDefinition; I]), ItemError> {
    let found = (numbers.len(), items.len());
    let numbers = <[u64; N]>::try_from(numbers);
    let items = <[ItemDefinition; I]>::try_from(items);
    match (numbers, items) {
        (Ok(numbers), Ok(items)) => Ok((numbers, items)),
        _ => Err(ItemError::invalid(
            name,
            format!(
                "expected {N} numbers and {I} items, found {} and {}",
                found.0, found.1
            ),
        )),
    }
}

fn check_length(name: &str, length: u64, result: &ItemDefinition) -> Result<(), ItemError> {
    if length == result.length() {
        Ok(())
    } else {
        Err(ItemError::invalid(
            name,
            format!("length {length} disagrees with result {}", result.length()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(data: &[u8]) -> ItemDefinition {
        ItemDefinition::from_bytes(data)
    }

    #[test]
    fn region_record_carries_offset_and_length() {
        let recipe = Recipe::region(item(b"345"), item(b"0123456789"), 3).expect("region");
        let record = RecipeRecord::from(recipe.clone());
        assert_eq!(record.name, "Region");
        assert_eq!(record.number_ingredients, vec![3, 3]);
        assert_eq!(Recipe::try_from(record).expect("back"), recipe);
    }

    #[test]
    fn unknown_names_are_rejected() {
        let record = RecipeRecord {
            name: "Teleport".to_string(),
            result: item(b"x"),
            number_ingredients: Vec::new(),
            item_ingredients: Vec::new(),
        };
        assert!(matches!(
            Recipe::try_from(record),
            Err(ItemError::UnknownRecipe(name)) if name == "Teleport"
        ));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let record = RecipeRecord {
            name: "ZstdDelta".to_string(),
            result: item(b"x"),
            number_ingredients: Vec::new(),
            item_ingredients: vec![item(b"only one")],
        };
        assert!(matches!(
            Recipe::try_from(record),
            Err(ItemError::InvalidRecipe { .. })
        ));
    }

    #[test]
    fn region_length_must_match_result() {
        let record = RecipeRecord {
            name: "Region".to_string(),
            result: item(b"345"),
            number_ingredients: vec![3, 4],
            item_ingredients: vec![item(b"0123456789")],
        };
        assert!(Recipe::try_from(record).is_err());
    }

    #[test]
    fn decompression_names_select_format() {
        let record = RecipeRecord {
            name: "GzDecompression".to_string(),
            result: item(b"plain"),
            number_ingredients: Vec::new(),
            item_ingredients: vec![item(b"gzipped")],
        };
        let recipe = Recipe::try_from(record).expect("gz");
        assert!(matches!(
            recipe.kind(),
            RecipeKind::Decompression {
                format: CompressionFormat::Gzip,
                ..
            }
        ));
    }
}
