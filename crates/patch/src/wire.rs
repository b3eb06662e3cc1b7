//! Little-endian primitives and the item and recipe encodings.
//!
//! ## Wire Format
//!
//! - **item**: `u64 length`, `u8 hash count`, then per hash `u8 algorithm`,
//!   `u8 digest length` and the digest bytes.
//! - **recipe**: `u8 tag`, the result item, `u8 number count` followed by that
//!   many `u64`, then `u64 item count` followed by that many items.
//!
//! Tags are the ones returned by [`items::recipe::recipe_tag_for_name`].

use std::io::{self, Read, Write};

use checksums::{Hash, HashAlgorithm, Hashes};
use items::recipe::{recipe_name_for_tag, recipe_tag_for_name};
use items::{ItemDefinition, Recipe, RecipeRecord};

use crate::error::{PatchError, PatchResult};

#[inline]
pub(crate) fn write_u8<W: Write + ?Sized>(writer: &mut W, value: u8) -> io::Result<()> {
    writer.write_all(&[value])
}

#[inline]
pub(crate) fn read_u8<R: Read + ?Sized>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

#[inline]
pub(crate) fn write_u64<W: Write + ?Sized>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

#[inline]
pub(crate) fn read_u64<R: Read + ?Sized>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Reads exactly `length` bytes without trusting `length` for the allocation.
pub(crate) fn read_bytes<R: Read + ?Sized>(reader: &mut R, length: u64) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    reader.take(length).read_to_end(&mut data)?;
    if (data.len() as u64) != length {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {length} bytes, found {}", data.len()),
        ));
    }
    Ok(data)
}

fn small_count(what: &'static str, count: usize) -> PatchResult<u8> {
    u8::try_from(count).map_err(|_| PatchError::CountOverflow { what, count })
}

pub(crate) fn write_item<W: Write + ?Sized>(writer: &mut W, item: &ItemDefinition) -> PatchResult<()> {
    write_u64(writer, item.length())?;
    write_u8(writer, small_count("hash", item.hashes().len())?)?;
    for (algorithm, hash) in item.hashes() {
        write_u8(writer, algorithm.tag())?;
        write_u8(writer, small_count("digest byte", hash.value().len())?)?;
        writer.write_all(hash.value())?;
    }
    Ok(())
}

pub(crate) fn read_item<R: Read + ?Sized>(reader: &mut R) -> PatchResult<ItemDefinition> {
    let length = read_u64(reader)?;
    let count = read_u8(reader)?;
    let mut hashes = Hashes::new();
    for _ in 0..count {
        let tag = read_u8(reader)?;
        let algorithm = HashAlgorithm::from_tag(tag).ok_or(PatchError::UnknownHashAlgorithm(tag))?;
        let digest_len = read_u8(reader)?;
        let digest = read_bytes(reader, u64::from(digest_len))?;
        hashes.insert(algorithm, Hash::new(algorithm, digest)?);
    }
    Ok(ItemDefinition::new(length, hashes))
}

pub(crate) fn write_recipe<W: Write + ?Sized>(writer: &mut W, recipe: &Recipe) -> PatchResult<()> {
    let tag = recipe_tag_for_name(recipe.name())
        .ok_or_else(|| PatchError::UnencodableRecipe(recipe.name().to_string()))?;
    write_u8(writer, tag)?;
    write_item(writer, recipe.result())?;

    let numbers = recipe.number_ingredients();
    write_u8(writer, small_count("number ingredient", numbers.len())?)?;
    for number in numbers {
        write_u64(writer, number)?;
    }

    let items = recipe.item_ingredients();
    write_u64(writer, items.len() as u64)?;
    for item in items {
        write_item(writer, item)?;
    }
    Ok(())
}

pub(crate) fn read_recipe<R: Read + ?Sized>(reader: &mut R) -> PatchResult<Recipe> {
    let tag = read_u8(reader)?;
    let name = recipe_name_for_tag(tag).ok_or(PatchError::UnknownRecipeTag(tag))?;
    let result = read_item(reader)?;

    let number_count = read_u8(reader)?;
    let mut number_ingredients = Vec::with_capacity(usize::from(number_count));
    for _ in 0..number_count {
        number_ingredients.push(read_u64(reader)?);
    }

    let item_count = read_u64(reader)?;
    let mut item_ingredients = Vec::new();
    for _ in 0..item_count {
        item_ingredients.push(read_item(reader)?);
    }

    let record = RecipeRecord {
        name: name.to_string(),
        result,
        number_ingredients,
        item_ingredients,
    };
    Ok(Recipe::try_from(record)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn integers_are_little_endian() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 0x0102_0304_0506_0708).expect("write");
        assert_eq!(buf, [8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(read_u64(&mut Cursor::new(buf)).expect("read"), 0x0102_0304_0506_0708);
    }

    #[test]
    fn item_encoding_drops_names() {
        let item = ItemDefinition::from_bytes(b"wire item").with_name("named");
        let mut buf = Vec::new();
        write_item(&mut buf, &item).expect("write");
        // length, count, then md5 (2 + 16) and sha256 (2 + 32)
        assert_eq!(buf.len(), 8 + 1 + 18 + 34);
        let back = read_item(&mut Cursor::new(buf)).expect("read");
        assert_eq!(back, item);
        assert!(back.names().is_empty());
    }

    #[test]
    fn recipes_round_trip_through_their_tag() {
        let whole = ItemDefinition::from_bytes(b"abcdef");
        let part = ItemDefinition::from_bytes(b"cd");
        let recipe = Recipe::region(part, whole, 2).expect("region");
        let mut buf = Vec::new();
        write_recipe(&mut buf, &recipe).expect("write");
        assert_eq!(buf[0], 2);
        assert_eq!(read_recipe(&mut Cursor::new(buf)).expect("read"), recipe);
    }

    #[test]
    fn unknown_tags_are_format_errors() {
        let err = read_recipe(&mut Cursor::new(vec![0xee])).expect_err("bad tag");
        assert!(matches!(err, PatchError::UnknownRecipeTag(0xee)));

        let mut buf = Vec::new();
        write_u64(&mut buf, 1).expect("length");
        buf.extend_from_slice(&[1, 9, 0]);
        let err = read_item(&mut Cursor::new(buf)).expect_err("bad algorithm");
        assert!(err.is_format_error());
    }

    #[test]
    fn short_reads_do_not_over_allocate() {
        let err = read_bytes(&mut Cursor::new(vec![1, 2, 3]), u64::MAX).expect_err("short");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
