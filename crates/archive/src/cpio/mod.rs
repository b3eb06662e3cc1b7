//! newc cpio support: header codec, tokenizer and an in-memory writer.

mod header;
mod parser;
mod writer;

pub use header::{HEADER_LEN, NEWC_CRC_MAGIC, NEWC_MAGIC, NewcHeader, TRAILER_NAME, padding_for};
pub use parser::CpioParser;
pub use writer::CpioWriter;
