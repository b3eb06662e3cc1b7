//! Parser registry and archive loading.

use std::cmp::Reverse;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, info};

use items::ItemDefinition;

use crate::compressed::CompressedStreamParser;
use crate::cpio::CpioParser;
use crate::error::{ArchiveError, ArchiveResult, FormatMismatch};
use crate::tokenization::ArchiveTokenization;

/// Nested archives deeper than this are left opaque.
pub const MAX_NESTING_DEPTH: usize = 3;

/// A seekable byte stream a parser can read.
pub trait ArchiveInput: Read + Seek {}

impl<T: Read + Seek> ArchiveInput for T {}

/// Outcome of asking one parser to tokenize a stream.
pub type ParseOutcome = ArchiveResult<Result<ArchiveTokenization, FormatMismatch>>;

/// A format-specific tokenizer.
///
/// Implementations return `Ok(Err(FormatMismatch))` when the stream is not
/// in their format, so the loader can try the next parser. `Err` is reserved
/// for streams the parser recognised but could not process.
pub trait ArchiveParser: Send + Sync {
    /// Short format name recorded in the tokenization.
    fn name(&self) -> &'static str;

    /// Parsers with a higher priority are tried first.
    fn priority(&self) -> u32;

    /// Tokenizes `input`, whose whole-stream identity is `archive`.
    ///
    /// The stream is positioned at offset 0. The loader fills gaps and checks
    /// the chunk partition afterwards, so parsers only record the chunks they
    /// understand.
    fn tokenize(
        &self,
        input: &mut dyn ArchiveInput,
        archive: &ItemDefinition,
        context: &LoadContext<'_>,
    ) -> ParseOutcome;
}

/// Per-load state handed to parsers.
pub struct LoadContext<'a> {
    loader: &'a ArchiveLoader,
    depth: usize,
}

impl LoadContext<'_> {
    /// Nesting depth of the stream being parsed, 0 for the outermost.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Tries to tokenize bytes found inside the current archive.
    ///
    /// Returns `Ok(None)` when no parser recognises them or the nesting limit
    /// is reached.
    pub fn load_nested(&self, data: &[u8]) -> ArchiveResult<Option<ArchiveTokenization>> {
        if self.depth + 1 > MAX_NESTING_DEPTH {
            debug!(target: "diffgen::archive", depth = self.depth, "nesting limit reached");
            return Ok(None);
        }
        match self.loader.load_at_depth(&mut Cursor::new(data), self.depth + 1) {
            Ok(tokens) => Ok(Some(tokens)),
            Err(err) if err.is_format_error() => {
                debug!(target: "diffgen::archive", error = %err, "nested payload is not an archive");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// An ordered set of archive parsers.
///
/// Parsers are tried by descending priority, ties broken by ascending name.
///
/// ```
/// use archive::ArchiveLoader;
///
/// let loader = ArchiveLoader::with_default_parsers();
/// assert_eq!(loader.parser_names(), vec!["cpio", "gzip", "zstd"]);
/// ```
#[derive(Default)]
pub struct ArchiveLoader {
    parsers: Vec<Box<dyn ArchiveParser>>,
}

impl ArchiveLoader {
    /// Creates a loader with no parsers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a loader with the cpio, zstd and gzip parsers.
    #[must_use]
    pub fn with_default_parsers() -> Self {
        let mut loader = Self::new();
        loader
            .register(CpioParser)
            .register(CompressedStreamParser::zstd())
            .register(CompressedStreamParser::gzip());
        loader
    }

    /// Adds a parser, keeping the try order sorted.
    pub fn register<P: ArchiveParser + 'static>(&mut self, parser: P) -> &mut Self {
        self.parsers.push(Box::new(parser));
        self.parsers
            .sort_by_key(|parser| (Reverse(parser.priority()), parser.name()));
        self
    }

    /// Parser names in try order.
    #[must_use]
    pub fn parser_names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|parser| parser.name()).collect()
    }

    /// Opens and tokenizes the archive at `path`.
    pub fn load_path(&self, path: &Path) -> ArchiveResult<ArchiveTokenization> {
        let mut reader = BufReader::new(File::open(path)?);
        info!(target: "diffgen::archive", path = %path.display(), "loading archive");
        self.load(&mut reader)
    }

    /// Tokenizes `input` with the first parser that accepts it.
    pub fn load(&self, input: &mut dyn ArchiveInput) -> ArchiveResult<ArchiveTokenization> {
        self.load_at_depth(input, 0)
    }

    fn load_at_depth(
        &self,
        input: &mut dyn ArchiveInput,
        depth: usize,
    ) -> ArchiveResult<ArchiveTokenization> {
        let length = input.seek(SeekFrom::End(0))?;
        input.seek(SeekFrom::Start(0))?;
        let mut reader = &mut *input;
        let archive = ItemDefinition::from_reader(&mut reader, length)?;

        let context = LoadContext {
            loader: self,
            depth,
        };

        for parser in &self.parsers {
            input.seek(SeekFrom::Start(0))?;
            match parser.tokenize(input, &archive, &context)? {
                Ok(mut tokens) => {
                    tokens.fill_gaps(input)?;
                    tokens.check_partition()?;
                    info!(
                        target: "diffgen::archive",
                        format = parser.name(),
                        depth,
                        archive = %archive,
                        chunks = tokens.chunk_count(),
                        payload = tokens.payload().len(),
                        "tokenized archive"
                    );
                    return Ok(tokens);
                }
                Err(mismatch) => {
                    debug!(
                        target: "diffgen::archive",
                        format = parser.name(),
                        reason = mismatch.reason(),
                        "parser declined"
                    );
                }
            }
        }

        Err(ArchiveError::UnknownFormat {
            tried: self.parser_names().join(", "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Fixed {
        name: &'static str,
        priority: u32,
        accept: bool,
    }

    impl ArchiveParser for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn tokenize(
            &self,
            _input: &mut dyn ArchiveInput,
            archive: &ItemDefinition,
            _context: &LoadContext<'_>,
        ) -> ParseOutcome {
            if self.accept {
                Ok(Ok(ArchiveTokenization::new(self.name, archive.clone())))
            } else {
                Ok(Err(FormatMismatch::new("declined")))
            }
        }
    }

    #[test]
    fn parsers_are_ordered_by_priority_then_name() {
        let mut loader = ArchiveLoader::new();
        loader
            .register(Fixed { name: "b", priority: 10, accept: false })
            .register(Fixed { name: "a", priority: 10, accept: false })
            .register(Fixed { name: "z", priority: 90, accept: false });
        assert_eq!(loader.parser_names(), vec!["z", "a", "b"]);
    }

    #[test]
    fn first_accepting_parser_wins() {
        let mut loader = ArchiveLoader::new();
        loader
            .register(Fixed { name: "declines", priority: 90, accept: false })
            .register(Fixed { name: "accepts", priority: 10, accept: true });
        let tokens = loader
            .load(&mut Cursor::new(b"opaque bytes".to_vec()))
            .expect("load");
        assert_eq!(tokens.format(), "accepts");
        tokens.check_partition().expect("gap filled");
    }

    #[test]
    fn exhausting_parsers_is_a_format_error() {
        let mut loader = ArchiveLoader::new();
        loader.register(Fixed { name: "declines", priority: 1, accept: false });
        let err = loader
            .load(&mut Cursor::new(b"opaque".to_vec()))
            .expect_err("no parser");
        assert!(err.is_format_error());
    }
}
