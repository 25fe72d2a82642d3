use std::{
    fs::File,
    io::{self, BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom},
    path::Path,
};

use thiserror::Error;

use crate::hex_reader::{HexReadError, HexReader};

/// Size in bytes of the words handed to the decoder.
pub const WORD_SIZE: usize = 4;

pub type Word = [u8; WORD_SIZE];

#[derive(Error, Debug)]
pub enum InputError {
    #[error("unable to parse input: {0}")]
    Hex(#[from] HexReadError),
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
}

/// How the input bytes are to be interpreted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum InputFormat {
    /// Machine code as is
    #[default]
    #[strum(serialize = "raw")]
    Raw,
    /// Machine code written as hex digits, e.g. `00 00 a0 e1`
    #[strum(serialize = "hex")]
    Hex,
}

enum Source<R> {
    Raw(R),
    Hex(HexReader<R>),
}

/// Produces the words to disassemble from a byte stream.
pub struct WordSource<R> {
    source: Source<R>,
}

impl<R: Read> WordSource<R> {
    pub fn new(input: R, format: InputFormat) -> Self {
        let source = match format {
            InputFormat::Raw => Source::Raw(input),
            InputFormat::Hex => Source::Hex(HexReader::new(input)),
        };
        Self { source }
    }

    /// Read the next word, `None` once the input is exhausted.
    pub fn next_word(&mut self) -> Result<Option<Word>, InputError> {
        match &mut self.source {
            Source::Raw(input) => Ok(read_raw_word(input)?),
            Source::Hex(reader) => Ok(reader.read_word(WORD_SIZE)?.map(|bytes| {
                let mut word = [0; WORD_SIZE];
                word.copy_from_slice(&bytes);
                word
            })),
        }
    }
}

fn read_raw_word(input: &mut impl Read) -> io::Result<Option<Word>> {
    let mut word = [0; WORD_SIZE];
    let mut filled = 0;

    while filled < WORD_SIZE {
        match input.read(&mut word[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    match filled {
        WORD_SIZE => Ok(Some(word)),
        0 => Ok(None),
        _ => {
            tracing::warn!(dropped = filled, "ignoring incomplete word at end of input");
            Ok(None)
        }
    }
}

/// Discard the first `skip` bytes of a stream that can't seek.
fn discard(input: &mut impl Read, skip: u64) -> io::Result<u64> {
    io::copy(&mut input.take(skip), &mut io::sink())
}

/// Open the input to disassemble, `None` or `-` meaning standard input, with the first `skip`
/// bytes already skipped.
#[tracing::instrument]
pub fn open(path: Option<&Path>, skip: u64) -> io::Result<Box<dyn BufRead>> {
    match path {
        Some(path) if path != Path::new("-") => {
            let mut file = File::open(path)?;
            if skip > 0 {
                file.seek(SeekFrom::Start(skip))?;
            }
            Ok(Box::new(BufReader::new(file)))
        }
        _ => {
            let mut stdin = io::stdin().lock();
            if skip > 0 {
                let skipped = discard(&mut stdin, skip)?;
                tracing::debug!(skipped, "skipped bytes of standard input");
            }
            Ok(Box::new(stdin))
        }
    }
}
