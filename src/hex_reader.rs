use std::io::{self, Read};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HexReadError {
    #[error("unexpected byte {found:#04x} at offset {offset}")]
    UnexpectedChar { found: u8, offset: usize },
    #[error("input ended in the middle of a word at offset {offset}")]
    TruncatedWord { offset: usize },
    #[error("failed to read hex input: {0}")]
    Io(#[from] io::Error),
}

impl HexReadError {
    /// Both the bad character and the truncated word mean the text itself is broken, as opposed
    /// to the stream failing underneath us.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            HexReadError::UnexpectedChar { .. } | HexReadError::TruncatedWord { .. }
        )
    }
}

/// Where we are inside the byte currently being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteState {
    ExpectHighNibble,
    ExpectLowNibbleOrWhitespace { high: u8 },
}

/// Whitespace as classified by the C locale, which unlike `u8::is_ascii_whitespace` includes
/// the vertical tab.
fn is_space(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
}

fn nibble(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None,
    }
}

/// Reads whitespace separated hex text and turns it into fixed size words.
///
/// Every byte is written as two hex digits, e.g. `de ad be ef`. Whitespace between bytes is
/// optional, so `deadbeef` reads the same. A single digit followed by whitespace is a byte of its
/// own, holding the digit's value: `d adbeef` reads as `[0x0d, 0xad, 0xbe, 0xef]`.
pub struct HexReader<R> {
    bytes: io::Bytes<R>,
    peeked: Option<u8>, // Lookahead that has been read from the source but not consumed yet
    offset: usize,      // Number of characters consumed so far
}

impl<R: Read> HexReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            bytes: input.bytes(),
            peeked: None,
            offset: 0,
        }
    }

    /// Number of characters consumed from the input so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn peek_char(&mut self) -> io::Result<Option<u8>> {
        if self.peeked.is_none() {
            self.peeked = self.bytes.next().transpose()?;
        }
        Ok(self.peeked)
    }

    fn read_char(&mut self) -> io::Result<Option<u8>> {
        let ch = self.peek_char()?;
        if ch.is_some() {
            self.peeked = None;
            self.offset += 1;
        }
        Ok(ch)
    }

    fn skip_whitespace(&mut self) -> io::Result<()> {
        while let Some(ch) = self.peek_char()? {
            if !is_space(ch) {
                break;
            }
            self.read_char()?;
        }
        Ok(())
    }

    fn unexpected(&self, ch: u8) -> HexReadError {
        HexReadError::UnexpectedChar {
            found: ch,
            // The offending character has already been consumed
            offset: self.offset - 1,
        }
    }

    fn read_byte(&mut self) -> Result<u8, HexReadError> {
        self.skip_whitespace()?;

        let mut state = ByteState::ExpectHighNibble;
        loop {
            match state {
                ByteState::ExpectHighNibble => {
                    let ch = match self.read_char()? {
                        Some(ch) => ch,
                        None => {
                            return Err(HexReadError::TruncatedWord {
                                offset: self.offset,
                            })
                        }
                    };
                    match nibble(ch) {
                        Some(high) => state = ByteState::ExpectLowNibbleOrWhitespace { high },
                        None => return Err(self.unexpected(ch)),
                    }
                }
                ByteState::ExpectLowNibbleOrWhitespace { high } => {
                    let ch = match self.peek_char()? {
                        Some(ch) => ch,
                        // Only whitespace ends a lone digit, the end of input truncates it
                        None => {
                            return Err(HexReadError::TruncatedWord {
                                offset: self.offset,
                            })
                        }
                    };
                    if let Some(low) = nibble(ch) {
                        self.read_char()?;
                        return Ok((high << 4) | low);
                    }
                    if is_space(ch) {
                        // Shorthand: the lone digit is the byte value, not its high nibble
                        return Ok(high);
                    }
                    self.read_char()?;
                    return Err(self.unexpected(ch));
                }
            }
        }
    }

    /// Read the next word of `word_size` bytes.
    ///
    /// Returns `Ok(None)` when the input holds nothing but whitespace before its end. Running
    /// out of input after the first digit of a word is an error, a word is never padded.
    #[tracing::instrument(skip(self), fields(offset = self.offset))]
    pub fn read_word(&mut self, word_size: usize) -> Result<Option<Vec<u8>>, HexReadError> {
        debug_assert!(word_size > 0, "words must hold at least one byte");

        self.skip_whitespace()?;
        if self.peek_char()?.is_none() {
            return Ok(None);
        }

        let mut word = Vec::with_capacity(word_size);
        for _ in 0..word_size {
            word.push(self.read_byte()?);
        }

        Ok(Some(word))
    }
}
