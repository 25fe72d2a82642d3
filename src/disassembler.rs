use std::{
    io::{self, BufWriter, Read, Write},
    num::ParseIntError,
    path::PathBuf,
};

use anyhow::Context;
use thiserror::Error;
use yaxpeax_arch::{Decoder as _, U8Reader};
use yaxpeax_arm::armv7::InstDecoder;

use crate::input::{self, InputError, InputFormat, Word, WordSource, WORD_SIZE};

pub mod listing;

/// Byte order of the words in the input.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum_macros::Display,
)]
pub enum Endianness {
    #[value(name = "B", alias = "big")]
    #[strum(serialize = "big")]
    Big,
    #[default]
    #[value(name = "L", alias = "little")]
    #[strum(serialize = "little")]
    Little,
}

impl Endianness {
    /// Compose the 32-bit instruction word from its bytes as they appear in the input.
    pub fn compose(self, word: Word) -> u32 {
        match self {
            Endianness::Big => u32::from_be_bytes(word),
            Endianness::Little => u32::from_le_bytes(word),
        }
    }
}

/// Turns an instruction word into its textual form.
pub trait Decoder {
    /// Decode `word`, located at `address`, into mnemonic and operands.
    fn decode(&self, word: u32, address: u32) -> String;
}

/// ARMv7 decoder backed by `yaxpeax-arm`.
#[derive(Default)]
pub struct ArmDecoder {
    decoder: InstDecoder,
}

/// Absolute target of a `B`, `BL` or immediate `BLX` located at `address`.
///
/// The encoded offset is relative to the PC, which reads two instructions ahead.
pub fn branch_target(word: u32, address: u32) -> Option<u32> {
    if (word >> 25) & 0b111 != 0b101 {
        return None;
    }

    let offset = (((word & 0x00ff_ffff) << 8) as i32 >> 6) as u32;
    let target = address.wrapping_add(8).wrapping_add(offset);
    if word >> 28 == 0xf {
        // BLX carries the halfword bit of the Thumb target in the link bit
        Some(target | ((word >> 24) & 1) << 1)
    } else {
        Some(target)
    }
}

impl Decoder for ArmDecoder {
    fn decode(&self, word: u32, address: u32) -> String {
        let bytes = word.to_le_bytes();
        let mut reader = U8Reader::new(&bytes);
        match self.decoder.decode(&mut reader) {
            Ok(ins) => match branch_target(word, address) {
                Some(target) => format!("{} ; {:#010x}", ins, target),
                None => ins.to_string(),
            },
            Err(err) => format!("undefined ({})", err),
        }
    }
}

#[derive(Error, Debug)]
pub enum DisassemblyError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("failed to write listing: {0}")]
    Output(#[from] io::Error),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DisassemblyOptions {
    /// Memory address of the first word
    pub memory_offset: u32,
    /// Number of bytes to disassemble, everything if `None`
    pub limit: Option<u64>,
    pub endianness: Endianness,
}

pub struct Disassembler<D> {
    decoder: D,
    options: DisassemblyOptions,
}

impl<D: Decoder> Disassembler<D> {
    pub fn new(decoder: D, options: DisassemblyOptions) -> Self {
        Self { decoder, options }
    }

    /// Disassemble words from `source` until it runs dry or the byte limit is reached, writing
    /// one listing line per word to `out`.
    ///
    /// Returns the number of words disassembled.
    #[tracing::instrument(skip_all, fields(options = ?self.options))]
    pub fn run<R: Read, W: Write>(
        &self,
        source: &mut WordSource<R>,
        out: &mut W,
    ) -> Result<usize, DisassemblyError> {
        let mut address = self.options.memory_offset;
        let mut disassembled: u64 = 0;
        let mut words = 0;

        while self.options.limit.map_or(true, |limit| disassembled < limit) {
            let Some(word) = source.next_word()? else {
                break;
            };

            let data = self.options.endianness.compose(word);
            let text = self.decoder.decode(data, address);
            out.write_all(listing::generate_line(address, data, &text).as_bytes())?;

            address = address.wrapping_add(WORD_SIZE as u32);
            disassembled += WORD_SIZE as u64;
            words += 1;
        }

        Ok(words)
    }
}

/// Accepts decimal numbers as well as hex numbers prefixed with `0x`.
fn parse_number(s: &str) -> Result<u64, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn parse_address(s: &str) -> Result<u32, String> {
    let number = parse_number(s).map_err(|e| e.to_string())?;
    u32::try_from(number).map_err(|_| format!("address {:#x} does not fit in 32 bits", number))
}

#[derive(clap::Args, Debug)]
pub struct DisassemblyArgs {
    #[arg(short = 'E', value_enum, default_value_t = Endianness::Little, ignore_case = true)]
    #[arg(value_name = "B|L")]
    #[arg(help = "Read input as big (B) or little (L) endian data")]
    pub endianness: Endianness,

    #[arg(short = 'm', value_name = "OFFSET", default_value = "0", value_parser = parse_address)]
    #[arg(help = "Use OFFSET as memory address of input")]
    pub memory_offset: u32,

    #[arg(short = 's', value_name = "SKIP", default_value = "0", value_parser = parse_number)]
    #[arg(help = "Number of bytes to skip before disassembly")]
    pub skip: u64,

    #[arg(short = 'c', value_name = "COUNT", value_parser = parse_number)]
    #[arg(help = "Number of bytes to disassemble")]
    pub count: Option<u64>,

    #[arg(short = 'x')]
    #[arg(help = "Read input as hex text instead of raw binary")]
    pub hex: bool,

    #[arg(value_name = "FILE")]
    #[arg(help = "File to disassemble, standard input if omitted or '-'")]
    pub file: Option<PathBuf>,
}

impl DisassemblyArgs {
    pub fn format(&self) -> InputFormat {
        if self.hex {
            InputFormat::Hex
        } else {
            InputFormat::Raw
        }
    }

    pub fn options(&self) -> DisassemblyOptions {
        DisassemblyOptions {
            memory_offset: self.memory_offset,
            limit: self.count,
            endianness: self.endianness,
        }
    }
}

/// Disassemble ARM machine code as described by `args` and print the listing to stdout.
#[tracing::instrument]
pub fn disassemble(args: &DisassemblyArgs) -> anyhow::Result<()> {
    let input_name = match &args.file {
        Some(path) if path.as_os_str() != "-" => path.display().to_string(),
        _ => "standard input".to_string(),
    };
    let input = input::open(args.file.as_deref(), args.skip)
        .with_context(|| format!("Unable to open {}", input_name))?;

    let format = args.format();
    tracing::debug!(input = %input_name, %format, "disassembling");

    let mut source = WordSource::new(input, format);
    let disassembler = Disassembler::new(ArmDecoder::default(), args.options());

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let words = disassembler
        .run(&mut source, &mut out)
        .with_context(|| format!("Disassembly of {} failed", input_name))?;
    out.flush().with_context(|| "Unable to write listing")?;

    tracing::debug!(words, "disassembly finished");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    /// Renders every word as `op <word> @ <address>`.
    struct EchoDecoder;

    impl Decoder for EchoDecoder {
        fn decode(&self, word: u32, address: u32) -> String {
            format!("op {:#010x} @ {:#x}", word, address)
        }
    }

    fn run(input: &[u8], format: InputFormat, options: DisassemblyOptions) -> (usize, String) {
        let mut source = WordSource::new(input, format);
        let mut out = vec![];
        let words = Disassembler::new(EchoDecoder, options)
            .run(&mut source, &mut out)
            .unwrap();
        (words, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_compose() {
        let word = [0x00, 0x00, 0xa0, 0xe1];
        assert_eq!(Endianness::Little.compose(word), 0xe1a0_0000);
        assert_eq!(Endianness::Big.compose(word), 0x0000_a0e1);
    }

    #[test]
    fn test_run() {
        let input = [0x00, 0x00, 0xa0, 0xe1, 0x1e, 0xff, 0x2f, 0xe1];
        let (words, listing) = run(&input, InputFormat::Raw, DisassemblyOptions::default());

        assert_eq!(words, 2);
        assert_eq!(
            listing,
            "00000000\te1a00000\top 0xe1a00000 @ 0x0
00000004\te12fff1e\top 0xe12fff1e @ 0x4
"
        );
    }

    #[test]
    fn test_run_with_options() {
        let options = DisassemblyOptions {
            memory_offset: 0x8000,
            limit: None,
            endianness: Endianness::Big,
        };
        let (words, listing) = run(b"e1a00000 e12fff1e", InputFormat::Hex, options);

        assert_eq!(words, 2);
        assert_eq!(
            listing,
            "00008000\te1a00000\top 0xe1a00000 @ 0x8000
00008004\te12fff1e\top 0xe12fff1e @ 0x8004
"
        );
    }

    #[test]
    fn test_limit_rounds_up_to_whole_words() {
        let input = [0u8; 16];
        let tests = vec![(0, 0), (1, 1), (4, 1), (5, 2), (8, 2), (100, 4)];

        for (limit, expected) in tests {
            let options = DisassemblyOptions {
                limit: Some(limit),
                ..Default::default()
            };
            let (words, _) = run(&input, InputFormat::Raw, options);
            assert_eq!(words, expected, "limit: {}", limit);
        }
    }

    #[test]
    fn test_address_wraps() {
        let options = DisassemblyOptions {
            memory_offset: 0xffff_fffc,
            ..Default::default()
        };
        let (_, listing) = run(&[0u8; 8], InputFormat::Raw, options);
        assert_eq!(
            listing,
            "fffffffc\t00000000\top 0x00000000 @ 0xfffffffc
00000000\t00000000\top 0x00000000 @ 0x0
"
        );
    }

    #[test]
    fn test_malformed_hex_stops_run() {
        let mut source = WordSource::new(&b"e1a00000 e1a0zz00"[..], InputFormat::Hex);
        let mut out = vec![];
        let err = Disassembler::new(EchoDecoder, DisassemblyOptions::default())
            .run(&mut source, &mut out)
            .unwrap_err();

        assert!(matches!(err, DisassemblyError::Input(InputError::Hex(_))));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "00000000\t0000a0e1\top 0x0000a0e1 @ 0x0\n"
        );
    }

    #[test]
    fn test_arm_decoder() {
        let decoder = ArmDecoder::default();
        let text = decoder.decode(0xe1a0_0000, 0);
        assert!(!text.is_empty());
        assert!(!text.starts_with("undefined"), "got {:?}", text);
    }

    #[test]
    fn test_branch_target() {
        let tests = vec![
            // b .
            ((0xeaff_fffe, 0x8000), Some(0x8000)),
            // bl +0x10
            ((0xeb00_0002, 0x8000), Some(0x8010)),
            // bne -0x8
            ((0x1aff_fffc, 0x8008), Some(0x8000)),
            // blx with the halfword bit set
            ((0xfb00_0000, 0x8000), Some(0x800a)),
            // bx lr
            ((0xe12f_ff1e, 0x8000), None),
            // mov r0, r0
            ((0xe1a0_0000, 0x8000), None),
            // b . at the top of memory
            ((0xeaff_fffe, 0xffff_fffc), Some(0xffff_fffc)),
        ];

        for ((word, address), expected) in tests {
            assert_eq!(branch_target(word, address), expected, "word: {:#010x}", word);
        }
    }

    #[test]
    fn test_arm_decoder_resolves_branch_target() {
        let text = ArmDecoder::default().decode(0xeb00_0002, 0x8000);
        assert!(text.ends_with(" ; 0x00008010"), "got {:?}", text);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1234"), Ok(1234));
        assert_eq!(parse_number("0x8000"), Ok(0x8000));
        assert_eq!(parse_number("0XfF"), Ok(0xff));
        assert!(parse_number("0x").is_err());
        assert!(parse_number("-1").is_err());
        assert!(parse_number("twelve").is_err());
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0xffffffff"), Ok(0xffff_ffff));
        assert!(parse_address("0x100000000").is_err());
    }
}
