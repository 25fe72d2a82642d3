/// Disassembles ARM machine code into a listing.
///
/// Each 32-bit word is composed according to the selected byte order, handed to the decoder and
/// printed along with its address:
///
/// ```text
/// 00008000	e3a00001	mov r0, #0x1
/// 00008004	e12fff1e	bx lr
/// ```
pub mod disassembler;

/// Reads hex text such as `de ad be ef` into words.
pub mod hex_reader;

/// Opens the input and splits it into words.
pub mod input;

/// Logging and tracing setup
pub mod instrumentation;
