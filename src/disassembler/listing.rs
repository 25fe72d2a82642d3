/// Generate a listing line from a decoded word and its memory address
///
/// E.g. `00008000\te1a00000\tmov r0, r0`
pub fn generate_line(addr: u32, word: u32, text: &str) -> String {
    format!("{:08x}\t{:08x}\t{}\n", addr, word, text)
}
