use anyhow::Result;
use clap::Parser;

use armdis::{
    disassembler::{disassemble, DisassemblyArgs},
    instrumentation,
};

/// Disassemble ARM machine code from FILE or standard input.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[arg(short, long)]
    #[arg(help = "Print debug information to stderr")]
    verbose: bool,
    #[arg(long)]
    #[arg(help = "Enable chrome tracing")]
    #[arg(long_help = "Enable chrome tracing which on program exit will generate
a json file to be opened with a chrome tracing compatible
viewer.")]
    trace: bool,
    #[command(flatten)]
    args: DisassemblyArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _trace_guard = instrumentation::init(cli.verbose, cli.trace);

    disassemble(&cli.args)
}
