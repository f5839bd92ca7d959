use clap::{Parser, ValueEnum};

#[derive(Parser)]
#[command(version, about = "Expression code generator: operand graphs to machine listings")]
pub struct Options {
    /// Instruction set to generate for.
    #[arg(short, long, value_enum, default_value_t = TargetChoice::X64)]
    pub target: TargetChoice,

    /// Print the intermediate three-address listing as well.
    #[arg(long)]
    pub emit_tac: bool,

    /// Logging verbosity. Repeat to increase (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetChoice {
    X64,
    Arm64,
}
