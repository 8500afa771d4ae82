use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use nanovm::{arch, compile, interpret, postfix};

#[derive(Parser)]
struct Args {
    /// What to do with the expression.
    #[arg(short, long, default_value = "compile")]
    mode: Mode,
    #[arg(short, long, default_value = arch::AARCH64_APPLE_DARWIN)]
    target: String,
    /// Postfix arithmetic expression, e.g. "3 4 + 2 *".
    expr: String,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mode {
    Compile,
    Interpret,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compile" => Ok(Mode::Compile),
            "interpret" => Ok(Mode::Interpret),
            _ => Err(format!("unknown mode {}", s)),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let ir = postfix::parse(&args.expr)
        .with_context(|| format!("failed to parse expression {:?}", args.expr))?;

    match args.mode {
        Mode::Compile => {
            let asm = compile(ir, &args.target)
                .with_context(|| format!("failed to compile for {}", args.target))?;
            print!("{}", asm);
        }
        Mode::Interpret => {
            let result = interpret(&ir).context("failed to interpret expression")?;
            println!("{}", result);
        }
    }

    Ok(())
}
