use std::fs;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use daeir::{build_model, VariableKind};

/// loads a flat DAE model, classifies its variables and resolves its parameters
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input filename
    input: String,

    /// Print the initial and DAE residuals
    #[arg(short, long)]
    residuals: bool,

    /// Resolve and print the values of all constants and parameters
    #[arg(short, long)]
    parameters: bool,

    /// Only list the variables of this kind (e.g. REAL_ALGEBRAIC)
    #[arg(short, long)]
    kind: Option<String>,

    /// Only check that the model builds
    #[arg(short, long)]
    check: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Args::parse();
    let text = fs::read_to_string(&cli.input).with_context(|| format!("cannot read {}", cli.input))?;
    let mut model = build_model(&text).with_context(|| format!("cannot build model from {}", cli.input))?;
    if cli.check {
        println!("{}: ok", cli.input);
        return Ok(());
    }

    match cli.kind.as_deref() {
        Some(name) => {
            let kind = VariableKind::from_name(name).ok_or_else(|| anyhow!("unknown variable kind {}", name))?;
            for var in model.get_variable_by_kind(kind) {
                println!("{}", var);
            }
        }
        None => print!("{}", model),
    }

    if cli.residuals {
        println!("initial residual: {}", model.get_initial_residual());
        println!("DAE residual: {}", model.get_dae_residual());
    }

    if cli.parameters {
        model.calculate_values_for_dependent_parameters()?;
        for (symbol, value) in model.parameter_values().iter() {
            println!("{} = {}", symbol, value);
        }
    }
    Ok(())
}
