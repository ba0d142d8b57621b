use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;

use crate::error::ModelError;
use crate::eval::{Evaluator, ParameterTable};
use crate::expr::Expr;
use crate::refs::Ref;

/// A named function that equations and bindings may call through
/// [`Expr::call`].
pub trait ModelFunction: fmt::Debug + fmt::Display {
    fn name(&self) -> &str;
    fn n_in(&self) -> usize;
    fn n_out(&self) -> usize;

    /// Evaluates all outputs. `functions` resolves any functions this one
    /// calls in turn.
    fn call(&self, args: &[f64], functions: &dyn FunctionTable) -> Result<Vec<f64>, ModelError>;
}

pub trait FunctionTable {
    fn function(&self, name: &str) -> Option<Ref<dyn ModelFunction>>;

    /// Whether a call to `name` is already being evaluated through this
    /// table.
    fn is_active(&self, _name: &str) -> bool {
        false
    }
}

impl FunctionTable for HashMap<String, Ref<dyn ModelFunction>> {
    fn function(&self, name: &str) -> Option<Ref<dyn ModelFunction>> {
        self.get(name).cloned()
    }
}

/// A table without functions, for evaluating call free expressions.
pub struct NoFunctions;

impl FunctionTable for NoFunctions {
    fn function(&self, _name: &str) -> Option<Ref<dyn ModelFunction>> {
        None
    }
}

/// A function given by one expression per output over a list of input
/// symbols.
#[derive(Debug)]
pub struct ExprFunction {
    name: String,
    inputs: Vec<Expr>,
    outputs: Vec<Expr>,
}

impl ExprFunction {
    pub fn new(name: &str, inputs: Vec<Expr>, outputs: Vec<Expr>) -> Self {
        Self {
            name: name.to_string(),
            inputs,
            outputs,
        }
    }

    pub fn inputs(&self) -> &[Expr] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Expr] {
        &self.outputs
    }
}

impl ModelFunction for ExprFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn n_in(&self) -> usize {
        self.inputs.len()
    }

    fn n_out(&self) -> usize {
        self.outputs.len()
    }

    fn call(&self, args: &[f64], functions: &dyn FunctionTable) -> Result<Vec<f64>, ModelError> {
        if args.len() != self.inputs.len() {
            return Err(ModelError::Function {
                name: self.name.clone(),
                msg: format!("expected {} arguments, got {}", self.inputs.len(), args.len()),
            });
        }
        let mut table = ParameterTable::new();
        for (input, &arg) in self.inputs.iter().zip(args) {
            table.push(input.clone(), arg);
        }
        let evaluator = Evaluator::new(&table, functions);
        self.outputs
            .iter()
            .map(|output| evaluator.evaluate(output))
            .collect()
    }
}

impl fmt::Display for ExprFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "ModelFunction : {}", self.name)?;
        writeln!(
            f,
            " Inputs ({}): {}",
            self.inputs.len(),
            self.inputs.iter().join(", ")
        )?;
        writeln!(f, " Outputs ({}):", self.outputs.len())?;
        for (i, output) in self.outputs.iter().enumerate() {
            writeln!(f, "  {}. {}", i, output)?;
        }
        Ok(())
    }
}
