use std::collections::HashMap;

use log::debug;

use crate::error::ModelError;
use crate::expr::{Expr, ExprNode, NodeKey};
use crate::function::{FunctionTable, ModelFunction};
use crate::refs::Ref;

/// Symbols with known numeric values, kept as two parallel sequences in the
/// order they were resolved.
#[derive(Debug, Clone, Default)]
pub struct ParameterTable {
    symbols: Vec<Expr>,
    values: Vec<f64>,
    // `values` as constant nodes, ready for substitution
    constants: Vec<Expr>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, symbol: Expr, value: f64) {
        self.symbols.push(symbol);
        self.values.push(value);
        self.constants.push(Expr::constant(value));
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
        self.values.clear();
        self.constants.clear();
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[Expr] {
        &self.symbols
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, symbol: &Expr) -> Option<f64> {
        self.symbols
            .iter()
            .position(|s| s.ptr_eq(symbol))
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Expr, f64)> {
        self.symbols.iter().zip(self.values.iter().copied())
    }
}

/// Folds expressions that reduce to a number once the symbols of a
/// [`ParameterTable`] are replaced by their values.
pub struct Evaluator<'a> {
    table: &'a ParameterTable,
    functions: &'a dyn FunctionTable,
}

impl<'a> Evaluator<'a> {
    pub fn new(table: &'a ParameterTable, functions: &'a dyn FunctionTable) -> Self {
        Self { table, functions }
    }

    pub fn evaluate(&self, exp: &Expr) -> Result<f64, ModelError> {
        if let Some(value) = self.table.get(exp) {
            return Ok(value);
        }
        let substituted = exp.substitute(&self.table.symbols, &self.table.constants);
        let value = self.reduce(&substituted, exp)?;
        debug!("evaluated {} = {}", exp, value);
        Ok(value)
    }

    // post-order fold, a node is reduced once all its children are in `memo`
    fn reduce(&self, expr: &Expr, original: &Expr) -> Result<f64, ModelError> {
        let mut memo: HashMap<NodeKey, f64> = HashMap::new();
        let mut stack = vec![(expr, false)];
        while let Some((expr, children_done)) = stack.pop() {
            if memo.contains_key(&expr.key()) {
                continue;
            }
            if !children_done {
                match expr.node() {
                    ExprNode::Symbol(name) => {
                        return Err(ModelError::Unresolved {
                            symbol: name.clone(),
                            expr: original.to_string(),
                        })
                    }
                    ExprNode::Der(_) => return Err(ModelError::NonNumeric(expr.to_string())),
                    ExprNode::Vertcat(rows) if rows.len() != 1 => {
                        return Err(ModelError::NonNumeric(expr.to_string()))
                    }
                    _ => {}
                }
                stack.push((expr, true));
                stack.extend(expr.children().into_iter().rev().map(|c| (c, false)));
                continue;
            }
            let value = |e: &Expr| memo[&e.key()];
            let value = match expr.node() {
                ExprNode::Constant(value) => *value,
                ExprNode::Unary(op, child) => op.apply(value(child)),
                ExprNode::Binary(op, left, right) => op.apply(value(left), value(right)),
                ExprNode::Vertcat(rows) => value(&rows[0]),
                ExprNode::Call {
                    function,
                    args,
                    output,
                } => {
                    let args: Vec<f64> = args.iter().map(value).collect();
                    self.call(function, &args, *output)?
                }
                ExprNode::Symbol(_) | ExprNode::Der(_) => continue,
            };
            memo.insert(expr.key(), value);
        }
        Ok(memo[&expr.key()])
    }

    fn call(&self, function: &str, args: &[f64], output: usize) -> Result<f64, ModelError> {
        let error = |msg: String| ModelError::Function {
            name: function.to_string(),
            msg,
        };
        if self.functions.is_active(function) {
            return Err(error("recursive call".to_string()));
        }
        let f = self
            .functions
            .function(function)
            .ok_or_else(|| error("no such function in the model".to_string()))?;
        let outputs = f.call(
            args,
            &ActiveCall {
                name: function,
                functions: self.functions,
            },
        )?;
        outputs
            .get(output)
            .copied()
            .ok_or_else(|| error(format!("has no output {}", output)))
    }
}

/// The functions visible from inside a call to `name`, which may not call
/// `name` again, directly or through other functions.
struct ActiveCall<'a> {
    name: &'a str,
    functions: &'a dyn FunctionTable,
}

impl FunctionTable for ActiveCall<'_> {
    fn function(&self, name: &str) -> Option<Ref<dyn ModelFunction>> {
        self.functions.function(name)
    }

    fn is_active(&self, name: &str) -> bool {
        self.name == name || self.functions.is_active(name)
    }
}
