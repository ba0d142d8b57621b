use std::fmt;

use crate::expr::Expr;

/// `lhs = rhs`, contributing the row `rhs - lhs` to a residual.
#[derive(Debug, Clone)]
pub struct Equation {
    lhs: Expr,
    rhs: Expr,
}

impl Equation {
    pub fn new(lhs: Expr, rhs: Expr) -> Self {
        Self { lhs, rhs }
    }

    pub fn lhs(&self) -> &Expr {
        &self.lhs
    }

    pub fn rhs(&self) -> &Expr {
        &self.rhs
    }

    pub fn residual(&self) -> Expr {
        &self.rhs - &self.lhs
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} = {}", self.lhs, self.rhs)
    }
}

/// Stacks the residuals of `equations`, in order, into one expression.
pub fn stack_residuals<'a>(equations: impl IntoIterator<Item = &'a Equation>) -> Expr {
    Expr::vertcat(equations.into_iter().map(Equation::residual).collect())
}
