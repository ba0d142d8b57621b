use std::{error, fmt};

use itertools::Itertools;

use crate::variable::{Domain, Variability};

/// Errors raised while building a [`Model`](crate::Model) or evaluating
/// expressions over it.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    DuplicateVariable(String),
    DuplicateType(String),
    InvalidVariability {
        variable: String,
        domain: Domain,
        variability: Variability,
    },
    TypeMismatch {
        variable: String,
        type_name: String,
        expected: Domain,
        found: Domain,
    },
    /// a type named after a built in type but with another domain
    BuiltinTypeName {
        type_name: String,
        domain: Domain,
    },
    /// names of the parameters and constants forming the cycle, in
    /// dependency order
    CyclicDependency(Vec<String>),
    MissingValue(String),
    Unresolved {
        symbol: String,
        expr: String,
    },
    NonNumeric(String),
    Function {
        name: String,
        msg: String,
    },
}

impl ModelError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateVariable(_)
                | Self::DuplicateType(_)
                | Self::InvalidVariability { .. }
                | Self::TypeMismatch { .. }
                | Self::BuiltinTypeName { .. }
                | Self::CyclicDependency(_)
                | Self::MissingValue(_)
        )
    }

    pub fn is_evaluation(&self) -> bool {
        !self.is_configuration()
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DuplicateVariable(name) => {
                write!(f, "a variable named {} is already in the model", name)
            }
            Self::DuplicateType(name) => {
                write!(f, "a variable type named {} is already in the model", name)
            }
            Self::InvalidVariability {
                variable,
                domain,
                variability,
            } => write!(
                f,
                "{} variable {} cannot have {} variability",
                domain, variable, variability
            ),
            Self::TypeMismatch {
                variable,
                type_name,
                expected,
                found,
            } => write!(
                f,
                "variable {} is {} but its declared type {} is {}",
                variable, expected, type_name, found
            ),
            Self::BuiltinTypeName { type_name, domain } => write!(
                f,
                "type {} is built in and cannot be declared as {}",
                type_name, domain
            ),
            Self::CyclicDependency(names) => write!(
                f,
                "cyclic dependency between parameters: {}",
                names.iter().join(" -> ")
            ),
            Self::MissingValue(name) => {
                write!(f, "parameter {} has neither a binding expression nor a start value", name)
            }
            Self::Unresolved { symbol, expr } => {
                write!(f, "cannot evaluate {}: {} has no known value", expr, symbol)
            }
            Self::NonNumeric(expr) => write!(f, "{} does not reduce to a number", expr),
            Self::Function { name, msg } => write!(f, "function {}: {}", name, msg),
        }
    }
}

impl error::Error for ModelError {}
