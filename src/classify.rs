use std::fmt;

use crate::equation::Equation;
use crate::error::ModelError;
use crate::expr::Expr;
use crate::variable::{Causality, Domain, Variability, Variable};

/// The classification of a variable. Every registered variable has exactly
/// one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    RealConstant,
    RealParameterIndependent,
    RealParameterDependent,

    IntegerConstant,
    IntegerParameterIndependent,
    IntegerParameterDependent,

    BooleanConstant,
    BooleanParameterIndependent,
    BooleanParameterDependent,

    StringConstant,
    StringParameterIndependent,
    StringParameterDependent,

    Derivative,
    Differentiated,
    RealInput,
    RealAlgebraic,
    RealDiscrete,

    IntegerDiscrete,
    IntegerInput,
    BooleanDiscrete,
    BooleanInput,
    StringDiscrete,
    StringInput,
    Output,
}

impl VariableKind {
    pub const ALL: [VariableKind; 24] = [
        Self::RealConstant,
        Self::RealParameterIndependent,
        Self::RealParameterDependent,
        Self::IntegerConstant,
        Self::IntegerParameterIndependent,
        Self::IntegerParameterDependent,
        Self::BooleanConstant,
        Self::BooleanParameterIndependent,
        Self::BooleanParameterDependent,
        Self::StringConstant,
        Self::StringParameterIndependent,
        Self::StringParameterDependent,
        Self::Derivative,
        Self::Differentiated,
        Self::RealInput,
        Self::RealAlgebraic,
        Self::RealDiscrete,
        Self::IntegerDiscrete,
        Self::IntegerInput,
        Self::BooleanDiscrete,
        Self::BooleanInput,
        Self::StringDiscrete,
        Self::StringInput,
        Self::Output,
    ];

    pub fn constant(domain: Domain) -> Self {
        match domain {
            Domain::Real => Self::RealConstant,
            Domain::Integer => Self::IntegerConstant,
            Domain::Boolean => Self::BooleanConstant,
            Domain::String => Self::StringConstant,
        }
    }

    pub fn parameter(domain: Domain, dependent: bool) -> Self {
        match (domain, dependent) {
            (Domain::Real, false) => Self::RealParameterIndependent,
            (Domain::Real, true) => Self::RealParameterDependent,
            (Domain::Integer, false) => Self::IntegerParameterIndependent,
            (Domain::Integer, true) => Self::IntegerParameterDependent,
            (Domain::Boolean, false) => Self::BooleanParameterIndependent,
            (Domain::Boolean, true) => Self::BooleanParameterDependent,
            (Domain::String, false) => Self::StringParameterIndependent,
            (Domain::String, true) => Self::StringParameterDependent,
        }
    }

    pub fn discrete(domain: Domain) -> Self {
        match domain {
            Domain::Real => Self::RealDiscrete,
            Domain::Integer => Self::IntegerDiscrete,
            Domain::Boolean => Self::BooleanDiscrete,
            Domain::String => Self::StringDiscrete,
        }
    }

    pub fn input(domain: Domain) -> Self {
        match domain {
            Domain::Real => Self::RealInput,
            Domain::Integer => Self::IntegerInput,
            Domain::Boolean => Self::BooleanInput,
            Domain::String => Self::StringInput,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            Self::RealConstant | Self::IntegerConstant | Self::BooleanConstant | Self::StringConstant
        )
    }

    pub fn is_independent_parameter(&self) -> bool {
        matches!(
            self,
            Self::RealParameterIndependent
                | Self::IntegerParameterIndependent
                | Self::BooleanParameterIndependent
                | Self::StringParameterIndependent
        )
    }

    pub fn is_dependent_parameter(&self) -> bool {
        matches!(
            self,
            Self::RealParameterDependent
                | Self::IntegerParameterDependent
                | Self::BooleanParameterDependent
                | Self::StringParameterDependent
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RealConstant => "REAL_CONSTANT",
            Self::RealParameterIndependent => "REAL_PARAMETER_INDEPENDENT",
            Self::RealParameterDependent => "REAL_PARAMETER_DEPENDENT",
            Self::IntegerConstant => "INTEGER_CONSTANT",
            Self::IntegerParameterIndependent => "INTEGER_PARAMETER_INDEPENDENT",
            Self::IntegerParameterDependent => "INTEGER_PARAMETER_DEPENDENT",
            Self::BooleanConstant => "BOOLEAN_CONSTANT",
            Self::BooleanParameterIndependent => "BOOLEAN_PARAMETER_INDEPENDENT",
            Self::BooleanParameterDependent => "BOOLEAN_PARAMETER_DEPENDENT",
            Self::StringConstant => "STRING_CONSTANT",
            Self::StringParameterIndependent => "STRING_PARAMETER_INDEPENDENT",
            Self::StringParameterDependent => "STRING_PARAMETER_DEPENDENT",
            Self::Derivative => "DERIVATIVE",
            Self::Differentiated => "DIFFERENTIATED",
            Self::RealInput => "REAL_INPUT",
            Self::RealAlgebraic => "REAL_ALGEBRAIC",
            Self::RealDiscrete => "REAL_DISCRETE",
            Self::IntegerDiscrete => "INTEGER_DISCRETE",
            Self::IntegerInput => "INTEGER_INPUT",
            Self::BooleanDiscrete => "BOOLEAN_DISCRETE",
            Self::BooleanInput => "BOOLEAN_INPUT",
            Self::StringDiscrete => "STRING_DISCRETE",
            Self::StringInput => "STRING_INPUT",
            Self::Output => "OUTPUT",
        }
    }

    /// Case insensitive inverse of [`VariableKind::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// `derivative` is the time derivative of `differentiated`; both are
/// symbols.
#[derive(Debug, Clone)]
pub struct DerivativeRelation {
    pub derivative: Expr,
    pub differentiated: Expr,
}

impl DerivativeRelation {
    /// Recognises equations of the form `d = der(x)` (either way round)
    /// where `d` and `x` are symbols.
    pub fn from_equation(equation: &Equation) -> Option<Self> {
        let (lhs, rhs) = (equation.lhs(), equation.rhs());
        let (derivative, der) = if lhs.is_symbol() {
            (lhs, rhs)
        } else {
            (rhs, lhs)
        };
        if !derivative.is_symbol() {
            return None;
        }
        let differentiated = der.der_argument()?;
        if !differentiated.is_symbol() {
            return None;
        }
        Some(Self {
            derivative: derivative.clone(),
            differentiated: differentiated.clone(),
        })
    }
}

pub fn derivative_relations<'a>(
    equations: impl IntoIterator<Item = &'a Equation>,
) -> Vec<DerivativeRelation> {
    equations
        .into_iter()
        .filter_map(DerivativeRelation::from_equation)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DerivativeRole {
    None,
    Derivative,
    Differentiated,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub kind: VariableKind,
    /// the symbol on the other side of the variable's derivative relation
    pub partner: Option<Expr>,
}

fn derivative_role(var: &Variable, relations: &[DerivativeRelation]) -> (DerivativeRole, Option<Expr>) {
    if let Some(differentiated) = var.differentiated_variable() {
        return (DerivativeRole::Derivative, Some(differentiated.var().clone()));
    }
    if let Some(relation) = relations.iter().find(|r| r.derivative.ptr_eq(var.var())) {
        return (DerivativeRole::Derivative, Some(relation.differentiated.clone()));
    }
    if let Some(derivative) = var.derivative_variable() {
        return (DerivativeRole::Differentiated, Some(derivative.var().clone()));
    }
    if let Some(relation) = relations.iter().find(|r| r.differentiated.ptr_eq(var.var())) {
        return (DerivativeRole::Differentiated, Some(relation.derivative.clone()));
    }
    (DerivativeRole::None, None)
}

/// Parameters whose binding expression refers to any other quantity are
/// dependent, however simple the expression.
fn is_dependent(var: &Variable) -> bool {
    var.binding_expression()
        .is_some_and(|binding| !binding.symbols().is_empty())
}

/// Assigns a kind to `var` given the derivative relations known so far.
pub fn classify(
    var: &Variable,
    relations: &[DerivativeRelation],
) -> Result<Classification, ModelError> {
    let domain = var.domain();
    let (role, partner) = match (domain, var.variability(), var.causality()) {
        (Domain::Real, Variability::Continuous, Causality::Output | Causality::Internal) => {
            derivative_role(var, relations)
        }
        _ => (DerivativeRole::None, None),
    };
    let kind = match (domain, var.variability(), var.causality(), role) {
        (_, Variability::Constant, _, _) => VariableKind::constant(domain),
        (_, Variability::Parameter, _, _) => VariableKind::parameter(domain, is_dependent(var)),
        (_, Variability::Discrete, Causality::Input, _) => VariableKind::input(domain),
        (_, Variability::Discrete, _, _) => VariableKind::discrete(domain),
        (Domain::Real, Variability::Continuous, Causality::Input, _) => VariableKind::RealInput,
        (Domain::Real, Variability::Continuous, _, DerivativeRole::Derivative) => {
            VariableKind::Derivative
        }
        (Domain::Real, Variability::Continuous, _, DerivativeRole::Differentiated) => {
            VariableKind::Differentiated
        }
        (Domain::Real, Variability::Continuous, Causality::Output, DerivativeRole::None) => {
            VariableKind::Output
        }
        (Domain::Real, Variability::Continuous, Causality::Internal, DerivativeRole::None) => {
            VariableKind::RealAlgebraic
        }
        (Domain::Integer | Domain::Boolean | Domain::String, Variability::Continuous, _, _) => {
            return Err(ModelError::InvalidVariability {
                variable: var.name().to_string(),
                domain,
                variability: Variability::Continuous,
            })
        }
    };
    Ok(Classification { kind, partner })
}
