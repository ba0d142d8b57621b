use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Weak;

use crate::classify::VariableKind;
use crate::expr::Expr;
use crate::refs::Ref;
use crate::types::VariableType;

/// The value domain of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Real,
    Integer,
    Boolean,
    String,
}

impl Domain {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Real => "Real",
            Self::Integer => "Integer",
            Self::Boolean => "Boolean",
            Self::String => "String",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Real" => Some(Self::Real),
            "Integer" => Some(Self::Integer),
            "Boolean" => Some(Self::Boolean),
            "String" => Some(Self::String),
            _ => None,
        }
    }

    /// String values never enter the numeric parameter table.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::String)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Causality {
    Input,
    Output,
    Internal,
}

impl fmt::Display for Causality {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variability {
    Constant,
    Parameter,
    Discrete,
    Continuous,
}

impl fmt::Display for Variability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Constant => write!(f, "constant"),
            Self::Parameter => write!(f, "parameter"),
            Self::Discrete => write!(f, "discrete"),
            Self::Continuous => write!(f, "continuous"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Expr(Expr),
    Text(String),
}

impl Attribute {
    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Self::Expr(expr) => Some(expr),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Expr(_) => None,
        }
    }
}

impl From<Expr> for Attribute {
    fn from(expr: Expr) -> Self {
        Self::Expr(expr)
    }
}

impl From<f64> for Attribute {
    fn from(value: f64) -> Self {
        Self::Expr(Expr::constant(value))
    }
}

impl From<&str> for Attribute {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Expr(expr) => write!(f, "{}", expr),
            Self::Text(text) => write!(f, "\"{}\"", text),
        }
    }
}

pub const BINDING_EXPRESSION: &str = "bindingExpression";
pub const EVALUATED_BINDING_EXPRESSION: &str = "evaluatedBindingExpression";
pub const START: &str = "start";

/// A modelled quantity. Created by a front end and registered into exactly
/// one [`Model`](crate::Model), which owns it through a [`Ref`].
///
/// The parts that model passes change after registration (declared type,
/// attributes, derivative linkage, alias relation, cached kind) sit behind
/// cells so that shared handles can update them. Derivative and alias links
/// are non-owning.
#[derive(Debug)]
pub struct Variable {
    name: String,
    var: Expr,
    domain: Domain,
    causality: Causality,
    variability: Variability,
    declared_type: RefCell<Ref<VariableType>>,
    attributes: RefCell<BTreeMap<String, Attribute>>,
    derivative: RefCell<Weak<Variable>>,
    differentiated: RefCell<Weak<Variable>>,
    alias: RefCell<Weak<Variable>>,
    negated: Cell<bool>,
    kind: Cell<Option<VariableKind>>,
}

impl Variable {
    pub fn new(var: Expr, domain: Domain, causality: Causality, variability: Variability) -> Self {
        Self {
            name: var.to_string(),
            var,
            domain,
            causality,
            variability,
            declared_type: RefCell::new(Ref::null()),
            attributes: RefCell::new(BTreeMap::new()),
            derivative: RefCell::new(Weak::new()),
            differentiated: RefCell::new(Weak::new()),
            alias: RefCell::new(Weak::new()),
            negated: Cell::new(false),
            kind: Cell::new(None),
        }
    }

    pub fn real(var: Expr, causality: Causality, variability: Variability) -> Self {
        Self::new(var, Domain::Real, causality, variability)
    }

    pub fn integer(var: Expr, causality: Causality, variability: Variability) -> Self {
        Self::new(var, Domain::Integer, causality, variability)
    }

    pub fn boolean(var: Expr, causality: Causality, variability: Variability) -> Self {
        Self::new(var, Domain::Boolean, causality, variability)
    }

    pub fn string(var: Expr, causality: Causality, variability: Variability) -> Self {
        Self::new(var, Domain::String, causality, variability)
    }

    /// A continuous Real variable recorded as the time derivative of
    /// `differentiated`.
    pub fn derivative_of(var: Expr, differentiated: &Ref<Variable>) -> Self {
        let v = Self::real(var, Causality::Internal, Variability::Continuous);
        *v.differentiated.borrow_mut() = differentiated.downgrade();
        v
    }

    pub fn with_declared_type(self, declared_type: Ref<VariableType>) -> Self {
        *self.declared_type.borrow_mut() = declared_type;
        self
    }

    pub fn with_binding(self, binding: Expr) -> Self {
        self.with_attribute(BINDING_EXPRESSION, binding.into())
    }

    pub fn with_attribute(self, name: &str, value: Attribute) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn var(&self) -> &Expr {
        &self.var
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn causality(&self) -> Causality {
        self.causality
    }

    pub fn variability(&self) -> Variability {
        self.variability
    }

    pub fn declared_type(&self) -> Option<Ref<VariableType>> {
        let declared_type = self.declared_type.borrow();
        if declared_type.is_null() {
            None
        } else {
            Some(declared_type.clone())
        }
    }

    pub fn set_declared_type(&self, declared_type: &Ref<VariableType>) {
        self.declared_type.borrow_mut().set_node(declared_type);
    }

    /// Looks up an attribute on the variable, then on its declared type.
    pub fn attribute(&self, name: &str) -> Option<Attribute> {
        if let Some(value) = self.attributes.borrow().get(name) {
            return Some(value.clone());
        }
        self.declared_type()
            .and_then(|declared_type| declared_type.attribute(name).cloned())
    }

    pub fn has_own_attribute(&self, name: &str) -> bool {
        self.attributes.borrow().contains_key(name)
    }

    pub fn set_attribute(&self, name: &str, value: Attribute) {
        self.attributes.borrow_mut().insert(name.to_string(), value);
    }

    pub fn binding_expression(&self) -> Option<Expr> {
        self.attributes
            .borrow()
            .get(BINDING_EXPRESSION)
            .and_then(|attr| attr.as_expr().cloned())
    }

    /// The variable's start value, falling back to the declared type's.
    pub fn start(&self) -> Option<Expr> {
        self.attribute(START)
            .and_then(|attr| attr.as_expr().cloned())
    }

    pub fn derivative_variable(&self) -> Option<Ref<Variable>> {
        upgrade(&self.derivative.borrow())
    }

    pub fn set_derivative_variable(&self, derivative: &Ref<Variable>) {
        *self.derivative.borrow_mut() = derivative.downgrade();
    }

    pub fn differentiated_variable(&self) -> Option<Ref<Variable>> {
        upgrade(&self.differentiated.borrow())
    }

    pub fn set_differentiated_variable(&self, differentiated: &Ref<Variable>) {
        *self.differentiated.borrow_mut() = differentiated.downgrade();
    }

    pub fn is_alias(&self) -> bool {
        self.alias().is_some()
    }

    pub fn alias(&self) -> Option<Ref<Variable>> {
        upgrade(&self.alias.borrow())
    }

    pub fn is_negated(&self) -> bool {
        self.negated.get()
    }

    /// Marks this variable as eliminated in favour of `alias`, equal to it up
    /// to sign.
    pub fn set_alias(&self, alias: &Ref<Variable>, negated: bool) {
        *self.alias.borrow_mut() = alias.downgrade();
        self.negated.set(negated);
    }

    /// The kind assigned when the variable was registered in a model.
    pub fn kind(&self) -> Option<VariableKind> {
        self.kind.get()
    }

    pub(crate) fn set_kind(&self, kind: VariableKind) {
        self.kind.set(Some(kind));
    }
}

fn upgrade(weak: &Weak<Variable>) -> Option<Ref<Variable>> {
    let var = Ref::from_weak(weak);
    if var.is_null() {
        None
    } else {
        Some(var)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.var)?;
        if let Some(alias) = self.alias() {
            write!(f, ", alias: {}", alias.var())?;
        }
        if let Some(declared_type) = self.declared_type() {
            write!(f, ", declaredType : {}", declared_type.name())?;
        }
        let attributes = self.attributes.borrow();
        if !attributes.is_empty() {
            write!(f, ", attributes:")?;
            for (name, value) in attributes.iter() {
                write!(f, "\n\t{} = {}", name, value)?;
            }
        }
        Ok(())
    }
}
