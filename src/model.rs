use std::collections::HashMap;
use std::fmt;

use log::{debug, info};

use crate::classify::{classify, Classification, DerivativeRelation, VariableKind};
use crate::equation::{stack_residuals, Equation};
use crate::error::ModelError;
use crate::eval::{Evaluator, ParameterTable};
use crate::expr::{Expr, NodeKey};
use crate::function::ModelFunction;
use crate::refs::Ref;
use crate::types::{TypeRegistry, VariableType};
use crate::variable::{Variable, EVALUATED_BINDING_EXPRESSION};

/// A flat DAE model: variables, initial and DAE equations, model functions
/// and variable types.
///
/// Variables are classified when they are added. Derivative relations are
/// read from the equations added so far, so equations of the form
/// `der_x = der(x)` should be added before `der_x` is registered, or linked
/// afterwards with [`Model::resolve_derivative_links`].
#[derive(Debug, Default)]
pub struct Model {
    time: Option<Expr>,
    variables: Vec<Ref<Variable>>,
    names: HashMap<String, usize>,
    initial_equations: Vec<Equation>,
    dae_equations: Vec<Equation>,
    relations: Vec<DerivativeRelation>,
    functions: HashMap<String, Ref<dyn ModelFunction>>,
    types: TypeRegistry,
    parameters: ParameterTable,
    parameters_valid: bool,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_time_variable(&mut self, time: Expr) {
        self.time = Some(time);
    }

    pub fn time_variable(&self) -> Option<&Expr> {
        self.time.as_ref()
    }

    /// Registers `var`: classifies it, links it to the other side of its
    /// derivative relation if that is already registered, and gives it a
    /// default type if it has none.
    pub fn add_variable(&mut self, var: Ref<Variable>) -> Result<(), ModelError> {
        if self.names.contains_key(var.name()) {
            return Err(ModelError::DuplicateVariable(var.name().to_string()));
        }
        let Classification { kind, partner } = classify(&var, &self.relations)?;
        self.assign_variable_type(&var)?;
        var.set_kind(kind);
        debug!("registered {} as {}", var.name(), kind);

        if let Some(differentiated) = var.differentiated_variable() {
            self.relations.push(DerivativeRelation {
                derivative: var.var().clone(),
                differentiated: differentiated.var().clone(),
            });
        }
        let other = partner
            .and_then(|p| self.variable_by_symbol(&p))
            .filter(|other| is_linkable(other));
        if let Some(other) = other {
            match kind {
                VariableKind::Derivative => link(&var, &other),
                VariableKind::Differentiated => link(&other, &var),
                _ => {}
            }
        }

        self.names.insert(var.name().to_string(), self.variables.len());
        self.variables.push(var);
        self.parameters_valid = false;
        Ok(())
    }

    // the registry only changes once the type is known to fit
    fn assign_variable_type(&mut self, var: &Ref<Variable>) -> Result<(), ModelError> {
        let declared = var.declared_type();
        let assigned = match &declared {
            Some(declared) => self
                .types
                .get(declared.name())
                .unwrap_or_else(|| declared.clone()),
            None => self.types.default_for(var.domain()),
        };
        if assigned.domain() != var.domain() {
            return Err(ModelError::TypeMismatch {
                variable: var.name().to_string(),
                type_name: assigned.name().to_string(),
                expected: var.domain(),
                found: assigned.domain(),
            });
        }
        let assigned = match declared {
            Some(_) => self.types.intern(&assigned)?,
            None => assigned,
        };
        var.set_declared_type(&assigned);
        Ok(())
    }

    fn variable_by_symbol(&self, symbol: &Expr) -> Option<Ref<Variable>> {
        let var = self.get_variable_by_name(symbol.name()?)?;
        if var.var().ptr_eq(symbol) {
            Some(var)
        } else {
            None
        }
    }

    pub fn add_initial_equation(&mut self, equation: Equation) {
        if let Some(relation) = DerivativeRelation::from_equation(&equation) {
            self.relations.push(relation);
        }
        self.initial_equations.push(equation);
    }

    pub fn add_dae_equation(&mut self, equation: Equation) {
        if let Some(relation) = DerivativeRelation::from_equation(&equation) {
            self.relations.push(relation);
        }
        self.dae_equations.push(equation);
    }

    pub fn initial_equations(&self) -> &[Equation] {
        &self.initial_equations
    }

    pub fn dae_equations(&self) -> &[Equation] {
        &self.dae_equations
    }

    /// All initial equations stacked on the form `rhs - lhs`.
    pub fn get_initial_residual(&self) -> Expr {
        stack_residuals(&self.initial_equations)
    }

    /// All DAE equations stacked on the form `rhs - lhs`.
    pub fn get_dae_residual(&self) -> Expr {
        stack_residuals(&self.dae_equations)
    }

    /// Registers `function` under its own name, replacing any function of
    /// the same name.
    pub fn set_model_function_by_its_name(&mut self, function: Ref<dyn ModelFunction>) {
        self.functions.insert(function.name().to_string(), function);
        self.parameters_valid = false;
    }

    pub fn get_model_function_by_name(&self, name: &str) -> Option<Ref<dyn ModelFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn add_new_variable_type(&mut self, variable_type: Ref<VariableType>) -> Result<(), ModelError> {
        self.types.add(variable_type)
    }

    pub fn get_variable_type_by_name(&self, name: &str) -> Option<Ref<VariableType>> {
        self.types.get(name)
    }

    pub fn variable_types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn get_variable_by_kind(&self, kind: VariableKind) -> Vec<Ref<Variable>> {
        self.variables
            .iter()
            .filter(|v| v.kind() == Some(kind))
            .cloned()
            .collect()
    }

    pub fn all_variables(&self) -> &[Ref<Variable>] {
        &self.variables
    }

    /// Variables that have not been eliminated as aliases.
    pub fn model_variables(&self) -> Vec<Ref<Variable>> {
        self.variables
            .iter()
            .filter(|v| !v.is_alias())
            .cloned()
            .collect()
    }

    pub fn alias_variables(&self) -> Vec<Ref<Variable>> {
        self.variables
            .iter()
            .filter(|v| v.is_alias())
            .cloned()
            .collect()
    }

    /// The variable called `name`, which may be an alias.
    pub fn get_variable_by_name(&self, name: &str) -> Option<Ref<Variable>> {
        self.names.get(name).map(|&i| self.variables[i].clone())
    }

    /// The variable called `name`, or the model variable it is an alias of.
    pub fn get_model_variable_by_name(&self, name: &str) -> Option<Ref<Variable>> {
        let mut var = self.get_variable_by_name(name)?;
        // alias chains are expected to be one step long, the bound guards
        // against a malformed cycle
        for _ in 0..self.variables.len() {
            match var.alias() {
                Some(alias) => var = alias,
                None => break,
            }
        }
        Some(var)
    }

    /// Links derivative relations from all equations added so far whose
    /// variables are both registered but not yet linked, for example when a
    /// derivative variable was registered before its defining equation.
    /// Returns the number of new links.
    pub fn resolve_derivative_links(&mut self) -> usize {
        let mut linked = 0;
        for relation in &self.relations {
            let (Some(derivative), Some(differentiated)) = (
                self.variable_by_symbol(&relation.derivative),
                self.variable_by_symbol(&relation.differentiated),
            ) else {
                continue;
            };
            if !is_linkable(&derivative) || !is_linkable(&differentiated) {
                continue;
            }
            if differentiated
                .derivative_variable()
                .is_some_and(|d| d.ptr_eq(&derivative))
            {
                continue;
            }
            link(&derivative, &differentiated);
            linked += 1;
        }
        if linked > 0 {
            info!("linked {} derivative relations", linked);
        }
        linked
    }

    /// Fills the parameter table with every numeric constant and parameter.
    /// Constants and independent parameters take the value of their binding
    /// expression (or start value), dependent parameters that of their
    /// binding. Values are resolved in dependency order, so a binding may
    /// refer to constants and parameters declared after it.
    ///
    /// Each dependent parameter also gets an `evaluatedBindingExpression`
    /// attribute holding its value.
    pub fn calculate_values_for_dependent_parameters(&mut self) -> Result<(), ModelError> {
        self.parameters.clear();
        self.parameters_valid = false;

        let mut resolvable: Vec<(Ref<Variable>, Expr)> = Vec::new();
        for var in &self.variables {
            let Some(kind) = var.kind() else {
                continue;
            };
            let dependent = kind.is_dependent_parameter();
            if !(dependent || kind.is_constant() || kind.is_independent_parameter()) {
                continue;
            }
            if !var.domain().is_numeric() {
                debug!("not evaluating string variable {}", var.name());
                continue;
            }
            let value_expr = if dependent {
                var.binding_expression()
            } else {
                var.binding_expression().or_else(|| var.start())
            };
            let value_expr = value_expr.ok_or_else(|| ModelError::MissingValue(var.name().to_string()))?;
            resolvable.push((var.clone(), value_expr));
        }

        let mut table = ParameterTable::new();
        let mut n_dependent = 0;
        for i in dependency_order(&resolvable)? {
            let (var, value_expr) = &resolvable[i];
            let value = Evaluator::new(&table, &self.functions).evaluate(value_expr)?;
            if var.kind().is_some_and(|k| k.is_dependent_parameter()) {
                debug!("dependent parameter {} = {}", var.name(), value);
                var.set_attribute(EVALUATED_BINDING_EXPRESSION, Expr::constant(value).into());
                n_dependent += 1;
            }
            table.push(var.var().clone(), value);
        }

        info!(
            "resolved {} parameter and constant values ({} dependent)",
            table.len(),
            n_dependent
        );
        self.parameters = table;
        self.parameters_valid = true;
        Ok(())
    }

    /// The table filled by the last call to
    /// [`Model::calculate_values_for_dependent_parameters`].
    pub fn parameter_values(&self) -> &ParameterTable {
        &self.parameters
    }

    /// Evaluates an expression over the model's constants and parameters,
    /// resolving parameter values first if they are out of date.
    pub fn evaluate_expression(&mut self, exp: &Expr) -> Result<f64, ModelError> {
        if !self.parameters_valid {
            self.calculate_values_for_dependent_parameters()?;
        }
        Evaluator::new(&self.parameters, &self.functions).evaluate(exp)
    }
}

// a continuous Real variable that is not an input
fn is_linkable(var: &Variable) -> bool {
    matches!(
        var.kind(),
        Some(
            VariableKind::RealAlgebraic
                | VariableKind::Output
                | VariableKind::Derivative
                | VariableKind::Differentiated
        )
    )
}

fn link(derivative: &Ref<Variable>, differentiated: &Ref<Variable>) {
    derivative.set_differentiated_variable(differentiated);
    differentiated.set_derivative_variable(derivative);
    if matches!(
        derivative.kind(),
        Some(VariableKind::RealAlgebraic | VariableKind::Output)
    ) {
        derivative.set_kind(VariableKind::Derivative);
    }
    if matches!(
        differentiated.kind(),
        Some(VariableKind::RealAlgebraic | VariableKind::Output)
    ) {
        differentiated.set_kind(VariableKind::Differentiated);
    }
    debug!(
        "linked {} as the derivative of {}",
        derivative.name(),
        differentiated.name()
    );
}

/// Orders variables so that each comes after the variables its value
/// expression refers to.
fn dependency_order(resolvable: &[(Ref<Variable>, Expr)]) -> Result<Vec<usize>, ModelError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    let index: HashMap<NodeKey, usize> = resolvable
        .iter()
        .enumerate()
        .map(|(i, (v, _))| (v.var().key(), i))
        .collect();
    let deps: Vec<Vec<usize>> = resolvable
        .iter()
        .map(|(_, value_expr)| {
            value_expr
                .symbols()
                .iter()
                .filter_map(|s| index.get(&s.key()).copied())
                .collect()
        })
        .collect();

    let mut marks = vec![Mark::New; resolvable.len()];
    let mut order = Vec::with_capacity(resolvable.len());
    for root in 0..resolvable.len() {
        if marks[root] != Mark::New {
            continue;
        }
        marks[root] = Mark::Active;
        let mut stack = vec![(root, 0usize)];
        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            if next < deps[node].len() {
                top.1 += 1;
                let child = deps[node][next];
                match marks[child] {
                    Mark::New => {
                        marks[child] = Mark::Active;
                        stack.push((child, 0));
                    }
                    Mark::Active => {
                        let start = stack.iter().position(|&(n, _)| n == child).unwrap_or(0);
                        let mut cycle: Vec<String> = stack[start..]
                            .iter()
                            .map(|&(n, _)| resolvable[n].0.name().to_string())
                            .collect();
                        cycle.push(resolvable[child].0.name().to_string());
                        return Err(ModelError::CyclicDependency(cycle));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                order.push(node);
                stack.pop();
            }
        }
    }
    Ok(order)
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(time) = &self.time {
            writeln!(f, "Time variable: {}", time)?;
        }
        writeln!(f, "------------------------------- Variables -------------------------------")?;
        for kind in VariableKind::ALL {
            let vars = self.get_variable_by_kind(kind);
            if vars.is_empty() {
                continue;
            }
            writeln!(f, "{}:", kind)?;
            for var in vars {
                writeln!(f, "  {}", var)?;
            }
        }
        if !self.functions.is_empty() {
            writeln!(f, "---------------------------- Model functions ----------------------------")?;
            let mut names: Vec<&String> = self.functions.keys().collect();
            names.sort();
            for name in names {
                write!(f, "{}", self.functions[name])?;
            }
        }
        writeln!(f, "------------------------------- Equations -------------------------------")?;
        writeln!(f, "Initial equations:")?;
        for eq in &self.initial_equations {
            writeln!(f, "  {}", eq)?;
        }
        writeln!(f, "DAE equations:")?;
        for eq in &self.dae_equations {
            writeln!(f, "  {}", eq)?;
        }
        writeln!(f, "Initial residual: {}", self.get_initial_residual())?;
        writeln!(f, "DAE residual: {}", self.get_dae_residual())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::ExprFunction;
    use crate::variable::{Causality, Domain, Variability, BINDING_EXPRESSION};
    use approx::assert_relative_eq;
    use std::rc::Rc;

    fn parameter(name: &str, binding: Expr) -> Ref<Variable> {
        Ref::new(
            Variable::real(Expr::symbol(name), Causality::Internal, Variability::Parameter)
                .with_binding(binding),
        )
    }

    fn continuous(name: &str) -> Ref<Variable> {
        Ref::new(Variable::real(
            Expr::symbol(name),
            Causality::Internal,
            Variability::Continuous,
        ))
    }

    #[test]
    fn dependent_parameter_scenario() {
        let mut model = Model::new();
        let p1 = parameter("p1", Expr::constant(2.0));
        let p2 = parameter("p2", p1.var() * 3.0);
        model.add_variable(p1.clone()).unwrap();
        model.add_variable(p2.clone()).unwrap();
        assert_eq!(p1.kind(), Some(VariableKind::RealParameterIndependent));
        assert_eq!(p2.kind(), Some(VariableKind::RealParameterDependent));

        assert_relative_eq!(model.evaluate_expression(p2.var()).unwrap(), 6.0);
        assert_eq!(
            p2.attribute(EVALUATED_BINDING_EXPRESSION)
                .and_then(|a| a.as_expr().and_then(Expr::as_constant)),
            Some(6.0)
        );
    }

    #[test]
    fn dependents_resolved_in_dependency_order() {
        let mut model = Model::new();
        let p1 = parameter("p1", Expr::constant(10.0));
        let p2 = Ref::new(
            Variable::real(Expr::symbol("p2"), Causality::Internal, Variability::Parameter),
        );
        let p3 = parameter("p3", p2.var() * 10.0);
        // p2 binds to p1 only after p3 has been declared in terms of it
        p2.set_attribute(BINDING_EXPRESSION, (p1.var() * 2.0).into());
        let p4 = parameter("p4", p1.var() + p3.var());
        model.add_variable(p1).unwrap();
        model.add_variable(p3.clone()).unwrap();
        model.add_variable(p2.clone()).unwrap();
        model.add_variable(p4.clone()).unwrap();
        model.calculate_values_for_dependent_parameters().unwrap();
        let values = model.parameter_values();
        assert_eq!(values.get(p2.var()), Some(20.0));
        assert_eq!(values.get(p3.var()), Some(200.0));
        assert_eq!(values.get(p4.var()), Some(210.0));
    }

    #[test]
    fn calculate_is_idempotent() {
        let mut model = Model::new();
        let p1 = parameter("p1", Expr::constant(2.0));
        let p2 = parameter("p2", p1.var().exp());
        model.add_variable(p1).unwrap();
        model.add_variable(p2).unwrap();
        model.calculate_values_for_dependent_parameters().unwrap();
        let first = model.parameter_values().values().to_vec();
        model.calculate_values_for_dependent_parameters().unwrap();
        assert_eq!(model.parameter_values().values(), first.as_slice());
    }

    #[test]
    fn cyclic_parameters_are_rejected() {
        let mut model = Model::new();
        let p1 = Ref::new(Variable::real(
            Expr::symbol("p1"),
            Causality::Internal,
            Variability::Parameter,
        ));
        let p2 = parameter("p2", p1.var() + 1.0);
        p1.set_attribute(BINDING_EXPRESSION, (p2.var() * 2.0).into());
        model.add_variable(p1).unwrap();
        model.add_variable(p2).unwrap();
        let err = model.calculate_values_for_dependent_parameters().unwrap_err();
        assert_eq!(
            err,
            ModelError::CyclicDependency(vec!["p1".into(), "p2".into(), "p1".into()])
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn bindings_may_refer_to_later_constants() {
        let constant = |name: &str, binding: Expr| {
            Ref::new(
                Variable::real(Expr::symbol(name), Causality::Internal, Variability::Constant)
                    .with_binding(binding),
            )
        };
        let mut model = Model::new();
        let b = constant("b", Expr::constant(1.0));
        let a = constant("a", b.var() * 2.0);
        let c = constant("c", a.var() + b.var());
        let q = parameter("q", a.var() + c.var());
        let p = parameter("p", Expr::constant(3.0));
        model.add_variable(q.clone()).unwrap();
        model.add_variable(a.clone()).unwrap();
        model.add_variable(c.clone()).unwrap();
        model.add_variable(b.clone()).unwrap();
        model.add_variable(p.clone()).unwrap();

        assert_eq!(model.evaluate_expression(p.var()).unwrap(), 3.0);
        assert_eq!(model.evaluate_expression(a.var()).unwrap(), 2.0);
        assert_eq!(model.evaluate_expression(c.var()).unwrap(), 3.0);
        assert_eq!(model.evaluate_expression(q.var()).unwrap(), 5.0);
        assert_eq!(model.parameter_values().len(), 5);
    }

    #[test]
    fn cyclic_constants_are_rejected() {
        let mut model = Model::new();
        let a = Ref::new(Variable::real(
            Expr::symbol("a"),
            Causality::Internal,
            Variability::Constant,
        ));
        let b = Ref::new(
            Variable::real(Expr::symbol("b"), Causality::Internal, Variability::Constant)
                .with_binding(a.var() + 1.0),
        );
        a.set_attribute(BINDING_EXPRESSION, (b.var() * 2.0).into());
        model.add_variable(a).unwrap();
        model.add_variable(b).unwrap();
        assert_eq!(
            model.calculate_values_for_dependent_parameters().unwrap_err(),
            ModelError::CyclicDependency(vec!["a".into(), "b".into(), "a".into()])
        );
    }

    #[test]
    fn recursive_model_function_is_an_error() {
        let mut model = Model::new();
        let a = Expr::symbol("a");
        let f = ExprFunction::new("f", vec![a.clone()], vec![Expr::call("f", vec![a], 0)]);
        model.set_model_function_by_its_name(Ref::new(f).upcast(|f| f as Rc<dyn ModelFunction>));
        let p = parameter("p", Expr::constant(1.0));
        model.add_variable(p.clone()).unwrap();
        assert_eq!(model.evaluate_expression(p.var()).unwrap(), 1.0);
        let err = model
            .evaluate_expression(&Expr::call("f", vec![p.var().clone()], 0))
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::Function {
                name: "f".to_string(),
                msg: "recursive call".to_string(),
            }
        );
    }

    #[test]
    fn evaluating_algebraic_variable_fails() {
        let mut model = Model::new();
        let y = continuous("y");
        let p = parameter("p", Expr::constant(1.0));
        model.add_variable(y.clone()).unwrap();
        model.add_variable(p.clone()).unwrap();
        let err = model.evaluate_expression(&(p.var() + y.var())).unwrap_err();
        assert!(matches!(err, ModelError::Unresolved { ref symbol, .. } if symbol == "y"));
    }

    #[test]
    fn parameter_without_binding_uses_start() {
        let mut model = Model::new();
        let p = Ref::new(
            Variable::real(Expr::symbol("p"), Causality::Internal, Variability::Parameter)
                .with_attribute("start", 4.0.into()),
        );
        let q = Ref::new(Variable::integer(
            Expr::symbol("q"),
            Causality::Internal,
            Variability::Parameter,
        ));
        model.add_variable(p.clone()).unwrap();
        model.add_variable(q.clone()).unwrap();
        assert_eq!(model.evaluate_expression(p.var()).unwrap(), 4.0);
        // default Integer type starts at zero
        assert_eq!(model.evaluate_expression(q.var()).unwrap(), 0.0);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut model = Model::new();
        model.add_variable(continuous("x")).unwrap();
        let err = model.add_variable(continuous("x")).unwrap_err();
        assert_eq!(err, ModelError::DuplicateVariable("x".to_string()));
        assert_eq!(model.all_variables().len(), 1);
    }

    #[test]
    fn continuous_integer_is_rejected() {
        let mut model = Model::new();
        let n = Ref::new(Variable::integer(
            Expr::symbol("n"),
            Causality::Internal,
            Variability::Continuous,
        ));
        assert!(model.add_variable(n).unwrap_err().is_configuration());
        assert!(model.get_variable_by_name("n").is_none());
    }

    #[test]
    fn derivative_scenario() {
        let mut model = Model::new();
        let x = continuous("x");
        let der_x = continuous("der_x");
        model.add_dae_equation(Equation::new(der_x.var().clone(), Expr::der(x.var().clone())));
        model.add_dae_equation(Equation::new(der_x.var().clone(), -x.var()));
        model.add_variable(x.clone()).unwrap();
        model.add_variable(der_x.clone()).unwrap();
        assert_eq!(der_x.kind(), Some(VariableKind::Derivative));
        assert_eq!(x.kind(), Some(VariableKind::Differentiated));
        assert!(x.derivative_variable().is_some_and(|d| d.ptr_eq(&der_x)));
        assert!(der_x.differentiated_variable().is_some_and(|d| d.ptr_eq(&x)));
        assert_eq!(model.get_dae_residual().rows(), 2);
    }

    #[test]
    fn derivative_registered_first() {
        let mut model = Model::new();
        let x = continuous("x");
        let der_x = continuous("der_x");
        model.add_dae_equation(Equation::new(der_x.var().clone(), Expr::der(x.var().clone())));
        model.add_variable(der_x.clone()).unwrap();
        model.add_variable(x.clone()).unwrap();
        assert_eq!(der_x.kind(), Some(VariableKind::Derivative));
        assert_eq!(x.kind(), Some(VariableKind::Differentiated));
        assert!(x.derivative_variable().is_some_and(|d| d.ptr_eq(&der_x)));
    }

    #[test]
    fn late_equation_needs_link_pass() {
        let mut model = Model::new();
        let x = continuous("x");
        let der_x = continuous("der_x");
        model.add_variable(x.clone()).unwrap();
        model.add_variable(der_x.clone()).unwrap();
        assert_eq!(der_x.kind(), Some(VariableKind::RealAlgebraic));
        model.add_dae_equation(Equation::new(der_x.var().clone(), Expr::der(x.var().clone())));
        assert_eq!(model.resolve_derivative_links(), 1);
        assert_eq!(model.resolve_derivative_links(), 0);
        assert_eq!(der_x.kind(), Some(VariableKind::Derivative));
        assert_eq!(x.kind(), Some(VariableKind::Differentiated));
        assert_eq!(model.get_variable_by_kind(VariableKind::RealAlgebraic).len(), 0);
    }

    #[test]
    fn explicit_derivative_variable() {
        let mut model = Model::new();
        let x = continuous("x");
        let der_x = Ref::new(Variable::derivative_of(Expr::symbol("der_x"), &x));
        model.add_variable(der_x.clone()).unwrap();
        model.add_variable(x.clone()).unwrap();
        assert_eq!(x.kind(), Some(VariableKind::Differentiated));
        assert!(x.derivative_variable().is_some_and(|d| d.ptr_eq(&der_x)));
    }

    #[test]
    fn kinds_in_registration_order() {
        let mut model = Model::new();
        for name in ["a", "b", "c"] {
            model.add_variable(continuous(name)).unwrap();
        }
        let names: Vec<String> = model
            .get_variable_by_kind(VariableKind::RealAlgebraic)
            .iter()
            .map(|v| v.name().to_string())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(model.get_variable_by_kind(VariableKind::Derivative).is_empty());
    }

    #[test]
    fn alias_lookup() {
        let mut model = Model::new();
        let x = continuous("x");
        let y = continuous("y");
        let z = continuous("z");
        model.add_variable(x.clone()).unwrap();
        model.add_variable(y.clone()).unwrap();
        model.add_variable(z.clone()).unwrap();
        x.set_alias(&y, false);
        z.set_alias(&y, true);
        assert!(model.get_variable_by_name("x").is_some_and(|v| v.ptr_eq(&x)));
        assert!(model.get_model_variable_by_name("x").is_some_and(|v| v.ptr_eq(&y)));
        assert!(model.get_model_variable_by_name("y").is_some_and(|v| v.ptr_eq(&y)));
        assert!(model.get_variable_by_name("w").is_none());
        assert!(model.get_model_variable_by_name("w").is_none());
        assert_eq!(model.model_variables().len(), 1);
        assert_eq!(model.alias_variables().len(), 2);
        assert_eq!(
            model.get_variable_by_name("z").map(|v| v.to_string()),
            Some("z, alias: y, declaredType : Real".to_string())
        );
    }

    #[test]
    fn residuals() {
        let mut model = Model::new();
        assert!(model.get_dae_residual().is_empty());
        assert!(model.get_initial_residual().is_empty());
        let x1 = continuous("x1");
        model.add_initial_equation(Equation::new(x1.var().clone(), Expr::constant(1.0)));
        assert_eq!(model.get_initial_residual().to_string(), "vertcat((1-x1))");
        for i in 0..5 {
            model.add_dae_equation(Equation::new(x1.var().clone(), Expr::constant(i as f64)));
        }
        let residual = model.get_dae_residual();
        assert_eq!(residual.rows(), 5);
        assert_eq!(
            residual.to_string(),
            "vertcat((0-x1),(1-x1),(2-x1),(3-x1),(4-x1))"
        );
    }

    #[test]
    fn default_and_declared_types() {
        let mut model = Model::new();
        let voltage = Ref::new(VariableType::new("Voltage", Domain::Real));
        model.add_new_variable_type(voltage.clone()).unwrap();
        assert!(model.add_new_variable_type(voltage.clone()).is_err());

        let x = continuous("x");
        let v = Ref::new(
            Variable::real(Expr::symbol("v"), Causality::Internal, Variability::Continuous)
                .with_declared_type(Ref::new(VariableType::new("Voltage", Domain::Real))),
        );
        model.add_variable(x.clone()).unwrap();
        model.add_variable(v.clone()).unwrap();
        assert_eq!(x.declared_type().map(|t| t.name().to_string()), Some("Real".into()));
        assert!(v.declared_type().is_some_and(|t| t.ptr_eq(&voltage)));
        assert!(model.get_variable_type_by_name("Real").is_some());
        assert!(model.get_variable_type_by_name("Volt").is_none());

        let n = Ref::new(
            Variable::integer(Expr::symbol("n"), Causality::Internal, Variability::Discrete)
                .with_declared_type(voltage),
        );
        assert!(matches!(
            model.add_variable(n),
            Err(ModelError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn failed_registration_leaves_types_alone() {
        let mut model = Model::new();
        let n = Ref::new(
            Variable::integer(Expr::symbol("n"), Causality::Internal, Variability::Discrete)
                .with_declared_type(Ref::new(VariableType::new("Voltage", Domain::Real))),
        );
        assert!(matches!(
            model.add_variable(n),
            Err(ModelError::TypeMismatch { .. })
        ));
        assert!(model.get_variable_type_by_name("Voltage").is_none());
        assert!(model.get_variable_by_name("n").is_none());

        // a declared type that does fit is registered with the variable
        let v = Ref::new(
            Variable::real(Expr::symbol("v"), Causality::Internal, Variability::Continuous)
                .with_declared_type(Ref::new(VariableType::new("Voltage", Domain::Real))),
        );
        model.add_variable(v.clone()).unwrap();
        let voltage = model.get_variable_type_by_name("Voltage").unwrap();
        assert!(v.declared_type().is_some_and(|t| t.ptr_eq(&voltage)));
    }

    #[test]
    fn builtin_type_names_are_reserved() {
        let mut model = Model::new();
        let err = model
            .add_new_variable_type(Ref::new(VariableType::new("Real", Domain::Boolean)))
            .unwrap_err();
        assert!(err.is_configuration());
        let x = continuous("x");
        model.add_variable(x.clone()).unwrap();
        assert_eq!(x.declared_type().map(|t| t.domain()), Some(Domain::Real));
    }

    #[test]
    fn model_functions_last_write_wins() {
        let mut model = Model::new();
        let a = Expr::symbol("a");
        let double = ExprFunction::new("f", vec![a.clone()], vec![&a * 2.0]);
        let triple = ExprFunction::new("f", vec![a.clone()], vec![&a * 3.0]);
        model.set_model_function_by_its_name(Ref::new(double).upcast(|f| f as Rc<dyn ModelFunction>));
        model.set_model_function_by_its_name(Ref::new(triple).upcast(|f| f as Rc<dyn ModelFunction>));
        assert!(model.get_model_function_by_name("g").is_none());

        let p = parameter("p", Expr::call("f", vec![Expr::constant(2.0)], 0));
        model.add_variable(p.clone()).unwrap();
        assert_eq!(p.kind(), Some(VariableKind::RealParameterIndependent));
        assert_eq!(model.evaluate_expression(p.var()).unwrap(), 6.0);
    }

    #[test]
    fn string_parameters_are_skipped() {
        let mut model = Model::new();
        let p = parameter("p", Expr::constant(1.0));
        let s = Ref::new(
            Variable::string(Expr::symbol("s"), Causality::Internal, Variability::Parameter)
                .with_binding(p.var().clone()),
        );
        model.add_variable(p).unwrap();
        model.add_variable(s.clone()).unwrap();
        assert_eq!(s.kind(), Some(VariableKind::StringParameterDependent));
        model.calculate_values_for_dependent_parameters().unwrap();
        assert_eq!(model.parameter_values().len(), 1);
        assert!(s.attribute(EVALUATED_BINDING_EXPRESSION).is_none());
    }

    #[test]
    fn display_groups_variables_by_kind() {
        let mut model = Model::new();
        model.set_time_variable(Expr::symbol("time"));
        let x = continuous("x");
        let p = parameter("p", Expr::constant(2.0));
        model.add_dae_equation(Equation::new(x.var().clone(), p.var().clone()));
        model.add_variable(x).unwrap();
        model.add_variable(p).unwrap();
        let printed = model.to_string();
        assert!(printed.starts_with("Time variable: time\n"));
        assert!(printed.contains("REAL_ALGEBRAIC:\n  x, declaredType : Real\n"));
        assert!(printed.contains("REAL_PARAMETER_INDEPENDENT:\n  p, declaredType : Real, attributes:\n\tbindingExpression = 2\n"));
        assert!(printed.contains("DAE equations:\n  x = p\n"));
        assert!(printed.ends_with("Initial residual: vertcat()\nDAE residual: vertcat((p-x))\n"));
    }
}
