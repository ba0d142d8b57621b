use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use log::{debug, info};

use super::ast::{self, Ast, AstKind, Prefix, StringSpan};
use super::error::{ValidationError, ValidationErrors};
use super::parser::parse_string;
use crate::equation::Equation;
use crate::error::ModelError;
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::function::{ExprFunction, ModelFunction};
use crate::model::Model;
use crate::refs::Ref;
use crate::types::VariableType;
use crate::variable::{Attribute, Causality, Domain, Variability, Variable};

/// Name of the independent variable, visible in every model equation.
pub const TIME: &str = "time";

/// Where a name inside an expression is looked up.
#[derive(Clone, Copy)]
enum Scope<'a> {
    Model,
    Function(&'a str, &'a HashMap<String, Expr>),
    Type(&'a str),
}

/// Turns a parsed model into a [`Model`], collecting every name and
/// registration error it finds instead of stopping at the first.
pub struct ModelBuilder {
    model: Model,
    symbols: HashMap<String, Expr>,
    // (inputs, outputs) of every function declared in the text
    signatures: HashMap<String, (usize, usize)>,
    errors: ValidationErrors,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBuilder {
    pub fn new() -> Self {
        let time = Expr::symbol(TIME);
        let mut model = Model::new();
        model.set_time_variable(time.clone());
        let mut symbols = HashMap::new();
        symbols.insert(TIME.to_string(), time);
        Self {
            model,
            symbols,
            signatures: HashMap::new(),
            errors: ValidationErrors::new(),
        }
    }

    /// Registers types, functions, equations, variables and aliases, in that
    /// order, then links derivative relations that the registration order
    /// left unresolved.
    pub fn build(mut self, ast: &Ast) -> Result<Model, ValidationErrors> {
        let AstKind::Model(model_ast) = &ast.kind else {
            self.error("expected a model".to_string(), ast.span);
            return Err(self.errors);
        };

        for type_decl in &model_ast.types {
            self.build_type(type_decl);
        }

        for function in &model_ast.functions {
            if let AstKind::Function(decl) = &function.kind {
                if self
                    .signatures
                    .insert(decl.name.to_string(), (decl.params.len(), decl.outputs.len()))
                    .is_some()
                {
                    self.error(format!("function {} is declared more than once", decl.name), function.span);
                }
            }
        }
        for function in &model_ast.functions {
            self.build_function(function);
        }

        for component in &model_ast.components {
            if let AstKind::Component(comp) = &component.kind {
                if self.symbols.contains_key(comp.name) {
                    self.error(format!("{} is declared more than once", comp.name), component.span);
                } else {
                    self.symbols.insert(comp.name.to_string(), Expr::symbol(comp.name));
                }
            }
        }

        for eqn in &model_ast.initial_equations {
            if let Some(equation) = self.build_equation(eqn) {
                self.model.add_initial_equation(equation);
            }
        }
        for eqn in &model_ast.equations {
            if let Some(equation) = self.build_equation(eqn) {
                self.model.add_dae_equation(equation);
            }
        }

        let mut registered = Vec::new();
        for component in &model_ast.components {
            let AstKind::Component(comp) = &component.kind else {
                continue;
            };
            let Some(var) = self.build_variable(comp, component.span) else {
                continue;
            };
            match self.model.add_variable(var.clone()) {
                Ok(()) => registered.push((comp, component.span, var)),
                Err(err) => self.model_error(err, component.span),
            }
        }

        for (comp, span, var) in registered {
            let Some(alias) = &comp.alias else {
                continue;
            };
            match self.model.get_variable_by_name(alias.name) {
                Some(target) if !target.ptr_eq(&var) => {
                    debug!("{} is an alias of {}{}", comp.name, if alias.negated { "-" } else { "" }, alias.name);
                    var.set_alias(&target, alias.negated);
                }
                Some(_) => self.error(format!("{} cannot be an alias of itself", comp.name), span),
                None => self.error(format!("cannot find alias target {}", alias.name), span),
            }
        }

        self.model.resolve_derivative_links();

        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        info!(
            "built model {} with {} variables and {} equations",
            model_ast.name,
            self.model.all_variables().len(),
            self.model.initial_equations().len() + self.model.dae_equations().len()
        );
        Ok(self.model)
    }

    fn error(&mut self, text: String, span: Option<StringSpan>) {
        self.errors.push(ValidationError::new(text, span));
    }

    fn model_error(&mut self, err: ModelError, span: Option<StringSpan>) {
        self.error(err.to_string(), span);
    }

    fn build_type(&mut self, type_ast: &Ast) {
        let AstKind::TypeDecl(decl) = &type_ast.kind else {
            return;
        };
        let Some(domain) = Domain::from_name(decl.base) else {
            self.error(
                format!("type {} must extend Real, Integer, Boolean or String, not {}", decl.name, decl.base),
                type_ast.span,
            );
            return;
        };
        let mut variable_type = VariableType::new(decl.name, domain);
        for (name, value) in VariableType::default_for(domain).attributes() {
            variable_type = variable_type.with_attribute(name, value.clone());
        }
        for (name, value) in self.build_attributes(&decl.attributes, Scope::Type(decl.name)) {
            variable_type = variable_type.with_attribute(name, value);
        }
        if let Err(err) = self.model.add_new_variable_type(Ref::new(variable_type)) {
            self.model_error(err, type_ast.span);
        }
    }

    fn build_function(&mut self, function: &Ast) {
        let AstKind::Function(decl) = &function.kind else {
            return;
        };
        let params: HashMap<String, Expr> = decl
            .params
            .iter()
            .map(|&p| (p.to_string(), Expr::symbol(p)))
            .collect();
        if params.len() != decl.params.len() {
            self.error(format!("function {} repeats an input name", decl.name), function.span);
            return;
        }
        let inputs = decl.params.iter().map(|&p| params[p].clone()).collect();
        let scope = Scope::Function(decl.name, &params);
        let outputs: Option<Vec<Expr>> = decl
            .outputs
            .iter()
            .map(|output| self.build_expr(output, scope))
            .collect();
        if let Some(outputs) = outputs {
            let f = Ref::new(ExprFunction::new(decl.name, inputs, outputs));
            self.model
                .set_model_function_by_its_name(f.upcast(|f| f as Rc<dyn ModelFunction>));
        }
    }

    fn build_equation(&mut self, eqn: &Ast) -> Option<Equation> {
        let AstKind::Equation(eqn) = &eqn.kind else {
            return None;
        };
        let lhs = self.build_expr(&eqn.lhs, Scope::Model);
        let rhs = self.build_expr(&eqn.rhs, Scope::Model);
        Some(Equation::new(lhs?, rhs?))
    }

    fn build_attributes<'a>(&mut self, attributes: &'a [Box<Ast>], scope: Scope) -> Vec<(&'a str, Attribute)> {
        let mut built = Vec::new();
        for attribute in attributes {
            let AstKind::Attribute(attr) = &attribute.kind else {
                continue;
            };
            let value = match &attr.value.kind {
                AstKind::Str(text) => Attribute::Text(text.to_string()),
                _ => match self.build_expr(&attr.value, scope) {
                    Some(expr) => Attribute::Expr(expr),
                    None => continue,
                },
            };
            built.push((attr.name, value));
        }
        built
    }

    fn build_variable(&mut self, comp: &ast::Component, span: Option<StringSpan>) -> Option<Ref<Variable>> {
        if comp.name == TIME {
            return None;
        }
        let symbol = self.symbols.get(comp.name)?.clone();

        let (domain, declared_type) = match Domain::from_name(comp.type_name) {
            Some(domain) => (domain, None),
            None => match self.model.get_variable_type_by_name(comp.type_name) {
                Some(declared) => (declared.domain(), Some(declared)),
                None => {
                    self.error(format!("cannot find type {}", comp.type_name), span);
                    return None;
                }
            },
        };

        let variabilities: Vec<Variability> = comp
            .prefixes
            .iter()
            .filter_map(|prefix| match prefix {
                Prefix::Constant => Some(Variability::Constant),
                Prefix::Parameter => Some(Variability::Parameter),
                Prefix::Discrete => Some(Variability::Discrete),
                Prefix::Input | Prefix::Output => None,
            })
            .collect();
        let variability = match variabilities.as_slice() {
            [] if domain == Domain::Real => Variability::Continuous,
            // non-Real variables only change at events
            [] => Variability::Discrete,
            [variability] => *variability,
            _ => {
                self.error(format!("{} has more than one variability prefix", comp.name), span);
                return None;
            }
        };
        let causality = match (comp.has_prefix(Prefix::Input), comp.has_prefix(Prefix::Output)) {
            (true, true) => {
                self.error(format!("{} cannot be both input and output", comp.name), span);
                return None;
            }
            (true, false) => Causality::Input,
            (false, true) => Causality::Output,
            (false, false) => Causality::Internal,
        };

        let mut var = Variable::new(symbol, domain, causality, variability);
        if let Some(declared) = declared_type {
            var = var.with_declared_type(declared);
        }
        for (name, value) in self.build_attributes(&comp.attributes, Scope::Model) {
            var = var.with_attribute(name, value);
        }
        if let Some(binding) = &comp.binding {
            var = var.with_binding(self.build_expr(binding, Scope::Model)?);
        }
        Some(Ref::new(var))
    }

    fn build_expr(&mut self, ast: &Ast, scope: Scope) -> Option<Expr> {
        match &ast.kind {
            AstKind::Number(value) => Some(Expr::constant(*value)),
            AstKind::Bool(value) => Some(Expr::boolean(*value)),
            AstKind::Name(name) => self.lookup(name, scope, ast.span),
            AstKind::Monop(monop) => {
                let child = self.build_expr(&monop.child, scope)?;
                match monop.op {
                    "-" => Some(-child),
                    "+" => Some(child),
                    "not" => Some(Expr::unary(UnaryOp::Not, child)),
                    op => {
                        self.error(format!("unknown unary operator {}", op), ast.span);
                        None
                    }
                }
            }
            AstKind::Binop(binop) => {
                let left = self.build_expr(&binop.left, scope);
                let right = self.build_expr(&binop.right, scope);
                let Some(op) = BinaryOp::from_symbol(binop.op) else {
                    self.error(format!("unknown binary operator {}", binop.op), ast.span);
                    return None;
                };
                Some(Expr::binary(op, left?, right?))
            }
            AstKind::Call(call) => self.build_call(call, scope, ast.span),
            AstKind::Str(_) => {
                self.error("strings are only allowed as attribute values".to_string(), ast.span);
                None
            }
            _ => {
                self.error(format!("{} is not an expression", ast), ast.span);
                None
            }
        }
    }

    fn lookup(&mut self, name: &str, scope: Scope, span: Option<StringSpan>) -> Option<Expr> {
        let found = match scope {
            Scope::Model => self.symbols.get(name).cloned(),
            Scope::Function(_, params) => params.get(name).cloned(),
            Scope::Type(_) => None,
        };
        if found.is_none() {
            let text = match scope {
                Scope::Model => format!("cannot find variable {}", name),
                Scope::Function(function, _) => format!("{} is not an input of function {}", name, function),
                Scope::Type(type_name) => {
                    format!("attributes of type {} must be literals, found {}", type_name, name)
                }
            };
            self.error(text, span);
        }
        found
    }

    fn build_call(&mut self, call: &ast::Call, scope: Scope, span: Option<StringSpan>) -> Option<Expr> {
        let args: Vec<Option<Expr>> = call
            .args
            .iter()
            .map(|arg| self.build_expr(arg, scope))
            .collect();
        let args: Vec<Expr> = args.into_iter().collect::<Option<_>>()?;

        let builtin = call.fn_name == "der" || UnaryOp::from_name(call.fn_name).is_some();
        if builtin {
            if args.len() != 1 || call.output.is_some() {
                self.error(format!("{} takes exactly one argument", call.fn_name), span);
                return None;
            }
            let arg = args.into_iter().next()?;
            return match UnaryOp::from_name(call.fn_name) {
                Some(op) => Some(Expr::unary(op, arg)),
                None => Some(Expr::der(arg)),
            };
        }

        let Some(&(n_in, n_out)) = self.signatures.get(call.fn_name) else {
            self.error(format!("cannot find function {}", call.fn_name), span);
            return None;
        };
        if args.len() != n_in {
            self.error(
                format!("function {} takes {} arguments, got {}", call.fn_name, n_in, args.len()),
                span,
            );
            return None;
        }
        let output = call.output.unwrap_or(0);
        if output >= n_out {
            self.error(
                format!("function {} has {} outputs, cannot select output {}", call.fn_name, n_out, output),
                span,
            );
            return None;
        }
        Some(Expr::call(call.fn_name, args, output))
    }
}

/// Parses `text` and builds the model it describes.
pub fn build_model(text: &str) -> Result<Model> {
    let ast = parse_string(text).map_err(|err| anyhow!(err.to_string()))?;
    ModelBuilder::new()
        .build(&ast)
        .map_err(|errors| anyhow!(errors.as_error_message(text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::VariableKind;
    use crate::frontend::parser::parse_string;
    use approx::assert_relative_eq;

    fn build_errors(text: &str) -> ValidationErrors {
        let ast = parse_string(text).unwrap();
        match ModelBuilder::new().build(&ast) {
            Ok(_) => panic!("model should not build"),
            Err(errors) => errors,
        }
    }

    #[test]
    fn builds_variables_and_equations() {
        let text = "
        model decay
            parameter Real k = 0.5;
            Real x(start = 1);
            Real der_x;
        initial equation
            x = 1;
        equation
            der_x = der(x);
            der_x = -k * x;
        end decay;
        ";
        let model = build_model(text).unwrap();
        let x = model.get_variable_by_name("x").unwrap();
        let der_x = model.get_variable_by_name("der_x").unwrap();
        assert_eq!(x.kind(), Some(VariableKind::Differentiated));
        assert_eq!(der_x.kind(), Some(VariableKind::Derivative));
        assert!(x.derivative_variable().is_some_and(|d| d.ptr_eq(&der_x)));
        assert_eq!(model.get_dae_residual().rows(), 2);
        assert_eq!(model.get_initial_residual().to_string(), "vertcat((1-x))");
        assert_eq!(model.time_variable().map(|t| t.to_string()), Some("time".into()));
        // equations and variables share one symbol per name
        assert!(model.dae_equations()[1].lhs().ptr_eq(der_x.var()));
    }

    #[test]
    fn variability_and_causality_from_prefixes() {
        let text = "
        model m
            constant Integer n = 3;
            input Real u;
            output Real y;
            Boolean b;
            discrete input Integer i;
            parameter String s;
        equation
            y = u;
        end m;
        ";
        let model = build_model(text).unwrap();
        let kind = |name: &str| model.get_variable_by_name(name).and_then(|v| v.kind());
        assert_eq!(kind("n"), Some(VariableKind::IntegerConstant));
        assert_eq!(kind("u"), Some(VariableKind::RealInput));
        assert_eq!(kind("y"), Some(VariableKind::Output));
        assert_eq!(kind("b"), Some(VariableKind::BooleanDiscrete));
        assert_eq!(kind("i"), Some(VariableKind::IntegerInput));
        assert_eq!(kind("s"), Some(VariableKind::StringParameterIndependent));
    }

    #[test]
    fn types_and_functions() {
        let text = "
        model m
            type Voltage = Real(unit = \"V\", nominal = 10);
            function f(a, b) = (a * 0.5, b + a * 0.5);
            parameter Voltage v = f(4, 1){1};
        end m;
        ";
        let mut model = build_model(text).unwrap();
        let v = model.get_variable_by_name("v").unwrap();
        let declared = v.declared_type().unwrap();
        assert_eq!(declared.name(), "Voltage");
        assert_eq!(v.attribute("unit").and_then(|a| a.as_text().map(str::to_string)), Some("V".into()));
        // inherited from the Real defaults
        assert!(v.attribute("fixed").is_some());
        assert!(model.get_model_function_by_name("f").is_some());
        let value = model.evaluate_expression(v.var()).unwrap();
        assert_relative_eq!(value, 3.0);
    }

    #[test]
    fn aliases() {
        let text = "
        model m
            Real y;
            Real x alias y;
            Real z alias -y;
        end m;
        ";
        let model = build_model(text).unwrap();
        let z = model.get_variable_by_name("z").unwrap();
        assert!(z.is_negated());
        assert_eq!(z.to_string(), "z, alias: y, declaredType : Real");
        assert!(model
            .get_model_variable_by_name("x")
            .is_some_and(|v| v.name() == "y"));
        assert_eq!(model.alias_variables().len(), 2);
        assert_eq!(model.model_variables().len(), 1);
    }

    #[test]
    fn unknown_names_are_reported() {
        let errors = build_errors(
            "
            model m
                Real x;
                Voltage v;
                function f(a) = (a + c);
                type Speed = Real(min = x);
            equation
                x = y + g(1);
            end m;
            ",
        );
        assert!(errors.has_error_contains("cannot find variable y"));
        assert!(errors.has_error_contains("cannot find function g"));
        assert!(errors.has_error_contains("cannot find type Voltage"));
        assert!(errors.has_error_contains("c is not an input of function f"));
        assert!(errors.has_error_contains("attributes of type Speed must be literals"));
    }

    #[test]
    fn registration_errors_are_reported() {
        let errors = build_errors(
            "
            model m
                Real x;
                Real x;
                Integer n;
                Real w alias q;
                parameter constant Real p;
                input output Real io;
            equation
                x = f(1){0};
            end m;
            ",
        );
        assert!(errors.has_error_contains("x is declared more than once"));
        assert!(errors.has_error_contains("cannot find alias target q"));
        assert!(errors.has_error_contains("more than one variability prefix"));
        assert!(errors.has_error_contains("cannot be both input and output"));
        assert!(errors.has_error_contains("cannot find function f"));
    }

    #[test]
    fn call_signatures_are_checked() {
        let errors = build_errors(
            "
            model m
                function f(a, b) = (a, b);
                parameter Real p = f(1);
                parameter Real q = f(1, 2){2};
                parameter Real r = sin(1, 2);
            end m;
            ",
        );
        assert!(errors.has_error_contains("function f takes 2 arguments, got 1"));
        assert!(errors.has_error_contains("cannot select output 2"));
        assert!(errors.has_error_contains("sin takes exactly one argument"));
    }

    #[test]
    fn error_message_has_line_numbers() {
        let err = build_model("model m\n  Real x;\nequation\n  x = y;\nend m;").unwrap_err();
        assert!(err.to_string().contains("Line 4, Column 7: Error: cannot find variable y"));
    }
}
