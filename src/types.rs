use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::debug;

use crate::error::ModelError;
use crate::expr::Expr;
use crate::refs::Ref;
use crate::variable::{Attribute, Domain};

/// A declared variable type, e.g. the built in `Real` or a user type such as
/// `type Voltage = Real(unit = "V")`.
#[derive(Debug, Clone)]
pub struct VariableType {
    name: String,
    domain: Domain,
    attributes: BTreeMap<String, Attribute>,
}

impl VariableType {
    pub fn new(name: &str, domain: Domain) -> Self {
        Self {
            name: name.to_string(),
            domain,
            attributes: BTreeMap::new(),
        }
    }

    /// The built in type for a domain, named after it and carrying the
    /// default attribute values.
    pub fn default_for(domain: Domain) -> Self {
        let t = Self::new(domain.name(), domain);
        match domain {
            Domain::Real => t
                .with_attribute("quantity", "".into())
                .with_attribute("unit", "".into())
                .with_attribute("displayUnit", "".into())
                .with_attribute("min", f64::NEG_INFINITY.into())
                .with_attribute("max", f64::INFINITY.into())
                .with_attribute("start", 0.0.into())
                .with_attribute("fixed", Expr::boolean(false).into())
                .with_attribute("nominal", 1.0.into()),
            Domain::Integer => t
                .with_attribute("quantity", "".into())
                .with_attribute("min", f64::NEG_INFINITY.into())
                .with_attribute("max", f64::INFINITY.into())
                .with_attribute("start", 0.0.into())
                .with_attribute("fixed", Expr::boolean(false).into()),
            Domain::Boolean => t
                .with_attribute("quantity", "".into())
                .with_attribute("start", Expr::boolean(false).into())
                .with_attribute("fixed", Expr::boolean(false).into()),
            Domain::String => t
                .with_attribute("quantity", "".into())
                .with_attribute("start", "".into()),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: Attribute) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} type ({})", self.domain, self.name)?;
        for (name, value) in &self.attributes {
            write!(f, " {} = {},", name, value)?;
        }
        Ok(())
    }
}

/// Name keyed store of the variable types in a model.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Ref<VariableType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, variable_type: Ref<VariableType>) -> Result<(), ModelError> {
        Self::check_builtin_name(&variable_type)?;
        let name = variable_type.name().to_string();
        if self.types.contains_key(&name) {
            return Err(ModelError::DuplicateType(name));
        }
        debug!("registered variable type {}", name);
        self.types.insert(name, variable_type);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Ref<VariableType>> {
        self.types.get(name).cloned()
    }

    /// A type named after a built in type must have its domain, since it is
    /// the default for every variable of that domain.
    pub fn check_builtin_name(variable_type: &VariableType) -> Result<(), ModelError> {
        match Domain::from_name(variable_type.name()) {
            Some(builtin) if builtin != variable_type.domain() => Err(ModelError::BuiltinTypeName {
                type_name: variable_type.name().to_string(),
                domain: variable_type.domain(),
            }),
            _ => Ok(()),
        }
    }

    /// The built in type for `domain`, registering it on first use.
    pub fn default_for(&mut self, domain: Domain) -> Ref<VariableType> {
        self.types
            .entry(domain.name().to_string())
            .or_insert_with(|| Ref::new(VariableType::default_for(domain)))
            .clone()
    }

    /// Returns the registered instance of a declared type, registering
    /// `declared` if no type of that name is known yet.
    pub fn intern(&mut self, declared: &Ref<VariableType>) -> Result<Ref<VariableType>, ModelError> {
        if let Some(registered) = self.types.get(declared.name()) {
            return Ok(registered.clone());
        }
        Self::check_builtin_name(declared)?;
        debug!("registered declared type {}", declared.name());
        self.types
            .insert(declared.name().to_string(), declared.clone());
        Ok(declared.clone())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ref<VariableType>> {
        self.types.values()
    }
}
