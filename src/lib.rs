extern crate pest;
#[macro_use]
extern crate pest_derive;

pub mod classify;
pub mod equation;
pub mod error;
pub mod eval;
pub mod expr;
pub mod frontend;
pub mod function;
pub mod model;
pub mod refs;
pub mod types;
pub mod variable;

pub use classify::{classify, Classification, DerivativeRelation, VariableKind};
pub use equation::Equation;
pub use error::ModelError;
pub use eval::{Evaluator, ParameterTable};
pub use expr::{BinaryOp, Expr, ExprNode, UnaryOp};
pub use frontend::build_model;
pub use function::{ExprFunction, FunctionTable, ModelFunction, NoFunctions};
pub use model::Model;
pub use refs::Ref;
pub use types::{TypeRegistry, VariableType};
pub use variable::{Attribute, Causality, Domain, Variability, Variable};
