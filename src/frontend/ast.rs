use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringSpan {
    pub pos_start: usize,
    pub pos_end: usize,
}

impl fmt::Display for StringSpan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.pos_start, self.pos_end)
    }
}

#[derive(Debug)]
pub struct Model<'a> {
    pub name: &'a str,
    pub types: Vec<Box<Ast<'a>>>,
    pub functions: Vec<Box<Ast<'a>>>,
    pub components: Vec<Box<Ast<'a>>>,
    pub initial_equations: Vec<Box<Ast<'a>>>,
    pub equations: Vec<Box<Ast<'a>>>,
}

#[derive(Debug)]
pub struct TypeDecl<'a> {
    pub name: &'a str,
    pub base: &'a str,
    pub attributes: Vec<Box<Ast<'a>>>,
}

#[derive(Debug)]
pub struct FunctionDecl<'a> {
    pub name: &'a str,
    pub params: Vec<&'a str>,
    pub outputs: Vec<Box<Ast<'a>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    Constant,
    Parameter,
    Discrete,
    Input,
    Output,
}

#[derive(Debug)]
pub struct Alias<'a> {
    pub name: &'a str,
    pub negated: bool,
}

#[derive(Debug)]
pub struct Component<'a> {
    pub prefixes: Vec<Prefix>,
    pub type_name: &'a str,
    pub name: &'a str,
    pub attributes: Vec<Box<Ast<'a>>>,
    pub binding: Option<Box<Ast<'a>>>,
    pub alias: Option<Alias<'a>>,
}

impl Component<'_> {
    pub fn has_prefix(&self, prefix: Prefix) -> bool {
        self.prefixes.contains(&prefix)
    }
}

#[derive(Debug)]
pub struct Attribute<'a> {
    pub name: &'a str,
    pub value: Box<Ast<'a>>,
}

#[derive(Debug)]
pub struct Equation<'a> {
    pub lhs: Box<Ast<'a>>,
    pub rhs: Box<Ast<'a>>,
}

#[derive(Debug)]
pub struct Binop<'a> {
    pub op: &'a str,
    pub left: Box<Ast<'a>>,
    pub right: Box<Ast<'a>>,
}

#[derive(Debug)]
pub struct Monop<'a> {
    pub op: &'a str,
    pub child: Box<Ast<'a>>,
}

#[derive(Debug)]
pub struct Call<'a> {
    pub fn_name: &'a str,
    pub args: Vec<Box<Ast<'a>>>,
    pub output: Option<usize>,
}

#[derive(Debug)]
pub enum AstKind<'a> {
    Model(Model<'a>),
    TypeDecl(TypeDecl<'a>),
    Function(FunctionDecl<'a>),
    Component(Component<'a>),
    Attribute(Attribute<'a>),
    Equation(Equation<'a>),
    Binop(Binop<'a>),
    Monop(Monop<'a>),
    Call(Call<'a>),
    Name(&'a str),
    Number(f64),
    Bool(bool),
    Str(&'a str),
}

#[derive(Debug)]
pub struct Ast<'a> {
    pub kind: AstKind<'a>,
    pub span: Option<StringSpan>,
}

impl fmt::Display for Ast<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            AstKind::Binop(binop) => write!(f, "{} {} {}", binop.left, binop.op, binop.right),
            AstKind::Monop(monop) => write!(f, "{} {}", monop.op, monop.child),
            AstKind::Call(call) => {
                write!(f, "{}(", call.fn_name)?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")?;
                if let Some(output) = call.output {
                    write!(f, "{{{}}}", output)?;
                }
                Ok(())
            }
            AstKind::Name(name) => write!(f, "{}", name),
            AstKind::Number(value) => write!(f, "{}", value),
            AstKind::Bool(value) => write!(f, "{}", value),
            AstKind::Str(text) => write!(f, "\"{}\"", text),
            AstKind::Equation(eqn) => write!(f, "{} = {}", eqn.lhs, eqn.rhs),
            AstKind::Attribute(attr) => write!(f, "{} = {}", attr.name, attr.value),
            AstKind::Model(model) => write!(f, "model {}", model.name),
            AstKind::TypeDecl(decl) => write!(f, "type {} = {}", decl.name, decl.base),
            AstKind::Function(decl) => write!(f, "function {}", decl.name),
            AstKind::Component(comp) => write!(f, "{} {}", comp.type_name, comp.name),
        }
    }
}
