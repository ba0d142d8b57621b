use std::collections::{HashMap, HashSet};
use std::fmt;
use std::mem;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Sqrt,
    Abs,
}

impl UnaryOp {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Self::Sin),
            "cos" => Some(Self::Cos),
            "tan" => Some(Self::Tan),
            "exp" => Some(Self::Exp),
            "log" => Some(Self::Log),
            "sqrt" => Some(Self::Sqrt),
            "abs" => Some(Self::Abs),
            _ => None,
        }
    }

    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Self::Neg => -x,
            Self::Not => bool_to_f64(x == 0.0),
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tan => x.tan(),
            Self::Exp => x.exp(),
            Self::Log => x.ln(),
            Self::Sqrt => x.sqrt(),
            Self::Abs => x.abs(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "!",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Accepts both the printed symbols and the Modelica spellings
    /// `and`/`or`.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Self::Add),
            "-" => Some(Self::Sub),
            "*" => Some(Self::Mul),
            "/" => Some(Self::Div),
            "^" => Some(Self::Pow),
            "==" => Some(Self::Eq),
            "<>" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "and" | "&&" => Some(Self::And),
            "or" | "||" => Some(Self::Or),
            _ => None,
        }
    }

    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
            Self::Pow => a.powf(b),
            Self::Eq => bool_to_f64(a == b),
            Self::Ne => bool_to_f64(a != b),
            Self::Lt => bool_to_f64(a < b),
            Self::Le => bool_to_f64(a <= b),
            Self::Gt => bool_to_f64(a > b),
            Self::Ge => bool_to_f64(a >= b),
            Self::And => bool_to_f64(a != 0.0 && b != 0.0),
            Self::Or => bool_to_f64(a != 0.0 || b != 0.0),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
            Self::Eq => "==",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[derive(Debug)]
pub enum ExprNode {
    Constant(f64),
    Symbol(String),
    Unary(UnaryOp, Expr),
    Binary(BinaryOp, Expr, Expr),
    Der(Expr),
    /// output `output` of the model function `function` applied to `args`
    Call {
        function: String,
        args: Vec<Expr>,
        output: usize,
    },
    Vertcat(Vec<Expr>),
}

thread_local! {
    // stands in for the children of a node while it is dropped
    static LEAF: Expr = Expr::constant(0.0);
}

impl ExprNode {
    // moves the children of this node onto `stack`, leaving leaves behind
    fn take_children(&mut self, stack: &mut Vec<Expr>) {
        let leaf = || LEAF.try_with(Expr::clone).ok();
        match self {
            ExprNode::Constant(_) | ExprNode::Symbol(_) => {}
            ExprNode::Unary(_, child) | ExprNode::Der(child) => {
                if let Some(leaf) = leaf() {
                    stack.push(mem::replace(child, leaf));
                }
            }
            ExprNode::Binary(_, left, right) => {
                if let (Some(l), Some(r)) = (leaf(), leaf()) {
                    stack.push(mem::replace(left, l));
                    stack.push(mem::replace(right, r));
                }
            }
            ExprNode::Call { args, .. } => stack.append(args),
            ExprNode::Vertcat(rows) => stack.append(rows),
        }
    }
}

// Dropping the last handle to a deep chain would otherwise recurse once per
// level.
impl Drop for ExprNode {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        self.take_children(&mut stack);
        while let Some(expr) = stack.pop() {
            if let Ok(mut node) = Rc::try_unwrap(expr.0) {
                node.take_children(&mut stack);
            }
        }
    }
}

/// A handle to an immutable node of a shared expression graph.
///
/// Cloning is cheap and shares the node. Symbols are compared by identity:
/// two symbols created separately are different even if they share a name.
#[derive(Clone)]
pub struct Expr(Rc<ExprNode>);

/// Identity of a node, for memoising traversals of shared graphs.
pub(crate) type NodeKey = *const ExprNode;

impl Expr {
    fn from_node(node: ExprNode) -> Self {
        Self(Rc::new(node))
    }

    pub fn constant(value: f64) -> Self {
        Self::from_node(ExprNode::Constant(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::constant(bool_to_f64(value))
    }

    pub fn symbol(name: &str) -> Self {
        Self::from_node(ExprNode::Symbol(name.to_string()))
    }

    pub fn unary(op: UnaryOp, child: Expr) -> Self {
        Self::from_node(ExprNode::Unary(op, child))
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::from_node(ExprNode::Binary(op, left, right))
    }

    pub fn der(child: Expr) -> Self {
        Self::from_node(ExprNode::Der(child))
    }

    pub fn call(function: &str, args: Vec<Expr>, output: usize) -> Self {
        Self::from_node(ExprNode::Call {
            function: function.to_string(),
            args,
            output,
        })
    }

    pub fn vertcat(rows: Vec<Expr>) -> Self {
        Self::from_node(ExprNode::Vertcat(rows))
    }

    /// The zero-length expression.
    pub fn empty() -> Self {
        Self::vertcat(Vec::new())
    }

    pub fn sin(&self) -> Self {
        Self::unary(UnaryOp::Sin, self.clone())
    }

    pub fn cos(&self) -> Self {
        Self::unary(UnaryOp::Cos, self.clone())
    }

    pub fn exp(&self) -> Self {
        Self::unary(UnaryOp::Exp, self.clone())
    }

    pub fn log(&self) -> Self {
        Self::unary(UnaryOp::Log, self.clone())
    }

    pub fn sqrt(&self) -> Self {
        Self::unary(UnaryOp::Sqrt, self.clone())
    }

    pub fn pow(&self, exponent: Expr) -> Self {
        Self::binary(BinaryOp::Pow, self.clone(), exponent)
    }

    pub fn node(&self) -> &ExprNode {
        &self.0
    }

    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn key(&self) -> NodeKey {
        Rc::as_ptr(&self.0)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.node(), ExprNode::Constant(_))
    }

    pub fn as_constant(&self) -> Option<f64> {
        match self.node() {
            ExprNode::Constant(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self.node(), ExprNode::Symbol(_))
    }

    /// The name of a symbol node.
    pub fn name(&self) -> Option<&str> {
        match self.node() {
            ExprNode::Symbol(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// If this is `der(x)`, returns `x`.
    pub fn der_argument(&self) -> Option<&Expr> {
        match self.node() {
            ExprNode::Der(child) => Some(child),
            _ => None,
        }
    }

    pub fn rows(&self) -> usize {
        match self.node() {
            ExprNode::Vertcat(rows) => rows.iter().map(Expr::rows).sum(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    pub(crate) fn children(&self) -> Vec<&Expr> {
        match self.node() {
            ExprNode::Constant(_) | ExprNode::Symbol(_) => Vec::new(),
            ExprNode::Unary(_, child) | ExprNode::Der(child) => vec![child],
            ExprNode::Binary(_, left, right) => vec![left, right],
            ExprNode::Call { args, .. } => args.iter().collect(),
            ExprNode::Vertcat(rows) => rows.iter().collect(),
        }
    }

    /// Free symbols of the expression, each listed once, in the order they
    /// are first reached.
    pub fn symbols(&self) -> Vec<Expr> {
        let mut visited = HashSet::new();
        let mut symbols = Vec::new();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            if !visited.insert(expr.key()) {
                continue;
            }
            if expr.is_symbol() {
                symbols.push(expr.clone());
            }
            // reversed so that children are visited left to right
            stack.extend(expr.children().into_iter().rev());
        }
        symbols
    }

    pub fn depends_on(&self, symbol: &Expr) -> bool {
        self.symbols().iter().any(|s| s.ptr_eq(symbol))
    }

    /// Returns a copy of the expression with every occurrence of `from[i]`
    /// replaced by `to[i]`. Nodes are matched by identity. Unchanged
    /// sub-graphs are shared with the original rather than copied, and a node
    /// shared by several parents is rewritten only once.
    pub fn substitute(&self, from: &[Expr], to: &[Expr]) -> Expr {
        assert_eq!(
            from.len(),
            to.len(),
            "substitute needs one replacement per expression"
        );
        let replacements: HashMap<NodeKey, &Expr> =
            from.iter().map(Expr::key).zip(to.iter()).collect();
        let mut memo: HashMap<NodeKey, Expr> = HashMap::new();
        // post-order walk, a node is rebuilt once all its children are in `memo`
        let mut stack = vec![(self, false)];
        while let Some((expr, children_done)) = stack.pop() {
            if !children_done {
                if memo.contains_key(&expr.key()) {
                    continue;
                }
                if let Some(&to) = replacements.get(&expr.key()) {
                    memo.insert(expr.key(), to.clone());
                    continue;
                }
                stack.push((expr, true));
                stack.extend(expr.children().into_iter().rev().map(|c| (c, false)));
                continue;
            }
            let rebuilt = expr.rebuild(|child| memo[&child.key()].clone());
            memo.insert(expr.key(), rebuilt);
        }
        memo[&self.key()].clone()
    }

    // this node over the children given by `new_child`, or the node itself
    // if every child is unchanged
    fn rebuild(&self, mut new_child: impl FnMut(&Expr) -> Expr) -> Expr {
        let children = self.children();
        let new_children: Vec<Expr> = children.iter().map(|&c| new_child(c)).collect();
        if new_children.iter().zip(&children).all(|(new, &old)| new.ptr_eq(old)) {
            return self.clone();
        }
        match self.node() {
            ExprNode::Call {
                function, output, ..
            } => Expr::call(function, new_children, *output),
            ExprNode::Vertcat(_) => Expr::vertcat(new_children),
            node => match (node, new_children.as_slice()) {
                (ExprNode::Unary(op, _), [child]) => Expr::unary(*op, child.clone()),
                (ExprNode::Der(_), [child]) => Expr::der(child.clone()),
                (ExprNode::Binary(op, _, _), [left, right]) => {
                    Expr::binary(*op, left.clone(), right.clone())
                }
                _ => self.clone(),
            },
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        let mut pairs = vec![(self, other)];
        while let Some((a, b)) = pairs.pop() {
            if a.ptr_eq(b) {
                continue;
            }
            let same_node = match (a.node(), b.node()) {
                (ExprNode::Constant(x), ExprNode::Constant(y)) => x == y,
                (ExprNode::Unary(op_a, _), ExprNode::Unary(op_b, _)) => op_a == op_b,
                (ExprNode::Binary(op_a, ..), ExprNode::Binary(op_b, ..)) => op_a == op_b,
                (ExprNode::Der(_), ExprNode::Der(_)) => true,
                (
                    ExprNode::Call {
                        function: fa,
                        args: aa,
                        output: oa,
                    },
                    ExprNode::Call {
                        function: fb,
                        args: ab,
                        output: ob,
                    },
                ) => fa == fb && oa == ob && aa.len() == ab.len(),
                (ExprNode::Vertcat(a), ExprNode::Vertcat(b)) => a.len() == b.len(),
                _ => false,
            };
            if !same_node {
                return false;
            }
            pairs.extend(a.children().into_iter().zip(b.children()));
        }
        true
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::constant(value)
    }
}

// a pending piece of printed output
enum Piece<'a> {
    Node(&'a Expr),
    Text(&'static str),
    Index(usize),
}

// `exprs` separated by commas, followed by `close`, in reverse
fn push_list<'a>(pieces: &mut Vec<Piece<'a>>, exprs: &'a [Expr], close: &'static str) {
    pieces.push(Piece::Text(close));
    for (i, expr) in exprs.iter().enumerate().rev() {
        pieces.push(Piece::Node(expr));
        if i > 0 {
            pieces.push(Piece::Text(","));
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // pieces are pushed in reverse so they pop in printing order
        let mut pieces = vec![Piece::Node(self)];
        while let Some(piece) = pieces.pop() {
            let expr = match piece {
                Piece::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Piece::Index(index) => {
                    write!(f, "{}", index)?;
                    continue;
                }
                Piece::Node(expr) => expr,
            };
            match expr.node() {
                ExprNode::Constant(value) => write!(f, "{}", value)?,
                ExprNode::Symbol(name) => f.write_str(name)?,
                ExprNode::Unary(op @ (UnaryOp::Neg | UnaryOp::Not), child) => {
                    write!(f, "({}", op.name())?;
                    pieces.extend([Piece::Text(")"), Piece::Node(child)]);
                }
                ExprNode::Unary(op, child) => {
                    write!(f, "{}(", op.name())?;
                    pieces.extend([Piece::Text(")"), Piece::Node(child)]);
                }
                ExprNode::Der(child) => {
                    f.write_str("der(")?;
                    pieces.extend([Piece::Text(")"), Piece::Node(child)]);
                }
                ExprNode::Binary(op, left, right) => {
                    f.write_str("(")?;
                    pieces.extend([
                        Piece::Text(")"),
                        Piece::Node(right),
                        Piece::Text(op.symbol()),
                        Piece::Node(left),
                    ]);
                }
                ExprNode::Call {
                    function,
                    args,
                    output,
                } => {
                    write!(f, "{}(", function)?;
                    pieces.extend([Piece::Text("}"), Piece::Index(*output)]);
                    push_list(&mut pieces, args, "){");
                }
                ExprNode::Vertcat(rows) => {
                    f.write_str("vertcat(")?;
                    push_list(&mut pieces, rows, ")");
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Expr({})", self)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, self, rhs)
            }
        }
        impl $trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary($op, self.clone(), rhs.clone())
            }
        }
        impl $trait<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary($op, self, rhs.clone())
            }
        }
        impl $trait<Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, self.clone(), rhs)
            }
        }
        impl $trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                Expr::binary($op, self, Expr::constant(rhs))
            }
        }
        impl $trait<f64> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                Expr::binary($op, self.clone(), Expr::constant(rhs))
            }
        }
        impl $trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, Expr::constant(self), rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Sub);
impl_binary_op!(Mul, mul, BinaryOp::Mul);
impl_binary_op!(Div, div, BinaryOp::Div);

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self)
    }
}

impl Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self.clone())
    }
}
