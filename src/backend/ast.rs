use super::phases::types::{Loc, Located};
use std::fmt::Display;
use strum_macros::{Display, EnumIter};

/// Compile-time arithmetic is 32-bit two's complement.
pub type Value = i32;

pub type Node = Located<Expr>;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum UnaryOp {
    #[strum(to_string = "!")]
    LogicalNot,
    #[strum(to_string = "-")]
    Negate,
    #[strum(to_string = "~")]
    BitNot,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum BinaryOp {
    #[strum(to_string = "+")]
    Add,
    #[strum(to_string = "-")]
    Sub,
    #[strum(to_string = "*")]
    Mul,
    #[strum(to_string = "/")]
    Div,
    #[strum(to_string = "%")]
    Mod,
    #[strum(to_string = "<<")]
    Shl,
    #[strum(to_string = ">>")]
    Shr,
    #[strum(to_string = "&")]
    And,
    #[strum(to_string = "|")]
    Or,
    #[strum(to_string = "^")]
    Xor,
    #[strum(to_string = "==")]
    Eq,
    #[strum(to_string = "!=")]
    Ne,
    #[strum(to_string = "<")]
    Lt,
    #[strum(to_string = ">")]
    Gt,
    #[strum(to_string = "<=")]
    Le,
    #[strum(to_string = ">=")]
    Ge,
    #[strum(to_string = "&&")]
    LogicalAnd,
    #[strum(to_string = "||")]
    LogicalOr,
}

/// Expression and condition trees, as handed over by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(Value),
    Ident(String),
    // Explicit parentheses are kept so that later phases can see them.
    Group(Box<Node>),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn operand(f: &mut std::fmt::Formatter<'_>, node: &Node) -> std::fmt::Result {
            match node.as_value() {
                Expr::Binary(..) => write!(f, "({})", node.as_value()),
                expr => write!(f, "{}", expr),
            }
        }

        match self {
            Expr::Number(v) => write!(f, "{}", v),
            Expr::Ident(name) => write!(f, "{}", name),
            Expr::Group(inner) => write!(f, "({})", inner.as_value()),
            Expr::Unary(op, inner) => {
                write!(f, "{}", op)?;
                operand(f, inner)
            }
            Expr::Binary(op, lhs, rhs) => {
                operand(f, lhs)?;
                write!(f, " {} ", op)?;
                operand(f, rhs)
            }
        }
    }
}

impl Expr {
    pub fn at(self, loc: Loc) -> Node {
        Located::with_loc(loc, self)
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Number(_))
    }
}

pub fn num(v: Value) -> Node {
    Node::from(Expr::Number(v))
}

pub fn ident(name: &str) -> Node {
    Node::from(Expr::Ident(name.to_owned()))
}

pub fn group(inner: Node) -> Node {
    let loc = inner.loc();
    Node::from(Expr::Group(Box::new(inner))).proximate_to_option_loc(loc)
}

pub fn unary(op: UnaryOp, inner: Node) -> Node {
    let loc = inner.loc();
    Node::from(Expr::Unary(op, Box::new(inner))).proximate_to_option_loc(loc)
}

pub fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Node {
    let loc = lhs.loc();
    Node::from(Expr::Binary(op, Box::new(lhs), Box::new(rhs))).proximate_to_option_loc(loc)
}

pub fn not(inner: Node) -> Node {
    unary(UnaryOp::LogicalNot, inner)
}

pub fn and(lhs: Node, rhs: Node) -> Node {
    binary(BinaryOp::LogicalAnd, lhs, rhs)
}

pub fn or(lhs: Node, rhs: Node) -> Node {
    binary(BinaryOp::LogicalOr, lhs, rhs)
}
