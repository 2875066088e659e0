use super::types::Located;
use crate::backend::ast::{BinaryOp, Expr, Node, UnaryOp, Value};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticError {
    DivideByZero,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Not fatal: the caller emits runtime code for the expression instead.
    NotConstant(String),
    Arithmetic(ArithmeticError),
}

impl Display for ArithmeticError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArithmeticError::DivideByZero => write!(f, "Division by zero in constant expression"),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotConstant(what) => write!(f, "Expression '{}' is not constant", what),
            Error::Arithmetic(err) => write!(f, "{}", err),
        }
    }
}

const fn truth(b: bool) -> Value {
    if b {
        1
    } else {
        0
    }
}

fn apply_unary(op: UnaryOp, v: Value) -> Value {
    match op {
        UnaryOp::LogicalNot => truth(v == 0),
        UnaryOp::Negate => v.wrapping_neg(),
        UnaryOp::BitNot => !v,
    }
}

fn apply_binary(op: BinaryOp, l: Value, r: Value) -> Result<Value, ArithmeticError> {
    Ok(match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Sub => l.wrapping_sub(r),
        BinaryOp::Mul => l.wrapping_mul(r),
        BinaryOp::Div | BinaryOp::Mod if r == 0 => return Err(ArithmeticError::DivideByZero),
        // Rust division already truncates toward zero.
        BinaryOp::Div => l.wrapping_div(r),
        BinaryOp::Mod => l.wrapping_rem(r),
        BinaryOp::Shl => l.wrapping_shl(r as u32),
        BinaryOp::Shr => l.wrapping_shr(r as u32),
        BinaryOp::And => l & r,
        BinaryOp::Or => l | r,
        BinaryOp::Xor => l ^ r,
        BinaryOp::Eq => truth(l == r),
        BinaryOp::Ne => truth(l != r),
        BinaryOp::Lt => truth(l < r),
        BinaryOp::Gt => truth(l > r),
        BinaryOp::Le => truth(l <= r),
        BinaryOp::Ge => truth(l >= r),
        BinaryOp::LogicalAnd => truth(l != 0 && r != 0),
        BinaryOp::LogicalOr => truth(l != 0 || r != 0),
    })
}

/// Evaluates `node`, resolving identifiers through `lookup`.
///
/// `&&` and `||` short-circuit, so `0 && x` is constant even when `x` is not.
pub fn evaluate<F>(node: &Node, lookup: &F) -> Result<Value, Located<Error>>
where
    F: Fn(&str) -> Option<Value>,
{
    let err = |e| node.transfer(e);

    match node.as_value() {
        Expr::Number(v) => Ok(*v),
        Expr::Ident(name) => lookup(name).ok_or_else(|| err(Error::NotConstant(name.clone()))),
        Expr::Group(inner) => evaluate(inner, lookup),
        Expr::Unary(op, inner) => Ok(apply_unary(*op, evaluate(inner, lookup)?)),
        Expr::Binary(BinaryOp::LogicalAnd, lhs, rhs) => Ok(truth(
            evaluate(lhs, lookup)? != 0 && evaluate(rhs, lookup)? != 0,
        )),
        Expr::Binary(BinaryOp::LogicalOr, lhs, rhs) => Ok(truth(
            evaluate(lhs, lookup)? != 0 || evaluate(rhs, lookup)? != 0,
        )),
        Expr::Binary(op, lhs, rhs) => {
            let l = evaluate(lhs, lookup)?;
            let r = evaluate(rhs, lookup)?;
            apply_binary(*op, l, r).map_err(|e| err(Error::Arithmetic(e)))
        }
    }
}

/// Folds a tree whose leaves are all literals.
pub fn fold(node: &Node) -> Result<Value, Located<Error>> {
    evaluate(node, &|_| None)
}

/// Like `fold`, but a non-constant tree is `Ok(None)`, leaving only the fatal case as an error.
pub fn try_fold(node: &Node) -> Result<Option<Value>, Located<ArithmeticError>> {
    match fold(node) {
        Ok(v) => Ok(Some(v)),
        Err(err) => match err.as_value() {
            Error::NotConstant(_) => Ok(None),
            Error::Arithmetic(arith) => Err(err.transfer(*arith)),
        },
    }
}
