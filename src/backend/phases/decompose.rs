use crate::backend::ast::{BinaryOp, Expr, Node, UnaryOp};
use std::fmt::Display;

/*
    Short-circuit conditions are lowered onto primitive conditional jumps:

        if (a && b) goto lbl        ->  if (!a) goto @end   if (b) goto lbl     @end:
        if (a || b) goto lbl        ->  if (a) goto lbl     if (b) goto lbl
        if (!(a && b)) goto lbl     ->  if (!a) goto lbl    if (!b) goto lbl
        if (!(a || b)) goto lbl     ->  if (a) goto @end    if (!b) goto lbl    @end:
        if (!(!a)) goto lbl         ->  if (a) goto lbl

    Skip labels are named after their path through the tree, so compiling the same
    conditional twice gives the same names.
*/

/// Generates synthetic label names for one top-level conditional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelScope {
    prefix: String,
}

impl LabelScope {
    pub fn new(seed: &str) -> Self {
        LabelScope {
            prefix: seed.to_owned(),
        }
    }

    fn child(&self, tag: &str) -> Self {
        LabelScope {
            prefix: format!("{}@{}", self.prefix, tag),
        }
    }

    fn end_label(&self) -> String {
        format!("{}@end", self.prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jump {
    pub cond: Node,
    pub negated: bool,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Jump(Jump),
    Label(String),
}

impl Display for Jump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cond = self.cond.as_value();
        match (self.negated, cond) {
            (false, _) => write!(f, "if ({}) goto {}", cond, self.target),
            (true, Expr::Binary(..)) => write!(f, "if (!({})) goto {}", cond, self.target),
            (true, _) => write!(f, "if (!{}) goto {}", cond, self.target),
        }
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Jump(jump) => write!(f, "{}", jump),
            Step::Label(name) => write!(f, "{}:", name),
        }
    }
}

fn decompose_into(
    cond: &Node,
    negated: bool,
    target: &str,
    scope: &LabelScope,
    out: &mut Vec<Step>,
) {
    match (cond.as_value(), negated) {
        (Expr::Group(inner), _) => decompose_into(inner, negated, target, scope, out),

        (Expr::Unary(UnaryOp::LogicalNot, inner), _) => {
            decompose_into(inner, !negated, target, scope, out)
        }

        (Expr::Binary(BinaryOp::LogicalAnd, lhs, rhs), false) => {
            let end = scope.end_label();
            decompose_into(lhs, true, &end, &scope.child("and1"), out);
            decompose_into(rhs, false, target, &scope.child("and2"), out);
            out.push(Step::Label(end));
        }

        (Expr::Binary(BinaryOp::LogicalOr, lhs, rhs), false) => {
            decompose_into(lhs, false, target, &scope.child("or1"), out);
            decompose_into(rhs, false, target, &scope.child("or2"), out);
        }

        // !(a && b) == !a || !b
        (Expr::Binary(BinaryOp::LogicalAnd, lhs, rhs), true) => {
            decompose_into(lhs, true, target, &scope.child("not_and1"), out);
            decompose_into(rhs, true, target, &scope.child("not_and2"), out);
        }

        // !(a || b) == !a && !b
        (Expr::Binary(BinaryOp::LogicalOr, lhs, rhs), true) => {
            let end = scope.end_label();
            decompose_into(lhs, false, &end, &scope.child("not_or1"), out);
            decompose_into(rhs, true, target, &scope.child("not_or2"), out);
            out.push(Step::Label(end));
        }

        _ => out.push(Step::Jump(Jump {
            cond: cond.clone(),
            negated,
            target: target.to_owned(),
        })),
    }
}

/// Flattens `if (cond) goto target` into primitive jumps and skip labels, in evaluation order.
pub fn decompose(cond: &Node, target: &str, scope: &LabelScope) -> Vec<Step> {
    let mut steps = Vec::new();
    decompose_into(cond, false, target, scope, &mut steps);
    steps
}
