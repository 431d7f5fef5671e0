/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use crate::relation::FieldType;

use std::fmt::{self, Formatter};
use std::str::FromStr;

/// Comparison operators accepted by `select where` and friends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(CompareOp::Eq),
            "!=" => Ok(CompareOp::Ne),
            "<" => Ok(CompareOp::Lt),
            "<=" => Ok(CompareOp::Le),
            ">" => Ok(CompareOp::Gt),
            ">=" => Ok(CompareOp::Ge),
            other => Err(format!("unknown operator '{other}'")),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        f.write_str(text)
    }
}

impl CompareOp {
    fn holds<T: PartialOrd>(&self, lhs: T, rhs: T) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }
    }
}

/// A single-field comparison against a literal.
#[derive(Clone, Debug)]
pub struct Predicate<'a> {
    pub op: CompareOp,
    pub value: &'a str,
}

impl Predicate<'_> {
    /// Evaluate the predicate against one trimmed field value.
    ///
    /// `int` and `float` fields parse both operands; a row whose cell (or a
    /// literal that) does not parse yields `None` and is skipped by the
    /// caller rather than failing the whole scan. Strings compare
    /// lexicographically.
    pub fn matches(&self, field_type: FieldType, cell: &str) -> Option<bool> {
        match field_type {
            FieldType::Int => {
                let lhs: i64 = cell.parse().ok()?;
                let rhs: i64 = self.value.trim().parse().ok()?;
                Some(self.op.holds(lhs, rhs))
            }
            FieldType::Float => {
                let lhs: f64 = cell.parse().ok()?;
                let rhs: f64 = self.value.trim().parse().ok()?;
                Some(self.op.holds(lhs, rhs))
            }
            FieldType::Str => Some(self.op.holds(cell, self.value)),
        }
    }
}
