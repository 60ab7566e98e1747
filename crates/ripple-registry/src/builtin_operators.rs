// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::collections::HashMap;
use std::sync::Arc;

use ripple_type::Value;

use crate::operator::{Operator, RowEvaluator};

pub(crate) fn register_all(operators: &mut HashMap<String, Box<dyn Operator>>) {
    operators.insert("eq".into(), Box::new(BinaryCompare(|a, b| a == b)));
    operators.insert("neq".into(), Box::new(BinaryCompare(|a, b| a != b)));
    operators.insert("gt".into(), Box::new(BinaryCompare(|a, b| a > b)));
    operators.insert("gte".into(), Box::new(BinaryCompare(|a, b| a >= b)));
    operators.insert("lt".into(), Box::new(BinaryCompare(|a, b| a < b)));
    operators.insert("lte".into(), Box::new(BinaryCompare(|a, b| a <= b)));
    operators.insert("and".into(), Box::new(LogicalAnd));
    operators.insert("or".into(), Box::new(LogicalOr));
    operators.insert("not".into(), Box::new(LogicalNot));
    operators.insert("add".into(), Box::new(Add));
}

struct BinaryCompare(fn(&Value, &Value) -> bool);

impl Operator for BinaryCompare {
    fn build(&self, args: Vec<RowEvaluator>, _is_single_row: bool) -> RowEvaluator {
        let [left, right]: [RowEvaluator; 2] = args.try_into().expect("binary operator takes exactly two args");
        let cmp = self.0;
        Arc::new(move |row| Value::Bool(cmp(&left(row), &right(row))))
    }
}

struct LogicalAnd;

impl Operator for LogicalAnd {
    fn build(&self, args: Vec<RowEvaluator>, _is_single_row: bool) -> RowEvaluator {
        let [left, right]: [RowEvaluator; 2] = args.try_into().expect("`and` takes exactly two args");
        Arc::new(move |row| {
            let truthy = left(row).as_bool().unwrap_or(false) && right(row).as_bool().unwrap_or(false);
            Value::Bool(truthy)
        })
    }
}

struct LogicalOr;

impl Operator for LogicalOr {
    fn build(&self, args: Vec<RowEvaluator>, _is_single_row: bool) -> RowEvaluator {
        let [left, right]: [RowEvaluator; 2] = args.try_into().expect("`or` takes exactly two args");
        Arc::new(move |row| {
            let truthy = left(row).as_bool().unwrap_or(false) || right(row).as_bool().unwrap_or(false);
            Value::Bool(truthy)
        })
    }
}

struct LogicalNot;

impl Operator for LogicalNot {
    fn build(&self, args: Vec<RowEvaluator>, _is_single_row: bool) -> RowEvaluator {
        let [operand]: [RowEvaluator; 1] = args.try_into().expect("`not` takes exactly one arg");
        Arc::new(move |row| Value::Bool(!operand(row).as_bool().unwrap_or(false)))
    }
}

struct Add;

impl Operator for Add {
    fn build(&self, args: Vec<RowEvaluator>, _is_single_row: bool) -> RowEvaluator {
        let [left, right]: [RowEvaluator; 2] = args.try_into().expect("`add` takes exactly two args");
        Arc::new(move |row| match (left(row), right(row)) {
            (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
            (a, b) => {
                let a = numeric(&a);
                let b = numeric(&b);
                match (a, b) {
                    (Some(a), Some(b)) => Value::float(a + b),
                    _ => Value::Undefined,
                }
            }
        })
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some((*f).into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_type::Row;

    fn const_eval(v: Value) -> RowEvaluator {
        Arc::new(move |_row| v.clone())
    }

    #[test]
    fn eq_compares_structurally() {
        let op = BinaryCompare(|a, b| a == b);
        let eval = op.build(vec![const_eval(Value::Int(1)), const_eval(Value::Int(1))], false);
        assert_eq!(eval(&Row::new()), Value::Bool(true));
    }

    #[test]
    fn add_promotes_mixed_int_float() {
        let op = Add;
        let eval = op.build(vec![const_eval(Value::Int(1)), const_eval(Value::float(1.5))], false);
        assert_eq!(eval(&Row::new()), Value::float(2.5));
    }
}
