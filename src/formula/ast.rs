//! Expression tree produced by the formula parser.

use std::collections::BTreeMap;

use crate::error::CalcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Evaluates the expression against a set of variable bindings.
    ///
    /// Referencing a variable absent from `bindings` is an error, as is
    /// dividing by an exact zero.
    pub fn evaluate(&self, bindings: &BTreeMap<String, f64>) -> Result<f64, CalcError> {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Variable(name) => {
                bindings
                    .get(name)
                    .copied()
                    .ok_or_else(|| CalcError::UnknownVariable {
                        name: name.clone(),
                        available: bindings.keys().cloned().collect(),
                    })
            }
            Expr::Negate(inner) => Ok(-inner.evaluate(bindings)?),
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.evaluate(bindings)?;
                let r = rhs.evaluate(bindings)?;
                match op {
                    BinaryOp::Add => Ok(l + r),
                    BinaryOp::Subtract => Ok(l - r),
                    BinaryOp::Multiply => Ok(l * r),
                    BinaryOp::Divide => {
                        if r == 0.0 {
                            Err(CalcError::DivisionByZero)
                        } else {
                            Ok(l / r)
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_evaluate_nested_negation() {
        let expr = Expr::Negate(Box::new(Expr::Negate(Box::new(Expr::Number(3.0)))));
        assert_eq!(expr.evaluate(&BTreeMap::new()).unwrap(), 3.0);
    }

    #[test]
    fn test_unknown_variable_lists_available_names() {
        let expr = Expr::Variable("margin".into());
        let err = expr.evaluate(&bindings(&[("revenue", 1.0), ("cogs", 2.0)])).unwrap_err();
        match err {
            CalcError::UnknownVariable { name, available } => {
                assert_eq!(name, "margin");
                assert_eq!(available, vec!["cogs".to_string(), "revenue".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_divide_by_zero_is_typed() {
        let expr = Expr::Binary {
            op: BinaryOp::Divide,
            lhs: Box::new(Expr::Number(1.0)),
            rhs: Box::new(Expr::Number(0.0)),
        };
        assert!(matches!(
            expr.evaluate(&BTreeMap::new()),
            Err(CalcError::DivisionByZero)
        ));
    }
}
