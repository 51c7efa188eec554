//! Arithmetic formula evaluation.
//!
//! A [`FormulaCalculation`] owns a formula source string together with the
//! ordered list of variable names it binds. The source is parsed once at
//! construction, so a malformed formula surfaces immediately rather than on
//! first evaluation. At evaluation time the i-th declared variable is bound
//! to the i-th input value.

mod ast;
mod lexer;
mod parser;

use std::collections::BTreeMap;

pub use ast::{BinaryOp, Expr};

use crate::error::CalcError;

#[derive(Debug, Clone, PartialEq)]
pub struct FormulaCalculation {
    source: String,
    variables: Vec<String>,
    expr: Expr,
}

impl FormulaCalculation {
    /// Parses `source` and records the positional variable names.
    ///
    /// Returns [`CalcError::UnsupportedSyntax`] if the source does not
    /// conform to the formula grammar.
    pub fn new(
        source: impl Into<String>,
        variables: Vec<String>,
    ) -> Result<Self, CalcError> {
        let source = source.into();
        let expr = parser::parse(&source)?;
        Ok(Self {
            source,
            variables,
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Evaluates the formula with `values[i]` bound to `variables[i]`.
    pub fn evaluate(&self, values: &[f64]) -> Result<f64, CalcError> {
        if values.len() != self.variables.len() {
            return Err(CalcError::Configuration {
                reason: format!(
                    "formula '{}' binds {} variable(s) but received {} value(s)",
                    self.source,
                    self.variables.len(),
                    values.len()
                ),
            });
        }
        let bindings: BTreeMap<String, f64> = self
            .variables
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .collect();
        self.expr.evaluate(&bindings)
    }
}
