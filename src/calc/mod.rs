//! Calculation strategies.
//!
//! A [`Calculation`] reduces the already-evaluated values of a node's inputs
//! to a single output value. Strategies never touch the graph themselves;
//! the owning node evaluates its inputs and hands the values over, so a
//! strategy stays a pure function from `(names, values)` to a number.

mod registry;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use registry::CalculationRegistry;

use crate::error::CalcError;
use crate::formula::FormulaCalculation;

/// Caller-supplied reduction over a name→value map keyed by input node
/// names. Duplicate input names fall back to `input_<i>` keys so no value
/// is silently dropped. An `Err` message surfaces as [`CalcError::Custom`].
pub type CustomCalcFn =
    Arc<dyn Fn(&BTreeMap<String, f64>) -> Result<f64, String> + Send + Sync>;

#[derive(Clone)]
pub enum Calculation {
    /// Sum of all inputs. Empty input list reduces to 0.0.
    Addition,
    /// First input minus the sum of the rest. Requires at least one input.
    Subtraction,
    /// Product of all inputs. Empty input list reduces to 1.0.
    Multiplication,
    /// First input divided by the product of the rest. Requires at least
    /// two inputs.
    Division,
    /// Σ(value·weight) / Σ(weight). `None` weights means equal weighting.
    WeightedAverage { weights: Option<Vec<f64>> },
    /// Arithmetic formula with positionally bound variables.
    Formula(FormulaCalculation),
    /// Opaque caller-supplied function. Not serializable.
    Custom { name: String, func: CustomCalcFn },
}

impl Calculation {
    /// Short lowercase label used in error messages and traces.
    pub fn label(&self) -> &str {
        match self {
            Calculation::Addition => "addition",
            Calculation::Subtraction => "subtraction",
            Calculation::Multiplication => "multiplication",
            Calculation::Division => "division",
            Calculation::WeightedAverage { .. } => "weighted average",
            Calculation::Formula(_) => "formula",
            Calculation::Custom { name, .. } => name,
        }
    }

    /// Reduces input values to one output. `names[i]` is the node name the
    /// value `values[i]` came from; the slices always have equal length.
    pub fn reduce(&self, names: &[String], values: &[f64]) -> Result<f64, CalcError> {
        match self {
            Calculation::Addition => Ok(values.iter().sum()),
            Calculation::Subtraction => {
                let Some((first, rest)) = values.split_first() else {
                    return Err(CalcError::InvalidInputCount {
                        op: "subtraction".to_string(),
                        required: 1,
                        actual: 0,
                    });
                };
                Ok(first - rest.iter().sum::<f64>())
            }
            Calculation::Multiplication => Ok(values.iter().product()),
            Calculation::Division => {
                if values.len() < 2 {
                    return Err(CalcError::InvalidInputCount {
                        op: "division".to_string(),
                        required: 2,
                        actual: values.len(),
                    });
                }
                let divisor: f64 = values[1..].iter().product();
                if divisor == 0.0 {
                    return Err(CalcError::DivisionByZero);
                }
                Ok(values[0] / divisor)
            }
            Calculation::WeightedAverage { weights } => {
                weighted_average(values, weights.as_deref())
            }
            Calculation::Formula(formula) => formula.evaluate(values),
            Calculation::Custom { func, .. } => {
                let named = named_inputs(names, values);
                func(&named).map_err(|message| CalcError::Custom { message })
            }
        }
    }
}

fn weighted_average(values: &[f64], weights: Option<&[f64]>) -> Result<f64, CalcError> {
    match weights {
        Some(weights) => {
            if weights.len() != values.len() {
                return Err(CalcError::Configuration {
                    reason: format!(
                        "weighted average has {} weight(s) for {} input(s)",
                        weights.len(),
                        values.len()
                    ),
                });
            }
            let total: f64 = weights.iter().sum();
            if total == 0.0 {
                return Err(CalcError::DivisionByZero);
            }
            let dot: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
            Ok(dot / total)
        }
        None => {
            // Equal weights reduce to the arithmetic mean.
            if values.is_empty() {
                return Err(CalcError::DivisionByZero);
            }
            Ok(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}

fn named_inputs(names: &[String], values: &[f64]) -> BTreeMap<String, f64> {
    let mut map = BTreeMap::new();
    for (i, (name, value)) in names.iter().zip(values).enumerate() {
        let key = if map.contains_key(name) {
            format!("input_{i}")
        } else {
            name.clone()
        };
        map.insert(key, *value);
    }
    map
}

impl fmt::Debug for Calculation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calculation::Addition => f.write_str("Addition"),
            Calculation::Subtraction => f.write_str("Subtraction"),
            Calculation::Multiplication => f.write_str("Multiplication"),
            Calculation::Division => f.write_str("Division"),
            Calculation::WeightedAverage { weights } => f
                .debug_struct("WeightedAverage")
                .field("weights", weights)
                .finish(),
            Calculation::Formula(formula) => {
                f.debug_tuple("Formula").field(formula).finish()
            }
            Calculation::Custom { name, .. } => f
                .debug_struct("Custom")
                .field("name", name)
                .finish_non_exhaustive(),
        }
    }
}
