//! Alias registry for calculation strategies.
//!
//! Callers that configure graphs from user-facing strings ("addition",
//! "weighted_average") resolve them here instead of through a process-wide
//! singleton. Construct one registry per process or per test and pass it
//! by reference.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::Calculation;
use crate::error::CalcError;

type Factory = Arc<dyn Fn() -> Calculation + Send + Sync>;

pub struct CalculationRegistry {
    factories: BTreeMap<String, Factory>,
}

impl CalculationRegistry {
    /// An empty registry with no aliases at all.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registers `factory` under `alias`, replacing any previous entry.
    pub fn register(
        &mut self,
        alias: impl Into<String>,
        factory: impl Fn() -> Calculation + Send + Sync + 'static,
    ) {
        self.factories.insert(alias.into(), Arc::new(factory));
    }

    /// Builds a fresh strategy for `alias`.
    pub fn resolve(&self, alias: &str) -> Result<Calculation, CalcError> {
        match self.factories.get(alias) {
            Some(factory) => Ok(factory()),
            None => Err(CalcError::Configuration {
                reason: format!(
                    "unresolved calculation alias '{}' (known: {})",
                    alias,
                    self.aliases().join(", ")
                ),
            }),
        }
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.factories.contains_key(alias)
    }

    /// All registered aliases in sorted order.
    pub fn aliases(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for CalculationRegistry {
    /// Registry pre-populated with the built-in strategies under their
    /// common spellings.
    fn default() -> Self {
        let mut registry = Self::empty();
        for alias in ["addition", "add", "sum"] {
            registry.register(alias, || Calculation::Addition);
        }
        for alias in ["subtraction", "subtract"] {
            registry.register(alias, || Calculation::Subtraction);
        }
        for alias in ["multiplication", "multiply", "product"] {
            registry.register(alias, || Calculation::Multiplication);
        }
        for alias in ["division", "divide"] {
            registry.register(alias, || Calculation::Division);
        }
        for alias in ["weighted_average", "weighted-average"] {
            registry.register(alias, || Calculation::WeightedAverage {
                weights: None,
            });
        }
        registry
    }
}

impl fmt::Debug for CalculationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculationRegistry")
            .field("aliases", &self.aliases())
            .finish()
    }
}
