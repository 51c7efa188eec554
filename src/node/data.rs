//! Leaf nodes holding raw period values.

use std::collections::BTreeMap;

use crate::Period;

/// A leaf node mapping periods to stored values.
///
/// Lookups are total: a period with no stored value yields the node's
/// default (0.0 unless overridden) instead of an error.
#[derive(Debug, Clone, PartialEq)]
pub struct DataNode {
    name: String,
    values: BTreeMap<Period, f64>,
    default: f64,
}

impl DataNode {
    pub fn new(
        name: impl Into<String>,
        values: impl IntoIterator<Item = (impl Into<Period>, f64)>,
    ) -> Self {
        Self {
            name: name.into(),
            values: values
                .into_iter()
                .map(|(period, value)| (period.into(), value))
                .collect(),
            default: 0.0,
        }
    }

    /// Replaces the fallback returned for periods with no stored value.
    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_value(&self, period: &str) -> f64 {
        self.values.get(period).copied().unwrap_or(self.default)
    }

    pub fn has_value(&self, period: &str) -> bool {
        self.values.contains_key(period)
    }

    pub fn set_value(&mut self, period: impl Into<Period>, value: f64) {
        self.values.insert(period.into(), value);
    }

    pub fn values(&self) -> &BTreeMap<Period, f64> {
        &self.values
    }

    pub fn default_value(&self) -> f64 {
        self.default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_total() {
        let node = DataNode::new("revenue", [("2023", 120.0)]);
        assert_eq!(node.get_value("2023"), 120.0);
        assert_eq!(node.get_value("1999"), 0.0);
        assert!(!node.has_value("1999"));
    }

    #[test]
    fn test_custom_default() {
        let node = DataNode::new("headcount", [("2023", 42.0)]).with_default(1.0);
        assert_eq!(node.get_value("2020"), 1.0);
    }

    #[test]
    fn test_set_value_overwrites() {
        let mut node = DataNode::new("revenue", [("2023", 120.0)]);
        node.set_value("2023", 130.0);
        node.set_value("2024", 140.0);
        assert_eq!(node.get_value("2023"), 130.0);
        assert_eq!(node.get_value("2024"), 140.0);
    }
}
