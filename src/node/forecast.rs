//! Forecast nodes: historical passthrough plus synthesized future periods.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::DataNode;
use crate::error::CalcError;
use crate::Period;

/// Caller-supplied growth function of `(period, prev_period, prev_value)`.
pub type CustomGrowthFn = Arc<dyn Fn(&str, &str, f64) -> f64 + Send + Sync>;

/// Zero-argument sampler drawn from each time a rate is needed.
pub type SamplerFn = Arc<dyn Fn() -> f64 + Send + Sync>;

/// How a forecast node derives each future period's growth rate.
///
/// Every variant yields a rate, not a multiplier: the node computes
/// `prev_value * (1 + rate)`.
#[derive(Clone)]
pub enum GrowthRule {
    /// The same rate for every forecast period.
    Fixed { rate: f64 },
    /// One rate per forecast period, bound positionally.
    Curve { rates: Vec<f64> },
    /// Non-deterministic rate from a distribution sampler. Not serializable.
    Statistical { sampler: SamplerFn },
    /// Opaque caller-supplied rate function. Not serializable.
    Custom { func: CustomGrowthFn },
    /// Ignores growth: every forecast period is the mean of the
    /// historical values.
    AverageValue,
    /// Rate is the mean of period-over-period historical growth.
    AverageHistoricalGrowth,
}

impl GrowthRule {
    pub fn label(&self) -> &'static str {
        match self {
            GrowthRule::Fixed { .. } => "fixed",
            GrowthRule::Curve { .. } => "curve",
            GrowthRule::Statistical { .. } => "statistical",
            GrowthRule::Custom { .. } => "custom",
            GrowthRule::AverageValue => "average_value",
            GrowthRule::AverageHistoricalGrowth => "average_historical_growth",
        }
    }

    fn factor_for(
        &self,
        period: &str,
        prev_period: &str,
        prev_value: f64,
        index: usize,
        history: &BTreeMap<Period, f64>,
    ) -> Result<f64, CalcError> {
        match self {
            GrowthRule::Fixed { rate } => Ok(*rate),
            GrowthRule::Curve { rates } => {
                rates
                    .get(index)
                    .copied()
                    .ok_or_else(|| CalcError::Configuration {
                        reason: format!("no growth rate for forecast period '{period}'"),
                    })
            }
            GrowthRule::Statistical { sampler } => Ok(sampler()),
            GrowthRule::Custom { func } => Ok(func(period, prev_period, prev_value)),
            // The node resolves this variant from history directly; a bare
            // rate of zero keeps the chain flat if called anyway.
            GrowthRule::AverageValue => Ok(0.0),
            GrowthRule::AverageHistoricalGrowth => Ok(average_growth(history)),
        }
    }
}

/// Mean of consecutive percentage changes. Pairs whose prior value is
/// exactly zero are excluded; fewer than two points yields 0.0.
fn average_growth(history: &BTreeMap<Period, f64>) -> f64 {
    let values: Vec<f64> = history.values().copied().collect();
    if values.len() < 2 {
        return 0.0;
    }
    let rates: Vec<f64> = values
        .windows(2)
        .filter(|pair| pair[0] != 0.0)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect();
    if rates.is_empty() {
        0.0
    } else {
        rates.iter().sum::<f64>() / rates.len() as f64
    }
}

impl fmt::Debug for GrowthRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrowthRule::Fixed { rate } => {
                f.debug_struct("Fixed").field("rate", rate).finish()
            }
            GrowthRule::Curve { rates } => {
                f.debug_struct("Curve").field("rates", rates).finish()
            }
            GrowthRule::Statistical { .. } => {
                f.debug_struct("Statistical").finish_non_exhaustive()
            }
            GrowthRule::Custom { .. } => f.debug_struct("Custom").finish_non_exhaustive(),
            GrowthRule::AverageValue => f.write_str("AverageValue"),
            GrowthRule::AverageHistoricalGrowth => f.write_str("AverageHistoricalGrowth"),
        }
    }
}

/// A node that returns its source's historical values up to `base_period`
/// and synthesizes values for `forecast_periods` beyond it.
///
/// The history is a snapshot taken at construction; later mutations of the
/// source node do not flow into an existing forecast node. Each forecast
/// period is derived from the immediately preceding period's value, so the
/// chain always bottoms out at the base period. Period labels must compare
/// lexically in chronological order.
#[derive(Debug, Clone)]
pub struct ForecastNode {
    name: String,
    source: String,
    base_period: Period,
    forecast_periods: Vec<Period>,
    growth: GrowthRule,
    history: BTreeMap<Period, f64>,
    cache: RefCell<BTreeMap<Period, f64>>,
}

impl ForecastNode {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        base_period: impl Into<Period>,
        forecast_periods: impl IntoIterator<Item = impl Into<Period>>,
        growth: GrowthRule,
        history: impl IntoIterator<Item = (impl Into<Period>, f64)>,
    ) -> Result<Self, CalcError> {
        let name = name.into();
        let base_period = base_period.into();
        let mut forecast_periods: Vec<Period> =
            forecast_periods.into_iter().map(Into::into).collect();
        forecast_periods.sort();

        for pair in forecast_periods.windows(2) {
            if pair[0] == pair[1] {
                return Err(CalcError::Configuration {
                    reason: format!(
                        "node '{}': duplicate forecast period '{}'",
                        name, pair[0]
                    ),
                });
            }
        }
        if let Some(first) = forecast_periods.first() {
            if *first <= base_period {
                return Err(CalcError::Configuration {
                    reason: format!(
                        "node '{}': forecast period '{}' is not after base period '{}'",
                        name, first, base_period
                    ),
                });
            }
        }
        if let GrowthRule::Curve { rates } = &growth {
            if rates.len() != forecast_periods.len() {
                return Err(CalcError::Configuration {
                    reason: format!(
                        "node '{}': {} growth rate(s) for {} forecast period(s)",
                        name,
                        rates.len(),
                        forecast_periods.len()
                    ),
                });
            }
        }

        // Only values at or before the base period count as history.
        let history = history
            .into_iter()
            .map(|(period, value)| (period.into(), value))
            .filter(|(period, _): &(Period, f64)| *period <= base_period)
            .collect();

        Ok(Self {
            name,
            source: source.into(),
            base_period,
            forecast_periods,
            growth,
            history,
            cache: RefCell::new(BTreeMap::new()),
        })
    }

    /// Forecast of a plain data node, snapshotting its stored values as
    /// history. Forecasting a calculation node needs graph access; see
    /// [`crate::graph::Graph::add_forecast_of`].
    pub fn from_source(
        name: impl Into<String>,
        source: &DataNode,
        base_period: impl Into<Period>,
        forecast_periods: impl IntoIterator<Item = impl Into<Period>>,
        growth: GrowthRule,
    ) -> Result<Self, CalcError> {
        Self::new(
            name,
            source.name(),
            base_period,
            forecast_periods,
            growth,
            source.values().clone(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn dependencies(&self) -> &[String] {
        std::slice::from_ref(&self.source)
    }

    pub(crate) fn rename_source(&mut self, from: &str, to: &str) {
        if self.source == from {
            self.source = to.to_string();
        }
    }

    pub fn base_period(&self) -> &str {
        &self.base_period
    }

    pub fn forecast_periods(&self) -> &[Period] {
        &self.forecast_periods
    }

    pub fn growth(&self) -> &GrowthRule {
        &self.growth
    }

    pub fn history(&self) -> &BTreeMap<Period, f64> {
        &self.history
    }

    /// Drops synthesized values. The historical snapshot is not a cache
    /// and survives.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn calculate(&self, period: &str) -> Result<f64, CalcError> {
        self.resolve(period)
            .map_err(|err| err.with_context(&self.name, period))
    }

    fn resolve(&self, period: &str) -> Result<f64, CalcError> {
        if period <= self.base_period.as_str() {
            return Ok(self.history.get(period).copied().unwrap_or(0.0));
        }
        if let Some(value) = self.cache.borrow().get(period).copied() {
            return Ok(value);
        }
        let Some(index) = self.forecast_periods.iter().position(|p| p == period) else {
            return Err(CalcError::UnknownPeriod(period.to_string()));
        };
        let value = match &self.growth {
            GrowthRule::AverageValue => self.historical_mean(),
            rule => {
                let prev = if index == 0 {
                    &self.base_period
                } else {
                    &self.forecast_periods[index - 1]
                };
                let prev_value = self.resolve(prev)?;
                let rate =
                    rule.factor_for(period, prev, prev_value, index, &self.history)?;
                prev_value * (1.0 + rate)
            }
        };
        self.cache.borrow_mut().insert(period.to_string(), value);
        Ok(value)
    }

    fn historical_mean(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.values().sum::<f64>() / self.history.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn fixed_ten_percent() -> ForecastNode {
        ForecastNode::new(
            "revenue_fc",
            "revenue",
            "2020",
            ["2021", "2022"],
            GrowthRule::Fixed { rate: 0.10 },
            [("2019", 90.0), ("2020", 100.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_fixed_growth_chains_from_base() {
        let node = fixed_ten_percent();
        assert_close(node.calculate("2021").unwrap(), 110.0);
        assert_close(node.calculate("2022").unwrap(), 121.0);
    }

    #[test]
    fn test_base_period_returns_exact_history() {
        let node = fixed_ten_percent();
        assert_eq!(node.calculate("2020").unwrap(), 100.0);
        assert_eq!(node.calculate("2019").unwrap(), 90.0);
    }

    #[test]
    fn test_unknown_historical_period_is_zero() {
        let node = fixed_ten_percent();
        assert_eq!(node.calculate("2000").unwrap(), 0.0);
    }

    #[test]
    fn test_period_beyond_horizon_errors() {
        let node = fixed_ten_percent();
        let err = node.calculate("2030").unwrap_err();
        assert!(matches!(
            err.root_cause(),
            CalcError::UnknownPeriod(period) if period == "2030"
        ));
    }

    #[test]
    fn test_curve_rates_apply_positionally() {
        let node = ForecastNode::new(
            "fc",
            "base",
            "2020",
            ["2021", "2022"],
            GrowthRule::Curve {
                rates: vec![0.10, 0.20],
            },
            [("2020", 100.0)],
        )
        .unwrap();
        assert_close(node.calculate("2021").unwrap(), 110.0);
        assert_close(node.calculate("2022").unwrap(), 132.0);
    }

    #[test]
    fn test_curve_count_mismatch_fails_at_construction() {
        let err = ForecastNode::new(
            "fc",
            "base",
            "2020",
            ["2021", "2022"],
            GrowthRule::Curve { rates: vec![0.10] },
            [("2020", 100.0)],
        )
        .unwrap_err();
        assert!(matches!(err, CalcError::Configuration { .. }));
    }

    #[rstest]
    #[case("2020")]
    #[case("2019")]
    fn test_forecast_period_must_follow_base(#[case] bad: &str) {
        let err = ForecastNode::new(
            "fc",
            "base",
            "2020",
            [bad],
            GrowthRule::Fixed { rate: 0.0 },
            [("2020", 1.0)],
        )
        .unwrap_err();
        assert!(matches!(err, CalcError::Configuration { .. }));
    }

    #[test]
    fn test_average_value_ignores_growth_chain() {
        let node = ForecastNode::new(
            "fc",
            "base",
            "2020",
            ["2021", "2022"],
            GrowthRule::AverageValue,
            [("2019", 10.0), ("2020", 20.0)],
        )
        .unwrap();
        assert_close(node.calculate("2021").unwrap(), 15.0);
        assert_close(node.calculate("2022").unwrap(), 15.0);
    }

    #[test]
    fn test_average_historical_growth_rate() {
        let node = ForecastNode::new(
            "fc",
            "base",
            "2020",
            ["2021"],
            GrowthRule::AverageHistoricalGrowth,
            [("2018", 100.0), ("2019", 110.0), ("2020", 121.0)],
        )
        .unwrap();
        assert_close(node.calculate("2021").unwrap(), 133.1);
    }

    #[test]
    fn test_average_growth_skips_zero_priors() {
        let history: BTreeMap<Period, f64> = [
            ("2018".to_string(), 0.0),
            ("2019".to_string(), 50.0),
            ("2020".to_string(), 100.0),
        ]
        .into_iter()
        .collect();
        assert_close(average_growth(&history), 1.0);
    }

    #[test]
    fn test_average_growth_needs_two_points() {
        let history: BTreeMap<Period, f64> =
            [("2020".to_string(), 50.0)].into_iter().collect();
        assert_eq!(average_growth(&history), 0.0);
    }

    #[test]
    fn test_custom_rule_sees_previous_value() {
        let node = ForecastNode::new(
            "fc",
            "base",
            "2020",
            ["2021", "2022"],
            GrowthRule::Custom {
                func: Arc::new(|_, _, prev| if prev > 100.0 { 0.0 } else { 0.5 }),
            },
            [("2020", 80.0)],
        )
        .unwrap();
        assert_close(node.calculate("2021").unwrap(), 120.0);
        assert_close(node.calculate("2022").unwrap(), 120.0);
    }

    #[test]
    fn test_statistical_rule_samples_per_period() {
        let node = ForecastNode::new(
            "fc",
            "base",
            "2020",
            ["2021", "2022"],
            GrowthRule::Statistical {
                sampler: Arc::new(|| 0.05),
            },
            [("2020", 100.0)],
        )
        .unwrap();
        assert_close(node.calculate("2021").unwrap(), 105.0);
        assert_close(node.calculate("2022").unwrap(), 110.25);
    }

    #[test]
    fn test_from_source_snapshots_data_values() {
        let revenue = DataNode::new("revenue", [("2019", 90.0), ("2020", 100.0)]);
        let node = ForecastNode::from_source(
            "revenue_fc",
            &revenue,
            "2020",
            ["2021"],
            GrowthRule::Fixed { rate: 0.10 },
        )
        .unwrap();
        assert_eq!(node.source(), "revenue");
        assert_eq!(node.history().len(), 2);
        assert_eq!(node.calculate("2019").unwrap(), 90.0);
        assert_close(node.calculate("2021").unwrap(), 110.0);
    }

    #[test]
    fn test_clear_cache_preserves_history() {
        let node = fixed_ten_percent();
        assert_close(node.calculate("2021").unwrap(), 110.0);
        node.clear_cache();
        assert_eq!(node.calculate("2020").unwrap(), 100.0);
        assert_close(node.calculate("2021").unwrap(), 110.0);
    }
}
