use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DcfError;
use crate::types::{Money, Rate};
use crate::DcfResult;

/// Longest explicit forecast accepted. Longer horizons are rejected before
/// the growth schedule is expanded.
pub const MAX_YEARS: u32 = 100;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Revenue growth assumption: one rate for every year, or one rate per year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GrowthSchedule {
    Scalar(Rate),
    Sequence(Vec<Rate>),
}

impl GrowthSchedule {
    /// Expand into exactly `years` per-year rates.
    pub fn resolve(&self, years: u32) -> DcfResult<Vec<Rate>> {
        check_horizon(years)?;
        match self {
            GrowthSchedule::Scalar(rate) => Ok(vec![*rate; years as usize]),
            GrowthSchedule::Sequence(rates) => {
                if rates.len() != years as usize {
                    return Err(DcfError::ShapeMismatch {
                        field: "revenue_growth".into(),
                        expected: years as usize,
                        actual: rates.len(),
                    });
                }
                Ok(rates.clone())
            }
        }
    }
}

impl From<Rate> for GrowthSchedule {
    fn from(rate: Rate) -> Self {
        GrowthSchedule::Scalar(rate)
    }
}

impl From<Vec<Rate>> for GrowthSchedule {
    fn from(rates: Vec<Rate>) -> Self {
        GrowthSchedule::Sequence(rates)
    }
}

/// Caller-supplied DCF inputs. Every field is optional at the type level;
/// `resolve` enforces which ones are required and fills in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValuationInputs {
    /// Year-0 revenue. Takes precedence over `base_revenue`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<Money>,
    /// Alternative key for year-0 revenue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_revenue: Option<Money>,
    /// Diluted shares outstanding for per-share value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares_outstanding: Option<Decimal>,
    /// Debt minus cash; negative means net cash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_debt: Option<Money>,
    /// Explicit forecast horizon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_growth: Option<GrowthSchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebit_margin: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<Rate>,
    /// Capital expenditure as a fraction of revenue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capex_pct: Option<Rate>,
    /// Net working capital investment as a fraction of revenue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nwc_pct: Option<Rate>,
    /// Discount rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wacc: Option<Rate>,
    /// Perpetuity growth rate for the Gordon terminal value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_growth: Option<Rate>,
}

/// Partial input set used by scenarios. Every key present replaces the base
/// value; a key present as `null` clears it. The outer `Option` records
/// presence, the inner one the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValuationOverrides {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub revenue: Option<Option<Money>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub base_revenue: Option<Option<Money>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub shares_outstanding: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub net_debt: Option<Option<Money>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub years: Option<Option<u32>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub revenue_growth: Option<Option<GrowthSchedule>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub ebit_margin: Option<Option<Rate>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<Option<Rate>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub capex_pct: Option<Option<Rate>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub nwc_pct: Option<Option<Rate>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub wacc: Option<Option<Rate>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub terminal_growth: Option<Option<Rate>>,
}

impl ValuationOverrides {
    /// Override set that replaces exactly the keys set in `inputs`.
    pub fn setting(inputs: ValuationInputs) -> Self {
        ValuationOverrides {
            revenue: inputs.revenue.map(Some),
            base_revenue: inputs.base_revenue.map(Some),
            shares_outstanding: inputs.shares_outstanding.map(Some),
            net_debt: inputs.net_debt.map(Some),
            years: inputs.years.map(Some),
            revenue_growth: inputs.revenue_growth.map(Some),
            ebit_margin: inputs.ebit_margin.map(Some),
            tax_rate: inputs.tax_rate.map(Some),
            capex_pct: inputs.capex_pct.map(Some),
            nwc_pct: inputs.nwc_pct.map(Some),
            wacc: inputs.wacc.map(Some),
            terminal_growth: inputs.terminal_growth.map(Some),
        }
    }
}

/// A key that is present maps to `Some`, even when its value is `null`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Default model parameters, merged under the caller's inputs on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct DcfDefaults {
    pub years: u32,
    pub revenue_growth: Rate,
    pub ebit_margin: Rate,
    pub tax_rate: Rate,
    pub capex_pct: Rate,
    pub nwc_pct: Rate,
    pub wacc: Rate,
    pub terminal_growth: Rate,
}

impl DcfDefaults {
    pub const STANDARD: DcfDefaults = DcfDefaults {
        years: 5,
        revenue_growth: dec!(0.05),
        ebit_margin: dec!(0.25),
        tax_rate: dec!(0.25),
        capex_pct: dec!(0.05),
        nwc_pct: dec!(0.02),
        wacc: dec!(0.09),
        terminal_growth: dec!(0.025),
    };
}

impl Default for DcfDefaults {
    fn default() -> Self {
        DcfDefaults::STANDARD
    }
}

/// Fully-resolved inputs: defaults applied, growth expanded, all checks passed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedInputs {
    pub revenue: Money,
    pub shares_outstanding: Option<Decimal>,
    pub net_debt: Option<Money>,
    pub years: u32,
    pub revenue_growth: Vec<Rate>,
    pub ebit_margin: Rate,
    pub tax_rate: Rate,
    pub capex_pct: Rate,
    pub nwc_pct: Rate,
    pub wacc: Rate,
    pub terminal_growth: Rate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl ValuationInputs {
    /// Return a new input set with every key present in `overrides` replacing
    /// the corresponding value of `self`. Neither side is modified.
    pub fn overlay(&self, overrides: &ValuationOverrides) -> ValuationInputs {
        fn pick<T: Clone>(over: &Option<Option<T>>, base: &Option<T>) -> Option<T> {
            match over {
                Some(value) => value.clone(),
                None => base.clone(),
            }
        }

        ValuationInputs {
            revenue: pick(&overrides.revenue, &self.revenue),
            base_revenue: pick(&overrides.base_revenue, &self.base_revenue),
            shares_outstanding: pick(&overrides.shares_outstanding, &self.shares_outstanding),
            net_debt: pick(&overrides.net_debt, &self.net_debt),
            years: pick(&overrides.years, &self.years),
            revenue_growth: pick(&overrides.revenue_growth, &self.revenue_growth),
            ebit_margin: pick(&overrides.ebit_margin, &self.ebit_margin),
            tax_rate: pick(&overrides.tax_rate, &self.tax_rate),
            capex_pct: pick(&overrides.capex_pct, &self.capex_pct),
            nwc_pct: pick(&overrides.nwc_pct, &self.nwc_pct),
            wacc: pick(&overrides.wacc, &self.wacc),
            terminal_growth: pick(&overrides.terminal_growth, &self.terminal_growth),
        }
    }

    /// Validate and merge with [`DcfDefaults::STANDARD`].
    pub fn resolve(&self) -> DcfResult<ResolvedInputs> {
        self.resolve_with(&DcfDefaults::STANDARD)
    }

    /// Validate and merge with the given defaults.
    pub fn resolve_with(&self, defaults: &DcfDefaults) -> DcfResult<ResolvedInputs> {
        let revenue = self.revenue.or(self.base_revenue).ok_or_else(|| {
            DcfError::MissingInput {
                field: "revenue".into(),
                reason: "One of revenue or base_revenue is required".into(),
            }
        })?;

        if self.shares_outstanding.is_none() && self.net_debt.is_none() {
            return Err(DcfError::MissingInput {
                field: "shares_outstanding / net_debt".into(),
                reason: "At least one of shares_outstanding or net_debt is required".into(),
            });
        }

        let years = self.years.unwrap_or(defaults.years);
        check_horizon(years)?;

        let revenue_growth = match &self.revenue_growth {
            Some(schedule) => schedule.resolve(years)?,
            None => GrowthSchedule::Scalar(defaults.revenue_growth).resolve(years)?,
        };

        let resolved = ResolvedInputs {
            revenue,
            shares_outstanding: self.shares_outstanding,
            net_debt: self.net_debt,
            years,
            revenue_growth,
            ebit_margin: self.ebit_margin.unwrap_or(defaults.ebit_margin),
            tax_rate: self.tax_rate.unwrap_or(defaults.tax_rate),
            capex_pct: self.capex_pct.unwrap_or(defaults.capex_pct),
            nwc_pct: self.nwc_pct.unwrap_or(defaults.nwc_pct),
            wacc: self.wacc.unwrap_or(defaults.wacc),
            terminal_growth: self.terminal_growth.unwrap_or(defaults.terminal_growth),
        };

        validate_resolved(&resolved)?;
        Ok(resolved)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn check_horizon(years: u32) -> DcfResult<()> {
    if years == 0 {
        return Err(DcfError::InvalidInput {
            field: "years".into(),
            reason: "Forecast horizon must be at least one year".into(),
        });
    }
    if years > MAX_YEARS {
        return Err(DcfError::InvalidInput {
            field: "years".into(),
            reason: format!("Forecast horizon of {years} years exceeds the maximum of {MAX_YEARS}"),
        });
    }
    Ok(())
}

fn validate_resolved(input: &ResolvedInputs) -> DcfResult<()> {
    if input.revenue <= Decimal::ZERO {
        return Err(DcfError::InvalidInput {
            field: "revenue".into(),
            reason: "Base revenue must be positive".into(),
        });
    }
    if input.tax_rate < Decimal::ZERO || input.tax_rate > Decimal::ONE {
        return Err(DcfError::InvalidInput {
            field: "tax_rate".into(),
            reason: "Tax rate must be between 0 and 1".into(),
        });
    }
    if input.wacc <= dec!(-1) {
        return Err(DcfError::InvalidInput {
            field: "wacc".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    if let Some(shares) = input.shares_outstanding {
        if shares < Decimal::ZERO {
            return Err(DcfError::InvalidInput {
                field: "shares_outstanding".into(),
                reason: "Share count cannot be negative".into(),
            });
        }
    }
    if let Some(g) = input.revenue_growth.iter().find(|g| **g <= dec!(-1)) {
        return Err(DcfError::InvalidInput {
            field: "revenue_growth".into(),
            reason: format!("Growth rate {g} would drive revenue to zero or below"),
        });
    }

    // Gordon growth constraint
    if input.wacc <= input.terminal_growth {
        return Err(DcfError::InvalidRateSpread {
            wacc: input.wacc,
            terminal_growth: input.terminal_growth,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DcfErrorKind;
    use pretty_assertions::assert_eq;

    fn minimal() -> ValuationInputs {
        ValuationInputs {
            revenue: Some(dec!(1000)),
            net_debt: Some(dec!(50)),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let r = minimal().resolve().unwrap();
        assert_eq!(r.years, 5);
        assert_eq!(r.revenue_growth, vec![dec!(0.05); 5]);
        assert_eq!(r.ebit_margin, dec!(0.25));
        assert_eq!(r.tax_rate, dec!(0.25));
        assert_eq!(r.capex_pct, dec!(0.05));
        assert_eq!(r.nwc_pct, dec!(0.02));
        assert_eq!(r.wacc, dec!(0.09));
        assert_eq!(r.terminal_growth, dec!(0.025));
    }

    #[test]
    fn test_revenue_takes_precedence_over_base_revenue() {
        let mut input = minimal();
        input.base_revenue = Some(dec!(2000));
        assert_eq!(input.resolve().unwrap().revenue, dec!(1000));

        input.revenue = None;
        assert_eq!(input.resolve().unwrap().revenue, dec!(2000));
    }

    #[test]
    fn test_missing_revenue() {
        let mut input = minimal();
        input.revenue = None;
        let err = input.resolve().unwrap_err();
        assert_eq!(err.kind(), DcfErrorKind::MissingInput);
    }

    #[test]
    fn test_missing_shares_and_net_debt() {
        let mut input = minimal();
        input.net_debt = None;
        let err = input.resolve().unwrap_err();
        assert_eq!(err.kind(), DcfErrorKind::MissingInput);
    }

    #[test]
    fn test_scalar_growth_broadcast() {
        let sched = GrowthSchedule::Scalar(dec!(0.1));
        assert_eq!(sched.resolve(3).unwrap(), vec![dec!(0.1); 3]);
    }

    #[test]
    fn test_sequence_growth_length_mismatch() {
        let mut input = minimal();
        input.years = Some(4);
        input.revenue_growth = Some(vec![dec!(0.1), dec!(0.08)].into());
        match input.resolve().unwrap_err() {
            DcfError::ShapeMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_years_rejected() {
        let mut input = minimal();
        input.years = Some(0);
        assert_eq!(input.resolve().unwrap_err().kind(), DcfErrorKind::InvalidInput);
    }

    #[test]
    fn test_rate_spread_rejected() {
        let mut input = minimal();
        input.wacc = Some(dec!(0.03));
        input.terminal_growth = Some(dec!(0.03));
        assert_eq!(
            input.resolve().unwrap_err().kind(),
            DcfErrorKind::InvalidRateSpread
        );
    }

    #[test]
    fn test_tax_rate_out_of_range() {
        let mut input = minimal();
        input.tax_rate = Some(dec!(1.2));
        assert_eq!(input.resolve().unwrap_err().kind(), DcfErrorKind::InvalidInput);
    }

    #[test]
    fn test_horizon_above_cap_rejected_before_expansion() {
        let mut input = minimal();
        input.years = Some(u32::MAX);
        assert_eq!(input.resolve().unwrap_err().kind(), DcfErrorKind::InvalidInput);

        let sched = GrowthSchedule::Scalar(dec!(0.05));
        assert!(sched.resolve(MAX_YEARS + 1).is_err());
        assert_eq!(sched.resolve(MAX_YEARS).unwrap().len(), MAX_YEARS as usize);
    }

    #[test]
    fn test_overlay_replaces_only_present_keys() {
        let base = ValuationInputs {
            wacc: Some(dec!(0.10)),
            ebit_margin: Some(dec!(0.20)),
            ..minimal()
        };
        let overrides = ValuationOverrides {
            wacc: Some(Some(dec!(0.12))),
            revenue_growth: Some(Some(dec!(0.08).into())),
            ..Default::default()
        };
        let merged = base.overlay(&overrides);

        assert_eq!(merged.wacc, Some(dec!(0.12)));
        assert_eq!(merged.revenue_growth, Some(GrowthSchedule::Scalar(dec!(0.08))));
        assert_eq!(merged.ebit_margin, Some(dec!(0.20)));
        assert_eq!(merged.revenue, Some(dec!(1000)));
        // base untouched
        assert_eq!(base.wacc, Some(dec!(0.10)));
        assert_eq!(base.revenue_growth, None);
    }

    #[test]
    fn test_null_override_clears_base_value() {
        let base = minimal();
        let overrides: ValuationOverrides =
            serde_json::from_str(r#"{"net_debt": null, "wacc": 0.11}"#).unwrap();
        assert_eq!(overrides.net_debt, Some(None));
        assert_eq!(overrides.revenue, None);

        let merged = base.overlay(&overrides);
        assert_eq!(merged.net_debt, None);
        assert_eq!(merged.wacc, Some(dec!(0.11)));
        assert_eq!(merged.revenue, Some(dec!(1000)));
    }

    #[test]
    fn test_setting_overrides_only_set_keys() {
        let overrides = ValuationOverrides::setting(ValuationInputs {
            tax_rate: Some(dec!(0.3)),
            ..Default::default()
        });
        assert_eq!(overrides.tax_rate, Some(Some(dec!(0.3))));
        assert_eq!(overrides.net_debt, None);
        assert_eq!(minimal().overlay(&overrides).net_debt, Some(dec!(50)));
    }

    #[test]
    fn test_override_unknown_key_rejected() {
        let parsed: Result<ValuationOverrides, _> =
            serde_json::from_str(r#"{"discount_rate": 0.1}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_deserialize_scalar_and_sequence_growth() {
        let scalar: ValuationInputs =
            serde_json::from_str(r#"{"revenue": 1000, "net_debt": 0, "revenue_growth": 0.07}"#)
                .unwrap();
        assert_eq!(scalar.revenue_growth, Some(GrowthSchedule::Scalar(dec!(0.07))));

        let seq: ValuationInputs = serde_json::from_str(
            r#"{"base_revenue": 500, "shares_outstanding": 10, "years": 2, "revenue_growth": [0.1, 0.05]}"#,
        )
        .unwrap();
        assert_eq!(
            seq.revenue_growth,
            Some(GrowthSchedule::Sequence(vec![dec!(0.1), dec!(0.05)]))
        );
        assert_eq!(seq.base_revenue, Some(dec!(500)));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let parsed: Result<ValuationInputs, _> =
            serde_json::from_str(r#"{"revenue": 1000, "discount_rate": 0.1}"#);
        assert!(parsed.is_err());
    }
}
