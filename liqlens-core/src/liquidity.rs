//! Net liquidity composer.
//!
//! net_liquidity[t] = balance_sheet[t] - tga[t] - rrp[t]
//!
//! An output point exists only for dates where all three components have a
//! value; nothing is extrapolated across gaps. FRED reports the Fed balance
//! sheet (WALCL) in millions and TGA/RRP in billions, so each component
//! carries its [`Units`] and everything is normalized to billions before
//! subtracting.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::align::AlignedPanel;
use crate::series::{Observation, TimeSeries};

/// Default name of the derived series.
pub const NET_LIQUIDITY: &str = "net_liquidity";

/// Reporting units of a dollar series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    Millions,
    #[default]
    Billions,
}

impl Units {
    /// Multiplier that converts a value in these units to billions.
    pub fn to_billions(self) -> f64 {
        match self {
            Units::Millions => 1e-3,
            Units::Billions => 1.0,
        }
    }
}

/// The three balance-sheet components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    BalanceSheet,
    TreasuryGeneralAccount,
    ReverseRepo,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Component::BalanceSheet => "fed balance sheet",
            Component::TreasuryGeneralAccount => "treasury general account",
            Component::ReverseRepo => "reverse repo",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiquidityError {
    #[error("net liquidity needs the {0} series, which is missing")]
    MissingComponent(Component),

    #[error("net liquidity needs the {0} series, which has no observations")]
    EmptyComponent(Component),

    #[error("net liquidity components share no common dates")]
    NoCommonDates,
}

/// Units of each component. Default: WALCL millions, WTREGEN/RRPONTSYD billions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityUnits {
    pub balance_sheet: Units,
    pub treasury_general_account: Units,
    pub reverse_repo: Units,
}

impl Default for LiquidityUnits {
    fn default() -> Self {
        Self {
            balance_sheet: Units::Millions,
            treasury_general_account: Units::Billions,
            reverse_repo: Units::Billions,
        }
    }
}

impl LiquidityUnits {
    /// All three components already in the same units.
    pub fn uniform() -> Self {
        Self {
            balance_sheet: Units::Billions,
            treasury_general_account: Units::Billions,
            reverse_repo: Units::Billions,
        }
    }
}

/// Component inputs; any may be absent when its fetch failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiquidityInputs<'a> {
    pub balance_sheet: Option<&'a TimeSeries>,
    pub treasury_general_account: Option<&'a TimeSeries>,
    pub reverse_repo: Option<&'a TimeSeries>,
}

fn require<'a>(
    series: Option<&'a TimeSeries>,
    component: Component,
) -> Result<&'a TimeSeries, LiquidityError> {
    let s = series.ok_or(LiquidityError::MissingComponent(component))?;
    if s.is_empty() {
        return Err(LiquidityError::EmptyComponent(component));
    }
    Ok(s)
}

/// Compose net liquidity (in billions) on the dates present in all three inputs.
pub fn compose(
    inputs: &LiquidityInputs<'_>,
    units: LiquidityUnits,
) -> Result<TimeSeries, LiquidityError> {
    let bs = require(inputs.balance_sheet, Component::BalanceSheet)?.points();
    let tga = require(
        inputs.treasury_general_account,
        Component::TreasuryGeneralAccount,
    )?
    .points();
    let rrp = require(inputs.reverse_repo, Component::ReverseRepo)?.points();

    let (kb, kt, kr) = (
        units.balance_sheet.to_billions(),
        units.treasury_general_account.to_billions(),
        units.reverse_repo.to_billions(),
    );

    // Three-way merge over strictly increasing dates
    let (mut i, mut j, mut k) = (0, 0, 0);
    let mut out = Vec::new();
    while i < bs.len() && j < tga.len() && k < rrp.len() {
        let max = bs[i].date.max(tga[j].date).max(rrp[k].date);
        if bs[i].date < max {
            i += 1;
        } else if tga[j].date < max {
            j += 1;
        } else if rrp[k].date < max {
            k += 1;
        } else {
            let value = bs[i].value * kb - tga[j].value * kt - rrp[k].value * kr;
            out.push(Observation::new(max, value));
            i += 1;
            j += 1;
            k += 1;
        }
    }

    if out.is_empty() {
        return Err(LiquidityError::NoCommonDates);
    }
    Ok(TimeSeries::from_unsorted(NET_LIQUIDITY, out))
}

/// Column names of the three components inside a panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentNames {
    pub balance_sheet: String,
    pub treasury_general_account: String,
    pub reverse_repo: String,
}

impl Default for ComponentNames {
    fn default() -> Self {
        Self {
            balance_sheet: "walcl".into(),
            treasury_general_account: "tga".into(),
            reverse_repo: "rrp".into(),
        }
    }
}

/// Compose net liquidity from three columns of an aligned panel.
///
/// With a forward-filled panel this yields a value on every index date where
/// all three components have been observed at least once.
pub fn compose_on_panel(
    panel: &AlignedPanel,
    names: &ComponentNames,
    units: LiquidityUnits,
) -> Result<TimeSeries, LiquidityError> {
    let bs = panel.column_series(&names.balance_sheet);
    let tga = panel.column_series(&names.treasury_general_account);
    let rrp = panel.column_series(&names.reverse_repo);
    compose(
        &LiquidityInputs {
            balance_sheet: bs.as_ref(),
            treasury_general_account: tga.as_ref(),
            reverse_repo: rrp.as_ref(),
        },
        units,
    )
}
