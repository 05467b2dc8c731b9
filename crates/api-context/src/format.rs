//! Balance formatting defaults.
//!
//! Bootstrap sets the decimals and unit of the primary chain; every balance
//! rendered afterwards uses them.

use std::sync::{Arc, OnceLock, RwLock};

/// Number of fractional digits shown by [`BalanceFormatter::format_balance`].
const SHOWN_DECIMALS: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Decimals and unit applied when formatting balances.
pub struct FormatDefaults {
    pub decimals: u32,
    pub unit: String,
}

impl Default for FormatDefaults {
    fn default() -> Self {
        Self {
            decimals: 0,
            unit: "Unit".into(),
        }
    }
}

/// Holds the formatting defaults. Last writer wins.
#[derive(Debug, Default)]
pub struct BalanceFormatter {
    defaults: RwLock<FormatDefaults>,
}

impl BalanceFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide formatter.
    pub fn global() -> Arc<BalanceFormatter> {
        static GLOBAL: OnceLock<Arc<BalanceFormatter>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(BalanceFormatter::new())).clone()
    }

    /// Replaces the defaults for every subsequent format call.
    pub fn set_defaults(&self, decimals: u32, unit: &str) {
        *self.defaults.write().unwrap_or_else(|e| e.into_inner()) = FormatDefaults {
            decimals,
            unit: unit.to_string(),
        };
    }

    /// Current defaults.
    pub fn defaults(&self) -> FormatDefaults {
        self.defaults
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Formats a raw balance, e.g. `1500000000000` with 12 decimals as
    /// `"1.5000 UNIT"`. Extra fractional digits are truncated.
    pub fn format_balance(&self, value: u128) -> String {
        let FormatDefaults { decimals, unit } = self.defaults();
        // u128 holds at most 10^38.
        let decimals = decimals.min(38);
        if decimals == 0 {
            return format!("{value} {unit}");
        }

        let base = 10u128.pow(decimals);
        let whole = value / base;
        let frac = value % base;
        let shown = SHOWN_DECIMALS.min(decimals);
        let frac = frac / 10u128.pow(decimals - shown);
        format!("{whole}.{frac:0width$} {unit}", width = shown as usize)
    }
}
