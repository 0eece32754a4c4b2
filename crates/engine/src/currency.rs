use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Currency an expense was recorded in.
///
/// Balances never convert between currencies. Only EUR is accepted, but the
/// code is stored on every expense row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Eur,
}

impl Currency {
    /// Code stored in the `expenses.currency` column.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(code: &str) -> Result<Self, Self::Error> {
        if code.trim().eq_ignore_ascii_case("EUR") {
            return Ok(Currency::Eur);
        }
        Err(EngineError::CurrencyMismatch(format!(
            "unsupported currency: {}",
            code.trim().to_ascii_uppercase()
        )))
    }
}
