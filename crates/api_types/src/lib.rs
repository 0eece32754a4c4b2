use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Eur,
}

/// Monetary amount carried as integer cents.
///
/// In JSON it is a number with at most two decimals (`17.5`, `-2.25`).
/// Requests may also send it as a string (`"17.50"` or `"17,50"`); more than
/// two decimals are rejected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(pub i64);

impl Amount {
    pub fn cents(self) -> i64 {
        self.0
    }
}

impl From<i64> for Amount {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Error returned when an amount has a bad format or more than two decimals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AmountParseError(String);

impl fmt::Display for AmountParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid amount: {}", self.0)
    }
}

impl std::error::Error for AmountParseError {}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AmountParseError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (units, fraction) = match digits.split_once(['.', ',']) {
            Some((units, fraction)) => (units, fraction),
            None => (digits, ""),
        };
        if units.is_empty()
            || fraction.len() > 2
            || !units.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let units: i64 = units.parse().map_err(|_| invalid())?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };
        let cents = units
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .ok_or_else(invalid)?;
        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // i64 cents to f64 is exact up to 2^53.
        serializer.serialize_f64(self.0 as f64 / 100.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl de::Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number or string with at most two decimals")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                v.checked_mul(100)
                    .map(Amount)
                    .ok_or_else(|| E::custom("amount out of range"))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                i64::try_from(v)
                    .map_err(|_| E::custom("amount out of range"))
                    .and_then(|v| self.visit_i64(v))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
                if !v.is_finite() {
                    return Err(E::custom("amount must be finite"));
                }
                // `Display` for f64 prints the shortest decimal that round-trips.
                v.to_string().parse().map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub mod user {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserRegister {
        pub username: String,
        pub display_name: String,
        pub password: String,
        /// `#rgb` or `#rrggbb`. A default color is assigned when absent.
        pub avatar_color: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct UserUpdate {
        pub display_name: Option<String>,
        pub avatar_color: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct UserView {
        pub id: i64,
        pub username: String,
        pub display_name: String,
        pub avatar_color: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PasswordChange {
        pub current_password: String,
        /// At least 6 characters.
        pub new_password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountDelete {
        pub password: String,
    }
}

pub mod group {
    use super::*;
    use crate::user::UserView;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupNew {
        pub name: String,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct GroupView {
        pub id: i64,
        pub name: String,
        pub owner_id: i64,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    /// Request body for adding a member, by username.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberAdd {
        pub username: String,
    }

    /// A member with their role (`owner` or `member`).
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberView {
        pub member: UserView,
        pub role: String,
        pub added_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupDetail {
        pub group: GroupView,
        pub members: Vec<MemberView>,
    }
}

pub mod expense {
    use super::*;
    use crate::user::UserView;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupExpenseNew {
        pub group_id: i64,
        pub description: String,
        pub amount: Amount,
        /// Defaults to the caller.
        pub payer_id: Option<i64>,
        pub participants: Vec<i64>,
        /// Defaults to now.
        pub occurred_at: Option<DateTime<Utc>>,
        pub currency: Option<Currency>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PersonalExpenseNew {
        pub description: String,
        pub amount: Amount,
        /// Defaults to the caller alone.
        #[serde(default)]
        pub participants: Vec<i64>,
        pub occurred_at: Option<DateTime<Utc>>,
        pub currency: Option<Currency>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseUpdate {
        pub description: String,
        pub amount: Amount,
        pub payer_id: i64,
        pub participants: Vec<i64>,
        /// Keeps the current date when absent.
        pub occurred_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct RecentQuery {
        pub limit: Option<u64>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: i64,
        /// `None` for personal expenses.
        pub group_id: Option<i64>,
        pub payer_id: i64,
        pub description: String,
        pub amount: Amount,
        pub currency: Currency,
        pub occurred_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ShareView {
        pub member: UserView,
        pub amount: Amount,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseDetail {
        pub expense: ExpenseView,
        pub shares: Vec<ShareView>,
    }
}

pub mod balance {
    use super::*;
    use crate::{group::GroupView, user::UserView};

    /// Balance of one member within a scope. `net = to_receive - owed`:
    /// positive means the member is owed money.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct NetPositionView {
        pub member_id: i64,
        pub paid: Amount,
        pub owed: Amount,
        pub to_receive: Amount,
        pub net: Amount,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberBalanceView {
        pub member: UserView,
        pub position: NetPositionView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupBalanceView {
        pub group: GroupView,
        pub position: NetPositionView,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TransferView {
        pub from: i64,
        pub to: i64,
        pub amount: Amount,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupSettlementView {
        pub group_id: i64,
        pub balances: Vec<MemberBalanceView>,
        pub transfers: Vec<TransferView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CounterpartyView {
        pub member: UserView,
        /// Positive: the counterparty owes the caller.
        pub net: Amount,
    }
}

pub mod dashboard {
    use super::*;
    use crate::{balance::NetPositionView, expense::ExpenseView, group::GroupView, user::UserView};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupOverviewView {
        pub group: GroupView,
        pub members_count: usize,
        pub last_expense: Option<ExpenseView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RecentGroupExpenseView {
        pub expense: ExpenseView,
        pub payer: UserView,
    }

    /// Summary of the caller's current groups. Personal expenses are not
    /// counted.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct DashboardView {
        pub total_paid: Amount,
        pub active_groups: usize,
        pub position: NetPositionView,
        pub groups: Vec<GroupOverviewView>,
        pub recent: Vec<RecentGroupExpenseView>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_serialize_as_two_decimal_numbers() {
        assert_eq!(serde_json::to_string(&Amount(1750)).unwrap(), "17.5");
        assert_eq!(serde_json::to_string(&Amount(-250)).unwrap(), "-2.5");
        assert_eq!(serde_json::to_string(&Amount(333)).unwrap(), "3.33");
        assert_eq!(serde_json::to_string(&Amount(2000)).unwrap(), "20.0");
    }

    #[test]
    fn amounts_accept_numbers_and_strings() {
        let parse = |json: &str| serde_json::from_str::<Amount>(json);
        assert_eq!(parse("10").unwrap(), Amount(1000));
        assert_eq!(parse("10.05").unwrap(), Amount(1005));
        assert_eq!(parse("0.1").unwrap(), Amount(10));
        assert_eq!(parse("\"17,50\"").unwrap(), Amount(1750));
        assert_eq!(parse("\"-3.3\"").unwrap(), Amount(-330));
    }

    #[test]
    fn amounts_reject_more_than_two_decimals() {
        assert!(serde_json::from_str::<Amount>("10.005").is_err());
        assert!(serde_json::from_str::<Amount>("\"1.234\"").is_err());
        assert!(serde_json::from_str::<Amount>("\"abc\"").is_err());
        assert!(serde_json::from_str::<Amount>("\".5\"").is_err());
        assert!(serde_json::from_str::<Amount>("true").is_err());
    }

    #[test]
    fn amount_display() {
        assert_eq!(Amount(1005).to_string(), "10.05");
        assert_eq!(Amount(-7).to_string(), "-0.07");
    }
}
