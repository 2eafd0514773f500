//! Finance entities as returned by the API.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::auth::Currency;
use crate::id::EntityId;

/// Spending category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category identifier.
    pub id: EntityId,
    /// Display title.
    pub title: String,
    /// Display color.
    pub color: String,
    /// Optional monthly limit.
    #[serde(default, alias = "costsLimit")]
    pub costs_limit: Option<i64>,
    /// Sum of the category's costs this month.
    #[serde(default, alias = "costsSum", deserialize_with = "decimal_or_zero")]
    pub costs_sum: Decimal,
}

impl Category {
    /// Returns true if the category has a limit and the month's costs reached it.
    #[must_use]
    pub fn is_over_limit(&self) -> bool {
        self.costs_limit
            .is_some_and(|limit| self.costs_sum >= Decimal::from(limit))
    }
}

/// Payment card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Card identifier.
    pub id: EntityId,
    /// Display title.
    pub title: String,
    /// Card currency.
    #[serde(default)]
    pub currency: Currency,
    /// Display color.
    pub color: String,
    /// Current balance.
    #[serde(default, deserialize_with = "decimal_or_zero")]
    pub amount: Decimal,
}

/// A single expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cost {
    /// Cost identifier.
    pub id: EntityId,
    /// Amount in the user's main currency.
    #[serde(alias = "userCurrencyAmount")]
    pub user_currency_amount: Decimal,
    /// Amount in the card currency, when it differs.
    #[serde(default, alias = "cardCurrencyAmount")]
    pub card_currency_amount: Option<Decimal>,
    /// Operation date.
    pub date: NaiveDate,
    /// Card charged.
    pub card: Card,
    /// Category of the expense.
    pub category: Category,
}

/// A single income.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Income {
    /// Income identifier.
    pub id: EntityId,
    /// Amount in the user's main currency.
    #[serde(alias = "userCurrencyAmount")]
    pub user_currency_amount: Decimal,
    /// Amount in the card currency, when it differs.
    #[serde(default, alias = "cardCurrencyAmount")]
    pub card_currency_amount: Option<Decimal>,
    /// Operation date.
    pub date: NaiveDate,
    /// Card credited.
    pub card: Card,
}

/// Anything that has a date and an amount in the user's currency.
pub trait CardOperation {
    /// Operation date.
    fn date(&self) -> NaiveDate;
    /// Amount in the user's main currency.
    fn amount(&self) -> Decimal;
}

impl CardOperation for Cost {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn amount(&self) -> Decimal {
        self.user_currency_amount
    }
}

impl CardOperation for Income {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn amount(&self) -> Decimal {
        self.user_currency_amount
    }
}

/// Response of `GET /api/costs/total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalCosts {
    /// Sum of this month's costs.
    #[serde(alias = "totalCosts")]
    pub total_costs: Decimal,
}

/// Response of `GET /api/incomes/total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalIncomes {
    /// Sum of this month's incomes.
    #[serde(alias = "totalIncomes")]
    pub total_incomes: Decimal,
}

// `null` sums are sent for categories without costs.
fn decimal_or_zero<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Decimal>::deserialize(deserializer)?.unwrap_or_default())
}
