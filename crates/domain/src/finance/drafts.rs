//! Request bodies for creating finance entities.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::auth::Currency;
use crate::error::DomainResult;
use crate::id::EntityId;
use crate::validation::{
    parse_amount, validate_amount, validate_card_color, validate_costs_limit, validate_title,
};

/// Body of `POST /api/categories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCategory {
    /// Display title.
    pub title: String,
    /// Display color, `#rrggbb`.
    pub color: String,
    /// Optional monthly limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub costs_limit: Option<i64>,
}

impl NewCategory {
    /// Creates a category without a limit.
    #[must_use]
    pub fn new(title: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            color: color.into(),
            costs_limit: None,
        }
    }

    /// Sets the monthly limit.
    #[must_use]
    pub const fn with_costs_limit(mut self, limit: i64) -> Self {
        self.costs_limit = Some(limit);
        self
    }

    /// Checks title, color and limit.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> DomainResult<()> {
        validate_title(&self.title)?;
        validate_card_color(&self.color)?;
        if let Some(limit) = self.costs_limit {
            validate_costs_limit(limit)?;
        }
        Ok(())
    }
}

/// Body of `POST /api/cards`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCard {
    /// Display title.
    pub title: String,
    /// Card currency; the server defaults to the user's currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    /// Display color, `#rrggbb`.
    pub color: String,
}

impl NewCard {
    /// Creates a card in the user's currency.
    #[must_use]
    pub fn new(title: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            currency: None,
            color: color.into(),
        }
    }

    /// Sets the card currency.
    #[must_use]
    pub const fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    /// Checks title and color.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> DomainResult<()> {
        validate_title(&self.title)?;
        validate_card_color(&self.color)
    }
}

/// Body of `POST /api/costs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCost {
    /// Amount charged to the card.
    pub amount: Decimal,
    /// Category of the expense.
    pub category_id: EntityId,
    /// Card charged.
    pub card_id: EntityId,
    /// Operation date.
    pub date: NaiveDate,
}

impl NewCost {
    /// Builds a cost from the amount as typed in a form.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not a number or is out of range.
    pub fn parse(
        amount: &str,
        category_id: EntityId,
        card_id: EntityId,
        date: NaiveDate,
    ) -> DomainResult<Self> {
        Ok(Self {
            amount: parse_amount(amount)?,
            category_id,
            card_id,
            date,
        })
    }

    /// Checks the amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is out of range.
    pub fn validate(&self) -> DomainResult<()> {
        validate_amount(self.amount)
    }
}

/// Body of `POST /api/incomes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewIncome {
    /// Amount in the user's main currency.
    pub user_currency_amount: Decimal,
    /// Amount in the card currency, when it differs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_currency_amount: Option<Decimal>,
    /// Card credited.
    pub card_id: EntityId,
    /// Operation date.
    pub date: NaiveDate,
}

impl NewIncome {
    /// Builds an income from the amount as typed in a form.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not a number or is out of range.
    pub fn parse(amount: &str, card_id: EntityId, date: NaiveDate) -> DomainResult<Self> {
        Ok(Self {
            user_currency_amount: parse_amount(amount)?,
            card_currency_amount: None,
            card_id,
            date,
        })
    }

    /// Sets the amount in the card currency.
    #[must_use]
    pub const fn with_card_currency_amount(mut self, amount: Decimal) -> Self {
        self.card_currency_amount = Some(amount);
        self
    }

    /// Checks both amounts.
    ///
    /// # Errors
    ///
    /// Returns an error if an amount is out of range.
    pub fn validate(&self) -> DomainResult<()> {
        validate_amount(self.user_currency_amount)?;
        if let Some(amount) = self.card_currency_amount {
            validate_amount(amount)?;
        }
        Ok(())
    }
}
