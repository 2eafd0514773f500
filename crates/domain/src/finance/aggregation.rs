//! Client-side grouping of card operations.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::entities::CardOperation;

/// Operations sharing one date, with their total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayOperations<T> {
    /// Operations in their original order.
    pub operations: Vec<T>,
    /// Sum of the operations' user-currency amounts.
    pub total: Decimal,
}

/// Operations grouped by date, newest date first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedOperations<T> {
    days: BTreeMap<Reverse<NaiveDate>, DayOperations<T>>,
}

impl<T: CardOperation> DatedOperations<T> {
    /// Groups operations by their date.
    #[must_use]
    pub fn group(operations: impl IntoIterator<Item = T>) -> Self {
        let mut days: BTreeMap<Reverse<NaiveDate>, DayOperations<T>> = BTreeMap::new();
        for operation in operations {
            let day = days
                .entry(Reverse(operation.date()))
                .or_insert_with(|| DayOperations {
                    operations: Vec::new(),
                    total: Decimal::ZERO,
                });
            day.total += operation.amount();
            day.operations.push(operation);
        }
        Self { days }
    }

    /// Returns the operations of a given date.
    #[must_use]
    pub fn day(&self, date: NaiveDate) -> Option<&DayOperations<T>> {
        self.days.get(&Reverse(date))
    }

    /// Iterates over dates, newest first.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &DayOperations<T>)> {
        self.days.iter().map(|(Reverse(date), day)| (*date, day))
    }

    /// Sum over all dates.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.days.values().map(|day| day.total).sum()
    }

    /// Number of distinct dates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// Returns true if there are no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Current month's totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct MonthOverview {
    /// Sum of this month's costs.
    pub costs_total: Decimal,
    /// Sum of this month's incomes.
    pub incomes_total: Decimal,
}

impl MonthOverview {
    /// Creates an overview from the two totals.
    #[must_use]
    pub const fn new(costs_total: Decimal, incomes_total: Decimal) -> Self {
        Self {
            costs_total,
            incomes_total,
        }
    }

    /// Incomes minus costs.
    #[must_use]
    pub fn balance(&self) -> Decimal {
        self.incomes_total - self.costs_total
    }

    /// Rounds both totals to two decimal places for display.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            costs_total: self.costs_total.round_dp(2),
            incomes_total: self.incomes_total.round_dp(2),
        }
    }
}
