//! Finance domain types: categories, cards, costs and incomes.

mod aggregation;
mod drafts;
mod entities;

pub use aggregation::{DatedOperations, DayOperations, MonthOverview};
pub use drafts::{NewCard, NewCategory, NewCost, NewIncome};
pub use entities::{Card, CardOperation, Category, Cost, Income, TotalCosts, TotalIncomes};
