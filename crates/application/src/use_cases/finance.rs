//! Finance data loaders and editors.
//!
//! Every call goes through [`SessionManager::authorized`], so an expired or
//! rejected access token is refreshed transparently. New entities are
//! validated before any request is sent.

use std::sync::Arc;

use costsmap_domain::{
    Card, Category, Cost, DatedOperations, EntityId, Income, MonthOverview, NewCard, NewCategory,
    NewCost, NewIncome,
};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::auth::SessionManager;
use crate::error::{AuthError, AuthResult};
use crate::ports::FinanceApi;

/// Loads and edits categories, cards and operations for the signed-in user.
#[derive(Clone)]
pub struct FinanceService {
    session: SessionManager,
    api: Arc<dyn FinanceApi>,
}

impl FinanceService {
    /// Creates a new `FinanceService`.
    #[must_use]
    pub fn new(session: SessionManager, api: Arc<dyn FinanceApi>) -> Self {
        Self { session, api }
    }

    /// Returns the session this service authorizes with.
    #[must_use]
    pub const fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Lists the user's categories.
    ///
    /// # Errors
    /// Returns the classified failure; `SessionExpired` means the user must
    /// log in again.
    pub async fn categories(&self) -> AuthResult<Vec<Category>> {
        let api = Arc::clone(&self.api);
        self.session
            .authorized(move |token| {
                let api = Arc::clone(&api);
                async move { api.categories(&token).await }
            })
            .await
    }

    /// Lists the user's cards.
    ///
    /// # Errors
    /// See [`Self::categories`].
    pub async fn cards(&self) -> AuthResult<Vec<Card>> {
        let api = Arc::clone(&self.api);
        self.session
            .authorized(move |token| {
                let api = Arc::clone(&api);
                async move { api.cards(&token).await }
            })
            .await
    }

    /// Lists the user's costs.
    ///
    /// # Errors
    /// See [`Self::categories`].
    pub async fn costs(&self) -> AuthResult<Vec<Cost>> {
        let api = Arc::clone(&self.api);
        self.session
            .authorized(move |token| {
                let api = Arc::clone(&api);
                async move { api.costs(&token).await }
            })
            .await
    }

    /// Lists the user's incomes.
    ///
    /// # Errors
    /// See [`Self::categories`].
    pub async fn incomes(&self) -> AuthResult<Vec<Income>> {
        let api = Arc::clone(&self.api);
        self.session
            .authorized(move |token| {
                let api = Arc::clone(&api);
                async move { api.incomes(&token).await }
            })
            .await
    }

    /// Categories whose costs this month reached their limit.
    ///
    /// # Errors
    /// See [`Self::categories`].
    pub async fn categories_over_limit(&self) -> AuthResult<Vec<Category>> {
        let mut categories = self.categories().await?;
        categories.retain(Category::is_over_limit);
        Ok(categories)
    }

    /// Costs grouped by date, newest first.
    ///
    /// # Errors
    /// See [`Self::categories`].
    pub async fn dated_costs(&self) -> AuthResult<DatedOperations<Cost>> {
        let costs = self.costs().await?;
        debug!(count = costs.len(), "Grouping costs by date");
        Ok(DatedOperations::group(costs))
    }

    /// Incomes grouped by date, newest first.
    ///
    /// # Errors
    /// See [`Self::categories`].
    pub async fn dated_incomes(&self) -> AuthResult<DatedOperations<Income>> {
        let incomes = self.incomes().await?;
        debug!(count = incomes.len(), "Grouping incomes by date");
        Ok(DatedOperations::group(incomes))
    }

    /// Creates a category.
    ///
    /// # Errors
    /// `Validation` without a request when the title, color or limit is
    /// invalid; otherwise see [`Self::categories`].
    pub async fn create_category(&self, category: &NewCategory) -> AuthResult<Category> {
        category.validate()?;
        let api = Arc::clone(&self.api);
        let category = category.clone();
        let created = self
            .session
            .authorized(move |token| {
                let api = Arc::clone(&api);
                let category = category.clone();
                async move { api.create_category(&token, &category).await }
            })
            .await?;
        info!(id = %created.id, title = %created.title, "Category created");
        Ok(created)
    }

    /// Creates a card.
    ///
    /// # Errors
    /// `Validation` without a request when the title or color is invalid;
    /// otherwise see [`Self::categories`].
    pub async fn create_card(&self, card: &NewCard) -> AuthResult<Card> {
        card.validate()?;
        let api = Arc::clone(&self.api);
        let card = card.clone();
        let created = self
            .session
            .authorized(move |token| {
                let api = Arc::clone(&api);
                let card = card.clone();
                async move { api.create_card(&token, &card).await }
            })
            .await?;
        info!(id = %created.id, title = %created.title, "Card created");
        Ok(created)
    }

    /// Records a cost.
    ///
    /// # Errors
    /// `Validation` without a request when the amount is out of range;
    /// otherwise see [`Self::categories`].
    pub async fn create_cost(&self, cost: &NewCost) -> AuthResult<Cost> {
        cost.validate()?;
        let api = Arc::clone(&self.api);
        let cost = cost.clone();
        let created = self
            .session
            .authorized(move |token| {
                let api = Arc::clone(&api);
                let cost = cost.clone();
                async move { api.create_cost(&token, &cost).await }
            })
            .await?;
        info!(id = %created.id, amount = %created.user_currency_amount, "Cost recorded");
        if created.category.is_over_limit() {
            warn!(
                category = %created.category.title,
                sum = %created.category.costs_sum,
                "Category limit reached"
            );
        }
        Ok(created)
    }

    /// Records an income.
    ///
    /// # Errors
    /// `Validation` without a request when an amount is out of range;
    /// otherwise see [`Self::categories`].
    pub async fn create_income(&self, income: &NewIncome) -> AuthResult<Income> {
        income.validate()?;
        let api = Arc::clone(&self.api);
        let income = income.clone();
        let created = self
            .session
            .authorized(move |token| {
                let api = Arc::clone(&api);
                let income = income.clone();
                async move { api.create_income(&token, &income).await }
            })
            .await?;
        info!(id = %created.id, amount = %created.user_currency_amount, "Income recorded");
        Ok(created)
    }

    /// Deletes a cost.
    ///
    /// # Errors
    /// See [`Self::categories`].
    pub async fn delete_cost(&self, id: &EntityId) -> AuthResult<()> {
        let api = Arc::clone(&self.api);
        let target = id.clone();
        self.session
            .authorized(move |token| {
                let api = Arc::clone(&api);
                let id = target.clone();
                async move { api.delete_cost(&token, &id).await }
            })
            .await?;
        info!(%id, "Cost deleted");
        Ok(())
    }

    /// Deletes an income.
    ///
    /// # Errors
    /// See [`Self::categories`].
    pub async fn delete_income(&self, id: &EntityId) -> AuthResult<()> {
        let api = Arc::clone(&self.api);
        let target = id.clone();
        self.session
            .authorized(move |token| {
                let api = Arc::clone(&api);
                let id = target.clone();
                async move { api.delete_income(&token, &id).await }
            })
            .await?;
        info!(%id, "Income deleted");
        Ok(())
    }

    /// Current month totals.
    ///
    /// A failed total is reported as zero so the overview still renders.
    ///
    /// # Errors
    /// Only `SessionExpired` is returned; every other failure degrades to zero.
    pub async fn month_overview(&self) -> AuthResult<MonthOverview> {
        let costs_api = Arc::clone(&self.api);
        let incomes_api = Arc::clone(&self.api);
        let (costs, incomes) = tokio::join!(
            self.session.authorized(move |token| {
                let api = Arc::clone(&costs_api);
                async move { api.total_costs(&token).await }
            }),
            self.session.authorized(move |token| {
                let api = Arc::clone(&incomes_api);
                async move { api.total_incomes(&token).await }
            }),
        );

        let costs_total = or_zero(costs.map(|total| total.total_costs), "costs")?;
        let incomes_total = or_zero(incomes.map(|total| total.total_incomes), "incomes")?;
        Ok(MonthOverview::new(costs_total, incomes_total))
    }
}

impl std::fmt::Debug for FinanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinanceService")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

fn or_zero(total: AuthResult<Decimal>, what: &str) -> AuthResult<Decimal> {
    match total {
        Ok(total) => Ok(total),
        Err(AuthError::SessionExpired) => Err(AuthError::SessionExpired),
        Err(e) => {
            warn!(error = %e, total = what, "Total unavailable, showing zero");
            Ok(Decimal::ZERO)
        }
    }
}
