//! A shared household budget: money put in, money spent, and an optional
//! daily spending limit.
//!
//! Amounts are whole units of one currency. The budget is a single pool:
//! totals and the daily limit cover everyone's contributions and expenses.
//! A user's timezone only decides where their "today" begins and ends.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  Error, Result,
  clock::Clock,
  event::UserId,
  store::CalendarStore,
  timezone,
  user::effective_timezone,
};

pub type Amount = i64;

/// Upper bound on any single amount, and on the daily limit.
pub const MAX_AMOUNT: Amount = 1_000_000_000;
pub const MAX_CATEGORY_CHARS: usize = 64;
pub const MAX_COMMENT_CHARS: usize = 512;

/// Page size of [`BudgetService::list_expenses`] when none is given.
pub const DEFAULT_EXPENSE_PAGE: usize = 20;
pub const MAX_EXPENSE_PAGE: usize = 100;

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
  pub contribution_id: i64,
  pub user_id:         UserId,
  pub amount:          Amount,
  pub comment:         Option<String>,
  pub created_at:      DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewContribution {
  pub user_id: UserId,
  pub amount:  Amount,
  #[serde(default)]
  pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
  pub expense_id: i64,
  pub user_id:    UserId,
  pub amount:     Amount,
  /// Lowercased, trimmed.
  pub category:   String,
  pub spent_at:   DateTime<Utc>,
  pub comment:    Option<String>,
  pub created_at: DateTime<Utc>,
}

/// An expense as reported by a user. `spent_at` defaults to now.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordExpense {
  pub user_id:  UserId,
  pub amount:   Amount,
  pub category: String,
  #[serde(default)]
  pub spent_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub comment:  Option<String>,
}

/// Validated input to [`CalendarStore::add_expense`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpense {
  pub user_id:  UserId,
  pub amount:   Amount,
  pub category: String,
  pub spent_at: DateTime<Utc>,
  pub comment:  Option<String>,
}

/// The budget-wide daily limit. `daily_limit: None` means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLimit {
  pub daily_limit: Option<Amount>,
  pub updated_by:  Option<UserId>,
  pub updated_at:  Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SetDailyLimit {
  pub actor_id:    UserId,
  /// `null` removes the limit.
  pub daily_limit: Option<Amount>,
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

/// One user's part of the contributions or of the spending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
  pub user_id: UserId,
  pub name:    String,
  pub amount:  Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
  pub category: String,
  pub amount:   Amount,
}

/// Grouped sums as returned by [`CalendarStore::budget_totals`], each list
/// ordered by amount descending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BudgetTotals {
  pub contributors: Vec<Share>,
  pub spenders:     Vec<Share>,
  pub categories:   Vec<CategoryTotal>,
}

/// Spending on one local calendar day against the daily limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyStatus {
  pub date:        NaiveDate,
  pub timezone:    String,
  pub daily_limit: Option<Amount>,
  pub spent:       Amount,
  /// `None` without a limit; never negative.
  pub remaining:   Option<Amount>,
  pub exceeded:    bool,
  /// How far spending went over the limit; zero when it did not.
  pub exceeded_by: Amount,
}

impl DailyStatus {
  pub fn compute(
    date: NaiveDate,
    timezone: impl Into<String>,
    daily_limit: Option<Amount>,
    spent: Amount,
  ) -> Self {
    let over = daily_limit.map_or(0, |limit| (spent - limit).max(0));
    Self {
      date,
      timezone: timezone.into(),
      daily_limit,
      spent,
      remaining: daily_limit.map(|limit| (limit - spent).max(0)),
      exceeded: over > 0,
      exceeded_by: over,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetSummary {
  pub total_income:  Amount,
  pub total_expense: Amount,
  pub balance:       Amount,
  pub contributors:  Vec<Share>,
  pub spenders:      Vec<Share>,
  pub categories:    Vec<CategoryTotal>,
  pub daily:         DailyStatus,
}

/// A stored expense plus where the day stands afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpenseRecorded {
  pub expense:      Expense,
  pub spender_name: String,
  pub daily:        DailyStatus,
}

// ─── Validation ──────────────────────────────────────────────────────────────

pub fn validate_amount(amount: Amount) -> Result<Amount> {
  if (1..=MAX_AMOUNT).contains(&amount) {
    Ok(amount)
  } else {
    Err(Error::InvalidAmount(MAX_AMOUNT))
  }
}

/// Trimmed and lowercased, so "Food" and "food " add up together.
pub fn normalize_category(raw: &str) -> Result<String> {
  let category = raw.trim().to_lowercase();
  let chars = category.chars().count();
  if chars == 0 || chars > MAX_CATEGORY_CHARS {
    return Err(Error::InvalidCategory(MAX_CATEGORY_CHARS));
  }
  Ok(category)
}

/// Blank comments are dropped.
pub fn normalize_comment(raw: Option<String>) -> Result<Option<String>> {
  let Some(comment) = raw.map(|c| c.trim().to_owned()).filter(|c| !c.is_empty()) else {
    return Ok(None);
  };
  if comment.chars().count() > MAX_COMMENT_CHARS {
    return Err(Error::CommentTooLong(MAX_COMMENT_CHARS));
  }
  Ok(Some(comment))
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct BudgetService<S> {
  store:            Arc<S>,
  clock:            Arc<dyn Clock>,
  default_timezone: String,
}

impl<S: CalendarStore> BudgetService<S> {
  /// `default_timezone` must be a valid IANA name.
  pub fn new(
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    default_timezone: impl Into<String>,
  ) -> Result<Self> {
    let default_timezone = default_timezone.into();
    timezone::parse_timezone(&default_timezone)?;
    Ok(Self { store, clock, default_timezone })
  }

  pub async fn add_contribution(&self, input: NewContribution) -> Result<Contribution> {
    let input = NewContribution {
      user_id: input.user_id,
      amount:  validate_amount(input.amount)?,
      comment: normalize_comment(input.comment)?,
    };
    let contribution = self
      .store
      .add_contribution(input)
      .await
      .map_err(Error::store)?;
    info!(
      contribution_id = contribution.contribution_id,
      user_id = contribution.user_id,
      amount = contribution.amount,
      "contribution recorded"
    );
    Ok(contribution)
  }

  pub async fn record_expense(&self, input: RecordExpense) -> Result<ExpenseRecorded> {
    let input = NewExpense {
      user_id:  input.user_id,
      amount:   validate_amount(input.amount)?,
      category: normalize_category(&input.category)?,
      spent_at: input.spent_at.unwrap_or_else(|| self.clock.now()),
      comment:  normalize_comment(input.comment)?,
    };
    let expense = self.store.add_expense(input).await.map_err(Error::store)?;
    info!(
      expense_id = expense.expense_id,
      user_id = expense.user_id,
      amount = expense.amount,
      category = %expense.category,
      "expense recorded"
    );

    let spender_name = self
      .store
      .get_user(expense.user_id)
      .await
      .map_err(Error::store)?
      .map_or_else(|| expense.user_id.to_string(), |u| u.name);
    let daily = self.daily_status(expense.user_id).await?;
    Ok(ExpenseRecorded { expense, spender_name, daily })
  }

  /// Newest first. `limit` is clamped to `1..=MAX_EXPENSE_PAGE`.
  pub async fn list_expenses(
    &self,
    user: Option<UserId>,
    limit: Option<usize>,
  ) -> Result<Vec<Expense>> {
    let limit = limit
      .unwrap_or(DEFAULT_EXPENSE_PAGE)
      .clamp(1, MAX_EXPENSE_PAGE);
    self.store.list_expenses(user, limit).await.map_err(Error::store)
  }

  /// Totals of the whole budget; `viewer` picks the day for `daily`.
  pub async fn summary(&self, viewer: UserId) -> Result<BudgetSummary> {
    let totals = self.store.budget_totals().await.map_err(Error::store)?;
    let total_income: Amount = totals.contributors.iter().map(|s| s.amount).sum();
    let total_expense: Amount = totals.spenders.iter().map(|s| s.amount).sum();

    Ok(BudgetSummary {
      total_income,
      total_expense,
      balance: total_income - total_expense,
      contributors: totals.contributors,
      spenders: totals.spenders,
      categories: totals.categories,
      daily: self.daily_status(viewer).await?,
    })
  }

  pub async fn daily_limit(&self) -> Result<DailyLimit> {
    self.store.get_daily_limit().await.map_err(Error::store)
  }

  pub async fn set_daily_limit(&self, input: SetDailyLimit) -> Result<DailyLimit> {
    let limit = input.daily_limit.map(validate_amount).transpose()?;
    let stored = self
      .store
      .set_daily_limit(limit, input.actor_id)
      .await
      .map_err(Error::store)?;
    info!(actor_id = input.actor_id, daily_limit = ?limit, "daily limit set");
    Ok(stored)
  }

  /// Today's spending, with "today" taken in `viewer`'s timezone.
  pub async fn daily_status(&self, viewer: UserId) -> Result<DailyStatus> {
    let zone = effective_timezone(self.store.as_ref(), viewer, &self.default_timezone)
      .await?
      .timezone;
    let tz = timezone::parse_timezone(&zone)?;
    let date = timezone::local_date(self.clock.now(), tz);
    let (start, end) = timezone::day_bounds(date, tz)?;

    let spent = self
      .store
      .spent_between(start, end)
      .await
      .map_err(Error::store)?;
    let limit = self
      .store
      .get_daily_limit()
      .await
      .map_err(Error::store)?
      .daily_limit;
    Ok(DailyStatus::compute(date, zone, limit, spent))
  }
}
