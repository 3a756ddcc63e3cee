//! The per-identity credit record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which pool a consumed credit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditSource {
    /// Today's free quota.
    DailyFree,
    /// The non-expiring purchased balance.
    Purchased,
}

/// Credit state for one identity.
///
/// Serialized as `{"date": "Fri Oct 16 2026", "dailyUsed": 0, "purchasedCredits": 0}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAccount {
    /// Day on which `daily_used` was last zeroed.
    #[serde(rename = "date", with = "day_string")]
    pub last_reset_date: NaiveDate,
    /// Free generations consumed since `last_reset_date`.
    #[serde(rename = "dailyUsed")]
    pub daily_used: u32,
    /// Paid credits; they never expire.
    #[serde(rename = "purchasedCredits")]
    pub purchased_balance: u32,
}

impl CreditAccount {
    /// A zeroed account for `today`.
    pub fn fresh(today: NaiveDate) -> Self {
        Self {
            last_reset_date: today,
            daily_used: 0,
            purchased_balance: 0,
        }
    }

    /// Returns true if the free counter belongs to a day other than `today`.
    pub fn is_stale(&self, today: NaiveDate) -> bool {
        self.last_reset_date != today
    }

    /// Returns the account as it stands on `today`: a stale account has its
    /// free counter zeroed and keeps its purchased balance.
    pub fn rolled_over(self, today: NaiveDate) -> Self {
        if self.is_stale(today) {
            Self {
                last_reset_date: today,
                daily_used: 0,
                purchased_balance: self.purchased_balance,
            }
        } else {
            self
        }
    }

    /// Returns true if one more generation is allowed.
    pub fn can_generate(&self, daily_limit: u32) -> bool {
        self.daily_used < daily_limit || self.purchased_balance > 0
    }

    /// Free generations left today.
    pub fn remaining_free(&self, daily_limit: u32) -> u32 {
        daily_limit.saturating_sub(self.daily_used)
    }

    /// Draws one credit, free quota first. Returns `None` and leaves the
    /// account untouched when nothing is left.
    pub fn consume(&mut self, daily_limit: u32) -> Option<CreditSource> {
        if self.daily_used < daily_limit {
            self.daily_used += 1;
            Some(CreditSource::DailyFree)
        } else if self.purchased_balance > 0 {
            self.purchased_balance -= 1;
            Some(CreditSource::Purchased)
        } else {
            None
        }
    }

    /// Adds purchased credits.
    pub fn add_purchased(&mut self, amount: u32) {
        self.purchased_balance = self.purchased_balance.saturating_add(amount);
    }
}

/// Day format produced by JavaScript's `Date.prototype.toDateString`.
const DAY_FORMAT: &str = "%a %b %d %Y";

mod day_string {
    use super::DAY_FORMAT;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(day: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&day.format(DAY_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(raw.trim(), DAY_FORMAT)
            .or_else(|_| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d"))
            .map_err(|e| serde::de::Error::custom(format!("invalid date {raw:?}: {e}")))
    }
}
