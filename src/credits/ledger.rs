//! The credit ledger: daily free quota plus purchased balance per identity.

use crate::credits::account::{CreditAccount, CreditSource};
use crate::credits::clock::{Clock, SystemClock};
use crate::credits::identity::Identity;
use crate::credits::store::{KeyValueStore, MemoryStore};
use crate::error::MonospaceError;
use chrono::NaiveDate;
use std::sync::Arc;

/// Free generations per identity per calendar day.
pub const DEFAULT_DAILY_LIMIT: u32 = 5;

/// Meters generations per identity.
///
/// None of the operations fail. Unreadable or malformed records are replaced
/// by a fresh account, and failed writes are logged and dropped.
pub struct CreditLedger {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    daily_limit: u32,
}

impl CreditLedger {
    /// Creates a ledger over `store` using the system clock and the default
    /// daily limit.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            daily_limit: DEFAULT_DAILY_LIMIT,
        }
    }

    /// Creates a ledger backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Replaces the source of "today".
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the number of free generations per day.
    pub fn with_daily_limit(mut self, daily_limit: u32) -> Self {
        self.daily_limit = daily_limit;
        self
    }

    /// Free generations per day.
    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// The day usage is currently counted against.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Returns the identity's account as of today, creating or rolling it
    /// over (and persisting the result) when needed.
    pub fn account(&self, identity: &Identity) -> CreditAccount {
        let key = identity.storage_key();
        let today = self.clock.today();

        match self.load(&key) {
            None => {
                let account = CreditAccount::fresh(today);
                tracing::debug!(%identity, "creating credit account");
                self.save(&key, &account);
                account
            }
            Some(stored) if stored.is_stale(today) => {
                let account = stored.rolled_over(today);
                tracing::debug!(
                    %identity,
                    last_reset = %stored.last_reset_date,
                    "resetting daily credit usage"
                );
                self.save(&key, &account);
                account
            }
            Some(mut stored) => {
                stored.daily_used = stored.daily_used.min(self.daily_limit);
                stored
            }
        }
    }

    /// Returns true if the identity may run one more generation.
    pub fn can_generate(&self, identity: &Identity) -> bool {
        self.account(identity).can_generate(self.daily_limit)
    }

    /// Draws one credit, free quota first, and persists the result.
    ///
    /// Callers are expected to check [`can_generate`](Self::can_generate)
    /// first. With nothing left this is a no-op that returns `None`.
    pub fn consume_credit(&self, identity: &Identity) -> Option<CreditSource> {
        let mut account = self.account(identity);
        let source = account.consume(self.daily_limit);
        match source {
            Some(source) => tracing::debug!(%identity, ?source, "consumed credit"),
            None => tracing::debug!(%identity, "no credit left to consume"),
        }
        self.save(&identity.storage_key(), &account);
        source
    }

    /// Adds `amount` purchased credits.
    ///
    /// The caller is trusted to have confirmed the payment.
    pub fn add_credits(&self, amount: u32, identity: &Identity) {
        let mut account = self.account(identity);
        account.add_purchased(amount);
        tracing::debug!(
            %identity,
            amount,
            balance = account.purchased_balance,
            "added purchased credits"
        );
        self.save(&identity.storage_key(), &account);
    }

    /// Free generations left today.
    pub fn remaining_free(&self, identity: &Identity) -> u32 {
        self.account(identity).remaining_free(self.daily_limit)
    }

    /// Purchased credits left.
    pub fn purchased_balance(&self, identity: &Identity) -> u32 {
        self.account(identity).purchased_balance
    }

    fn load(&self, key: &str) -> Option<CreditAccount> {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key, "failed to read credit record, using a fresh one: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(account) => Some(account),
            Err(e) => {
                tracing::warn!(key, "malformed credit record, using a fresh one: {e}");
                None
            }
        }
    }

    fn save(&self, key: &str, account: &CreditAccount) {
        let result = serde_json::to_string(account)
            .map_err(MonospaceError::from)
            .and_then(|value| self.store.set(key, &value));
        if let Err(e) = result {
            tracing::warn!(key, "failed to persist credit record: {e}");
        }
    }
}

impl Default for CreditLedger {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for CreditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditLedger")
            .field("daily_limit", &self.daily_limit)
            .field("today", &self.clock.today())
            .finish_non_exhaustive()
    }
}
