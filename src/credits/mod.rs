//! Local credit metering.
//!
//! Each identity gets a number of free generations per calendar day plus a
//! purchased balance that never expires. Free quota is always drawn first.
//!
//! ```
//! use monospace::credits::{CreditLedger, Identity};
//!
//! let ledger = CreditLedger::in_memory();
//! let guest = Identity::Guest;
//!
//! assert!(ledger.can_generate(&guest));
//! ledger.consume_credit(&guest);
//! assert_eq!(ledger.remaining_free(&guest), 4);
//! ```

mod account;
mod clock;
mod identity;
mod ledger;
mod store;

pub use account::{CreditAccount, CreditSource};
pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::Identity;
pub use ledger::{CreditLedger, DEFAULT_DAILY_LIMIT};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
