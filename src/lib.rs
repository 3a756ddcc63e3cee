#![warn(missing_docs)]
//! Monospace - AI room redesigns metered by daily and purchased credits.
//!
//! Every identity (a signed-in user or the shared guest) gets a number of
//! free redesigns per day plus a purchased balance that never expires. A
//! [`Studio`] only calls the remote designer when a credit is available and
//! only draws the credit once an image came back.
//!
//! # Quick Start
//!
//! ```no_run
//! use monospace::{
//!     CreditLedger, GeminiProvider, Identity, JsonFileStore, RedesignRequest, RoomStyle, Studio,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> monospace::Result<()> {
//!     let ledger = CreditLedger::new(Arc::new(JsonFileStore::open_default()?));
//!     let designer = GeminiProvider::builder().build()?;
//!     let studio = Studio::new(Arc::new(ledger), Arc::new(designer));
//!
//!     let photo = std::fs::read("living-room.jpg")?;
//!     let request = RedesignRequest::new(photo, RoomStyle::Scandinavian);
//!     let image = studio.redesign(&Identity::Guest, &request).await?;
//!     image.save("living-room-scandinavian.jpg")?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `monospace` binary and its MCP server

mod error;

pub mod credits;
pub mod design;
pub mod studio;

#[cfg(feature = "cli")]
#[doc(hidden)]
pub mod mcp;

// Re-export error types at crate root
pub use error::{MonospaceError, Result};

pub use credits::{
    Clock, CreditAccount, CreditLedger, CreditSource, Identity, JsonFileStore, KeyValueStore,
    ManualClock, MemoryStore, SystemClock, DEFAULT_DAILY_LIMIT,
};
pub use design::providers::{
    GeminiImageModel, GeminiProvider, GeminiProviderBuilder, GeminiTextModel,
};
pub use design::{
    BudgetTier, CostEstimate, CostEstimateRequest, CostItem, Currency, GeneratedImage,
    GenerationMetadata, ImageFormat, RedesignRequest, RoomDesigner, RoomStyle,
};
pub use studio::{CreditPackage, CreditStatus, Studio, STANDARD_PACKAGE};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::credits::{CreditLedger, Identity};
    pub use crate::design::providers::GeminiProvider;
    pub use crate::design::{CostEstimateRequest, RedesignRequest, RoomDesigner, RoomStyle};
    pub use crate::error::{MonospaceError, Result};
    pub use crate::studio::Studio;
}
