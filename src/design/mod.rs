//! Room redesigns and renovation cost estimates.

mod designer;
mod estimate;
pub mod providers;
mod types;

#[cfg(test)]
pub(crate) use designer::testing;
pub use designer::RoomDesigner;
pub use estimate::{BudgetTier, CostEstimate, CostEstimateRequest, CostItem, Currency};
pub use types::{GeneratedImage, GenerationMetadata, ImageFormat, RedesignRequest, RoomStyle};
