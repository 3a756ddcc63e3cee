//! Room designer trait.

use crate::design::estimate::{CostEstimate, CostEstimateRequest};
use crate::design::types::{GeneratedImage, RedesignRequest};
use crate::error::Result;
use async_trait::async_trait;

/// A remote model that can redesign rooms and price the result.
#[async_trait]
pub trait RoomDesigner: Send + Sync {
    /// Redesigns the photographed room in the requested style.
    async fn redesign(&self, request: &RedesignRequest) -> Result<GeneratedImage>;

    /// Estimates what realizing the pictured design would cost.
    async fn estimate_cost(&self, request: &CostEstimateRequest) -> Result<CostEstimate>;

    /// Returns the name of this designer for display.
    fn name(&self) -> &str;

    /// Checks if the designer is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::design::types::{GenerationMetadata, ImageFormat};
    use crate::error::MonospaceError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// JPEG header padded to a detectable length.
    pub(crate) const FAKE_JPEG: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];

    /// In-process designer that succeeds or fails on demand.
    pub(crate) struct StubDesigner {
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubDesigner {
        pub(crate) fn succeeding() -> Self {
            Self {
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RoomDesigner for StubDesigner {
        async fn redesign(&self, request: &RedesignRequest) -> Result<GeneratedImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MonospaceError::Api {
                    status: 500,
                    message: "model unavailable".into(),
                });
            }
            Ok(GeneratedImage::new(
                FAKE_JPEG.to_vec(),
                ImageFormat::Jpeg,
                GenerationMetadata {
                    model: Some("stub".into()),
                    style: Some(request.style.label().to_string()),
                    duration_ms: Some(1),
                },
            ))
        }

        async fn estimate_cost(&self, _request: &CostEstimateRequest) -> Result<CostEstimate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MonospaceError::UnexpectedResponse(
                    "Could not generate cost estimation.".into(),
                ));
            }
            CostEstimate::from_model_text(
                r#"{"luxury":{"tierName":"Luxury","description":"","items":[{"item":"Sofa","cost":"3000"}],"total":"3000"},
                    "affordable":{"tierName":"Affordable","description":"","items":[{"item":"Sofa","cost":"500"}],"total":"500"}}"#,
            )
        }

        fn name(&self) -> &str {
            "stub"
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }
}
