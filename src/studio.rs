//! Credit-metered access to a room designer.

use crate::credits::{CreditLedger, Identity};
use crate::design::{
    CostEstimate, CostEstimateRequest, GeneratedImage, RedesignRequest, RoomDesigner,
};
use crate::error::{MonospaceError, Result};
use serde::Serialize;
use std::sync::Arc;

/// A purchasable bundle of credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreditPackage {
    /// Credits granted on payment.
    pub credits: u32,
    /// Price in the currency's minor unit (paise for INR).
    pub price_minor: u64,
    /// ISO 4217 code charged by the payment gateway.
    pub currency: &'static str,
    /// Line shown on the checkout form.
    pub description: &'static str,
}

impl CreditPackage {
    /// Adds the package's credits to `identity` once the gateway confirmed
    /// `payment_id`. Verifying the payment is the caller's job.
    pub fn apply(
        &self,
        ledger: &CreditLedger,
        identity: &Identity,
        payment_id: &str,
    ) -> Result<CreditStatus> {
        let payment_id = payment_id.trim();
        if payment_id.is_empty() {
            return Err(MonospaceError::InvalidRequest(
                "a payment id is required to complete a purchase".into(),
            ));
        }

        ledger.add_credits(self.credits, identity);
        tracing::info!(
            %identity,
            payment_id,
            credits = self.credits,
            "purchase completed"
        );
        Ok(CreditStatus::of(ledger, identity))
    }
}

/// The single package on sale: 5 credits for ₹100.
pub const STANDARD_PACKAGE: CreditPackage = CreditPackage {
    credits: 5,
    price_minor: 10_000,
    currency: "INR",
    description: "Purchase 5 Credits",
};

/// Snapshot of an identity's credits for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditStatus {
    /// Display form of the identity.
    pub identity: String,
    /// Current day, `YYYY-MM-DD`.
    pub date: String,
    /// Free generations granted per day.
    pub daily_limit: u32,
    /// Free generations used today.
    pub daily_used: u32,
    /// Free generations left today.
    pub remaining_free: u32,
    /// Paid credits left.
    pub purchased_balance: u32,
    /// Whether one more redesign is allowed.
    pub can_generate: bool,
}

impl CreditStatus {
    /// Reads the identity's account from `ledger`, rolling it over if needed.
    pub fn of(ledger: &CreditLedger, identity: &Identity) -> Self {
        let limit = ledger.daily_limit();
        let account = ledger.account(identity);
        Self {
            identity: identity.to_string(),
            date: account.last_reset_date.format("%Y-%m-%d").to_string(),
            daily_limit: limit,
            daily_used: account.daily_used,
            remaining_free: account.remaining_free(limit),
            purchased_balance: account.purchased_balance,
            can_generate: account.can_generate(limit),
        }
    }
}

/// Ties a [`CreditLedger`] to a [`RoomDesigner`].
///
/// A redesign is only attempted when the identity has a credit, and the
/// credit is only drawn once the designer has returned an image.
#[derive(Clone)]
pub struct Studio {
    ledger: Arc<CreditLedger>,
    designer: Arc<dyn RoomDesigner>,
}

impl Studio {
    /// Creates a studio over `ledger` and `designer`.
    pub fn new(ledger: Arc<CreditLedger>, designer: Arc<dyn RoomDesigner>) -> Self {
        Self { ledger, designer }
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &CreditLedger {
        &self.ledger
    }

    /// The underlying designer.
    pub fn designer(&self) -> &dyn RoomDesigner {
        self.designer.as_ref()
    }

    /// Reports the identity's credits as of today.
    pub fn credit_status(&self, identity: &Identity) -> CreditStatus {
        CreditStatus::of(&self.ledger, identity)
    }

    /// Redesigns a room on behalf of `identity`, charging one credit on
    /// success.
    pub async fn redesign(
        &self,
        identity: &Identity,
        request: &RedesignRequest,
    ) -> Result<GeneratedImage> {
        request.validate()?;

        if !self.ledger.can_generate(identity) {
            tracing::info!(%identity, "redesign refused: no credits left");
            return Err(MonospaceError::InsufficientCredits {
                identity: identity.to_string(),
            });
        }

        let image = self.designer.redesign(request).await?;

        match self.ledger.consume_credit(identity) {
            Some(source) => {
                tracing::info!(%identity, ?source, style = request.style.slug(), "redesign charged")
            }
            // Another writer drained the account while the model was working
            None => tracing::warn!(%identity, "redesign delivered without a credit to draw"),
        }

        Ok(image)
    }

    /// Estimates renovation costs. Free of charge.
    pub async fn estimate_cost(&self, request: &CostEstimateRequest) -> Result<CostEstimate> {
        self.designer.estimate_cost(request).await
    }

    /// Grants `package` to `identity` after the gateway confirmed
    /// `payment_id`.
    pub fn complete_purchase(
        &self,
        identity: &Identity,
        package: &CreditPackage,
        payment_id: &str,
    ) -> Result<CreditStatus> {
        package.apply(&self.ledger, identity, payment_id)
    }
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("ledger", &self.ledger)
            .field("designer", &self.designer.name())
            .finish()
    }
}
