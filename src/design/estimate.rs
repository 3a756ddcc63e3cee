//! Renovation cost estimates for a redesigned room.

use crate::error::{MonospaceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Currencies an estimate can be priced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US dollar.
    #[default]
    Usd,
    /// Euro.
    Eur,
    /// Pound sterling.
    Gbp,
    /// Indian rupee.
    Inr,
    /// Japanese yen.
    Jpy,
    /// Canadian dollar.
    Cad,
    /// Australian dollar.
    Aud,
}

impl Currency {
    /// Every supported currency.
    pub const ALL: [Currency; 7] = [
        Self::Usd,
        Self::Eur,
        Self::Gbp,
        Self::Inr,
        Self::Jpy,
        Self::Cad,
        Self::Aud,
    ];

    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Inr => "INR",
            Self::Jpy => "JPY",
            Self::Cad => "CAD",
            Self::Aud => "AUD",
        }
    }

    /// Display symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Usd | Self::Cad | Self::Aud => "$",
            Self::Eur => "€",
            Self::Gbp => "£",
            Self::Inr => "₹",
            Self::Jpy => "¥",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|c| c.code()).collect();
                format!("unknown currency '{}'. Valid currencies: {}", s, known.join(", "))
            })
    }
}

/// A request to price out a redesigned room.
#[derive(Debug, Clone)]
pub struct CostEstimateRequest {
    /// The (usually generated) room image.
    pub image: Vec<u8>,
    /// Where the user lives; prices follow that market.
    pub location: String,
    /// Currency for all amounts.
    pub currency: Currency,
}

impl CostEstimateRequest {
    /// Creates a request priced in USD.
    pub fn new(image: Vec<u8>, location: impl Into<String>) -> Self {
        Self {
            image,
            location: location.into(),
            currency: Currency::default(),
        }
    }

    /// Sets the currency.
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Rejects requests without an image or a location.
    pub fn validate(&self) -> Result<()> {
        if self.location.trim().is_empty() {
            return Err(MonospaceError::InvalidRequest(
                "Please provide a location.".into(),
            ));
        }
        if self.image.is_empty() {
            return Err(MonospaceError::InvalidRequest(
                "an image of the room is required".into(),
            ));
        }
        Ok(())
    }

    /// The instruction sent alongside the image.
    pub fn prompt(&self) -> String {
        let location = self.location.trim();
        let currency = self.currency.code();
        format!(
            r#"Act as a professional interior design estimator.
Analyze the interior design shown in this image.

Context:
- User location: {location}
- Currency: {currency}

Task:
1. Identify the key furniture, decor and materials visible in the image.
2. Produce TWO separate cost estimates for the market in {location}:
   a) "Luxury" (high-end, premium brands and materials)
   b) "Affordable" (budget-friendly, flat-pack or DIY alternatives)

Output strictly valid JSON (no markdown fences) with this structure.
IMPORTANT: "cost" and "total" must be NUMERIC STRINGS ONLY (e.g. "3000", not "$3,000" or "3000 {currency}").

{{
  "luxury": {{
    "tierName": "High Quality / Luxury",
    "description": "Brief summary of the premium approach.",
    "items": [
      {{ "item": "Sofa (Premium Leather)", "cost": "3000" }},
      {{ "item": "Coffee Table (Solid Oak)", "cost": "800" }}
    ],
    "total": "15000"
  }},
  "affordable": {{
    "tierName": "Low Cost / Affordable",
    "description": "Brief summary of the budget-friendly approach.",
    "items": [
      {{ "item": "Sofa (Fabric)", "cost": "500" }},
      {{ "item": "Coffee Table (Veneer)", "cost": "100" }}
    ],
    "total": "2500"
  }}
}}
"#
        )
    }
}

/// One priced line in a budget tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostItem {
    /// What is being bought.
    pub item: String,
    /// Price as returned by the model, ideally a bare number.
    pub cost: String,
}

impl CostItem {
    /// The cost as a number, tolerating currency symbols and separators.
    pub fn amount(&self) -> Option<f64> {
        parse_amount(&self.cost)
    }
}

/// A complete budget option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetTier {
    /// Display name, e.g. "High Quality / Luxury".
    pub tier_name: String,
    /// One-line summary of the approach.
    #[serde(default)]
    pub description: String,
    /// Priced items.
    #[serde(default)]
    pub items: Vec<CostItem>,
    /// Total as returned by the model.
    pub total: String,
}

impl BudgetTier {
    /// The stated total as a number.
    pub fn total_amount(&self) -> Option<f64> {
        parse_amount(&self.total)
    }

    /// Sum of the items that have a readable cost.
    pub fn items_sum(&self) -> f64 {
        self.items.iter().filter_map(CostItem::amount).sum()
    }

    fn write_report(&self, out: &mut String) {
        out.push_str(&format!("--- {} ---\n{}\n\n", self.tier_name, self.description));
        let lines: Vec<String> = self
            .items
            .iter()
            .map(|i| format!("{}: {}", i.item, i.cost))
            .collect();
        out.push_str(&lines.join("\n"));
        out.push_str(&format!("\n\nTOTAL: {}", self.total));
    }
}

/// Two-tier renovation estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Premium option.
    pub luxury: BudgetTier,
    /// Budget option.
    pub affordable: BudgetTier,
}

impl CostEstimate {
    /// Parses the model's text output, tolerating markdown code fences.
    pub fn from_model_text(text: &str) -> Result<Self> {
        let json = text.replace("```json", "").replace("```", "");
        serde_json::from_str(json.trim()).map_err(|e| {
            MonospaceError::UnexpectedResponse(format!("could not parse cost estimate: {e}"))
        })
    }

    /// Both tiers, premium first.
    pub fn tiers(&self) -> [&BudgetTier; 2] {
        [&self.luxury, &self.affordable]
    }

    /// Plain-text rendering suitable for copying into a message or note.
    pub fn report(&self, location: &str, currency: Currency) -> String {
        let mut out = format!(
            "ESTIMATION FOR {} ({})\n\n",
            location.trim().to_uppercase(),
            currency.code()
        );
        self.luxury.write_report(&mut out);
        out.push_str("\n\n");
        self.affordable.write_report(&mut out);
        out
    }
}

/// Reads a money amount such as `"3000"`, `"$3,000"` or `"3000 USD"`.
fn parse_amount(raw: &str) -> Option<f64> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
