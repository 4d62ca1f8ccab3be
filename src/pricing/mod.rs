//! Rental pricing engine.
//!
//! Pure quote computation: no I/O, no state, identical input always yields
//! an identical quote. All amounts are integer minor units (paise for INR)
//! and percentage rates are basis points, so rounding is explicit and
//! floating point never touches currency.

use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;
use crate::error::BookingError;

/// Enumerated rental length options. Each tier has its own pricing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationTier {
    /// Single day rental at the published daily rate.
    OneDay,
    /// Seven day rental at the published weekly rate (or 7x daily as a
    /// fallback), with the weekly discount applied.
    SevenDay,
}

impl DurationTier {
    /// Parse the tier from its wire representation. Anything outside the
    /// enumerated set is rejected, never silently defaulted.
    pub fn parse(value: &str) -> Result<Self, BookingError> {
        match value {
            "1-day" => Ok(Self::OneDay),
            "7-day" => Ok(Self::SevenDay),
            other => Err(BookingError::InvalidDurationTier(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneDay => "1-day",
            Self::SevenDay => "7-day",
        }
    }

    /// Rental length in days.
    pub fn days(&self) -> i64 {
        match self {
            Self::OneDay => 1,
            Self::SevenDay => 7,
        }
    }
}

impl std::fmt::Display for DurationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Published rates for one bike, in minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalOffer {
    pub bike_id: String,
    /// Daily rate in minor units.
    pub daily_rate: i64,
    /// Published weekly rate in minor units, if the owner publishes one.
    pub weekly_rate: Option<i64>,
}

/// A computed quote, fixed at booking creation and never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub base: i64,
    pub discount: i64,
    pub tax: i64,
    pub total: i64,
}

/// Quote calculator configured with the published tax and discount rates.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    tax_rate_bps: i64,
    weekly_discount_bps: i64,
}

impl PricingEngine {
    pub fn new(config: &PricingConfig) -> Self {
        Self {
            tax_rate_bps: config.tax_rate_bps,
            weekly_discount_bps: config.weekly_discount_bps,
        }
    }

    /// Compute the payable amount for an offer at the selected tier.
    ///
    /// 1-day: base = daily rate, no discount.
    /// 7-day: base = weekly rate, falling back to 7x the daily rate when no
    /// weekly rate is published; the discount is applied after the fallback
    /// substitution. Tax is charged on (base - discount).
    pub fn quote(&self, offer: &RentalOffer, tier: DurationTier) -> Result<Quote, BookingError> {
        if offer.daily_rate < 0 || offer.weekly_rate.is_some_and(|r| r < 0) {
            return Err(BookingError::InvalidRate);
        }

        // Rates arrive from the request path, so an absurdly large rate must
        // surface as InvalidRate rather than wrap the quote around i64.
        let (base, discount) = match tier {
            DurationTier::OneDay => (offer.daily_rate, 0),
            DurationTier::SevenDay => {
                let base = match offer.weekly_rate {
                    Some(weekly) => weekly,
                    None => offer
                        .daily_rate
                        .checked_mul(7)
                        .ok_or(BookingError::InvalidRate)?,
                };
                let discount =
                    apply_bps(base, self.weekly_discount_bps).ok_or(BookingError::InvalidRate)?;
                (base, discount)
            }
        };

        let tax =
            apply_bps(base - discount, self.tax_rate_bps).ok_or(BookingError::InvalidRate)?;
        let total = (base - discount)
            .checked_add(tax)
            .ok_or(BookingError::InvalidRate)?;

        Ok(Quote {
            base,
            discount,
            tax,
            total,
        })
    }
}

/// Multiply an amount by a basis-point rate, rounding half up to the
/// nearest minor unit. `None` when the intermediate product overflows.
fn apply_bps(amount: i64, rate_bps: i64) -> Option<i64> {
    Some((amount.checked_mul(rate_bps)?.checked_add(5_000)?) / 10_000)
}
