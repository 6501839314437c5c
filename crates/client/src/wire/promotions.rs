//! Promotion validation schemas.

use medcart::{
    money::{AmountError, major_units, minor_units},
    promotions::Promotion,
};
use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::{Deserialize, Serialize};

use crate::wire::WireError;

/// Body of `POST /promo-codes/validate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePromoRequest {
    /// Code entered by the customer
    pub promo_code: String,

    /// Current cart subtotal in major units
    pub order_total: Decimal,
}

impl ValidatePromoRequest {
    /// Build a validation request for `code` against a subtotal in minor units.
    pub fn new(code: &str, subtotal: i64, currency: &Currency) -> Self {
        Self {
            promo_code: code.trim().to_string(),
            order_total: major_units(subtotal, currency),
        }
    }
}

/// Validated promotion as returned by the promotion service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoValidation {
    /// Canonical code; the submitted code is used when absent
    #[serde(default)]
    pub code: Option<String>,

    /// Discount rate, either a fraction or whole percent points
    pub discount_percentage: Decimal,

    /// Minimum subtotal in major units
    #[serde(default)]
    pub minimum_order: Decimal,

    /// Discount cap in major units
    #[serde(default)]
    pub max_discount: Option<Decimal>,

    /// Display text
    #[serde(default)]
    pub description: Option<String>,
}

impl PromoValidation {
    /// Convert into a promotion, falling back to `submitted_code` for the code.
    ///
    /// # Errors
    ///
    /// Returns an error for negative or unrepresentable amounts.
    pub fn into_promotion(
        self,
        submitted_code: &str,
        currency: &Currency,
    ) -> Result<Promotion, WireError> {
        if self.discount_percentage.is_sign_negative() && !self.discount_percentage.is_zero() {
            return Err(WireError::Amount {
                field: "discountPercentage",
                source: AmountError::Negative(self.discount_percentage),
            });
        }

        let min_order_amount =
            minor_units(self.minimum_order, currency).map_err(|source| WireError::Amount {
                field: "minimumOrder",
                source,
            })?;

        let max_discount = self
            .max_discount
            .map(|cap| minor_units(cap, currency))
            .transpose()
            .map_err(|source| WireError::Amount {
                field: "maxDiscount",
                source,
            })?;

        let code = self
            .code
            .filter(|code| !code.trim().is_empty())
            .unwrap_or_else(|| submitted_code.trim().to_string());

        let mut promotion = Promotion::new(code, self.discount_percentage)
            .with_min_order_amount(min_order_amount)
            .with_max_discount(max_discount);

        if let Some(description) = self.description {
            promotion = promotion.with_description(description);
        }

        Ok(promotion)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::EGP;
    use serde_json::json;
    use testresult::TestResult;

    use crate::wire::Envelope;

    use super::*;

    #[test]
    fn validation_response_becomes_a_promotion() -> TestResult {
        let envelope: Envelope<PromoValidation> = serde_json::from_value(json!({
            "data": {
                "discountPercentage": 20,
                "minimumOrder": 100,
                "maxDiscount": 50
            }
        }))?;

        let promotion = envelope.into_result()?.into_promotion(" health20 ", EGP)?;

        assert_eq!(promotion.code, "health20");
        assert_eq!(promotion.min_order_amount, 10_000);
        assert_eq!(promotion.max_discount, Some(5_000));
        assert_eq!(promotion.discount_on(100_000), 5_000);
        assert_eq!(promotion.discount_on(5_000), 0);

        Ok(())
    }

    #[test]
    fn request_carries_major_units() -> TestResult {
        let request = ValidatePromoRequest::new("SAVE10", 19_999, EGP);

        assert_eq!(
            serde_json::to_value(request)?,
            json!({ "promoCode": "SAVE10", "orderTotal": 199.99 })
        );

        Ok(())
    }

    #[test]
    fn negative_rate_is_rejected() {
        let validation = PromoValidation {
            code: None,
            discount_percentage: Decimal::from(-5),
            minimum_order: Decimal::ZERO,
            max_discount: None,
            description: None,
        };

        assert!(matches!(
            validation.into_promotion("X", EGP),
            Err(WireError::Amount { field: "discountPercentage", .. })
        ));
    }
}
