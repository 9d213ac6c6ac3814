//! Order total engine.
//!
//! Every code path that stores `orders.total` goes through [`compute_total`],
//! whether the lines come from a request body or were re-read from the
//! database. Arithmetic is exact decimal with overflow checks.

use rust_decimal::Decimal;

use crate::entities::order_item;
use crate::errors::ServiceError;

/// Fractional digits allowed on any monetary amount.
pub const MONEY_SCALE: u32 = 2;

/// A priced line: a positive quantity of something at a unit price.
pub trait LineAmount {
    fn quantity(&self) -> i32;
    fn unit_price(&self) -> Decimal;
}

impl<T: LineAmount + ?Sized> LineAmount for &T {
    fn quantity(&self) -> i32 {
        (**self).quantity()
    }

    fn unit_price(&self) -> Decimal {
        (**self).unit_price()
    }
}

impl LineAmount for (i32, Decimal) {
    fn quantity(&self) -> i32 {
        self.0
    }

    fn unit_price(&self) -> Decimal {
        self.1
    }
}

impl LineAmount for order_item::Model {
    fn quantity(&self) -> i32 {
        self.quantity
    }

    fn unit_price(&self) -> Decimal {
        self.price
    }
}

/// `quantity × unit_price` for one line.
pub fn line_amount(line: &impl LineAmount) -> Result<Decimal, ServiceError> {
    let quantity = line.quantity();
    if quantity <= 0 {
        return Err(ServiceError::ValidationError(format!(
            "quantity must be a positive integer, got {quantity}"
        )));
    }
    let price = line.unit_price();
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ServiceError::ValidationError(format!(
            "price must not be negative, got {price}"
        )));
    }

    Decimal::from(quantity)
        .checked_mul(price)
        .ok_or_else(|| ServiceError::ValidationError("line amount overflows".to_string()))
}

/// Sum of `quantity × unit_price` over `lines`. An empty input totals zero.
pub fn compute_total<I>(lines: I) -> Result<Decimal, ServiceError>
where
    I: IntoIterator,
    I::Item: LineAmount,
{
    lines.into_iter().try_fold(Decimal::ZERO, |acc, line| {
        let amount = line_amount(&line)?;
        acc.checked_add(amount)
            .ok_or_else(|| ServiceError::ValidationError("order total overflows".to_string()))
    })
}

/// Checks that `value` is a valid amount of money: non-negative with at most
/// two fractional digits.
pub fn validate_money(value: Decimal, field: &str) -> Result<(), ServiceError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ServiceError::ValidationError(format!(
            "{field} must not be negative"
        )));
    }
    if value.normalize().scale() > MONEY_SCALE {
        return Err(ServiceError::ValidationError(format!(
            "{field} must have at most {MONEY_SCALE} decimal places"
        )));
    }
    Ok(())
}

/// Presents an amount with exactly two fractional digits.
pub fn to_money(value: Decimal) -> Decimal {
    let mut value = value.round_dp(MONEY_SCALE);
    value.rescale(MONEY_SCALE);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn two_at_nine_ninety_nine() {
        assert_eq!(compute_total([(2, dec!(9.99))]).unwrap(), dec!(19.98));
    }

    #[test]
    fn empty_input_is_zero() {
        let none: Vec<(i32, Decimal)> = Vec::new();
        assert_eq!(compute_total(none).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn repeated_cents_do_not_drift() {
        let lines = vec![(1, dec!(0.10)); 1000];
        assert_eq!(compute_total(&lines).unwrap(), dec!(100.00));
    }

    #[test]
    fn line_order_is_irrelevant() {
        let lines = vec![(3, dec!(1.25)), (1, dec!(40.00)), (7, dec!(0.99))];
        let mut reversed = lines.clone();
        reversed.reverse();
        assert_eq!(
            compute_total(&lines).unwrap(),
            compute_total(&reversed).unwrap()
        );
        assert_eq!(compute_total(&lines).unwrap(), dec!(50.68));
    }

    #[test]
    fn persisted_items_total_the_same_as_request_lines() {
        let now = chrono::Utc::now();
        let items = vec![
            order_item::Model {
                id: 1,
                order_id: 1,
                product_id: 1,
                quantity: 2,
                price: dec!(9.99),
                created_at: now,
            },
            order_item::Model {
                id: 2,
                order_id: 1,
                product_id: 2,
                quantity: 1,
                price: dec!(5.01),
                created_at: now,
            },
        ];
        let lines = [(2, dec!(9.99)), (1, dec!(5.01))];
        assert_eq!(
            compute_total(&items).unwrap(),
            compute_total(lines).unwrap()
        );
    }

    #[test]
    fn invalid_lines_are_rejected() {
        assert_matches!(
            compute_total([(0, dec!(1.00))]),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            compute_total([(1, dec!(-1.00))]),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn overflow_is_an_error_not_a_panic() {
        assert_matches!(
            compute_total([(i32::MAX, Decimal::MAX)]),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn money_validation() {
        assert!(validate_money(dec!(0), "price").is_ok());
        assert!(validate_money(dec!(12.50), "price").is_ok());
        assert!(validate_money(dec!(12.500), "price").is_ok());
        assert!(validate_money(dec!(12.505), "price").is_err());
        assert!(validate_money(dec!(-0.01), "price").is_err());
    }

    #[test]
    fn money_presentation_has_two_places() {
        assert_eq!(to_money(dec!(20)).to_string(), "20.00");
        assert_eq!(to_money(dec!(19.980)).to_string(), "19.98");
    }
}
