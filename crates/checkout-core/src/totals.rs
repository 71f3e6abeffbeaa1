//! # Totals Calculation
//!
//! Pure recomputation of price aggregates from the current item list, with
//! optional tax/shipping/discount collaborators. All amounts are in the
//! session's minor currency unit; collaborators return non-negative amounts.

use crate::session::{Address, CartItem, Totals};
use std::sync::Arc;

/// Tax collaborator: given items, subtotal and the buyer address, returns a
/// non-negative tax amount in minor units
pub trait TaxCalculator: Send + Sync {
    fn tax(&self, items: &[CartItem], subtotal: i64, address: Option<&Address>) -> i64;
}

/// Shipping collaborator
pub trait ShippingCalculator: Send + Sync {
    fn shipping(&self, items: &[CartItem], subtotal: i64, address: Option<&Address>) -> i64;
}

/// Discount collaborator
pub trait DiscountCalculator: Send + Sync {
    fn discount(&self, items: &[CartItem], subtotal: i64) -> i64;
}

/// Recomputes `Totals` synchronously after every cart/buyer mutation.
///
/// With no collaborators wired in, tax, shipping and discount are zero and
/// `total == subtotal`.
#[derive(Clone, Default)]
pub struct TotalsCalculator {
    tax: Option<Arc<dyn TaxCalculator>>,
    shipping: Option<Arc<dyn ShippingCalculator>>,
    discount: Option<Arc<dyn DiscountCalculator>>,
}

impl TotalsCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tax(mut self, tax: Arc<dyn TaxCalculator>) -> Self {
        self.tax = Some(tax);
        self
    }

    pub fn with_shipping(mut self, shipping: Arc<dyn ShippingCalculator>) -> Self {
        self.shipping = Some(shipping);
        self
    }

    pub fn with_discount(mut self, discount: Arc<dyn DiscountCalculator>) -> Self {
        self.discount = Some(discount);
        self
    }

    /// Compute totals for the given items and buyer address.
    ///
    /// Currency comes from the first item; an empty cart yields zeros in the
    /// default currency. Collaborator outputs are clamped at zero so a
    /// misbehaving collaborator can never drive a component negative.
    pub fn compute(&self, items: &[CartItem], address: Option<&Address>) -> Totals {
        let currency = items
            .first()
            .map(|item| item.unit_price.currency)
            .unwrap_or_default();

        let subtotal: i64 = items.iter().map(CartItem::line_total).sum();

        let tax = self
            .tax
            .as_ref()
            .map(|t| t.tax(items, subtotal, address).max(0))
            .unwrap_or(0);
        let shipping = self
            .shipping
            .as_ref()
            .map(|s| s.shipping(items, subtotal, address).max(0))
            .unwrap_or(0);
        let discount = self
            .discount
            .as_ref()
            .map(|d| d.discount(items, subtotal).max(0))
            .unwrap_or(0);

        Totals {
            subtotal,
            tax,
            shipping,
            discount,
            total: subtotal + tax + shipping - discount,
            currency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::{Currency, Price, Product};

    fn item(id: &str, cents: i64, qty: u32) -> CartItem {
        CartItem::from_product(
            &Product::new(id, id, Price::from_minor(cents, Currency::USD)),
            qty,
        )
    }

    struct FlatTax(i64);
    impl TaxCalculator for FlatTax {
        fn tax(&self, _items: &[CartItem], _subtotal: i64, _address: Option<&Address>) -> i64 {
            self.0
        }
    }

    struct FlatDiscount(i64);
    impl DiscountCalculator for FlatDiscount {
        fn discount(&self, _items: &[CartItem], _subtotal: i64) -> i64 {
            self.0
        }
    }

    #[test]
    fn test_empty_cart_is_all_zero() {
        let totals = TotalsCalculator::new().compute(&[], None);
        assert_eq!(totals.subtotal, 0);
        assert_eq!(totals.total, 0);
    }

    #[test]
    fn test_subtotal_is_sum_of_line_totals() {
        let items = vec![item("a", 1999, 2), item("b", 2999, 1)];
        let totals = TotalsCalculator::new().compute(&items, None);
        assert_eq!(totals.subtotal, 6997);
        assert_eq!(totals.tax, 0);
        assert_eq!(totals.shipping, 0);
        assert_eq!(totals.discount, 0);
        assert_eq!(totals.total, 6997);
        assert_eq!(totals.currency, Currency::USD);
    }

    #[test]
    fn test_collaborators_feed_total() {
        let items = vec![item("a", 10000, 1)];
        let totals = TotalsCalculator::new()
            .with_tax(Arc::new(FlatTax(875)))
            .with_discount(Arc::new(FlatDiscount(500)))
            .compute(&items, None);
        assert_eq!(totals.subtotal, 10000);
        assert_eq!(totals.tax, 875);
        assert_eq!(totals.discount, 500);
        assert_eq!(totals.total, 10375);
    }

    #[test]
    fn test_negative_collaborator_output_clamped() {
        let items = vec![item("a", 1000, 1)];
        let totals = TotalsCalculator::new()
            .with_tax(Arc::new(FlatTax(-250)))
            .compute(&items, None);
        assert_eq!(totals.tax, 0);
        assert_eq!(totals.total, 1000);
    }
}
