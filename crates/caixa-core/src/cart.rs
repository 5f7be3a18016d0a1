//! # Cart
//!
//! The in-progress sale owned by one checkout.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Operator Action          Method                   Cart Change          │
//! │  ───────────────          ──────                   ───────────          │
//! │                                                                         │
//! │  Scan item ─────────────► add_item() ────────────► qty += 1 / push     │
//! │                                                                         │
//! │  Type quantity ─────────► set_quantity() ────────► qty = n (≤0 drops)  │
//! │                                                   (n ≤ 999, ≤ 100 lines)│
//! │                                                                         │
//! │  Remove ────────────────► remove_item() ─────────► lines.retain(..)    │
//! │                                                                         │
//! │  Line discount ─────────► apply_line_adjustment() ► normalized amount  │
//! │                                                                         │
//! │  Order discount ────────► apply_order_adjustment() ► flat amount       │
//! │                                                                         │
//! │  Finalize OK ───────────► clear() ───────────────► empty cart          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cart never talks to the catalog after an item is added: each line
//! holds a frozen copy of the item.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::{self, AdjustmentKind, AdjustmentMode, LineAdjustment};
use crate::types::{CatalogItem, CustomerRef, OrderLine, OrderTotals, OrderType, Quote};
use crate::validation::{validate_cart_size, validate_quantity};

// =============================================================================
// Cart Line
// =============================================================================

/// One line of the cart.
///
/// ## Design Notes
/// - `item`: frozen copy of the catalog item at the time it was added
/// - `discount` / `surcharge`: already normalized to currency, re-applying
///   an adjustment of the same kind replaces it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub item: CatalogItem,
    pub quantity: i64,
    pub discount: Option<LineAdjustment>,
    pub surcharge: Option<LineAdjustment>,
}

impl CartLine {
    pub fn from_item(item: &CatalogItem) -> Self {
        CartLine {
            item: item.clone(),
            quantity: 1,
            discount: None,
            surcharge: None,
        }
    }

    pub fn item_id(&self) -> &str {
        &self.item.id
    }

    /// Discount taken off this line, capped at the line gross.
    pub fn discount_amount(&self) -> Money {
        pricing::line_discount(self.item.unit_price, self.quantity, self.discount.as_ref())
    }

    pub fn surcharge_amount(&self) -> Money {
        self.surcharge
            .map(|s| s.amount_for(self.quantity))
            .unwrap_or_default()
    }

    pub fn subtotal(&self) -> Money {
        pricing::line_subtotal(
            self.item.unit_price,
            self.quantity,
            self.discount.as_ref(),
            self.surcharge.as_ref(),
        )
    }

    /// Immutable snapshot for an order or quote.
    pub fn to_order_line(&self) -> OrderLine {
        OrderLine {
            item_id: self.item.id.clone(),
            code: self.item.code.clone(),
            name: self.item.name.clone(),
            unit_price: self.item.unit_price,
            quantity: self.quantity,
            discount: self.discount_amount(),
            surcharge: self.surcharge_amount(),
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The cart: lines, order-level adjustments, customer and order type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
    order_discount: Money,
    order_surcharge: Money,
    customer: Option<CustomerRef>,
    order_type: OrderType,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds one unit of `item`, or bumps the quantity of the existing line.
    ///
    /// ## Errors
    /// `Validation(OutOfRange)` when the line is already at
    /// [`crate::MAX_ITEM_QUANTITY`] or the cart already has
    /// [`crate::MAX_CART_ITEMS`] lines. The cart is unchanged.
    pub fn add_item(&mut self, item: &CatalogItem) -> CoreResult<()> {
        if let Some(line) = self.lines.iter_mut().find(|l| l.item.id == item.id) {
            validate_quantity(line.quantity + 1)?;
            line.quantity += 1;
            return Ok(());
        }
        validate_cart_size(self.lines.len())?;
        self.lines.push(CartLine::from_item(item));
        Ok(())
    }

    /// Sets the quantity of a line.
    ///
    /// ## Behavior
    /// - quantity ≤ 0: the line is removed
    /// - quantity > [`crate::MAX_ITEM_QUANTITY`]: error, line unchanged
    /// - item not in cart: no-op
    ///
    /// Returns whether a line was found.
    pub fn set_quantity(&mut self, item_id: &str, quantity: i64) -> CoreResult<bool> {
        if quantity <= 0 {
            return Ok(self.remove_item(item_id));
        }
        validate_quantity(quantity)?;
        match self.lines.iter_mut().find(|l| l.item.id == item_id) {
            Some(line) => {
                line.quantity = quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes a line. Returns whether a line was removed.
    pub fn remove_item(&mut self, item_id: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.item.id != item_id);
        self.lines.len() != before
    }

    /// Applies (or replaces) a discount/surcharge on one line.
    ///
    /// On error the line is left unchanged.
    pub fn apply_line_adjustment(
        &mut self,
        item_id: &str,
        kind: AdjustmentKind,
        mode: AdjustmentMode,
    ) -> CoreResult<()> {
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.item.id == item_id)
            .ok_or_else(|| CoreError::ItemNotInCart(item_id.to_string()))?;

        let adjustment =
            pricing::resolve_line_adjustment(line.item.unit_price, line.quantity, kind, mode)?;
        match kind {
            AdjustmentKind::Discount => line.discount = Some(adjustment),
            AdjustmentKind::Surcharge => line.surcharge = Some(adjustment),
        }
        Ok(())
    }

    /// Applies (or replaces) the order-level discount/surcharge.
    ///
    /// A percentage is converted against the current subtotal and stored
    /// flat. Returns the stored amount.
    pub fn apply_order_adjustment(
        &mut self,
        kind: AdjustmentKind,
        mode: AdjustmentMode,
    ) -> CoreResult<Money> {
        let amount = pricing::resolve_order_adjustment(self.subtotal(), kind, mode)?;
        match kind {
            AdjustmentKind::Discount => self.order_discount = amount,
            AdjustmentKind::Surcharge => self.order_surcharge = amount,
        }
        Ok(amount)
    }

    pub fn set_customer(&mut self, customer: Option<CustomerRef>) {
        self.customer = customer;
    }

    pub fn set_order_type(&mut self, order_type: OrderType) {
        self.order_type = order_type;
    }

    /// Empties the cart and resets customer and order type.
    pub fn clear(&mut self) {
        *self = Cart::default();
    }

    /// Replaces the cart with the content of a saved quote.
    ///
    /// Line adjustments come back as flat line totals.
    pub fn load_quote(&mut self, quote: &Quote) {
        self.lines = quote
            .lines
            .iter()
            .map(|line| CartLine {
                item: CatalogItem {
                    id: line.item_id.clone(),
                    code: line.code.clone(),
                    name: line.name.clone(),
                    unit_price: line.unit_price,
                    category: None,
                    stock: None,
                    active: true,
                },
                quantity: line.quantity,
                discount: (!line.discount.is_zero())
                    .then_some(LineAdjustment::LineTotal(line.discount)),
                surcharge: (!line.surcharge.is_zero())
                    .then_some(LineAdjustment::LineTotal(line.surcharge)),
            })
            .collect();
        self.order_discount = quote.totals.discount;
        self.order_surcharge = quote.totals.surcharge;
        self.customer = quote.customer.clone();
        self.order_type = quote.order_type;
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, item_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.item.id == item_id)
    }

    pub fn customer(&self) -> Option<&CustomerRef> {
        self.customer.as_ref()
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn order_discount(&self) -> Money {
        self.order_discount
    }

    pub fn order_surcharge(&self) -> Money {
        self.order_surcharge
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Σ line subtotals.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    /// max(0, subtotal − order discount + order surcharge)
    pub fn total(&self) -> Money {
        pricing::order_total(self.subtotal(), self.order_discount, self.order_surcharge)
    }

    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal(),
            discount: self.order_discount,
            surcharge: self.order_surcharge,
            total: self.total(),
        }
    }

    pub fn to_order_lines(&self) -> Vec<OrderLine> {
        self.lines.iter().map(CartLine::to_order_line).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Percent;

    fn capinha() -> CatalogItem {
        CatalogItem::new("A", "Capinha", Money::from_cents(5000))
    }

    fn pelicula() -> CatalogItem {
        CatalogItem::new("B", "Película", Money::from_cents(1700))
    }

    #[test]
    fn test_add_same_item_increments_quantity() {
        let mut cart = Cart::new();
        cart.add_item(&capinha()).unwrap();
        cart.add_item(&capinha()).unwrap();
        cart.add_item(&pelicula()).unwrap();

        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.line("A").unwrap().quantity, 2);
        assert_eq!(cart.total_quantity(), 3);
    }

    #[test]
    fn test_line_keeps_snapshot_of_catalog_price() {
        let mut cart = Cart::new();
        let mut item = capinha();
        cart.add_item(&item).unwrap();

        item.unit_price = Money::from_cents(9999);
        cart.add_item(&item).unwrap();

        let line = cart.line("A").unwrap();
        assert_eq!(line.item.unit_price, Money::from_cents(5000));
        assert_eq!(line.quantity, 2);
    }

    #[test]
    fn test_set_quantity_zero_or_negative_removes_line() {
        let mut cart = Cart::new();
        cart.add_item(&capinha()).unwrap();
        cart.add_item(&pelicula()).unwrap();

        assert!(cart.set_quantity("A", 0).unwrap());
        assert!(cart.line("A").is_none());

        assert!(cart.set_quantity("B", -3).unwrap());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_unknown_item_is_noop() {
        let mut cart = Cart::new();
        cart.add_item(&capinha()).unwrap();
        assert!(!cart.set_quantity("ZZZ", 5).unwrap());
        assert!(!cart.remove_item("ZZZ"));
        assert_eq!(cart.total_quantity(), 1);
    }

    #[test]
    fn test_percentage_line_discount_follows_quantity() {
        let mut cart = Cart::new();
        cart.add_item(&capinha()).unwrap();
        cart.set_quantity("A", 2).unwrap();
        cart.apply_line_adjustment(
            "A",
            AdjustmentKind::Discount,
            AdjustmentMode::Percentage(Percent::from_int(10)),
        )
        .unwrap();

        assert_eq!(cart.line("A").unwrap().subtotal(), Money::from_cents(9000));

        cart.set_quantity("A", 3).unwrap();
        assert_eq!(cart.line("A").unwrap().subtotal(), Money::from_cents(13500));
    }

    #[test]
    fn test_reapplying_adjustment_replaces_it() {
        let mut cart = Cart::new();
        cart.add_item(&capinha()).unwrap();
        cart.apply_line_adjustment(
            "A",
            AdjustmentKind::Discount,
            AdjustmentMode::Flat(Money::from_cents(1000)),
        )
        .unwrap();
        cart.apply_line_adjustment(
            "A",
            AdjustmentKind::Discount,
            AdjustmentMode::Flat(Money::from_cents(300)),
        )
        .unwrap();

        assert_eq!(cart.line("A").unwrap().subtotal(), Money::from_cents(4700));
    }

    #[test]
    fn test_adjust_unknown_item_fails_without_change() {
        let mut cart = Cart::new();
        cart.add_item(&capinha()).unwrap();
        let before = cart.clone();

        let result = cart.apply_line_adjustment(
            "ZZZ",
            AdjustmentKind::Discount,
            AdjustmentMode::Flat(Money::from_cents(100)),
        );
        assert_eq!(result, Err(CoreError::ItemNotInCart("ZZZ".to_string())));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_invalid_adjustment_leaves_line_untouched() {
        let mut cart = Cart::new();
        cart.add_item(&capinha()).unwrap();
        let before = cart.clone();

        let result = cart.apply_line_adjustment(
            "A",
            AdjustmentKind::Discount,
            AdjustmentMode::Percentage(Percent::from_int(101)),
        );
        assert!(result.is_err());
        assert_eq!(cart, before);
    }

    #[test]
    fn test_order_percentage_is_frozen_at_click_time() {
        let mut cart = Cart::new();
        cart.add_item(&capinha()).unwrap();
        cart.add_item(&capinha()).unwrap();

        let stored = cart
            .apply_order_adjustment(
                AdjustmentKind::Discount,
                AdjustmentMode::Percentage(Percent::from_int(10)),
            )
            .unwrap();
        assert_eq!(stored, Money::from_cents(1000));
        assert_eq!(cart.total(), Money::from_cents(9000));

        // adding more does not grow the stored discount
        cart.add_item(&pelicula()).unwrap();
        assert_eq!(cart.order_discount(), Money::from_cents(1000));
        assert_eq!(cart.total(), Money::from_cents(10700));
    }

    #[test]
    fn test_total_never_negative() {
        let mut cart = Cart::new();
        cart.add_item(&pelicula()).unwrap();
        cart.apply_order_adjustment(
            AdjustmentKind::Discount,
            AdjustmentMode::Flat(Money::from_cents(100000)),
        )
        .unwrap();
        assert_eq!(cart.total(), Money::zero());
    }

    #[test]
    fn test_totals_consistent_with_lines() {
        let mut cart = Cart::new();
        cart.add_item(&capinha()).unwrap();
        cart.add_item(&pelicula()).unwrap();
        cart.set_quantity("B", 3).unwrap();
        cart.apply_line_adjustment(
            "B",
            AdjustmentKind::Surcharge,
            AdjustmentMode::Flat(Money::from_cents(150)),
        )
        .unwrap();
        cart.apply_order_adjustment(
            AdjustmentKind::Surcharge,
            AdjustmentMode::Flat(Money::from_cents(500)),
        )
        .unwrap();

        let totals = cart.totals();
        let from_lines: Money = cart.to_order_lines().iter().map(OrderLine::subtotal).sum();
        assert_eq!(totals.subtotal, from_lines);
        assert_eq!(
            totals.total,
            totals.subtotal - totals.discount + totals.surcharge
        );
        assert_eq!(totals.total, Money::from_cents(5000 + 5100 + 150 + 500));
    }

    #[test]
    fn test_quantity_above_limit_rejected() {
        let mut cart = Cart::new();
        cart.add_item(&capinha()).unwrap();

        let result = cart.set_quantity("A", crate::MAX_ITEM_QUANTITY + 1);
        assert!(matches!(result, Err(CoreError::Validation(_))));
        assert!(cart.set_quantity("A", i64::MAX).is_err());
        assert_eq!(cart.line("A").unwrap().quantity, 1);

        cart.set_quantity("A", crate::MAX_ITEM_QUANTITY).unwrap();
        let before = cart.clone();
        assert!(cart.add_item(&capinha()).is_err());
        assert_eq!(cart, before);
    }

    #[test]
    fn test_cart_line_limit() {
        let mut cart = Cart::new();
        for i in 0..crate::MAX_CART_ITEMS {
            let item = CatalogItem::new(format!("I{}", i), "Item", Money::from_cents(100));
            cart.add_item(&item).unwrap();
        }

        let extra = CatalogItem::new("EXTRA", "Item", Money::from_cents(100));
        assert!(cart.add_item(&extra).is_err());
        assert_eq!(cart.item_count(), crate::MAX_CART_ITEMS);

        // bumping an existing line is still fine
        cart.add_item(&CatalogItem::new("I0", "Item", Money::from_cents(100)))
            .unwrap();
        assert_eq!(cart.line("I0").unwrap().quantity, 2);
    }

    #[test]
    fn test_flat_line_discount_cannot_exceed_line() {
        let mut cart = Cart::new();
        cart.add_item(&CatalogItem::new("A", "Capinha", Money::from_cents(5000)))
            .unwrap();
        cart.add_item(&CatalogItem::new("B", "Cabo", Money::from_cents(3000)))
            .unwrap();
        let before = cart.clone();

        let result = cart.apply_line_adjustment(
            "B",
            AdjustmentKind::Discount,
            AdjustmentMode::Flat(Money::from_cents(10000)),
        );
        assert!(matches!(result, Err(CoreError::InvalidAmount { .. })));
        assert_eq!(cart, before);
        assert_eq!(cart.subtotal(), Money::from_cents(8000));
    }

    #[test]
    fn test_flat_line_discount_capped_after_quantity_drop() {
        let mut cart = Cart::new();
        cart.add_item(&capinha()).unwrap();
        cart.add_item(&pelicula()).unwrap();
        cart.set_quantity("B", 3).unwrap();
        cart.apply_line_adjustment(
            "B",
            AdjustmentKind::Discount,
            AdjustmentMode::Flat(Money::from_cents(3000)),
        )
        .unwrap();
        assert_eq!(cart.line("B").unwrap().subtotal(), Money::from_cents(2100));

        cart.set_quantity("B", 1).unwrap();
        let line = cart.line("B").unwrap();
        assert_eq!(line.subtotal(), Money::zero());
        assert_eq!(line.discount_amount(), Money::from_cents(1700));
        assert_eq!(line.to_order_line().subtotal(), Money::zero());

        // the other line is not eaten into
        assert_eq!(cart.subtotal(), Money::from_cents(5000));
        assert_eq!(cart.total(), Money::from_cents(5000));
    }

    #[test]
    fn test_adding_and_discounting_move_total_strictly() {
        let mut cart = Cart::new();
        let mut last = cart.total();
        for item in [capinha(), pelicula(), capinha()] {
            cart.add_item(&item).unwrap();
            assert!(cart.total() > last);
            last = cart.total();
        }

        cart.apply_line_adjustment(
            "B",
            AdjustmentKind::Discount,
            AdjustmentMode::Percentage(Percent::from_int(5)),
        )
        .unwrap();
        assert!(cart.total() < last);
        last = cart.total();

        cart.apply_order_adjustment(
            AdjustmentKind::Discount,
            AdjustmentMode::Flat(Money::from_cents(1)),
        )
        .unwrap();
        assert!(cart.total() < last);
    }

    /// Price 100, qty 3: 10% and a flat 30 both give 270; at qty 2 the
    /// percentage follows (180) while the flat amount stays (170).
    #[test]
    fn test_percent_and_flat_line_discount_at_quantity_change() {
        let item = CatalogItem::new("C", "Conserto", Money::from_cents(10000));

        let mut by_percent = Cart::new();
        by_percent.add_item(&item).unwrap();
        by_percent.set_quantity("C", 3).unwrap();
        by_percent
            .apply_line_adjustment(
                "C",
                AdjustmentKind::Discount,
                AdjustmentMode::Percentage(Percent::from_int(10)),
            )
            .unwrap();
        assert_eq!(
            by_percent.line("C").unwrap().discount,
            Some(LineAdjustment::PerUnit(Money::from_cents(1000)))
        );
        assert_eq!(by_percent.total(), Money::from_cents(27000));

        let mut by_flat = Cart::new();
        by_flat.add_item(&item).unwrap();
        by_flat.set_quantity("C", 3).unwrap();
        by_flat
            .apply_line_adjustment(
                "C",
                AdjustmentKind::Discount,
                AdjustmentMode::Flat(Money::from_cents(3000)),
            )
            .unwrap();
        assert_eq!(by_flat.total(), Money::from_cents(27000));

        by_percent.set_quantity("C", 2).unwrap();
        by_flat.set_quantity("C", 2).unwrap();
        assert_eq!(
            by_percent.line("C").unwrap().discount_amount(),
            Money::from_cents(2000)
        );
        assert_eq!(by_percent.total(), Money::from_cents(18000));
        assert_eq!(
            by_flat.line("C").unwrap().discount_amount(),
            Money::from_cents(3000)
        );
        assert_eq!(by_flat.total(), Money::from_cents(17000));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut cart = Cart::new();
        cart.add_item(&capinha()).unwrap();
        cart.set_order_type(OrderType::Delivery);
        cart.set_customer(Some(CustomerRef {
            id: "c1".to_string(),
            name: "Maria".to_string(),
            document: None,
        }));

        cart.clear();
        assert!(cart.is_empty());
        assert!(cart.customer().is_none());
        assert_eq!(cart.order_type(), OrderType::InStore);
        assert_eq!(cart.total(), Money::zero());
    }
}
