//! # Cart
//!
//! The transient list of lines a sale is built from.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Operator Action          Method                  Cart Change           │
//! │  ───────────────          ──────                  ───────────           │
//! │                                                                         │
//! │  Pick product + tier ───► add_item() ───────────► push or merge qty     │
//! │                                                                         │
//! │  Change quantity ───────► update_quantity() ────► items[i].qty = n      │
//! │                                                                         │
//! │  Remove line ───────────► remove_item() ────────► items.remove(i)       │
//! │                                                                         │
//! │  Sale fully settled ────► clear() ──────────────► items.clear()         │
//! │                                                                         │
//! │  NOTE: a sale that ends in partial completion leaves the cart intact    │
//! │        so the operator can see what was being sold.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::{select_unit_price, PricedLine};
use crate::types::{PriceTier, Product, SaleItem};
use crate::validation::validate_quantity;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// An item in the cart.
///
/// Name, unit price and unit cost are frozen when the line is added, so the
/// cart keeps charging what the operator saw even if the product changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,

    /// SKU at time of adding (frozen)
    pub sku: String,

    /// Product name at time of adding (frozen)
    pub name: String,

    /// Price after tier selection (frozen)
    pub unit_price: Money,

    /// Cost at time of adding (frozen)
    pub unit_cost: Money,

    pub price_tier: PriceTier,

    pub quantity: i64,

    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Creates a new cart item from a product, a tier and a quantity.
    pub fn from_product(product: &Product, tier: PriceTier, quantity: i64) -> Self {
        CartItem {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price: select_unit_price(product, tier),
            unit_cost: product.cost_price,
            price_tier: tier,
            quantity,
            added_at: Utc::now(),
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }

    pub fn priced_line(&self) -> PricedLine {
        PricedLine::new(self.unit_price, self.quantity)
    }

    /// Freezes the line into a sale item.
    pub fn to_sale_item(&self) -> SaleItem {
        SaleItem {
            product_id: self.product_id.clone(),
            name: self.name.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            unit_cost: self.unit_cost,
            price_tier: self.price_tier,
        }
    }
}

/// The cart.
///
/// ## Invariants
/// - Items are unique by `(product_id, price_tier)`; adding again increases quantity
/// - Quantity is always in `1..=999`
/// - At most 100 lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,

    /// When the cart was created/last cleared
    pub created_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Cart::new()
    }
}

impl Cart {
    pub fn new() -> Self {
        Cart {
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds a product to the cart or increases quantity if already present.
    pub fn add_item(&mut self, product: &Product, tier: PriceTier, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if let Some(item) = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product.id && i.price_tier == tier)
        {
            let new_qty = item.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            item.quantity = new_qty;
            return Ok(());
        }

        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS });
        }

        self.items.push(CartItem::from_product(product, tier, quantity));
        Ok(())
    }

    /// Updates the quantity of a line. Zero removes it.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(product_id);
        }
        validate_quantity(quantity)?;

        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => {
                item.quantity = quantity;
                Ok(())
            }
            None => Err(CoreError::NotInCart(product_id.to_string())),
        }
    }

    /// Removes every line of a product.
    pub fn remove_item(&mut self, product_id: &str) -> CoreResult<()> {
        let initial_len = self.items.len();
        self.items.retain(|i| i.product_id != product_id);

        if self.items.len() == initial_len {
            Err(CoreError::NotInCart(product_id.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.created_at = Utc::now();
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn priced_lines(&self) -> Vec<PricedLine> {
        self.items.iter().map(CartItem::priced_line).collect()
    }

    /// Quantity per product, with lines of the same product at different
    /// tiers summed. One stock adjustment is issued per entry.
    pub fn quantities_by_product(&self) -> Vec<(String, i64)> {
        let mut out: Vec<(String, i64)> = Vec::new();
        for item in &self.items {
            match out.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, qty)) => *qty += item.quantity,
                None => out.push((item.product_id.clone(), item.quantity)),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_product(sku: &str, retail: Money) -> Product {
        Product::new(sku, format!("Product {}", sku), Money::from_major(1), retail)
    }

    #[test]
    fn test_cart_add_item() {
        let mut cart = Cart::new();
        let product = test_product("A", Money::new(dec!(9.99)));

        cart.add_item(&product, PriceTier::Retail, 2).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 2);
        assert_eq!(cart.subtotal(), Money::new(dec!(19.98)));
    }

    #[test]
    fn test_cart_add_same_product_increases_quantity() {
        let mut cart = Cart::new();
        let product = test_product("A", Money::new(dec!(9.99)));

        cart.add_item(&product, PriceTier::Retail, 2).unwrap();
        cart.add_item(&product, PriceTier::Retail, 3).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_price_is_frozen_with_tier() {
        let mut cart = Cart::new();
        let mut product = test_product("A", Money::from_major(50)).with_wholesale_price(Money::from_major(40));

        cart.add_item(&product, PriceTier::Wholesale, 1).unwrap();
        product.wholesale_price = Some(Money::from_major(45));
        cart.add_item(&product, PriceTier::Retail, 1).unwrap();

        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.items[0].unit_price, Money::from_major(40));
        assert_eq!(cart.items[1].unit_price, Money::from_major(50));
        assert_eq!(cart.quantities_by_product(), vec![(product.id.clone(), 2)]);
    }

    #[test]
    fn test_quantity_limit() {
        let mut cart = Cart::new();
        let product = test_product("A", Money::from_major(1));

        cart.add_item(&product, PriceTier::Retail, 990).unwrap();
        let err = cart.add_item(&product, PriceTier::Retail, 10).unwrap_err();
        assert_eq!(
            err,
            CoreError::QuantityTooLarge {
                requested: 1000,
                max: MAX_ITEM_QUANTITY
            }
        );
        assert!(matches!(
            cart.add_item(&product, PriceTier::Retail, 0),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_line_limit() {
        let mut cart = Cart::new();
        for i in 0..MAX_CART_ITEMS {
            cart.add_item(&test_product(&format!("P{}", i), Money::from_major(1)), PriceTier::Retail, 1)
                .unwrap();
        }
        let err = cart
            .add_item(&test_product("ONE-MORE", Money::from_major(1)), PriceTier::Retail, 1)
            .unwrap_err();
        assert_eq!(err, CoreError::CartTooLarge { max: MAX_CART_ITEMS });
    }

    #[test]
    fn test_update_and_remove() {
        let mut cart = Cart::new();
        let product = test_product("A", Money::from_major(3));
        cart.add_item(&product, PriceTier::Retail, 1).unwrap();

        cart.update_quantity(&product.id, 4).unwrap();
        assert_eq!(cart.total_quantity(), 4);

        cart.update_quantity(&product.id, 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.remove_item(&product.id), Err(CoreError::NotInCart(product.id.clone())));
    }

    #[test]
    fn test_cart_clear() {
        let mut cart = Cart::new();
        cart.add_item(&test_product("A", Money::from_major(3)), PriceTier::Retail, 2)
            .unwrap();
        assert!(!cart.is_empty());

        cart.clear();
        assert!(cart.is_empty());
    }
}
