// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Shelf data: products, carts and the sale items a register scans.

use crate::error::StationError;
use crate::money::round_money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A product on the shelves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub unit_price: Decimal,
}

/// Priced products keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    products: BTreeMap<String, Product>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or reprices a product.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::InvalidAmount`] if `unit_price` is not positive.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        unit_price: Decimal,
    ) -> Result<(), StationError> {
        if unit_price <= Decimal::ZERO {
            return Err(StationError::InvalidAmount);
        }
        let name = name.into();
        self.products.insert(
            name.clone(),
            Product {
                name,
                unit_price: round_money(unit_price),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Product> {
        self.products.get(name)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }
}

/// One line of a customer's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// What a customer carries to the register, in pick order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line. Zero quantities and non-positive prices are rejected.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        unit_price: Decimal,
        quantity: u32,
    ) -> Result<(), StationError> {
        if quantity == 0 || unit_price <= Decimal::ZERO {
            return Err(StationError::InvalidAmount);
        }
        self.lines.push(CartLine {
            name: name.into(),
            unit_price: round_money(unit_price),
            quantity,
        });
        Ok(())
    }

    /// Builder form of [`Cart::add`].
    pub fn with(
        mut self,
        name: impl Into<String>,
        unit_price: Decimal,
        quantity: u32,
    ) -> Result<Self, StationError> {
        self.add(name, unit_price, quantity)?;
        Ok(self)
    }

    /// Picks products off the shelf by name. Unknown names and zero
    /// quantities are skipped.
    pub fn from_catalog<'a>(
        catalog: &Catalog,
        picks: impl IntoIterator<Item = (&'a str, u32)>,
    ) -> Self {
        let mut cart = Self::new();
        for (name, quantity) in picks {
            if quantity == 0 {
                debug!(product = name, "zero quantity pick skipped");
                continue;
            }
            match catalog.get(name) {
                // Catalog prices are already validated and rounded.
                Some(product) => cart.lines.push(CartLine {
                    name: product.name.clone(),
                    unit_price: product.unit_price,
                    quantity,
                }),
                None => debug!(product = name, "unknown product skipped"),
            }
        }
        cart
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Expected checkout total if every line were scanned.
    pub fn estimated_total(&self) -> Decimal {
        self.lines
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.quantity))
            .sum()
    }

    /// Converts the cart into unscanned sale items.
    pub fn into_sale_items(self) -> Vec<SaleItem> {
        self.lines
            .into_iter()
            .map(|line| SaleItem {
                name: line.name,
                unit_price: line.unit_price,
                quantity: line.quantity,
                scanned: false,
            })
            .collect()
    }
}

/// An item on the register belt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub scanned: bool,
}

impl SaleItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn catalog_rejects_free_products() {
        let mut catalog = Catalog::new();
        assert_eq!(
            catalog.insert("Air", Decimal::ZERO),
            Err(StationError::InvalidAmount)
        );
        assert!(catalog.is_empty());
    }

    #[test]
    fn cart_from_catalog_skips_unknown_products() {
        let mut catalog = Catalog::new();
        catalog.insert("Soda", dec!(2.50)).unwrap();
        catalog.insert("Chips", dec!(3.00)).unwrap();

        let cart = Cart::from_catalog(&catalog, [("Soda", 1), ("Gum", 4), ("Chips", 2)]);

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.estimated_total(), dec!(8.50));
    }

    #[test]
    fn sale_items_start_unscanned_in_cart_order() {
        let cart = Cart::new()
            .with("Soda", dec!(2.50), 1)
            .unwrap()
            .with("Chips", dec!(3.00), 2)
            .unwrap();

        let items = cart.into_sale_items();

        assert_eq!(items[0].name, "Soda");
        assert_eq!(items[1].line_total(), dec!(6.00));
        assert!(items.iter().all(|item| !item.scanned));
    }

    #[test]
    fn cart_from_catalog_skips_zero_quantities() {
        let mut catalog = Catalog::new();
        catalog.insert("Soda", dec!(2.50)).unwrap();
        catalog.insert("Chips", dec!(3.00)).unwrap();

        let cart = Cart::from_catalog(&catalog, [("Soda", 0), ("Chips", 1)]);

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].name, "Chips");
        assert_eq!(cart.estimated_total(), dec!(3.00));
    }

    #[test]
    fn zero_quantity_line_is_rejected() {
        let mut cart = Cart::new();
        assert_eq!(
            cart.add("Soda", dec!(2.50), 0),
            Err(StationError::InvalidAmount)
        );
    }
}
