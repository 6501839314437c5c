//! Receipt
//!
//! Terminal rendering of a cart: one row per line item grouped by pharmacy, followed by the
//! totals summary.

use std::io;

use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{cart::Cart, items::LineItem};

/// Errors that can occur when writing a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// IO error
    #[error("failed to write receipt: {0}")]
    Io(#[from] io::Error),
}

/// Printable view of a cart.
#[derive(Debug, Clone, Copy)]
pub struct Receipt<'a> {
    cart: &'a Cart,
}

impl<'a> Receipt<'a> {
    /// Create a receipt for `cart`.
    pub fn new(cart: &'a Cart) -> Self {
        Self { cart }
    }

    /// Write the item table and the totals summary to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReceiptError> {
        if self.cart.is_empty() {
            writeln!(out, "\nCart is empty.\n")?;

            return Ok(());
        }

        let mut builder = Builder::default();

        builder.push_record([
            "", "Item", "Pharmacy", "Qty", "Price", "Line Total", "Savings", "Rx",
        ]);

        let vendor_boundary_rows = append_item_rows(&mut builder, self.cart);

        write_item_table(&mut out, builder, &vendor_boundary_rows)?;

        write_summary(&mut out, self.cart)
    }
}

/// Items ordered by pharmacy first appearance, keeping cart order inside each pharmacy.
fn items_by_pharmacy(cart: &Cart) -> Vec<(usize, &LineItem)> {
    let mut pharmacies: Vec<&str> = Vec::new();

    for item in cart.items() {
        if !pharmacies.contains(&item.pharmacy_id()) {
            pharmacies.push(item.pharmacy_id());
        }
    }

    pharmacies
        .iter()
        .flat_map(|pharmacy| {
            cart.items()
                .iter()
                .enumerate()
                .filter(move |(_, item)| item.pharmacy_id() == *pharmacy)
        })
        .collect()
}

fn append_item_rows(builder: &mut Builder, cart: &Cart) -> SmallVec<[usize; 8]> {
    let currency = cart.currency();
    let mut boundaries = SmallVec::new();
    let mut previous_pharmacy: Option<&str> = None;

    // header is row 0
    for (row, (idx, item)) in items_by_pharmacy(cart).into_iter().enumerate() {
        let pharmacy = item.pharmacy_id();

        if previous_pharmacy.is_some_and(|previous| previous != pharmacy) {
            boundaries.push(row + 1);
        }

        previous_pharmacy = Some(pharmacy);

        let pharmacy_name = if item.pharmacy_name.is_empty() {
            pharmacy
        } else {
            item.pharmacy_name.as_str()
        };

        let savings = item.line_savings();

        let prescription = match item.prescription_id() {
            Some(prescription_id) => prescription_id.to_string(),
            None if item.requires_prescription => "required".to_string(),
            None => String::new(),
        };

        builder.push_record([
            format!("#{:<3}", idx + 1),
            item.name.clone(),
            pharmacy_name.to_string(),
            item.quantity().to_string(),
            money(item.price, currency),
            money(item.line_total(), currency),
            if savings > 0 {
                format!("-{}", money(savings, currency))
            } else {
                String::new()
            },
            prescription,
        ]);
    }

    boundaries
}

fn write_item_table(
    out: &mut impl io::Write,
    builder: Builder,
    vendor_boundary_rows: &[usize],
) -> Result<(), ReceiptError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    for &row in vendor_boundary_rows {
        theme.insert_horizontal_line(row, separator);
    }

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(3..7), Alignment::right());
    table.modify(Columns::new(6..7), Color::FG_GREEN);

    writeln!(out, "\n{table}")?;

    Ok(())
}

fn write_summary(out: &mut impl io::Write, cart: &Cart) -> Result<(), ReceiptError> {
    let totals = cart.totals();

    let discount_label = match cart.promotion() {
        Some(promotion) => format!("Discount ({}):", promotion.code),
        None => "Discount:".to_string(),
    };

    let delivery = if totals.delivery_fee.to_minor_units() == 0 && !cart.is_empty() {
        "free".to_string()
    } else {
        totals.delivery_fee.to_string()
    };

    let mut builder = Builder::default();

    builder.push_record(["Items:".to_string(), totals.total_items.to_string()]);
    builder.push_record(["Subtotal:".to_string(), totals.subtotal.to_string()]);
    builder.push_record(["Delivery:".to_string(), delivery]);
    builder.push_record([discount_label, format!("-{}", totals.discount)]);
    builder.push_record(["Total:".to_string(), totals.total.to_string()]);
    builder.push_record(["Savings:".to_string(), totals.savings.to_string()]);

    let mut table = builder.build();

    table.with(Style::blank());
    table.modify(Columns::new(0..2), Alignment::right());
    table.modify(Rows::one(4), Color::BOLD);

    writeln!(out, "{table}\n")?;

    Ok(())
}

fn money(minor: i64, currency: &'static Currency) -> String {
    Money::from_minor(minor, currency).to_string()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rusty_money::iso::EGP;
    use testresult::TestResult;

    use crate::{
        cart::CartCommand,
        items::{LineItem, LineItemKey},
        promotions::Promotion,
    };

    use super::*;

    fn strip_ansi(s: &str) -> String {
        let mut out = String::new();
        let mut in_escape = false;

        for ch in s.chars() {
            if in_escape {
                if ch.is_ascii_alphabetic() {
                    in_escape = false;
                }
            } else if ch == '\x1b' {
                in_escape = true;
            } else {
                out.push(ch);
            }
        }

        out
    }

    #[test]
    fn renders_items_grouped_by_pharmacy_with_totals() -> TestResult {
        let mut cart = Cart::new(EGP);

        cart.dispatch(CartCommand::LoadCart(vec![
            LineItem::new(LineItemKey::new("a", "nile"), "Paracetamol", 2_500, 2)
                .with_pharmacy_name("Nile Pharmacy")
                .with_delivery_fee(1_500),
            LineItem::new(LineItemKey::new("b", "delta"), "Zinc", 1_000, 1)
                .with_pharmacy_name("Delta Pharmacy")
                .with_original_price(Some(1_200))
                .with_delivery_fee(1_500),
            LineItem::new(LineItemKey::new("c", "nile"), "Vitamin C", 4_000, 1)
                .with_pharmacy_name("Nile Pharmacy"),
        ]));
        cart.dispatch(CartCommand::ApplyPromotion(Promotion::new(
            "SAVE10",
            Decimal::from(10),
        )));

        let mut out = Vec::new();

        Receipt::new(&cart).write_to(&mut out)?;

        let rendered = strip_ansi(&String::from_utf8(out)?);

        let nile = rendered.find("Paracetamol").ok_or("missing paracetamol")?;
        let vitamin = rendered.find("Vitamin C").ok_or("missing vitamin")?;
        let zinc = rendered.find("Zinc").ok_or("missing zinc")?;

        assert!(nile < vitamin && vitamin < zinc, "items grouped by pharmacy");
        assert!(rendered.contains("Discount (SAVE10):"), "{rendered}");
        assert!(rendered.contains("Total:"), "{rendered}");
        assert!(rendered.contains("Savings:"), "{rendered}");

        Ok(())
    }

    #[test]
    fn renders_empty_cart() -> TestResult {
        let cart = Cart::new(EGP);
        let mut out = Vec::new();

        Receipt::new(&cart).write_to(&mut out)?;

        assert!(String::from_utf8(out)?.contains("Cart is empty."));

        Ok(())
    }
}
