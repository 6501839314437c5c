//! Medcart prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{Cart, CartCommand, Compensation, Generations, PriceUpdate, Ticket, Transition},
    catalog::{Catalog, CatalogError},
    items::{
        DEFAULT_QUANTITY_CAP, LineItem, LineItemKey, ParseKeyError,
        factory::{ItemFactoryError, PLACEHOLDER_PHARMACY_ID, create_line_item},
    },
    merge::{MergeOutcome, MergePolicy, merge_carts},
    money::{AmountError, currency, major_units, minor_units},
    orders::{OrderAssemblyError, OrderDraft, OrderLine, assemble_order},
    prescriptions::PrescriptionGroups,
    pricing::{CartTotals, DEFAULT_DELIVERY_FEE, FREE_DELIVERY_THRESHOLD, compute_totals},
    products::{Offer, Product},
    promotions::Promotion,
    receipt::{Receipt, ReceiptError},
    snapshot::{CartSnapshot, SnapshotError},
};
