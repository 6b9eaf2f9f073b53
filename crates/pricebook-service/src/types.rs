use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A payment method supported by a pricing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Credit/debit card checkout.
    Card,
    /// A wallet-style provider (Apple Pay, Google Pay, and friends).
    Wallet,
    /// Direct bank transfer.
    Bank,
    /// A method this build does not know about yet.
    ///
    /// The server may start advertising new methods at any time; those must
    /// not fail deserialization of the whole price book.
    #[serde(other)]
    Unknown,
}

/// A single subscription/donation pricing tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// The price in minor units of the tier's currency.
    pub amount: u64,
    /// The payment methods this tier can be purchased with.
    #[serde(default)]
    pub payment_methods: Vec<PaymentMethod>,
}

/// The remotely-fetched pricing configuration, keyed by currency/tier
/// identifier.
///
/// The service caches this wholesale and otherwise only looks at the payment
/// methods when deriving the supported subset.
pub type PriceBook = BTreeMap<String, Tier>;
