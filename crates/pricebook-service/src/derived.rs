use crate::types::{PaymentMethod, PriceBook};

/// The payment methods the client checkout flow can actually handle.
const ACCEPTED_METHODS: &[PaymentMethod] = &[PaymentMethod::Card, PaymentMethod::Wallet];

/// Filters a price book down to the tiers purchasable by this client.
///
/// A tier is kept if any of its payment methods is in the accepted set.
pub fn supported_tiers(book: &PriceBook) -> PriceBook {
    book.iter()
        .filter(|(_, tier)| {
            tier.payment_methods
                .iter()
                .any(|method| ACCEPTED_METHODS.contains(method))
        })
        .map(|(id, tier)| (id.clone(), tier.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tier;

    fn tier(methods: &[PaymentMethod]) -> Tier {
        Tier {
            amount: 500,
            payment_methods: methods.to_vec(),
        }
    }

    #[test]
    fn keeps_tiers_with_an_accepted_method() {
        let book = PriceBook::from_iter([
            ("a".to_owned(), tier(&[PaymentMethod::Card])),
            ("b".to_owned(), tier(&[PaymentMethod::Bank])),
            ("c".to_owned(), tier(&[PaymentMethod::Wallet])),
        ]);

        let supported = supported_tiers(&book);
        let ids: Vec<_> = supported.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn drops_unknown_only_and_empty_tiers() {
        let book = PriceBook::from_iter([
            ("none".to_owned(), tier(&[])),
            ("new".to_owned(), tier(&[PaymentMethod::Unknown])),
            (
                "mixed".to_owned(),
                tier(&[PaymentMethod::Bank, PaymentMethod::Card]),
            ),
        ]);

        let supported = supported_tiers(&book);
        let ids: Vec<_> = supported.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["mixed"]);
    }
}
