//! # Listing Payload
//!
//! A listing call built from its four values classifies back to the same
//! values.

#[cfg(test)]
mod tests {
    use esc_04_extrinsic_classifier::{
        classify, decode_listing_payload, encode_listing_payload, ClassifierContext,
        EscrowAction, ListingPayload,
    };
    use esc_06_reconciliation::test_utils::{BlockBuilder, ALICE, ESCROW_ADMIN, MATCHER};
    use proptest::prelude::*;
    use shared_types::Balance;

    #[test]
    fn test_listing_call_classifies_to_its_values() {
        let price = 1_000_000_000_000u128;
        let block = BlockBuilder::new(7).listing(ALICE, 3, 18, 2, price).build();
        let ctx = ClassifierContext::new(ESCROW_ADMIN, MATCHER);

        let action = classify(&block.extrinsics[0], 0, &block.events, &ctx)
            .unwrap()
            .unwrap();
        assert_eq!(
            action,
            EscrowAction::AskPlaced {
                seller: ALICE,
                collection_id: 3,
                token_id: 18,
                quote_id: 2,
                price: Balance::from(price),
            }
        );
    }

    proptest! {
        #[test]
        fn prop_payload_survives_encoding(
            collection_id in any::<u64>(),
            token_id in any::<u64>(),
            quote_id in any::<u64>(),
            price in any::<u128>(),
        ) {
            let payload = ListingPayload { collection_id, token_id, quote_id, price };
            let decoded = decode_listing_payload(&encode_listing_payload(&payload)).unwrap();
            prop_assert_eq!(decoded, payload);
        }
    }
}
