// ledger/src/codec.rs
//! Canonical byte form of an [`Asset`].
//!
//! Assets are stored as flat JSON objects. Every field is always written,
//! including zero values, so two versions of the same record have the same
//! shape and can be compared entry by entry in history.

use crate::{Asset, LedgerError};

pub fn encode(asset: &Asset) -> Result<Vec<u8>, LedgerError> {
    serde_json::to_vec(asset).map_err(|e| LedgerError::Encoding(e.to_string()))
}

pub fn decode(bytes: &[u8]) -> Result<Asset, LedgerError> {
    if bytes.is_empty() {
        return Err(LedgerError::Decoding("empty payload".to_string()));
    }

    serde_json::from_slice(bytes).map_err(|e| LedgerError::Decoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Asset {
        Asset::new("D001", "9876543210", "1234")
            .with_balance(1000)
            .with_status("active")
            .with_last_transaction(500, "credit", "Initial deposit")
    }

    #[test]
    fn test_round_trip() {
        let asset = sample();
        let bytes = encode(&asset).unwrap();
        assert_eq!(decode(&bytes).unwrap(), asset);
    }

    #[test]
    fn test_wire_field_names() {
        let bytes = encode(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "balance",
                "dealerID",
                "mpin",
                "msisdn",
                "remarks",
                "status",
                "transAmount",
                "transType",
            ]
        );
    }

    #[test]
    fn test_zero_values_are_written() {
        let bytes = encode(&Asset::new("D003", "", "")).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["balance"], 0);
        assert_eq!(value["transAmount"], 0);
        assert_eq!(value["status"], "");
    }

    #[test]
    fn test_decode_ignores_field_order() {
        let payload = br#"{"remarks":"r","transType":"debit","transAmount":-5,"status":"inactive","balance":-20,"mpin":"0000","msisdn":"123","dealerID":"D9"}"#;
        let asset = decode(payload).unwrap();
        assert_eq!(asset.dealer_id, "D9");
        assert_eq!(asset.balance, -20);
        assert_eq!(asset.trans_amount, -5);
    }

    #[test]
    fn test_decode_rejects_empty_payload() {
        assert!(matches!(decode(b""), Err(LedgerError::Decoding(_))));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(b"not json"), Err(LedgerError::Decoding(_))));
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let payload = br#"{"dealerID":"D1","msisdn":"1","mpin":"2","balance":3,"status":"active","transAmount":0,"transType":""}"#;
        assert!(matches!(decode(payload), Err(LedgerError::Decoding(_))));
    }

    mod prop {
        use crate::Asset;
        use crate::codec::{decode, encode};
        use proptest::prelude::*;

        fn arb_asset() -> impl Strategy<Value = Asset> {
            (
                (any::<String>(), any::<String>(), any::<String>()),
                any::<i64>(),
                any::<String>(),
                any::<i64>(),
                any::<String>(),
                any::<String>(),
            )
                .prop_map(
                    |((dealer_id, msisdn, mpin), balance, status, trans_amount, trans_type, remarks)| {
                        Asset {
                            dealer_id,
                            msisdn,
                            mpin,
                            balance,
                            status,
                            trans_amount,
                            trans_type,
                            remarks,
                        }
                    },
                )
        }

        proptest! {
            #[test]
            fn round_trip_any_asset(asset in arb_asset()) {
                let bytes = encode(&asset).unwrap();
                prop_assert_eq!(decode(&bytes).unwrap(), asset);
            }
        }
    }
}
