//! Instant payment notification signatures.
//!
//! NowPayments signs each callback with HMAC-SHA512 over the JSON body with
//! its keys sorted, hex-encoded in the `x-nowpayments-sig` header.

use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha512;
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

pub const SIGNATURE_HEADER: &str = "x-nowpayments-sig";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IpnError {
    #[error("missing x-nowpayments-sig header")]
    MissingSignature,
    #[error("invalid signature format")]
    InvalidSignatureFormat,
    #[error("invalid IPN secret configuration")]
    InvalidSecret,
    #[error("signature verification failed")]
    SignatureMismatch,
}

/// Rebuilds `value` with every object's keys in lexical order.
pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

fn mac_for(secret: &str, payload: &Value) -> Result<HmacSha512, IpnError> {
    let canonical = sort_keys(payload).to_string();
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| IpnError::InvalidSecret)?;
    mac.update(canonical.as_bytes());
    Ok(mac)
}

pub fn sign(secret: &str, payload: &Value) -> Result<String, IpnError> {
    Ok(hex::encode(mac_for(secret, payload)?.finalize().into_bytes()))
}

/// Constant-time check of `signature` against the payload.
pub fn verify(secret: &str, payload: &Value, signature: &str) -> Result<(), IpnError> {
    let expected = hex::decode(signature.trim()).map_err(|_| IpnError::InvalidSignatureFormat)?;
    mac_for(secret, payload)?
        .verify_slice(&expected)
        .map_err(|_| IpnError::SignatureMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_recursively() {
        let value = json!({"b": 1, "a": {"d": [ {"z": 1, "y": 2} ], "c": null}});
        assert_eq!(
            sort_keys(&value).to_string(),
            r#"{"a":{"c":null,"d":[{"y":2,"z":1}]},"b":1}"#
        );
    }

    #[test]
    fn signature_round_trip_ignores_key_order() {
        let payload = json!({"payment_status": "finished", "order_id": "RM-1"});
        let signature = sign("ipn-secret", &payload).unwrap();

        let reordered: Value =
            serde_json::from_str(r#"{"order_id":"RM-1","payment_status":"finished"}"#).unwrap();
        assert!(verify("ipn-secret", &reordered, &signature).is_ok());
    }

    #[test]
    fn tampered_payloads_and_bad_hex_are_rejected() {
        let payload = json!({"payment_status": "finished", "order_id": "RM-1"});
        let signature = sign("ipn-secret", &payload).unwrap();

        let tampered = json!({"payment_status": "finished", "order_id": "RM-2"});
        assert_eq!(
            verify("ipn-secret", &tampered, &signature),
            Err(IpnError::SignatureMismatch)
        );
        assert_eq!(
            verify("ipn-secret", &payload, "zz-not-hex"),
            Err(IpnError::InvalidSignatureFormat)
        );
        assert_eq!(
            verify("other-secret", &payload, &signature),
            Err(IpnError::SignatureMismatch)
        );
    }
}
