//! Cryptographic helpers for cache naming and request signing.
//!
//! Two unrelated jobs live here:
//! - keyed digests that turn a song identity into a stable cache file name
//! - the two-round AES-CBC token scheme WY uses to wrap request payloads

use aes::Aes128;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use cipher::generic_array::GenericArray;
use cipher::{BlockEncrypt, KeyInit};
use hmac::{Hmac, Mac};
use md5::Md5;
use tracing::debug;

use crate::error::{MusicNetError, Result};

type HmacMd5 = Hmac<Md5>;

/// AES cipher block size.
const AES_BLOCK_SIZE: usize = 16;

/// First-round key of the WY token scheme.
const WY_NONCE: &[u8] = b"0CoJUm6Qyw8W8jud";

/// IV shared by both rounds.
const WY_IV: &[u8] = b"0102030405060708";

/// Fixed second-round key.
const WY_SECRET_KEY: &[u8] = b"FFFFFFFFFFFFFFFF";

/// RSA-wrapped form of [`WY_SECRET_KEY`], sent alongside the params.
const WY_ENC_SEC_KEY: &str = "257348aecb5e556c066de214e531faadd1c55d814f9be95fd06d6bff9f4c7a41f831f6394d5a3fd2e3881736d94a02ca919d952872e7d0a50ebfa1769a7a62d512f5f1ca21aec60bc3819a9c3ffca5eca9a0dba6d6f7249b06f5965ecfff3695b54e1c28f3f624750ed39e7de08fc8493242e26dbc4484a01c76f739e135637c";

/// Keyed digest (HMAC-MD5) of `data`, hex encoded.
///
/// The same `(data, key)` pair always yields the same 32-character string,
/// across calls and across process restarts.
pub fn keyed_digest(data: &str, key: &[u8]) -> Result<String> {
    let mut mac = <HmacMd5 as Mac>::new_from_slice(key)
        .map_err(|e| MusicNetError::Crypto(format!("Invalid HMAC key: {}", e)))?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Encrypt `data` with AES-128 in CBC mode and PKCS#7 padding.
pub fn encrypt_aes_cbc(data: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    if key.len() != AES_BLOCK_SIZE {
        return Err(MusicNetError::Crypto(format!(
            "Invalid AES key length: {} (expected 16)",
            key.len()
        )));
    }

    if iv.len() != AES_BLOCK_SIZE {
        return Err(MusicNetError::Crypto(format!(
            "Invalid IV length: {} (expected 16)",
            iv.len()
        )));
    }

    let cipher = Aes128::new_from_slice(key)
        .map_err(|e| MusicNetError::Crypto(format!("Failed to create AES cipher: {}", e)))?;

    // PKCS#7 always appends at least one byte
    let pad = AES_BLOCK_SIZE - data.len() % AES_BLOCK_SIZE;
    let mut result = Vec::with_capacity(data.len() + pad);
    result.extend_from_slice(data);
    result.resize(data.len() + pad, pad as u8);

    let mut prev_block = iv.to_vec();

    for chunk in result.chunks_mut(AES_BLOCK_SIZE) {
        for (byte, prev) in chunk.iter_mut().zip(prev_block.iter()) {
            *byte ^= prev;
        }

        let block = GenericArray::from_mut_slice(chunk);
        cipher.encrypt_block(block);

        prev_block.copy_from_slice(chunk);
    }

    Ok(result)
}

/// Form fields of a WY signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedForm {
    /// Doubly encrypted payload, base64.
    pub params: String,
    /// Wrapped session key.
    pub enc_sec_key: String,
}

impl SignedForm {
    /// Form-encoded key/value pairs in wire order.
    pub fn into_pairs(self) -> Vec<(String, String)> {
        vec![
            ("params".to_string(), self.params),
            ("encSecKey".to_string(), self.enc_sec_key),
        ]
    }
}

/// Wrap a JSON payload into WY's signed form.
pub fn sign_wy_payload(payload: &str) -> Result<SignedForm> {
    let first = encrypt_aes_cbc(payload.as_bytes(), WY_NONCE, WY_IV)?;
    let first = BASE64.encode(first);
    let second = encrypt_aes_cbc(first.as_bytes(), WY_SECRET_KEY, WY_IV)?;

    debug!("Signed WY payload of {} bytes", payload.len());

    Ok(SignedForm {
        params: BASE64.encode(second),
        enc_sec_key: WY_ENC_SEC_KEY.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_digest_rfc2104_vector() {
        let digest = keyed_digest("what do ya want for nothing?", b"Jefe").unwrap();
        assert_eq!(digest, "750c783e6ab0b503eaa86e310a5db738");
    }

    #[test]
    fn test_keyed_digest_depends_on_key() {
        let a = keyed_digest("The Beatles - Yesterday", b"one").unwrap();
        let b = keyed_digest("The Beatles - Yesterday", b"two").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_aes_cbc_fips197_block() {
        let key = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let plain = hex::decode("00112233445566778899aabbccddeeff").unwrap();
        let iv = [0u8; 16];

        let out = encrypt_aes_cbc(&plain, &key, &iv).unwrap();
        // Full block input gains a whole padding block
        assert_eq!(out.len(), 32);
        assert_eq!(hex::encode(&out[..16]), "69c4e0d86a7b0430d8cdb78070b4c55a");
    }

    #[test]
    fn test_aes_cbc_rejects_bad_key() {
        let result = encrypt_aes_cbc(b"data", b"short", WY_IV);
        assert!(matches!(result, Err(MusicNetError::Crypto(_))));
    }

    #[test]
    fn test_sign_wy_payload_is_deterministic() {
        let a = sign_wy_payload(r#"{"s":"Yesterday"}"#).unwrap();
        let b = sign_wy_payload(r#"{"s":"Yesterday"}"#).unwrap();
        assert_eq!(a, b);
        assert!(BASE64.decode(&a.params).is_ok());
        assert_eq!(a.enc_sec_key.len(), 256);
    }
}
