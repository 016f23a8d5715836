//! Signed vote ledger.
//!
//! The ledger is the list of choice ids a client has voted for. It lives on
//! the client as `base64url(json) "." base64url(hmac)`, so the server can
//! trust its authenticity without storing anything. Anything that fails to
//! verify decodes to an empty ledger.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use itertools::Itertools;
use sha2::{Digest, Sha256};
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE_NAME: &str = "chosen";

#[derive(Clone)]
pub struct LedgerCodec {
    key: Vec<u8>,
}

impl LedgerCodec {
    pub fn new(secret: &[u8]) -> Self {
        // Salted with the cookie name; a value signed for another cookie must not verify here.
        let key = Sha256::new()
            .chain_update(b"picpoll.signed-cookie.")
            .chain_update(COOKIE_NAME.as_bytes())
            .chain_update(secret)
            .finalize()
            .to_vec();

        Self {
            key,
        }
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        mac.update(payload.as_bytes());
        mac
    }

    pub fn encode(&self, ids: &[i32]) -> String {
        let json = format!("[{}]", ids.iter().join(","));
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&payload).finalize().into_bytes());

        format!("{}.{}", payload, signature)
    }

    pub fn decode(&self, token: &str) -> Vec<i32> {
        let (payload, signature) = match token.split_once('.') {
            None => return Vec::new(),
            Some(v) => v,
        };

        let signature = match URL_SAFE_NO_PAD.decode(signature) {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };

        if self.mac(payload).verify_slice(&signature).is_err() {
            debug!("Rejected vote ledger with a bad signature");
            return Vec::new();
        }

        URL_SAFE_NO_PAD.decode(payload)
            .ok()
            .and_then(|json| serde_json::from_slice::<Vec<i32>>(&json).ok())
            .unwrap_or_default()
    }
}
