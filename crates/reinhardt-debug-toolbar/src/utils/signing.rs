//! Integrity hashes for store ids handed to the browser
//!
//! The history views accept a store id together with a hex HMAC-SHA256 of
//! that id keyed by [`ToolbarConfig::secret_key`]. Verification uses the
//! constant-time comparison of [`hmac::Mac::verify_slice`].
//!
//! [`ToolbarConfig::secret_key`]: crate::ToolbarConfig::secret_key

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret_key: &str, store_id: &str) -> HmacSha256 {
	let mut mac =
		HmacSha256::new_from_slice(secret_key.as_bytes()).expect("HMAC accepts any key length");
	mac.update(store_id.as_bytes());
	mac
}

/// Hex-encoded signature of `store_id`
pub fn sign_store_id(secret_key: &str, store_id: &str) -> String {
	hex::encode(mac(secret_key, store_id).finalize().into_bytes())
}

/// Whether `hash` is the signature of `store_id` under `secret_key`
pub fn verify_store_id(secret_key: &str, store_id: &str, hash: &str) -> bool {
	let Ok(expected) = hex::decode(hash) else {
		return false;
	};
	mac(secret_key, store_id).verify_slice(&expected).is_ok()
}
