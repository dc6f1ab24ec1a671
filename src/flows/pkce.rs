// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::auth::Secret;

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// RFC 7636 `S256` challenge method identifier.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// PKCE verifier with its derived `S256` challenge.
#[derive(Clone, Debug)]
pub(crate) struct PkcePair {
	pub(crate) verifier: Secret,
	pub(crate) challenge: String,
}
impl PkcePair {
	pub(crate) fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier: Secret::new(verifier), challenge }
	}
}

/// Fresh CSRF `state` value (32 alphanumeric characters, about 190 bits).
pub(crate) fn generate_state() -> String {
	random_string(STATE_LEN)
}

/// `base64url(sha256(verifier))` without padding.
pub fn compute_pkce_challenge(verifier: &str) -> String {
	let digest = Sha256::digest(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(digest)
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
