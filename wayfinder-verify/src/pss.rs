use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::pss::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use rsa::{BigUint, RsaPublicKey};
use sha2::Sha256;
use wayfinder_core::WayfinderError;

/// Verifies an Arweave-style RSA-PSS (SHA-256, salt length = digest length)
/// signature, given the base64url-encoded public modulus (`owner`) and
/// signature, over an already-computed `deepHash` message digest.
pub fn verify_pss(owner_b64url: &str, signature_b64url: &str, message: &[u8]) -> Result<(), WayfinderError> {
    let modulus_bytes = URL_SAFE_NO_PAD
        .decode(owner_b64url)
        .map_err(|e| WayfinderError::verification_failed(format!("invalid owner encoding: {e}")))?;
    let signature_bytes = URL_SAFE_NO_PAD
        .decode(signature_b64url)
        .map_err(|e| WayfinderError::verification_failed(format!("invalid signature encoding: {e}")))?;

    let modulus = BigUint::from_bytes_be(&modulus_bytes);
    let exponent = BigUint::from(65537u32);
    let public_key = RsaPublicKey::new(modulus, exponent)
        .map_err(|e| WayfinderError::verification_failed(format!("invalid RSA public key: {e}")))?;

    let verifying_key = VerifyingKey::<Sha256>::new(public_key);
    let signature = Signature::try_from(signature_bytes.as_slice())
        .map_err(|e| WayfinderError::verification_failed(format!("malformed signature: {e}")))?;

    verifying_key
        .verify(message, &signature)
        .map_err(|e| WayfinderError::verification_failed(format!("signature verification failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pss::SigningKey;
    use rsa::signature::{RandomizedSigner, SignatureEncoding};
    use rsa::traits::PublicKeyParts;
    use rsa::RsaPrivateKey;

    #[test]
    fn test_valid_signature_verifies() {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        let owner_b64 = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());

        let signing_key = SigningKey::<Sha256>::new(private_key);
        let message = b"deterministic-message-digest";
        let signature = signing_key.sign_with_rng(&mut rng, message);
        let signature_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());

        assert!(verify_pss(&owner_b64, &signature_b64, message).is_ok());
    }

    #[test]
    fn test_tampered_message_fails() {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        let owner_b64 = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());

        let signing_key = SigningKey::<Sha256>::new(private_key);
        let message = b"deterministic-message-digest";
        let signature = signing_key.sign_with_rng(&mut rng, message);
        let signature_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());

        assert!(verify_pss(&owner_b64, &signature_b64, b"different-message").is_err());
    }
}
