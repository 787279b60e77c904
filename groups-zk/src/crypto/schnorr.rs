// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schnorr signatures over the Ristretto group.
//!
//! The group uses them to prove that a presentation was created with the group's secret
//! parameters, the server uses them to notarise group changes and issue credentials.
use std::fmt;

use curve25519_dalek::Scalar;
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_TABLE;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::crypto::sha2::sha2_512;
use crate::crypto::{Rng, RngError, Secret};

/// 512-bit signature.
pub const SIGNATURE_SIZE: usize = 64;

/// Compressed Ristretto point.
pub const VERIFYING_KEY_SIZE: usize = 32;

const NONCE_PREFIX: &[u8] = b"groups-zk schnorr nonce";

const CHALLENGE_PREFIX: &[u8] = b"groups-zk schnorr challenge";

/// Secret scalar of a Schnorr key pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey(Secret<32>);

impl SigningKey {
    /// Reduces 64 bytes of uniformly random key material into a scalar.
    pub fn from_wide_bytes(bytes: &[u8; 64]) -> Self {
        let scalar = Scalar::from_bytes_mod_order_wide(bytes);
        Self(Secret::from_bytes(scalar.to_bytes()))
    }

    fn scalar(&self) -> Scalar {
        Scalar::from_bytes_mod_order(*self.0.as_bytes())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey((&self.scalar() * RISTRETTO_BASEPOINT_TABLE).compress().to_bytes())
    }
}

/// Public counterpart of a [`SigningKey`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerifyingKey(#[serde(with = "serde_bytes")] [u8; VERIFYING_KEY_SIZE]);

impl VerifyingKey {
    pub fn from_bytes(bytes: [u8; VERIFYING_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; VERIFYING_KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl fmt::Display for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Schnorr signature `R || s`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "serde_bytes")] [u8; SIGNATURE_SIZE]);

impl Signature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; SIGNATURE_SIZE] {
        self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = SchnorrError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; SIGNATURE_SIZE] =
            value.try_into().map_err(|_| SchnorrError::InvalidArgument)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Signs with a nonce hedged by 64 bytes of fresh randomness.
pub fn schnorr_sign(
    bytes: &[u8],
    signing_key: &SigningKey,
    rng: &Rng,
) -> Result<Signature, SchnorrError> {
    let cap_z: [u8; 64] = rng.random_array()?;
    Ok(sign_with_entropy(bytes, signing_key, &cap_z))
}

/// Signs with a nonce derived from the secret key and message only.
///
/// Signing the same bytes twice yields the same signature.
pub fn schnorr_sign_deterministic(bytes: &[u8], signing_key: &SigningKey) -> Signature {
    sign_with_entropy(bytes, signing_key, &[])
}

fn sign_with_entropy(bytes: &[u8], signing_key: &SigningKey, cap_z: &[u8]) -> Signature {
    let a = signing_key.scalar();
    let cap_a = signing_key.verifying_key();

    // r = hash(prefix || a || M || Z) (mod q)
    let r = Scalar::from_bytes_mod_order_wide(&sha2_512(&[
        NONCE_PREFIX,
        a.as_bytes(),
        bytes,
        cap_z,
    ]));

    // R = rB
    let cap_r = (&r * RISTRETTO_BASEPOINT_TABLE).compress();

    // h = hash(prefix || R || A || M) (mod q)
    let h = challenge(cap_r.as_bytes(), cap_a.as_bytes(), bytes);

    // s = r + ha (mod q)
    let s = r + (h * a);

    let mut result = [0u8; SIGNATURE_SIZE];
    result[..32].copy_from_slice(cap_r.as_bytes());
    result[32..].copy_from_slice(s.as_bytes());
    Signature(result)
}

pub fn schnorr_verify(
    bytes: &[u8],
    verifying_key: &VerifyingKey,
    signature: &Signature,
) -> Result<(), SchnorrError> {
    let cap_a = CompressedRistretto(*verifying_key.as_bytes())
        .decompress()
        .ok_or(SchnorrError::InvalidArgument)?;

    let mut cap_r = [0u8; 32];
    cap_r.copy_from_slice(&signature.as_bytes()[..32]);
    let mut s = [0u8; 32];
    s.copy_from_slice(&signature.as_bytes()[32..]);

    // Reject non-canonical s.
    let s = Option::<Scalar>::from(Scalar::from_canonical_bytes(s))
        .ok_or(SchnorrError::InvalidArgument)?;

    let h = challenge(&cap_r, verifying_key.as_bytes(), bytes);

    // Rcheck = sB - hA
    let cap_r_check = RistrettoPoint::vartime_double_scalar_mul_basepoint(&(-h), &cap_a, &s);

    if bool::from(cap_r_check.compress().as_bytes().ct_eq(&cap_r)) {
        Ok(())
    } else {
        Err(SchnorrError::VerificationFailed)
    }
}

fn challenge(cap_r: &[u8; 32], cap_a: &[u8; 32], bytes: &[u8]) -> Scalar {
    Scalar::from_bytes_mod_order_wide(&sha2_512(&[CHALLENGE_PREFIX, cap_r, cap_a, bytes]))
}

#[derive(Debug, Error)]
pub enum SchnorrError {
    #[error(transparent)]
    Rng(#[from] RngError),

    #[error("invalid schnorr verifying key or signature")]
    InvalidArgument,

    #[error("signature does not match verifying key and bytes")]
    VerificationFailed,
}
