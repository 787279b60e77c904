// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic primitives used to derive group parameters, encrypt identifiers and prove
//! knowledge of group secrets.
mod hkdf;
mod rng;
pub mod schnorr;
mod secret;
pub mod sha2;
mod xchacha20;

pub use hkdf::{HkdfError, hkdf};
pub use rng::{Rng, RngError};
pub use secret::Secret;
pub use xchacha20::{
    XAEAD_NONCE_SIZE, XAEAD_TAG_SIZE, XAeadError, XAeadKey, XAeadNonce, x_aead_decrypt,
    x_aead_encrypt,
};
