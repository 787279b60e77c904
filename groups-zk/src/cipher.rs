// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encryption of member identifiers, profile keys and group attributes.
//!
//! Identifiers and profile keys are encrypted deterministically (synthetic IV): the nonce is a
//! keyed hash of the plaintext. The server can therefore compare ciphertexts for equality, for
//! example to find the pending invite a delete action refers to, without learning who is in
//! the group. Attribute blobs use random nonces.
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::crypto::sha2::sha2_256;
use crate::crypto::{
    Rng, XAEAD_NONCE_SIZE, XAEAD_TAG_SIZE, XAeadNonce, x_aead_decrypt, x_aead_encrypt,
};
use crate::error::ZkGroupError;
use crate::params::GroupSecretParams;
use crate::profile_key::{PROFILE_KEY_LEN, ProfileKey};
use crate::service_id::{FIXED_WIDTH_LEN, ServiceId};

pub const UUID_CIPHERTEXT_LEN: usize = XAEAD_NONCE_SIZE + FIXED_WIDTH_LEN + XAEAD_TAG_SIZE;

pub const PROFILE_KEY_CIPHERTEXT_LEN: usize = XAEAD_NONCE_SIZE + PROFILE_KEY_LEN + XAEAD_TAG_SIZE;

/// Smallest possible attribute blob: nonce and tag around an empty plaintext.
pub const MIN_BLOB_LEN: usize = XAEAD_NONCE_SIZE + XAEAD_TAG_SIZE;

const UID_SIV_PREFIX: &[u8] = b"groups-zk uid siv";

const PROFILE_KEY_SIV_PREFIX: &[u8] = b"groups-zk profile key siv";

/// Encrypted [`ServiceId`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UuidCiphertext(#[serde(with = "serde_bytes")] [u8; UUID_CIPHERTEXT_LEN]);

impl UuidCiphertext {
    pub fn as_bytes(&self) -> &[u8; UUID_CIPHERTEXT_LEN] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl TryFrom<&[u8]> for UuidCiphertext {
    type Error = ZkGroupError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes = value
            .try_into()
            .map_err(|_| ZkGroupError::InvalidLength {
                expected: UUID_CIPHERTEXT_LEN,
                actual: value.len(),
            })?;
        Ok(Self(bytes))
    }
}

/// Encrypted [`ProfileKey`], bound to the identifier of its owner.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileKeyCiphertext(#[serde(with = "serde_bytes")] [u8; PROFILE_KEY_CIPHERTEXT_LEN]);

impl ProfileKeyCiphertext {
    pub fn as_bytes(&self) -> &[u8; PROFILE_KEY_CIPHERTEXT_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for ProfileKeyCiphertext {
    type Error = ZkGroupError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes = value
            .try_into()
            .map_err(|_| ZkGroupError::InvalidLength {
                expected: PROFILE_KEY_CIPHERTEXT_LEN,
                actual: value.len(),
            })?;
        Ok(Self(bytes))
    }
}

#[derive(Clone, Debug)]
pub struct ClientZkGroupCipher {
    group_secret_params: GroupSecretParams,
}

impl ClientZkGroupCipher {
    pub fn new(group_secret_params: GroupSecretParams) -> Self {
        Self {
            group_secret_params,
        }
    }

    pub fn encrypt_service_id(&self, service_id: ServiceId) -> Result<UuidCiphertext, ZkGroupError> {
        let (enc_key, mac_key) = self.group_secret_params.uid_keys();
        let plaintext = service_id.to_fixed_width_bytes();
        let nonce = synthetic_nonce(&[UID_SIV_PREFIX, mac_key, &plaintext]);

        let ciphertext = x_aead_encrypt(enc_key, &plaintext, nonce, Some(self.aad()))?;
        let mut bytes = [0u8; UUID_CIPHERTEXT_LEN];
        bytes[..XAEAD_NONCE_SIZE].copy_from_slice(&nonce);
        bytes[XAEAD_NONCE_SIZE..].copy_from_slice(&ciphertext);
        Ok(UuidCiphertext(bytes))
    }

    pub fn decrypt_service_id(&self, ciphertext: &UuidCiphertext) -> Result<ServiceId, ZkGroupError> {
        let (enc_key, mac_key) = self.group_secret_params.uid_keys();
        let (nonce, ciphertext_tag) = split_nonce(ciphertext.as_bytes());

        let plaintext = x_aead_decrypt(enc_key, ciphertext_tag, nonce, Some(self.aad()))
            .map_err(|_| ZkGroupError::VerificationFailed)?;
        let plaintext: [u8; FIXED_WIDTH_LEN] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| ZkGroupError::VerificationFailed)?;

        // The nonce must have been derived from this very plaintext.
        let expected_nonce = synthetic_nonce(&[UID_SIV_PREFIX, mac_key, &plaintext]);
        if !bool::from(expected_nonce.ct_eq(&nonce)) {
            return Err(ZkGroupError::VerificationFailed);
        }

        Ok(ServiceId::from_fixed_width_bytes(&plaintext)?)
    }

    pub fn encrypt_profile_key(
        &self,
        profile_key: &ProfileKey,
        aci: Uuid,
    ) -> Result<ProfileKeyCiphertext, ZkGroupError> {
        let (enc_key, mac_key) = self.group_secret_params.profile_key_keys();
        let nonce = synthetic_nonce(&[
            PROFILE_KEY_SIV_PREFIX,
            mac_key,
            aci.as_bytes(),
            profile_key.as_bytes(),
        ]);

        let ciphertext = x_aead_encrypt(
            enc_key,
            profile_key.as_bytes(),
            nonce,
            Some(&self.profile_key_aad(aci)),
        )?;
        let mut bytes = [0u8; PROFILE_KEY_CIPHERTEXT_LEN];
        bytes[..XAEAD_NONCE_SIZE].copy_from_slice(&nonce);
        bytes[XAEAD_NONCE_SIZE..].copy_from_slice(&ciphertext);
        Ok(ProfileKeyCiphertext(bytes))
    }

    pub fn decrypt_profile_key(
        &self,
        ciphertext: &ProfileKeyCiphertext,
        aci: Uuid,
    ) -> Result<ProfileKey, ZkGroupError> {
        let (enc_key, mac_key) = self.group_secret_params.profile_key_keys();
        let (nonce, ciphertext_tag) = split_nonce(ciphertext.as_bytes());

        let plaintext = x_aead_decrypt(
            enc_key,
            ciphertext_tag,
            nonce,
            Some(&self.profile_key_aad(aci)),
        )
        .map_err(|_| ZkGroupError::VerificationFailed)?;
        let profile_key = ProfileKey::try_from(plaintext.as_slice())?;

        let expected_nonce = synthetic_nonce(&[
            PROFILE_KEY_SIV_PREFIX,
            mac_key,
            aci.as_bytes(),
            profile_key.as_bytes(),
        ]);
        if !bool::from(expected_nonce.ct_eq(&nonce)) {
            return Err(ZkGroupError::VerificationFailed);
        }

        Ok(profile_key)
    }

    /// Encrypts a group attribute (title, description, timer) with a fresh random nonce.
    pub fn encrypt_blob(&self, rng: &Rng, plaintext: &[u8]) -> Result<Vec<u8>, ZkGroupError> {
        let nonce: XAeadNonce = rng.random_array()?;
        let ciphertext = x_aead_encrypt(
            self.group_secret_params.blob_key(),
            plaintext,
            nonce,
            Some(self.aad()),
        )?;

        let mut bytes = Vec::with_capacity(XAEAD_NONCE_SIZE + ciphertext.len());
        bytes.extend_from_slice(&nonce);
        bytes.extend_from_slice(&ciphertext);
        Ok(bytes)
    }

    pub fn decrypt_blob(&self, bytes: &[u8]) -> Result<Vec<u8>, ZkGroupError> {
        if bytes.len() < MIN_BLOB_LEN {
            return Err(ZkGroupError::InvalidLength {
                expected: MIN_BLOB_LEN,
                actual: bytes.len(),
            });
        }

        let (nonce, ciphertext_tag) = split_nonce(bytes);
        x_aead_decrypt(
            self.group_secret_params.blob_key(),
            ciphertext_tag,
            nonce,
            Some(self.aad()),
        )
        .map_err(|_| ZkGroupError::VerificationFailed)
    }

    fn aad(&self) -> &[u8] {
        self.group_secret_params.group_identifier_bytes()
    }

    fn profile_key_aad(&self, aci: Uuid) -> Vec<u8> {
        let mut aad = self.aad().to_vec();
        aad.extend_from_slice(aci.as_bytes());
        aad
    }
}

fn synthetic_nonce(messages: &[&[u8]]) -> XAeadNonce {
    let digest = sha2_256(messages);
    let mut nonce = [0u8; XAEAD_NONCE_SIZE];
    nonce.copy_from_slice(&digest[..XAEAD_NONCE_SIZE]);
    nonce
}

/// Splits `nonce || ciphertext || tag`. Callers check the minimum length.
fn split_nonce(bytes: &[u8]) -> (XAeadNonce, &[u8]) {
    let mut nonce = [0u8; XAEAD_NONCE_SIZE];
    nonce.copy_from_slice(&bytes[..XAEAD_NONCE_SIZE]);
    (nonce, &bytes[XAEAD_NONCE_SIZE..])
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use uuid::Uuid;

    use crate::crypto::Rng;
    use crate::{GroupSecretParams, ProfileKey, ServiceId, ZkGroupError};

    use super::{ClientZkGroupCipher, UUID_CIPHERTEXT_LEN, UuidCiphertext};

    fn group_cipher(seed: u8) -> ClientZkGroupCipher {
        let rng = Rng::from_seed([seed; 32]);
        ClientZkGroupCipher::new(GroupSecretParams::generate(&rng).unwrap())
    }

    #[test]
    fn service_id_encryption_is_deterministic() {
        let cipher = group_cipher(1);
        let aci = ServiceId::Aci(Uuid::from_bytes([1; 16]));
        let pni = ServiceId::Pni(Uuid::from_bytes([1; 16]));

        let ciphertext = cipher.encrypt_service_id(aci).unwrap();
        assert_eq!(ciphertext, cipher.encrypt_service_id(aci).unwrap());
        assert_ne!(ciphertext, cipher.encrypt_service_id(pni).unwrap());

        assert_eq!(cipher.decrypt_service_id(&ciphertext).unwrap(), aci);
        let pni_ciphertext = cipher.encrypt_service_id(pni).unwrap();
        assert_eq!(cipher.decrypt_service_id(&pni_ciphertext).unwrap(), pni);
    }

    #[test]
    fn foreign_ciphertexts_do_not_decrypt() {
        let cipher_1 = group_cipher(1);
        let cipher_2 = group_cipher(2);
        let aci = ServiceId::Aci(Uuid::from_bytes([1; 16]));

        let ciphertext = cipher_1.encrypt_service_id(aci).unwrap();
        assert_matches!(
            cipher_2.decrypt_service_id(&ciphertext),
            Err(ZkGroupError::VerificationFailed)
        );

        let mut tampered = *ciphertext.as_bytes();
        tampered[30] ^= 1;
        let tampered = UuidCiphertext::try_from(&tampered[..]).unwrap();
        assert_matches!(
            cipher_1.decrypt_service_id(&tampered),
            Err(ZkGroupError::VerificationFailed)
        );
    }

    #[test]
    fn ciphertext_length_is_checked() {
        assert_matches!(
            UuidCiphertext::try_from(&[0u8; 16][..]),
            Err(ZkGroupError::InvalidLength {
                expected: UUID_CIPHERTEXT_LEN,
                actual: 16
            })
        );
    }

    #[test]
    fn profile_key_is_bound_to_owner() {
        let rng = Rng::from_seed([3; 32]);
        let cipher = group_cipher(1);
        let profile_key = ProfileKey::generate(&rng).unwrap();
        let alice = Uuid::from_bytes([1; 16]);
        let bob = Uuid::from_bytes([2; 16]);

        let ciphertext = cipher.encrypt_profile_key(&profile_key, alice).unwrap();
        assert_eq!(
            cipher.decrypt_profile_key(&ciphertext, alice).unwrap(),
            profile_key
        );
        assert_matches!(
            cipher.decrypt_profile_key(&ciphertext, bob),
            Err(ZkGroupError::VerificationFailed)
        );
    }

    #[test]
    fn blobs() {
        let rng = Rng::from_seed([3; 32]);
        let cipher = group_cipher(1);

        let blob_1 = cipher.encrypt_blob(&rng, b"Rehearsal room").unwrap();
        let blob_2 = cipher.encrypt_blob(&rng, b"Rehearsal room").unwrap();
        assert_ne!(blob_1, blob_2);
        assert_eq!(cipher.decrypt_blob(&blob_1).unwrap(), b"Rehearsal room");

        assert_matches!(
            cipher.decrypt_blob(&blob_1[..10]),
            Err(ZkGroupError::InvalidLength { .. })
        );
        assert_matches!(
            group_cipher(2).decrypt_blob(&blob_1),
            Err(ZkGroupError::VerificationFailed)
        );
    }
}
