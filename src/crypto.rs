//! Field-level encryption for comment text at rest.
//!
//! Values are sealed into an envelope of the form `ivHex:cipherHex` using
//! AES-256-CBC with PKCS#7 padding. The key is derived from the configured
//! secret with scrypt (N=16384, r=8, p=1) and the fixed salt `"salt"`, which
//! keeps existing envelopes readable.
//!
//! The empty string is a sentinel: it encrypts to `""` and decrypts to `""`.

use aes::Aes256;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use anyhow::{Result, anyhow};
use rand::RngCore;
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;

const KDF_SALT: &[u8] = b"salt";
const KDF_LOG_N: u8 = 14;
const KDF_R: u32 = 8;
const KDF_P: u32 = 1;

/// Development-only fallback secret. Anything sealed with it is readable by
/// anyone holding this source file.
pub const INSECURE_DEV_SECRET: &str = "default-key-exactly-32-bytes-long!!";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("envelope has no ':' separator")]
    MissingSeparator,

    #[error("initialization vector is not valid hex")]
    InvalidIvHex,

    #[error("ciphertext is not valid hex")]
    InvalidCiphertextHex,

    #[error("initialization vector must be 16 bytes, got {0}")]
    InvalidIvLength(usize),

    #[error("ciphertext does not decrypt under the configured key")]
    BadPadding,

    #[error("decrypted bytes are not valid UTF-8")]
    InvalidUtf8,
}

pub struct FieldCodec {
    key: [u8; KEY_LEN],
}

impl FieldCodec {
    pub fn new(secret: &str) -> Result<Self> {
        let params = scrypt::Params::new(KDF_LOG_N, KDF_R, KDF_P, KEY_LEN)
            .map_err(|e| anyhow!("Invalid key derivation parameters: {e}"))?;

        let mut key = [0u8; KEY_LEN];
        scrypt::scrypt(secret.as_bytes(), KDF_SALT, &params, &mut key)
            .map_err(|e| anyhow!("Failed to derive field encryption key: {e}"))?;

        Ok(Self { key })
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        if plaintext.is_empty() {
            return String::new();
        }

        let mut iv = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        format!("{}:{}", hex::encode(iv), hex::encode(ciphertext))
    }

    pub fn decrypt(&self, envelope: &str) -> Result<String, DecryptionError> {
        if envelope.is_empty() {
            return Ok(String::new());
        }

        let (iv_hex, cipher_hex) = envelope
            .split_once(':')
            .ok_or(DecryptionError::MissingSeparator)?;

        let iv = hex::decode(iv_hex).map_err(|_| DecryptionError::InvalidIvHex)?;
        let iv: [u8; IV_LEN] = iv
            .as_slice()
            .try_into()
            .map_err(|_| DecryptionError::InvalidIvLength(iv.len()))?;
        let ciphertext =
            hex::decode(cipher_hex).map_err(|_| DecryptionError::InvalidCiphertextHex)?;

        let plaintext = Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| DecryptionError::BadPadding)?;

        String::from_utf8(plaintext).map_err(|_| DecryptionError::InvalidUtf8)
    }
}

impl std::fmt::Debug for FieldCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCodec").finish_non_exhaustive()
    }
}
