//! AES-128-CBC segment decryption with sequence-derived IV (C9).

use aes::cipher::{BlockDecryptMut, KeyIvInit};
use block_padding::Pkcs7;
use thiserror::Error;

pub const KEY_LEN: usize = 16;
pub const IV_LEN: usize = 16;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

#[derive(Debug, Error)]
#[error("AES-128-CBC decryption failed (padding or block-size mismatch)")]
pub struct DecryptError;

/// HLS convention IV: 8 zero bytes followed by the 8-byte big-endian
/// encoding of the segment index, per §4.8/§8 invariant 3.
pub fn sequence_iv(segment_index: u64) -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    iv[8..].copy_from_slice(&segment_index.to_be_bytes());
    iv
}

/// Decrypt `ciphertext` with `key`, using `explicit_iv` verbatim when present
/// (per the spec's decision to honour it), otherwise the sequence-derived
/// IV for `segment_index`.
///
/// Returns `Err(DecryptError)` on a padding/format error; callers decide
/// whether to fall back to the raw ciphertext (the documented degraded-mode
/// policy — see §7/§9).
pub fn decrypt(
    ciphertext: &[u8],
    key: &[u8; KEY_LEN],
    explicit_iv: Option<[u8; IV_LEN]>,
    segment_index: u64,
) -> Result<Vec<u8>, DecryptError> {
    let iv = explicit_iv.unwrap_or_else(|| sequence_iv(segment_index));
    let cipher = Aes128CbcDec::new(key.into(), &iv.into());
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| DecryptError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::{BlockEncryptMut, KeyIvInit as _};

    type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

    fn encrypt(plaintext: &[u8], key: &[u8; KEY_LEN], iv: [u8; IV_LEN]) -> Vec<u8> {
        let cipher = Aes128CbcEnc::new(key.into(), &iv.into());
        cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    #[test]
    fn sequence_iv_is_eight_zero_bytes_then_be_u64_index() {
        let iv = sequence_iv(2);
        assert_eq!(
            iv,
            [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2]
        );
    }

    #[test]
    fn decrypts_what_was_encrypted_with_sequence_iv() {
        let key = [0x01u8; KEY_LEN];
        let plaintext = b"hello hls segment payload, padded to more than one block!!";
        let iv = sequence_iv(2);
        let ciphertext = encrypt(plaintext, &key, iv);

        let decrypted = decrypt(&ciphertext, &key, None, 2).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn honours_explicit_iv_over_sequence_derived_one() {
        let key = [0x02u8; KEY_LEN];
        let plaintext = b"explicit iv must win over the sequence-derived default";
        let explicit_iv = [0xAAu8; IV_LEN];
        let ciphertext = encrypt(plaintext, &key, explicit_iv);

        // Sequence-derived IV (wrong one) must NOT decrypt correctly...
        let wrong = decrypt(&ciphertext, &key, None, 7);
        assert_ne!(wrong.ok(), Some(plaintext.to_vec()));

        // ...while the explicit IV does.
        let right = decrypt(&ciphertext, &key, Some(explicit_iv), 7).unwrap();
        assert_eq!(right, plaintext);
    }

    #[test]
    fn bad_ciphertext_length_is_a_decrypt_error() {
        let key = [0x03u8; KEY_LEN];
        let bad = vec![1, 2, 3]; // not a multiple of the block size
        assert!(decrypt(&bad, &key, None, 0).is_err());
    }
}
