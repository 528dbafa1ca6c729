use crate::crypto;
use aes::Aes256;
use cipher::block_padding::Pkcs7;
use cipher::{BlockDecryptMut, KeyIvInit};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum BlockCipherError {
    #[error("Invalid length for IV")]
    InvalidIvLength(#[from] cipher::crypto_common::InvalidLength),
    #[error("Ciphertext has invalid length or padding")]
    Unpad,
}

/// Decrypt an AES 256 CBC ciphertext and strip its PKCS#7 padding
pub(crate) fn decrypt_cbc(
    key: &crypto::CipherKey,
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, BlockCipherError> {
    let decryptor = cbc::Decryptor::<Aes256>::new_from_slices(key.as_bytes(), iv)?;
    let mut buffer = ciphertext.to_vec();
    let plaintext_len = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|_| BlockCipherError::Unpad)?
        .len();
    buffer.truncate(plaintext_len);
    Ok(buffer)
}
