//! LoRaWAN cryptographic operations
//!
//! The MAC engine never runs AES itself; it goes through the [`Crypto`]
//! trait so that a hardware accelerator or secure element can be plugged in.
//! [`DefaultCrypto`] is a software implementation on top of the `aes` and
//! `cmac` crates covering:
//! - Message Integrity Code (MIC) computation
//! - Payload encryption/decryption
//! - Join accept decryption
//! - Session key derivation

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use cmac::{Cmac, Mac};

use crate::config::device::{AESKey, DevAddr};

/// MIC size in bytes
pub const MIC_SIZE: usize = 4;

/// Block size for AES-128
const BLOCK_SIZE: usize = 16;

/// Four byte message integrity code
pub type Mic = [u8; MIC_SIZE];

/// Direction identifiers for cryptographic operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Uplink (device to network)
    Up = 0,
    /// Downlink (network to device)
    Down = 1,
}

/// Cryptographic services consumed by the MAC layer
pub trait Crypto {
    /// Encrypt or decrypt an FRMPayload in place (the operation is its own inverse)
    fn encrypt_payload(
        &self,
        key: &AESKey,
        dev_addr: &DevAddr,
        fcnt: u32,
        dir: Direction,
        payload: &mut [u8],
    );

    /// Compute the MIC of a data frame (`msg` is everything before the MIC)
    fn compute_mic(
        &self,
        key: &AESKey,
        dev_addr: &DevAddr,
        fcnt: u32,
        dir: Direction,
        msg: &[u8],
    ) -> Mic;

    /// Compute the MIC of a join request or join accept
    fn join_mic(&self, key: &AESKey, msg: &[u8]) -> Mic;

    /// Decrypt a join accept body in place; `data.len()` is a multiple of 16
    fn decrypt_join_accept(&self, key: &AESKey, data: &mut [u8]);

    /// Derive (NwkSKey, AppSKey) from the join exchange
    fn derive_session_keys(
        &self,
        app_key: &AESKey,
        app_nonce: &[u8; 3],
        net_id: &[u8; 3],
        dev_nonce: u16,
    ) -> (AESKey, AESKey);

    /// Check a data frame MIC
    fn verify_mic(
        &self,
        key: &AESKey,
        dev_addr: &DevAddr,
        fcnt: u32,
        dir: Direction,
        msg: &[u8],
        mic: &[u8],
    ) -> bool {
        self.compute_mic(key, dev_addr, fcnt, dir, msg)[..] == *mic
    }
}

/// Software AES-128 / AES-CMAC implementation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultCrypto;

impl DefaultCrypto {
    fn cipher(key: &AESKey) -> Aes128 {
        Aes128::new(GenericArray::from_slice(key.as_bytes()))
    }

    fn cmac(key: &AESKey, parts: &[&[u8]]) -> [u8; BLOCK_SIZE] {
        let mut mac = <Cmac<Aes128> as KeyInit>::new(GenericArray::from_slice(key.as_bytes()));
        for part in parts {
            Mac::update(&mut mac, part);
        }
        let tag = Mac::finalize(mac).into_bytes();
        let mut out = [0u8; BLOCK_SIZE];
        out.copy_from_slice(&tag);
        out
    }

    /// A and B0 blocks share the same layout apart from the first and last byte
    fn block(tag: u8, dev_addr: &DevAddr, fcnt: u32, dir: Direction, last: u8) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[0] = tag;
        block[5] = dir as u8;
        block[6..10].copy_from_slice(&dev_addr.to_wire());
        block[10..14].copy_from_slice(&fcnt.to_le_bytes());
        block[15] = last;
        block
    }
}

impl Crypto for DefaultCrypto {
    fn encrypt_payload(
        &self,
        key: &AESKey,
        dev_addr: &DevAddr,
        fcnt: u32,
        dir: Direction,
        payload: &mut [u8],
    ) {
        let cipher = Self::cipher(key);
        for (i, chunk) in payload.chunks_mut(BLOCK_SIZE).enumerate() {
            // Block counter starts at 1
            let mut s = Self::block(0x01, dev_addr, fcnt, dir, (i + 1) as u8);
            cipher.encrypt_block(GenericArray::from_mut_slice(&mut s));
            for (byte, key_byte) in chunk.iter_mut().zip(s.iter()) {
                *byte ^= key_byte;
            }
        }
    }

    fn compute_mic(
        &self,
        key: &AESKey,
        dev_addr: &DevAddr,
        fcnt: u32,
        dir: Direction,
        msg: &[u8],
    ) -> Mic {
        let b0 = Self::block(0x49, dev_addr, fcnt, dir, msg.len() as u8);
        let tag = Self::cmac(key, &[&b0, msg]);
        let mut mic = [0u8; MIC_SIZE];
        mic.copy_from_slice(&tag[..MIC_SIZE]);
        mic
    }

    fn join_mic(&self, key: &AESKey, msg: &[u8]) -> Mic {
        let tag = Self::cmac(key, &[msg]);
        let mut mic = [0u8; MIC_SIZE];
        mic.copy_from_slice(&tag[..MIC_SIZE]);
        mic
    }

    fn decrypt_join_accept(&self, key: &AESKey, data: &mut [u8]) {
        // The network encrypts with AES decrypt, so the device decrypts with AES encrypt
        let cipher = Self::cipher(key);
        for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
            cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
        }
    }

    fn derive_session_keys(
        &self,
        app_key: &AESKey,
        app_nonce: &[u8; 3],
        net_id: &[u8; 3],
        dev_nonce: u16,
    ) -> (AESKey, AESKey) {
        let cipher = Self::cipher(app_key);
        let derive = |prefix: u8| {
            let mut block = [0u8; BLOCK_SIZE];
            block[0] = prefix;
            block[1..4].copy_from_slice(app_nonce);
            block[4..7].copy_from_slice(net_id);
            block[7..9].copy_from_slice(&dev_nonce.to_le_bytes());
            cipher.encrypt_block(GenericArray::from_mut_slice(&mut block));
            AESKey::new(block)
        };
        (derive(0x01), derive(0x02))
    }
}
