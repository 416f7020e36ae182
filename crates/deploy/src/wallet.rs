//! Signing keys and legacy transaction signing.

use std::str::FromStr;

use alloy_core::{
    primitives::{Address, B256, Bytes, U256, keccak256},
    rlp::{EMPTY_STRING_CODE, Encodable, Header},
};
use alloy_signer::SignerSync;
use alloy_signer_local::{MnemonicBuilder, PrivateKeySigner, coins_bip39::English};
use anyhow::{Context, Result};

/// Mnemonic used by local development nodes (hardhat, anvil) for their funded accounts.
pub const DEV_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// A local signer together with its account address.
#[derive(Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
    address: Address,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Recoverable signature components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawSignature {
    pub y_parity: bool,
    pub r: U256,
    pub s: U256,
}

impl Wallet {
    fn from_signer(signer: PrivateKeySigner) -> Self {
        let address = Address::from(signer.address().0.0);
        Self { signer, address }
    }

    /// Build a wallet from a raw 32-byte secret key.
    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        let signer = PrivateKeySigner::from_slice(secret).context("Invalid secp256k1 secret key")?;
        Ok(Self::from_signer(signer))
    }

    /// Build a wallet from a hex-encoded secret key, with or without a `0x` prefix.
    pub fn from_hex(secret: &str) -> Result<Self> {
        let signer = PrivateKeySigner::from_str(secret.trim()).context("Invalid hex secret key")?;
        Ok(Self::from_signer(signer))
    }

    /// Derive the account at `index` on the standard BIP-44 Ethereum path.
    pub fn from_mnemonic(phrase: &str, index: u32) -> Result<Self> {
        let signer = MnemonicBuilder::<English>::default()
            .phrase(phrase)
            .index(index)
            .context("Invalid derivation index")?
            .build()
            .context("Failed to derive key from mnemonic")?;
        Ok(Self::from_signer(signer))
    }

    /// One of the accounts pre-funded by local development nodes.
    pub fn dev_account(index: u32) -> Result<Self> {
        Self::from_mnemonic(DEV_MNEMONIC, index)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The raw secret key bytes. Only used to write encrypted credentials.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signer.credential().to_bytes().into()
    }

    pub(crate) fn sign_prehash(&self, hash: &B256) -> Result<RawSignature> {
        let signature = self
            .signer
            .sign_hash_sync(&hash.0.into())
            .context("Failed to sign transaction hash")?;
        Ok(RawSignature {
            y_parity: signature.v(),
            r: U256::from_be_bytes::<32>(signature.r().to_be_bytes::<32>()),
            s: U256::from_be_bytes::<32>(signature.s().to_be_bytes::<32>()),
        })
    }

    /// Sign a legacy transaction with EIP-155 replay protection and return the raw
    /// bytes accepted by `eth_sendRawTransaction`.
    pub fn sign_legacy(&self, tx: &LegacyTx) -> Result<Bytes> {
        let signature = self.sign_prehash(&tx.signing_hash())?;
        let v = u64::from(signature.y_parity) + tx.chain_id * 2 + 35;

        let mut payload = tx.unsigned_fields();
        v.encode(&mut payload);
        signature.r.encode(&mut payload);
        signature.s.encode(&mut payload);

        Ok(wrap_list(payload).into())
    }
}

/// A pre-EIP-1559 transaction. Every chain this crate targets still accepts them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTx {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub chain_id: u64,
}

impl LegacyTx {
    fn unsigned_fields(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.nonce.encode(&mut out);
        self.gas_price.encode(&mut out);
        self.gas_limit.encode(&mut out);
        match &self.to {
            Some(to) => to.encode(&mut out),
            None => out.push(EMPTY_STRING_CODE),
        }
        self.value.encode(&mut out);
        self.data.encode(&mut out);
        out
    }

    /// The RLP payload that gets hashed and signed (EIP-155).
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = self.unsigned_fields();
        self.chain_id.encode(&mut payload);
        0u8.encode(&mut payload);
        0u8.encode(&mut payload);
        wrap_list(payload)
    }

    pub fn signing_hash(&self) -> B256 {
        keccak256(self.signing_payload())
    }
}

fn wrap_list(payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 9);
    Header {
        list: true,
        payload_length: payload.len(),
    }
    .encode(&mut out);
    out.extend_from_slice(&payload);
    out
}
