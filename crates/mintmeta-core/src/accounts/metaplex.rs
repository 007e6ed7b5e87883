//! Metaplex Token Metadata accounts.
//!
//! Only the leading fields (key, authorities, name, symbol, uri) are decoded;
//! the rest of the account (creators, collection, ...) is ignored. Names are
//! stored NUL-padded on chain, so padding is stripped.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use super::METADATA_PROGRAM_ID;
use crate::error::ParseError;
use crate::parser::AccountParser;
use crate::pubkey::Pubkey;
use crate::store::Account;

const METADATA_SEED: &[u8] = b"metadata";
const METADATA_V1_KEY: u8 = 4;

/// Decoded header of a Metaplex metadata account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataAccount {
    pub address: Pubkey,
    pub update_authority: Pubkey,
    pub mint: Pubkey,
    pub name: String,
    pub symbol: String,
    /// Off-chain JSON document location.
    pub uri: String,
}

#[derive(BorshSerialize, BorshDeserialize)]
pub(crate) struct RawMetadataHeader {
    pub key: u8,
    pub update_authority: [u8; 32],
    pub mint: [u8; 32],
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

/// Address of the metadata account for `mint`.
pub fn metadata_address(mint: &Pubkey) -> Option<Pubkey> {
    Pubkey::find_program_address(
        &[METADATA_SEED, METADATA_PROGRAM_ID.as_bytes(), mint.as_bytes()],
        &METADATA_PROGRAM_ID,
    )
    .map(|(address, _)| address)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataAccountParser;

impl AccountParser for MetadataAccountParser {
    type Output = MetadataAccount;

    fn parse(&self, key: &Pubkey, account: &Account) -> Result<MetadataAccount, ParseError> {
        if account.owner != METADATA_PROGRAM_ID {
            return Err(ParseError::InvalidOwner {
                owner: account.owner,
                expected: METADATA_PROGRAM_ID.to_string(),
            });
        }
        let raw = RawMetadataHeader::deserialize(&mut account.data.as_slice())
            .map_err(|e| ParseError::Decode(e.to_string()))?;
        if raw.key != METADATA_V1_KEY {
            return Err(ParseError::InvalidAccountType(raw.key));
        }

        Ok(MetadataAccount {
            address: *key,
            update_authority: Pubkey::new(raw.update_authority),
            mint: Pubkey::new(raw.mint),
            name: strip_padding(&raw.name),
            symbol: strip_padding(&raw.symbol),
            uri: strip_padding(&raw.uri),
        })
    }
}

fn strip_padding(s: &str) -> String {
    s.trim_end_matches('\0').trim().to_string()
}

/// Encode a metadata header with on-chain style NUL padding. Used to build fixtures.
pub fn encode_metadata(mint: &Pubkey, name: &str, symbol: &str, uri: &str) -> Vec<u8> {
    let pad = |s: &str, len: usize| {
        let mut padded = s.to_string();
        while padded.len() < len {
            padded.push('\0');
        }
        padded
    };
    let raw = RawMetadataHeader {
        key: METADATA_V1_KEY,
        update_authority: [0; 32],
        mint: mint.to_bytes(),
        name: pad(name, 32),
        symbol: pad(symbol, 10),
        uri: pad(uri, 200),
    };
    let mut data = borsh::to_vec(&raw).unwrap_or_default();
    // seller fee, creators/collection/uses flags follow the header on chain
    data.extend_from_slice(&[0u8; 8]);
    data
}
