//! SPL Token / Token-2022 mint accounts.

use serde::{Deserialize, Serialize};

use super::{check_token_layout, check_token_owner, Reader};
use crate::error::ParseError;
use crate::parser::AccountParser;
use crate::pubkey::Pubkey;
use crate::store::Account;

/// Size of the base mint layout.
pub const MINT_LEN: usize = 82;

const MINT_ACCOUNT_TYPE: u8 = 1;

/// A decoded token mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mint {
    pub address: Pubkey,
    pub mint_authority: Option<Pubkey>,
    pub supply: u64,
    pub decimals: u8,
    pub is_initialized: bool,
    pub freeze_authority: Option<Pubkey>,
    /// Token program that owns the mint.
    pub token_program: Pubkey,
}

/// Parses mints owned by either SPL token program.
#[derive(Debug, Clone, Copy, Default)]
pub struct MintParser;

impl AccountParser for MintParser {
    type Output = Mint;

    fn parse(&self, key: &Pubkey, account: &Account) -> Result<Mint, ParseError> {
        check_token_owner(&account.owner)?;
        check_token_layout(&account.data, MINT_LEN, MINT_ACCOUNT_TYPE)?;

        let mut r = Reader::new(&account.data);
        let mint_authority = r.coption_pubkey()?;
        let supply = r.u64()?;
        let decimals = r.u8()?;
        let is_initialized = match r.u8()? {
            0 => false,
            1 => true,
            b => return Err(ParseError::Decode(format!("invalid bool {b}"))),
        };
        let freeze_authority = r.coption_pubkey()?;

        if !is_initialized {
            return Err(ParseError::Uninitialized);
        }

        Ok(Mint {
            address: *key,
            mint_authority,
            supply,
            decimals,
            is_initialized,
            freeze_authority,
            token_program: account.owner,
        })
    }
}

/// Encode a mint in the base layout. Used to build fixtures.
pub fn encode_mint(
    mint_authority: Option<Pubkey>,
    supply: u64,
    decimals: u8,
    freeze_authority: Option<Pubkey>,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(MINT_LEN);
    push_coption(&mut data, mint_authority);
    data.extend_from_slice(&supply.to_le_bytes());
    data.push(decimals);
    data.push(1);
    push_coption(&mut data, freeze_authority);
    data
}

fn push_coption(data: &mut Vec<u8>, key: Option<Pubkey>) {
    match key {
        Some(k) => {
            data.extend_from_slice(&1u32.to_le_bytes());
            data.extend_from_slice(k.as_bytes());
        }
        None => {
            data.extend_from_slice(&0u32.to_le_bytes());
            data.extend_from_slice(&[0u8; 32]);
        }
    }
}
