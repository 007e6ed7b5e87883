//! SPL token accounts (balances held for a mint).

use serde::{Deserialize, Serialize};

use super::{check_token_layout, check_token_owner, Reader};
use crate::error::ParseError;
use crate::parser::AccountParser;
use crate::pubkey::Pubkey;
use crate::store::Account;

/// Size of the base token account layout.
pub const TOKEN_ACCOUNT_LEN: usize = 165;

const TOKEN_ACCOUNT_TYPE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenAccountState {
    Initialized,
    Frozen,
}

/// A decoded token account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccount {
    pub address: Pubkey,
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub delegate: Option<Pubkey>,
    pub state: TokenAccountState,
    /// Rent-exempt reserve for wrapped SOL accounts.
    pub is_native: Option<u64>,
    pub delegated_amount: u64,
    pub close_authority: Option<Pubkey>,
    pub token_program: Pubkey,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenAccountParser;

impl AccountParser for TokenAccountParser {
    type Output = TokenAccount;

    fn parse(&self, key: &Pubkey, account: &Account) -> Result<TokenAccount, ParseError> {
        check_token_owner(&account.owner)?;
        check_token_layout(&account.data, TOKEN_ACCOUNT_LEN, TOKEN_ACCOUNT_TYPE)?;

        let mut r = Reader::new(&account.data);
        let mint = r.pubkey()?;
        let owner = r.pubkey()?;
        let amount = r.u64()?;
        let delegate = r.coption_pubkey()?;
        let state = match r.u8()? {
            0 => return Err(ParseError::Uninitialized),
            1 => TokenAccountState::Initialized,
            2 => TokenAccountState::Frozen,
            s => return Err(ParseError::Decode(format!("invalid account state {s}"))),
        };
        let is_native = r.coption_u64()?;
        let delegated_amount = r.u64()?;
        let close_authority = r.coption_pubkey()?;

        Ok(TokenAccount {
            address: *key,
            mint,
            owner,
            amount,
            delegate,
            state,
            is_native,
            delegated_amount,
            close_authority,
            token_program: account.owner,
        })
    }
}
