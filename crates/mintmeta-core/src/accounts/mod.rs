//! Built-in account parsers for SPL Token and Metaplex Token Metadata.

pub mod metaplex;
pub mod mint;
pub mod token_account;

pub use metaplex::{MetadataAccount, MetadataAccountParser};
pub use mint::{Mint, MintParser};
pub use token_account::{TokenAccount, TokenAccountParser, TokenAccountState};

use crate::error::ParseError;
use crate::pubkey::Pubkey;

/// SPL Token program.
pub const TOKEN_PROGRAM_ID: Pubkey = Pubkey::new([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133,
    237, 95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

/// SPL Token-2022 program.
pub const TOKEN_2022_PROGRAM_ID: Pubkey = Pubkey::new([
    6, 221, 246, 225, 238, 117, 143, 222, 24, 66, 93, 188, 228, 108, 205, 218, 182, 26, 252, 77,
    131, 185, 13, 39, 254, 189, 249, 40, 216, 161, 139, 252,
]);

/// Metaplex Token Metadata program.
pub const METADATA_PROGRAM_ID: Pubkey = Pubkey::new([
    11, 112, 101, 177, 227, 209, 124, 69, 56, 157, 82, 127, 107, 4, 195, 205, 88, 184, 108, 115,
    26, 160, 253, 181, 73, 182, 209, 188, 3, 248, 41, 70,
]);

/// Token-2022 accounts longer than the base layout carry an account type
/// byte right after the 165-byte token account region.
const ACCOUNT_TYPE_OFFSET: usize = token_account::TOKEN_ACCOUNT_LEN;

fn check_token_owner(owner: &Pubkey) -> Result<(), ParseError> {
    if *owner == TOKEN_PROGRAM_ID || *owner == TOKEN_2022_PROGRAM_ID {
        Ok(())
    } else {
        Err(ParseError::InvalidOwner {
            owner: *owner,
            expected: "an SPL token program".into(),
        })
    }
}

/// Validate the length (and Token-2022 account type) of a token-program
/// account whose base layout is `base_len` bytes.
fn check_token_layout(data: &[u8], base_len: usize, account_type: u8) -> Result<(), ParseError> {
    if data.len() == base_len {
        return Ok(());
    }
    if data.len() < base_len || data.len() <= ACCOUNT_TYPE_OFFSET {
        return Err(ParseError::InvalidLength {
            len: data.len(),
            expected: format!("{base_len} or an extended Token-2022 layout"),
        });
    }
    match data[ACCOUNT_TYPE_OFFSET] {
        t if t == account_type => Ok(()),
        t => Err(ParseError::InvalidAccountType(t)),
    }
}

/// Little-endian cursor over fixed-layout account data.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let end = self.pos + n;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| ParseError::Decode(format!("unexpected end of data at {}", self.pos)))?;
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ParseError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, ParseError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    pub(crate) fn pubkey(&mut self) -> Result<Pubkey, ParseError> {
        Pubkey::try_from_slice(self.take(32)?).map_err(|e| ParseError::Decode(e.to_string()))
    }

    /// SPL `COption<T>`: a 4-byte tag followed by the always-present payload.
    fn coption<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Option<T>, ParseError> {
        let tag = self.u32()?;
        let value = read(self)?;
        match tag {
            0 => Ok(None),
            1 => Ok(Some(value)),
            t => Err(ParseError::Decode(format!("invalid COption tag {t}"))),
        }
    }

    pub(crate) fn coption_pubkey(&mut self) -> Result<Option<Pubkey>, ParseError> {
        self.coption(Self::pubkey)
    }

    pub(crate) fn coption_u64(&mut self) -> Result<Option<u64>, ParseError> {
        self.coption(Self::u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_ids_match_base58() {
        assert_eq!(
            TOKEN_PROGRAM_ID.to_string(),
            "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
        );
        assert_eq!(
            TOKEN_2022_PROGRAM_ID.to_string(),
            "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb"
        );
        assert_eq!(
            METADATA_PROGRAM_ID.to_string(),
            "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s"
        );
    }

    #[test]
    fn reader_rejects_bad_coption_tag() {
        let mut data = vec![2, 0, 0, 0];
        data.extend([0u8; 32]);
        let err = Reader::new(&data).coption_pubkey().unwrap_err();
        assert!(matches!(err, ParseError::Decode(_)));
    }

    #[test]
    fn reader_reports_truncation() {
        let err = Reader::new(&[1, 2]).u64().unwrap_err();
        assert!(matches!(err, ParseError::Decode(_)));
    }
}
