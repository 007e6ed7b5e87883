//! Typed parser registry.
//!
//! An [`AccountParser`] decodes raw account bytes into a typed value and may
//! fail. The registry entry point, [`parse_account`], never fails: missing
//! accounts and decode errors both become `None`, so one malformed account
//! degrades to "not found" instead of aborting a batch.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::ParseError;
use crate::pubkey::Pubkey;
use crate::store::Account;

/// Identity of a parser implementation.
///
/// Two parsers share an id iff they are the same Rust type; values are never
/// compared structurally. Used to partition the cache and look up retention.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParserId {
    type_id: TypeId,
    name: &'static str,
}

impl ParserId {
    pub fn of<P: AccountParser>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            name: std::any::type_name::<P>(),
        }
    }

    /// Fully qualified type name of the parser, for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ParserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParserId({})", self.name)
    }
}

/// Decoder from raw account data to a typed value.
pub trait AccountParser: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    fn parse(&self, key: &Pubkey, account: &Account) -> Result<Self::Output, ParseError>;

    fn id(&self) -> ParserId
    where
        Self: Sized,
    {
        ParserId::of::<Self>()
    }
}

/// Parse an account that may be absent. Never fails.
pub fn parse_account<P: AccountParser>(
    parser: &P,
    key: &Pubkey,
    account: Option<&Account>,
) -> Option<P::Output> {
    let account = account?;
    match parser.parse(key, account) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                key = %key,
                parser = ParserId::of::<P>().name(),
                error = %e,
                "failed to parse account"
            );
            None
        }
    }
}

/// Type-erased parsed value, as stored in the account cache.
pub(crate) type ErasedValue = Arc<dyn Any + Send + Sync>;

/// Object-safe view of an [`AccountParser`], so the cache can re-parse an
/// entry with the parser that produced it.
pub(crate) trait ErasedParser: Send + Sync {
    fn parser_id(&self) -> ParserId;

    fn parse_erased(&self, key: &Pubkey, account: Option<&Account>) -> Option<ErasedValue>;
}

impl<P: AccountParser> ErasedParser for P {
    fn parser_id(&self) -> ParserId {
        ParserId::of::<P>()
    }

    fn parse_erased(&self, key: &Pubkey, account: Option<&Account>) -> Option<ErasedValue> {
        parse_account(self, key, account).map(|v| Arc::new(v) as ErasedValue)
    }
}
