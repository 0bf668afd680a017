//! Fungible-token ledger interface and in-memory implementation.
//!
//! The escrow engine moves tokens only through [`TokenLedger`]: pulling
//! deposits from lockers, paying out withdrawals, and paying staking rewards
//! from the provider account. A failing transfer aborts the enclosing
//! operation before any escrow state is touched.
//!
//! [`MemoryTokenLedger`] is the test implementation; a production embedder
//! adapts its own token module behind the trait.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::TokenError;
use crate::types::{AccountId, Amount};

/// Fungible-token ledger the escrow settles against.
///
/// Not thread-safe; callers wrap the owning engine in a `Mutex` if
/// concurrent access is needed.
pub trait TokenLedger: Send + Sync {
    /// Move `amount` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// [`TokenError::InsufficientBalance`] if `from` cannot cover `amount`.
    fn transfer(&mut self, from: AccountId, to: AccountId, amount: Amount) -> Result<(), TokenError>;

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming
    /// allowance.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InsufficientAllowance`] if `from` has not approved
    ///   `spender` for at least `amount`
    /// - [`TokenError::InsufficientBalance`] if `from` cannot cover `amount`
    fn transfer_from(
        &mut self,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), TokenError>;

    /// Set `spender`'s allowance over `owner`'s balance to `amount`.
    fn approve(&mut self, owner: AccountId, spender: AccountId, amount: Amount) -> Result<(), TokenError>;

    /// Remaining allowance of `spender` over `owner`'s balance.
    fn allowance(&self, owner: AccountId, spender: AccountId) -> Amount;

    /// Current balance of `account`. Unknown accounts hold zero.
    fn balance_of(&self, account: AccountId) -> Amount;

    /// Create `amount` new tokens in `account`. Test/provider funding hook.
    ///
    /// # Errors
    ///
    /// [`TokenError::BalanceOverflow`] if the balance would exceed `u128`.
    fn mint(&mut self, account: AccountId, amount: Amount) -> Result<(), TokenError>;
}

/// In-memory token ledger for testing.
///
/// Balance and allowance maps with no persistence.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MemoryTokenLedger {
    /// Account → balance.
    balances: HashMap<AccountId, Amount>,
    /// Owner → spender → remaining allowance.
    allowances: HashMap<AccountId, HashMap<AccountId, Amount>>,
}

impl MemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn debit(&mut self, from: AccountId, amount: Amount) -> Result<(), TokenError> {
        let have = self.balances.get(&from).copied().unwrap_or(0);
        let remaining = have
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientBalance { have, need: amount })?;
        if remaining == 0 {
            self.balances.remove(&from);
        } else {
            self.balances.insert(from, remaining);
        }
        Ok(())
    }

    fn credit(&mut self, to: AccountId, amount: Amount) -> Result<(), TokenError> {
        let entry = self.balances.entry(to).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(TokenError::BalanceOverflow)?;
        Ok(())
    }
}

impl TokenLedger for MemoryTokenLedger {
    fn transfer(&mut self, from: AccountId, to: AccountId, amount: Amount) -> Result<(), TokenError> {
        self.debit(from, amount)?;
        self.credit(to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let have = self.allowance(from, spender);
        let remaining = have
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientAllowance { have, need: amount })?;
        // Balance check happens before the allowance write so a failed
        // transfer leaves the allowance untouched.
        self.debit(from, amount)?;
        self.allowances.entry(from).or_default().insert(spender, remaining);
        self.credit(to, amount)
    }

    fn approve(&mut self, owner: AccountId, spender: AccountId, amount: Amount) -> Result<(), TokenError> {
        self.allowances.entry(owner).or_default().insert(spender, amount);
        Ok(())
    }

    fn allowance(&self, owner: AccountId, spender: AccountId) -> Amount {
        self.allowances
            .get(&owner)
            .and_then(|m| m.get(&spender))
            .copied()
            .unwrap_or(0)
    }

    fn balance_of(&self, account: AccountId) -> Amount {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    fn mint(&mut self, account: AccountId, amount: Amount) -> Result<(), TokenError> {
        self.credit(account, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(seed: u8) -> AccountId {
        AccountId([seed; 32])
    }

    #[test]
    fn mint_and_transfer() {
        let mut ledger = MemoryTokenLedger::new();
        ledger.mint(acct(1), 100).unwrap();
        ledger.transfer(acct(1), acct(2), 60).unwrap();
        assert_eq!(ledger.balance_of(acct(1)), 40);
        assert_eq!(ledger.balance_of(acct(2)), 60);
    }

    #[test]
    fn transfer_insufficient_balance() {
        let mut ledger = MemoryTokenLedger::new();
        ledger.mint(acct(1), 10).unwrap();
        let err = ledger.transfer(acct(1), acct(2), 11).unwrap_err();
        assert_eq!(err, TokenError::InsufficientBalance { have: 10, need: 11 });
        // Nothing moved.
        assert_eq!(ledger.balance_of(acct(1)), 10);
        assert_eq!(ledger.balance_of(acct(2)), 0);
    }

    #[test]
    fn transfer_from_consumes_allowance() {
        let mut ledger = MemoryTokenLedger::new();
        ledger.mint(acct(1), 100).unwrap();
        ledger.approve(acct(1), acct(9), 70).unwrap();
        ledger.transfer_from(acct(9), acct(1), acct(2), 50).unwrap();
        assert_eq!(ledger.allowance(acct(1), acct(9)), 20);
        assert_eq!(ledger.balance_of(acct(2)), 50);

        let err = ledger.transfer_from(acct(9), acct(1), acct(2), 21).unwrap_err();
        assert_eq!(err, TokenError::InsufficientAllowance { have: 20, need: 21 });
    }

    #[test]
    fn failed_transfer_from_keeps_allowance() {
        let mut ledger = MemoryTokenLedger::new();
        ledger.mint(acct(1), 10).unwrap();
        ledger.approve(acct(1), acct(9), 100).unwrap();
        assert!(ledger.transfer_from(acct(9), acct(1), acct(2), 50).is_err());
        assert_eq!(ledger.allowance(acct(1), acct(9)), 100);
    }
}
