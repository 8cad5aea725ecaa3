//! Store credit ledger
//!
//! One balance per user, created lazily on the first cancellation refund.
//! Application and issuance run inside the caller's write transaction so a
//! failed checkout or cancellation rolls the balance change back with
//! everything else.

use crate::common::error::CoreResult;
use crate::storage::Store;
use redb::WriteTransaction;
use rust_decimal::Decimal;
use shared::{StoreCredit, util};

#[derive(Clone)]
pub struct CreditLedger {
    store: Store,
}

impl CreditLedger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Apply available credit against a payable amount.
    ///
    /// Returns `(remaining_payable, credit_applied)`. Without an active
    /// credit (positive balance, unexpired) this is a no-op returning the
    /// payable untouched. The expiry date is cleared once the balance hits
    /// zero.
    pub fn apply(
        &self,
        txn: &WriteTransaction,
        user_id: &str,
        payable: Decimal,
    ) -> CoreResult<(Decimal, Decimal)> {
        let now = util::now_ms();
        let Some(mut credit) = self.store.get_credit_for_update(txn, user_id)? else {
            return Ok((payable, Decimal::ZERO));
        };
        if !credit.is_active(now) {
            return Ok((payable, Decimal::ZERO));
        }

        let applied = credit.amount.min(payable);
        credit.amount -= applied;
        if credit.amount == Decimal::ZERO {
            credit.expiry_date = None;
        }
        self.store.put_credit(txn, &mut credit)?;

        tracing::debug!(
            user_id,
            applied = %applied,
            remaining_balance = %credit.amount,
            "Store credit applied"
        );
        Ok((payable - applied, applied))
    }

    /// Issue credit to a user, creating the record if needed.
    ///
    /// Topping up an existing balance replaces the expiry date with
    /// `now + validity_ms`, it does not extend the old one. Deliberate
    /// business rule.
    pub fn issue(
        &self,
        txn: &WriteTransaction,
        user_id: &str,
        amount: Decimal,
        validity_ms: i64,
    ) -> CoreResult<StoreCredit> {
        let expiry = util::now_ms() + validity_ms;

        let credit = match self.store.get_credit_for_update(txn, user_id)? {
            Some(mut credit) => {
                credit.amount += amount;
                credit.expiry_date = Some(expiry);
                self.store.put_credit(txn, &mut credit)?;
                credit
            }
            None => {
                let credit = StoreCredit::new(user_id, amount, expiry);
                self.store.insert_credit(txn, &credit)?;
                credit
            }
        };

        tracing::info!(user_id, amount = %amount, balance = %credit.amount, "Store credit issued");
        Ok(credit)
    }

    /// Current credit record for a user, if any (read-only accessor for
    /// collaborators)
    pub fn get_balance(&self, user_id: &str) -> CoreResult<Option<StoreCredit>> {
        let txn = self.store.begin_read()?;
        Ok(self.store.get_credit(&txn, user_id)?)
    }
}
