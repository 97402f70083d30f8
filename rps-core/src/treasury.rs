//! Owner-only movement of house funds.

use crate::error::{HouseError, Result};
use crate::ledger::LiquidityLedger;
use crate::payments::{PaymentReason, Payments, Transfer};
use crate::types::{Address, Amount, CallContext};

#[derive(Debug, Clone)]
pub struct AdminTreasury {
    owner: Address,
}

impl AdminTreasury {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Checked before anything else in every owner-only operation.
    pub fn ensure_owner(&self, ctx: &CallContext) -> Result<()> {
        if ctx.caller != self.owner {
            tracing::warn!("Rejected owner-only call from {}", ctx.caller);
            return Err(HouseError::NotOwner);
        }
        Ok(())
    }

    pub fn deposit(
        &self,
        ctx: &CallContext,
        amount: Amount,
        ledger: &mut LiquidityLedger,
    ) -> Result<()> {
        self.ensure_owner(ctx)?;
        if amount.is_zero() {
            return Err(HouseError::ZeroAmount);
        }

        ledger.credit(amount)?;
        tracing::info!(
            "Owner deposited {} (house balance {})",
            amount,
            ledger.total_balance()
        );
        Ok(())
    }

    pub fn withdraw(
        &self,
        ctx: &CallContext,
        amount: Amount,
        ledger: &mut LiquidityLedger,
        payments: &mut dyn Payments,
    ) -> Result<()> {
        self.ensure_owner(ctx)?;
        if amount.is_zero() {
            return Err(HouseError::ZeroAmount);
        }

        let plan = ledger.plan_debit(amount)?;
        payments.send(&Transfer {
            to: self.owner.clone(),
            amount,
            reason: PaymentReason::Withdrawal,
            block_height: ctx.block.height,
        })?;
        ledger.apply(plan);

        tracing::info!(
            "Owner withdrew {} (house balance {}, reserved {})",
            amount,
            ledger.total_balance(),
            ledger.reserved()
        );
        Ok(())
    }

    /// Withdraws exactly `total_balance - reserved`.
    pub fn withdraw_all_unreserved(
        &self,
        ctx: &CallContext,
        ledger: &mut LiquidityLedger,
        payments: &mut dyn Payments,
    ) -> Result<Amount> {
        self.ensure_owner(ctx)?;

        let available = ledger.unreserved();
        if available.is_zero() {
            return Err(HouseError::NothingToWithdraw);
        }

        self.withdraw(ctx, available, ledger, payments)?;
        Ok(available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::PaymentLog;
    use crate::types::BlockInfo;
    use chrono::Utc;

    fn addr(n: u8) -> Address {
        format!("0x{:040x}", n).parse().unwrap()
    }

    fn ctx(caller: Address) -> CallContext {
        CallContext::new(caller, BlockInfo::new(1, Utc::now(), [0u8; 32]))
    }

    struct RejectingPayments;

    impl Payments for RejectingPayments {
        fn send(&mut self, _transfer: &Transfer) -> Result<()> {
            Err(HouseError::transfer("recipient rejected funds"))
        }
    }

    #[test]
    fn test_auth_precedes_validation() {
        let treasury = AdminTreasury::new(addr(1));
        let mut ledger = LiquidityLedger::new();
        let mut payments = PaymentLog::new();
        let stranger = ctx(addr(2));

        assert!(matches!(
            treasury.deposit(&stranger, Amount::ZERO, &mut ledger),
            Err(HouseError::NotOwner)
        ));
        assert!(matches!(
            treasury.withdraw(&stranger, Amount::from_whole(1000), &mut ledger, &mut payments),
            Err(HouseError::NotOwner)
        ));
        assert!(matches!(
            treasury.withdraw_all_unreserved(&stranger, &mut ledger, &mut payments),
            Err(HouseError::NotOwner)
        ));
    }

    #[test]
    fn test_withdraw_all_then_nothing_left() {
        let owner = addr(1);
        let treasury = AdminTreasury::new(owner.clone());
        let mut ledger = LiquidityLedger::new();
        let mut payments = PaymentLog::new();
        let ctx = ctx(owner.clone());

        treasury.deposit(&ctx, Amount::from_whole(5), &mut ledger).unwrap();
        ledger
            .reserve(1, Amount::from_whole(2), Amount::from_whole(1))
            .unwrap();

        let taken = treasury
            .withdraw_all_unreserved(&ctx, &mut ledger, &mut payments)
            .unwrap();
        assert_eq!(taken, Amount::from_whole(3));
        assert_eq!(ledger.unreserved(), Amount::ZERO);
        assert_eq!(payments.total_to(&owner), Amount::from_whole(3));

        assert!(matches!(
            treasury.withdraw_all_unreserved(&ctx, &mut ledger, &mut payments),
            Err(HouseError::NothingToWithdraw)
        ));
    }

    #[test]
    fn test_failed_transfer_keeps_balance() {
        let owner = addr(1);
        let treasury = AdminTreasury::new(owner.clone());
        let mut ledger = LiquidityLedger::new();
        let ctx = ctx(owner);

        treasury.deposit(&ctx, Amount::from_whole(5), &mut ledger).unwrap();
        let err = treasury
            .withdraw(&ctx, Amount::from_whole(2), &mut ledger, &mut RejectingPayments)
            .unwrap_err();

        assert!(matches!(err, HouseError::Transfer(_)));
        assert_eq!(ledger.total_balance(), Amount::from_whole(5));
    }
}
