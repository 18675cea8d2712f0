//! A refund always mirrors its debit

use std::sync::Arc;
use proptest::prelude::*;
use tablestake::{ParticipantId, RefundReason, Stake, StakeLedgerClient, TransactionKind};
use crate::mocks::MockLedger;

fn reason() -> impl Strategy<Value = RefundReason> {
    prop_oneof![
        Just(RefundReason::ChannelUnavailable),
        Just(RefundReason::SeatRejected),
        Just(RefundReason::SeatAckTimeout),
        Just(RefundReason::MatchmakingTimeout),
        Just(RefundReason::ManualCleanup),
    ]
}

proptest! {
    #[test]
    fn prop_refund_mirrors_debit(amount in 1u64..=i64::MAX as u64, token in "[A-Z]{3,5}", reason in reason()) {
        let ledger = Arc::new(MockLedger::with_balance(0));
        let client = StakeLedgerClient::new(ledger.clone(), "chess-online", 2);
        let participant = ParticipantId::new("acct-1").unwrap();
        let stake = Stake::new(token.clone(), amount).unwrap();

        let refunded = tokio_test::block_on(async {
            let debit = client.debit(&participant, &stake).await.unwrap();
            client.refund(debit, reason, Some("tbl-1")).await
        });
        prop_assert!(refunded);

        let entries = ledger.entries();
        prop_assert_eq!(entries.len(), 2);
        prop_assert_eq!(entries[0].kind, TransactionKind::Stake);
        prop_assert_eq!(entries[1].kind, TransactionKind::StakeRefund);
        prop_assert_eq!(entries[0].amount, -entries[1].amount);
        prop_assert_eq!(&entries[0].token, &token);
        prop_assert_eq!(&entries[1].token, &token);
        prop_assert_eq!(entries[0].metadata.debit_id, entries[1].metadata.debit_id);
        prop_assert_eq!(entries[1].metadata.reason, Some(reason));
    }

    #[test]
    fn prop_amounts_beyond_ledger_range_rejected(amount in (i64::MAX as u64 + 1)..=u64::MAX) {
        prop_assert!(Stake::new("TPC", amount).is_err());
    }
}
