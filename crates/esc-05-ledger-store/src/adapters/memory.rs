//! # In-Memory Ledger
//!
//! `LedgerStore` over plain vectors. Used by tests and by the runtime when no
//! database is configured. Rows keep insertion order so "oldest first"
//! queries behave like the SQL ones.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use shared_types::{BlockNumber, CollectionId, QuoteId, TokenId};
use uuid::Uuid;

use crate::domain::{
    LedgerError, NftDeposit, Offer, OfferStatus, Payout, ProcessedBlock, QuoteDeposit, Trade,
    TxStatus,
};
use crate::ports::LedgerStore;

#[derive(Default)]
struct LedgerState {
    blocks: Vec<ProcessedBlock>,
    nft_deposits: Vec<NftDeposit>,
    quote_deposits: Vec<QuoteDeposit>,
    offers: Vec<Offer>,
    trades: Vec<Trade>,
    payouts: Vec<Payout>,
    failing_ops: u32,
}

impl LedgerState {
    fn check_fault(&mut self) -> Result<(), LedgerError> {
        if self.failing_ops > 0 {
            self.failing_ops -= 1;
            return Err(LedgerError::Connection("injected connection drop".into()));
        }
        Ok(())
    }
}

/// In-memory ledger store.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` operations fail with a connection error.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().failing_ops = count;
    }

    /// Recorded block numbers, ascending.
    pub fn processed_blocks(&self) -> Vec<BlockNumber> {
        let mut numbers: Vec<BlockNumber> = self
            .state
            .lock()
            .blocks
            .iter()
            .map(|row| row.block_number)
            .collect();
        numbers.sort_unstable();
        numbers
    }

    /// All offers.
    pub fn offers(&self) -> Vec<Offer> {
        self.state.lock().offers.clone()
    }

    /// All trades.
    pub fn trades(&self) -> Vec<Trade> {
        self.state.lock().trades.clone()
    }

    /// All payouts.
    pub fn payouts(&self) -> Vec<Payout> {
        self.state.lock().payouts.clone()
    }

    /// All NFT deposits.
    pub fn nft_deposits(&self) -> Vec<NftDeposit> {
        self.state.lock().nft_deposits.clone()
    }

    /// All quote deposits.
    pub fn quote_deposits(&self) -> Vec<QuoteDeposit> {
        self.state.lock().quote_deposits.clone()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn last_processed_block(&self) -> Result<Option<BlockNumber>, LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        Ok(state.blocks.iter().map(|row| row.block_number).max())
    }

    async fn record_processed_block(&self, block: BlockNumber) -> Result<bool, LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        if state.blocks.iter().any(|row| row.block_number == block) {
            return Ok(false);
        }
        state.blocks.push(ProcessedBlock {
            block_number: block,
            processed_at: Utc::now(),
        });
        Ok(true)
    }

    async fn fail_pending_nft_deposits(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        reason: &str,
    ) -> Result<u64, LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        let mut changed = 0;
        for row in state.nft_deposits.iter_mut().filter(|row| {
            row.collection_id == collection_id
                && row.token_id == token_id
                && row.status == TxStatus::Pending
        }) {
            row.status = TxStatus::Failed;
            row.error_message = reason.to_string();
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete_orphan_nft_deposits(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<u64, LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        let before = state.nft_deposits.len();
        state.nft_deposits.retain(|row| {
            !(row.collection_id == collection_id
                && row.token_id == token_id
                && row.offer_id.is_none())
        });
        Ok((before - state.nft_deposits.len()) as u64)
    }

    async fn insert_nft_deposit(&self, deposit: &NftDeposit) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        state.nft_deposits.push(deposit.clone());
        Ok(())
    }

    async fn pending_nft_deposits(
        &self,
        skip: &[Uuid],
        limit: usize,
    ) -> Result<Vec<NftDeposit>, LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        Ok(state
            .nft_deposits
            .iter()
            .filter(|row| row.status == TxStatus::Pending && !skip.contains(&row.id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn set_nft_deposit_status(
        &self,
        id: Uuid,
        status: TxStatus,
        error_message: &str,
    ) -> Result<bool, LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        match state
            .nft_deposits
            .iter_mut()
            .find(|row| row.id == id && row.status == TxStatus::Pending)
        {
            Some(row) => {
                row.status = status;
                row.error_message = error_message.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn latest_deposit_block(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<Option<BlockNumber>, LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        Ok(state
            .nft_deposits
            .iter()
            .filter(|row| row.collection_id == collection_id && row.token_id == token_id)
            .map(|row| row.source_block)
            .max())
    }

    async fn insert_offer(&self, offer: &Offer) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        state.offers.push(offer.clone());
        Ok(())
    }

    async fn link_orphan_nft_deposits(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        offer_id: Uuid,
    ) -> Result<u64, LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        let mut changed = 0;
        for row in state.nft_deposits.iter_mut().filter(|row| {
            row.collection_id == collection_id && row.token_id == token_id && row.offer_id.is_none()
        }) {
            row.offer_id = Some(offer_id);
            changed += 1;
        }
        Ok(changed)
    }

    async fn active_offer(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<Option<Offer>, LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        Ok(state
            .offers
            .iter()
            .rev()
            .find(|offer| {
                offer.collection_id == collection_id
                    && offer.token_id == token_id
                    && offer.status == OfferStatus::Active
            })
            .cloned())
    }

    async fn active_offers(&self) -> Result<Vec<Offer>, LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        Ok(state
            .offers
            .iter()
            .filter(|offer| offer.status == OfferStatus::Active)
            .cloned()
            .collect())
    }

    async fn set_offer_status(&self, id: Uuid, status: OfferStatus) -> Result<bool, LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        match state
            .offers
            .iter_mut()
            .find(|offer| offer.id == id && offer.status == OfferStatus::Active)
        {
            Some(offer) => {
                offer.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn settle_trade(
        &self,
        offer_id: Uuid,
        trade: &Trade,
        payout: &Payout,
    ) -> Result<bool, LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        let Some(offer) = state
            .offers
            .iter_mut()
            .find(|offer| offer.id == offer_id && offer.status == OfferStatus::Active)
        else {
            return Ok(false);
        };
        offer.status = OfferStatus::Traded;
        state.trades.push(trade.clone());
        state.payouts.push(payout.clone());
        Ok(true)
    }

    async fn insert_payout(&self, payout: &Payout) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        state.payouts.push(payout.clone());
        Ok(())
    }

    async fn insert_quote_deposit(&self, deposit: &QuoteDeposit) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        state.quote_deposits.push(deposit.clone());
        Ok(())
    }

    async fn pending_quote_deposits(
        &self,
        quote_id: QuoteId,
        skip: &[Uuid],
        limit: usize,
    ) -> Result<Vec<QuoteDeposit>, LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        Ok(state
            .quote_deposits
            .iter()
            .filter(|row| {
                row.status == TxStatus::Pending
                    && row.quote_id == quote_id
                    && !skip.contains(&row.id)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn set_quote_deposit_status(
        &self,
        id: Uuid,
        status: TxStatus,
        error_message: &str,
    ) -> Result<bool, LedgerError> {
        let mut state = self.state.lock();
        state.check_fault()?;
        match state
            .quote_deposits
            .iter_mut()
            .find(|row| row.id == id && row.status == TxStatus::Pending)
        {
            Some(row) => {
                row.status = status;
                row.error_message = error_message.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WithdrawType;
    use shared_types::{AccountId, Balance};

    fn seller() -> AccountId {
        AccountId::new([1; 32])
    }

    fn offer(collection_id: CollectionId, token_id: TokenId) -> Offer {
        Offer::new(
            collection_id,
            token_id,
            2,
            Balance::from(100u64),
            seller(),
            serde_json::Value::Null,
        )
    }

    #[tokio::test]
    async fn test_watermark_insert_if_absent() {
        let ledger = InMemoryLedger::new();
        assert_eq!(ledger.last_processed_block().await.unwrap(), None);
        assert!(ledger.record_processed_block(5).await.unwrap());
        assert!(ledger.record_processed_block(7).await.unwrap());
        assert!(!ledger.record_processed_block(5).await.unwrap());
        assert_eq!(ledger.last_processed_block().await.unwrap(), Some(7));
        assert_eq!(ledger.processed_blocks(), vec![5, 7]);
    }

    #[tokio::test]
    async fn test_redeposit_leaves_single_pending_row() {
        let ledger = InMemoryLedger::new();
        let first = NftDeposit::new(3, 18, &seller(), 10);
        ledger.insert_nft_deposit(&first).await.unwrap();

        ledger
            .fail_pending_nft_deposits(3, 18, "superseded")
            .await
            .unwrap();
        ledger.delete_orphan_nft_deposits(3, 18).await.unwrap();
        let second = NftDeposit::new(3, 18, &seller(), 11);
        ledger.insert_nft_deposit(&second).await.unwrap();

        let rows = ledger.nft_deposits();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, second.id);
        assert_eq!(rows[0].status, TxStatus::Pending);
    }

    #[tokio::test]
    async fn test_linked_deposit_survives_cleanup_as_failed() {
        let ledger = InMemoryLedger::new();
        let deposit = NftDeposit::new(3, 18, &seller(), 10);
        ledger.insert_nft_deposit(&deposit).await.unwrap();
        let listed = offer(3, 18);
        ledger.insert_offer(&listed).await.unwrap();
        assert_eq!(
            ledger.link_orphan_nft_deposits(3, 18, listed.id).await.unwrap(),
            1
        );

        ledger.fail_pending_nft_deposits(3, 18, "superseded").await.unwrap();
        assert_eq!(ledger.delete_orphan_nft_deposits(3, 18).await.unwrap(), 0);

        let rows = ledger.nft_deposits();
        assert_eq!(rows[0].status, TxStatus::Failed);
        assert_eq!(rows[0].error_message, "superseded");
        assert_eq!(rows[0].offer_id, Some(listed.id));
    }

    #[tokio::test]
    async fn test_status_flip_only_from_pending() {
        let ledger = InMemoryLedger::new();
        let deposit = NftDeposit::new(1, 1, &seller(), 1);
        ledger.insert_nft_deposit(&deposit).await.unwrap();
        assert!(ledger
            .set_nft_deposit_status(deposit.id, TxStatus::Registered, "OK")
            .await
            .unwrap());
        assert!(!ledger
            .set_nft_deposit_status(deposit.id, TxStatus::Failed, "late")
            .await
            .unwrap());
        assert!(ledger.pending_nft_deposits(&[], 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settle_trade_requires_active_offer() {
        let ledger = InMemoryLedger::new();
        let listed = offer(3, 18);
        ledger.insert_offer(&listed).await.unwrap();

        let buyer = AccountId::new([2; 32]);
        let trade = Trade::new(listed.id, buyer);
        let payout = Payout::new(&seller(), 2, listed.price, WithdrawType::Matched);
        assert!(ledger.settle_trade(listed.id, &trade, &payout).await.unwrap());
        assert!(!ledger
            .settle_trade(listed.id, &Trade::new(listed.id, buyer), &payout)
            .await
            .unwrap());

        assert_eq!(ledger.trades().len(), 1);
        assert_eq!(ledger.payouts().len(), 1);
        assert_eq!(ledger.offers()[0].status, OfferStatus::Traded);
        assert!(ledger.active_offer(3, 18).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_terminal_offer_never_changes() {
        let ledger = InMemoryLedger::new();
        let listed = offer(3, 18);
        ledger.insert_offer(&listed).await.unwrap();
        assert!(ledger
            .set_offer_status(listed.id, OfferStatus::Canceled)
            .await
            .unwrap());
        assert!(!ledger
            .set_offer_status(listed.id, OfferStatus::Traded)
            .await
            .unwrap());
        assert_eq!(ledger.offers()[0].status, OfferStatus::Canceled);
    }

    #[tokio::test]
    async fn test_pending_nft_deposits_page_past_skipped_rows() {
        let ledger = InMemoryLedger::new();
        let first = NftDeposit::new(3, 18, &seller(), 10);
        let second = NftDeposit::new(3, 19, &seller(), 10);
        ledger.insert_nft_deposit(&first).await.unwrap();
        ledger.insert_nft_deposit(&second).await.unwrap();

        let head = ledger.pending_nft_deposits(&[], 1).await.unwrap();
        assert_eq!(head[0].id, first.id);
        let next = ledger.pending_nft_deposits(&[first.id], 1).await.unwrap();
        assert_eq!(next[0].id, second.id);
        assert!(ledger
            .pending_nft_deposits(&[first.id, second.id], 1)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_pending_quote_deposits_filter_by_quote() {
        let ledger = InMemoryLedger::new();
        ledger
            .insert_quote_deposit(&QuoteDeposit::new("0xab", Balance::from(5u64), 2))
            .await
            .unwrap();
        ledger
            .insert_quote_deposit(&QuoteDeposit::new("cd", Balance::from(6u64), 3))
            .await
            .unwrap();
        let rows = ledger.pending_quote_deposits(2, &[], 100).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].account_public_key, "0xab");
    }

    #[tokio::test]
    async fn test_injected_faults_are_transient() {
        let ledger = InMemoryLedger::new();
        ledger.fail_next(1);
        let err = ledger.record_processed_block(1).await.unwrap_err();
        assert!(err.is_transient());
        assert!(ledger.record_processed_block(1).await.unwrap());
    }
}
