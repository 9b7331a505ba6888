//! # PostgreSQL Ledger
//!
//! `LedgerStore` over the marketplace schema. Tables and columns are quoted
//! PascalCase and resolved through the connection's `search_path`.
//! The schema itself is managed by the marketplace API.
//!
//! Column mapping:
//! - amounts are decimal `text`
//! - block numbers and most ids are `numeric(20,0)`; they cross the wire as
//!   text (`::text` on read, `::numeric` on write), which also covers the
//!   `bigint` ids of `NftIncomingTransaction`
//! - dates are `timestamp without time zone` holding UTC

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use shared_types::{parse_balance, AccountId, Balance, BlockNumber, CollectionId, QuoteId, TokenId};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::domain::{
    LedgerError, NftDeposit, Offer, OfferStatus, Payout, QuoteDeposit, Trade, TxStatus,
};
use crate::ports::LedgerStore;

const OFFER_COLUMNS: &str = r#""Id", "CreationDate", "CollectionId"::text AS "CollectionId",
    "TokenId"::text AS "TokenId", "Price", "QuoteId"::text AS "QuoteId", "Seller", "Metadata",
    "OfferStatus""#;

const NFT_DEPOSIT_COLUMNS: &str = r#""Id", "CollectionId"::text AS "CollectionId",
    "TokenId"::text AS "TokenId", "Value", "OwnerPublicKey",
    "UniqueProcessedBlockId"::text AS "UniqueProcessedBlockId", "Status", "LockTime",
    "ErrorMessage", "OfferId""#;

const QUOTE_DEPOSIT_COLUMNS: &str = r#""Id", "AccountPublicKey", "Amount",
    "QuoteId"::text AS "QuoteId", "Description", "BlockId"::text AS "BlockId", "Status",
    "LockTime", "ErrorMessage""#;

/// PostgreSQL ledger store.
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Open a connection pool.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        info!(
            "[esc-05] Connected to ledger database {}",
            config.display_target()
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_db(value: u64) -> String {
    value.to_string()
}

fn from_db(field: &'static str, text: String) -> Result<u64, LedgerError> {
    text.trim()
        .parse()
        .map_err(|_| LedgerError::Decode { field, value: text })
}

fn number(row: &PgRow, field: &'static str) -> Result<u64, LedgerError> {
    from_db(field, row.try_get(field)?)
}

fn optional_number(row: &PgRow, field: &'static str) -> Result<Option<u64>, LedgerError> {
    let text: Option<String> = row.try_get(field)?;
    text.map(|text| from_db(field, text)).transpose()
}

fn date(row: &PgRow, field: &'static str) -> Result<DateTime<Utc>, LedgerError> {
    Ok(row.try_get::<NaiveDateTime, _>(field)?.and_utc())
}

fn optional_date(row: &PgRow, field: &'static str) -> Result<Option<DateTime<Utc>>, LedgerError> {
    Ok(row
        .try_get::<Option<NaiveDateTime>, _>(field)?
        .map(|naive| naive.and_utc()))
}

fn limit_to_db(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn amount(row: &PgRow, field: &'static str) -> Result<Balance, LedgerError> {
    let text: String = row.try_get(field)?;
    parse_balance(&text).map_err(|_| LedgerError::Decode { field, value: text })
}

fn status<T>(
    row: &PgRow,
    field: &'static str,
    from_code: fn(i32) -> Option<T>,
) -> Result<T, LedgerError> {
    let code: i32 = row.try_get(field)?;
    from_code(code).ok_or_else(|| LedgerError::Decode {
        field,
        value: code.to_string(),
    })
}

fn metadata_to_db(metadata: &serde_json::Value) -> String {
    if metadata.is_null() {
        String::new()
    } else {
        metadata.to_string()
    }
}

fn metadata_from_db(text: &str) -> serde_json::Value {
    if text.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

fn decode_offer(row: &PgRow) -> Result<Offer, LedgerError> {
    let seller: String = row.try_get("Seller")?;
    let metadata: Option<String> = row.try_get("Metadata")?;
    Ok(Offer {
        id: row.try_get("Id")?,
        creation_date: date(row, "CreationDate")?,
        collection_id: number(row, "CollectionId")?,
        token_id: number(row, "TokenId")?,
        price: amount(row, "Price")?,
        quote_id: number(row, "QuoteId")?,
        seller: AccountId::from_base64(&seller).map_err(|_| LedgerError::Decode {
            field: "Seller",
            value: seller.clone(),
        })?,
        metadata: metadata_from_db(metadata.as_deref().unwrap_or_default()),
        status: status(row, "OfferStatus", OfferStatus::from_code)?,
    })
}

fn decode_nft_deposit(row: &PgRow) -> Result<NftDeposit, LedgerError> {
    Ok(NftDeposit {
        id: row.try_get("Id")?,
        collection_id: number(row, "CollectionId")?,
        token_id: number(row, "TokenId")?,
        value: amount(row, "Value")?,
        owner_public_key: row.try_get("OwnerPublicKey")?,
        source_block: number(row, "UniqueProcessedBlockId")?,
        status: status(row, "Status", TxStatus::from_code)?,
        lock_time: optional_date(row, "LockTime")?,
        error_message: row
            .try_get::<Option<String>, _>("ErrorMessage")?
            .unwrap_or_default(),
        offer_id: row.try_get("OfferId")?,
    })
}

fn decode_quote_deposit(row: &PgRow) -> Result<QuoteDeposit, LedgerError> {
    Ok(QuoteDeposit {
        id: row.try_get("Id")?,
        account_public_key: row.try_get("AccountPublicKey")?,
        amount: amount(row, "Amount")?,
        quote_id: number(row, "QuoteId")?,
        description: row
            .try_get::<Option<String>, _>("Description")?
            .unwrap_or_default(),
        block_id: optional_number(row, "BlockId")?,
        status: status(row, "Status", TxStatus::from_code)?,
        lock_time: optional_date(row, "LockTime")?,
        error_message: row
            .try_get::<Option<String>, _>("ErrorMessage")?
            .unwrap_or_default(),
    })
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn last_processed_block(&self) -> Result<Option<BlockNumber>, LedgerError> {
        let row = sqlx::query(
            r#"SELECT MAX("BlockNumber")::text AS "BlockNumber" FROM "UniqueProcessedBlock""#,
        )
        .fetch_one(&self.pool)
        .await?;
        optional_number(&row, "BlockNumber")
    }

    async fn record_processed_block(&self, block: BlockNumber) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            r#"INSERT INTO "UniqueProcessedBlock" ("BlockNumber", "ProcessDate")
               VALUES ($1::numeric, now() AT TIME ZONE 'UTC')
               ON CONFLICT ("BlockNumber") DO NOTHING"#,
        )
        .bind(to_db(block))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn fail_pending_nft_deposits(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        reason: &str,
    ) -> Result<u64, LedgerError> {
        let result = sqlx::query(
            r#"UPDATE "NftIncomingTransaction"
               SET "Status" = $1, "ErrorMessage" = $2
               WHERE "Status" = $3 AND "CollectionId" = $4::numeric AND "TokenId" = $5::numeric"#,
        )
        .bind(TxStatus::Failed.code())
        .bind(reason)
        .bind(TxStatus::Pending.code())
        .bind(to_db(collection_id))
        .bind(to_db(token_id))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_orphan_nft_deposits(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<u64, LedgerError> {
        let result = sqlx::query(
            r#"DELETE FROM "NftIncomingTransaction"
               WHERE "CollectionId" = $1::numeric AND "TokenId" = $2::numeric
                 AND "OfferId" IS NULL"#,
        )
        .bind(to_db(collection_id))
        .bind(to_db(token_id))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_nft_deposit(&self, deposit: &NftDeposit) -> Result<(), LedgerError> {
        sqlx::query(
            r#"INSERT INTO "NftIncomingTransaction"
               ("Id", "CollectionId", "TokenId", "Value", "OwnerPublicKey",
                "UniqueProcessedBlockId", "Status", "LockTime", "ErrorMessage", "OfferId")
               VALUES ($1, $2::numeric, $3::numeric, $4, $5, $6::numeric, $7, $8, $9, $10)"#,
        )
        .bind(deposit.id)
        .bind(to_db(deposit.collection_id))
        .bind(to_db(deposit.token_id))
        .bind(deposit.value.to_string())
        .bind(&deposit.owner_public_key)
        .bind(to_db(deposit.source_block))
        .bind(deposit.status.code())
        .bind(deposit.lock_time.map(|time| time.naive_utc()))
        .bind(&deposit.error_message)
        .bind(deposit.offer_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pending_nft_deposits(
        &self,
        skip: &[Uuid],
        limit: usize,
    ) -> Result<Vec<NftDeposit>, LedgerError> {
        let sql = format!(
            r#"SELECT {NFT_DEPOSIT_COLUMNS} FROM "NftIncomingTransaction"
               WHERE "Status" = $1 AND "Id" <> ALL($2)
               ORDER BY "LockTime" ASC NULLS FIRST
               LIMIT $3"#
        );
        let rows = sqlx::query(&sql)
            .bind(TxStatus::Pending.code())
            .bind(skip)
            .bind(limit_to_db(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_nft_deposit).collect()
    }

    async fn set_nft_deposit_status(
        &self,
        id: Uuid,
        status: TxStatus,
        error_message: &str,
    ) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            r#"UPDATE "NftIncomingTransaction"
               SET "Status" = $1, "ErrorMessage" = $2
               WHERE "Id" = $3 AND "Status" = $4"#,
        )
        .bind(status.code())
        .bind(error_message)
        .bind(id)
        .bind(TxStatus::Pending.code())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn latest_deposit_block(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<Option<BlockNumber>, LedgerError> {
        let row = sqlx::query(
            r#"SELECT MAX("UniqueProcessedBlockId")::text AS "Block" FROM "NftIncomingTransaction"
               WHERE "CollectionId" = $1::numeric AND "TokenId" = $2::numeric"#,
        )
        .bind(to_db(collection_id))
        .bind(to_db(token_id))
        .fetch_one(&self.pool)
        .await?;
        optional_number(&row, "Block")
    }

    async fn insert_offer(&self, offer: &Offer) -> Result<(), LedgerError> {
        sqlx::query(
            r#"INSERT INTO "Offer"
               ("Id", "CreationDate", "CollectionId", "TokenId", "Price", "Seller",
                "Metadata", "OfferStatus", "SellerPublicKeyBytes", "QuoteId")
               VALUES ($1, $2, $3::numeric, $4::numeric, $5, $6, $7, $8, $9, $10::numeric)"#,
        )
        .bind(offer.id)
        .bind(offer.creation_date.naive_utc())
        .bind(to_db(offer.collection_id))
        .bind(to_db(offer.token_id))
        .bind(offer.price.to_string())
        .bind(offer.seller.to_base64())
        .bind(metadata_to_db(&offer.metadata))
        .bind(offer.status.code())
        .bind(offer.seller.as_bytes().to_vec())
        .bind(to_db(offer.quote_id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn link_orphan_nft_deposits(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        offer_id: Uuid,
    ) -> Result<u64, LedgerError> {
        let result = sqlx::query(
            r#"UPDATE "NftIncomingTransaction"
               SET "OfferId" = $1
               WHERE "CollectionId" = $2::numeric AND "TokenId" = $3::numeric
                 AND "OfferId" IS NULL"#,
        )
        .bind(offer_id)
        .bind(to_db(collection_id))
        .bind(to_db(token_id))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn active_offer(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<Option<Offer>, LedgerError> {
        let sql = format!(
            r#"SELECT {OFFER_COLUMNS} FROM "Offer"
               WHERE "CollectionId" = $1::numeric AND "TokenId" = $2::numeric AND "OfferStatus" = $3
               ORDER BY "CreationDate" DESC
               LIMIT 1"#
        );
        let row = sqlx::query(&sql)
            .bind(to_db(collection_id))
            .bind(to_db(token_id))
            .bind(OfferStatus::Active.code())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_offer).transpose()
    }

    async fn active_offers(&self) -> Result<Vec<Offer>, LedgerError> {
        let sql = format!(
            r#"SELECT {OFFER_COLUMNS} FROM "Offer"
               WHERE "OfferStatus" = $1
               ORDER BY "CreationDate" ASC"#
        );
        let rows = sqlx::query(&sql)
            .bind(OfferStatus::Active.code())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_offer).collect()
    }

    async fn set_offer_status(&self, id: Uuid, status: OfferStatus) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            r#"UPDATE "Offer" SET "OfferStatus" = $1
               WHERE "Id" = $2 AND "OfferStatus" = $3"#,
        )
        .bind(status.code())
        .bind(id)
        .bind(OfferStatus::Active.code())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn settle_trade(
        &self,
        offer_id: Uuid,
        trade: &Trade,
        payout: &Payout,
    ) -> Result<bool, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            r#"UPDATE "Offer" SET "OfferStatus" = $1
               WHERE "Id" = $2 AND "OfferStatus" = $3"#,
        )
        .bind(OfferStatus::Traded.code())
        .bind(offer_id)
        .bind(OfferStatus::Active.code())
        .execute(&mut *tx)
        .await?;
        if flipped.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"INSERT INTO "Trade" ("Id", "TradeDate", "Buyer", "OfferId")
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(trade.id)
        .bind(trade.trade_date.naive_utc())
        .bind(trade.buyer.to_base64())
        .bind(trade.offer_id)
        .execute(&mut *tx)
        .await?;

        insert_payout_query(payout).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn insert_payout(&self, payout: &Payout) -> Result<(), LedgerError> {
        insert_payout_query(payout).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_quote_deposit(&self, deposit: &QuoteDeposit) -> Result<(), LedgerError> {
        sqlx::query(
            r#"INSERT INTO "QuoteIncomingTransaction"
               ("Id", "AccountPublicKey", "Amount", "QuoteId", "Description", "BlockId",
                "Status", "LockTime", "ErrorMessage")
               VALUES ($1, $2, $3, $4::numeric, $5, $6::numeric, $7, $8, $9)"#,
        )
        .bind(deposit.id)
        .bind(&deposit.account_public_key)
        .bind(deposit.amount.to_string())
        .bind(to_db(deposit.quote_id))
        .bind(&deposit.description)
        .bind(deposit.block_id.map(to_db))
        .bind(deposit.status.code())
        .bind(deposit.lock_time.map(|time| time.naive_utc()))
        .bind(&deposit.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pending_quote_deposits(
        &self,
        quote_id: QuoteId,
        skip: &[Uuid],
        limit: usize,
    ) -> Result<Vec<QuoteDeposit>, LedgerError> {
        let sql = format!(
            r#"SELECT {QUOTE_DEPOSIT_COLUMNS} FROM "QuoteIncomingTransaction"
               WHERE "Status" = $1 AND "QuoteId" = $2::numeric AND "Id" <> ALL($3)
               ORDER BY "LockTime" ASC NULLS FIRST
               LIMIT $4"#
        );
        let rows = sqlx::query(&sql)
            .bind(TxStatus::Pending.code())
            .bind(to_db(quote_id))
            .bind(skip)
            .bind(limit_to_db(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_quote_deposit).collect()
    }

    async fn set_quote_deposit_status(
        &self,
        id: Uuid,
        status: TxStatus,
        error_message: &str,
    ) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            r#"UPDATE "QuoteIncomingTransaction"
               SET "Status" = $1, "ErrorMessage" = $2
               WHERE "Id" = $3 AND "Status" = $4"#,
        )
        .bind(status.code())
        .bind(error_message)
        .bind(id)
        .bind(TxStatus::Pending.code())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

fn insert_payout_query(
    payout: &Payout,
) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        r#"INSERT INTO "QuoteOutgoingTransaction"
           ("Id", "Status", "ErrorMessage", "Value", "QuoteId", "RecipientPublicKey", "WithdrawType")
           VALUES ($1, $2, $3, $4, $5::numeric, $6, $7)"#,
    )
    .bind(payout.id)
    .bind(payout.status.code())
    .bind(&payout.error_message)
    .bind(payout.value.to_string())
    .bind(to_db(payout.quote_id))
    .bind(&payout.recipient_public_key)
    .bind(payout.withdraw_type.code())
}
