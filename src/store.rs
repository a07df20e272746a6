// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Persisted status cache.
//!
//! One row per transaction hash, partitioned into two tables because the
//! same hash value never appears on both chains. Rows are written only for
//! stable codes (the owning flow decides what is stable); the cache has no
//! TTL and no invalidation: a stable state observed on chain is immutable,
//! except when a composing flow advances it further.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use ethers::types::TxHash;
use tracing::info;

use crate::error::{TrackerError, TrackerResult};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub mod schema {
    diesel::table! {
        root_chain (txhash) {
            txhash -> Text,
            code -> SmallInt,
            msg -> Text,
        }
    }

    diesel::table! {
        child_chain (txhash) {
            txhash -> Text,
            code -> SmallInt,
            msg -> Text,
        }
    }
}

/// Which chain a transaction hash belongs to, and therefore which table its
/// cached status lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChainScope {
    Root,
    Child,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedStatus {
    pub tx_hash: TxHash,
    pub code: i32,
    pub message: String,
}

/// Pure memoization layer for stable transaction states. Callers only `put`
/// codes their flow classified as stable; transient codes are re-derived
/// from live sources on every request.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn get(&self, scope: ChainScope, tx_hash: TxHash) -> TrackerResult<Option<CachedStatus>>;

    /// Upsert: creates the row if absent, else updates code + message only.
    async fn put(
        &self,
        scope: ChainScope,
        tx_hash: TxHash,
        code: i32,
        message: &str,
    ) -> TrackerResult<()>;
}

#[derive(Insertable, Queryable)]
#[diesel(table_name = schema::root_chain)]
struct RootChainRow {
    txhash: String,
    code: i16,
    msg: String,
}

#[derive(Insertable, Queryable)]
#[diesel(table_name = schema::child_chain)]
struct ChildChainRow {
    txhash: String,
    code: i16,
    msg: String,
}

#[derive(Clone)]
pub struct PgStatusStore {
    pool: Pool<AsyncPgConnection>,
}

fn hash_key(tx_hash: TxHash) -> String {
    format!("{:?}", tx_hash)
}

fn storage_err<E: std::fmt::Display>(e: E) -> TrackerError {
    TrackerError::StorageError(e.to_string())
}

impl PgStatusStore {
    /// Connects a pool to the database at `database_url`. Instances can be
    /// cloned to share access to the same pool.
    pub async fn connect(database_url: &str, pool_size: u32) -> anyhow::Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder().max_size(pool_size).build(manager).await?;
        Ok(Self { pool })
    }

    /// Runs pending embedded migrations. Called once on startup; a failure
    /// here is fatal (the cache tables must exist before serving traffic).
    pub async fn run_migrations(database_url: &str) -> anyhow::Result<()> {
        info!("Running migrations ...");
        let conn = AsyncPgConnection::establish(database_url).await?;
        let mut wrapper: AsyncConnectionWrapper<AsyncPgConnection> = conn.into();

        let count = tokio::task::spawn_blocking(move || {
            wrapper
                .run_pending_migrations(MIGRATIONS)
                .map(|versions| versions.len())
                .map_err(|e| anyhow::anyhow!("Failed to run migrations: {:?}", e))
        })
        .await??;

        info!("Migrations complete ({} applied).", count);
        Ok(())
    }
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn get(&self, scope: ChainScope, tx_hash: TxHash) -> TrackerResult<Option<CachedStatus>> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let key = hash_key(tx_hash);

        let row: Option<(i16, String)> = match scope {
            ChainScope::Root => {
                use schema::root_chain::dsl::*;
                root_chain
                    .find(&key)
                    .select((code, msg))
                    .first(&mut conn)
                    .await
                    .optional()
                    .map_err(storage_err)?
            }
            ChainScope::Child => {
                use schema::child_chain::dsl::*;
                child_chain
                    .find(&key)
                    .select((code, msg))
                    .first(&mut conn)
                    .await
                    .optional()
                    .map_err(storage_err)?
            }
        };

        Ok(row.map(|(stored_code, stored_msg)| CachedStatus {
            tx_hash,
            code: stored_code as i32,
            message: stored_msg,
        }))
    }

    async fn put(
        &self,
        scope: ChainScope,
        tx_hash: TxHash,
        status_code: i32,
        message: &str,
    ) -> TrackerResult<()> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let key = hash_key(tx_hash);

        match scope {
            ChainScope::Root => {
                use schema::root_chain::dsl::*;
                let row = RootChainRow {
                    txhash: key,
                    code: status_code as i16,
                    msg: message.to_string(),
                };
                diesel::insert_into(root_chain)
                    .values(&row)
                    .on_conflict(txhash)
                    .do_update()
                    .set((code.eq(row.code), msg.eq(message)))
                    .execute(&mut conn)
                    .await
                    .map_err(storage_err)?;
            }
            ChainScope::Child => {
                use schema::child_chain::dsl::*;
                let row = ChildChainRow {
                    txhash: key,
                    code: status_code as i16,
                    msg: message.to_string(),
                };
                diesel::insert_into(child_chain)
                    .values(&row)
                    .on_conflict(txhash)
                    .do_update()
                    .set((code.eq(row.code), msg.eq(message)))
                    .execute(&mut conn)
                    .await
                    .map_err(storage_err)?;
            }
        }

        Ok(())
    }
}
