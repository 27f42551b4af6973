//! PostgreSQL persistence for custody records
//!
//! Async twin of the `CustodyStore` boundary, backed by `sqlx`. Strict
//! requirements:
//! - No cleartext secret material: every private blob arrives hex-encoded
//!   and already sealed
//! - Wrapped customer keys live in `identity_keys`, wrapped wallet secrets
//!   and their public metadata in `wallet_keys`
//! - The core never calls this module; callers persist the plain values the
//!   orchestrator returns
//!
//! `CustodyStore` is a sync trait, so `PostgresStore` does not implement it
//! directly; use the async methods here for PostgreSQL deployments.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{CustodyError, Result};
use crate::storage::{IdentityRecord, WalletAddresses, WalletRecord};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Persist a customer identity record, returning the new row id.
    pub async fn save_identity_record(&self, record: &IdentityRecord) -> Result<Uuid> {
        let row = sqlx::query(
            r#"
            INSERT INTO identity_keys
                (id, user_id, label, contact, public_key, wrapped_private_key, wrapped_revocation, revocation_digest, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.user_id)
        .bind(&record.label)
        .bind(&record.contact)
        .bind(&record.public_key)
        .bind(&record.wrapped_private_key)
        .bind(&record.wrapped_revocation)
        .bind(&record.revocation_digest)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CustodyError::Storage(format!("Failed to save identity record: {}", e)))?;

        Ok(row.get("id"))
    }

    /// Persist a protected wallet secret, returning the new row id.
    pub async fn save_wallet_record(&self, record: &WalletRecord) -> Result<Uuid> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallet_keys
                (id, user_id, wrapped_secret, public_key_hex, key_hash, address_mainnet, address_preprod, address_preview, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.user_id)
        .bind(&record.wrapped_secret)
        .bind(&record.public_key_hex)
        .bind(&record.key_hash)
        .bind(&record.address_mainnet)
        .bind(&record.address_preprod)
        .bind(&record.address_preview)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CustodyError::Storage(format!("Failed to save wallet record: {}", e)))?;

        Ok(row.get("id"))
    }

    /// Fetch a customer's wrapped private key (hex-encoded envelope JSON).
    pub async fn get_wrapped_private_key(&self, user_id: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT wrapped_private_key
            FROM identity_keys
            WHERE user_id = $1
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CustodyError::Storage(format!("Failed to get wrapped private key: {}", e)))?;

        Ok(row.map(|r| r.get("wrapped_private_key")))
    }

    /// Fetch a customer's wrapped wallet secret (hex-encoded envelope JSON).
    pub async fn get_wrapped_secret(&self, user_id: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT wrapped_secret
            FROM wallet_keys
            WHERE user_id = $1
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CustodyError::Storage(format!("Failed to get wrapped secret: {}", e)))?;

        Ok(row.map(|r| r.get("wrapped_secret")))
    }

    /// Fetch a customer's wallet addresses.
    pub async fn get_wallet_addresses(&self, user_id: &str) -> Result<Option<WalletAddresses>> {
        let row = sqlx::query(
            r#"
            SELECT address_mainnet, address_preprod, address_preview
            FROM wallet_keys
            WHERE user_id = $1
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CustodyError::Storage(format!("Failed to get wallet addresses: {}", e)))?;

        Ok(row.map(|r| WalletAddresses {
            mainnet: r.get("address_mainnet"),
            preprod: r.get("address_preprod"),
            preview: r.get("address_preview"),
        }))
    }

    /// Fetch the full identity record for a user.
    pub async fn get_identity_record(&self, user_id: &str) -> Result<Option<IdentityRecord>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, label, contact, public_key, wrapped_private_key, wrapped_revocation, revocation_digest, created_at
            FROM identity_keys
            WHERE user_id = $1
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CustodyError::Storage(format!("Failed to get identity record: {}", e)))?;

        Ok(row.map(|r| IdentityRecord {
            user_id: r.get("user_id"),
            label: r.get("label"),
            contact: r.get("contact"),
            public_key: r.get("public_key"),
            wrapped_private_key: r.get("wrapped_private_key"),
            wrapped_revocation: r.get("wrapped_revocation"),
            revocation_digest: r.get("revocation_digest"),
            created_at: r.get::<DateTime<Utc>, _>("created_at"),
        }))
    }
}
