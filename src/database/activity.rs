// ABOUTME: Append-only audit trail of account actions
// ABOUTME: Records logins and account changes with caller address and user agent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{ActivityAction, ActivityLogEntry, ClientInfo};

impl Database {
    pub(super) async fn migrate_activity(&self) -> AppResult<()> {
        // user_id has no foreign key: entries outlive deleted accounts
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS activity_logs (
                id TEXT PRIMARY KEY,
                user_id TEXT,
                action TEXT NOT NULL,
                details TEXT NOT NULL DEFAULT '{}',
                ip_address TEXT,
                user_agent TEXT,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create activity_logs: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_activity_logs_user ON activity_logs(user_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create activity index: {e}")))?;

        Ok(())
    }

    /// Append an audit entry
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the insert fails
    pub async fn record_activity(
        &self,
        user_id: Option<Uuid>,
        action: ActivityAction,
        details: serde_json::Value,
        client: &ClientInfo,
    ) -> AppResult<ActivityLogEntry> {
        let entry = ActivityLogEntry {
            id: Uuid::new_v4(),
            user_id,
            action,
            details,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r"
            INSERT INTO activity_logs (id, user_id, action, details, ip_address, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(entry.id.to_string())
        .bind(user_id.map(|id| id.to_string()))
        .bind(action.as_str())
        .bind(serde_json::to_string(&entry.details)?)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(format_timestamp(entry.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to record activity: {e}")))?;

        Ok(entry)
    }

    /// Most recent audit entries of a user, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is malformed
    pub async fn list_user_activity(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<ActivityLogEntry>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, action, details, ip_address, user_agent, created_at
            FROM activity_logs WHERE user_id = $1
            ORDER BY created_at DESC, rowid DESC
            LIMIT $2
            ",
        )
        .bind(user_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list activity: {e}")))?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let user_id: Option<String> = row.get("user_id");
                let action: String = row.get("action");
                let details: String = row.get("details");
                let created_at: String = row.get("created_at");

                Ok(ActivityLogEntry {
                    id: parse_uuid(&id)?,
                    user_id: user_id.as_deref().map(parse_uuid).transpose()?,
                    action: action.parse()?,
                    details: serde_json::from_str(&details)?,
                    ip_address: row.get("ip_address"),
                    user_agent: row.get("user_agent"),
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }
}
