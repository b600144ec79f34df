//! SQLite implementation of [`ScreeningStore`]

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use aml_core::{
    BlockchainFamily, Check, CheckHistory, CheckId, CheckStatus, CredentialKey, CredentialSet,
    Direction, NewCheck, NewHistory, PendingEntry, ProviderCurrency, ProviderId, QueueEntry,
    RiskLevel, Score, UserId,
};

use crate::error::{StoreError, StoreResult};
use crate::schema;
use crate::traits::{AuditReport, CheckFilter, PollDecision, ScreeningStore};

const CHECK_COLUMNS: &str = "c.id, c.user_id, c.provider, c.tx_id, c.currency_id, c.direction, \
     c.output_address, c.external_id, c.status, c.score, c.risk_level, c.created_at, c.updated_at";

/// Write transactions take the database write lock up front, so a busy
/// database waits on the busy timeout instead of failing a lock upgrade.
const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Store backed by a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open `url`, creating the database file if needed.
    ///
    /// In-memory databases get a single long-lived connection so every
    /// caller sees the same data.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = if url.contains(":memory:") || url.contains("mode=memory") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(8)
                .connect_with(options)
                .await?
        };

        Ok(Self::new(pool))
    }

    /// Fresh in-memory store with the schema applied
    pub async fn in_memory() -> StoreResult<Self> {
        let store = Self::connect("sqlite::memory:").await?;
        store.migrate().await?;
        Ok(store)
    }

    /// Create tables and indexes if missing
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!(statements = schema::STATEMENTS.len(), "Schema applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {raw:?}: {e}")))
}

fn parse_id(raw: &str) -> StoreResult<CheckId> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("bad check id {raw:?}: {e}")))
}

fn to_u32(value: i64, column: &str) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

fn check_from_row(row: &SqliteRow) -> StoreResult<Check> {
    let id: String = row.try_get("id")?;
    let provider: String = row.try_get("provider")?;
    let direction: String = row.try_get("direction")?;
    let status: String = row.try_get("status")?;
    let score: String = row.try_get("score")?;
    let risk_level: String = row.try_get("risk_level")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Check {
        id: parse_id(&id)?,
        user_id: row.try_get("user_id")?,
        provider: ProviderId::from_slug(&provider)?,
        tx_id: row.try_get("tx_id")?,
        currency_id: row.try_get("currency_id")?,
        direction: Direction::from_str(&direction)?,
        output_address: row.try_get("output_address")?,
        external_id: row.try_get("external_id")?,
        status: CheckStatus::from_str(&status)?,
        score: Score::from_str(&score)?,
        risk_level: RiskLevel::from_str(&risk_level)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn history_from_row(row: &SqliteRow) -> StoreResult<CheckHistory> {
    let check_id: String = row.try_get("check_id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(CheckHistory {
        id: row.try_get("id")?,
        check_id: parse_id(&check_id)?,
        request: row.try_get("request")?,
        response: row.try_get("response")?,
        error: row.try_get("error")?,
        attempt: to_u32(row.try_get("attempt")?, "attempt")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn currency_from_row(row: &SqliteRow) -> StoreResult<ProviderCurrency> {
    let provider: String = row.try_get("provider")?;
    let family: String = row.try_get("family")?;

    Ok(ProviderCurrency {
        provider: ProviderId::from_slug(&provider)?,
        currency_id: row.try_get("currency_id")?,
        code: row.try_get("code")?,
        asset: row.try_get("asset")?,
        network: row.try_get("network")?,
        token_id: row.try_get("token_id")?,
        family: BlockchainFamily::from_str(&family)?,
    })
}

fn ids_from_rows(rows: &[SqliteRow]) -> StoreResult<Vec<CheckId>> {
    rows.iter()
        .map(|row| {
            let id: String = row.try_get("id")?;
            parse_id(&id)
        })
        .collect()
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &CheckFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(user_id) = filter.user_id {
        builder.push(" AND c.user_id = ").push_bind(user_id);
    }
    if let Some(provider) = filter.provider {
        builder.push(" AND c.provider = ").push_bind(provider.slug());
    }
    if let Some(status) = filter.status {
        builder.push(" AND c.status = ").push_bind(status.code());
    }
    if let Some(from) = filter.created_from {
        builder.push(" AND c.created_at >= ").push_bind(timestamp(from));
    }
    if let Some(to) = filter.created_to {
        builder.push(" AND c.created_at < ").push_bind(timestamp(to));
    }
}

async fn insert_history(
    conn: &mut SqliteConnection,
    check_id: CheckId,
    history: &NewHistory,
    attempt: u32,
    at: DateTime<Utc>,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO check_history (check_id, request, response, error, attempt, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(check_id.to_string())
    .bind(&history.request)
    .bind(&history.response)
    .bind(&history.error)
    .bind(i64::from(attempt))
    .bind(timestamp(at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl ScreeningStore for SqliteStore {
    async fn create_screening(&self, check: NewCheck, history: NewHistory) -> StoreResult<Check> {
        let at = now();
        let check = Check {
            id: Uuid::new_v4(),
            user_id: check.user_id,
            provider: check.provider,
            tx_id: check.tx_id,
            currency_id: check.currency_id,
            direction: check.direction,
            output_address: check.output_address,
            external_id: check.external_id,
            status: check.status,
            score: check.score,
            risk_level: check.risk_level,
            created_at: at,
            updated_at: at,
        };

        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;

        sqlx::query(
            r#"
            INSERT INTO checks (id, user_id, provider, tx_id, currency_id, direction,
                output_address, external_id, status, score, risk_level, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(check.id.to_string())
        .bind(check.user_id)
        .bind(check.provider.slug())
        .bind(&check.tx_id)
        .bind(check.currency_id)
        .bind(check.direction.code())
        .bind(&check.output_address)
        .bind(&check.external_id)
        .bind(check.status.code())
        .bind(check.score.to_string())
        .bind(check.risk_level.code())
        .bind(timestamp(at))
        .bind(timestamp(at))
        .execute(&mut *tx)
        .await?;

        insert_history(&mut *tx, check.id, &history, 1, at).await?;

        if check.is_pending() {
            sqlx::query("INSERT INTO check_queue (check_id, attempts, created_at) VALUES (?, 1, ?)")
                .bind(check.id.to_string())
                .bind(timestamp(at))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(check)
    }

    async fn pending_entries(&self, limit: u32) -> StoreResult<Vec<PendingEntry>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CHECK_COLUMNS},
                q.attempts AS queue_attempts,
                COALESCE(u.utc_offset_secs, 0) AS utc_offset_secs
            FROM check_queue q
            JOIN checks c ON c.id = q.check_id
            LEFT JOIN users u ON u.id = c.user_id
            WHERE c.status = 'pending'
            ORDER BY q.created_at, q.check_id
            LIMIT ?
            "#
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let check = check_from_row(row)?;
                let offset: i64 = row.try_get("utc_offset_secs")?;
                Ok(PendingEntry {
                    entry: QueueEntry {
                        check_id: check.id,
                        attempts: to_u32(row.try_get("queue_attempts")?, "attempts")?,
                    },
                    check,
                    user_utc_offset_secs: i32::try_from(offset).map_err(|_| {
                        StoreError::Corrupt(format!("utc offset out of range: {offset}"))
                    })?,
                })
            })
            .collect()
    }

    async fn record_poll(
        &self,
        entry: QueueEntry,
        history: NewHistory,
        decision: PollDecision,
    ) -> StoreResult<u32> {
        let check_id = entry.check_id.to_string();
        let at = now();
        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;

        let queued: Option<i64> =
            sqlx::query_scalar("SELECT attempts FROM check_queue WHERE check_id = ?")
                .bind(&check_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(queued) = queued else {
            return Err(StoreError::NotQueued(entry.check_id));
        };
        let queued = to_u32(queued, "attempts")?;
        if queued != entry.attempts {
            return Err(StoreError::StaleEntry {
                check_id: entry.check_id,
                expected: entry.attempts,
                found: queued,
            });
        }

        let last: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(attempt), 0) FROM check_history WHERE check_id = ?",
        )
        .bind(&check_id)
        .fetch_one(&mut *tx)
        .await?;
        let attempt = to_u32(last, "attempt")? + 1;

        insert_history(&mut *tx, entry.check_id, &history, attempt, at).await?;

        let updated = match decision {
            PollDecision::Retry { score } => {
                let updated = sqlx::query(
                    r#"
                    UPDATE checks SET score = COALESCE(?, score), updated_at = ?
                    WHERE id = ? AND status = 'pending'
                    "#,
                )
                .bind(score.map(|s| s.to_string()))
                .bind(timestamp(at))
                .bind(&check_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

                sqlx::query("UPDATE check_queue SET attempts = attempts + 1 WHERE check_id = ?")
                    .bind(&check_id)
                    .execute(&mut *tx)
                    .await?;
                updated
            }
            PollDecision::Finalize {
                status,
                score,
                risk_level,
            } => {
                if !CheckStatus::Pending.can_transition_to(status) {
                    return Err(StoreError::Corrupt(format!(
                        "cannot finalize check {} as {status}",
                        entry.check_id
                    )));
                }

                let updated = sqlx::query(
                    r#"
                    UPDATE checks SET status = ?, score = ?, risk_level = ?, updated_at = ?
                    WHERE id = ? AND status = 'pending'
                    "#,
                )
                .bind(status.code())
                .bind(score.to_string())
                .bind(risk_level.code())
                .bind(timestamp(at))
                .bind(&check_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

                sqlx::query("DELETE FROM check_queue WHERE check_id = ?")
                    .bind(&check_id)
                    .execute(&mut *tx)
                    .await?;
                updated
            }
        };

        if updated == 0 {
            return Err(StoreError::NotPending(entry.check_id));
        }

        tx.commit().await?;
        Ok(attempt)
    }

    async fn get_check(&self, id: CheckId) -> StoreResult<Option<Check>> {
        let row = sqlx::query(&format!("SELECT {CHECK_COLUMNS} FROM checks c WHERE c.id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(check_from_row).transpose()
    }

    async fn queue_entry(&self, id: CheckId) -> StoreResult<Option<QueueEntry>> {
        let attempts: Option<i64> =
            sqlx::query_scalar("SELECT attempts FROM check_queue WHERE check_id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        attempts
            .map(|attempts| {
                Ok(QueueEntry {
                    check_id: id,
                    attempts: to_u32(attempts, "attempts")?,
                })
            })
            .transpose()
    }

    async fn checks_page(
        &self,
        filter: &CheckFilter,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<Check>, u64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS n FROM checks c");
        push_filter(&mut count, filter);
        let total: i64 = count.build().fetch_one(&self.pool).await?.try_get("n")?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {CHECK_COLUMNS} FROM checks c"));
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY c.created_at DESC, c.id LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(offset).unwrap_or(i64::MAX));

        let rows = select.build().fetch_all(&self.pool).await?;
        let checks = rows.iter().map(check_from_row).collect::<StoreResult<Vec<_>>>()?;

        Ok((checks, u64::try_from(total).unwrap_or_default()))
    }

    async fn history_for(&self, check_ids: &[CheckId]) -> StoreResult<Vec<CheckHistory>> {
        if check_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, check_id, request, response, error, attempt, created_at \
             FROM check_history WHERE check_id IN (",
        );
        let mut ids = builder.separated(", ");
        for id in check_ids {
            ids.push_bind(id.to_string());
        }
        ids.push_unseparated(") ORDER BY check_id, attempt");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(history_from_row).collect()
    }

    async fn credentials(
        &self,
        user_id: UserId,
        provider: ProviderId,
    ) -> StoreResult<CredentialSet> {
        let rows = sqlx::query("SELECT key, value FROM credentials WHERE user_id = ? AND provider = ?")
            .bind(user_id)
            .bind(provider.slug())
            .fetch_all(&self.pool)
            .await?;

        let mut credentials = CredentialSet::new();
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            credentials.insert(CredentialKey::from_str(&key)?, value);
        }
        Ok(credentials)
    }

    async fn save_credentials(
        &self,
        user_id: UserId,
        provider: ProviderId,
        credentials: &CredentialSet,
    ) -> StoreResult<()> {
        let at = timestamp(now());
        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;

        sqlx::query("DELETE FROM credentials WHERE user_id = ? AND provider = ?")
            .bind(user_id)
            .bind(provider.slug())
            .execute(&mut *tx)
            .await?;

        for (key, value) in credentials.iter() {
            sqlx::query(
                r#"
                INSERT INTO credentials (user_id, provider, key, value, updated_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(provider.slug())
            .bind(key.code())
            .bind(value)
            .bind(&at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_credentials(&self, user_id: UserId, provider: ProviderId) -> StoreResult<bool> {
        let removed = sqlx::query("DELETE FROM credentials WHERE user_id = ? AND provider = ?")
            .bind(user_id)
            .bind(provider.slug())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(removed > 0)
    }

    async fn provider_currency(
        &self,
        provider: ProviderId,
        currency_id: i64,
    ) -> StoreResult<Option<ProviderCurrency>> {
        let row = sqlx::query(
            r#"
            SELECT provider, currency_id, code, asset, network, token_id, family
            FROM provider_currencies
            WHERE provider = ? AND currency_id = ?
            "#,
        )
        .bind(provider.slug())
        .bind(currency_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(currency_from_row).transpose()
    }

    async fn supported_currencies(
        &self,
        provider: ProviderId,
    ) -> StoreResult<Vec<ProviderCurrency>> {
        let rows = sqlx::query(
            r#"
            SELECT provider, currency_id, code, asset, network, token_id, family
            FROM provider_currencies
            WHERE provider = ?
            ORDER BY currency_id
            "#,
        )
        .bind(provider.slug())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(currency_from_row).collect()
    }

    async fn upsert_currency(&self, currency: &ProviderCurrency) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO provider_currencies (provider, currency_id, code, asset, network, token_id, family)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(provider, currency_id) DO UPDATE SET
                code = excluded.code,
                asset = excluded.asset,
                network = excluded.network,
                token_id = excluded.token_id,
                family = excluded.family
            "#,
        )
        .bind(currency.provider.slug())
        .bind(currency.currency_id)
        .bind(&currency.code)
        .bind(&currency.asset)
        .bind(&currency.network)
        .bind(&currency.token_id)
        .bind(currency.family.code())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_user(&self, user_id: UserId, utc_offset_secs: i32) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, utc_offset_secs, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET utc_offset_secs = excluded.utc_offset_secs
            "#,
        )
        .bind(user_id)
        .bind(utc_offset_secs)
        .bind(timestamp(now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn user_utc_offset(&self, user_id: UserId) -> StoreResult<Option<i32>> {
        let offset: Option<i32> =
            sqlx::query_scalar("SELECT utc_offset_secs FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(offset)
    }

    async fn audit(&self) -> StoreResult<AuditReport> {
        let totals = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM checks) AS checks,
                (SELECT COUNT(*) FROM checks WHERE status = 'pending') AS pending,
                (SELECT COUNT(*) FROM check_queue) AS queued
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let pending_without_queue = sqlx::query(
            r#"
            SELECT c.id AS id FROM checks c
            LEFT JOIN check_queue q ON q.check_id = c.id
            WHERE c.status = 'pending' AND q.check_id IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let queued_not_pending = sqlx::query(
            r#"
            SELECT q.check_id AS id FROM check_queue q
            LEFT JOIN checks c ON c.id = q.check_id
            WHERE c.id IS NULL OR c.status <> 'pending'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let history_gaps = sqlx::query(
            r#"
            SELECT c.id AS id FROM checks c
            LEFT JOIN (
                SELECT check_id, COUNT(*) AS n, MIN(attempt) AS lo, MAX(attempt) AS hi
                FROM check_history GROUP BY check_id
            ) h ON h.check_id = c.id
            WHERE h.check_id IS NULL OR h.lo <> 1 OR h.hi <> h.n
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let attempt_mismatches = sqlx::query(
            r#"
            SELECT q.check_id AS id FROM check_queue q
            LEFT JOIN (
                SELECT check_id, COUNT(*) AS n FROM check_history GROUP BY check_id
            ) h ON h.check_id = q.check_id
            WHERE h.n IS NULL OR h.n <> q.attempts
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let count = |column: &str| -> StoreResult<u64> {
            let value: i64 = totals.try_get(column)?;
            Ok(u64::try_from(value).unwrap_or_default())
        };

        Ok(AuditReport {
            checks: count("checks")?,
            pending: count("pending")?,
            queued: count("queued")?,
            pending_without_queue: ids_from_rows(&pending_without_queue)?,
            queued_not_pending: ids_from_rows(&queued_not_pending)?,
            history_gaps: ids_from_rows(&history_gaps)?,
            attempt_mismatches: ids_from_rows(&attempt_mismatches)?,
        })
    }
}
