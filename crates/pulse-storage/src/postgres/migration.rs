//! 스키마 마이그레이션.
//!
//! 버전 기반 PostgreSQL 스키마 관리. 여러 서버가 동시에 떠도
//! 트랜잭션 advisory lock으로 한 번만 적용된다.

use sqlx::PgPool;
use tracing::{debug, info};

/// 마이그레이션 직렬화용 advisory lock 키
const MIGRATION_LOCK_KEY: i64 = 0x7075_6c73_655f_7631;

/// (버전, SQL) 목록. 버전 순서대로 한 번씩 적용된다.
const MIGRATIONS: &[(i32, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS metrics (
        name  TEXT PRIMARY KEY,
        mtype TEXT NOT NULL,
        value DOUBLE PRECISION,
        delta BIGINT
    )",
)];

/// 현재 스키마 버전
pub const CURRENT_VERSION: i32 = 1;

/// 스키마 마이그레이션 실행
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(&mut *tx)
    .await?;

    let current: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(&mut *tx)
        .await?;
    info!("현재 스키마 버전: {current}, 목표: {CURRENT_VERSION}");

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        sqlx::query(sql).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
            .bind(*version)
            .execute(&mut *tx)
            .await?;
        debug!("마이그레이션 v{version} 적용");
    }

    tx.commit().await
}
