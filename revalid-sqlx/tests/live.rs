//! Tests against real servers.
//!
//! Run with `POSTGRES_URL` and/or `MYSQL_URL` set and `--ignored`.

use revalid_backend::{Freshness, Strategy, select_strategy};
use revalid_core::{CancellationToken, Connection, TokenSupplier};
use revalid_sqlx::{MySqlPoolSupplier, MySqlSession, PgPoolSupplier, PgSession};
use sqlx::mysql::MySqlPool;
use sqlx::postgres::PgPool;
use sqlx::Connection as _;

fn env(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set"))
}

fn request() -> http::request::Parts {
    http::Request::new(()).into_parts().0
}

#[tokio::test]
#[ignore = "requires POSTGRES_URL"]
async fn postgres_token_moves_on_commit() {
    let pool = PgPool::connect(&env("POSTGRES_URL")).await.unwrap();
    sqlx::raw_sql("create table if not exists revalid_writes (id serial primary key)")
        .execute(&pool)
        .await
        .unwrap();

    let supplier = PgPoolSupplier::new(pool.clone());
    let cancel = CancellationToken::new();

    let before = supplier.token(&request(), &cancel).await.unwrap();
    let again = supplier.token(&request(), &cancel).await.unwrap();
    assert_eq!(before, again);

    sqlx::raw_sql("insert into revalid_writes default values")
        .execute(&pool)
        .await
        .unwrap();

    let after = supplier.token(&request(), &cancel).await.unwrap();
    assert_ne!(before, after);
    assert!(supplier.freshness().cache().get().is_some());
}

#[tokio::test]
#[ignore = "requires POSTGRES_URL"]
async fn postgres_commit_counter_sees_an_older_transaction_commit() {
    let pool = PgPool::connect(&env("POSTGRES_URL")).await.unwrap();
    sqlx::raw_sql("create table if not exists revalid_writes (id serial primary key)")
        .execute(&pool)
        .await
        .unwrap();

    let freshness = Freshness::new();
    freshness.cache().set(Strategy::PostgresCommitCounter);
    let supplier = PgPoolSupplier::with_freshness(pool.clone(), freshness);
    let cancel = CancellationToken::new();

    // the older transaction takes its xid first
    let mut older = sqlx::PgConnection::connect(&env("POSTGRES_URL")).await.unwrap();
    let mut older_tx = older.begin().await.unwrap();
    sqlx::raw_sql("insert into revalid_writes default values")
        .execute(&mut *older_tx)
        .await
        .unwrap();

    sqlx::raw_sql("insert into revalid_writes default values")
        .execute(&pool)
        .await
        .unwrap();
    let before = supplier.token(&request(), &cancel).await.unwrap();

    older_tx.commit().await.unwrap();
    let after = supplier.token(&request(), &cancel).await.unwrap();

    assert_ne!(before, after);
    assert_eq!(
        supplier.freshness().cache().get(),
        Some(Strategy::PostgresCommitCounter)
    );
}

#[tokio::test]
#[ignore = "requires POSTGRES_URL"]
async fn postgres_borrowed_session_runs_inside_a_transaction() {
    let mut conn = sqlx::PgConnection::connect(&env("POSTGRES_URL")).await.unwrap();
    let mut tx = conn.begin().await.unwrap();

    let mut session = PgSession::borrowed(&mut *tx);
    assert!(session.is_open());
    let strategy = select_strategy(&mut session, None).await.unwrap();
    assert_eq!(strategy.family(), revalid_core::BackendFamily::Postgres);

    let token = Freshness::new()
        .token(&mut session, None, &CancellationToken::new())
        .await
        .unwrap();
    assert!(session.is_open());
    drop(session);

    tx.rollback().await.unwrap();
    assert!(!token.as_str().is_empty() || strategy == Strategy::PostgresCommittedXact);
}

#[tokio::test]
#[ignore = "requires POSTGRES_URL"]
async fn postgres_detached_session_is_closed_after_use() {
    let options = env("POSTGRES_URL").parse().unwrap();
    let mut session = PgSession::detached(options);

    Freshness::new()
        .token(&mut session, None, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!session.is_open());
}

#[tokio::test]
#[ignore = "requires MYSQL_URL"]
async fn mysql_token_moves_on_commit() {
    let pool = MySqlPool::connect(&env("MYSQL_URL")).await.unwrap();
    sqlx::raw_sql(
        "create table if not exists revalid_writes (id int auto_increment primary key) engine=InnoDB",
    )
    .execute(&pool)
    .await
    .unwrap();

    let supplier = MySqlPoolSupplier::new(pool.clone());
    let cancel = CancellationToken::new();

    let before = supplier.token(&request(), &cancel).await.unwrap();
    sqlx::raw_sql("insert into revalid_writes () values ()")
        .execute(&pool)
        .await
        .unwrap();
    let after = supplier.token(&request(), &cancel).await.unwrap();
    assert_ne!(before, after);
}

#[tokio::test]
#[ignore = "requires MYSQL_URL"]
async fn mysql_pooled_session_releases_on_close() {
    let pool = MySqlPool::connect(&env("MYSQL_URL")).await.unwrap();
    let mut session = MySqlSession::pooled(pool.clone());

    session.open().await.unwrap();
    assert!(session.is_open());
    session.close().await.unwrap();
    assert!(!session.is_open());
}
