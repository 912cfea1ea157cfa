#![cfg(feature = "test-utils")]

use std::time::Duration;

use migrate::error::ErrorKind;
use migrate::sink::postgres::PgSinkConnector;
use migrate::sink::{SinkConnection, SinkConnector};
use migrate::test_utils::database::{TestDatabase, spawn_sink_database};
use migrate::test_utils::schema::company_schema;
use migrate::types::{SinkRow, SinkValue};
use migrate_telemetry::tracing::init_test_tracing;

const CREATE_COMPANIES: &str = "CREATE TABLE public.companies (
    id text PRIMARY KEY,
    name text,
    latest_revenue bigint CHECK (latest_revenue >= 0),
    industries text[],
    has_website boolean,
    founded_year bigint
)";

async fn companies_database() -> Option<TestDatabase> {
    init_test_tracing();

    let database = spawn_sink_database().await?;
    database
        .connect()
        .await
        .execute(CREATE_COMPANIES, &[])
        .await
        .unwrap();

    Some(database)
}

fn connector(database: &TestDatabase) -> PgSinkConnector {
    PgSinkConnector::new(database.config.clone(), Duration::from_secs(5))
}

fn revenue_row(id: &str, revenue: i64) -> SinkRow {
    SinkRow::new(id)
        .with_value("name", SinkValue::Text(format!("Company {id}")))
        .with_value("latest_revenue", SinkValue::Integer(revenue))
}

async fn count_companies(database: &TestDatabase) -> i64 {
    database
        .connect()
        .await
        .query_one("SELECT count(*) FROM public.companies", &[])
        .await
        .unwrap()
        .get(0)
}

#[tokio::test(flavor = "multi_thread")]
async fn merge_policies_never_write_null_over_stored_values() {
    let Some(database) = companies_database().await else {
        return;
    };
    let schema = company_schema();
    let mut connection = connector(&database).connect().await.unwrap();

    let first = SinkRow::new("C1")
        .with_value("name", SinkValue::Text("Acme".to_string()))
        .with_value("latest_revenue", SinkValue::Integer(1_000_000))
        .with_value("industries", SinkValue::TextArray(vec!["IT".to_string()]))
        .with_value("has_website", SinkValue::Boolean(true))
        .with_value("founded_year", SinkValue::Integer(1990));
    assert_eq!(connection.upsert_batch(&schema, &[first]).await.unwrap(), 1);

    // No name and no industries, a new revenue and a different founding year.
    let second = SinkRow::new("C1")
        .with_value("latest_revenue", SinkValue::Integer(2_000_000))
        .with_value("has_website", SinkValue::Boolean(false))
        .with_value("founded_year", SinkValue::Integer(2001));
    assert_eq!(connection.upsert_batch(&schema, &[second]).await.unwrap(), 1);

    let row = database
        .connect()
        .await
        .query_one(
            "SELECT name, latest_revenue, industries, has_website, founded_year \
             FROM public.companies WHERE id = 'C1'",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(row.get::<_, Option<String>>(0).as_deref(), Some("Acme"));
    assert_eq!(row.get::<_, Option<i64>>(1), Some(2_000_000));
    assert_eq!(
        row.get::<_, Option<Vec<String>>>(2),
        Some(vec!["IT".to_string()])
    );
    assert_eq!(row.get::<_, Option<bool>>(3), Some(false));
    // Filled once, never overwritten.
    assert_eq!(row.get::<_, Option<i64>>(4), Some(1990));

    drop(connection);
    database.drop_database().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_row_rolls_back_the_whole_batch() {
    let Some(database) = companies_database().await else {
        return;
    };
    let schema = company_schema();
    let mut connection = connector(&database).connect().await.unwrap();

    let batch = vec![
        revenue_row("C1", 100),
        revenue_row("C2", -5),
        revenue_row("C3", 300),
    ];
    let err = connection.upsert_batch(&schema, &batch).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SinkConstraintViolation);
    assert_eq!(count_companies(&database).await, 0);

    // The connection is usable again once the failed transaction was rolled back.
    let batch = vec![revenue_row("C1", 100), revenue_row("C3", 300)];
    assert_eq!(connection.upsert_batch(&schema, &batch).await.unwrap(), 2);
    assert_eq!(count_companies(&database).await, 2);

    drop(connection);
    database.drop_database().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn terminated_connection_is_reopened_before_the_next_batch() {
    let Some(database) = companies_database().await else {
        return;
    };
    let schema = company_schema();
    let mut connection = connector(&database).connect().await.unwrap();

    assert_eq!(
        connection
            .upsert_batch(&schema, &[revenue_row("C1", 100)])
            .await
            .unwrap(),
        1
    );

    assert!(database.terminate_sessions().await >= 1);
    // Gives the connection task time to observe the closed socket.
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(
        connection
            .upsert_batch(&schema, &[revenue_row("C2", 200)])
            .await
            .unwrap(),
        1
    );
    assert_eq!(count_companies(&database).await, 2);

    drop(connection);
    database.drop_database().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_fails_with_a_connection_error() {
    let Some(database) = companies_database().await else {
        return;
    };

    let mut config = database.config.clone();
    config.port = 1;
    let err = PgSinkConnector::new(config, Duration::from_secs(2))
        .connect()
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::SinkConnectionFailed);

    database.drop_database().await;
}
