use querypilot::error::QueryPilotError;
use querypilot::interfaces::stores::SqlRunner;
use querypilot::runner::SqliteSqlRunner;

async fn seeded_runner(row_limit: usize, rows: usize) -> SqliteSqlRunner {
    let runner = SqliteSqlRunner::open_in_memory(row_limit).await.unwrap();
    runner
        .connection()
        .call(move |conn| {
            conn.execute_batch(
                "CREATE TABLE FactInternetSales (
                    OrderKey INTEGER PRIMARY KEY,
                    SalesAmount REAL NOT NULL,
                    Region TEXT DEFAULT 'NA'
                );",
            )?;
            for i in 0..rows {
                conn.execute(
                    "INSERT INTO FactInternetSales (SalesAmount) VALUES (?1)",
                    rusqlite::params![i as f64],
                )?;
            }
            Ok(())
        })
        .await
        .unwrap();
    runner
}

#[tokio::test]
async fn unbounded_select_is_capped() {
    let runner = seeded_runner(100, 150).await;
    let result = runner.run_sql("SELECT * FROM FactInternetSales").await;
    assert!(result.error.is_none());
    assert_eq!(result.row_count, 100);
    assert_eq!(result.columns, vec!["OrderKey", "SalesAmount", "Region"]);
}

#[tokio::test]
async fn explicit_limit_is_respected() {
    let runner = seeded_runner(100, 150).await;
    let result = runner
        .run_sql("SELECT OrderKey FROM FactInternetSales LIMIT 5;")
        .await;
    assert!(result.error.is_none());
    assert_eq!(result.row_count, 5);
}

#[tokio::test]
async fn non_select_statements_are_refused() {
    let runner = seeded_runner(100, 3).await;
    let result = runner.run_sql("DELETE FROM FactInternetSales").await;
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("only SELECT statements"));

    // Nothing was deleted.
    let count = runner
        .run_sql("SELECT COUNT(*) AS n FROM FactInternetSales")
        .await;
    assert_eq!(count.rows[0][0], serde_json::json!(3));
}

#[tokio::test]
async fn execution_errors_come_back_in_the_result() {
    let runner = seeded_runner(100, 1).await;
    let result = runner.run_sql("SELECT Amount FROM FactInternetSales").await;
    let error = result.error.as_deref().unwrap();
    assert!(error.contains("Amount"));
    assert_eq!(result.row_count, 0);
    assert!(result.columns.is_empty());
}

#[tokio::test]
async fn value_types_round_trip_to_json() {
    let runner = seeded_runner(100, 1).await;
    let result = runner
        .run_sql("SELECT OrderKey, SalesAmount, Region, NULL AS missing FROM FactInternetSales")
        .await;
    assert!(result.error.is_none());
    let row = &result.rows[0];
    assert_eq!(row[0], serde_json::json!(1));
    assert_eq!(row[1], serde_json::json!(0.0));
    assert_eq!(row[2], serde_json::json!("NA"));
    assert_eq!(row[3], serde_json::Value::Null);
}

#[tokio::test]
async fn list_and_describe_tables() {
    let runner = seeded_runner(100, 1).await;
    assert_eq!(
        runner.list_tables().await.unwrap(),
        vec!["FactInternetSales"]
    );

    let columns = runner.describe_table("FactInternetSales").await.unwrap();
    assert_eq!(columns.len(), 3);
    assert_eq!(columns[0].name, "OrderKey");
    let amount = &columns[1];
    assert_eq!(amount.data_type, "REAL");
    assert!(!amount.nullable);
    let region = &columns[2];
    assert!(region.nullable);
    assert_eq!(region.default.as_deref(), Some("'NA'"));
}

#[tokio::test]
async fn describe_rejects_bad_names() {
    let runner = seeded_runner(100, 1).await;
    assert!(matches!(
        runner.describe_table("x; DROP TABLE y").await.unwrap_err(),
        QueryPilotError::Validation(_)
    ));
    assert!(matches!(
        runner.describe_table("NoSuchTable").await.unwrap_err(),
        QueryPilotError::NotFound(_)
    ));
}
