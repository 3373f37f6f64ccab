//! Metrics extend functions

use std::collections::BTreeMap;

use genesis_core::error::{EngineError, EngineResult};
use genesis_core::{tables, Value};
use genesis_db::SelectQuery;

use super::arg_str;
use crate::context::SmartContract;

/// `DBSelectMetrics(metric, timeInterval, aggregateFunc)` → rows of
/// `{key, value}` aggregated per key. The interval argument keeps the
/// original call shape; stored samples are already windowed by the
/// collector.
pub async fn db_select_metrics(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    let metric = arg_str(&args, 0, "DBSelectMetrics")?;
    let _interval = arg_str(&args, 1, "DBSelectMetrics")?;
    let aggregate = arg_str(&args, 2, "DBSelectMetrics")?;

    let rows = sc
        .db
        .select(&SelectQuery::new(tables::METRICS).filter("metric", Value::Str(metric.clone())))
        .await?;

    let mut grouped: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    for row in rows {
        let key = row.get("key").map(|v| v.to_display()).unwrap_or_default();
        let value = row
            .get("value")
            .and_then(|v| v.to_int().ok())
            .unwrap_or_default();
        grouped.entry(key).or_default().push(value);
    }

    let mut out = Vec::new();
    for (key, values) in grouped {
        let value = match aggregate.as_str() {
            "max" => values.iter().max().copied().unwrap_or(0),
            "min" => values.iter().min().copied().unwrap_or(0),
            "avg" => {
                if values.is_empty() {
                    0
                } else {
                    values.iter().sum::<i64>() / values.len() as i64
                }
            }
            "sum" => values.iter().sum(),
            other => {
                return Err(EngineError::InvalidObject(format!(
                    "unknown aggregate function {}",
                    other
                )))
            }
        };
        let mut row = BTreeMap::new();
        row.insert("key".to_string(), Value::Str(key));
        row.insert("value".to_string(), Value::Int(value));
        out.push(Value::Map(row));
    }
    Ok(Value::Array(out))
}

/// `DBCollectMetrics()` → current values of all tracked metrics, ready
/// for storage by the metrics contract.
pub async fn db_collect_metrics(sc: &mut SmartContract) -> EngineResult<Value> {
    let ecosystems = sc.db.select(&SelectQuery::new(tables::ECOSYSTEMS)).await?;

    let mut out = Vec::new();
    for eco_row in ecosystems {
        let eco = eco_row
            .get("id")
            .and_then(|v| v.to_int().ok())
            .unwrap_or_default();
        if eco == 0 {
            continue;
        }

        let table_count = sc.db.count(&tables::definitions(eco)).await.unwrap_or(0);
        let mut row = BTreeMap::new();
        row.insert("time".to_string(), Value::Int(sc.tx.time));
        row.insert("metric".to_string(), Value::Str("ecosystem_tables".into()));
        row.insert("key".to_string(), Value::Str(eco.to_string()));
        row.insert("value".to_string(), Value::Int(table_count));
        out.push(Value::Map(row));

        let txes = sc
            .db
            .select(
                &SelectQuery::new(tables::TRANSACTIONS_STATUS)
                    .filter("ecosystem", Value::Int(eco)),
            )
            .await?
            .len() as i64;
        let mut row = BTreeMap::new();
        row.insert("time".to_string(), Value::Int(sc.tx.time));
        row.insert("metric".to_string(), Value::Str("ecosystem_tx".into()));
        row.insert("key".to_string(), Value::Str(eco.to_string()));
        row.insert("value".to_string(), Value::Int(txes));
        out.push(Value::Map(row));
    }
    Ok(Value::Array(out))
}
