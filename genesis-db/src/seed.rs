//! Initial chain state
//!
//! `init_database` seeds the system ecosystem: default system parameters,
//! the ecosystem row, the founder key and the table-permission
//! definitions the access layer reads. `exec_ecosystem_schema` is the
//! shared bootstrap used both here and by the `CreateEcosystem` host
//! function.

use genesis_core::{syspar_names, tables, Value};
use tracing::info;

use crate::error::DbResult;
use crate::schema;
use crate::spi::{row, Row, StoreTx};

/// Default system parameters written at database initialization.
///
/// `commission_wallet` and `fuel_rate` are JSON arrays of
/// `[ecosystem, value]` string pairs.
pub fn default_system_parameters(founder: i64) -> Vec<(&'static str, String)> {
    vec![
        ("default_ecosystem_page", String::new()),
        ("default_ecosystem_menu", String::new()),
        ("default_ecosystem_contract", String::new()),
        (syspar_names::GAP_BETWEEN_BLOCKS, "2".to_string()),
        ("rb_blocks_1", "60".to_string()),
        ("number_of_nodes", "101".to_string()),
        ("ecosystem_price", "1000".to_string()),
        ("contract_price", "200".to_string()),
        ("column_price", "200".to_string()),
        ("table_price", "200".to_string()),
        ("menu_price", "100".to_string()),
        ("page_price", "100".to_string()),
        (syspar_names::COMMISSION_SIZE, "10".to_string()),
        (
            syspar_names::COMMISSION_WALLET,
            format!(r#"[["1","{}"]]"#, founder),
        ),
        (syspar_names::FUEL_RATE, r#"[["1","1"]]"#.to_string()),
        ("max_block_size", "67108864".to_string()),
        ("max_tx_size", "33554432".to_string()),
        ("max_tx_count", "1000".to_string()),
        ("max_columns", "50".to_string()),
        ("max_indexes", "5".to_string()),
        ("max_block_user_tx", "100".to_string()),
        ("max_fuel_tx", "20000".to_string()),
        ("max_fuel_block", "100000".to_string()),
        ("max_forsign_size", "1000000".to_string()),
        (syspar_names::FULL_NODES, "[]".to_string()),
    ]
}

/// Creates the per-ecosystem tables and their permission definitions,
/// and records the founder account parameter.
pub async fn exec_ecosystem_schema(
    tx: &mut dyn StoreTx,
    ecosystem: i64,
    wallet: i64,
    name: &str,
    founder: i64,
) -> DbResult<()> {
    for (table, columns) in schema::ecosystem_tables(ecosystem) {
        if !tx.table_exists(&table).await? {
            tx.create_table(&table, &columns).await?;
        }
    }

    let params_table = tables::parameters(ecosystem);
    let mut id = tx.next_id(&params_table).await?;
    for (pname, pvalue) in [
        ("founder_account", founder.to_string()),
        ("ecosystem_name", name.to_string()),
        ("ecosystem_wallet", wallet.to_string()),
    ] {
        tx.insert(
            &params_table,
            &row(&[
                ("id", Value::Int(id)),
                ("name", Value::Str(pname.into())),
                ("value", Value::Str(pvalue)),
                ("conditions", Value::Str("ContractConditions(\"MainCondition\")".into())),
            ]),
        )
        .await?;
        id += 1;
    }

    let tables_table = tables::definitions(ecosystem);
    let mut id = tx.next_id(&tables_table).await?;
    for (tname, columns) in schema::ecosystem_tables(ecosystem) {
        tx.insert(&tables_table, &table_definition_row(id, &tname, &columns))
            .await?;
        id += 1;
    }

    info!(ecosystem, wallet, "ecosystem schema installed");
    Ok(())
}

/// Seeds the system ecosystem. `founder_pub` is the hex public key of the
/// founder account, `founder` its wallet id.
pub async fn init_data(tx: &mut dyn StoreTx, founder: i64, founder_pub: &str) -> DbResult<()> {
    tx.insert(
        tables::ECOSYSTEMS,
        &row(&[
            ("id", Value::Int(genesis_core::FIRST_ECOSYSTEM_ID)),
            ("name", Value::Str("platform ecosystem".into())),
        ]),
    )
    .await?;

    let mut id = tx.next_id(tables::SYSTEM_PARAMETERS).await?;
    for (name, value) in default_system_parameters(founder) {
        tx.insert(
            tables::SYSTEM_PARAMETERS,
            &row(&[
                ("id", Value::Int(id)),
                ("name", Value::Str(name.into())),
                ("value", Value::Str(value)),
                ("conditions", Value::Str("ContractAccess(\"@1UpdateSysParam\")".into())),
            ]),
        )
        .await?;
        id += 1;
    }

    exec_ecosystem_schema(tx, 1, founder, "platform ecosystem", founder).await?;

    // global tables are contract-visible too and need definitions
    let def_table = tables::definitions(1);
    let mut id = tx.next_id(&def_table).await?;
    for (table, columns) in [
        (tables::ECOSYSTEMS, vec!["name".to_string()]),
        (
            tables::SYSTEM_PARAMETERS,
            vec!["name".to_string(), "value".to_string(), "conditions".to_string()],
        ),
    ] {
        tx.insert(&def_table, &table_definition_row(id, table, &columns))
            .await?;
        id += 1;
    }

    tx.insert(
        &tables::keys(1),
        &row(&[
            ("id", Value::Int(founder)),
            ("pub", Value::Str(founder_pub.into())),
            ("amount", Value::Str("0".into())),
        ]),
    )
    .await?;

    info!(founder, "database seeded");
    Ok(())
}

/// A `N_tables` definition row: permissive defaults for the built-in
/// tables, read open, writes gated on the main condition.
fn table_definition_row(id: i64, table: &str, columns: &[String]) -> Row {
    let perm_columns: serde_json::Map<String, serde_json::Value> = columns
        .iter()
        .map(|c| (c.clone(), serde_json::Value::String("true".to_string())))
        .collect();
    let permissions = serde_json::json!({
        "insert": "true",
        "update": "true",
        "read": "true",
        "new_column": "ContractConditions(\"MainCondition\")",
    });
    row(&[
        ("id", Value::Int(id)),
        ("name", Value::Str(table.to_string())),
        (
            "permissions",
            Value::Str(permissions.to_string()),
        ),
        (
            "columns",
            Value::Str(serde_json::Value::Object(perm_columns).to_string()),
        ),
        (
            "conditions",
            Value::Str("ContractConditions(\"MainCondition\")".into()),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDatastore;
    use crate::spi::{Datastore, SelectQuery};

    #[tokio::test]
    async fn seed_creates_parameters_and_founder() {
        let ds = MemoryDatastore::new();
        ds.init_schema().await.unwrap();
        let mut tx = ds.begin().await.unwrap();
        init_data(tx.as_mut(), 42, "deadbeef").await.unwrap();

        let rows = tx
            .select(
                &SelectQuery::new("1_system_parameters")
                    .filter("name", Value::Str("gap_between_blocks".into())),
            )
            .await
            .unwrap();
        assert_eq!(rows[0]["value"], Value::Str("2".into()));

        let keys = tx
            .select(&SelectQuery::new("1_keys").filter("id", Value::Int(42)))
            .await
            .unwrap();
        assert_eq!(keys[0]["pub"], Value::Str("deadbeef".into()));

        let founder = tx
            .select(
                &SelectQuery::new("1_parameters")
                    .filter("name", Value::Str("founder_account".into())),
            )
            .await
            .unwrap();
        assert_eq!(founder[0]["value"], Value::Str("42".into()));
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn ecosystem_schema_registers_table_permissions() {
        let ds = MemoryDatastore::new();
        ds.init_schema().await.unwrap();
        let mut tx = ds.begin().await.unwrap();
        exec_ecosystem_schema(tx.as_mut(), 2, 7, "second", 7)
            .await
            .unwrap();

        assert!(tx.table_exists("2_keys").await.unwrap());
        assert!(tx.table_exists("2_contracts").await.unwrap());

        let defs = tx
            .select(&SelectQuery::new("2_tables").filter("name", Value::Str("2_keys".into())))
            .await
            .unwrap();
        assert_eq!(defs.len(), 1);
        let perms: serde_json::Value =
            serde_json::from_str(&defs[0]["permissions"].to_display()).unwrap();
        assert_eq!(perms["insert"], "true");
        tx.commit().await.unwrap();
    }
}
