//! Table definitions
//!
//! Every table has a BIGINT `id` primary key; all other columns are text.
//! Global `1_*` tables belong to the system ecosystem; `N_*` tables are
//! stamped out per ecosystem.

use genesis_core::tables;

/// Columns (besides `id`) of the global tables.
pub fn global_tables() -> Vec<(String, Vec<String>)> {
    let mut out: Vec<(String, Vec<String>)> = vec![
        (tables::ECOSYSTEMS.to_string(), cols(&["name"])),
        (
            tables::SYSTEM_PARAMETERS.to_string(),
            cols(&["name", "value", "conditions"]),
        ),
        (
            tables::TRANSACTIONS_STATUS.to_string(),
            cols(&[
                "hash",
                "time",
                "type",
                "ecosystem",
                "wallet_id",
                "block_id",
                "error",
            ]),
        ),
        (
            tables::ROLLBACK_TX.to_string(),
            cols(&["block_id", "tx_hash", "sequence", "table_name", "table_id", "data"]),
        ),
        (
            tables::METRICS.to_string(),
            cols(&["time", "metric", "key", "value"]),
        ),
    ];
    out.extend(ecosystem_tables(1));
    out
}

/// Columns (besides `id`) of the per-ecosystem tables.
pub fn ecosystem_tables(ecosystem: i64) -> Vec<(String, Vec<String>)> {
    vec![
        (
            tables::contracts(ecosystem),
            cols(&["name", "value", "wallet_id", "token_id", "active", "conditions"]),
        ),
        (tables::keys(ecosystem), cols(&["pub", "amount"])),
        (
            tables::members(ecosystem),
            cols(&["member_name", "avatar"]),
        ),
        (
            tables::pages(ecosystem),
            cols(&["name", "value", "menu", "conditions"]),
        ),
        (
            tables::menu(ecosystem),
            cols(&["name", "value", "title", "conditions"]),
        ),
        (
            tables::languages(ecosystem),
            cols(&["name", "res", "app_id"]),
        ),
        (
            tables::parameters(ecosystem),
            cols(&["name", "value", "conditions"]),
        ),
        (
            tables::definitions(ecosystem),
            cols(&["name", "permissions", "columns", "conditions"]),
        ),
        (
            tables::signatures(ecosystem),
            cols(&["name", "value", "conditions"]),
        ),
    ]
}

/// Postgres DDL for a table in the engine's column model.
pub fn table_ddl(table: &str, columns: &[String]) -> String {
    let mut ddl = format!("CREATE TABLE IF NOT EXISTS \"{}\" (id BIGINT PRIMARY KEY", table);
    for col in columns {
        ddl.push_str(&format!(", \"{}\" TEXT NOT NULL DEFAULT ''", col));
    }
    ddl.push(')');
    ddl
}

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_set_includes_system_ecosystem() {
        let tables = global_tables();
        let names: Vec<&str> = tables.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"1_system_parameters"));
        assert!(names.contains(&"1_contracts"));
        assert!(names.contains(&"1_keys"));
        assert!(names.contains(&"rollback_tx"));
    }

    #[test]
    fn ddl_quotes_identifiers() {
        let ddl = table_ddl("2_keys", &["pub".to_string(), "amount".to_string()]);
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"2_keys\""));
        assert!(ddl.contains("\"pub\" TEXT"));
        assert!(ddl.contains("id BIGINT PRIMARY KEY"));
    }
}
