//! Schema model
//!
//! Static snapshot of the target database's structure: tables, columns with
//! declared types, primary keys, foreign keys. Built once by reflection and
//! read-only for the rest of the session; every other component consumes it,
//! none mutate it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub declared_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableInfo {
    /// Columns in declaration order
    pub columns: Vec<Column>,

    pub primary_keys: Vec<String>,

    /// Column name -> "target_table.target_column"
    pub foreign_keys: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaModel {
    pub tables: BTreeMap<String, TableInfo>,
}

impl SchemaModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|name| name.as_str()).collect()
    }

    /// Compact structure description embedded into prompts: table names,
    /// column names, primary keys and foreign key columns only.
    pub fn structure_json(&self) -> serde_json::Value {
        let tables: Vec<serde_json::Value> = self
            .tables
            .iter()
            .map(|(name, info)| {
                serde_json::json!({
                    "table_name": name,
                    "columns": info.columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>(),
                    "primary_keys": info.primary_keys,
                    "foreign_keys": info.foreign_keys.keys().cloned().collect::<Vec<_>>(),
                })
            })
            .collect();

        serde_json::json!({ "tables": tables })
    }
}

impl fmt::Display for SchemaModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tables.is_empty() {
            return writeln!(f, "The database has no tables.");
        }

        for (name, info) in &self.tables {
            writeln!(f, "Table: {}", name)?;
            let columns: Vec<String> = info
                .columns
                .iter()
                .map(|c| format!("{} ({})", c.name, c.declared_type))
                .collect();
            writeln!(f, "  Columns:      {}", columns.join(", "))?;
            if info.primary_keys.is_empty() {
                writeln!(f, "  Primary keys: none")?;
            } else {
                writeln!(f, "  Primary keys: {}", info.primary_keys.join(", "))?;
            }
            if info.foreign_keys.is_empty() {
                writeln!(f, "  Foreign keys: none")?;
            } else {
                let fks: Vec<String> = info
                    .foreign_keys
                    .iter()
                    .map(|(col, target)| format!("{} -> {}", col, target))
                    .collect();
                writeln!(f, "  Foreign keys: {}", fks.join(", "))?;
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_fixtures::customers_schema;
    use super::*;

    #[test]
    fn structure_json_contains_only_prompt_relevant_fields() {
        let schema = customers_schema();
        let value = schema.structure_json();
        let table = &value["tables"][0];
        assert_eq!(table["table_name"], "customers");
        assert_eq!(
            table["columns"],
            serde_json::json!(["id", "name", "country"])
        );
        assert_eq!(table["primary_keys"], serde_json::json!(["id"]));
        assert_eq!(table["foreign_keys"], serde_json::json!([]));
        // Declared types stay out of the prompt payload
        assert!(table.get("declared_type").is_none());
    }

    #[test]
    fn empty_schema_reports_no_tables() {
        let schema = SchemaModel::new();
        assert!(schema.is_empty());
        assert!(schema.to_string().contains("no tables"));
    }

    #[test]
    fn display_lists_columns_and_keys() {
        let mut schema = customers_schema();
        schema
            .tables
            .get_mut("customers")
            .unwrap()
            .foreign_keys
            .insert("country".to_string(), "countries.code".to_string());

        let rendered = schema.to_string();
        assert!(rendered.contains("Table: customers"));
        assert!(rendered.contains("name (TEXT)"));
        assert!(rendered.contains("Primary keys: id"));
        assert!(rendered.contains("country -> countries.code"));
    }
}
