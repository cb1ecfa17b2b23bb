//! Schema reflection
//!
//! Introspects a live SQLite connection into a [`SchemaModel`] using the
//! catalog pragmas. Runs once per session; the rest of the pipeline treats
//! the result as immutable.

use crate::error::Result;
use crate::schema::{Column, SchemaModel, TableInfo};
use rusqlite::Connection;
use std::collections::BTreeMap;
use tracing::info;

pub fn reflect(conn: &Connection) -> Result<SchemaModel> {
    let mut schema = SchemaModel::new();

    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let table_names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<_, _>>()?;

    for table_name in table_names {
        let mut info = TableInfo::default();

        let mut columns_stmt =
            conn.prepare(&format!("PRAGMA table_info(\"{}\")", table_name))?;
        let rows = columns_stmt.query_map([], |row| {
            let name: String = row.get("name")?;
            let declared_type: String = row.get("type")?;
            let pk_position: i64 = row.get("pk")?;
            Ok((name, declared_type, pk_position))
        })?;
        for row in rows {
            let (name, declared_type, pk_position) = row?;
            if pk_position > 0 {
                info.primary_keys.push(name.clone());
            }
            info.columns.push(Column { name, declared_type });
        }

        let mut fk_stmt =
            conn.prepare(&format!("PRAGMA foreign_key_list(\"{}\")", table_name))?;
        let fk_rows = fk_stmt.query_map([], |row| {
            let target_table: String = row.get("table")?;
            let from_column: String = row.get("from")?;
            // "to" is NULL when the reference is to the target's primary key
            let to_column: Option<String> = row.get("to")?;
            Ok((from_column, target_table, to_column))
        })?;
        let mut foreign_keys = BTreeMap::new();
        for row in fk_rows {
            let (from_column, target_table, to_column) = row?;
            let target = match to_column {
                Some(column) => format!("{}.{}", target_table, column),
                None => target_table,
            };
            foreign_keys.insert(from_column, target);
        }
        info.foreign_keys = foreign_keys;

        schema.tables.insert(table_name, info);
    }

    info!(tables = schema.tables.len(), "Database schema loaded");
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE artists (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             CREATE TABLE albums (
                 id INTEGER PRIMARY KEY,
                 title TEXT,
                 artist_id INTEGER REFERENCES artists(id)
             );",
        )
        .unwrap();
        conn
    }

    #[test]
    fn reflects_tables_columns_and_keys() {
        let conn = seeded_connection();
        let schema = reflect(&conn).unwrap();

        assert_eq!(schema.table_names(), vec!["albums", "artists"]);

        let artists = &schema.tables["artists"];
        assert_eq!(artists.primary_keys, vec!["id"]);
        assert_eq!(artists.columns.len(), 2);
        assert_eq!(artists.columns[1].name, "name");
        assert_eq!(artists.columns[1].declared_type, "TEXT");

        let albums = &schema.tables["albums"];
        assert_eq!(albums.foreign_keys["artist_id"], "artists.id");
    }

    #[test]
    fn empty_database_reflects_to_empty_schema() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = reflect(&conn).unwrap();
        assert!(schema.is_empty());
    }
}
