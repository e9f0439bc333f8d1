//! The destination SQLite database.

use std::path::{Path, PathBuf};

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension, ToSql};
use tracing::{debug, info};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{SanitizedTable, Value};

/// Output database that converted tables are created in.
///
/// Tables are only ever added: a name that is already taken gets a `_1`, `_2`, ... suffix
/// instead of replacing the existing table.
#[derive(Debug)]
pub struct Destination {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Destination {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> IngestionResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        // The file exists once the connection is open, so it can be resolved now.
        let path = path.canonicalize()?;
        debug!(path = %path.display(), "opened destination database");
        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> IngestionResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Canonical path of the database file, `None` for in-memory databases.
    pub fn database_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> IngestionResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Whether a table exists (names compare case-insensitively, as in SQL).
    pub fn has_table(&self, name: &str) -> IngestionResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                [name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &str) -> IngestionResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Create `table`, insert its rows and index the `index_list` columns it has.
    ///
    /// Everything happens in one transaction. Returns the name the table was created under,
    /// which differs from `table.name` when that name was already taken.
    pub fn create_table(
        &self,
        table: &SanitizedTable,
        index_list: &[String],
        source: &str,
    ) -> IngestionResult<String> {
        self.create_table_with(table, index_list, source, |_| Ok(()))
    }

    /// Like [`Self::create_table`], but runs `on_created` with the final table name before the
    /// transaction commits. If it fails, the table is rolled back along with anything
    /// `on_created` wrote through this connection.
    pub fn create_table_with<F>(
        &self,
        table: &SanitizedTable,
        index_list: &[String],
        source: &str,
        on_created: F,
    ) -> IngestionResult<String>
    where
        F: FnOnce(&str) -> IngestionResult<()>,
    {
        if table.schema.fields.is_empty() {
            return Err(IngestionError::value(format!(
                "table '{}' has no columns",
                table.name
            )));
        }
        let name = self.unique_name(&table.name)?;
        let quoted = quote_ident(&name);

        let tx = self.conn.unchecked_transaction()?;

        let columns = table
            .schema
            .fields
            .iter()
            .map(|f| format!("{} {}", quote_ident(&f.name), f.data_type.sqlite_type()))
            .collect::<Vec<_>>()
            .join(", ");
        tx.execute(&format!("CREATE TABLE {quoted} ({columns})"), [])?;

        {
            let placeholders = vec!["?"; table.schema.fields.len()].join(", ");
            let mut insert = tx.prepare(&format!("INSERT INTO {quoted} VALUES ({placeholders})"))?;
            for row in &table.rows {
                insert.execute(params_from_iter(row.iter()))?;
            }
        }

        for column in index_list {
            let Some(idx) = table.schema.index_of(column) else {
                continue;
            };
            let field = &table.schema.fields[idx].name;
            let index_name = self.unique_name(&format!("{name}_{field}_index"))?;
            tx.execute(
                &format!(
                    "CREATE INDEX {} ON {quoted} ({})",
                    quote_ident(&index_name),
                    quote_ident(field)
                ),
                [],
            )?;
        }

        on_created(&name)?;

        tx.commit()?;
        info!("convert '{source}' to '{name}' table");
        Ok(name)
    }

    /// Tables and indexes share one namespace, so a new name must not match either.
    fn name_in_use(&self, name: &str) -> IngestionResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE name = ?1 COLLATE NOCASE",
                [name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn unique_name(&self, base: &str) -> IngestionResult<String> {
        if !self.name_in_use(base)? {
            return Ok(base.to_string());
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.name_in_use(&candidate)? {
                debug!(name = base, renamed = %candidate, "name already in use");
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

/// Quote an SQL identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Int64(v) => ToSqlOutput::from(*v),
            Value::Float64(v) => ToSqlOutput::from(*v),
            Value::Bool(v) => ToSqlOutput::from(i64::from(*v)),
            Value::Utf8(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Field, Schema};

    fn people() -> SanitizedTable {
        SanitizedTable {
            name: "people".to_string(),
            schema: Schema::new(vec![
                Field::new("id", DataType::Int64),
                Field::new("name", DataType::Utf8),
                Field::new("active", DataType::Bool),
            ]),
            rows: vec![
                vec![Value::Int64(1), Value::Utf8("Ann".into()), Value::Bool(true)],
                vec![Value::Int64(2), Value::Null, Value::Bool(false)],
            ],
        }
    }

    #[test]
    fn name_collisions_get_suffixes() {
        let dst = Destination::open_in_memory().unwrap();
        let table = people();
        assert_eq!(dst.create_table(&table, &[], "a.csv").unwrap(), "people");
        assert_eq!(dst.create_table(&table, &[], "a.csv").unwrap(), "people_1");
        assert_eq!(dst.create_table(&table, &[], "a.csv").unwrap(), "people_2");
        assert_eq!(dst.table_names().unwrap(), vec!["people", "people_1", "people_2"]);
        assert_eq!(dst.row_count("people_1").unwrap(), 2);
    }

    #[test]
    fn booleans_are_stored_as_integers() {
        let dst = Destination::open_in_memory().unwrap();
        dst.create_table(&people(), &[], "a.csv").unwrap();
        let active: i64 = dst
            .connection()
            .query_row("SELECT active FROM people WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(active, 1);
    }

    #[test]
    fn indexes_only_for_present_columns() {
        let dst = Destination::open_in_memory().unwrap();
        let index_list = vec!["NAME".to_string(), "missing".to_string()];
        dst.create_table(&people(), &index_list, "a.csv").unwrap();
        let indexes: Vec<String> = dst
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index'")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(indexes, vec!["people_name_index"]);
    }

    fn single_column(table: &str, column: &str) -> SanitizedTable {
        SanitizedTable {
            name: table.to_string(),
            schema: Schema::new(vec![Field::new(column, DataType::Int64)]),
            rows: vec![vec![Value::Int64(1)]],
        }
    }

    fn index_names(dst: &Destination) -> Vec<(String, String)> {
        dst.connection()
            .prepare(
                "SELECT name, tbl_name FROM sqlite_master WHERE type = 'index' ORDER BY name",
            )
            .unwrap()
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn clashing_index_names_get_suffixes() {
        let dst = Destination::open_in_memory().unwrap();
        let index_list = vec!["c".to_string(), "b_c".to_string()];
        dst.create_table(&single_column("a_b", "c"), &index_list, "x.csv").unwrap();
        dst.create_table(&single_column("a", "b_c"), &index_list, "y.csv").unwrap();

        assert_eq!(
            index_names(&dst),
            vec![
                ("a_b_c_index".to_string(), "a_b".to_string()),
                ("a_b_c_index_1".to_string(), "a".to_string()),
            ]
        );
    }

    #[test]
    fn table_names_avoid_existing_indexes() {
        let dst = Destination::open_in_memory().unwrap();
        dst.create_table(&people(), &["id".to_string()], "a.csv").unwrap();
        let name = dst
            .create_table(&single_column("people_id_index", "v"), &[], "b.csv")
            .unwrap();
        assert_eq!(name, "people_id_index_1");
    }

    #[test]
    fn failing_callback_rolls_the_table_back() {
        let dst = Destination::open_in_memory().unwrap();
        let err = dst
            .create_table_with(&people(), &["id".to_string()], "a.csv", |name| {
                assert_eq!(name, "people");
                Err(IngestionError::value("rejected"))
            })
            .unwrap_err();

        assert_eq!(err.to_string(), IngestionError::value("rejected").to_string());
        assert!(dst.table_names().unwrap().is_empty());
        assert!(index_names(&dst).is_empty());
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
