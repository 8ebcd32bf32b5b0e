//! Table registry: maps table ids and names to their `HeapFile`s and
//! primary-key field names.

use std::{
    collections::HashMap,
    io::BufRead,
    sync::{Arc, RwLock},
};

use crate::{error::SmallError, field::Type, heap_file::HeapFile, tuple::TupleDesc};

struct TableEntry {
    heap_file: Arc<HeapFile>,
    name: String,
    primary_key: Option<String>,
}

#[derive(Default)]
struct CatalogInner {
    by_id: HashMap<i32, TableEntry>,
    name_to_id: HashMap<String, i32>,
}

/// Thread-safe; every method takes `&self` so a `Catalog` can be
/// shared behind an `Arc` without an outer lock.
#[derive(Default)]
pub struct Catalog {
    inner: RwLock<CatalogInner>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&self, heap_file: Arc<HeapFile>, name: &str, primary_key: Option<&str>) {
        let table_id = heap_file.table_id();
        let mut inner = self.inner.write().unwrap();
        inner.name_to_id.insert(name.to_string(), table_id);
        inner.by_id.insert(
            table_id,
            TableEntry {
                heap_file,
                name: name.to_string(),
                primary_key: primary_key.map(|s| s.to_string()),
            },
        );
    }

    pub fn get_table_id(&self, name: &str) -> Option<i32> {
        self.inner.read().unwrap().name_to_id.get(name).copied()
    }

    pub fn get_table_name(&self, table_id: i32) -> Option<String> {
        self.inner
            .read()
            .unwrap()
            .by_id
            .get(&table_id)
            .map(|e| e.name.clone())
    }

    pub fn get_heap_file(&self, table_id: i32) -> Option<Arc<HeapFile>> {
        self.inner
            .read()
            .unwrap()
            .by_id
            .get(&table_id)
            .map(|e| Arc::clone(&e.heap_file))
    }

    pub fn get_schema(&self, table_id: i32) -> Option<TupleDesc> {
        self.inner
            .read()
            .unwrap()
            .by_id
            .get(&table_id)
            .map(|e| e.heap_file.schema().clone())
    }

    pub fn get_primary_key(&self, table_id: i32) -> Option<String> {
        self.inner
            .read()
            .unwrap()
            .by_id
            .get(&table_id)
            .and_then(|e| e.primary_key.clone())
    }

    pub fn table_ids(&self) -> Vec<i32> {
        self.inner.read().unwrap().by_id.keys().copied().collect()
    }

    /// Parses a catalog description of the form:
    ///
    /// ```text
    /// people (name string pk, age int)
    /// ```
    ///
    /// one line per table, building a `HeapFile` for each at
    /// `<dir>/<table>.dat`. Field order is preserved; a field tagged
    /// `pk` becomes the table's declared primary key.
    pub fn load_schema(
        reader: impl BufRead,
        dir: impl AsRef<std::path::Path>,
        page_size: usize,
    ) -> Result<Self, SmallError> {
        let catalog = Self::new();
        let dir = dir.as_ref();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let open = line
                .find('(')
                .ok_or_else(|| SmallError::illegal_argument(format!("malformed catalog line: {}", line)))?;
            let close = line
                .rfind(')')
                .ok_or_else(|| SmallError::illegal_argument(format!("malformed catalog line: {}", line)))?;
            let table_name = line[..open].trim();
            let body = &line[open + 1..close];

            let mut field_specs = Vec::new();
            let mut primary_key = None;
            for field in body.split(',') {
                let parts: Vec<&str> = field.split_whitespace().collect();
                if parts.len() < 2 {
                    return Err(SmallError::illegal_argument(format!(
                        "malformed field spec: {}",
                        field
                    )));
                }
                let field_name = parts[0].to_string();
                let field_type = match parts[1].to_lowercase().as_str() {
                    "int" => Type::Int,
                    "string" => Type::Str,
                    other => {
                        return Err(SmallError::illegal_argument(format!(
                            "unknown field type: {}",
                            other
                        )))
                    }
                };
                if parts.get(2).map(|s| s.to_lowercase()) == Some("pk".to_string()) {
                    primary_key = Some(field_name.clone());
                }
                field_specs.push((field_type, Some(field_name)));
            }

            let schema = TupleDesc::new(field_specs);
            let path = dir.join(format!("{}.dat", table_name));
            let heap_file = Arc::new(HeapFile::new(path, schema, page_size)?);
            catalog.add_table(heap_file, table_name, primary_key.as_deref());
        }

        Ok(catalog)
    }
}
