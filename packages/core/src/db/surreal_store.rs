//! SurrealStore - TreeStore Implementation for SurrealDB
//!
//! Stores every node in one SCHEMALESS `nodes` table keyed by
//! `nodes:<uuid>`. Hierarchy columns use the configured `FieldNames`, so an
//! existing collection with its own column names can be adopted as is.
//!
//! # Cascade
//!
//! `BulkUpdate::SplicePathPrefix` compiles to a single server-side
//! `UPDATE ... SET path = array::concat($prepend, array::slice(path, $strip))`,
//! which keeps the descendant suffix in order without reading documents back.
//!
//! # Examples
//!
//! ```rust,no_run
//! use treepath_core::db::SurrealStore;
//! use treepath_core::FieldNames;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SurrealStore::new(PathBuf::from("./data/tree.db"), FieldNames::default()).await?;
//!     Ok(())
//! }
//! ```

use crate::config::FieldNames;
use crate::db::error::{ensure_identifier, StoreError};
use crate::db::filter::{BulkUpdate, Filter, SortDirection, SortField, SortKey};
use crate::db::tree_store::TreeStore;
use crate::models::Node;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;

const TABLE: &str = "nodes";

/// Row shape returned by every SELECT (hierarchy columns aliased)
#[derive(Debug, Deserialize)]
struct SurrealNode {
    uuid: String,
    node_type: String,
    parent_id: Option<String>,
    #[serde(default)]
    path: Vec<String>,
    #[serde(default)]
    depth: i64,
    #[serde(default)]
    properties: Value,
    version: i64,
    created_at: String,
    modified_at: String,
}

impl SurrealNode {
    fn into_node(self) -> Result<Node, StoreError> {
        let depth = u32::try_from(self.depth)
            .map_err(|_| StoreError::invalid_document(&self.uuid, format!("negative depth {}", self.depth)))?;
        let created_at = parse_timestamp(&self.uuid, &self.created_at)?;
        let modified_at = parse_timestamp(&self.uuid, &self.modified_at)?;

        let mut node = Node::new_with_id(self.uuid, self.node_type, self.parent_id, self.properties);
        node.set_path(self.path, depth);
        node.version = self.version;
        node.created_at = created_at;
        node.modified_at = modified_at;
        Ok(node)
    }
}

fn parse_timestamp(id: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::invalid_document(id, format!("bad timestamp '{}': {}", raw, e)))
}

#[derive(Debug, Deserialize)]
struct UuidRow {
    #[allow(dead_code)]
    uuid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: u64,
}

/// Accumulates SurrealQL fragments and their parameters
struct QueryParts<'a> {
    fields: &'a FieldNames,
    binds: Vec<(String, Value)>,
}

impl<'a> QueryParts<'a> {
    fn new(fields: &'a FieldNames) -> Self {
        Self {
            fields,
            binds: Vec::new(),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        let name = format!("p{}", self.binds.len());
        self.binds.push((name.clone(), value));
        format!("${}", name)
    }

    fn condition(&mut self, filter: &Filter) -> Result<String, StoreError> {
        let fields = self.fields;
        let FieldNames { parent_id, path, depth } = fields;
        let sql = match filter {
            Filter::All => "true".to_string(),
            Filter::IdEq(id) => format!("uuid = {}", self.bind(json!(id))),
            Filter::IdNe(id) => format!("uuid != {}", self.bind(json!(id))),
            Filter::IdIn(ids) => format!("uuid INSIDE {}", self.bind(json!(ids))),
            Filter::ParentEq(Some(id)) => format!("{} = {}", parent_id, self.bind(json!(id))),
            Filter::ParentEq(None) => format!("({0} = NONE OR {0} = NULL)", parent_id),
            Filter::PathContains(id) => format!("{} CONTAINS {}", path, self.bind(json!(id))),
            Filter::PathStartsWith(prefix) if prefix.is_empty() => "true".to_string(),
            Filter::PathStartsWith(prefix) => format!(
                "array::slice({}, 0, {}) = {}",
                path,
                prefix.len(),
                self.bind(json!(prefix))
            ),
            Filter::DepthEq(d) => format!("{} = {}", depth, self.bind(json!(d))),
            Filter::PropertyEq { field, value } => {
                ensure_identifier(field)?;
                if value.is_null() {
                    format!("(properties.{0} = NONE OR properties.{0} = NULL)", field)
                } else {
                    format!("properties.{} = {}", field, self.bind(value.clone()))
                }
            }
            Filter::NodeTypeIn(types) => format!("node_type INSIDE {}", self.bind(json!(types))),
            Filter::Not(inner) => format!("!({})", self.condition(inner)?),
            Filter::And(parts) => self.join(parts, " AND ", "true")?,
            Filter::Or(parts) => self.join(parts, " OR ", "false")?,
        };
        Ok(sql)
    }

    fn join(&mut self, parts: &[Filter], separator: &str, empty: &str) -> Result<String, StoreError> {
        if parts.is_empty() {
            return Ok(empty.to_string());
        }
        let compiled = parts
            .iter()
            .map(|part| self.condition(part).map(|sql| format!("({})", sql)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(compiled.join(separator))
    }

    fn order_by(sort: &[SortKey]) -> String {
        let mut terms: Vec<String> = sort
            .iter()
            .map(|key| {
                let column = match key.field {
                    SortField::Depth => "depth",
                    SortField::Id => "uuid",
                    SortField::NodeType => "node_type",
                    SortField::CreatedAt => "created_at",
                    SortField::ModifiedAt => "modified_at",
                };
                let direction = match key.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                format!("{} {}", column, direction)
            })
            .collect();
        terms.push("uuid ASC".to_string());
        terms.join(", ")
    }
}

pub struct SurrealStore {
    db: Arc<Surreal<Db>>,
    fields: FieldNames,
}

impl SurrealStore {
    /// Open (or create) an embedded RocksDB-backed store
    pub async fn new(db_path: PathBuf, fields: FieldNames) -> Result<Self> {
        let location = db_path.display().to_string();
        let db = Surreal::new::<RocksDb>(db_path)
            .await
            .map_err(|e| StoreError::connection_failed(location, e.to_string()))?;
        Self::init(db, fields).await
    }

    /// Open a throwaway in-memory store
    pub async fn new_in_memory(fields: FieldNames) -> Result<Self> {
        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| StoreError::connection_failed("memory", e.to_string()))?;
        Self::init(db, fields).await
    }

    async fn init(db: Surreal<Db>, fields: FieldNames) -> Result<Self> {
        for name in [&fields.parent_id, &fields.path, &fields.depth] {
            ensure_identifier(name)?;
        }

        db.use_ns("treepath")
            .use_db("tree")
            .await
            .context("Failed to set namespace/database")?;

        let schema = format!(
            "DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS;
             DEFINE INDEX IF NOT EXISTS {table}_uuid ON TABLE {table} FIELDS uuid UNIQUE;
             DEFINE INDEX IF NOT EXISTS {table}_parent ON TABLE {table} FIELDS {parent};
             DEFINE INDEX IF NOT EXISTS {table}_path ON TABLE {table} FIELDS {path};",
            table = TABLE,
            parent = fields.parent_id,
            path = fields.path,
        );
        db.query(schema)
            .await
            .and_then(|response| response.check())
            .map_err(|e| StoreError::initialization_failed(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            fields,
        })
    }

    fn projection(&self) -> String {
        format!(
            "uuid, node_type, {} AS parent_id, {} AS path, {} AS depth, properties, version, created_at, modified_at",
            self.fields.parent_id, self.fields.path, self.fields.depth
        )
    }

    async fn run<T>(&self, sql: String, binds: Vec<(String, Value)>) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut query = self.db.query(sql.clone());
        for bind in binds {
            query = query.bind(bind);
        }
        let mut response = query
            .await
            .map_err(|e| StoreError::query_failed(format!("{}: {}", sql, e)))?;
        let rows: Vec<T> = response
            .take(0)
            .map_err(|e| StoreError::query_failed(format!("{}: {}", sql, e)))?;
        Ok(rows)
    }
}

#[async_trait]
impl TreeStore for SurrealStore {
    async fn load(&self, id: &str) -> Result<Option<Node>> {
        let sql = format!("SELECT {} FROM {} WHERE uuid = $uuid LIMIT 1;", self.projection(), TABLE);
        let rows: Vec<SurrealNode> = self.run(sql, vec![("uuid".to_string(), json!(id))]).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_node()?)),
            None => Ok(None),
        }
    }

    async fn save(&self, node: &Node) -> Result<()> {
        let FieldNames { parent_id, path, depth } = &self.fields;
        let sql = format!(
            "UPSERT type::thing('{table}', $uuid) CONTENT {{
                uuid: $uuid,
                node_type: $node_type,
                {parent_id}: $parent_id,
                {path}: $path,
                {depth}: $depth,
                properties: $properties,
                version: $version,
                created_at: $created_at,
                modified_at: $modified_at
            }} RETURN NONE;",
            table = TABLE,
        );
        let binds = vec![
            ("uuid".to_string(), json!(node.id)),
            ("node_type".to_string(), json!(node.node_type)),
            ("parent_id".to_string(), json!(node.parent_id)),
            ("path".to_string(), json!(node.path())),
            ("depth".to_string(), json!(node.depth())),
            ("properties".to_string(), node.properties.clone()),
            ("version".to_string(), json!(node.version)),
            ("created_at".to_string(), json!(node.created_at.to_rfc3339())),
            ("modified_at".to_string(), json!(node.modified_at.to_rfc3339())),
        ];
        let mut query = self.db.query(sql);
        for bind in binds {
            query = query.bind(bind);
        }
        query
            .await
            .and_then(|response| response.check())
            .with_context(|| format!("Failed to save node {}", node.id))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE uuid = $uuid RETURN BEFORE;", TABLE);
        let rows: Vec<UuidRow> = self.run(sql, vec![("uuid".to_string(), json!(id))]).await?;
        Ok(!rows.is_empty())
    }

    async fn delete_where(&self, filter: &Filter) -> Result<u64> {
        let mut parts = QueryParts::new(&self.fields);
        let condition = parts.condition(filter)?;
        let sql = format!("DELETE FROM {} WHERE {} RETURN BEFORE;", TABLE, condition);
        let rows: Vec<UuidRow> = self.run(sql, parts.binds).await?;
        Ok(rows.len() as u64)
    }

    async fn bulk_update(&self, filter: &Filter, update: &BulkUpdate) -> Result<u64> {
        let mut parts = QueryParts::new(&self.fields);
        let condition = parts.condition(filter)?;
        let FieldNames { path, depth, .. } = &self.fields;

        let assignments = match update {
            BulkUpdate::SplicePathPrefix {
                strip,
                prepend,
                depth_delta,
            } => {
                let prepend = parts.bind(json!(prepend));
                let strip = parts.bind(json!(strip));
                let delta = parts.bind(json!(depth_delta));
                format!(
                    "{path} = array::concat({prepend}, array::slice({path}, {strip})), {depth} = {depth} + {delta}"
                )
            }
            BulkUpdate::SetPath { path: new_path } => {
                let len = parts.bind(json!(new_path.len()));
                let value = parts.bind(json!(new_path));
                format!("{path} = {value}, {depth} = {len}")
            }
        };

        let sql = format!(
            "UPDATE {} SET {}, version += 1 WHERE {} RETURN uuid;",
            TABLE, assignments, condition
        );
        let rows: Vec<UuidRow> = self.run(sql, parts.binds).await?;
        Ok(rows.len() as u64)
    }

    async fn query(&self, filter: &Filter, sort: &[SortKey]) -> Result<Vec<Node>> {
        let mut parts = QueryParts::new(&self.fields);
        let condition = parts.condition(filter)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {};",
            self.projection(),
            TABLE,
            condition,
            QueryParts::order_by(sort)
        );
        let rows: Vec<SurrealNode> = self.run(sql, parts.binds).await?;
        let nodes = rows
            .into_iter()
            .map(SurrealNode::into_node)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(nodes)
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        let mut parts = QueryParts::new(&self.fields);
        let condition = parts.condition(filter)?;
        let sql = format!("SELECT count() FROM {} WHERE {} GROUP ALL;", TABLE, condition);
        let rows: Vec<CountRow> = self.run(sql, parts.binds).await?;
        Ok(rows.first().map(|row| row.count).unwrap_or(0))
    }
}
