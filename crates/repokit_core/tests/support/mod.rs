#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use repokit_core::db::{open_db_in_memory, Migration};
use repokit_core::{
    AuditFields, Clock, Entity, EntityDescriptor, KeyType, Predicate, RelationLoader, RepoResult,
    Repository, SchemaError, SchemaRegistry, Value,
};
use rusqlite::types::Type;
use rusqlite::Row;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const MIGRATIONS: &[Migration] = &[
    Migration::new(
        1,
        "CREATE TABLE orders (
            id INTEGER PRIMARY KEY,
            customer TEXT NOT NULL,
            total_cents INTEGER NOT NULL,
            creation_date TEXT,
            modification_date TEXT,
            deletion_date TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE order_lines (
            order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            line_no INTEGER NOT NULL,
            sku TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            PRIMARY KEY (order_id, line_no)
        );",
    ),
    Migration::new(
        2,
        "CREATE TABLE tags (
            uuid TEXT PRIMARY KEY,
            label TEXT NOT NULL
        );
        CREATE TABLE customers (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );
        CREATE TABLE sensors (
            serial TEXT UNIQUE,
            reading INTEGER NOT NULL
        );
        CREATE VIEW order_totals AS
            SELECT customer, SUM(total_cents) AS total_cents
            FROM orders
            WHERE is_deleted = 0
            GROUP BY customer;
        CREATE TABLE total_changes (order_id INTEGER NOT NULL);
        CREATE TRIGGER orders_total_changed
        AFTER UPDATE OF total_cents ON orders
        BEGIN
            INSERT INTO total_changes (order_id) VALUES (NEW.id);
        END;",
    ),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer: String,
    pub total_cents: i64,
    pub audit: AuditFields,
    pub lines: Vec<OrderLine>,
}

impl Order {
    pub fn new(id: i64, customer: &str, total_cents: i64) -> Self {
        Self {
            id,
            customer: customer.to_string(),
            total_cents,
            audit: AuditFields::default(),
            lines: Vec::new(),
        }
    }
}

impl Entity for Order {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("orders")
            .key("id", KeyType::Integer)
            .columns(["customer", "total_cents"])
            .audited()
            .relation("lines")
    }

    fn to_fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("customer", self.customer.clone().into()),
            ("total_cents", self.total_cents.into()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            customer: row.get("customer")?,
            total_cents: row.get("total_cents")?,
            audit: AuditFields::from_row(row)?,
            lines: Vec::new(),
        })
    }

    fn audit(&self) -> Option<&AuditFields> {
        Some(&self.audit)
    }

    fn audit_mut(&mut self) -> Option<&mut AuditFields> {
        Some(&mut self.audit)
    }

    fn load_relation(&mut self, name: &str, loader: &RelationLoader<'_>) -> RepoResult<()> {
        match name {
            "lines" => {
                self.lines = loader.load::<OrderLine>(Predicate::eq("order_id", self.id))?;
                Ok(())
            }
            other => Err(SchemaError::UnknownRelation {
                entity: "orders".to_string(),
                relation: other.to_string(),
            }
            .into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub order_id: i64,
    pub line_no: i64,
    pub sku: String,
    pub quantity: i64,
}

impl OrderLine {
    pub fn new(order_id: i64, line_no: i64, sku: &str, quantity: i64) -> Self {
        Self {
            order_id,
            line_no,
            sku: sku.to_string(),
            quantity,
        }
    }
}

impl Entity for OrderLine {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("order_lines")
            .key("order_id", KeyType::Integer)
            .key("line_no", KeyType::Integer)
            .columns(["sku", "quantity"])
    }

    fn to_fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("order_id", self.order_id.into()),
            ("line_no", self.line_no.into()),
            ("sku", self.sku.clone().into()),
            ("quantity", self.quantity.into()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            order_id: row.get("order_id")?,
            line_no: row.get("line_no")?,
            sku: row.get("sku")?,
            quantity: row.get("quantity")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub uuid: Uuid,
    pub label: String,
}

impl Entity for Tag {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("tags")
            .key("uuid", KeyType::Uuid)
            .column("label")
    }

    fn to_fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("uuid", Value::Text(self.uuid.to_string())),
            ("label", self.label.clone().into()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let text: String = row.get("uuid")?;
        let uuid = Uuid::parse_str(&text)
            .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, err.into()))?;
        Ok(Self {
            uuid,
            label: row.get("label")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub code: String,
    pub name: String,
}

impl Entity for Customer {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("customers")
            .key("code", KeyType::Text)
            .column("name")
    }

    fn to_fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("code", self.code.clone().into()),
            ("name", self.name.clone().into()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get("code")?,
            name: row.get("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sensor {
    pub serial: Option<String>,
    pub reading: i64,
}

impl Entity for Sensor {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("sensors")
            .nullable_key("serial", KeyType::Text)
            .column("reading")
    }

    fn to_fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("serial", self.serial.clone().into()),
            ("reading", self.reading.into()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            serial: row.get("serial")?,
            reading: row.get("reading")?,
        })
    }
}

/// Row of the `order_totals` view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTotal {
    pub customer: String,
    pub total_cents: i64,
}

impl Entity for OrderTotal {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("order_totals")
            .columns(["customer", "total_cents"])
            .keyless()
    }

    fn to_fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("customer", self.customer.clone().into()),
            ("total_cents", self.total_cents.into()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            customer: row.get("customer")?,
            total_cents: row.get("total_cents")?,
        })
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub fn schema() -> SchemaRegistry {
    SchemaRegistry::new()
        .with::<Order>()
        .unwrap()
        .with::<OrderLine>()
        .unwrap()
        .with::<Tag>()
        .unwrap()
        .with::<Customer>()
        .unwrap()
        .with::<Sensor>()
        .unwrap()
        .with::<OrderTotal>()
        .unwrap()
}

/// In-memory session with every fixture entity registered and a manual clock.
pub fn open_repo() -> (Repository, Arc<ManualClock>) {
    let conn = open_db_in_memory(MIGRATIONS).unwrap();
    let clock = Arc::new(ManualClock::starting_at(t0()));
    let repo = Repository::new(conn, schema()).with_clock(clock.clone());
    (repo, clock)
}

pub fn total_change_count(repo: &Repository) -> i64 {
    repo.connection()
        .query_row("SELECT COUNT(*) FROM total_changes", [], |row| row.get(0))
        .unwrap()
}
