//! Demo schema definitions
//!
//! Production databases are introspected, never migrated. These statements
//! only back `farmdesk init` and the tests.

/// SQL to create the worker directory table
pub const CREATE_WORKER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS worker (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT UNIQUE,
    mobile_no TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
"#;

/// SQL to create the task table
pub const CREATE_TASK_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS task (
    task_id INTEGER PRIMARY KEY AUTOINCREMENT,
    worker_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_date TEXT NOT NULL DEFAULT (datetime('now'))
)
"#;

/// SQL to create the feeding_schedule table
pub const CREATE_FEEDING_SCHEDULE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS feeding_schedule (
    feeding_ID INTEGER PRIMARY KEY AUTOINCREMENT,
    Pond_ID INTEGER NOT NULL,
    feeding_time TEXT NOT NULL,
    feed_type TEXT,
    quantity_kg REAL
)
"#;

/// SQL to create the customer_order table
pub const CREATE_CUSTOMER_ORDER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS customer_order (
    order_id INTEGER PRIMARY KEY AUTOINCREMENT,
    customer_id INTEGER,
    prawn_type TEXT,
    quantity REAL,
    price REAL,
    status TEXT NOT NULL DEFAULT 'Pending',
    approved_or_rejected TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_task_worker ON task(worker_id)",
    "CREATE INDEX IF NOT EXISTS idx_feeding_time ON feeding_schedule(feeding_time)",
    "CREATE INDEX IF NOT EXISTS idx_order_approval ON customer_order(approved_or_rejected)",
];

/// Sample rows for a fresh demo database
pub const DEMO_ROWS: &[&str] = &[
    "INSERT INTO worker (name, email, mobile_no) VALUES ('Nimal Perera', 'nimal@farm.lk', '0771234567')",
    "INSERT INTO worker (name, email, mobile_no) VALUES ('Kamala Silva', 'kamala@farm.lk', '0719876543')",
    "INSERT INTO task (worker_id, title, status, created_date) VALUES (1, 'Check pond 2 aerator', 'pending', '2024-05-01 08:00:00')",
    "INSERT INTO task (worker_id, title, status, created_date) VALUES (1, 'Record pond 1 salinity', 'done', '2024-05-02 09:30:00')",
    "INSERT INTO task (worker_id, title, status, created_date) VALUES (2, 'Clean feeding trays', 'pending', '2024-05-02 10:00:00')",
    "INSERT INTO feeding_schedule (Pond_ID, feeding_time, feed_type, quantity_kg) VALUES (1, '06:00:00', 'starter', 2.5)",
    "INSERT INTO feeding_schedule (Pond_ID, feeding_time, feed_type, quantity_kg) VALUES (1, '18:00:00', 'starter', 2.5)",
    "INSERT INTO feeding_schedule (Pond_ID, feeding_time, feed_type, quantity_kg) VALUES (2, '07:00:00', 'grower', 4.0)",
    "INSERT INTO customer_order (customer_id, prawn_type, quantity, price, approved_or_rejected) VALUES (1, 'tiger', 20, 52000, 'Approved')",
    "INSERT INTO customer_order (customer_id, prawn_type, quantity, price, approved_or_rejected) VALUES (2, 'white', 10, 21000, 'Rejected')",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_WORKER_TABLE,
        CREATE_TASK_TABLE,
        CREATE_FEEDING_SCHEDULE_TABLE,
        CREATE_CUSTOMER_ORDER_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
