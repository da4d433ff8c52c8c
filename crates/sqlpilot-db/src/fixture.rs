//! Demo database fixture
//!
//! Seeds the employees/customers/orders schema used by the CLI demo and
//! the integration tests. Seeding is idempotent: tables are created if
//! missing and repopulated with the same sample data.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use sqlpilot_core::GatewayError;

/// An in-memory SQLite pool suitable for tests.
///
/// Capped at one connection: every connection to `sqlite::memory:` gets
/// its own private database, so a larger pool would scatter the seeded
/// tables across connections.
pub async fn memory_pool() -> Result<SqlitePool, GatewayError> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| GatewayError::Connection(e.to_string()))
}

/// Create and populate the demo tables.
pub async fn seed_demo_db(pool: &SqlitePool) -> Result<(), GatewayError> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS employees (
            emp_id INTEGER PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            hire_date TEXT NOT NULL,
            salary REAL NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS customers (
            customer_id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            phone TEXT
        )",
        "CREATE TABLE IF NOT EXISTS orders (
            order_id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id INTEGER NOT NULL,
            order_date TEXT NOT NULL,
            amount REAL NOT NULL,
            FOREIGN KEY (customer_id) REFERENCES customers (customer_id)
        )",
        "DELETE FROM employees",
        "DELETE FROM customers",
        "DELETE FROM orders",
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| GatewayError::Connection(e.to_string()))?;
    }

    let employees: [(i64, &str, &str, &str, &str, f64); 4] = [
        (1, "Sunny", "Savita", "sunny.sv@abc.com", "2023-06-01", 50000.0),
        (2, "Arhun", "Meheta", "arhun.m@gmail.com", "2022-04-15", 60000.0),
        (3, "Alice", "Johnson", "alice.johnson@jpg.com", "2021-09-30", 55000.0),
        (4, "Bob", "Brown", "bob.brown@uio.com", "2020-01-20", 45000.0),
    ];
    for (emp_id, first, last, email, hire_date, salary) in employees {
        sqlx::query(
            "INSERT INTO employees (emp_id, first_name, last_name, email, hire_date, salary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(emp_id)
        .bind(first)
        .bind(last)
        .bind(email)
        .bind(hire_date)
        .bind(salary)
        .execute(pool)
        .await
        .map_err(|e| GatewayError::Connection(e.to_string()))?;
    }

    let customers: [(i64, &str, &str, &str, &str); 4] = [
        (1, "John", "Doe", "john.doe@example.com", "1234567890"),
        (2, "Jane", "Smith", "jane.smith@example.com", "9876543210"),
        (3, "Emily", "Davis", "emily.davis@example.com", "4567891230"),
        (4, "Michael", "Brown", "michael.brown@example.com", "7894561230"),
    ];
    for (customer_id, first, last, email, phone) in customers {
        sqlx::query(
            "INSERT INTO customers (customer_id, first_name, last_name, email, phone)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(customer_id)
        .bind(first)
        .bind(last)
        .bind(email)
        .bind(phone)
        .execute(pool)
        .await
        .map_err(|e| GatewayError::Connection(e.to_string()))?;
    }

    let orders: [(i64, i64, &str, f64); 4] = [
        (1, 1, "2023-12-01", 250.75),
        (2, 2, "2023-11-20", 150.50),
        (3, 3, "2023-11-25", 300.00),
        (4, 4, "2023-12-02", 450.00),
    ];
    for (order_id, customer_id, order_date, amount) in orders {
        sqlx::query(
            "INSERT INTO orders (order_id, customer_id, order_date, amount)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(order_id)
        .bind(customer_id)
        .bind(order_date)
        .bind(amount)
        .execute(pool)
        .await
        .map_err(|e| GatewayError::Connection(e.to_string()))?;
    }

    Ok(())
}
