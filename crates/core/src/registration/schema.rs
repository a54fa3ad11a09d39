//! Table layout read and written by the pipeline.
//!
//! The production database is owned upstream; `create_schema` exists for local
//! setups and tests.

use std::path::Path;

use rusqlite::{params, Connection};

use super::error::RegistrationError;
use super::types::{ItemType, ProcessingFlag};

/// Creates the registration tables in the database at `path`, creating the file if needed.
pub fn create_schema(path: &Path) -> Result<(), RegistrationError> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS registrations (
            reg_key TEXT PRIMARY KEY,
            whatsapp_status INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS registration_items (
            reg_key TEXT NOT NULL,
            item_type TEXT NOT NULL CHECK (item_type IN ('group', 'mega')),
            code TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS mega_profiles (
            mega_code TEXT PRIMARY KEY,
            template_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS patients (
            reg_key TEXT PRIMARY KEY,
            phone TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_registrations_status ON registrations(whatsapp_status);
        CREATE INDEX IF NOT EXISTS idx_items_reg_key ON registration_items(reg_key, item_type);
        "#,
    )?;
    Ok(())
}

/// Inserts or replaces a registration row.
pub fn insert_registration(
    conn: &Connection,
    key: &str,
    flag: ProcessingFlag,
) -> Result<(), RegistrationError> {
    conn.execute(
        "INSERT OR REPLACE INTO registrations (reg_key, whatsapp_status) VALUES (?1, ?2)",
        params![key, flag.as_i64()],
    )?;
    Ok(())
}

/// Attaches a test item to a registration.
pub fn insert_item(
    conn: &Connection,
    key: &str,
    item_type: ItemType,
    code: &str,
) -> Result<(), RegistrationError> {
    conn.execute(
        "INSERT INTO registration_items (reg_key, item_type, code) VALUES (?1, ?2, ?3)",
        params![key, item_type.as_str(), code],
    )?;
    Ok(())
}

/// Inserts or replaces a mega profile.
pub fn insert_mega_profile(
    conn: &Connection,
    code: &str,
    template_name: &str,
) -> Result<(), RegistrationError> {
    conn.execute(
        "INSERT OR REPLACE INTO mega_profiles (mega_code, template_name) VALUES (?1, ?2)",
        params![code, template_name],
    )?;
    Ok(())
}

/// Inserts or replaces a patient contact.
pub fn insert_patient(
    conn: &Connection,
    key: &str,
    phone: Option<&str>,
) -> Result<(), RegistrationError> {
    conn.execute(
        "INSERT OR REPLACE INTO patients (reg_key, phone) VALUES (?1, ?2)",
        params![key, phone],
    )?;
    Ok(())
}
