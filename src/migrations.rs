//! Versioned schema migrations.
//!
//! Applied versions are recorded in `schema_version`; running the migrations
//! again only applies the steps that are missing.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::schema::{item, schema_version};

type Step = fn(&SqliteConnection) -> QueryResult<()>;

const MIGRATIONS: [(i32, &str, Step); 2] = [
    (1, "create menu tables", create_tables),
    (2, "backfill item created_date", backfill_step),
];

const CREATE_VERSION_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY NOT NULL,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);";

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    username TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS ingredient (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS item (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    chef_id INTEGER NOT NULL REFERENCES users (id),
    created_date DATE NOT NULL DEFAULT CURRENT_DATE,
    created_date_temp TIMESTAMP,
    standard BOOLEAN NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS item_ingredients (
    item_id INTEGER NOT NULL REFERENCES item (id) ON DELETE CASCADE,
    ingredient_id INTEGER NOT NULL REFERENCES ingredient (id) ON DELETE CASCADE,
    PRIMARY KEY (item_id, ingredient_id)
);
CREATE TABLE IF NOT EXISTS menu (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    season TEXT NOT NULL,
    created_date TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    expiration_date DATE
);
CREATE TABLE IF NOT EXISTS menu_items (
    menu_id INTEGER NOT NULL REFERENCES menu (id) ON DELETE CASCADE,
    item_id INTEGER NOT NULL REFERENCES item (id) ON DELETE CASCADE,
    PRIMARY KEY (menu_id, item_id)
);";

fn create_tables(conn: &SqliteConnection) -> QueryResult<()> {
    conn.batch_execute(CREATE_TABLES)
}

fn backfill_step(conn: &SqliteConnection) -> QueryResult<()> {
    let updated = backfill_item_created_date(conn)?;
    log::info!("backfilled created_date on {} item(s)", updated);
    Ok(())
}

fn current_version(conn: &SqliteConnection) -> QueryResult<i32> {
    let version = schema_version::table
        .select(diesel::dsl::max(schema_version::version))
        .first::<Option<i32>>(conn)?;
    Ok(version.unwrap_or(0))
}

/// Applies every pending migration and returns the resulting version.
pub(crate) fn run_migrations(conn: &SqliteConnection) -> QueryResult<i32> {
    conn.batch_execute(CREATE_VERSION_TABLE)?;
    let mut version = current_version(conn)?;
    let latest = MIGRATIONS.last().map(|(v, _, _)| *v).unwrap_or(0);

    if version > latest {
        log::warn!(
            "database schema version ({}) is newer than this build ({})",
            version,
            latest
        );
        return Ok(version);
    }

    for (step_version, name, step) in MIGRATIONS.iter() {
        if *step_version <= version {
            continue;
        }
        conn.transaction::<_, diesel::result::Error, _>(|| {
            step(conn)?;
            diesel::insert_into(schema_version::table)
                .values(schema_version::version.eq(*step_version))
                .execute(conn)?;
            Ok(())
        })?;
        log::info!("applied migration v{}: {}", step_version, name);
        version = *step_version;
    }
    Ok(version)
}

/// Copies the calendar date of `created_date_temp` into `created_date` for
/// every item that has one. Safe to run repeatedly.
pub(crate) fn backfill_item_created_date(conn: &SqliteConnection) -> QueryResult<usize> {
    let rows = item::table
        .select((item::id, item::created_date_temp))
        .filter(item::created_date_temp.is_not_null())
        .load::<(i32, Option<chrono::NaiveDateTime>)>(conn)?;

    let mut updated = 0;
    for (id, temp) in rows {
        if let Some(temp) = temp {
            updated += diesel::update(item::table.find(id))
                .set(item::created_date.eq(temp.date()))
                .execute(conn)?;
        }
    }
    Ok(updated)
}
