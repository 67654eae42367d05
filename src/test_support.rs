use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::migrations::run_migrations;
use crate::models::{Chef, IngredientDraft, Item, ItemDraft, NewChef};
use crate::repository::{inserted_id, IngredientRepo, ItemRepo, Repository};
use crate::schema::users;

/// In-memory database with every migration applied.
pub(crate) fn connection() -> SqliteConnection {
    let conn = SqliteConnection::establish(":memory:").unwrap();
    run_migrations(&conn).unwrap();
    conn
}

pub(crate) fn chef(conn: &SqliteConnection) -> Chef {
    let existing = users::table
        .filter(users::username.eq("tester"))
        .first::<Chef>(conn)
        .optional()
        .unwrap();
    existing.unwrap_or_else(|| {
        diesel::insert_into(users::table)
            .values(&NewChef { username: "tester" })
            .execute(conn)
            .unwrap();
        let id = inserted_id(conn).unwrap();
        users::table.find(id).first::<Chef>(conn).unwrap()
    })
}

/// Saves an item with one ingredient of its own.
pub(crate) fn seed_item(conn: &SqliteConnection, name: &str, created_date: NaiveDate) -> Item {
    let ingredient = IngredientRepo::new(conn)
        .save(&IngredientDraft {
            name: format!("{} filling", name),
        })
        .unwrap();
    let chef = chef(conn);
    ItemRepo::new(conn)
        .save(&ItemDraft {
            name: name.to_string(),
            description: format!("{} made in house", name),
            chef_id: chef.id,
            created_date,
            standard: true,
            ingredient_ids: vec![ingredient.id],
        })
        .unwrap()
}
