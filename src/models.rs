use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[cfg(test)]
use crate::schema::{ingredient, users};
use crate::schema::{item, item_ingredients, menu, menu_items};

/// The user an [`Item`] belongs to. Accounts are managed elsewhere; only the
/// identity is stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable)]
pub(crate) struct Chef {
    pub id: i32,
    pub username: String,
}

#[cfg(test)]
#[derive(Debug, Insertable)]
#[table_name = "users"]
pub(crate) struct NewChef<'a> {
    pub username: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable)]
pub(crate) struct Ingredient {
    pub id: i32,
    pub name: String,
}

#[cfg(test)]
#[derive(Debug, Clone, Insertable)]
#[table_name = "ingredient"]
pub(crate) struct IngredientDraft {
    pub name: String,
}

/// Raw `item` row, in column order.
#[derive(Debug, Clone, Queryable)]
pub(crate) struct ItemRow {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub chef_id: i32,
    pub created_date: NaiveDate,
    #[allow(dead_code)]
    pub created_date_temp: Option<NaiveDateTime>,
    pub standard: bool,
}

#[derive(Debug, Insertable)]
#[table_name = "item"]
pub(crate) struct NewItemRow<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub chef_id: i32,
    pub created_date: NaiveDate,
    pub standard: bool,
}

/// A dish with its chef and the ingredients it shares with other dishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Item {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub chef: Chef,
    pub created_date: NaiveDate,
    pub standard: bool,
    pub ingredients: Vec<Ingredient>,
}

#[derive(Debug, Clone)]
pub(crate) struct ItemDraft {
    pub name: String,
    pub description: String,
    pub chef_id: i32,
    pub created_date: NaiveDate,
    pub standard: bool,
    pub ingredient_ids: Vec<i32>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[table_name = "item_ingredients"]
pub(crate) struct ItemIngredientRow {
    pub item_id: i32,
    pub ingredient_id: i32,
}

#[derive(Debug, Clone, Queryable)]
pub(crate) struct MenuRow {
    pub id: i32,
    pub season: String,
    pub created_date: NaiveDateTime,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Insertable)]
#[table_name = "menu"]
pub(crate) struct NewMenuRow<'a> {
    pub season: &'a str,
    pub created_date: NaiveDateTime,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[table_name = "menu_items"]
pub(crate) struct MenuItemRow {
    pub menu_id: i32,
    pub item_id: i32,
}

/// A seasonal listing of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Menu {
    pub id: i32,
    pub season: String,
    pub created_date: NaiveDateTime,
    pub expiration_date: Option<NaiveDate>,
    pub items: Vec<Item>,
}

impl Menu {
    pub(crate) fn item_ids(&self) -> Vec<i32> {
        self.items.iter().map(|item| item.id).collect()
    }

    pub(crate) fn list_from_u8(bytes: &[u8]) -> Result<Vec<Self>, bincode::Error> {
        bincode::deserialize(bytes)
    }

    pub(crate) fn list_to_u8(menus: &[Self]) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(menus)
    }
}

impl std::fmt::Display for Menu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.season)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MenuDraft {
    pub season: String,
    pub created_date: NaiveDateTime,
    pub expiration_date: Option<NaiveDate>,
    pub item_ids: Vec<i32>,
}

/// Fields an edit may touch. `item_ids` replaces the whole item set.
#[derive(Debug, Clone)]
pub(crate) struct MenuChanges {
    pub season: String,
    pub expiration_date: Option<NaiveDate>,
    pub item_ids: Vec<i32>,
}
