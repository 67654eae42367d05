use std::collections::{BTreeSet, HashMap};

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::models::{
    Chef, Ingredient, Item, ItemDraft, ItemIngredientRow, ItemRow, Menu, MenuChanges, MenuDraft,
    MenuItemRow, MenuRow, NewItemRow, NewMenuRow,
};
use crate::schema::{ingredient, item, item_ingredients, menu, menu_items, users};

no_arg_sql_function!(
    last_insert_rowid,
    diesel::sql_types::Integer,
    "Represents SQLite's last_insert_rowid() function"
);

/// Storage capabilities shared by every entity.
pub(crate) trait Repository {
    type Entity;
    type Draft;

    fn get(&self, id: i32) -> QueryResult<Option<Self::Entity>>;
    fn list(&self) -> QueryResult<Vec<Self::Entity>>;
    fn save(&self, draft: &Self::Draft) -> QueryResult<Self::Entity>;
    /// Returns whether a row was removed.
    fn delete(&self, id: i32) -> QueryResult<bool>;
}

pub(crate) trait ItemRepository: Repository<Entity = Item, Draft = ItemDraft> {
    /// Ids of every stored item, without loading the items themselves.
    fn ids(&self) -> QueryResult<BTreeSet<i32>>;
}

pub(crate) trait MenuRepository: Repository<Entity = Menu, Draft = MenuDraft> {
    /// Updates a menu in place, replacing its item set. `None` if the menu
    /// does not exist.
    fn update(&self, id: i32, changes: &MenuChanges) -> QueryResult<Option<Menu>>;
}

pub(crate) fn inserted_id(conn: &SqliteConnection) -> QueryResult<i32> {
    diesel::select(last_insert_rowid).get_result::<i32>(conn)
}

// Ingredients are only written by fixtures; no route manages them.
#[cfg(test)]
pub(crate) struct IngredientRepo<'a> {
    conn: &'a SqliteConnection,
}

#[cfg(test)]
impl<'a> IngredientRepo<'a> {
    pub(crate) fn new(conn: &'a SqliteConnection) -> Self {
        IngredientRepo { conn }
    }
}

#[cfg(test)]
impl Repository for IngredientRepo<'_> {
    type Entity = Ingredient;
    type Draft = crate::models::IngredientDraft;

    fn get(&self, id: i32) -> QueryResult<Option<Ingredient>> {
        ingredient::table.find(id).first(self.conn).optional()
    }

    fn list(&self) -> QueryResult<Vec<Ingredient>> {
        ingredient::table.order(ingredient::id.asc()).load(self.conn)
    }

    fn save(&self, draft: &Self::Draft) -> QueryResult<Ingredient> {
        self.conn.transaction(|| {
            diesel::insert_into(ingredient::table)
                .values(draft)
                .execute(self.conn)?;
            let id = inserted_id(self.conn)?;
            ingredient::table.find(id).first(self.conn)
        })
    }

    fn delete(&self, id: i32) -> QueryResult<bool> {
        self.conn.transaction(|| {
            diesel::delete(item_ingredients::table.filter(item_ingredients::ingredient_id.eq(id)))
                .execute(self.conn)?;
            let removed = diesel::delete(ingredient::table.find(id)).execute(self.conn)?;
            Ok(removed > 0)
        })
    }
}

pub(crate) struct ItemRepo<'a> {
    conn: &'a SqliteConnection,
}

impl<'a> ItemRepo<'a> {
    pub(crate) fn new(conn: &'a SqliteConnection) -> Self {
        ItemRepo { conn }
    }
}

impl Repository for ItemRepo<'_> {
    type Entity = Item;
    type Draft = ItemDraft;

    fn get(&self, id: i32) -> QueryResult<Option<Item>> {
        let row = item::table.find(id).first::<ItemRow>(self.conn).optional()?;
        match row {
            Some(row) => Ok(hydrate_items(self.conn, vec![row])?.pop()),
            None => Ok(None),
        }
    }

    fn list(&self) -> QueryResult<Vec<Item>> {
        let rows = item::table.order(item::id.asc()).load::<ItemRow>(self.conn)?;
        hydrate_items(self.conn, rows)
    }

    fn save(&self, draft: &ItemDraft) -> QueryResult<Item> {
        let id = self.conn.transaction::<_, diesel::result::Error, _>(|| {
            diesel::insert_into(item::table)
                .values(&NewItemRow {
                    name: &draft.name,
                    description: &draft.description,
                    chef_id: draft.chef_id,
                    created_date: draft.created_date,
                    standard: draft.standard,
                })
                .execute(self.conn)?;
            let id = inserted_id(self.conn)?;
            for ingredient_id in &draft.ingredient_ids {
                diesel::insert_into(item_ingredients::table)
                    .values(&ItemIngredientRow {
                        item_id: id,
                        ingredient_id: *ingredient_id,
                    })
                    .execute(self.conn)?;
            }
            Ok(id)
        })?;
        self.get(id)?.ok_or(diesel::result::Error::NotFound)
    }

    fn delete(&self, id: i32) -> QueryResult<bool> {
        self.conn.transaction(|| {
            diesel::delete(item_ingredients::table.filter(item_ingredients::item_id.eq(id)))
                .execute(self.conn)?;
            diesel::delete(menu_items::table.filter(menu_items::item_id.eq(id)))
                .execute(self.conn)?;
            let removed = diesel::delete(item::table.find(id)).execute(self.conn)?;
            Ok(removed > 0)
        })
    }
}

impl ItemRepository for ItemRepo<'_> {
    fn ids(&self) -> QueryResult<BTreeSet<i32>> {
        let ids = item::table.select(item::id).load::<i32>(self.conn)?;
        Ok(ids.into_iter().collect())
    }
}

/// Attaches chefs and ingredients to item rows, keeping row order.
fn hydrate_items(conn: &SqliteConnection, rows: Vec<ItemRow>) -> QueryResult<Vec<Item>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let item_ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
    let chef_ids: Vec<i32> = rows.iter().map(|row| row.chef_id).collect();

    let chefs: HashMap<i32, Chef> = users::table
        .filter(users::id.eq_any(chef_ids))
        .load::<Chef>(conn)?
        .into_iter()
        .map(|chef| (chef.id, chef))
        .collect();

    let mut ingredients: HashMap<i32, Vec<Ingredient>> = HashMap::new();
    let links = item_ingredients::table
        .inner_join(ingredient::table)
        .filter(item_ingredients::item_id.eq_any(item_ids))
        .order(ingredient::id.asc())
        .load::<(ItemIngredientRow, Ingredient)>(conn)?;
    for (link, ingredient) in links {
        ingredients.entry(link.item_id).or_default().push(ingredient);
    }

    rows.into_iter()
        .map(|row| {
            let chef = chefs
                .get(&row.chef_id)
                .cloned()
                .ok_or(diesel::result::Error::NotFound)?;
            Ok(Item {
                id: row.id,
                name: row.name,
                description: row.description,
                chef,
                created_date: row.created_date,
                standard: row.standard,
                ingredients: ingredients.remove(&row.id).unwrap_or_default(),
            })
        })
        .collect()
}

pub(crate) struct MenuRepo<'a> {
    conn: &'a SqliteConnection,
}

impl<'a> MenuRepo<'a> {
    pub(crate) fn new(conn: &'a SqliteConnection) -> Self {
        MenuRepo { conn }
    }

    fn add_items(&self, menu_id: i32, item_ids: &[i32]) -> QueryResult<()> {
        // one row per item, after the menu row exists
        for item_id in item_ids {
            diesel::insert_into(menu_items::table)
                .values(&MenuItemRow {
                    menu_id,
                    item_id: *item_id,
                })
                .execute(self.conn)?;
        }
        Ok(())
    }
}

impl Repository for MenuRepo<'_> {
    type Entity = Menu;
    type Draft = MenuDraft;

    fn get(&self, id: i32) -> QueryResult<Option<Menu>> {
        let row = menu::table.find(id).first::<MenuRow>(self.conn).optional()?;
        match row {
            Some(row) => Ok(hydrate_menus(self.conn, vec![row])?.pop()),
            None => Ok(None),
        }
    }

    fn list(&self) -> QueryResult<Vec<Menu>> {
        let rows = menu::table.order(menu::id.asc()).load::<MenuRow>(self.conn)?;
        hydrate_menus(self.conn, rows)
    }

    fn save(&self, draft: &MenuDraft) -> QueryResult<Menu> {
        let id = self.conn.transaction::<_, diesel::result::Error, _>(|| {
            diesel::insert_into(menu::table)
                .values(&NewMenuRow {
                    season: &draft.season,
                    created_date: draft.created_date,
                    expiration_date: draft.expiration_date,
                })
                .execute(self.conn)?;
            let id = inserted_id(self.conn)?;
            self.add_items(id, &draft.item_ids)?;
            Ok(id)
        })?;
        self.get(id)?.ok_or(diesel::result::Error::NotFound)
    }

    fn delete(&self, id: i32) -> QueryResult<bool> {
        self.conn.transaction(|| {
            diesel::delete(menu_items::table.filter(menu_items::menu_id.eq(id)))
                .execute(self.conn)?;
            let removed = diesel::delete(menu::table.find(id)).execute(self.conn)?;
            Ok(removed > 0)
        })
    }
}

impl MenuRepository for MenuRepo<'_> {
    fn update(&self, id: i32, changes: &MenuChanges) -> QueryResult<Option<Menu>> {
        let updated = self.conn.transaction::<_, diesel::result::Error, _>(|| {
            let updated = diesel::update(menu::table.find(id))
                .set((
                    menu::season.eq(changes.season.as_str()),
                    menu::expiration_date.eq(changes.expiration_date),
                ))
                .execute(self.conn)?;
            if updated == 0 {
                return Ok(false);
            }
            diesel::delete(menu_items::table.filter(menu_items::menu_id.eq(id)))
                .execute(self.conn)?;
            self.add_items(id, &changes.item_ids)?;
            Ok(true)
        })?;
        if updated {
            self.get(id)
        } else {
            Ok(None)
        }
    }
}

/// Prefetches the items of every menu in one pass.
fn hydrate_menus(conn: &SqliteConnection, rows: Vec<MenuRow>) -> QueryResult<Vec<Menu>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let menu_ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
    let links = menu_items::table
        .inner_join(item::table)
        .filter(menu_items::menu_id.eq_any(menu_ids))
        .order(item::id.asc())
        .load::<(MenuItemRow, ItemRow)>(conn)?;

    let mut item_rows: Vec<ItemRow> = Vec::new();
    let mut membership: HashMap<i32, Vec<i32>> = HashMap::new();
    for (link, row) in links {
        membership.entry(link.menu_id).or_default().push(row.id);
        if !item_rows.iter().any(|known| known.id == row.id) {
            item_rows.push(row);
        }
    }
    let items: HashMap<i32, Item> = hydrate_items(conn, item_rows)?
        .into_iter()
        .map(|item| (item.id, item))
        .collect();

    Ok(rows
        .into_iter()
        .map(|row| {
            let items_on_menu = membership
                .remove(&row.id)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|item_id| items.get(&item_id).cloned())
                .collect();
            Menu {
                id: row.id,
                season: row.season,
                created_date: row.created_date,
                expiration_date: row.expiration_date,
                items: items_on_menu,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IngredientDraft;
    use crate::test_support::{chef, connection, seed_item};
    use chrono::NaiveDate;
    use diesel::connection::SimpleConnection;

    #[test]
    fn ingredient_round_trip() {
        let conn = connection();
        let repo = IngredientRepo::new(&conn);
        let banana = repo
            .save(&IngredientDraft {
                name: "Banana".to_string(),
            })
            .unwrap();
        assert_eq!(banana.name, "Banana");
        assert_eq!(repo.get(banana.id).unwrap(), Some(banana.clone()));
        assert_eq!(repo.list().unwrap(), vec![banana.clone()]);
        assert!(repo.delete(banana.id).unwrap());
        assert!(!repo.delete(banana.id).unwrap());
        assert_eq!(repo.get(banana.id).unwrap(), None);
    }

    #[test]
    fn item_carries_chef_and_shared_ingredients() {
        let conn = connection();
        let pumpkin = IngredientRepo::new(&conn)
            .save(&IngredientDraft {
                name: "Pumpkin".to_string(),
            })
            .unwrap();
        let chef = chef(&conn);
        let repo = ItemRepo::new(&conn);
        let created_date = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let draft = |name: &str| ItemDraft {
            name: name.to_string(),
            description: "A kind of dessert with pumpkin, cinnamon, nutmeg".to_string(),
            chef_id: chef.id,
            created_date,
            standard: true,
            ingredient_ids: vec![pumpkin.id],
        };
        let pie = repo.save(&draft("Pumpkin pie")).unwrap();
        let bread = repo.save(&draft("Pumpkin bread")).unwrap();

        assert_eq!(pie.chef, chef);
        assert_eq!(pie.ingredients, vec![pumpkin.clone()]);
        assert_eq!(bread.ingredients, vec![pumpkin]);
        assert_eq!(pie.created_date, created_date);
        assert_eq!(repo.list().unwrap().len(), 2);
    }

    #[test]
    fn item_ids_skip_hydration() {
        let conn = connection();
        let day = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let a = seed_item(&conn, "A", day);
        let b = seed_item(&conn, "B", day);
        let repo = ItemRepo::new(&conn);
        assert_eq!(repo.ids().unwrap(), [a.id, b.id].into_iter().collect());

        // ids come from the item table alone, so a dangling chef does not matter
        conn.batch_execute("PRAGMA foreign_keys = OFF; DELETE FROM users;").unwrap();
        assert!(repo.list().is_err());
        assert_eq!(repo.ids().unwrap().len(), 2);
    }

    #[test]
    fn deleting_an_item_keeps_its_ingredients() {
        let conn = connection();
        let item = seed_item(&conn, "Banana pudding", NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        let ingredient_id = item.ingredients[0].id;
        assert!(ItemRepo::new(&conn).delete(item.id).unwrap());
        assert!(ItemRepo::new(&conn).get(item.id).unwrap().is_none());
        assert!(IngredientRepo::new(&conn).get(ingredient_id).unwrap().is_some());
    }

    #[test]
    fn menu_update_replaces_items() {
        let conn = connection();
        let day = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let a = seed_item(&conn, "A", day);
        let b = seed_item(&conn, "B", day);
        let c = seed_item(&conn, "C", day);
        let repo = MenuRepo::new(&conn);
        let menu = repo
            .save(&MenuDraft {
                season: "Fall".to_string(),
                created_date: day.and_hms_opt(9, 0, 0).unwrap(),
                expiration_date: Some(day),
                item_ids: vec![a.id, b.id],
            })
            .unwrap();
        assert_eq!(menu.item_ids(), vec![a.id, b.id]);

        let updated = repo
            .update(
                menu.id,
                &MenuChanges {
                    season: "Winter".to_string(),
                    expiration_date: None,
                    item_ids: vec![c.id, b.id],
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.season, "Winter");
        assert_eq!(updated.expiration_date, None);
        assert_eq!(updated.item_ids(), vec![b.id, c.id]);
        assert_eq!(updated.created_date, menu.created_date);
    }

    #[test]
    fn menu_update_of_missing_row_is_none() {
        let conn = connection();
        let changes = MenuChanges {
            season: "Fall".to_string(),
            expiration_date: None,
            item_ids: Vec::new(),
        };
        assert_eq!(MenuRepo::new(&conn).update(42, &changes).unwrap(), None);
    }
}
