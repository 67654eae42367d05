//! Menu and item use cases, independent of HTTP.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::AppError;
use crate::forms::{self, MenuFormData};
use crate::models::{Item, Menu, MenuChanges, MenuDraft};
use crate::repository::{ItemRepository, MenuRepository, Repository};

pub(crate) fn list_items<R>(items: &R) -> Result<Vec<Item>, AppError>
where
    R: Repository<Entity = Item>,
{
    let mut items = items.list()?;
    items.sort_by_key(|item| item.created_date);
    Ok(items)
}

pub(crate) fn item_detail<R>(items: &R, id: i32) -> Result<Item, AppError>
where
    R: Repository<Entity = Item>,
{
    items.get(id)?.ok_or_else(|| AppError::not_found("item", id))
}

/// Menus still valid on `today`, soonest expiration first. Menus without an
/// expiration date are left out.
pub(crate) fn select_current(menus: Vec<Menu>, today: NaiveDate) -> Vec<Menu> {
    let mut current: Vec<Menu> = menus
        .into_iter()
        .filter(|menu| matches!(menu.expiration_date, Some(date) if date >= today))
        .collect();
    current.sort_by_key(|menu| menu.expiration_date);
    current
}

pub(crate) fn current_menus<M>(menus: &M, today: NaiveDate) -> Result<Vec<Menu>, AppError>
where
    M: Repository<Entity = Menu>,
{
    Ok(select_current(menus.list()?, today))
}

pub(crate) fn menu_detail<M>(menus: &M, id: i32) -> Result<Menu, AppError>
where
    M: Repository<Entity = Menu>,
{
    menus.get(id)?.ok_or_else(|| AppError::not_found("menu", id))
}

fn known_item_ids<R: ItemRepository>(items: &R) -> Result<BTreeSet<i32>, AppError> {
    Ok(items.ids()?)
}

pub(crate) fn create_menu<M, R>(
    menus: &M,
    items: &R,
    form: &MenuFormData,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<Menu, AppError>
where
    M: MenuRepository,
    R: ItemRepository,
{
    let valid = forms::validate(form, &known_item_ids(items)?, today).map_err(AppError::Invalid)?;
    let menu = menus.save(&MenuDraft {
        season: valid.season,
        created_date: now,
        expiration_date: Some(valid.expiration_date),
        item_ids: valid.item_ids,
    })?;
    log::info!("created menu {} ({}) with {} item(s)", menu.id, menu, menu.items.len());
    Ok(menu)
}

pub(crate) fn edit_menu<M, R>(
    menus: &M,
    items: &R,
    id: i32,
    form: &MenuFormData,
    today: NaiveDate,
) -> Result<Menu, AppError>
where
    M: MenuRepository,
    R: ItemRepository,
{
    // a missing menu wins over a bad form
    menu_detail(menus, id)?;
    let valid = forms::validate(form, &known_item_ids(items)?, today).map_err(AppError::Invalid)?;
    let changes = MenuChanges {
        season: valid.season,
        expiration_date: Some(valid.expiration_date),
        item_ids: valid.item_ids,
    };
    let menu = menus
        .update(id, &changes)?
        .ok_or_else(|| AppError::not_found("menu", id))?;
    log::info!("edited menu {} ({})", menu.id, menu);
    Ok(menu)
}

pub(crate) fn delete_menu<M>(menus: &M, id: i32) -> Result<(), AppError>
where
    M: Repository<Entity = Menu>,
{
    if !menus.delete(id)? {
        return Err(AppError::not_found("menu", id));
    }
    log::info!("deleted menu {}", id);
    Ok(())
}
