use actix_web::http::header;
use actix_web::{get, post, web, HttpResponse};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::cache::{Lookup, MenuCache};
use crate::error::AppError;
use crate::forms::{FieldError, MenuFormData};
use crate::models::{Item, Menu};
use crate::repository::{ItemRepo, MenuRepo};
use crate::service;
use crate::store::Store;

const DELETE_PROMPT: &str = "Do you want to delete this item?";

/// A menu form as it would be rendered: bound values, the items to choose
/// from and any field errors.
#[derive(Debug, Serialize)]
struct FormPage {
    menu_id: Option<i32>,
    form: MenuFormData,
    items: Vec<Item>,
    errors: Vec<FieldError>,
}

#[derive(Debug, Serialize)]
struct DeletePage {
    prompt: &'static str,
    menu: Menu,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn redirect(location: String) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

async fn form_page(
    store: &Store,
    menu_id: Option<i32>,
    form: MenuFormData,
    errors: Vec<FieldError>,
) -> Result<HttpResponse, AppError> {
    let items = store
        .run(|conn| service::list_items(&ItemRepo::new(conn)))
        .await?;
    Ok(HttpResponse::Ok().json(FormPage {
        menu_id,
        form,
        items,
        errors,
    }))
}

async fn invalidate_menus(cache: &MenuCache) -> Result<(), AppError> {
    if cache.is_enabled() {
        let cache = cache.clone();
        web::block(move || cache.invalidate()).await?;
    }
    Ok(())
}

#[get("/items")]
async fn item_list(store: web::Data<Store>) -> Result<HttpResponse, AppError> {
    let items = store
        .run(|conn| service::list_items(&ItemRepo::new(conn)))
        .await?;
    Ok(HttpResponse::Ok().json(items))
}

#[get("/items/{id}")]
async fn item_detail(id: web::Path<i32>, store: web::Data<Store>) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    let item = store
        .run(move |conn| service::item_detail(&ItemRepo::new(conn), id))
        .await?;
    Ok(HttpResponse::Ok().json(item))
}

#[get("/menus")]
async fn menu_list(
    store: web::Data<Store>,
    cache: web::Data<MenuCache>,
) -> Result<HttpResponse, AppError> {
    let today = today();
    let lookup = if cache.is_enabled() {
        let reader = cache.get_ref().clone();
        web::block(move || reader.lookup(today)).await?
    } else {
        Lookup::Unavailable
    };
    // the key carries the generation read before the store, so a write in
    // between leaves this fill unreachable
    let fill_key = match lookup {
        Lookup::Hit(menus) => return Ok(HttpResponse::Ok().json(menus)),
        Lookup::Miss(key) => Some(key),
        Lookup::Unavailable => None,
    };

    let menus = store
        .run(move |conn| service::current_menus(&MenuRepo::new(conn), today))
        .await?;

    if let Some(key) = fill_key {
        let writer = cache.get_ref().clone();
        let snapshot = menus.clone();
        web::block(move || writer.store_current_menus(&key, &snapshot)).await?;
    }
    Ok(HttpResponse::Ok().json(menus))
}

#[get("/menus/new")]
async fn new_menu_form(store: web::Data<Store>) -> Result<HttpResponse, AppError> {
    form_page(&store, None, MenuFormData::initial(today()), Vec::new()).await
}

#[post("/menus/new")]
async fn create_new_menu(
    form: web::Form<Vec<(String, String)>>,
    store: web::Data<Store>,
    cache: web::Data<MenuCache>,
) -> Result<HttpResponse, AppError> {
    let submitted = MenuFormData::from_pairs(form.into_inner());
    let raw = submitted.clone();
    let (today, now) = (today(), now());
    let result = store
        .run(move |conn| {
            service::create_menu(&MenuRepo::new(conn), &ItemRepo::new(conn), &raw, today, now)
        })
        .await;

    match result {
        Ok(menu) => {
            invalidate_menus(&cache).await?;
            Ok(redirect(format!("/menus/{}", menu.id)))
        }
        Err(AppError::Invalid(errors)) => form_page(&store, None, submitted, errors).await,
        Err(e) => Err(e),
    }
}

#[get("/menus/{id}")]
async fn menu_detail(id: web::Path<i32>, store: web::Data<Store>) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    let menu = store
        .run(move |conn| service::menu_detail(&MenuRepo::new(conn), id))
        .await?;
    Ok(HttpResponse::Ok().json(menu))
}

#[get("/menus/{id}/edit")]
async fn edit_menu_form(id: web::Path<i32>, store: web::Data<Store>) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    let (menu, items) = store
        .run(move |conn| {
            let menu = service::menu_detail(&MenuRepo::new(conn), id)?;
            let items = service::list_items(&ItemRepo::new(conn))?;
            Ok((menu, items))
        })
        .await?;
    Ok(HttpResponse::Ok().json(FormPage {
        menu_id: Some(menu.id),
        form: MenuFormData::from_menu(&menu),
        items,
        errors: Vec::new(),
    }))
}

#[post("/menus/{id}/edit")]
async fn edit_menu(
    id: web::Path<i32>,
    form: web::Form<Vec<(String, String)>>,
    store: web::Data<Store>,
    cache: web::Data<MenuCache>,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    let submitted = MenuFormData::from_pairs(form.into_inner());
    let raw = submitted.clone();
    let today = today();
    let result = store
        .run(move |conn| {
            service::edit_menu(&MenuRepo::new(conn), &ItemRepo::new(conn), id, &raw, today)
        })
        .await;

    match result {
        Ok(_) => {
            invalidate_menus(&cache).await?;
            Ok(redirect("/menus".to_string()))
        }
        Err(AppError::Invalid(errors)) => form_page(&store, Some(id), submitted, errors).await,
        Err(e) => Err(e),
    }
}

#[get("/menus/{id}/delete")]
async fn delete_menu_confirm(
    id: web::Path<i32>,
    store: web::Data<Store>,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    let menu = store
        .run(move |conn| service::menu_detail(&MenuRepo::new(conn), id))
        .await?;
    Ok(HttpResponse::Ok().json(DeletePage {
        prompt: DELETE_PROMPT,
        menu,
    }))
}

#[post("/menus/{id}/delete")]
async fn delete_menu(
    id: web::Path<i32>,
    store: web::Data<Store>,
    cache: web::Data<MenuCache>,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    store
        .run(move |conn| service::delete_menu(&MenuRepo::new(conn), id))
        .await?;
    invalidate_menus(&cache).await?;
    Ok(redirect("/menus".to_string()))
}

/// Registers every route. `/menus/new` must come before `/menus/{id}`.
pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(item_list)
        .service(item_detail)
        .service(menu_list)
        .service(new_menu_form)
        .service(create_new_menu)
        .service(menu_detail)
        .service(edit_menu_form)
        .service(edit_menu)
        .service(delete_menu_confirm)
        .service(delete_menu);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_store;
    use crate::test_support::seed_item;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::Value;

    macro_rules! app {
        ($store:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($store.clone()))
                    .app_data(web::Data::new(MenuCache::disabled()))
                    .configure(configure),
            )
            .await
        };
    }

    fn seed(store: &Store, names: &[&str]) -> Vec<Item> {
        let conn = store.pool().get().unwrap();
        names
            .iter()
            .map(|name| seed_item(&conn, name, today()))
            .collect()
    }

    fn location(resp: &actix_web::dev::ServiceResponse) -> String {
        resp.headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[actix_web::test]
    async fn item_views() {
        let store = test_store();
        let items = seed(&store, &["Pumpkin pie"]);
        let app = app!(store);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/items").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body[0]["name"], "Pumpkin pie");

        let uri = format!("/items/{}", items[0].id);
        let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["chef"]["username"], "tester");
        assert_eq!(body["description"], "Pumpkin pie made in house");
    }

    #[actix_web::test]
    async fn unknown_ids_are_404() {
        let store = test_store();
        let app = app!(store);
        for uri in [
            "/items/1204",
            "/menus/1204",
            "/menus/1204/edit",
            "/menus/1204/delete",
            "/menus/not-a-number",
        ] {
            let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
        let req = test::TestRequest::post().uri("/menus/1204/delete").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn new_menu_form_lists_items() {
        let store = test_store();
        seed(&store, &["Pumpkin pie", "Cider"]);
        let app = app!(store);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/menus/new").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
        assert_eq!(body["form"]["season"], "");
        assert!(body["errors"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn creating_a_menu_redirects_to_its_detail() {
        let store = test_store();
        let items = seed(&store, &["Pumpkin pie", "Cider"]);
        let app = app!(store);
        let (a, b) = (items[0].id.to_string(), items[1].id.to_string());

        let req = test::TestRequest::post()
            .uri("/menus/new")
            .set_form(&[("season", "Spring"), ("items", a.as_str()), ("items", b.as_str())])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        let detail = location(&resp);
        assert!(detail.starts_with("/menus/"));

        let resp = test::call_service(&app, test::TestRequest::get().uri(&detail).to_request()).await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["season"], "Spring");
        let names: Vec<&str> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Pumpkin pie", "Cider"]);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/menus").to_request()).await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn invalid_submission_redisplays_the_form() {
        let store = test_store();
        let items = seed(&store, &["Pumpkin pie"]);
        let app = app!(store);
        let a = items[0].id.to_string();

        let req = test::TestRequest::post()
            .uri("/menus/new")
            .set_form(&[
                ("season", "This h@s punctu@tion.!@#$"),
                ("items", a.as_str()),
                ("hidden_field", "I am a bot. Rawr!!"),
            ])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["season", "hidden_field"]);
        assert_eq!(body["form"]["season"], "This h@s punctu@tion.!@#$");
        assert!(body["form"].get("hidden_field").is_none());

        let resp = test::call_service(&app, test::TestRequest::get().uri("/menus").to_request()).await;
        let body: Value = test::read_body_json(resp).await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn edit_then_delete() {
        let store = test_store();
        let items = seed(&store, &["A", "B", "C"]);
        let app = app!(store);
        let ids: Vec<String> = items.iter().map(|item| item.id.to_string()).collect();

        let req = test::TestRequest::post()
            .uri("/menus/new")
            .set_form(&[("season", "Fall"), ("items", ids[0].as_str()), ("items", ids[1].as_str())])
            .to_request();
        let detail = location(&test::call_service(&app, req).await);

        let edit = format!("{}/edit", detail);
        let resp = test::call_service(&app, test::TestRequest::get().uri(&edit).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["form"]["season"], "Fall");
        assert_eq!(body["form"]["items"], serde_json::json!([ids[0], ids[1]]));

        let req = test::TestRequest::post()
            .uri(&edit)
            .set_form(&[
                ("season", "Now this is Fall"),
                ("items", ids[1].as_str()),
                ("items", ids[2].as_str()),
                ("expiration_date", "12/31/2099"),
            ])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/menus");

        let resp = test::call_service(&app, test::TestRequest::get().uri(&detail).to_request()).await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["season"], "Now this is Fall");
        assert_eq!(body["expiration_date"], "2099-12-31");
        let names: Vec<&str> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["B", "C"]);

        let delete = format!("{}/delete", detail);
        let resp = test::call_service(&app, test::TestRequest::get().uri(&delete).to_request()).await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["prompt"], DELETE_PROMPT);
        assert_eq!(body["menu"]["season"], "Now this is Fall");

        let req = test::TestRequest::post().uri(&delete).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/menus");

        let resp = test::call_service(&app, test::TestRequest::get().uri(&detail).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let uri = format!("/items/{}", items[1].id);
        let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
