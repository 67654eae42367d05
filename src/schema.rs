table! {
    users (id) {
        id -> Integer,
        username -> Text,
    }
}

table! {
    ingredient (id) {
        id -> Integer,
        name -> Text,
    }
}

table! {
    item (id) {
        id -> Integer,
        name -> Text,
        description -> Text,
        chef_id -> Integer,
        created_date -> Date,
        created_date_temp -> Nullable<Timestamp>,
        standard -> Bool,
    }
}

table! {
    item_ingredients (item_id, ingredient_id) {
        item_id -> Integer,
        ingredient_id -> Integer,
    }
}

table! {
    menu (id) {
        id -> Integer,
        season -> Text,
        created_date -> Timestamp,
        expiration_date -> Nullable<Date>,
    }
}

table! {
    menu_items (menu_id, item_id) {
        menu_id -> Integer,
        item_id -> Integer,
    }
}

table! {
    schema_version (version) {
        version -> Integer,
        applied_at -> Timestamp,
    }
}

joinable!(item -> users (chef_id));
joinable!(item_ingredients -> ingredient (ingredient_id));
joinable!(item_ingredients -> item (item_id));
joinable!(menu_items -> item (item_id));
joinable!(menu_items -> menu (menu_id));

allow_tables_to_appear_in_same_query!(
    users,
    ingredient,
    item,
    item_ingredients,
    menu,
    menu_items,
);
