diesel::table! {
    characters (id) {
        id -> Int4,
        name -> Varchar,
        slug -> Varchar,
        publisher -> Int2,
        disabled -> Bool,
    }
}

diesel::table! {
    character_sources (id) {
        id -> Int4,
        character_id -> Int4,
        url -> Varchar,
        vendor_type -> Int2,
        is_main -> Bool,
        is_disabled -> Bool,
    }
}

diesel::table! {
    issues (id) {
        id -> Int4,
        vendor_type -> Int2,
        vendor_id -> Varchar,
        series -> Varchar,
        number_str -> Varchar,
        publisher -> Int2,
        publication_date -> Date,
        sale_date -> Date,
        format -> Int2,
        is_variant -> Bool,
        is_reprint -> Bool,
        month_uncertain -> Bool,
    }
}

diesel::table! {
    character_issues (id) {
        id -> Int4,
        character_id -> Int4,
        issue_id -> Int4,
        appearance_type -> Int2,
    }
}

diesel::table! {
    character_sync_logs (id) {
        id -> Int4,
        character_id -> Int4,
        sync_type -> Int2,
        status -> Int2,
        message -> Varchar,
        created_at -> Timestamptz,
        synced_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(character_sources -> characters (character_id));
diesel::joinable!(character_issues -> characters (character_id));
diesel::joinable!(character_issues -> issues (issue_id));
diesel::joinable!(character_sync_logs -> characters (character_id));

diesel::allow_tables_to_appear_in_same_query!(
    character_issues,
    character_sources,
    character_sync_logs,
    characters,
    issues,
);
