diesel::table! {
    reports (user_id) {
        user_id -> Text,
        latitude -> Double,
        longitude -> Double,
        flood_level -> Text,
        message -> Text,
        created_time -> BigInt,
    }
}
