use diesel::prelude::*;
use super::schema::reports;


#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = reports)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ReportRow {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub flood_level: String,
    pub message: String,
    pub created_time: i64,
}

#[derive(Insertable)]
#[diesel(table_name = reports)]
pub struct NewReport<'a> {
    pub user_id: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub flood_level: &'a str,
    pub message: &'a str,
    pub created_time: i64,
}
