pub mod models;
pub mod schema;


use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel::result::QueryResult;

use models::*;
use schema::reports::dsl::{self as r_dsl};


const CREATE_REPORTS_TABLE: &'static str = "
    CREATE TABLE IF NOT EXISTS reports (
        user_id TEXT PRIMARY KEY NOT NULL,
        latitude DOUBLE NOT NULL,
        longitude DOUBLE NOT NULL,
        flood_level TEXT NOT NULL,
        message TEXT NOT NULL DEFAULT '',
        created_time BIGINT NOT NULL
    )";


pub fn establish_connection(database_url: &str) -> ConnectionResult<SqliteConnection> {
    SqliteConnection::establish(database_url)
}

pub fn create_tables(conn: &mut SqliteConnection) -> QueryResult<()> {
    diesel::sql_query(CREATE_REPORTS_TABLE)
        .execute(conn)
        .map(|_| ())
}

pub fn get_reports(conn: &mut SqliteConnection) -> QueryResult<Vec<ReportRow>> {
    r_dsl::reports
        .order(r_dsl::user_id)
        .select(ReportRow::as_select())
        .load(conn)
}

/// Inserts the report, replacing the previous one of the same user.
pub fn upsert_report(conn: &mut SqliteConnection, report: &NewReport) -> QueryResult<usize> {
    diesel::insert_into(schema::reports::table)
        .values(report)
        .on_conflict(r_dsl::user_id)
        .do_update()
        .set((
            r_dsl::latitude.eq(report.latitude),
            r_dsl::longitude.eq(report.longitude),
            r_dsl::flood_level.eq(report.flood_level),
            r_dsl::message.eq(report.message),
            r_dsl::created_time.eq(report.created_time),
        ))
        .execute(conn)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn memory_conn() -> SqliteConnection {
        let mut conn = establish_connection(":memory:").unwrap();
        create_tables(&mut conn).unwrap();
        conn
    }

    fn new_report(user_id: &str, created_time: i64) -> NewReport<'_> {
        NewReport {
            user_id,
            latitude: 14.8,
            longitude: 120.9,
            flood_level: "Minor Injury",
            message: "",
            created_time,
        }
    }

    #[test]
    fn upsert_replaces_existing_user_row() {
        let mut conn = memory_conn();

        upsert_report(&mut conn, &new_report("u1", 10)).unwrap();
        upsert_report(&mut conn, &new_report("u1", 20)).unwrap();
        upsert_report(&mut conn, &new_report("u2", 15)).unwrap();

        let rows = get_reports(&mut conn).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, "u1");
        assert_eq!(rows[0].created_time, 20);
    }

    #[test]
    fn create_tables_is_idempotent() {
        let mut conn = memory_conn();
        create_tables(&mut conn).unwrap();

        assert!(get_reports(&mut conn).unwrap().is_empty());
    }
}
