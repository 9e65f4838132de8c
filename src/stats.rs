use chrono::{Datelike, NaiveDate};
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use std::sync::Arc;

use crate::database::{DatabaseError, DatabasePool};

const STATS_ID: &str = "stats";

/// Approval counters with the period they were last reset in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsRecord {
    pub today: i64,
    pub month: i64,
    pub total: i64,
    pub date: NaiveDate,
    pub month_no: u32,
}

impl StatsRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            today: 0,
            month: 0,
            total: 0,
            date,
            month_no: date.month(),
        }
    }

    /// Rolls the daily and monthly counters over if `date` is in a new
    /// period, then counts one approval.
    pub fn register_approval(&mut self, date: NaiveDate) {
        if self.date != date {
            self.today = 0;
            self.date = date;
        }
        if self.month_no != date.month() {
            self.month = 0;
            self.month_no = date.month();
        }
        self.today += 1;
        self.month += 1;
        self.total += 1;
    }
}

/// The singleton stats row. Updates run inside an immediate transaction so
/// concurrent approvals are applied one after another.
#[derive(Clone)]
pub struct StatsLedger {
    pool: Arc<DatabasePool>,
}

impl StatsLedger {
    pub fn new(pool: Arc<DatabasePool>) -> Self {
        Self { pool }
    }

    /// Inserts a zeroed record for `date` unless one already exists.
    pub async fn ensure(&self, date: NaiveDate) -> Result<StatsRecord, DatabaseError> {
        let fresh = StatsRecord::new(date);
        self.pool
            .execute_with_timeout(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO stats (id, today, month, total, date, month_no)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![STATS_ID, fresh.today, fresh.month, fresh.total, fresh.date, fresh.month_no],
                )?;
                read_record(conn)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
            })
            .await
    }

    /// Returns the record exactly as stored, without rolling it over.
    pub async fn load(&self) -> Result<Option<StatsRecord>, DatabaseError> {
        self.pool.execute_with_timeout(|conn| read_record(conn)).await
    }

    /// Applies one approval on `date` and returns the updated record.
    pub async fn record_approval(&self, date: NaiveDate) -> Result<StatsRecord, DatabaseError> {
        self.pool
            .execute_with_timeout(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let mut record = read_record(&tx)?.unwrap_or_else(|| StatsRecord::new(date));
                record.register_approval(date);
                tx.execute(
                    "INSERT INTO stats (id, today, month, total, date, month_no)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(id) DO UPDATE SET
                        today = excluded.today,
                        month = excluded.month,
                        total = excluded.total,
                        date = excluded.date,
                        month_no = excluded.month_no",
                    params![STATS_ID, record.today, record.month, record.total, record.date, record.month_no],
                )?;
                tx.commit()?;
                Ok(record)
            })
            .await
    }
}

fn read_record(conn: &rusqlite::Connection) -> rusqlite::Result<Option<StatsRecord>> {
    conn.query_row(
        "SELECT today, month, total, date, month_no FROM stats WHERE id = ?1",
        [STATS_ID],
        |row| {
            Ok(StatsRecord {
                today: row.get(0)?,
                month: row.get(1)?,
                total: row.get(2)?,
                date: row.get(3)?,
                month_no: row.get(4)?,
            })
        },
    )
    .optional()
}
