// 🗄️ Persistent Store - SQLite + WAL
// The core talks to the database only through the `Store` trait. Uniqueness
// constraints live here and are the source of truth for deduplication.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{named_params, params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::error::StoreError;
use crate::model::{
    make_name_key, Account, CattleEntry, NewAccount, NewEntry, NewPerson, NewSheet,
    Person, PersonId, PersonSummary, Role, SheetId, SheetSummary, SheetTotals, WeighingSheet,
};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ============================================================================
// QUERY TYPES
// ============================================================================

/// Free-text needle: names are matched on their case-folded key, phones verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct TextNeedle {
    pub folded: String,
    pub raw: String,
}

impl TextNeedle {
    /// None for blank input.
    pub fn new(term: &str) -> Option<Self> {
        let raw = term.trim();
        if raw.is_empty() {
            return None;
        }

        Some(TextNeedle {
            folded: make_name_key(raw),
            raw: raw.to_string(),
        })
    }
}

/// Conjunctive filter over the sheets a person takes part in.
#[derive(Debug, Clone)]
pub struct SheetFilter {
    pub person_id: PersonId,
    pub text: Option<TextNeedle>,
    /// Inclusive lower bound on creation time
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on creation time
    pub to: Option<DateTime<Utc>>,
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Relational store reachable through create/read/update/query operations.
///
/// Writes that violate a uniqueness constraint fail with
/// [`StoreError::DuplicateKey`].
pub trait Store: Send + Sync {
    fn find_person(&self, id: PersonId) -> StoreResult<Option<Person>>;
    fn find_person_by_legal_id(&self, legal_id: &str) -> StoreResult<Option<Person>>;
    fn find_person_by_name_key(&self, name_key: &str) -> StoreResult<Option<Person>>;
    fn insert_person(&self, person: &NewPerson) -> StoreResult<Person>;
    /// Overwrite legal id, name, key and phone of an existing row
    fn update_person(&self, person: &Person) -> StoreResult<()>;
    /// Ordered by name, at most `limit` rows
    fn search_persons(&self, needle: &TextNeedle, limit: usize) -> StoreResult<Vec<PersonSummary>>;
    fn all_persons(&self) -> StoreResult<Vec<Person>>;

    fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;
    fn insert_account(&self, account: &NewAccount) -> StoreResult<Account>;

    fn insert_sheet(&self, sheet: &NewSheet) -> StoreResult<WeighingSheet>;
    fn find_sheet(&self, id: SheetId) -> StoreResult<Option<WeighingSheet>>;
    fn sheet_entries(&self, id: SheetId) -> StoreResult<Vec<CattleEntry>>;
    /// Insert the entry and rewrite the sheet totals from the full entry set,
    /// as one unit. None when the sheet does not exist.
    fn append_entry(
        &self,
        sheet_id: SheetId,
        entry: &NewEntry,
    ) -> StoreResult<Option<(CattleEntry, WeighingSheet)>>;
    /// Newest first
    fn list_sheets(&self, filter: &SheetFilter) -> StoreResult<Vec<SheetSummary>>;
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS persons (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            legal_id TEXT UNIQUE,
            name TEXT NOT NULL,
            name_key TEXT NOT NULL UNIQUE,
            phone TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('ADMIN', 'CLIENT')),
            person_id INTEGER UNIQUE REFERENCES persons(id),
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS weighing_sheets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            seller_id INTEGER NOT NULL REFERENCES persons(id),
            buyer_id INTEGER NOT NULL REFERENCES persons(id),
            created_by INTEGER NOT NULL REFERENCES accounts(id),
            total_weight REAL,
            average_weight INTEGER
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cattle_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sheet_id INTEGER NOT NULL REFERENCES weighing_sheets(id) ON DELETE CASCADE,
            tag_number TEXT NOT NULL,
            cattle_type TEXT NOT NULL,
            sex TEXT NOT NULL,
            weight REAL NOT NULL CHECK (weight > 0),
            mark TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sheets_seller ON weighing_sheets(seller_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sheets_buyer ON weighing_sheets(buyer_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sheets_created_at ON weighing_sheets(created_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_sheet ON cattle_entries(sheet_id)",
        [],
    )?;

    Ok(())
}

/// Fixed-width UTC text so lexical order equals chronological order.
pub fn to_db_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_db_time(text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn text_conversion_error(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(StoreError::Corrupt(message)),
    )
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const PERSON_COLUMNS: &str = "id, legal_id, name, name_key, phone";

fn person_from_row(row: &Row) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get(0)?,
        legal_id: row.get(1)?,
        name: row.get(2)?,
        name_key: row.get(3)?,
        phone: row.get(4)?,
    })
}

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, role, person_id";

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    let role: String = row.get(3)?;

    Ok(Account {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role: Role::parse(&role),
        person_id: row.get(4)?,
    })
}

const SHEET_COLUMNS: &str =
    "id, created_at, seller_id, buyer_id, created_by, total_weight, average_weight";

fn sheet_from_row(row: &Row) -> rusqlite::Result<WeighingSheet> {
    let created_at: String = row.get(1)?;

    Ok(WeighingSheet {
        id: row.get(0)?,
        created_at: parse_db_time(&created_at)?,
        seller_id: row.get(2)?,
        buyer_id: row.get(3)?,
        created_by: row.get(4)?,
        total_weight: row.get(5)?,
        average_weight: row.get(6)?,
    })
}

const ENTRY_COLUMNS: &str = "id, sheet_id, tag_number, cattle_type, sex, weight, mark";

fn entry_from_row(row: &Row) -> rusqlite::Result<CattleEntry> {
    let cattle_type: String = row.get(3)?;
    let sex: String = row.get(4)?;

    Ok(CattleEntry {
        id: row.get(0)?,
        sheet_id: row.get(1)?,
        tag_number: row.get(2)?,
        cattle_type: cattle_type
            .parse()
            .map_err(|_| text_conversion_error(format!("cattle_type '{}'", cattle_type)))?,
        sex: sex
            .parse()
            .map_err(|_| text_conversion_error(format!("sex '{}'", sex)))?,
        weight: row.get(5)?,
        mark: row.get(6)?,
    })
}

fn load_sheet(conn: &Connection, id: SheetId) -> rusqlite::Result<Option<WeighingSheet>> {
    conn.query_row(
        &format!("SELECT {} FROM weighing_sheets WHERE id = ?1", SHEET_COLUMNS),
        params![id],
        sheet_from_row,
    )
    .optional()
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// [`Store`] backed by a single SQLite connection.
///
/// Open several stores on the same file to get independent connections.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: &Path) -> StoreResult<Self> {
        debug!("Opening database at {:?}", path);
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        // Concurrent writers on the same file wait instead of failing
        conn.busy_timeout(Duration::from_secs(5))?;
        setup_database(&conn)?;

        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite stored totals without touching the entries.
    #[cfg(test)]
    pub(crate) fn force_totals(&self, id: SheetId, totals: SheetTotals) -> StoreResult<()> {
        self.conn().execute(
            "UPDATE weighing_sheets SET total_weight = ?1, average_weight = ?2 WHERE id = ?3",
            params![totals.total_weight, totals.average_weight, id],
        )?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn find_person(&self, id: PersonId) -> StoreResult<Option<Person>> {
        let conn = self.conn();
        let person = conn
            .query_row(
                &format!("SELECT {} FROM persons WHERE id = ?1", PERSON_COLUMNS),
                params![id],
                person_from_row,
            )
            .optional()?;
        Ok(person)
    }

    fn find_person_by_legal_id(&self, legal_id: &str) -> StoreResult<Option<Person>> {
        let conn = self.conn();
        let person = conn
            .query_row(
                &format!("SELECT {} FROM persons WHERE legal_id = ?1", PERSON_COLUMNS),
                params![legal_id],
                person_from_row,
            )
            .optional()?;
        Ok(person)
    }

    fn find_person_by_name_key(&self, name_key: &str) -> StoreResult<Option<Person>> {
        let conn = self.conn();
        let person = conn
            .query_row(
                &format!("SELECT {} FROM persons WHERE name_key = ?1", PERSON_COLUMNS),
                params![name_key],
                person_from_row,
            )
            .optional()?;
        Ok(person)
    }

    fn insert_person(&self, person: &NewPerson) -> StoreResult<Person> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO persons (legal_id, name, name_key, phone, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                person.legal_id,
                person.name,
                person.name_key,
                person.phone,
                to_db_time(Utc::now()),
            ],
        )?;

        Ok(Person {
            id: conn.last_insert_rowid(),
            legal_id: person.legal_id.clone(),
            name: person.name.clone(),
            name_key: person.name_key.clone(),
            phone: person.phone.clone(),
        })
    }

    fn update_person(&self, person: &Person) -> StoreResult<()> {
        self.conn().execute(
            "UPDATE persons SET legal_id = ?1, name = ?2, name_key = ?3, phone = ?4
             WHERE id = ?5",
            params![
                person.legal_id,
                person.name,
                person.name_key,
                person.phone,
                person.id,
            ],
        )?;
        Ok(())
    }

    fn search_persons(&self, needle: &TextNeedle, limit: usize) -> StoreResult<Vec<PersonSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, phone
             FROM persons
             WHERE instr(name_key, :folded) > 0
                OR instr(COALESCE(phone, ''), :raw) > 0
             ORDER BY name_key ASC, id ASC
             LIMIT :limit",
        )?;

        let persons = stmt
            .query_map(
                named_params! {
                    ":folded": needle.folded,
                    ":raw": needle.raw,
                    ":limit": limit as i64,
                },
                |row| {
                    Ok(PersonSummary {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        phone: row.get(2)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(persons)
    }

    fn all_persons(&self) -> StoreResult<Vec<Person>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM persons ORDER BY id ASC",
            PERSON_COLUMNS
        ))?;

        let persons = stmt
            .query_map([], person_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(persons)
    }

    fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let conn = self.conn();
        let account = conn
            .query_row(
                &format!("SELECT {} FROM accounts WHERE email = ?1", ACCOUNT_COLUMNS),
                params![email],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    fn insert_account(&self, account: &NewAccount) -> StoreResult<Account> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO accounts (email, password_hash, role, person_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.email,
                account.password_hash,
                account.role.as_str(),
                account.person_id,
                to_db_time(Utc::now()),
            ],
        )?;

        Ok(Account {
            id: conn.last_insert_rowid(),
            email: account.email.clone(),
            password_hash: account.password_hash.clone(),
            role: account.role,
            person_id: account.person_id,
        })
    }

    fn insert_sheet(&self, sheet: &NewSheet) -> StoreResult<WeighingSheet> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO weighing_sheets (created_at, seller_id, buyer_id, created_by)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                to_db_time(sheet.created_at),
                sheet.seller_id,
                sheet.buyer_id,
                sheet.created_by,
            ],
        )?;

        let id = conn.last_insert_rowid();
        load_sheet(&conn, id)?
            .ok_or_else(|| StoreError::Corrupt(format!("sheet {} vanished after insert", id)))
    }

    fn find_sheet(&self, id: SheetId) -> StoreResult<Option<WeighingSheet>> {
        Ok(load_sheet(&self.conn(), id)?)
    }

    fn sheet_entries(&self, id: SheetId) -> StoreResult<Vec<CattleEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM cattle_entries WHERE sheet_id = ?1 ORDER BY id ASC",
            ENTRY_COLUMNS
        ))?;

        let entries = stmt
            .query_map(params![id], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn append_entry(
        &self,
        sheet_id: SheetId,
        entry: &NewEntry,
    ) -> StoreResult<Option<(CattleEntry, WeighingSheet)>> {
        let mut conn = self.conn();
        // Take the write lock up front so the recount sees every committed entry
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if load_sheet(&tx, sheet_id)?.is_none() {
            return Ok(None);
        }

        tx.execute(
            "INSERT INTO cattle_entries (sheet_id, tag_number, cattle_type, sex, weight, mark, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                sheet_id,
                entry.tag_number,
                entry.cattle_type.as_str(),
                entry.sex.as_str(),
                entry.weight,
                entry.mark,
                to_db_time(Utc::now()),
            ],
        )?;

        let entry_id = tx.last_insert_rowid();

        let weights = {
            let mut stmt = tx.prepare("SELECT weight FROM cattle_entries WHERE sheet_id = ?1")?;
            let weights = stmt
                .query_map(params![sheet_id], |row| row.get::<_, f64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            weights
        };

        let totals = SheetTotals::from_weights(&weights);
        if !totals.is_finite() {
            // Dropping the transaction rolls back the insert
            return Err(StoreError::TotalOutOfRange(sheet_id));
        }
        tx.execute(
            "UPDATE weighing_sheets SET total_weight = ?1, average_weight = ?2 WHERE id = ?3",
            params![totals.total_weight, totals.average_weight, sheet_id],
        )?;

        let created = tx.query_row(
            &format!("SELECT {} FROM cattle_entries WHERE id = ?1", ENTRY_COLUMNS),
            params![entry_id],
            entry_from_row,
        )?;
        let sheet = load_sheet(&tx, sheet_id)?
            .ok_or_else(|| StoreError::Corrupt(format!("sheet {} vanished mid-append", sheet_id)))?;

        tx.commit()?;

        Ok(Some((created, sheet)))
    }

    fn list_sheets(&self, filter: &SheetFilter) -> StoreResult<Vec<SheetSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.created_at, s.total_weight, s.average_weight,
                    se.id, se.name, se.phone,
                    bu.id, bu.name, bu.phone,
                    (SELECT COUNT(*) FROM cattle_entries e WHERE e.sheet_id = s.id)
             FROM weighing_sheets s
             JOIN persons se ON se.id = s.seller_id
             JOIN persons bu ON bu.id = s.buyer_id
             WHERE (s.seller_id = :person OR s.buyer_id = :person)
               AND (:folded IS NULL
                    OR instr(se.name_key, :folded) > 0
                    OR instr(bu.name_key, :folded) > 0
                    OR instr(COALESCE(se.phone, ''), :raw) > 0
                    OR instr(COALESCE(bu.phone, ''), :raw) > 0)
               AND (:from IS NULL OR s.created_at >= :from)
               AND (:to IS NULL OR s.created_at <= :to)
             ORDER BY s.created_at DESC, s.id DESC",
        )?;

        let folded = filter.text.as_ref().map(|t| t.folded.as_str());
        let raw = filter.text.as_ref().map(|t| t.raw.as_str());
        let from = filter.from.map(to_db_time);
        let to = filter.to.map(to_db_time);

        let sheets = stmt
            .query_map(
                named_params! {
                    ":person": filter.person_id,
                    ":folded": folded,
                    ":raw": raw,
                    ":from": from,
                    ":to": to,
                },
                |row| {
                    let created_at: String = row.get(1)?;
                    Ok(SheetSummary {
                        id: row.get(0)?,
                        created_at: parse_db_time(&created_at)?,
                        total_weight: row.get(2)?,
                        average_weight: row.get(3)?,
                        seller: PersonSummary {
                            id: row.get(4)?,
                            name: row.get(5)?,
                            phone: row.get(6)?,
                        },
                        buyer: PersonSummary {
                            id: row.get(7)?,
                            name: row.get(8)?,
                            phone: row.get(9)?,
                        },
                        entry_count: row.get(10)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sheets)
    }
}

/// Account id helper for fixtures that need a creator.
#[cfg(test)]
pub(crate) fn seed_admin(store: &dyn Store) -> crate::model::AccountId {
    store
        .insert_account(&NewAccount {
            email: "admin@test.local".to_string(),
            password_hash: "x".to_string(),
            role: Role::Admin,
            person_id: None,
        })
        .unwrap()
        .id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CattleType, Sex};
    use chrono::TimeZone;

    fn new_person(name: &str, legal_id: Option<&str>) -> NewPerson {
        NewPerson {
            legal_id: legal_id.map(str::to_string),
            name: name.to_string(),
            name_key: make_name_key(name),
            phone: None,
        }
    }

    fn entry(weight: f64) -> NewEntry {
        NewEntry {
            tag_number: "A-1".to_string(),
            cattle_type: CattleType::Cow,
            sex: Sex::Female,
            weight,
            mark: None,
        }
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();
    }

    #[test]
    fn test_name_key_is_unique() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_person(&new_person("Ana Gómez", None)).unwrap();

        let err = store
            .insert_person(&new_person("ANA GÓMEZ", None))
            .unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[test]
    fn test_legal_id_is_unique_but_optional() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_person(&new_person("Ana", None)).unwrap();
        store.insert_person(&new_person("Luis", None)).unwrap();
        store.insert_person(&new_person("Marta", Some("123"))).unwrap();

        let err = store
            .insert_person(&new_person("Pedro", Some("123")))
            .unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[test]
    fn test_append_entry_recomputes_totals() {
        let store = SqliteStore::open_in_memory().unwrap();
        let admin = seed_admin(&store);
        let seller = store.insert_person(&new_person("Ana", None)).unwrap();
        let buyer = store.insert_person(&new_person("Luis", None)).unwrap();
        let sheet = store
            .insert_sheet(&NewSheet {
                seller_id: seller.id,
                buyer_id: buyer.id,
                created_by: admin,
                created_at: Utc::now(),
            })
            .unwrap();

        assert_eq!(sheet.total_weight, None);

        let (_, updated) = store.append_entry(sheet.id, &entry(450.0)).unwrap().unwrap();
        assert_eq!(updated.total_weight, Some(450.0));

        let (_, updated) = store.append_entry(sheet.id, &entry(301.0)).unwrap().unwrap();
        assert_eq!(updated.total_weight, Some(751.0));
        assert_eq!(updated.average_weight, Some(375));

        assert_eq!(store.sheet_entries(sheet.id).unwrap().len(), 2);
    }

    #[test]
    fn test_append_entry_repairs_stale_totals() {
        let store = SqliteStore::open_in_memory().unwrap();
        let admin = seed_admin(&store);
        let seller = store.insert_person(&new_person("Ana", None)).unwrap();
        let sheet = store
            .insert_sheet(&NewSheet {
                seller_id: seller.id,
                buyer_id: seller.id,
                created_by: admin,
                created_at: Utc::now(),
            })
            .unwrap();

        store.append_entry(sheet.id, &entry(100.0)).unwrap();
        store
            .force_totals(
                sheet.id,
                SheetTotals {
                    total_weight: Some(9999.0),
                    average_weight: Some(1),
                },
            )
            .unwrap();

        let (_, updated) = store.append_entry(sheet.id, &entry(200.0)).unwrap().unwrap();
        assert_eq!(updated.total_weight, Some(300.0));
        assert_eq!(updated.average_weight, Some(150));
    }

    #[test]
    fn test_append_entry_rejects_overflowing_total() {
        let store = SqliteStore::open_in_memory().unwrap();
        let admin = seed_admin(&store);
        let seller = store.insert_person(&new_person("Ana", None)).unwrap();
        let sheet = store
            .insert_sheet(&NewSheet {
                seller_id: seller.id,
                buyer_id: seller.id,
                created_by: admin,
                created_at: Utc::now(),
            })
            .unwrap();

        store.append_entry(sheet.id, &entry(1.7e308)).unwrap();
        let err = store.append_entry(sheet.id, &entry(1.7e308)).unwrap_err();
        assert!(matches!(err, StoreError::TotalOutOfRange(id) if id == sheet.id));

        assert_eq!(store.sheet_entries(sheet.id).unwrap().len(), 1);
        let stored = store.find_sheet(sheet.id).unwrap().unwrap();
        assert_eq!(stored.total_weight, Some(1.7e308));
    }

    #[test]
    fn test_append_entry_unknown_sheet() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.append_entry(42, &entry(10.0)).unwrap().is_none());
    }

    #[test]
    fn test_weight_check_constraint() {
        let store = SqliteStore::open_in_memory().unwrap();
        let admin = seed_admin(&store);
        let seller = store.insert_person(&new_person("Ana", None)).unwrap();
        let sheet = store
            .insert_sheet(&NewSheet {
                seller_id: seller.id,
                buyer_id: seller.id,
                created_by: admin,
                created_at: Utc::now(),
            })
            .unwrap();

        assert!(store.append_entry(sheet.id, &entry(0.0)).is_err());
        // The failed append must not leave a partial row behind
        assert!(store.sheet_entries(sheet.id).unwrap().is_empty());
    }

    #[test]
    fn test_db_time_is_sortable() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 1).unwrap();

        assert_eq!(to_db_time(a), "2024-01-01T23:59:00.000Z");
        assert!(to_db_time(a) < to_db_time(b));
        assert_eq!(parse_db_time(&to_db_time(a)).unwrap(), a);
    }

    #[test]
    fn test_text_needle() {
        assert!(TextNeedle::new("   ").is_none());
        let needle = TextNeedle::new("  ANA  Gó ").unwrap();
        assert_eq!(needle.folded, "ana gó");
        assert_eq!(needle.raw, "ANA  Gó");
    }
}
