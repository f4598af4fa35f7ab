//! SQL for the address store.
//!
//! The primary relation is created before loading. Secondary indices and the
//! FTS5 mirror are created by the index builder once loading has finished.

/// Connection settings for the single bulk writer.
///
/// `page_size` has to come first: it only applies before the first table
/// exists. Exclusive locking is set before WAL so no shared-memory file is
/// needed. The journal stays on so a killed import keeps every committed
/// batch.
pub const WRITER_PRAGMAS_SQL: &str = r"
PRAGMA page_size = 16384;
PRAGMA locking_mode = EXCLUSIVE;
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = OFF;
PRAGMA temp_store = MEMORY;
PRAGMA cache_size = -262144;
PRAGMA auto_vacuum = NONE;
";

/// Primary relation. The natural key is enforced by the UNIQUE constraint;
/// inserts use `INSERT OR IGNORE` so duplicates are absorbed silently.
pub const CREATE_ADDRESSES_SQL: &str = r"
CREATE TABLE IF NOT EXISTS addresses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    street TEXT NOT NULL,
    house_number TEXT NOT NULL,
    city TEXT NOT NULL,
    longitude REAL NOT NULL,
    latitude REAL NOT NULL,
    UNIQUE(street, house_number, city)
);
";

/// Secondary indices, built after the bulk load.
pub const CREATE_INDEXES_SQL: &[(&str, &str)] = &[
    (
        "idx_city",
        "CREATE INDEX IF NOT EXISTS idx_city ON addresses(city)",
    ),
    (
        "idx_street",
        "CREATE INDEX IF NOT EXISTS idx_street ON addresses(street)",
    ),
    (
        "idx_street_house",
        "CREATE INDEX IF NOT EXISTS idx_street_house ON addresses(street, house_number)",
    ),
];

/// Full-text mirror name.
pub const FTS_TABLE: &str = "address_fts";

/// Rebuilding drops any earlier mirror so the bulk copy never doubles rows.
pub const DROP_FTS_SQL: &str = "DROP TABLE IF EXISTS address_fts";

/// External-content FTS5 table over `addresses`. Diacritics are kept and
/// `-` is a token character, so "Haupt-Straße" stays one token.
pub const CREATE_FTS_SQL: &str = r#"
CREATE VIRTUAL TABLE address_fts USING fts5(
    street,
    house_number,
    city,
    content='addresses',
    content_rowid='id',
    tokenize="unicode61 remove_diacritics 0 tokenchars '-'"
)
"#;

/// One-time bulk copy into the mirror, keyed by the primary row id.
pub const POPULATE_FTS_SQL: &str = r"
INSERT INTO address_fts(rowid, street, house_number, city)
SELECT id, street, house_number, city FROM addresses
";

/// Ranked search joined back to the primary relation.
///
/// Parameters: 1 = MATCH expression, 2/3 = highlight markers, 4 = limit.
pub const SEARCH_SQL: &str = r"
SELECT a.id, a.street, a.house_number, a.city, a.longitude, a.latitude,
       highlight(address_fts, 0, ?2, ?3) AS street_match,
       highlight(address_fts, 1, ?2, ?3) AS house_number_match,
       highlight(address_fts, 2, ?2, ?3) AS city_match,
       address_fts.rank AS rank
FROM address_fts
JOIN addresses a ON address_fts.rowid = a.id
WHERE address_fts MATCH ?1
ORDER BY address_fts.rank
LIMIT ?4
";

/// Column list shared by the exact-match lookups.
pub const SELECT_ADDRESS_COLUMNS: &str =
    "SELECT id, street, house_number, city, longitude, latitude FROM addresses";

/// Multi-row `INSERT OR IGNORE` with `rows` five-column value tuples.
pub fn insert_sql(rows: usize) -> String {
    const HEAD: &str =
        "INSERT OR IGNORE INTO addresses (street, house_number, city, longitude, latitude) VALUES ";
    const TUPLE: &str = "(?, ?, ?, ?, ?)";

    let mut sql = String::with_capacity(HEAD.len() + rows * (TUPLE.len() + 1));
    sql.push_str(HEAD);
    for i in 0..rows {
        if i > 0 {
            sql.push(',');
        }
        sql.push_str(TUPLE);
    }
    sql
}
