//! Storage layer for the ingestion pipeline.
//!
//! The pipeline consumes persistence through the narrow set of operations
//! below; everything else about the dashboard's schema lives outside this
//! crate. All chapter status changes are guarded so a status can only
//! move forward.

use crate::models::{Book, BookStatus, Chapter, ChapterStatus, Paragraph, Stats, Volume};
use rusqlite::{params, Connection, Result};
use std::collections::HashSet;

pub fn init_db(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    Ok(conn)
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    log::info!("Creating tables if not exists...");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT,
            author TEXT,
            status TEXT NOT NULL DEFAULT 'DRAFT'
                CHECK (status IN ('DRAFT', 'PUBLISHED', 'ARCHIVED')),
            fanqie_book_id TEXT,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s','now')),
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now'))
        );",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS volumes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            idx INTEGER NOT NULL,
            FOREIGN KEY (book_id) REFERENCES books (id),
            UNIQUE(book_id, title)
        );",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS chapters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            volume_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            idx INTEGER NOT NULL,
            fanqie_chapter_id TEXT,
            status TEXT NOT NULL DEFAULT 'EMPTY'
                CHECK (status IN ('EMPTY', 'UNANALYZED', 'ANALYZED')),
            FOREIGN KEY (book_id) REFERENCES books (id),
            FOREIGN KEY (volume_id) REFERENCES volumes (id),
            UNIQUE(book_id, fanqie_chapter_id)
        );",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS paragraphs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chapter_id INTEGER NOT NULL,
            content TEXT NOT NULL,
            ord INTEGER NOT NULL,
            FOREIGN KEY (chapter_id) REFERENCES chapters (id),
            UNIQUE(chapter_id, ord)
        );",
        [],
    )?;

    // Migration for databases created before external ids were tracked
    ensure_column(conn, "books", "fanqie_book_id", "TEXT")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_chapters_book ON chapters(book_id);",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_chapters_status ON chapters(status);",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_paragraphs_chapter ON paragraphs(chapter_id);",
        [],
    )?;

    log::info!("Tables ensured.");
    Ok(())
}

fn ensure_column(conn: &Connection, table: &str, column: &str, column_type: &str) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut exists = false;
    let rows = stmt.query_map([], |row| {
        let name: String = row.get(1)?;
        Ok(name)
    })?;
    for r in rows {
        if r? == column {
            exists = true;
            break;
        }
    }
    if !exists {
        let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_type);
        let _ = conn.execute(&sql, params![]);
    }
    Ok(())
}

fn row_to_book(row: &rusqlite::Row) -> rusqlite::Result<Book> {
    let status: String = row.get(3)?;
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        status: BookStatus::parse(&status).unwrap_or(BookStatus::Draft),
        fanqie_book_id: row.get(4)?,
    })
}

fn row_to_chapter(row: &rusqlite::Row) -> rusqlite::Result<Chapter> {
    let status: String = row.get(6)?;
    Ok(Chapter {
        id: row.get(0)?,
        book_id: row.get(1)?,
        volume_id: row.get(2)?,
        title: row.get(3)?,
        index: row.get(4)?,
        fanqie_chapter_id: row.get(5)?,
        status: ChapterStatus::parse(&status).unwrap_or(ChapterStatus::Empty),
    })
}

pub fn insert_book(
    conn: &Connection,
    title: Option<&str>,
    author: Option<&str>,
    fanqie_book_id: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO books (title, author, fanqie_book_id) VALUES (?1, ?2, ?3)",
        params![title, author, fanqie_book_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_book(conn: &Connection, id: i64) -> Result<Option<Book>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, author, status, fanqie_book_id FROM books WHERE id = ?1",
    )?;
    let mut rows = stmt.query_map(params![id], row_to_book)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn list_books(conn: &Connection) -> Result<Vec<Book>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, author, status, fanqie_book_id FROM books ORDER BY id",
    )?;
    let rows = stmt.query_map([], row_to_book)?;
    let mut books = Vec::new();
    for row in rows {
        books.push(row?);
    }
    Ok(books)
}

pub fn update_book_meta(conn: &Connection, id: i64, title: &str, author: &str) -> Result<()> {
    conn.execute(
        "UPDATE books SET title = ?1, author = ?2, updated_at = strftime('%s','now') WHERE id = ?3",
        params![title, author, id],
    )?;
    Ok(())
}

/// Create-if-absent keyed by (book_id, title). A repeat run that sees the
/// same volume name resolves to the existing row; its title and index are
/// never overwritten.
pub fn upsert_volume(conn: &Connection, book_id: i64, title: &str, index: i64) -> Result<Volume> {
    conn.execute(
        "INSERT INTO volumes (book_id, title, idx) VALUES (?1, ?2, ?3)
         ON CONFLICT(book_id, title) DO NOTHING",
        params![book_id, title, index],
    )?;
    conn.query_row(
        "SELECT id, book_id, title, idx FROM volumes WHERE book_id = ?1 AND title = ?2",
        params![book_id, title],
        |row| {
            Ok(Volume {
                id: row.get(0)?,
                book_id: row.get(1)?,
                title: row.get(2)?,
                index: row.get(3)?,
            })
        },
    )
}

/// External chapter ids already persisted for a book, fetched once per
/// catalog run so per-chapter existence checks stay in memory.
pub fn chapter_external_ids(conn: &Connection, book_id: i64) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT fanqie_chapter_id FROM chapters
         WHERE book_id = ?1 AND fanqie_chapter_id IS NOT NULL",
    )?;
    let rows = stmt.query_map(params![book_id], |row| row.get::<_, String>(0))?;
    let mut ids = HashSet::new();
    for row in rows {
        ids.insert(row?);
    }
    Ok(ids)
}

pub fn insert_chapter(
    conn: &Connection,
    book_id: i64,
    volume_id: i64,
    title: &str,
    index: i64,
    fanqie_chapter_id: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO chapters (book_id, volume_id, title, idx, fanqie_chapter_id, status)
         VALUES (?1, ?2, ?3, ?4, ?5, 'EMPTY')",
        params![book_id, volume_id, title, index, fanqie_chapter_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Chapters whose body has not been fetched yet, oldest first, optionally
/// scoped to one book. Chapters without an external id cannot be fetched
/// and are excluded.
pub fn chapters_needing_content(
    conn: &Connection,
    book_id: Option<i64>,
    limit: usize,
) -> Result<Vec<Chapter>> {
    let sql_base = "SELECT id, book_id, volume_id, title, idx, fanqie_chapter_id, status
         FROM chapters
         WHERE status = 'EMPTY' AND fanqie_chapter_id IS NOT NULL";
    let mut chapters = Vec::new();
    match book_id {
        Some(book_id) => {
            let sql = format!("{} AND book_id = ?1 ORDER BY id LIMIT ?2", sql_base);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![book_id, limit as i64], row_to_chapter)?;
            for row in rows {
                chapters.push(row?);
            }
        }
        None => {
            let sql = format!("{} ORDER BY id LIMIT ?1", sql_base);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![limit as i64], row_to_chapter)?;
            for row in rows {
                chapters.push(row?);
            }
        }
    }
    Ok(chapters)
}

pub fn get_chapter(conn: &Connection, id: i64) -> Result<Option<Chapter>> {
    let mut stmt = conn.prepare(
        "SELECT id, book_id, volume_id, title, idx, fanqie_chapter_id, status
         FROM chapters WHERE id = ?1",
    )?;
    let mut rows = stmt.query_map(params![id], row_to_chapter)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// Persist a chapter's paragraphs and advance it out of EMPTY in one
/// transaction. A refetch replaces the previous batch wholesale, keeping
/// the 1-based ord sequence contiguous. The status update is guarded so
/// it never moves a chapter backward.
pub fn insert_paragraphs_and_mark_unanalyzed(
    conn: &mut Connection,
    chapter_id: i64,
    paragraphs: &[String],
) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM paragraphs WHERE chapter_id = ?1",
        params![chapter_id],
    )?;
    {
        let mut stmt =
            tx.prepare("INSERT INTO paragraphs (chapter_id, content, ord) VALUES (?1, ?2, ?3)")?;
        for (i, content) in paragraphs.iter().enumerate() {
            stmt.execute(params![chapter_id, content, (i as i64) + 1])?;
        }
    }
    tx.execute(
        "UPDATE chapters SET status = 'UNANALYZED' WHERE id = ?1 AND status = 'EMPTY'",
        params![chapter_id],
    )?;
    tx.commit()
}

pub fn get_paragraphs(conn: &Connection, chapter_id: i64) -> Result<Vec<Paragraph>> {
    let mut stmt = conn.prepare(
        "SELECT id, chapter_id, content, ord FROM paragraphs
         WHERE chapter_id = ?1 ORDER BY ord",
    )?;
    let rows = stmt.query_map(params![chapter_id], |row| {
        Ok(Paragraph {
            id: row.get(0)?,
            chapter_id: row.get(1)?,
            content: row.get(2)?,
            order: row.get(3)?,
        })
    })?;
    let mut paragraphs = Vec::new();
    for row in rows {
        paragraphs.push(row?);
    }
    Ok(paragraphs)
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<i64> {
        conn.query_row(sql, [], |row| row.get(0))
    };
    Ok(Stats {
        total_books: count("SELECT COUNT(*) FROM books")?,
        total_chapters: count("SELECT COUNT(*) FROM chapters")?,
        total_paragraphs: count("SELECT COUNT(*) FROM paragraphs")?,
        empty_chapters: count("SELECT COUNT(*) FROM chapters WHERE status = 'EMPTY'")?,
        unanalyzed_chapters: count("SELECT COUNT(*) FROM chapters WHERE status = 'UNANALYZED'")?,
    })
}
