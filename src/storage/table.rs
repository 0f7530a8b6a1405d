//! Line table: the scan discipline shared by both stores
//!
//! Every call re-derives state from the file:
//! - reads decode each line and match on the parsed `id`
//! - `add` appends one line with id = (id of last line) + 1
//! - modify / remove rewrite the whole file, keeping untouched lines
//!   byte for byte
//!
//! A line that fails to decode aborts the operation as corruption.
//! Blank lines are not records and are skipped.

use std::marker::PhantomData;

use super::condition::{Condition, Listing, Lookup};
use super::errors::{StoreError, StoreResult};
use super::file::DbFile;
use super::record::{Format, StoredRecord};
use crate::observability::{log_event_with_fields, Event};
use crate::serialization;

/// One decoded line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<R> {
    /// 1-based line number in the file
    pub line_no: usize,
    /// Stored text, without terminator
    pub line: String,
    pub record: R,
}

/// Typed view over a backing file holding records of one shape.
#[derive(Debug, Clone)]
pub struct LineTable<R> {
    file: DbFile,
    _record: PhantomData<fn() -> R>,
}

impl<R: StoredRecord> LineTable<R> {
    pub fn new(file: DbFile) -> Self {
        Self {
            file,
            _record: PhantomData,
        }
    }

    pub fn file(&self) -> &DbFile {
        &self.file
    }

    /// Reports a missing or empty file (size <= 1 byte).
    pub fn precheck(&self) -> StoreResult<Option<Condition>> {
        if !self.file.exists() {
            return Ok(Some(Condition::Missing(self.file.path().to_path_buf())));
        }
        if self.file.len()? <= 1 {
            return Ok(Some(Condition::Empty(self.file.path().to_path_buf())));
        }
        Ok(None)
    }

    fn decode(&self, line_no: usize, line: &str) -> StoreResult<R> {
        serialization::decode(line).map_err(|e| {
            let path = self.file.path().display().to_string();
            log_event_with_fields(
                Event::CorruptionDetected,
                &[
                    ("path", path.as_str()),
                    ("line", line_no.to_string().as_str()),
                    ("schema", R::SCHEMA.as_str()),
                ],
            );
            StoreError::corruption_at_line(self.file.path(), line_no, e)
        })
    }

    /// Decodes every record line in file order.
    pub fn scan(&self) -> StoreResult<Vec<Row<R>>> {
        let lines = self.file.read_lines()?;
        let mut rows = Vec::with_capacity(lines.len());
        for (idx, line) in lines.into_iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = self.decode(idx + 1, &line)?;
            rows.push(Row {
                line_no: idx + 1,
                line,
                record,
            });
        }
        Ok(rows)
    }

    /// Id of the last record, or 0 for a missing or empty file.
    pub fn last_id(&self) -> StoreResult<u64> {
        if self.precheck()?.is_some() {
            return Ok(0);
        }
        let lines = self.file.read_lines()?;
        let last = lines
            .iter()
            .enumerate()
            .rev()
            .find(|(_, line)| !line.trim().is_empty());
        match last {
            Some((idx, line)) => Ok(self.decode(idx + 1, line)?.id()),
            None => Ok(0),
        }
    }

    /// Number of line breaks in the file.
    ///
    /// A file with more than 2 bytes but no line break counts as one line.
    pub fn count_size(&self) -> StoreResult<usize> {
        if !self.file.exists() {
            return Ok(0);
        }
        let breaks = self.file.count_line_breaks()?;
        if breaks == 0 && self.file.len()? > 2 {
            return Ok(1);
        }
        Ok(breaks)
    }

    /// Appends a new record built from the next free id.
    ///
    /// Returns `None` if the file could not be created. Fails with
    /// `TG_STORE_ID_EXHAUSTED` when the last id is `u64::MAX`.
    pub fn append_with(&self, build: impl FnOnce(u64) -> R) -> StoreResult<Option<R>> {
        if !self.file.ensure_exists() {
            return Ok(None);
        }

        let _lock = self.file.lock()?;
        let last_id = self.last_id()?;
        let id = last_id
            .checked_add(1)
            .ok_or_else(|| StoreError::id_exhausted(self.file.path(), last_id))?;
        let record = build(id);
        let line = serialization::encode(&record).map_err(StoreError::encode_failed)?;
        self.file.append_line(&line)?;

        let path = self.file.path().display().to_string();
        log_event_with_fields(
            Event::RecordAppended,
            &[
                ("id", id.to_string().as_str()),
                ("path", path.as_str()),
                ("schema", R::SCHEMA.as_str()),
            ],
        );
        Ok(Some(record))
    }

    /// Finds the record with `id`. The last matching line wins.
    pub fn find(&self, id: u64) -> StoreResult<Lookup<Row<R>>> {
        if let Some(condition) = self.precheck()? {
            return Ok(Lookup::Absent(condition));
        }
        let found = self.scan()?.into_iter().filter(|r| r.record.id() == id).last();
        Ok(match found {
            Some(row) => Lookup::Found(row),
            None => Lookup::Absent(Condition::RecordNotFound(id)),
        })
    }

    fn rows_or_condition(&self) -> StoreResult<Result<Vec<Row<R>>, Condition>> {
        if let Some(condition) = self.precheck()? {
            return Ok(Err(condition));
        }
        Ok(Ok(self.scan()?))
    }

    fn empty_condition(&self) -> Condition {
        Condition::Empty(self.file.path().to_path_buf())
    }

    /// First record in the file.
    pub fn first(&self) -> StoreResult<Lookup<Row<R>>> {
        Ok(match self.rows_or_condition()? {
            Err(condition) => Lookup::Absent(condition),
            Ok(rows) => match rows.into_iter().next() {
                Some(row) => Lookup::Found(row),
                None => Lookup::Absent(self.empty_condition()),
            },
        })
    }

    /// Last record in the file.
    pub fn last(&self) -> StoreResult<Lookup<Row<R>>> {
        Ok(match self.rows_or_condition()? {
            Err(condition) => Lookup::Absent(condition),
            Ok(rows) => match rows.into_iter().last() {
                Some(row) => Lookup::Found(row),
                None => Lookup::Absent(self.empty_condition()),
            },
        })
    }

    /// Up to `n` records from the start of the file.
    pub fn first_n(&self, n: usize) -> StoreResult<Lookup<Vec<R>>> {
        Ok(match self.rows_or_condition()? {
            Err(condition) => Lookup::Absent(condition),
            Ok(rows) => Lookup::Found(rows.into_iter().take(n).map(|r| r.record).collect()),
        })
    }

    /// The last `max(n, 1)` records, clamped to what is available.
    pub fn last_n(&self, n: usize) -> StoreResult<Lookup<Vec<R>>> {
        Ok(match self.rows_or_condition()? {
            Err(condition) => Lookup::Absent(condition),
            Ok(rows) => {
                let take = n.max(1).min(rows.len());
                let skip = rows.len() - take;
                Lookup::Found(rows.into_iter().skip(skip).map(|r| r.record).collect())
            }
        })
    }

    /// Records whose case-folded line contains every keyword of `query`.
    pub fn search(&self, query: &str) -> StoreResult<Lookup<Vec<R>>> {
        let keywords = keywords(query);
        Ok(match self.rows_or_condition()? {
            Err(condition) => Lookup::Absent(condition),
            Ok(rows) => Lookup::Found(
                rows.into_iter()
                    .filter(|r| matches_all(&r.line.to_lowercase(), &keywords))
                    .map(|r| r.record)
                    .collect(),
            ),
        })
    }

    /// Replaces every line whose record has `id` with `record`.
    pub fn replace(&self, id: u64, record: R) -> StoreResult<Lookup<Row<R>>> {
        if let Some(condition) = self.precheck()? {
            return Ok(Lookup::Absent(condition));
        }

        let _lock = self.file.lock()?;
        let rows = match self.rows_or_condition()? {
            Err(condition) => return Ok(Lookup::Absent(condition)),
            Ok(rows) => rows,
        };
        let Some(line_no) = rows.iter().filter(|r| r.record.id() == id).map(|r| r.line_no).last()
        else {
            return Ok(Lookup::Absent(Condition::RecordNotFound(id)));
        };

        let new_line = serialization::encode(&record).map_err(StoreError::encode_failed)?;
        self.file.rewrite(rows.iter().map(|r| {
            if r.record.id() == id {
                new_line.as_str()
            } else {
                r.line.as_str()
            }
        }))?;

        let path = self.file.path().display().to_string();
        log_event_with_fields(
            Event::RecordModified,
            &[
                ("id", id.to_string().as_str()),
                ("path", path.as_str()),
                ("schema", R::SCHEMA.as_str()),
            ],
        );
        Ok(Lookup::Found(Row {
            line_no,
            line: new_line,
            record,
        }))
    }

    /// Rewrites the file without the record `id`; returns the removed row.
    pub fn remove(&self, id: u64) -> StoreResult<Lookup<Row<R>>> {
        if let Some(condition) = self.precheck()? {
            return Ok(Lookup::Absent(condition));
        }

        let _lock = self.file.lock()?;
        let rows = match self.rows_or_condition()? {
            Err(condition) => return Ok(Lookup::Absent(condition)),
            Ok(rows) => rows,
        };
        let Some(removed) = rows.iter().filter(|r| r.record.id() == id).last().cloned() else {
            return Ok(Lookup::Absent(Condition::RecordNotFound(id)));
        };

        self.file.rewrite(
            rows.iter()
                .filter(|r| r.record.id() != id)
                .map(|r| r.line.as_str()),
        )?;

        let path = self.file.path().display().to_string();
        log_event_with_fields(
            Event::RecordRemoved,
            &[
                ("id", id.to_string().as_str()),
                ("path", path.as_str()),
                ("schema", R::SCHEMA.as_str()),
            ],
        );
        Ok(Lookup::Found(removed))
    }
}

/// Splits a query into lower-cased keywords on commas and spaces.
pub fn keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c| c == ',' || c == ' ')
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

fn matches_all(haystack: &str, keywords: &[String]) -> bool {
    keywords.iter().all(|k| haystack.contains(k.as_str()))
}

/// Renders a lookup for a selector name.
///
/// Absent lookups render as their condition message; an unknown selector
/// renders as the schema's invalid-format message.
pub fn render<R: StoredRecord>(lookup: Lookup<Row<R>>, format: &str) -> StoreResult<String> {
    let row = match lookup {
        Lookup::Found(row) => row,
        Lookup::Absent(condition) => return Ok(condition.to_string()),
    };
    let rendered = match Format::parse(format) {
        Some(f) => row
            .record
            .render(f, &row.line)
            .map_err(StoreError::encode_failed)?,
        None => None,
    };
    Ok(rendered.unwrap_or_else(|| Condition::InvalidFormat(R::SCHEMA).to_string()))
}

/// Builds a listing: a compact JSON array, or the condition message.
pub fn listing<R: StoredRecord>(lookup: Lookup<Vec<R>>, format: &str) -> StoreResult<Listing> {
    let body = match lookup {
        Lookup::Found(records) => {
            serialization::encode(&records).map_err(StoreError::encode_failed)?
        }
        Lookup::Absent(condition) => condition.to_string(),
    };
    Ok(Listing {
        format: format.to_string(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Record, StoreOptions};
    use std::fs;
    use tempfile::TempDir;

    fn table(dir: &TempDir) -> LineTable<Record> {
        LineTable::new(DbFile::new(dir.path().join("t.db"), StoreOptions::default()))
    }

    fn fill(t: &LineTable<Record>, n: u64) {
        for i in 1..=n {
            t.append_with(|id| Record::new(id, format!("k{}", i), format!("v{}", i)))
                .unwrap();
        }
    }

    #[test]
    fn test_keywords_split_on_commas_and_spaces() {
        assert_eq!(keywords("London, Blue"), vec!["london", "blue"]);
        assert_eq!(keywords("a,,b  c"), vec!["a", "b", "c"]);
        assert!(keywords("").is_empty());
    }

    #[test]
    fn test_matches_all_is_conjunctive() {
        let kw = keywords("foo bar");
        assert!(matches_all("xxfooyybarzz", &kw));
        assert!(!matches_all("xxfooyy", &kw));
        assert!(matches_all("anything", &[]));
    }

    #[test]
    fn test_ids_start_at_one_and_grow() {
        let dir = TempDir::new().unwrap();
        let t = table(&dir);
        assert_eq!(t.last_id().unwrap(), 0);
        fill(&t, 3);
        let ids: Vec<u64> = t.scan().unwrap().iter().map(|r| r.record.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(t.last_id().unwrap(), 3);
    }

    #[test]
    fn test_find_last_duplicate_wins() {
        let dir = TempDir::new().unwrap();
        let t = table(&dir);
        fs::write(
            t.file().path(),
            "{\"id\":1,\"key\":\"a\",\"data\":\"old\"}\n{\"id\":1,\"key\":\"a\",\"data\":\"new\"}\n",
        )
        .unwrap();
        let row = t.find(1).unwrap().found().unwrap();
        assert_eq!(row.record.data, "new");
        assert_eq!(row.line_no, 2);
    }

    #[test]
    fn test_find_matches_parsed_id_not_substring() {
        let dir = TempDir::new().unwrap();
        let t = table(&dir);
        // Record 2 carries text that looks like record 1's id marker
        fs::write(
            t.file().path(),
            "{\"id\":2,\"key\":\"\\\"id\\\":1,\",\"data\":\"x\"}\n",
        )
        .unwrap();
        assert_eq!(
            t.find(1).unwrap(),
            Lookup::Absent(Condition::RecordNotFound(1))
        );
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let t = table(&dir);
        fs::write(
            t.file().path(),
            "{\"id\":1,\"key\":\"a\",\"data\":\"x\"}\n\n{\"id\":2,\"key\":\"b\",\"data\":\"y\"}\n\n",
        )
        .unwrap();
        assert_eq!(t.scan().unwrap().len(), 2);
        assert_eq!(t.last_id().unwrap(), 2);
    }

    #[test]
    fn test_corrupt_line_aborts_scan() {
        let dir = TempDir::new().unwrap();
        let t = table(&dir);
        fill(&t, 1);
        fs::write(
            t.file().path(),
            format!("{}\n{{broken\n", fs::read_to_string(t.file().path()).unwrap().trim_end()),
        )
        .unwrap();
        let err = t.scan().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.details(), Some("line: 2"));
    }

    #[test]
    fn test_count_size_unterminated_single_line() {
        let dir = TempDir::new().unwrap();
        let t = table(&dir);
        assert_eq!(t.count_size().unwrap(), 0);
        fs::write(t.file().path(), "{\"id\":1,\"key\":\"a\",\"data\":\"x\"}").unwrap();
        assert_eq!(t.count_size().unwrap(), 1);
        fs::write(t.file().path(), "ab").unwrap();
        assert_eq!(t.count_size().unwrap(), 0);
    }

    #[test]
    fn test_last_n_clamps() {
        let dir = TempDir::new().unwrap();
        let t = table(&dir);
        fill(&t, 4);
        let ids = |n| -> Vec<u64> {
            t.last_n(n).unwrap().found().unwrap().iter().map(|r| r.id).collect()
        };
        assert_eq!(ids(0), vec![4]);
        assert_eq!(ids(1), vec![4]);
        assert_eq!(ids(2), vec![3, 4]);
        assert_eq!(ids(10), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_first_n_clamps() {
        let dir = TempDir::new().unwrap();
        let t = table(&dir);
        fill(&t, 3);
        assert!(t.first_n(0).unwrap().found().unwrap().is_empty());
        assert_eq!(t.first_n(2).unwrap().found().unwrap().len(), 2);
        assert_eq!(t.first_n(9).unwrap().found().unwrap().len(), 3);
    }

    #[test]
    fn test_replace_keeps_other_lines_verbatim() {
        let dir = TempDir::new().unwrap();
        let t = table(&dir);
        // Hand-written line with extra whitespace must survive a rewrite
        fs::write(
            t.file().path(),
            "{\"id\": 1, \"key\": \"a\", \"data\": \"x\"}\n{\"id\":2,\"key\":\"b\",\"data\":\"y\"}\n",
        )
        .unwrap();
        t.replace(2, Record::new(2, "b", "z")).unwrap();
        let text = fs::read_to_string(t.file().path()).unwrap();
        assert!(text.starts_with("{\"id\": 1, \"key\": \"a\", \"data\": \"x\"}\n"));
        assert!(text.ends_with("{\"id\":2,\"key\":\"b\",\"data\":\"z\"}\n"));
    }

    #[test]
    fn test_render_invalid_format() {
        let dir = TempDir::new().unwrap();
        let t = table(&dir);
        fill(&t, 1);
        let out = render(t.find(1).unwrap(), "xml").unwrap();
        assert_eq!(out, "Invalid format provided!");
        let out = render(t.find(1).unwrap(), "fields").unwrap();
        assert_eq!(out, "Invalid format provided!");
    }

    #[test]
    fn test_listing_of_absent_is_message() {
        let dir = TempDir::new().unwrap();
        let t = table(&dir);
        let l = listing(t.search("x").unwrap(), "json").unwrap();
        assert_eq!(l.format, "json");
        assert!(l.body.ends_with("missing!"));
    }
}
