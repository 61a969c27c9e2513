use crate::error::{Error, Result};
use crate::table::Table;
use csv::{ReaderBuilder, StringRecord};
use encoding_rs::{UTF_8, WINDOWS_1252};
use std::{fs, path::Path};
use tracing::{debug, instrument, warn};

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
const SNIFF_LINES: usize = 10;

/// Read a source file as text: UTF-8 (BOM stripped) first, Windows-1252 otherwise.
pub fn read_source_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::source_read(path, e))?;
    let (text, _, had_errors) = UTF_8.decode(&bytes);
    if !had_errors {
        return Ok(text.into_owned());
    }
    warn!(path = %path.display(), "not valid UTF-8, decoding as Windows-1252");
    let (text, _, _) = WINDOWS_1252.decode(&bytes);
    Ok(text.into_owned())
}

/// Pick the field delimiter from the first non-empty lines that contain any
/// candidate at all.
///
/// A candidate occurring equally often on every sampled line wins over raw
/// frequency, so decimal commas in a `;` file do not outvote the `;`. Falls
/// back to the most frequent candidate, then to `,`.
pub fn sniff_delimiter(sample: &str) -> u8 {
    let lines: Vec<&str> = sample
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter(|l| l.bytes().any(|b| DELIMITER_CANDIDATES.contains(&b)))
        .take(SNIFF_LINES)
        .collect();

    let counts: Vec<(u8, Vec<usize>)> = DELIMITER_CANDIDATES
        .iter()
        .map(|&cand| {
            let per_line = lines
                .iter()
                .map(|l| l.bytes().filter(|&b| b == cand).count())
                .collect();
            (cand, per_line)
        })
        .collect();

    let mut consistent: Option<(u8, usize)> = None;
    let mut frequent = (b',', 0usize);
    for (cand, per_line) in &counts {
        let first = per_line.first().copied().unwrap_or(0);
        if first > 0
            && per_line.iter().all(|&n| n == first)
            && consistent.map_or(true, |(_, best)| first > best)
        {
            consistent = Some((*cand, first));
        }
        let total: usize = per_line.iter().sum();
        if total > frequent.1 {
            frequent = (*cand, total);
        }
    }
    consistent.map_or(frequent.0, |(cand, _)| cand)
}

/// Skip `skip_rows` physical lines, then collect `row_count` rows (or all
/// remaining records when `None`).
///
/// Blank lines count toward `skip_rows`. A fixed `row_count` window is read
/// line by line and returns a blank line as an empty record; an open-ended
/// data block is parsed as CSV and drops blank lines.
///
/// Fails when the source cannot be read, when `skip_rows` runs past the end of
/// the file, or when fewer than `row_count` rows remain.
#[instrument(level = "debug", skip(path), fields(path = %path.display()))]
pub fn read_records(
    path: &Path,
    skip_rows: usize,
    row_count: Option<usize>,
    delimiter: Option<u8>,
) -> Result<Vec<Vec<String>>> {
    let text = read_source_text(path)?;
    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(&text));
    debug!(delimiter = %(delimiter as char), "parsing records");

    let mut offset = 0;
    let mut skipped = 0;
    for line in text.split_inclusive('\n').take(skip_rows) {
        offset += line.len();
        skipped += 1;
    }
    if skipped < skip_rows {
        return Err(Error::source_read(
            path,
            format!("cannot skip {} rows, source has only {}", skip_rows, skipped),
        ));
    }
    let rest = &text[offset..];

    let mut builder = ReaderBuilder::new();
    builder.has_headers(false).flexible(true).delimiter(delimiter);

    let Some(n) = row_count else {
        let mut rdr = builder.from_reader(rest.as_bytes());
        return rdr
            .records()
            .enumerate()
            .map(|(idx, result)| {
                result
                    .map(|record| record.iter().map(str::to_string).collect())
                    .map_err(|e| {
                        Error::source_read(
                            path,
                            format!("CSV parse error at record {}: {}", skip_rows + idx, e),
                        )
                    })
            })
            .collect();
    };

    let mut out: Vec<Vec<String>> = Vec::with_capacity(n);
    for (idx, line) in rest.lines().take(n).enumerate() {
        if line.trim().is_empty() {
            out.push(Vec::new());
            continue;
        }
        let mut record = StringRecord::new();
        builder
            .from_reader(line.as_bytes())
            .read_record(&mut record)
            .map_err(|e| {
                Error::source_read(
                    path,
                    format!("CSV parse error on line {}: {}", skip_rows + idx + 1, e),
                )
            })?;
        out.push(record.iter().map(str::to_string).collect());
    }
    if out.len() < n {
        return Err(Error::source_read(
            path,
            format!(
                "expected {} rows after skipping {}, found {}",
                n,
                skip_rows,
                out.len()
            ),
        ));
    }
    Ok(out)
}

/// Tabular reader: the data block after `skip_rows` becomes a table with
/// positional column names (`x1`, `x2`, …) until a header is applied.
pub fn read_csv(
    path: impl AsRef<Path>,
    skip_rows: usize,
    row_count: Option<usize>,
    delimiter: Option<u8>,
) -> Result<Table> {
    let records = read_records(path.as_ref(), skip_rows, row_count, delimiter)?;
    Ok(Table::from_records(records))
}
