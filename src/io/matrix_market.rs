//! MatrixMarket reader and writer.
//!
//! Coordinate files (`real`, `integer` or `pattern`; `general` or `symmetric`) become
//! [`CsrMatrix`]; dense `array` files become [`MultiVector`] (column-major). Every rank parses the
//! whole file and keeps the rows it owns. Writers are collective and only rank 0 touches the
//! file system.

use crate::error::KError;
use crate::matrix::{CsrBuilder, CsrMatrix, MultiVector};
use crate::parallel::{Comm, RowPartition};
use std::fmt::Write as _;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MmFormat {
    Coordinate,
    Array,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MmField {
    Real,
    Integer,
    Pattern,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MmSymmetry {
    General,
    Symmetric,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixMarketHeader {
    pub format: MmFormat,
    pub field: MmField,
    pub symmetry: MmSymmetry,
    pub rows: usize,
    pub cols: usize,
    /// Stored entries (coordinate) or `rows * cols` (array).
    pub entries: usize,
}

fn io_err(path: &Path, source: std::io::Error) -> KError {
    KError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn parse_err(path: &Path, line: usize, msg: impl Into<String>) -> KError {
    KError::Parse {
        path: path.to_path_buf(),
        line,
        msg: msg.into(),
    }
}

/// A parsed file: header plus the numbered data lines (1-based line numbers).
struct MmFile<'t> {
    header: MatrixMarketHeader,
    data: Vec<(usize, &'t str)>,
}

/// Parses the banner and the size line; returns the header and the size line's number.
fn parse_header<'t, I>(path: &Path, lines: &mut I) -> Result<(MatrixMarketHeader, usize), KError>
where
    I: Iterator<Item = (usize, &'t str)>,
{
    let (_, banner) = lines.next().ok_or_else(|| parse_err(path, 1, "empty file"))?;
    let words: Vec<String> = banner.split_whitespace().map(str::to_ascii_lowercase).collect();
    if words.len() != 5 || words[0] != "%%matrixmarket" || words[1] != "matrix" {
        return Err(parse_err(path, 1, format!("not a MatrixMarket matrix banner: `{banner}`")));
    }
    let format = match words[2].as_str() {
        "coordinate" => MmFormat::Coordinate,
        "array" => MmFormat::Array,
        other => return Err(parse_err(path, 1, format!("unsupported format `{other}`"))),
    };
    let field = match words[3].as_str() {
        "real" | "double" => MmField::Real,
        "integer" => MmField::Integer,
        "pattern" if format == MmFormat::Coordinate => MmField::Pattern,
        other => return Err(parse_err(path, 1, format!("unsupported field `{other}`"))),
    };
    let symmetry = match words[4].as_str() {
        "general" => MmSymmetry::General,
        "symmetric" => MmSymmetry::Symmetric,
        other => return Err(parse_err(path, 1, format!("unsupported symmetry `{other}`"))),
    };

    let (size_line, size) = lines
        .find(|(_, l)| !l.is_empty() && !l.starts_with('%'))
        .ok_or_else(|| parse_err(path, 1, "missing size line"))?;
    let dims = size
        .split_whitespace()
        .map(|w| w.parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| parse_err(path, size_line, format!("bad size line `{size}`: {e}")))?;
    let (rows, cols, entries) = match (format, dims.as_slice()) {
        (MmFormat::Coordinate, &[r, c, nz]) => (r, c, nz),
        (MmFormat::Array, &[r, c]) => match r.checked_mul(c) {
            Some(n) => (r, c, n),
            None => return Err(parse_err(path, size_line, format!("array size `{size}` overflows"))),
        },
        _ => return Err(parse_err(path, size_line, format!("bad size line `{size}`"))),
    };
    let header = MatrixMarketHeader {
        format,
        field,
        symmetry,
        rows,
        cols,
        entries,
    };
    Ok((header, size_line))
}

fn parse<'t>(path: &Path, text: &'t str) -> Result<MmFile<'t>, KError> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));
    let (header, size_line) = parse_header(path, &mut lines)?;
    let entries = header.entries;
    let data: Vec<_> = lines.filter(|(_, l)| !l.is_empty() && !l.starts_with('%')).collect();
    if data.len() != entries {
        let line = data.last().map_or(size_line, |(l, _)| *l);
        return Err(parse_err(
            path,
            line,
            format!("expected {entries} entries, found {}", data.len()),
        ));
    }
    Ok(MmFile { header, data })
}

fn read_text(path: &Path) -> Result<String, KError> {
    fs::read_to_string(path).map_err(|e| io_err(path, e))
}

/// Reads only the banner and size line; the entries are not checked.
pub fn read_header(path: &Path) -> Result<MatrixMarketHeader, KError> {
    let file = fs::File::open(path).map_err(|e| io_err(path, e))?;
    let mut head: Vec<String> = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| io_err(path, e))?;
        let t = line.trim();
        let is_size = !head.is_empty() && !t.is_empty() && !t.starts_with('%');
        head.push(line);
        if is_size {
            break;
        }
    }
    let mut lines = head.iter().enumerate().map(|(i, l)| (i + 1, l.trim()));
    Ok(parse_header(path, &mut lines)?.0)
}

/// Reads a coordinate matrix, keeping the rows `row_map` assigns to this rank.
///
/// The file's dimensions must equal `row_map.global_len() × domain_map.global_len()`.
/// Duplicate entries are summed; symmetric storage is expanded.
pub fn read_matrix(path: &Path, row_map: RowPartition, domain_map: RowPartition) -> Result<CsrMatrix, KError> {
    let text = read_text(path)?;
    let file = parse(path, &text)?;
    let h = file.header;
    if h.format != MmFormat::Coordinate {
        return Err(parse_err(path, 1, "expected a coordinate matrix"));
    }
    if h.rows != row_map.global_len() || h.cols != domain_map.global_len() {
        return Err(KError::DimensionMismatch(format!(
            "{}: file is {}x{}, maps are {}x{}",
            path.display(),
            h.rows,
            h.cols,
            row_map.global_len(),
            domain_map.global_len()
        )));
    }
    let mut builder = CsrBuilder::new(row_map);
    for &(line, entry) in &file.data {
        let mut it = entry.split_whitespace();
        let mut index = |what: &str, bound: usize| -> Result<usize, KError> {
            let w = it.next().ok_or_else(|| parse_err(path, line, format!("missing {what}")))?;
            let i: usize = w
                .parse()
                .map_err(|e| parse_err(path, line, format!("bad {what} `{w}`: {e}")))?;
            if i == 0 || i > bound {
                return Err(parse_err(path, line, format!("{what} {i} outside 1..={bound}")));
            }
            Ok(i - 1)
        };
        let row = index("row", h.rows)?;
        let col = index("column", h.cols)?;
        let value = match h.field {
            MmField::Pattern => 1.0,
            _ => {
                let w = it.next().ok_or_else(|| parse_err(path, line, "missing value"))?;
                w.parse::<f64>()
                    .map_err(|e| parse_err(path, line, format!("bad value `{w}`: {e}")))?
            }
        };
        builder.insert_if_owned(row, col, value);
        if h.symmetry == MmSymmetry::Symmetric && row != col {
            builder.insert_if_owned(col, row, value);
        }
    }
    builder.fill_complete(domain_map)
}

/// Reads a dense `array` file (column-major) with one row per entry of `map`.
pub fn read_multivector(path: &Path, map: RowPartition) -> Result<MultiVector, KError> {
    let text = read_text(path)?;
    let file = parse(path, &text)?;
    let h = file.header;
    if h.format != MmFormat::Array {
        return Err(parse_err(path, 1, "expected an array file"));
    }
    if h.rows != map.global_len() {
        return Err(KError::DimensionMismatch(format!(
            "{}: file has {} rows, map has {}",
            path.display(),
            h.rows,
            map.global_len()
        )));
    }
    let range = map.local_range();
    let mut columns = vec![Vec::with_capacity(range.len()); h.cols];
    for (k, &(line, entry)) in file.data.iter().enumerate() {
        let (col, row) = (k / h.rows, k % h.rows);
        if !range.contains(&row) {
            continue;
        }
        let v = entry
            .parse::<f64>()
            .map_err(|e| parse_err(path, line, format!("bad value `{entry}`: {e}")))?;
        columns[col].push(v);
    }
    MultiVector::from_columns(map, columns)
}

/// Writes `a` as a 1-based `coordinate real general` file. Collective; rank 0 writes.
pub fn write_matrix(path: &Path, a: &CsrMatrix) -> Result<(), KError> {
    let full = a.replicate();
    let comm = a.row_partition().comm().clone();
    if comm.rank() == 0 {
        let mut out = String::new();
        out.push_str("%%MatrixMarket matrix coordinate real general\n");
        let _ = writeln!(out, "{} {} {}", full.global_nrows(), full.global_ncols(), full.nnz());
        for i in 0..full.local_nrows() {
            let (cols, vals) = full.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                let _ = writeln!(out, "{} {} {:.17e}", i + 1, j + 1, v);
            }
        }
        return agree_on_write(&*comm, path, fs::write(path, out));
    }
    agree_on_write(&*comm, path, Ok(()))
}

/// Writes `mv` as a column-major `array real general` file. Collective; rank 0 writes.
pub fn write_multivector(path: &Path, mv: &MultiVector) -> Result<(), KError> {
    let columns = mv.gather_columns();
    let comm = mv.map().comm().clone();
    if comm.rank() == 0 {
        let mut out = String::new();
        out.push_str("%%MatrixMarket matrix array real general\n");
        let _ = writeln!(out, "{} {}", mv.map().global_len(), columns.len());
        for v in columns.iter().flatten() {
            let _ = writeln!(out, "{v:.17e}");
        }
        return agree_on_write(&*comm, path, fs::write(path, out));
    }
    agree_on_write(&*comm, path, Ok(()))
}

/// Shares rank 0's write outcome so that every rank returns the same result. Collective.
fn agree_on_write(comm: &dyn Comm, path: &Path, written: std::io::Result<()>) -> Result<(), KError> {
    let ok = comm.all_reduce_min(if written.is_ok() { 1.0 } else { 0.0 });
    match written {
        Err(e) => Err(io_err(path, e)),
        Ok(()) if ok < 1.0 => Err(io_err(path, std::io::Error::other("rank 0 could not write the file"))),
        Ok(()) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(text: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(text.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn symmetric_storage_is_expanded() {
        let f = file_with(
            "%%MatrixMarket matrix coordinate real symmetric\n% lower triangle\n\n3 3 4\n1 1 2.0\n2 1 -1\n2 2 2.0\n3 3 5e-1\n",
        );
        let p = RowPartition::serial(3);
        let a = read_matrix(f.path(), p.clone(), p).unwrap();
        assert_eq!(a.nnz(), 5);
        assert_eq!(a.get(0, 1), Some(-1.0));
        assert_eq!(a.get(1, 0), Some(-1.0));
        assert_eq!(a.get(2, 2), Some(0.5));
    }

    #[test]
    fn pattern_entries_are_one() {
        let f = file_with("%%MatrixMarket matrix coordinate pattern general\n2 3 2\n1 3\n2 1\n");
        let a = read_matrix(f.path(), RowPartition::serial(2), RowPartition::serial(3)).unwrap();
        assert_eq!(a.get(0, 2), Some(1.0));
        assert_eq!(a.get(1, 0), Some(1.0));
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let f = file_with("%%MatrixMarket matrix coordinate real general\n2 2 1\n1 1 1.0\n");
        let p = RowPartition::serial(3);
        assert!(matches!(read_matrix(f.path(), p.clone(), p), Err(KError::DimensionMismatch(_))));
    }

    #[test]
    fn parse_errors_carry_line_numbers() {
        let f = file_with("%%MatrixMarket matrix coordinate real general\n2 2 2\n1 1 1.0\n3 1 1.0\n");
        let p = RowPartition::serial(2);
        match read_matrix(f.path(), p.clone(), p) {
            Err(KError::Parse { line, .. }) => assert_eq!(line, 4),
            other => panic!("expected parse error, got {other:?}"),
        }
        let short = file_with("%%MatrixMarket matrix coordinate real general\n2 2 3\n1 1 1.0\n");
        assert_eq!(read_header(short.path()).unwrap().entries, 3);
        let p = RowPartition::serial(2);
        assert!(matches!(read_matrix(short.path(), p.clone(), p), Err(KError::Parse { .. })));
        let banner = file_with("%%MatrixMarket vector coordinate real general\n");
        assert!(matches!(read_header(banner.path()), Err(KError::Parse { line: 1, .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_header(&dir.path().join("nope.txt")), Err(KError::Io { .. })));
    }

    #[test]
    fn array_is_column_major() {
        let f = file_with("%%MatrixMarket matrix array real general\n% coords\n2 3\n0\n1\n2\n3\n4\n5\n");
        let mv = read_multivector(f.path(), RowPartition::serial(2)).unwrap();
        assert_eq!(mv.num_vectors(), 3);
        assert_eq!(mv.column(1), &[2.0, 3.0]);
    }

    #[test]
    fn overflowing_array_size_is_a_parse_error() {
        let f = file_with(&format!("%%MatrixMarket matrix array real general\n{} 2\n", usize::MAX));
        assert!(matches!(read_header(f.path()), Err(KError::Parse { line: 2, .. })));
    }

    #[test]
    fn failed_write_is_reported_on_every_rank() {
        use crate::parallel::ThreadComm;
        use std::sync::Arc;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("a.txt");
        let handles: Vec<_> = ThreadComm::group(2)
            .into_iter()
            .map(|comm| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let comm: Arc<dyn Comm> = Arc::new(comm);
                    let map = RowPartition::uniform(4, comm);
                    let a = CsrMatrix::identity(map.clone());
                    let mv = MultiVector::zeros(map, 2);
                    (write_matrix(&path, &a).is_err(), write_multivector(&path, &mv).is_err())
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), (true, true));
        }
    }

    #[test]
    fn written_matrix_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let p = RowPartition::serial(2);
        let a = CsrMatrix::from_triplets(p.clone(), p.clone(), &[(0, 0, 1.0 / 3.0), (1, 0, -2.5), (1, 1, 7.0)]).unwrap();
        write_matrix(&path, &a).unwrap();
        assert_eq!(read_header(&path).unwrap().entries, 3);
        assert_eq!(read_matrix(&path, p.clone(), p).unwrap(), a);
    }
}
