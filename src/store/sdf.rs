//! Minimal SD file handling: split on `$$$$`, keep the molfile block opaque, read and write data items.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::utils::tempfiles::{Artifact, ArtifactDir};

use super::{ItemStore, RecordSink, RecordStream};

/// Record terminator line.
pub const RECORD_DELIMITER: &str = "$$$$";
const MOLFILE_END: &str = "M  END";

/// One SD record: the molfile block plus its `> <NAME>` data items, in file order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SdfRecord {
    molfile: Vec<String>,
    data: Vec<(String, String)>,
}

fn data_header_name(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('>')?;
    let start = rest.find('<')? + 1;
    let len = rest[start..].find('>')?;
    Some(&rest[start..start + len])
}

impl SdfRecord {
    /// Parse the lines of one record (without the `$$$$` terminator).
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let lines: Vec<&str> = lines.iter().map(|l| l.as_ref()).collect();
        let molfile_len = match lines.iter().position(|l| l.trim_end() == MOLFILE_END) {
            Some(i) => i + 1,
            None => lines
                .iter()
                .position(|l| data_header_name(l).is_some())
                .unwrap_or(lines.len()),
        };
        let molfile = lines[..molfile_len].iter().map(|l| l.to_string()).collect();

        let mut data = Vec::new();
        let mut current: Option<(String, Vec<&str>)> = None;
        for line in &lines[molfile_len..] {
            if let Some(name) = data_header_name(line) {
                if let Some((k, v)) = current.take() {
                    data.push((k, v.join("\n")));
                }
                current = Some((name.to_string(), Vec::new()));
            } else if line.trim().is_empty() {
                if let Some((k, v)) = current.take() {
                    data.push((k, v.join("\n")));
                }
            } else if let Some((_, v)) = current.as_mut() {
                v.push(line);
            }
        }
        if let Some((k, v)) = current {
            data.push((k, v.join("\n")));
        }
        Self { molfile, data }
    }

    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        Self::from_lines(&lines)
    }

    /// First line of the molfile block.
    pub fn title(&self) -> &str {
        self.molfile.first().map(|s| s.trim()).unwrap_or("")
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.data
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.data
    }

    /// Replace an existing data item or append a new one.
    pub fn set_property(&mut self, name: &str, value: &str) {
        match self.data.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.data.push((name.to_string(), value.to_string())),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.data.is_empty() && self.molfile.iter().all(|l| l.trim().is_empty())
    }

    /// The molfile block alone, as handed to the external tool.
    pub fn molfile_block(&self) -> String {
        let mut s = self.molfile.join("\n");
        s.push('\n');
        s
    }

    /// Full SD text including data items and the terminator.
    pub fn to_sdf_string(&self) -> String {
        let mut s = self.molfile_block();
        for (k, v) in &self.data {
            s.push_str(&format!("> <{k}>\n{v}\n\n"));
        }
        s.push_str(RECORD_DELIMITER);
        s.push('\n');
        s
    }
}

/// Lazy record iterator over any buffered reader.
///
/// A record containing invalid UTF-8 is reported as one `Malformed` error and the stream moves on
/// to the next `$$$$`. A read error from the underlying reader ends the stream.
pub struct SdfRecords<R: BufRead> {
    reader: R,
    label: PathBuf,
    line_no: u64,
    done: bool,
}

impl<R: BufRead> SdfRecords<R> {
    pub fn new(reader: R, label: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            label: label.into(),
            line_no: 0,
            done: false,
        }
    }

    /// Next raw line without its `\n` / `\r\n`. False at end of input.
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<bool> {
        buf.clear();
        if self.reader.read_until(b'\n', buf)? == 0 {
            return Ok(false);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        self.line_no += 1;
        Ok(true)
    }

    fn record(&self, lines: &[String], bad_line: Option<u64>) -> Result<SdfRecord, StoreError> {
        match bad_line {
            Some(line) => Err(StoreError::Malformed(format!(
                "{}: line {} is not valid UTF-8",
                self.label.display(),
                line
            ))),
            None => Ok(SdfRecord::from_lines(lines)),
        }
    }
}

impl<R: BufRead> Iterator for SdfRecords<R> {
    type Item = Result<SdfRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut lines: Vec<String> = Vec::new();
        let mut bad_line: Option<u64> = None;
        let mut raw = Vec::new();
        loop {
            match self.read_line(&mut raw) {
                Ok(true) => {
                    if raw.trim_ascii_end() == RECORD_DELIMITER.as_bytes() {
                        return Some(self.record(&lines, bad_line));
                    }
                    if bad_line.is_some() {
                        continue;
                    }
                    match String::from_utf8(std::mem::take(&mut raw)) {
                        Ok(line) => lines.push(line),
                        Err(_) => bad_line = Some(self.line_no),
                    }
                }
                Ok(false) => {
                    self.done = true;
                    // Trailing record without terminator; whitespace after the last `$$$$` is not a record.
                    if bad_line.is_none() && lines.iter().all(|l| l.trim().is_empty()) {
                        return None;
                    }
                    return Some(self.record(&lines, bad_line));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(StoreError::io(&self.label, e)));
                }
            }
        }
    }
}

/// SD file item store. Artifacts are single-record molfiles (`.mol`).
#[derive(Clone, Debug, Default)]
pub struct SdfStore;

impl SdfStore {
    pub fn new() -> Self {
        Self
    }
}

impl ItemStore for SdfStore {
    type Record = SdfRecord;
    type Annotations = Vec<(String, String)>;

    fn count(&self, source: &Path) -> Option<u64> {
        let stream = self.open(source).ok()?;
        Some(stream.count() as u64)
    }

    fn open<'a>(&'a self, source: &Path) -> Result<RecordStream<'a, SdfRecord>, StoreError> {
        let file = File::open(source).map_err(|e| StoreError::io(source, e))?;
        Ok(Box::new(SdfRecords::new(BufReader::new(file), source)))
    }

    fn is_empty(&self, record: &SdfRecord) -> bool {
        record.is_blank()
    }

    fn annotations(&self, record: &SdfRecord) -> Vec<(String, String)> {
        record.properties().to_vec()
    }

    fn materialize(&self, record: &SdfRecord, dir: &ArtifactDir) -> Result<Artifact, StoreError> {
        let artifact = dir.create(".mol").map_err(|e| StoreError::io(dir.path(), e))?;
        if let Err(e) = fs::write(artifact.path(), record.molfile_block()) {
            let err = StoreError::io(artifact.path(), e);
            artifact.discard();
            return Err(err);
        }
        Ok(artifact)
    }

    fn load(&self, artifact: &Path) -> Result<Vec<SdfRecord>, StoreError> {
        let text = fs::read_to_string(artifact).map_err(|e| StoreError::io(artifact, e))?;
        let records = SdfRecords::new(Cursor::new(text), artifact)
            .filter(|r| !matches!(r, Ok(rec) if rec.is_blank()))
            .collect::<Result<Vec<_>, _>>()?;
        if records.is_empty() {
            return Err(StoreError::Malformed(format!(
                "{} holds no records",
                artifact.display()
            )));
        }
        Ok(records)
    }

    fn annotate(&self, record: &mut SdfRecord, annotations: &Vec<(String, String)>) {
        for (k, v) in annotations {
            record.set_property(k, v);
        }
    }
}

/// SD output collection over any writer.
pub struct SdfWriter<W: Write> {
    out: W,
    label: PathBuf,
    written: u64,
}

impl SdfWriter<BufWriter<File>> {
    /// Create (truncate) `path` for writing.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        let file = File::create(path).map_err(|e| StoreError::io(path, e))?;
        Ok(Self::new(BufWriter::new(file), path))
    }
}

impl<W: Write> SdfWriter<W> {
    pub fn new(out: W, label: impl Into<PathBuf>) -> Self {
        Self {
            out,
            label: label.into(),
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send + 'static> RecordSink<SdfRecord> for SdfWriter<W> {
    fn append(&mut self, record: &SdfRecord) -> Result<(), StoreError> {
        self.out
            .write_all(record.to_sdf_string().as_bytes())
            .map_err(|e| StoreError::io(&self.label, e))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), StoreError> {
        self.out.flush().map_err(|e| StoreError::io(&self.label, e))
    }
}
