use crate::Compression;
use crate::error::{ErrorKind, Result};
use crate::naming::{Namer, NamingTemplate};
use exn::ResultExt;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use time::macros::format_description;
use time::{Date, UtcDateTime};
use tracing::instrument;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Anything that may end up as an entry in an archive.
pub trait Packable {
    /// The name the file was uploaded with.
    fn original_name(&self) -> &str;
    /// Extension of the processed output, without the dot.
    fn extension(&self) -> &str;
    /// The processed bytes, or `None` if there's nothing to pack (the file
    /// failed).
    fn contents(&self) -> Option<&[u8]>;
}

/// Bundle every packable result into a zip, in order.
///
/// Entries are named by `naming`; `index` counts only the packed entries so
/// numbering has no gaps where files failed. Duplicate names get a `-2`,
/// `-3`, ... suffix before the extension.
#[instrument(skip_all, fields(total = results.len(), compression = %compression, entries, archive_size))]
pub fn build_archive<P: Packable>(
    results: &[P],
    naming: &NamingTemplate,
    compression: Compression,
    now: UtcDateTime,
) -> Result<Vec<u8>> {
    let namer = Namer::new(naming, now)?;
    let options = SimpleFileOptions::default().compression_method(compression.method());
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut used = HashSet::new();

    let packable = results.iter().filter_map(|r| r.contents().map(|contents| (r, contents)));
    for (index, (result, contents)) in packable.enumerate() {
        let name = namer.name(index, result.original_name(), result.extension(), contents)?;
        let name = deduplicate(name, &mut used);
        tracing::debug!(%name, original = result.original_name(), "Adding archive entry");
        zip.start_file(name.as_str(), options).or_raise(|| ErrorKind::Write)?;
        zip.write_all(contents).or_raise(|| ErrorKind::Write)?;
    }
    if used.is_empty() {
        exn::bail!(ErrorKind::Empty);
    }
    let bytes = zip.finish().or_raise(|| ErrorKind::Write)?.into_inner();
    tracing::Span::current().record("entries", used.len());
    tracing::Span::current().record("archive_size", bytes.len());
    Ok(bytes)
}

fn deduplicate(name: String, used: &mut HashSet<String>) -> String {
    if used.insert(name.clone()) {
        return name;
    }
    // Only look for the extension in the last path segment.
    let file_start = name.rfind('/').map_or(0, |i| i + 1);
    let (stem, ext) = match name[file_start..].rfind('.') {
        Some(dot) if dot > 0 => name.split_at(file_start + dot),
        _ => (name.as_str(), ""),
    };
    let mut counter = 2u32;
    loop {
        let candidate = format!("{stem}-{counter}{ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

/// The download name of a batch archive, e.g.
/// `processed-images-2024-03-09.zip`.
#[must_use]
pub fn archive_file_name(date: Date) -> String {
    let date = date.format(format_description!("[year]-[month]-[day]")).unwrap_or_else(|_| date.to_string());
    format!("processed-images-{date}.zip")
}
