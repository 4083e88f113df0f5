use std::{
    io,
    path::{Path, PathBuf},
};

use sqlxgen_core::filter::NameFilter;
use tracing::debug;

fn is_sql(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("sql"))
}

fn walk(path: &Path, found: &mut Vec<PathBuf>) -> io::Result<()> {
    if path.is_file() {
        if is_sql(path) {
            found.push(path.to_path_buf());
        }
        return Ok(());
    }
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() || file_type.is_file() {
            walk(&entry.path(), found)?;
        }
    }
    Ok(())
}

/// Every `.sql` file below `paths` whose path passes `filter`, sorted.
pub fn query_files(paths: &[PathBuf], filter: &NameFilter) -> io::Result<Vec<PathBuf>> {
    let mut found = vec![];
    for path in paths {
        walk(path, &mut found)?;
    }
    found.retain(|path| {
        let keep = filter.matches(&path.to_string_lossy());
        if !keep {
            debug!("{} is filtered out", path.display());
        }
        keep
    });
    found.sort();
    found.dedup();
    Ok(found)
}
