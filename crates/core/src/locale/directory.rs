//! Reading and writing locale files on disk.

use std::path::Path;

use tracing::{debug, info};

use crate::errors::LocaleFileError;

use super::file::LocaleFile;
use super::format::FileFormat;

/// Load one locale file; the locale name is the file name minus extension.
pub fn load_file(path: &Path, format: FileFormat) -> Result<LocaleFile, LocaleFileError> {
    if !path.is_file() {
        return Err(LocaleFileError::Unreadable {
            path: path.display().to_string(),
        });
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = format!(".{}", format.extension());
    let locale_name = file_name
        .strip_suffix(suffix.as_str())
        .unwrap_or(file_name.as_str())
        .to_string();

    let content = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), locale = %locale_name, "loaded locale file");
    LocaleFile::from_content(locale_name, format, &content)
}

/// Load every `*.<ext>` file directly inside `dir`, sorted by file name.
pub fn load_directory(dir: &Path, format: FileFormat) -> Result<Vec<LocaleFile>, LocaleFileError> {
    if !dir.is_dir() {
        return Err(LocaleFileError::Unreadable {
            path: dir.display().to_string(),
        });
    }

    let pattern = format!("*.{}", format.extension());
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_file() && glob_match::glob_match(&pattern, &name) {
            paths.push(path);
        }
    }
    paths.sort();

    let files = paths
        .iter()
        .map(|path| load_file(path, format))
        .collect::<Result<Vec<_>, _>>()?;
    info!(dir = %dir.display(), count = files.len(), "loaded locale directory");
    Ok(files)
}

/// Write a locale file's canonical content to `path`.
pub fn write_file(path: &Path, file: &LocaleFile) -> Result<(), LocaleFileError> {
    std::fs::write(path, file.content())?;
    debug!(path = %path.display(), locale = %file, "wrote locale file");
    Ok(())
}

/// Write each file as `<dir>/<locale>.<ext>`, creating `dir` if needed.
pub fn write_directory(dir: &Path, files: &[LocaleFile]) -> Result<(), LocaleFileError> {
    std::fs::create_dir_all(dir)?;
    for file in files {
        write_file(&dir.join(file.filename()), file)?;
    }
    let names: Vec<String> = files.iter().map(LocaleFile::filename).collect();
    info!(
        dir = %dir.display(),
        count = files.len(),
        files = ?names,
        "wrote locale files"
    );
    Ok(())
}
