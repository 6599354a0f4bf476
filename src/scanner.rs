use crate::error::{PasteError, Result};
use crate::reader::SourceFormat;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct InputFile {
    pub path: PathBuf,
    pub file_name: String,
    pub format: SourceFormat,
}

/// 対応形式のファイルを列挙（ファイル名順）
pub fn scan_folder(folder: &Path, recursive: bool) -> Result<Vec<InputFile>> {
    if !folder.is_dir() {
        return Err(PasteError::FolderNotFound(folder.display().to_string()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        // 隠しファイル（キャッシュ等）は対象外
        let file_name = entry.file_name().to_string_lossy().to_string();
        if file_name.starts_with('.') {
            continue;
        }

        if let Some(format) = SourceFormat::from_path(path) {
            files.push(InputFile {
                path: path.to_path_buf(),
                file_name,
                format,
            });
        }
    }

    // ファイル名でソート
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name).then_with(|| a.path.cmp(&b.path)));

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_scan_folder_not_found() {
        let result = scan_folder(Path::new("/nonexistent/folder"), false);
        assert!(matches!(result, Err(PasteError::FolderNotFound(_))));
    }

    #[test]
    fn test_scan_folder_empty() {
        let dir = tempdir().unwrap();
        assert!(scan_folder(dir.path(), false).unwrap().is_empty());
    }

    #[test]
    fn test_scan_folder_filters_formats() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("camera.txt"), "Brand: Canon").unwrap();
        fs::write(dir.path().join("lens.PDF"), "dummy").unwrap();
        fs::write(dir.path().join("sheet.xlsx"), "dummy").unwrap();
        fs::write(dir.path().join("photo.jpg"), "dummy").unwrap();
        fs::write(dir.path().join(".smart-paste-cache.json"), "{}").unwrap();

        let files = scan_folder(dir.path(), false).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["camera.txt", "lens.PDF", "sheet.xlsx"]);
        assert_eq!(files[1].format, SourceFormat::Pdf);
    }

    #[test]
    fn test_scan_recursive() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("lights");
        fs::create_dir_all(&sub).unwrap();
        fs::write(dir.path().join("b.txt"), "x").unwrap();
        fs::write(sub.join("a.md"), "x").unwrap();

        assert_eq!(scan_folder(dir.path(), false).unwrap().len(), 1);

        let files = scan_folder(dir.path(), true).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].file_name, "a.md");
        assert_eq!(files[1].file_name, "b.txt");
    }
}
