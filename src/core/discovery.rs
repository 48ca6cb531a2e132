use crate::core::paths::{file_name, is_geotiff, is_json};
use crate::domain::ports::FileSystem;
use crate::utils::error::Result;
use regex::Regex;

pub async fn check_file_exists(fs: &dyn FileSystem, path: &str) -> Result<bool> {
    Ok(fs.exists(path).await? && fs.is_file(path).await?)
}

pub async fn check_directory_exists(fs: &dyn FileSystem, path: &str) -> Result<bool> {
    Ok(fs.exists(path).await? && fs.is_dir(path).await?)
}

/// Files under `directory` accepted by `kind` whose file name matches
/// `file_name_pattern` anywhere (not anchored).
pub async fn find_files<F>(
    fs: &dyn FileSystem,
    directory: &str,
    file_name_pattern: &str,
    kind: F,
) -> Result<Vec<String>>
where
    F: Fn(&str) -> bool,
{
    let pattern = Regex::new(file_name_pattern)?;

    let files: Vec<String> = fs
        .walk(directory)
        .await?
        .into_iter()
        .filter(|path| {
            let name = file_name(path);
            kind(name) && pattern.is_match(name)
        })
        .collect();

    tracing::debug!("Found {} matching files under {}", files.len(), directory);
    Ok(files)
}

pub async fn find_geotiff_files(
    fs: &dyn FileSystem,
    directory: &str,
    file_name_pattern: &str,
) -> Result<Vec<String>> {
    find_files(fs, directory, file_name_pattern, is_geotiff).await
}

pub async fn find_json_files(
    fs: &dyn FileSystem,
    directory: &str,
    file_name_pattern: &str,
) -> Result<Vec<String>> {
    find_files(fs, directory, file_name_pattern, is_json).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LocalFileSystem;
    use tempfile::TempDir;

    async fn seed(root: &str) {
        let fs = LocalFileSystem::new();
        for name in [
            "wofs_2023_01.tif",
            "wofs_2023_02.TIFF",
            "2024/wofs_2024_01.tif",
            "2024/wofs_2024_01.tif.aux.xml",
            "stac/wofs_2024_01.json",
            "stac/catalog.json",
            "notes.txt",
        ] {
            fs.write_file(&format!("{}/{}", root, name), b"x").await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_find_geotiff_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_str().unwrap().to_string();
        seed(&root).await;
        let fs = LocalFileSystem::new();

        let all = find_geotiff_files(&fs, &root, ".*").await.unwrap();
        assert_eq!(all.len(), 3);

        let only_2024 = find_geotiff_files(&fs, &root, r"_2024_").await.unwrap();
        assert_eq!(only_2024.len(), 1);
        assert!(only_2024[0].ends_with("wofs_2024_01.tif"));
    }

    #[tokio::test]
    async fn test_find_json_files_and_existence() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_str().unwrap().to_string();
        seed(&root).await;
        let fs = LocalFileSystem::new();

        let items = find_json_files(&fs, &root, "^wofs").await.unwrap();
        assert_eq!(items.len(), 1);

        assert!(check_file_exists(&fs, &format!("{}/notes.txt", root)).await.unwrap());
        assert!(!check_file_exists(&fs, &format!("{}/stac", root)).await.unwrap());
        assert!(check_directory_exists(&fs, &format!("{}/stac", root)).await.unwrap());
        assert!(!check_directory_exists(&fs, &format!("{}/missing", root)).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new();
        assert!(find_json_files(&fs, temp_dir.path().to_str().unwrap(), "(")
            .await
            .is_err());
    }
}
