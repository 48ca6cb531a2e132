//! Location helpers shared by the local, S3, GCS and HTTP file systems.

use crate::domain::model::PathKind;
use crate::utils::error::{Result, WqError};
use std::path::Path;

pub const DEFAULT_AWS_REGION: &str = "af-south-1";
pub const GCS_PUBLIC_ENDPOINT: &str = "https://storage.googleapis.com/";

const GEOTIFF_EXTENSIONS: &[&str] = &[".tif", ".tiff", ".gtiff"];
const JSON_EXTENSIONS: &[&str] = &[".json"];

fn scheme_of(path: &str) -> Option<&str> {
    path.split_once("://").map(|(scheme, _)| scheme)
}

pub fn classify(path: &str) -> Result<PathKind> {
    let Some(scheme) = scheme_of(path) else {
        return Ok(PathKind::Local);
    };

    match scheme.to_ascii_lowercase().as_str() {
        "file" | "local" => Ok(PathKind::Local),
        "s3" | "s3a" => Ok(PathKind::S3),
        "gs" | "gcs" => Ok(PathKind::Gcs),
        "http" | "https" => Ok(PathKind::Http),
        _ => Err(WqError::UnsupportedPathError {
            path: path.to_string(),
        }),
    }
}

pub fn is_s3_path(path: &str) -> bool {
    matches!(classify(path), Ok(PathKind::S3))
}

pub fn is_gcs_path(path: &str) -> bool {
    matches!(classify(path), Ok(PathKind::Gcs))
}

pub fn is_http_url(path: &str) -> bool {
    matches!(classify(path), Ok(PathKind::Http))
}

pub fn is_local_path(path: &str) -> bool {
    matches!(classify(path), Ok(PathKind::Local))
}

/// Strips a `file://` prefix so the rest can go to `std::path`.
pub fn local_path(path: &str) -> &str {
    path.strip_prefix("file://")
        .or_else(|| path.strip_prefix("local://"))
        .unwrap_or(path)
}

pub fn join_url(base: &str, parts: &[&str]) -> String {
    if is_local_path(base) {
        let mut joined = Path::new(base).to_path_buf();
        for part in parts {
            joined.push(part);
        }
        return joined.to_string_lossy().into_owned();
    }

    let mut joined = base.to_string();
    for part in parts {
        if part.starts_with('/') {
            joined = part.to_string();
        } else if joined.is_empty() || joined.ends_with('/') {
            joined.push_str(part);
        } else {
            joined.push('/');
            joined.push_str(part);
        }
    }
    joined
}

/// Object-store key prefix for everything "inside" `key`.
pub fn dir_prefix(key: &str) -> String {
    if key.is_empty() || key.ends_with('/') {
        key.to_string()
    } else {
        format!("{}/", key)
    }
}

/// File name component of a path or URI, ignoring any query string.
pub fn file_name(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Extension with its leading dot, or an empty string. Dotfiles have none.
pub fn extension(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &name[idx..],
    }
}

pub fn check_file_extension(path: &str, accepted_extensions: &[&str]) -> bool {
    let ext = extension(path).to_ascii_lowercase();
    accepted_extensions.iter().any(|accepted| *accepted == ext)
}

pub fn is_geotiff(path: &str) -> bool {
    check_file_extension(path, GEOTIFF_EXTENSIONS)
}

pub fn is_json(path: &str) -> bool {
    check_file_extension(path, JSON_EXTENSIONS)
}

fn split_bucket_key<'a>(uri: &'a str, schemes: &[&str]) -> Result<(&'a str, &'a str)> {
    let invalid = |reason: &str| WqError::InvalidUriError {
        uri: uri.to_string(),
        reason: reason.to_string(),
    };

    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| invalid("missing scheme"))?;
    if !schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
        return Err(invalid(&format!("expected one of {}", schemes.join(", "))));
    }

    let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(invalid("missing bucket name"));
    }
    Ok((bucket, key))
}

pub fn parse_s3_uri(uri: &str) -> Result<(&str, &str)> {
    split_bucket_key(uri, &["s3", "s3a"])
}

pub fn parse_gcs_uri(uri: &str) -> Result<(&str, &str)> {
    split_bucket_key(uri, &["gs", "gcs"])
}

/// Object URL under a GCS-compatible `endpoint` (`{endpoint}/{bucket}/{key}`).
pub fn gcs_object_url(uri: &str, endpoint: &str) -> Result<String> {
    let (bucket, key) = parse_gcs_uri(uri)?;
    Ok(join_url(endpoint, &[bucket, key.trim_start_matches('/')]))
}

pub fn gsutil_uri_to_public_url(uri: &str) -> Result<String> {
    gcs_object_url(uri, GCS_PUBLIC_ENDPOINT)
}

/// Path-style object URL for an S3-compatible `endpoint`.
pub fn s3_object_url(uri: &str, endpoint: &str) -> Result<String> {
    let (bucket, key) = parse_s3_uri(uri)?;
    Ok(join_url(endpoint, &[bucket, key.trim_start_matches('/')]))
}

pub fn s3_uri_to_public_url(uri: &str, region: &str) -> Result<String> {
    let (bucket, key) = parse_s3_uri(uri)?;
    Ok(format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key))
}

fn archive_prefix(path: &str) -> Option<&'static str> {
    match extension(path) {
        ".zip" => Some("vsizip"),
        ".gz" => Some("vsigzip"),
        ".tar" | ".tgz" => Some("vsitar"),
        ".7z" => Some("vsi7z"),
        ".rar" => Some("vsirar"),
        _ => None,
    }
}

/// GDAL virtual file system path: the network handler first, wrapped by an
/// archive handler when the extension calls for one.
pub fn gdal_vsi_path(path: &str) -> Result<String> {
    let network_path = match classify(path)? {
        PathKind::Local => local_path(path).to_string(),
        PathKind::Http => format!("/vsicurl/{}", path),
        PathKind::S3 => {
            let (bucket, key) = parse_s3_uri(path)?;
            format!("/vsis3/{}/{}", bucket, key)
        }
        PathKind::Gcs => {
            let (bucket, key) = parse_gcs_uri(path)?;
            format!("/vsigs/{}/{}", bucket, key)
        }
    };

    Ok(match archive_prefix(path) {
        Some(prefix) => format!("/{}/{}", prefix, network_path),
        None => network_path,
    })
}
