//! Content type classification by file extension
//!
//! Classification never fails and never touches the network: a compiled-in
//! table covers the common types, the host's `mime.types` registry covers the
//! long tail, and everything else is `application/octet-stream`.

use std::collections::HashMap;
use std::sync::LazyLock;

use ::mime::Mime;

/// Registry files consulted in order; the first readable one wins
const REGISTRY_PATHS: &[&str] = &[
    "/etc/mime.types",
    "/etc/apache2/mime.types",
    "/etc/httpd/conf/mime.types",
    "/usr/local/etc/mime.types",
];

static PLATFORM_REGISTRY: LazyLock<MimeRegistry> = LazyLock::new(MimeRegistry::load_platform);

/// Classify a file name (or full key) by its last extension
pub fn classify(file_name: &str) -> Mime {
    classify_with(file_name, &PLATFORM_REGISTRY)
}

/// Classify against an explicit registry
pub fn classify_with(file_name: &str, registry: &MimeRegistry) -> Mime {
    let Some(ext) = extension(file_name) else {
        return ::mime::APPLICATION_OCTET_STREAM;
    };

    builtin(&ext)
        .or_else(|| registry.lookup(&ext).cloned())
        .unwrap_or(::mime::APPLICATION_OCTET_STREAM)
}

/// Lower-cased extension of the last path segment, without the dot
fn extension(file_name: &str) -> Option<String> {
    let leaf = file_name.rsplit('/').next().unwrap_or(file_name);
    let (_, ext) = leaf.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn builtin(ext: &str) -> Option<Mime> {
    let essence = match ext {
        // Images
        "jpg" | "jpeg" | "jpe" => return Some(::mime::IMAGE_JPEG),
        "png" => return Some(::mime::IMAGE_PNG),
        "gif" => return Some(::mime::IMAGE_GIF),
        "bmp" => return Some(::mime::IMAGE_BMP),
        "webp" => "image/webp",
        "svg" => return Some(::mime::IMAGE_SVG),
        "heic" => "image/heic",
        "ico" => "image/x-icon",
        "tif" | "tiff" => "image/tiff",

        // Video
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",

        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        "m4a" => "audio/mp4",

        // Documents and archives
        "pdf" => return Some(::mime::APPLICATION_PDF),
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" | "tgz" => "application/gzip",
        "bz2" => "application/x-bzip2",
        "xz" => "application/x-xz",
        "zst" => "application/zstd",
        "7z" => "application/x-7z-compressed",
        "rar" => "application/vnd.rar",

        // Office
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "csv" => return Some(::mime::TEXT_CSV),
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",

        // Text and markup
        "txt" | "log" => return Some(::mime::TEXT_PLAIN),
        "md" => "text/markdown",
        "html" | "htm" => return Some(::mime::TEXT_HTML),
        "css" => return Some(::mime::TEXT_CSS),
        "json" => return Some(::mime::APPLICATION_JSON),
        "yaml" | "yml" => "application/x-yaml",
        "toml" => "application/toml",
        "xml" => "application/xml",

        // Code (best effort)
        "js" | "mjs" => return Some(::mime::APPLICATION_JAVASCRIPT),
        "ts" => "text/typescript",
        "go" => "text/x-go",
        "rs" => "text/x-rust",
        "py" => "text/x-python",
        "java" => "text/x-java-source",
        "rb" => "text/x-ruby",
        "php" => "application/x-php",
        "cpp" | "cc" | "cxx" => "text/x-c++src",
        "c" => "text/x-csrc",
        "h" => "text/x-chdr",
        "cs" => "text/x-csharp",
        "sh" | "bash" => "text/x-shellscript",
        "sql" => "application/sql",

        // Binaries
        "wasm" => "application/wasm",
        "iso" => "application/x-iso9660-image",
        _ => return None,
    };
    essence.parse().ok()
}

/// Extension to content type map in `mime.types` format
#[derive(Debug, Default)]
pub struct MimeRegistry {
    types: HashMap<String, Mime>,
}

impl MimeRegistry {
    /// Parse `mime.types` content: `type/subtype ext1 ext2 ...` per line,
    /// `#` comments. The first mapping for an extension wins.
    pub fn parse(content: &str) -> Self {
        let mut types = HashMap::new();

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let mut fields = line.split_whitespace();
            let Some(Ok(mime)) = fields.next().map(str::parse::<Mime>) else {
                continue;
            };

            for ext in fields {
                types
                    .entry(ext.trim_start_matches('.').to_ascii_lowercase())
                    .or_insert_with(|| mime.clone());
            }
        }

        Self { types }
    }

    /// Load the host registry, or an empty one when none is installed
    fn load_platform() -> Self {
        for path in REGISTRY_PATHS {
            if let Ok(content) = std::fs::read_to_string(path) {
                let registry = Self::parse(&content);
                tracing::debug!("Loaded {} MIME mappings from {}", registry.len(), path);
                return registry;
            }
        }
        tracing::debug!("No platform MIME registry found, using built-in table only");
        Self::default()
    }

    /// Look up a lower-cased extension
    pub fn lookup(&self, ext: &str) -> Option<&Mime> {
        self.types.get(ext)
    }

    fn len(&self) -> usize {
        self.types.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_types() {
        assert_eq!(classify("report.pdf"), "application/pdf");
        assert_eq!(classify("readme.txt"), "text/plain");
        assert_eq!(classify("photo.JPG"), "image/jpeg");
        assert_eq!(classify("a/b/c/movie.mkv"), "video/x-matroska");
    }

    #[test]
    fn test_compound_extension_uses_last_only() {
        assert_eq!(classify("archive.tar.gz"), "application/gzip");
        assert_eq!(classify("backup.2024.tar"), "application/x-tar");
    }

    #[test]
    fn test_missing_extension_falls_back() {
        assert_eq!(classify("README"), ::mime::APPLICATION_OCTET_STREAM);
        assert_eq!(classify("trailing."), ::mime::APPLICATION_OCTET_STREAM);
        assert_eq!(classify("dir.d/Makefile"), ::mime::APPLICATION_OCTET_STREAM);
        assert_eq!(classify(""), ::mime::APPLICATION_OCTET_STREAM);
    }

    #[test]
    fn test_registry_fallback() {
        let registry = MimeRegistry::parse(
            "# comment line\n\
             application/x-custom-thing  cst  cstx\n\
             text/plain  cst\n\
             \n\
             not-a-type foo\n",
        );

        assert_eq!(registry.len(), 2);
        assert_eq!(classify_with("file.cst", &registry), "application/x-custom-thing");
        assert_eq!(classify_with("file.CSTX", &registry), "application/x-custom-thing");
        assert_eq!(classify_with("file.foo", &registry), ::mime::APPLICATION_OCTET_STREAM);
    }

    #[test]
    fn test_builtin_table_wins_over_registry() {
        let registry = MimeRegistry::parse("application/x-weird pdf\n");
        assert_eq!(classify_with("doc.pdf", &registry), "application/pdf");
    }

    #[test]
    fn test_builtin_constants_match_essence() {
        assert_eq!(classify("page.HTM"), ::mime::TEXT_HTML);
        assert_eq!(classify("icon.svg").essence_str(), "image/svg+xml");
        assert_eq!(
            classify("sheet.xlsx").essence_str(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
    }

    #[test]
    fn test_unknown_extension_with_empty_registry() {
        let registry = MimeRegistry::default();
        assert_eq!(classify_with("data.zzqx", &registry), ::mime::APPLICATION_OCTET_STREAM);
    }
}
