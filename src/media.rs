use std::path::Path;

/// Extensions that are handed to the metadata tool (lowercase)
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "nef", "cr3", "psd", "jpg", "jpeg", "png", "tif", "tiff", "heic", "heif", "dng", "avif", "mp4",
    "m4a",
];

/// Get the file extension from a path
pub fn get_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

/// macOS litter that shares media extensions but carries no metadata
pub fn is_junk_file(path: &Path) -> bool {
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

    // AppleDouble files (._*)
    filename.starts_with("._") || filename == ".DS_Store"
}

pub fn is_media_file(path: &Path) -> bool {
    if is_junk_file(path) {
        return false;
    }

    match get_extension(path) {
        Some(ext) => {
            let ext = ext.to_lowercase();
            MEDIA_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}
