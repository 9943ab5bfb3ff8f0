use std::path::Path;

/// Extension to MIME type, biased towards the files a printing workspace holds.
const MIME_TYPES: &[(&str, &str)] = &[
    ("scad", "application/x-openscad"),
    ("stl", "model/stl"),
    ("3mf", "model/3mf"),
    ("obj", "model/obj"),
    ("step", "model/step"),
    ("stp", "model/step"),
    ("amf", "application/x-amf"),
    ("gcode", "text/x-gcode"),
    ("gco", "text/x-gcode"),
    ("ini", "text/plain"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("json", "application/json"),
    ("toml", "application/toml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("xml", "application/xml"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("py", "text/x-python"),
    ("rs", "text/x-rust"),
    ("sh", "application/x-sh"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
];

pub const TEXT_FALLBACK: &str = "text/plain";
pub const BINARY_FALLBACK: &str = "application/octet-stream";

pub fn guess(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    MIME_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
}
