//! Filesystem operations for tool callers.
//!
//! Every operation authorizes its path with the [`Gatekeeper`] first and then
//! acts only on the resolved path the decision returns, never on the raw
//! input. Operations block; async callers run them on a blocking thread.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use toolwarden_core::config::FilesystemConfig;
use toolwarden_core::error::{AccessError, GatewayError};

use policy_engine::{AuthorizedPath, Gatekeeper};

pub mod entry;
pub mod mime;

pub use entry::EntryKind;

use entry::{permissions, unix_seconds};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEncoding {
    Utf8,
    Binary,
}

impl ReadEncoding {
    pub fn parse(value: &str) -> Result<Self, GatewayError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(ReadEncoding::Utf8),
            "binary" => Ok(ReadEncoding::Binary),
            other => Err(GatewayError::InvalidRequest(format!(
                "unsupported encoding '{other}', use 'utf-8' or 'binary'"
            ))),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ReadEncoding::Utf8 => "utf-8",
            ReadEncoding::Binary => "binary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FileBody {
    Text { content: String },
    Binary { content_base64: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileContent {
    pub path: PathBuf,
    pub size: u64,
    pub mime_type: String,
    pub encoding: String,
    pub is_binary: bool,
    #[serde(flatten)]
    pub body: FileBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub success: bool,
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub success: bool,
    pub path: PathBuf,
    pub size: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    /// Relative to the listed directory.
    pub path: PathBuf,
    pub absolute_path: PathBuf,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryListing {
    pub directory: PathBuf,
    pub count: usize,
    pub entries: Vec<DirectoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathInfo {
    pub exists: bool,
    pub path: PathBuf,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntryKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_symlink: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FilesystemGateway {
    gatekeeper: Arc<Gatekeeper>,
    max_read_bytes: u64,
}

impl FilesystemGateway {
    pub fn new(gatekeeper: Arc<Gatekeeper>, settings: &FilesystemConfig) -> Self {
        Self {
            gatekeeper,
            max_read_bytes: settings.max_read_bytes,
        }
    }

    pub fn gatekeeper(&self) -> &Gatekeeper {
        &self.gatekeeper
    }

    pub fn read_file(&self, raw: &str, encoding: &str) -> Result<FileContent, GatewayError> {
        let encoding = ReadEncoding::parse(encoding)?;
        let target = self.authorize(raw)?;
        if !target.exists {
            return Err(GatewayError::NotFound(format!("File does not exist: {raw}")));
        }
        let metadata = fs::metadata(&target.path).map_err(|err| GatewayError::io("stat file", err))?;
        if !metadata.is_file() {
            return Err(GatewayError::NotAFile(raw.to_string()));
        }
        if metadata.len() > self.max_read_bytes {
            return Err(GatewayError::TooLarge {
                size: metadata.len(),
                limit: self.max_read_bytes,
            });
        }

        // The file may have grown since the stat; never read past the limit.
        let file = fs::File::open(&target.path).map_err(|err| GatewayError::io("open file", err))?;
        let mut bytes = Vec::with_capacity(metadata.len() as usize);
        file.take(self.max_read_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|err| GatewayError::io("read file", err))?;
        let size = bytes.len() as u64;
        if size > self.max_read_bytes {
            return Err(GatewayError::TooLarge {
                size,
                limit: self.max_read_bytes,
            });
        }

        let guessed = mime::guess(&target.path);
        let (mime_type, body) = match encoding {
            ReadEncoding::Utf8 => {
                let content = String::from_utf8(bytes).map_err(|_| GatewayError::Encoding {
                    encoding: encoding.label().to_string(),
                })?;
                (guessed.unwrap_or(mime::TEXT_FALLBACK), FileBody::Text { content })
            }
            ReadEncoding::Binary => (
                guessed.unwrap_or(mime::BINARY_FALLBACK),
                FileBody::Binary {
                    content_base64: BASE64.encode(&bytes),
                },
            ),
        };

        debug!(size, encoding = encoding.label(), "file read");
        Ok(FileContent {
            path: target.path,
            size,
            mime_type: mime_type.to_string(),
            encoding: encoding.label().to_string(),
            is_binary: encoding == ReadEncoding::Binary,
            body,
        })
    }

    pub fn write_file(
        &self,
        raw: &str,
        content: &str,
        create_dirs: bool,
    ) -> Result<WriteOutcome, GatewayError> {
        let target = self.authorize(raw)?;
        if target.exists && target.path.is_dir() {
            return Err(GatewayError::NotAFile(raw.to_string()));
        }
        if let Some(parent) = target.path.parent() {
            if !parent.is_dir() {
                if !create_dirs {
                    return Err(GatewayError::NotFound(format!(
                        "Parent directory does not exist: {raw}"
                    )));
                }
                fs::create_dir_all(parent)
                    .map_err(|err| GatewayError::io("create parent directories", err))?;
            }
        }
        fs::write(&target.path, content).map_err(|err| GatewayError::io("write file", err))?;

        debug!(size = content.len(), "file written");
        Ok(WriteOutcome {
            success: true,
            path: target.path,
            size: content.len() as u64,
            message: "File written successfully".to_string(),
        })
    }

    pub fn list_directory(
        &self,
        raw: &str,
        show_hidden: bool,
        recursive: bool,
    ) -> Result<DirectoryListing, GatewayError> {
        let target = self.authorize(raw)?;
        if !target.exists {
            return Err(GatewayError::NotFound(format!("Directory does not exist: {raw}")));
        }
        if !target.path.is_dir() {
            return Err(GatewayError::NotADirectory(raw.to_string()));
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(&target.path)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || show_hidden || !is_hidden(entry.file_name()));

        let mut entries = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    debug!(error = %err, "skipping entry without metadata");
                    continue;
                }
            };
            let kind = EntryKind::from_file_type(entry.file_type());
            let relative = entry
                .path()
                .strip_prefix(&target.path)
                .unwrap_or(entry.path())
                .to_path_buf();
            entries.push(DirectoryEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: relative,
                absolute_path: entry.path().to_path_buf(),
                kind,
                size: if kind == EntryKind::File { metadata.len() } else { 0 },
                modified: unix_seconds(metadata.modified()),
            });
        }

        Ok(DirectoryListing {
            directory: target.path,
            count: entries.len(),
            entries,
        })
    }

    pub fn create_directory(&self, raw: &str, parents: bool) -> Result<OperationOutcome, GatewayError> {
        let target = self.authorize(raw)?;
        if target.exists {
            if target.path.is_dir() {
                return Ok(OperationOutcome {
                    success: true,
                    path: target.path,
                    message: "Directory already exists".to_string(),
                });
            }
            return Err(GatewayError::ExistsAsFile(raw.to_string()));
        }

        let created = if parents {
            fs::create_dir_all(&target.path)
        } else {
            fs::create_dir(&target.path)
        };
        created.map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => {
                GatewayError::NotFound(format!("Parent directory does not exist: {raw}"))
            }
            _ => GatewayError::io("create directory", err),
        })?;

        Ok(OperationOutcome {
            success: true,
            path: target.path,
            message: "Directory created successfully".to_string(),
        })
    }

    pub fn delete_path(&self, raw: &str, recursive: bool) -> Result<OperationOutcome, GatewayError> {
        let target = self.authorize_entry(raw)?;
        if !target.exists {
            return Err(GatewayError::NotFound(format!("Path does not exist: {raw}")));
        }
        if self.covers_root(&target.path) {
            return Err(AccessError::AccessDenied {
                detail: "Refusing to delete an allowed root directory".to_string(),
            }
            .into());
        }

        let metadata =
            fs::symlink_metadata(&target.path).map_err(|err| GatewayError::io("stat path", err))?;
        let message = if metadata.is_dir() {
            if recursive {
                fs::remove_dir_all(&target.path)
                    .map_err(|err| GatewayError::io("delete directory", err))?;
            } else {
                let mut listing = fs::read_dir(&target.path)
                    .map_err(|err| GatewayError::io("read directory", err))?;
                if listing.next().is_some() {
                    return Err(GatewayError::DirectoryNotEmpty(raw.to_string()));
                }
                fs::remove_dir(&target.path)
                    .map_err(|err| GatewayError::io("delete directory", err))?;
            }
            "Directory deleted successfully"
        } else {
            fs::remove_file(&target.path).map_err(|err| GatewayError::io("delete file", err))?;
            if metadata.file_type().is_symlink() {
                "Symlink deleted successfully"
            } else {
                "File deleted successfully"
            }
        };

        debug!(kind = EntryKind::from_file_type(metadata.file_type()).label(), "path deleted");
        Ok(OperationOutcome {
            success: true,
            path: target.path,
            message: message.to_string(),
        })
    }

    pub fn path_info(&self, raw: &str) -> Result<PathInfo, GatewayError> {
        let target = self.authorize_entry(raw)?;
        if !target.exists {
            return Ok(PathInfo {
                exists: false,
                path: target.path,
                kind: None,
                size: None,
                modified: None,
                created: None,
                mime_type: None,
                is_symlink: None,
                permissions: None,
            });
        }

        let metadata =
            fs::symlink_metadata(&target.path).map_err(|err| GatewayError::io("stat path", err))?;
        let kind = EntryKind::from_file_type(metadata.file_type());
        Ok(PathInfo {
            exists: true,
            kind: Some(kind),
            size: Some(metadata.len()),
            modified: unix_seconds(metadata.modified()),
            created: unix_seconds(metadata.created()),
            mime_type: mime::guess(&target.path).map(str::to_string),
            is_symlink: Some(kind == EntryKind::Symlink),
            permissions: Some(permissions(&metadata)),
            path: target.path,
        })
    }

    fn authorize(&self, raw: &str) -> Result<AuthorizedPath, GatewayError> {
        Ok(self.gatekeeper.authorize_path(raw).into_result()?)
    }

    fn authorize_entry(&self, raw: &str) -> Result<AuthorizedPath, GatewayError> {
        Ok(self.gatekeeper.authorize_path_entry(raw).into_result()?)
    }

    /// True when `path` is an allowed root or contains one.
    fn covers_root(&self, path: &Path) -> bool {
        self.gatekeeper
            .roots()
            .roots()
            .iter()
            .any(|root| root.path.starts_with(path))
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolwarden_core::config::Config;
    use toolwarden_core::paths::RootContext;

    struct Fixture {
        _temp: tempfile::TempDir,
        base: PathBuf,
        workspace: PathBuf,
        gateway: FilesystemGateway,
    }

    fn fixture_with_limit(max_read_bytes: u64) -> Fixture {
        let temp = tempfile::tempdir().unwrap();
        let base = fs::canonicalize(temp.path()).unwrap();
        let workspace = base.join("workspace");
        fs::create_dir_all(workspace.join("models")).unwrap();
        fs::create_dir_all(base.join("outside")).unwrap();
        fs::write(base.join("outside/secret.txt"), "hunter2").unwrap();

        let context = RootContext {
            workspace_dir: workspace.clone(),
            home_dir: None,
            cwd: workspace.clone(),
        };
        let mut config = Config::default_config();
        config.filesystem.max_read_bytes = max_read_bytes;
        let gatekeeper = Arc::new(Gatekeeper::from_config(&config, &context).unwrap());

        Fixture {
            gateway: FilesystemGateway::new(gatekeeper, &config.filesystem),
            _temp: temp,
            base,
            workspace,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_limit(1024)
    }

    fn outside(fx: &Fixture) -> String {
        fx.base.join("outside/secret.txt").to_string_lossy().into_owned()
    }

    #[test]
    fn write_then_read_text() {
        let fx = fixture();
        let written = fx
            .gateway
            .write_file("models/abc/main.scad", "cube(10);", true)
            .unwrap();
        assert_eq!(written.path, fx.workspace.join("models/abc/main.scad"));
        assert_eq!(written.size, 9);

        let read = fx.gateway.read_file("models/abc/main.scad", "utf-8").unwrap();
        assert_eq!(read.mime_type, "application/x-openscad");
        assert!(!read.is_binary);
        assert_eq!(
            read.body,
            FileBody::Text {
                content: "cube(10);".to_string()
            }
        );
    }

    #[test]
    fn binary_read_is_base64() {
        let fx = fixture();
        fs::write(fx.workspace.join("blob.bin"), [0xff, 0x00, 0x10]).unwrap();

        let read = fx.gateway.read_file("blob.bin", "binary").unwrap();
        assert!(read.is_binary);
        assert_eq!(read.mime_type, mime::BINARY_FALLBACK);
        assert_eq!(
            read.body,
            FileBody::Binary {
                content_base64: "/wAQ".to_string()
            }
        );

        let json = serde_json::to_value(&read).unwrap();
        assert_eq!(json["content_base64"], "/wAQ");
        assert!(json.get("content").is_none());
    }

    #[test]
    fn invalid_utf8_suggests_binary() {
        let fx = fixture();
        fs::write(fx.workspace.join("blob.bin"), [0xff, 0xfe]).unwrap();
        let err = fx.gateway.read_file("blob.bin", "utf-8").unwrap_err();
        assert_eq!(err.kind(), "EncodingError");
        assert!(err.to_string().contains("binary"));
    }

    #[test]
    fn unsupported_encoding_is_rejected_before_io() {
        let fx = fixture();
        let err = fx.gateway.read_file(&outside(&fx), "latin-1").unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest");
    }

    #[test]
    fn oversized_files_are_refused() {
        let fx = fixture_with_limit(4);
        fs::write(fx.workspace.join("big.txt"), "0123456789").unwrap();
        let err = fx.gateway.read_file("big.txt", "utf-8").unwrap_err();
        assert_eq!(err, GatewayError::TooLarge { size: 10, limit: 4 });
    }

    #[test]
    fn reads_outside_roots_are_denied() {
        let fx = fixture();
        let err = fx.gateway.read_file(&outside(&fx), "utf-8").unwrap_err();
        assert_eq!(err.kind(), "AccessDenied");
        assert!(!err.to_string().contains("hunter2"));

        let err = fx.gateway.write_file(&outside(&fx), "pwned", true).unwrap_err();
        assert_eq!(err.kind(), "AccessDenied");
        assert_eq!(fs::read_to_string(fx.base.join("outside/secret.txt")).unwrap(), "hunter2");
    }

    #[test]
    fn read_errors_for_missing_and_directories() {
        let fx = fixture();
        assert_eq!(fx.gateway.read_file("nope.txt", "utf-8").unwrap_err().kind(), "NotFound");
        assert_eq!(fx.gateway.read_file("models", "utf-8").unwrap_err().kind(), "NotAFile");
    }

    #[test]
    fn write_without_create_dirs_needs_parent() {
        let fx = fixture();
        let err = fx.gateway.write_file("new/dir/file.txt", "x", false).unwrap_err();
        assert_eq!(err.kind(), "NotFound");
        assert!(!fx.workspace.join("new").exists());
    }

    #[test]
    fn listing_is_sorted_and_hides_dotfiles() {
        let fx = fixture();
        fs::write(fx.workspace.join("b.stl"), "solid").unwrap();
        fs::write(fx.workspace.join("a.scad"), "cube();").unwrap();
        fs::write(fx.workspace.join(".env"), "TOKEN=x").unwrap();
        fs::create_dir_all(fx.workspace.join(".git")).unwrap();
        fs::write(fx.workspace.join(".git/config"), "").unwrap();
        fs::write(fx.workspace.join("models/part.3mf"), "pk").unwrap();

        let listing = fx.gateway.list_directory(".", false, false).unwrap();
        let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.scad", "b.stl", "models"]);
        assert_eq!(listing.count, 3);
        assert_eq!(listing.entries[1].size, 5);
        assert_eq!(listing.entries[2].kind, EntryKind::Directory);
        assert_eq!(listing.entries[2].size, 0);

        let recursive = fx.gateway.list_directory(".", false, true).unwrap();
        let paths: Vec<_> = recursive.entries.iter().map(|e| e.path.clone()).collect();
        assert!(paths.contains(&PathBuf::from("models/part.3mf")));
        assert!(!paths.iter().any(|p| p.starts_with(".git")));

        let hidden = fx.gateway.list_directory(".", true, true).unwrap();
        assert!(hidden.entries.iter().any(|e| e.path == Path::new(".git/config")));
    }

    #[test]
    fn listing_a_file_fails() {
        let fx = fixture();
        fs::write(fx.workspace.join("a.txt"), "").unwrap();
        assert_eq!(
            fx.gateway.list_directory("a.txt", false, false).unwrap_err().kind(),
            "NotADirectory"
        );
    }

    #[test]
    fn create_directory_outcomes() {
        let fx = fixture();
        let created = fx.gateway.create_directory("models/x/y", true).unwrap();
        assert_eq!(created.message, "Directory created successfully");
        assert!(fx.workspace.join("models/x/y").is_dir());

        let again = fx.gateway.create_directory("models/x/y", true).unwrap();
        assert_eq!(again.message, "Directory already exists");

        fs::write(fx.workspace.join("file"), "").unwrap();
        assert_eq!(
            fx.gateway.create_directory("file", true).unwrap_err().kind(),
            "ExistsAsFile"
        );
        assert_eq!(
            fx.gateway.create_directory("a/b", false).unwrap_err().kind(),
            "NotFound"
        );
    }

    #[test]
    fn delete_refuses_non_empty_without_recursive() {
        let fx = fixture();
        fs::create_dir_all(fx.workspace.join("build/out")).unwrap();
        fs::write(fx.workspace.join("build/out/a.gcode"), "G28").unwrap();

        let err = fx.gateway.delete_path("build", false).unwrap_err();
        assert_eq!(err.kind(), "DirectoryNotEmpty");

        let done = fx.gateway.delete_path("build", true).unwrap();
        assert_eq!(done.message, "Directory deleted successfully");
        assert!(!fx.workspace.join("build").exists());
    }

    #[test]
    fn delete_never_removes_a_root() {
        let fx = fixture();
        let err = fx.gateway.delete_path(".", true).unwrap_err();
        assert_eq!(err.kind(), "AccessDenied");
        assert!(fx.workspace.is_dir());
    }

    #[test]
    fn path_info_for_missing_and_present() {
        let fx = fixture();
        let missing = fx.gateway.path_info("models/none.stl").unwrap();
        assert!(!missing.exists);
        assert_eq!(missing.kind, None);

        fs::write(fx.workspace.join("models/part.stl"), "solid x").unwrap();
        let info = fx.gateway.path_info("models/part.stl").unwrap();
        assert!(info.exists);
        assert_eq!(info.kind, Some(EntryKind::File));
        assert_eq!(info.size, Some(7));
        assert_eq!(info.mime_type.as_deref(), Some("model/stl"));
        assert_eq!(info.is_symlink, Some(false));
        assert_eq!(info.permissions.as_ref().map(String::len), Some(3));

        let err = fx.gateway.path_info(&outside(&fx)).unwrap_err();
        assert_eq!(err.kind(), "AccessDenied");
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_handled_without_escaping() {
        use std::os::unix::fs::symlink;

        let fx = fixture();
        symlink(fx.base.join("outside"), fx.workspace.join("escape")).unwrap();

        let err = fx.gateway.read_file("escape/secret.txt", "utf-8").unwrap_err();
        assert_eq!(err.kind(), "AccessDenied");

        let info = fx.gateway.path_info("escape").unwrap();
        assert_eq!(info.is_symlink, Some(true));

        let listing = fx.gateway.list_directory(".", false, true).unwrap();
        let under_link: Vec<_> = listing
            .entries
            .iter()
            .filter(|e| e.path.starts_with("escape"))
            .map(|e| e.path.clone())
            .collect();
        assert_eq!(under_link, vec![PathBuf::from("escape")]);

        let removed = fx.gateway.delete_path("escape", true).unwrap();
        assert_eq!(removed.message, "Symlink deleted successfully");
        assert!(fx.base.join("outside/secret.txt").exists());
    }
}
