//! Path authorization.
//!
//! A requested path is made absolute (`~` expansion, cwd anchoring), then
//! walked one component at a time against the real filesystem: symlinks are
//! replaced by their targets before any later `..` is applied, so a link
//! planted inside an allowed root cannot point the walk somewhere else.
//! Components that do not exist yet are applied lexically. The result must
//! sit inside one of the allowed roots.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use toolwarden_core::paths::{AllowedRootSet, RootContext};

use crate::decision::{PathDecision, PathReason};

/// Same bound as Linux `MAXSYMLINKS`.
const MAX_SYMLINK_HOPS: usize = 40;

/// Whether a symlink in the last position is followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalComponent {
    Follow,
    NoFollow,
}

#[derive(Debug, Clone)]
pub struct PathAuthorizer {
    roots: AllowedRootSet,
    home: Option<PathBuf>,
    cwd: PathBuf,
}

#[derive(Debug)]
struct Resolution {
    path: PathBuf,
    existing_ancestor: PathBuf,
    exists: bool,
}

#[derive(Debug)]
enum Step {
    Current,
    Parent,
    Name(OsString),
}

impl PathAuthorizer {
    pub fn new(roots: AllowedRootSet, context: &RootContext) -> Self {
        Self {
            roots,
            home: context.home_dir.clone(),
            cwd: context.cwd.clone(),
        }
    }

    pub fn roots(&self) -> &AllowedRootSet {
        &self.roots
    }

    pub fn authorize(&self, raw: &str) -> PathDecision {
        self.evaluate(raw, FinalComponent::Follow)
    }

    /// Like [`authorize`](Self::authorize), but a symlink in the last
    /// position is judged as the link itself rather than its target.
    pub fn authorize_entry(&self, raw: &str) -> PathDecision {
        self.evaluate(raw, FinalComponent::NoFollow)
    }

    fn evaluate(&self, raw: &str, final_component: FinalComponent) -> PathDecision {
        let absolute = match self.absolutize(raw) {
            Ok(path) => path,
            Err(detail) => return PathDecision::resolution_error(raw, detail),
        };

        let resolution = match resolve(&absolute, final_component) {
            Ok(resolution) => resolution,
            Err(err) => {
                debug!(requested = raw, error = %err, "path resolution failed");
                return PathDecision::resolution_error(raw, err.to_string());
            }
        };

        let root = self.roots.containing(&resolution.path).map(|root| root.kind);
        let ancestor_inside =
            resolution.exists || self.roots.containing(&resolution.existing_ancestor).is_some();
        // A path can land inside a root while its deepest existing ancestor
        // does not, e.g. when the root directory was removed after start-up.
        let reason = match (root, ancestor_inside) {
            (None, _) => PathReason::OutsideAllowedRoots,
            (Some(_), true) => PathReason::Ok,
            (Some(_), false) => PathReason::DoesNotExistAndParentDisallowed,
        };
        let allowed = reason == PathReason::Ok;

        debug!(
            requested = raw,
            resolved = %resolution.path.display(),
            exists = resolution.exists,
            allowed,
            "path evaluated"
        );

        PathDecision {
            requested_path: raw.to_string(),
            resolved_path: Some(resolution.path),
            exists: resolution.exists,
            allowed,
            reason,
            root: if allowed { root } else { None },
            detail: None,
        }
    }

    fn absolutize(&self, raw: &str) -> Result<PathBuf, String> {
        if raw.is_empty() {
            return Err("empty path".to_string());
        }
        if raw.chars().any(char::is_control) {
            return Err("path contains control characters".to_string());
        }

        let expanded = if raw == "~" || raw.starts_with("~/") {
            let home = self
                .home
                .as_ref()
                .ok_or_else(|| "home directory is unknown".to_string())?;
            home.join(raw.trim_start_matches('~').trim_start_matches('/'))
        } else {
            PathBuf::from(raw)
        };

        if expanded.is_absolute() {
            Ok(expanded)
        } else {
            Ok(self.cwd.join(expanded))
        }
    }
}

fn split(path: &Path) -> (PathBuf, Vec<Step>) {
    let mut anchor = PathBuf::new();
    let mut steps = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => anchor.push(component.as_os_str()),
            Component::CurDir => steps.push(Step::Current),
            Component::ParentDir => steps.push(Step::Parent),
            Component::Normal(name) => steps.push(Step::Name(name.to_os_string())),
        }
    }
    (anchor, steps)
}

fn resolve(absolute: &Path, final_component: FinalComponent) -> io::Result<Resolution> {
    let (anchor, steps) = split(absolute);
    let mut current = anchor;
    let mut pending: VecDeque<Step> = steps.into();
    // Number of trailing components in `current` that do not exist.
    let mut missing = 0usize;
    let mut hops = 0usize;

    while let Some(step) = pending.pop_front() {
        let name = match step {
            Step::Current => continue,
            Step::Parent => {
                current.pop();
                missing = missing.saturating_sub(1);
                continue;
            }
            Step::Name(name) => name,
        };

        if missing > 0 {
            current.push(&name);
            missing += 1;
            continue;
        }

        let candidate = current.join(&name);
        let keep_link = pending.is_empty() && final_component == FinalComponent::NoFollow;
        match fs::symlink_metadata(&candidate) {
            Ok(meta) if meta.file_type().is_symlink() && !keep_link => {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        "too many levels of symbolic links",
                    ));
                }
                let target = fs::read_link(&candidate)?;
                let (target_anchor, target_steps) = split(&target);
                if target.has_root() {
                    current = target_anchor;
                }
                for step in target_steps.into_iter().rev() {
                    pending.push_front(step);
                }
            }
            Ok(_) => current = candidate,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                current = candidate;
                missing = 1;
            }
            Err(err) => return Err(err),
        }
    }

    let mut existing_ancestor = current.clone();
    for _ in 0..missing {
        existing_ancestor.pop();
    }

    Ok(Resolution {
        path: current,
        existing_ancestor,
        exists: missing == 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolwarden_core::types::RootKind;

    struct Fixture {
        _temp: tempfile::TempDir,
        base: PathBuf,
        home: PathBuf,
        workspace: PathBuf,
        authorizer: PathAuthorizer,
    }

    /// `<base>/home/u` is home, `<base>/home/u/project` is workspace and cwd,
    /// `<base>/outside` holds a file no root covers.
    fn fixture() -> Fixture {
        let temp = tempfile::tempdir().unwrap();
        let base = fs::canonicalize(temp.path()).unwrap();
        let home = base.join("home/u");
        let workspace = home.join("project");
        fs::create_dir_all(workspace.join("models")).unwrap();
        fs::create_dir_all(base.join("outside")).unwrap();
        fs::write(base.join("outside/secret.txt"), "hunter2").unwrap();

        let context = RootContext {
            workspace_dir: workspace.clone(),
            home_dir: Some(home.clone()),
            cwd: workspace.clone(),
        };
        let roots = AllowedRootSet::from_candidates(vec![
            (RootKind::Workspace, workspace.clone()),
            (RootKind::Home, home.clone()),
            (RootKind::Cwd, workspace.clone()),
        ])
        .unwrap();

        Fixture {
            authorizer: PathAuthorizer::new(roots, &context),
            _temp: temp,
            base,
            home,
            workspace,
        }
    }

    fn s(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn traversal_out_of_home_is_denied() {
        let fx = fixture();
        let climb = "../".repeat(fx.home.components().count() + 1);
        let decision = fx
            .authorizer
            .authorize(&format!("~/project/{climb}etc/passwd"));

        assert!(!decision.allowed);
        assert!(decision.resolved_path.unwrap().ends_with("etc/passwd"));
        assert_ne!(decision.reason, PathReason::Ok);
        assert_ne!(decision.reason, PathReason::ResolutionError);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn home_relative_escape_to_etc_passwd() {
        let fx = fixture();
        let climb = "../".repeat(fx.home.components().count());
        let decision = fx.authorizer.authorize(&format!("~/project/{climb}etc/passwd"));

        assert_eq!(decision.resolved_path, Some(PathBuf::from("/etc/passwd")));
        assert!(!decision.allowed);
        assert_eq!(decision.reason, PathReason::OutsideAllowedRoots);
    }

    #[test]
    fn new_model_file_under_workspace_is_allowed() {
        let fx = fixture();
        let decision = fx.authorizer.authorize("~/project/models/abc123/main.scad");

        assert!(decision.allowed);
        assert_eq!(decision.reason, PathReason::Ok);
        assert!(!decision.exists);
        assert_eq!(decision.root, Some(RootKind::Workspace));
        assert_eq!(
            decision.resolved_path,
            Some(fx.workspace.join("models/abc123/main.scad"))
        );
    }

    #[test]
    fn root_itself_is_allowed() {
        let fx = fixture();
        let decision = fx.authorizer.authorize(&s(&fx.workspace));
        assert!(decision.allowed);
        assert!(decision.exists);
        assert_eq!(decision.resolved_path, Some(fx.workspace.clone()));

        let decision = fx.authorizer.authorize("~");
        assert!(decision.allowed);
        assert_eq!(decision.root, Some(RootKind::Home));
    }

    #[test]
    fn relative_paths_anchor_at_cwd() {
        let fx = fixture();
        let decision = fx.authorizer.authorize("models/part.stl");
        assert!(decision.allowed);
        assert_eq!(
            decision.resolved_path,
            Some(fx.workspace.join("models/part.stl"))
        );
    }

    #[test]
    fn separators_normalize() {
        let fx = fixture();
        let plain = fx.authorizer.authorize(&format!("{}/models", s(&fx.workspace)));
        let messy = fx
            .authorizer
            .authorize(&format!("{}//models///./", s(&fx.workspace)));
        assert_eq!(plain.resolved_path, messy.resolved_path);
        assert_eq!(plain.reason, messy.reason);
        assert!(messy.allowed);
    }

    #[test]
    fn sibling_with_shared_prefix_is_outside() {
        let fx = fixture();
        let sibling = fx.base.join("home/u2");
        fs::create_dir_all(&sibling).unwrap();

        let decision = fx.authorizer.authorize(&s(&sibling.join("notes.txt")));
        assert!(!decision.allowed);
        assert_eq!(decision.reason, PathReason::OutsideAllowedRoots);
    }

    #[test]
    fn outside_file_is_denied() {
        let fx = fixture();
        let decision = fx.authorizer.authorize(&s(&fx.base.join("outside/secret.txt")));
        assert!(!decision.allowed);
        assert!(decision.exists);
        assert_eq!(decision.reason, PathReason::OutsideAllowedRoots);
        assert_eq!(decision.root, None);
    }

    #[test]
    fn missing_target_with_outside_parent() {
        let fx = fixture();
        let decision = fx
            .authorizer
            .authorize("~/project/newdir/../../../../outside/new.txt");

        assert!(!decision.allowed);
        assert_eq!(decision.reason, PathReason::OutsideAllowedRoots);
        assert_eq!(
            decision.resolved_path,
            Some(fx.base.join("outside/new.txt"))
        );
    }

    #[test]
    fn missing_path_outside_every_root_is_outside() {
        let fx = fixture();
        let decision = fx
            .authorizer
            .authorize(&s(&fx.base.join("nowhere/deeper/file.txt")));
        assert!(!decision.allowed);
        assert!(!decision.exists);
        assert_eq!(decision.reason, PathReason::OutsideAllowedRoots);
    }

    #[test]
    fn removed_root_leaves_parent_disallowed() {
        let fx = fixture();
        let scratch = fx.base.join("scratch");
        fs::create_dir_all(&scratch).unwrap();
        let roots =
            AllowedRootSet::from_candidates(vec![(RootKind::Workspace, scratch.clone())]).unwrap();
        let context = RootContext {
            workspace_dir: scratch.clone(),
            home_dir: None,
            cwd: scratch.clone(),
        };
        let authorizer = PathAuthorizer::new(roots, &context);
        fs::remove_dir(&scratch).unwrap();

        let decision = authorizer.authorize(&s(&scratch.join("new.txt")));
        assert!(!decision.allowed);
        assert!(!decision.exists);
        assert_eq!(decision.reason, PathReason::DoesNotExistAndParentDisallowed);
        assert_eq!(decision.resolved_path, Some(scratch.join("new.txt")));
    }

    #[test]
    fn control_characters_fail_resolution() {
        let fx = fixture();
        for raw in ["", "models/a\0b", "models/a\nb", "models/\u{7}bell"] {
            let decision = fx.authorizer.authorize(raw);
            assert!(!decision.allowed, "{raw:?}");
            assert_eq!(decision.reason, PathReason::ResolutionError, "{raw:?}");
            assert_eq!(decision.resolved_path, None);
        }
    }

    #[test]
    fn tilde_without_home_fails_resolution() {
        let fx = fixture();
        let context = RootContext {
            workspace_dir: fx.workspace.clone(),
            home_dir: None,
            cwd: fx.workspace.clone(),
        };
        let authorizer = PathAuthorizer::new(fx.authorizer.roots().clone(), &context);
        let decision = authorizer.authorize("~/project");
        assert_eq!(decision.reason, PathReason::ResolutionError);
    }

    #[test]
    fn decisions_are_repeatable() {
        let fx = fixture();
        for raw in ["models", "~/project/../x", "/", "~/project/models/../../../outside"] {
            assert_eq!(fx.authorizer.authorize(raw), fx.authorizer.authorize(raw));
        }
    }

    #[cfg(unix)]
    mod symlinks {
        use super::*;
        use std::os::unix::fs::symlink;

        #[test]
        fn link_pointing_outside_is_denied() {
            let fx = fixture();
            symlink(fx.base.join("outside"), fx.workspace.join("escape")).unwrap();

            let decision = fx.authorizer.authorize("escape/secret.txt");
            assert!(!decision.allowed);
            assert_eq!(decision.reason, PathReason::OutsideAllowedRoots);
            assert_eq!(
                decision.resolved_path,
                Some(fx.base.join("outside/secret.txt"))
            );
        }

        #[test]
        fn link_pointing_inside_resolves_to_target() {
            let fx = fixture();
            symlink("models", fx.workspace.join("latest")).unwrap();

            let decision = fx.authorizer.authorize("latest/part.stl");
            assert!(decision.allowed);
            assert_eq!(
                decision.resolved_path,
                Some(fx.workspace.join("models/part.stl"))
            );
        }

        #[test]
        fn parent_step_after_link_follows_the_target() {
            let fx = fixture();
            symlink(fx.base.join("outside"), fx.workspace.join("escape")).unwrap();
            fs::create_dir_all(fx.base.join("secrets")).unwrap();

            // Lexically this is `<workspace>/secrets`; on disk it is `<base>/secrets`.
            let decision = fx.authorizer.authorize("escape/../secrets");
            assert!(!decision.allowed);
            assert_eq!(decision.resolved_path, Some(fx.base.join("secrets")));
        }

        #[test]
        fn missing_component_does_not_hide_a_later_link() {
            let fx = fixture();
            symlink(fx.base.join("outside"), fx.workspace.join("escape")).unwrap();

            let decision = fx.authorizer.authorize("missing/../escape/secret.txt");
            assert!(!decision.allowed);
            assert_eq!(
                decision.resolved_path,
                Some(fx.base.join("outside/secret.txt"))
            );
        }

        #[test]
        fn dangling_link_to_outside_is_denied() {
            let fx = fixture();
            symlink(fx.base.join("outside/planted.txt"), fx.workspace.join("drop")).unwrap();

            let decision = fx.authorizer.authorize("drop");
            assert!(!decision.allowed);
            assert!(!decision.exists);
            assert_eq!(decision.reason, PathReason::OutsideAllowedRoots);
        }

        #[test]
        fn unreadable_parent_fails_resolution() {
            use std::os::unix::fs::PermissionsExt;

            let fx = fixture();
            let locked = fx.workspace.join("locked");
            fs::create_dir_all(locked.join("inner")).unwrap();
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

            // Privileged users bypass the mode bits.
            if fs::read_dir(&locked).is_ok() {
                fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
                return;
            }

            let decision = fx.authorizer.authorize("locked/inner/file.txt");
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

            assert!(!decision.allowed);
            assert_eq!(decision.reason, PathReason::ResolutionError);
            assert_eq!(decision.resolved_path, None);
        }

        #[test]
        fn entry_mode_judges_the_link_itself() {
            let fx = fixture();
            symlink(fx.base.join("outside"), fx.workspace.join("escape")).unwrap();

            let entry = fx.authorizer.authorize_entry("escape");
            assert!(entry.allowed);
            assert_eq!(entry.resolved_path, Some(fx.workspace.join("escape")));

            let followed = fx.authorizer.authorize("escape");
            assert!(!followed.allowed);
        }

        #[test]
        fn link_loop_fails_resolution() {
            let fx = fixture();
            symlink(fx.workspace.join("b"), fx.workspace.join("a")).unwrap();
            symlink(fx.workspace.join("a"), fx.workspace.join("b")).unwrap();

            let decision = fx.authorizer.authorize("a/file");
            assert_eq!(decision.reason, PathReason::ResolutionError);
            assert!(decision.detail.is_some());
        }

        #[test]
        fn symlinked_home_is_resolved_before_containment() {
            let fx = fixture();
            let alias = fx.base.join("alias");
            symlink(&fx.home, &alias).unwrap();

            let decision = fx.authorizer.authorize(&s(&alias.join("project/models")));
            assert!(decision.allowed);
            assert_eq!(decision.resolved_path, Some(fx.workspace.join("models")));
        }
    }
}
