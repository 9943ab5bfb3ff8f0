use std::collections::HashMap;

/// Dynamic loader variables that let a caller inject code into the child.
pub const LOADER_HIJACK_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_AUDIT",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "DYLD_FRAMEWORK_PATH",
];

/// Environment of the current process; non-UTF-8 entries are converted lossily.
pub fn capture_env() -> HashMap<String, String> {
    std::env::vars_os()
        .map(|(name, value)| {
            (
                name.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .collect()
}

pub fn sanitize_env(env: &HashMap<String, String>) -> HashMap<String, String> {
    let mut sanitized = env.clone();
    for name in LOADER_HIJACK_VARS {
        sanitized.remove(*name);
    }
    sanitized
}
