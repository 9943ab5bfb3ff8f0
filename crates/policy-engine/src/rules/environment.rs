use std::collections::BTreeMap;

pub const REDACTION_MASK: &str = "***REDACTED***";

pub const SENSITIVE_KEYWORDS: &[&str] = &["KEY", "SECRET", "PASSWORD", "TOKEN", "CREDENTIAL"];

/// Masks values of variables whose name looks like it holds a credential.
#[derive(Debug, Clone)]
pub struct EnvironmentRedactor {
    keywords: Vec<String>,
}

impl EnvironmentRedactor {
    /// Built-in keywords plus `extra`, all compared in uppercase.
    pub fn with_extras<S: AsRef<str>>(extra: &[S]) -> Self {
        let mut keywords: Vec<String> = SENSITIVE_KEYWORDS.iter().map(|k| k.to_string()).collect();
        for keyword in extra {
            let keyword = keyword.as_ref().trim().to_uppercase();
            if !keyword.is_empty() && !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
        Self { keywords }
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        let upper = name.to_uppercase();
        self.keywords.iter().any(|keyword| upper.contains(keyword.as_str()))
    }

    pub fn redact<I, K, V>(&self, snapshot: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        snapshot
            .into_iter()
            .map(|(name, value)| {
                let name = name.into();
                let value = if self.is_sensitive(&name) {
                    REDACTION_MASK.to_string()
                } else {
                    value.into()
                };
                (name, value)
            })
            .collect()
    }
}

impl Default for EnvironmentRedactor {
    fn default() -> Self {
        Self::with_extras::<&str>(&[])
    }
}
