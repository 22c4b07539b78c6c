use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FingerprintError;

/// Phrases seen on unclaimed third-party resources that are still referenced by DNS.
const BUILTIN_FINGERPRINTS: &[(&str, &str)] = &[
    ("There isn't a GitHub Pages site here.", "GitHub Pages"),
    ("NoSuchBucket", "Amazon S3"),
    ("You're almost there!", "Heroku"),
    ("Do you want to register *.wordpress.com?", "WordPress"),
    ("The specified bucket does not exist", "Amazon S3"),
    ("Sorry, We Couldn't Find That Page", "Tumblr"),
    ("Fastly error: unknown domain", "Fastly"),
    ("This page is reserved for future use", "Microsoft Azure"),
    ("project not found", "GitLab Pages"),
    ("404 Not Found", "Shopify"),
    ("CNAME Cross-User Banned", "CloudFront"),
    ("Temporary Redirect", "Generic"),
    ("Trying to access your account?", "Generic"),
    ("No such app", "Fly.io"),
    ("No such site at this address", "Pantheon"),
    ("The service you requested is not available.", "Bitbucket"),
];

fn default_case_insensitive() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub phrase: String,
    #[serde(default = "default_case_insensitive")]
    pub case_insensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

impl Fingerprint {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            case_insensitive: true,
            service: None,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }
}

/// Ordered, editable list of takeover fingerprints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintTable {
    entries: Vec<Fingerprint>,
}

impl FingerprintTable {
    pub fn builtin() -> Self {
        Self::from_entries(
            BUILTIN_FINGERPRINTS
                .iter()
                .map(|(phrase, service)| Fingerprint::new(*phrase).with_service(*service))
                .collect(),
        )
    }

    pub fn from_entries(entries: Vec<Fingerprint>) -> Self {
        Self { entries }
    }

    /// Loads a JSON array of `{phrase, case_insensitive?, service?}` objects.
    pub async fn load(path: &Path) -> Result<Self, FingerprintError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| FingerprintError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let entries: Vec<Fingerprint> =
            serde_json::from_str(&raw).map_err(|source| FingerprintError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let table = Self::from_entries(entries);
        if table.is_empty() {
            return Err(FingerprintError::Empty(path.to_path_buf()));
        }
        Ok(table)
    }

    pub fn push(&mut self, fingerprint: Fingerprint) {
        self.entries.push(fingerprint);
    }

    pub fn entries(&self) -> &[Fingerprint] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Vulnerable,
    Clean,
}

/// Binary takeover classifier. A bare 404 is enough to report.
#[derive(Debug, Clone)]
pub struct Matcher {
    table: FingerprintTable,
    // lowercased phrases, index-aligned with `table`
    folded: Vec<String>,
}

impl Matcher {
    pub fn new(table: FingerprintTable) -> Self {
        let folded = table
            .entries()
            .iter()
            .map(|entry| {
                if entry.case_insensitive {
                    entry.phrase.to_lowercase()
                } else {
                    entry.phrase.clone()
                }
            })
            .collect();
        Self { table, folded }
    }

    pub fn classify(&self, status_code: u16, body: &str) -> Verdict {
        if status_code == 404 || self.matching(body).is_some() {
            Verdict::Vulnerable
        } else {
            Verdict::Clean
        }
    }

    /// First fingerprint found in `body`, in table order.
    pub fn matching(&self, body: &str) -> Option<&Fingerprint> {
        let mut lowered: Option<String> = None;
        for (entry, needle) in self.table.entries().iter().zip(&self.folded) {
            if needle.is_empty() {
                continue;
            }
            let hit = if entry.case_insensitive {
                lowered
                    .get_or_insert_with(|| body.to_lowercase())
                    .contains(needle.as_str())
            } else {
                body.contains(needle.as_str())
            };
            if hit {
                return Some(entry);
            }
        }
        None
    }

    pub fn table(&self) -> &FingerprintTable {
        &self.table
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(FingerprintTable::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_status_is_vulnerable_whatever_the_body() {
        let matcher = Matcher::default();
        for body in ["", "Welcome", "<html>all good</html>"] {
            assert_eq!(matcher.classify(404, body), Verdict::Vulnerable);
        }
        let empty = Matcher::new(FingerprintTable::default());
        assert_eq!(empty.classify(404, "anything"), Verdict::Vulnerable);
    }

    #[test]
    fn builtin_phrases_match_ignoring_case() {
        let matcher = Matcher::default();
        assert_eq!(matcher.table().len(), 16);
        for entry in matcher.table().entries() {
            let body = format!("<h1>{}</h1>", entry.phrase.to_uppercase());
            for status in [200, 301, 403, 500] {
                assert_eq!(matcher.classify(status, &body), Verdict::Vulnerable, "{}", entry.phrase);
            }
        }
    }

    #[test]
    fn unmatched_body_is_clean() {
        let matcher = Matcher::default();
        assert_eq!(matcher.classify(200, "Welcome"), Verdict::Clean);
        assert_eq!(matcher.classify(500, "internal error"), Verdict::Clean);
        assert_eq!(matcher.classify(403, ""), Verdict::Clean);
    }

    #[test]
    fn synthetic_table_controls_matching() {
        let mut table = FingerprintTable::from_entries(vec![Fingerprint::new("unclaimed")]);
        table.push(Fingerprint {
            phrase: "ExactCase".into(),
            case_insensitive: false,
            service: Some("Strict".into()),
        });
        let matcher = Matcher::new(table);

        assert_eq!(matcher.classify(200, "This host is UNCLAIMED"), Verdict::Vulnerable);
        assert_eq!(matcher.classify(200, "exactcase"), Verdict::Clean);
        assert_eq!(matcher.classify(200, "ExactCase"), Verdict::Vulnerable);
        assert_eq!(
            matcher.matching("ExactCase").and_then(|f| f.service.as_deref()),
            Some("Strict")
        );
        // builtin phrases are not implied
        assert_eq!(matcher.classify(200, "NoSuchBucket"), Verdict::Clean);
    }

    #[test]
    fn empty_phrase_never_matches() {
        let matcher = Matcher::new(FingerprintTable::from_entries(vec![Fingerprint::new("")]));
        assert_eq!(matcher.classify(200, "anything"), Verdict::Clean);
    }

    #[tokio::test]
    async fn table_loads_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fingerprints.json");
        std::fs::write(
            &path,
            r#"[{"phrase": "gone fishing"}, {"phrase": "Strict", "case_insensitive": false, "service": "X"}]"#,
        )
        .unwrap();

        let table = FingerprintTable::load(&path).await.unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.entries()[0].case_insensitive);
        assert!(!table.entries()[1].case_insensitive);
        assert_eq!(table.entries()[1].service.as_deref(), Some("X"));
    }

    #[tokio::test]
    async fn table_load_rejects_garbage_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "not json").unwrap();
        assert!(matches!(FingerprintTable::load(&bad).await, Err(FingerprintError::Parse { .. })));

        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, "[]").unwrap();
        assert!(matches!(FingerprintTable::load(&empty).await, Err(FingerprintError::Empty(_))));

        let missing = dir.path().join("missing.json");
        assert!(matches!(FingerprintTable::load(&missing).await, Err(FingerprintError::Io { .. })));
    }
}
