//! Item filters: glob patterns matched against item type specs.

use globset::{Glob, GlobSet, GlobSetBuilder};
use pubforge_common::{Error, Result};

/// Compiled set of type-spec patterns (`*`, `?`, `[..]`; a plain type spec
/// matches itself). An empty filter matches nothing.
#[derive(Debug, Clone)]
pub struct ItemFilter {
    patterns: Vec<String>,
    set: GlobSet,
}

impl ItemFilter {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| Error::Config(format!("invalid item filter '{pattern}': {e}")))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| Error::Config(format!("invalid item filters: {e}")))?;
        Ok(Self { patterns, set })
    }

    pub fn is_match(&self, type_spec: &str) -> bool {
        self.set.is_match(type_spec)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}
