//! Flattens a Solidity source with nested imports into a self-contained
//! source set suitable for a standard-json compilation request. Every
//! import path, however it was spelled (registry package, absolute URL,
//! relative to its importer), is rewritten to the bare canonical file
//! name the dependency is stored under.

mod fetcher;

pub use fetcher::{FetchError, HttpImportFetcher, ImportFetcher};

use crate::solidity::code_mask;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub content: String,
}

/// File name -> source unit. Unique keys; the reference graph between
/// units is acyclic by construction.
pub type SourceSet = BTreeMap<String, SourceUnit>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unresolvable import `{path}`: {reason}")]
    Unresolvable { path: String, reason: String },
    #[error("cyclic import involving `{path}`")]
    Cycle { path: String },
    #[error("import graph deeper than {0} levels")]
    TooDeep(usize),
}

pub struct ImportResolver {
    fetcher: Arc<dyn ImportFetcher>,
    registry_base: Url,
    max_depth: usize,
}

impl ImportResolver {
    pub fn new(fetcher: Arc<dyn ImportFetcher>, registry_base: Url, max_depth: usize) -> Self {
        Self {
            fetcher,
            registry_base,
            max_depth,
        }
    }

    /// Resolves `root_source` into a flattened source set stored under
    /// `root_name`. Any unresolvable or cyclic import fails the whole
    /// resolution; no partial set is produced.
    pub async fn resolve(
        &self,
        root_source: &str,
        root_name: &str,
    ) -> Result<SourceSet, ResolveError> {
        let mut resolution = Resolution {
            resolver: self,
            units: BTreeMap::new(),
            assigned: HashMap::new(),
            visiting: HashSet::new(),
            taken: HashSet::from([root_name.to_string()]),
        };

        let rewritten = resolution
            .flatten(root_source.to_string(), None, 0)
            .await?;

        let mut units = resolution.units;
        units.insert(root_name.to_string(), SourceUnit { content: rewritten });
        tracing::debug!(units = units.len(), root = root_name, "resolved source set");
        Ok(units)
    }
}

struct Resolution<'a> {
    resolver: &'a ImportResolver,
    units: SourceSet,
    /// Fetched target URL -> canonical file name (first seen wins).
    assigned: HashMap<String, String>,
    /// Targets on the current resolution path, for cycle detection.
    visiting: HashSet<String>,
    taken: HashSet<String>,
}

impl Resolution<'_> {
    /// Rewrites every import statement of `content` to its canonical
    /// name, recursively resolving dependencies first.
    fn flatten(
        &mut self,
        content: String,
        origin: Option<Url>,
        depth: usize,
    ) -> BoxFuture<'_, Result<String, ResolveError>> {
        async move {
            if depth > self.resolver.max_depth {
                return Err(ResolveError::TooDeep(self.resolver.max_depth));
            }

            let imports = extract_imports(&content);
            let mut replacements = Vec::with_capacity(imports.len());
            for import in &imports {
                let name = self
                    .resolve_import(&import.path, origin.as_ref(), depth)
                    .await?;
                replacements.push((import.start..import.end, name));
            }

            let mut rewritten = content;
            for (range, name) in replacements.into_iter().rev() {
                rewritten.replace_range(range, &format!("import \"{name}\";"));
            }
            Ok(rewritten)
        }
        .boxed()
    }

    async fn resolve_import(
        &mut self,
        path: &str,
        origin: Option<&Url>,
        depth: usize,
    ) -> Result<String, ResolveError> {
        let target = self.target_url(path, origin)?;
        let key = target.as_str().to_string();

        if self.visiting.contains(&key) {
            return Err(ResolveError::Cycle {
                path: path.to_string(),
            });
        }
        if let Some(name) = self.assigned.get(&key) {
            return Ok(name.clone());
        }

        let fetched = self.resolver.fetcher.fetch(&target).await.map_err(|err| {
            ResolveError::Unresolvable {
                path: path.to_string(),
                reason: err.to_string(),
            }
        })?;

        let name = self.assign_name(path);
        self.assigned.insert(key.clone(), name.clone());
        self.visiting.insert(key.clone());
        let rewritten = self.flatten(fetched, Some(target), depth + 1).await?;
        self.visiting.remove(&key);
        self.units.insert(name.clone(), SourceUnit { content: rewritten });
        Ok(name)
    }

    fn target_url(&self, path: &str, origin: Option<&Url>) -> Result<Url, ResolveError> {
        let unresolvable = |reason: String| ResolveError::Unresolvable {
            path: path.to_string(),
            reason,
        };

        if path.starts_with("http://") || path.starts_with("https://") {
            Url::parse(path).map_err(|err| unresolvable(err.to_string()))
        } else if path.starts_with("./") || path.starts_with("../") {
            let origin = origin
                .ok_or_else(|| unresolvable("relative import has no resolvable base".to_string()))?;
            origin
                .join(path)
                .map_err(|err| unresolvable(err.to_string()))
        } else {
            self.resolver
                .registry_base
                .join(path.trim_start_matches('/'))
                .map_err(|err| unresolvable(err.to_string()))
        }
    }

    /// Canonical file name for a fetched dependency: its basename, made
    /// unique against already taken names by prepending parent path
    /// segments.
    fn assign_name(&mut self, path: &str) -> String {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let basename = segments.last().copied().unwrap_or(path);

        let mut candidate = basename.to_string();
        for segment in segments.iter().rev().skip(1) {
            if !self.taken.contains(&candidate) {
                break;
            }
            candidate = format!("{segment}_{candidate}");
        }
        while self.taken.contains(&candidate) {
            candidate = format!("_{candidate}");
        }

        self.taken.insert(candidate.clone());
        candidate
    }
}

struct ImportDirective {
    start: usize,
    end: usize,
    path: String,
}

/// Import statements (`import "p";`, `import {A} from "p";`,
/// `import "p" as X;`) located outside comments and string literals.
fn extract_imports(source: &str) -> Vec<ImportDirective> {
    let mask = code_mask(source);
    let bytes = source.as_bytes();
    let mut directives = Vec::new();

    for (start, _) in source.match_indices("import") {
        let end_of_keyword = start + "import".len();
        if !mask[start..end_of_keyword].iter().all(|b| *b) {
            continue;
        }
        if start > 0 && is_ident_byte(bytes[start - 1]) {
            continue;
        }
        match bytes.get(end_of_keyword) {
            Some(b) if is_ident_byte(*b) => continue,
            None => continue,
            _ => {}
        }

        let Some(semicolon) = (end_of_keyword..source.len())
            .find(|i| bytes[*i] == b';' && mask[*i])
        else {
            continue;
        };

        if let Some(path) = quoted_path(&source[end_of_keyword..semicolon]) {
            directives.push(ImportDirective {
                start,
                end: semicolon + 1,
                path,
            });
        }
    }

    directives
}

fn quoted_path(directive: &str) -> Option<String> {
    let open = directive.find(['"', '\''])?;
    let quote = directive.as_bytes()[open] as char;
    let rest = &directive[open + 1..];
    let close = rest.find(quote)?;
    Some(rest[..close].to_string())
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}
