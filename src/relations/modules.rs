//! Import specifier to file mapping.

use crate::normalize::ModuleSpec;
use crate::types::Language;
use std::collections::{BTreeMap, HashMap};

/// File stems that stand for their directory.
const PACKAGE_STEMS: &[&str] = &["__init__", "index", "mod"];

/// Module keys of every analyzed file.
///
/// A key is the `/`-separated path without extension. Package entry files
/// (`__init__.py`, `index.js`, `mod.rs`) and every Go file key by their
/// directory, so one key may name several files.
#[derive(Debug, Default)]
pub struct ModuleIndex {
    by_key: BTreeMap<String, Vec<usize>>,
    /// Last key component -> keys ending with it.
    by_last: HashMap<String, Vec<String>>,
    keys: Vec<String>,
}

pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.trim_start_matches("./").to_string()
}

/// Directory part of a normalized path (`""` at the root).
pub fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

pub fn module_key(path: &str, language: Language) -> String {
    let path = normalize_path(path);
    let dir = directory_of(&path).to_string();
    if language == Language::Go {
        return dir;
    }
    let file = &path[path.rfind('/').map(|i| i + 1).unwrap_or(0)..];
    let stem = match file.rfind('.') {
        Some(i) if i > 0 => &file[..i],
        _ => file,
    };
    let stem = stem.strip_suffix(".d").unwrap_or(stem);
    if PACKAGE_STEMS.contains(&stem) {
        dir
    } else if dir.is_empty() {
        stem.to_string()
    } else {
        format!("{dir}/{stem}")
    }
}

impl ModuleIndex {
    pub fn build<'a>(files: impl IntoIterator<Item = (&'a str, Language)>) -> Self {
        let mut index = Self::default();
        for (i, (path, language)) in files.into_iter().enumerate() {
            let key = module_key(path, language);
            index.keys.push(key.clone());
            let entry = index.by_key.entry(key.clone()).or_default();
            if entry.is_empty() {
                let last = key.rsplit('/').next().unwrap_or(&key).to_string();
                index.by_last.entry(last).or_default().push(key);
            }
            entry.push(i);
        }
        index
    }

    /// Key of the file at `index`.
    pub fn key_of(&self, file: usize) -> Option<&str> {
        self.keys.get(file).map(String::as_str)
    }

    /// Files sharing a key with `file` (the Go package), including itself.
    pub fn package_of(&self, file: usize) -> &[usize] {
        self.key_of(file)
            .and_then(|k| self.by_key.get(k))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Files an import specifier refers to, from the importing file's path.
    pub fn resolve(&self, importer: &str, spec: &ModuleSpec, language: Language) -> Option<&[usize]> {
        match spec.relative {
            Some(hops) => {
                let importer = normalize_path(importer);
                let mut parts: Vec<&str> = directory_of(&importer)
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .collect();
                for _ in 0..hops {
                    parts.pop()?;
                }
                parts.extend(spec.segments.iter().map(String::as_str));
                self.by_key.get(&parts.join("/")).map(Vec::as_slice)
            }
            None => {
                if spec.segments.is_empty() {
                    return None;
                }
                let segments: Vec<&str> = spec.segments.iter().map(String::as_str).collect();
                if let Some(found) = self.by_suffix(&segments) {
                    return Some(found);
                }
                // Go import paths carry the module prefix; shorten from the left.
                if language == Language::Go {
                    for skip in 1..segments.len() {
                        if let Some(found) = self.by_suffix(&segments[skip..]) {
                            return Some(found);
                        }
                    }
                }
                None
            }
        }
    }

    /// Shortest key ending with the joined segments, then lexicographic.
    fn by_suffix(&self, segments: &[&str]) -> Option<&[usize]> {
        let last = segments.last()?;
        let joined = segments.join("/");
        let suffix = format!("/{joined}");
        self.by_last
            .get(*last)?
            .iter()
            .filter(|key| **key == joined || key.ends_with(&suffix))
            .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .and_then(|key| self.by_key.get(key))
            .map(Vec::as_slice)
    }
}
