//! # Directory Loader
//!
//! A [`PackLoader`] over a pack directory on disk, plus discovery of pack
//! directories below a collection root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use kpack_pack::loader::GUARDRAIL_DOCUMENTS;
use kpack_pack::{PackError, PackLoader, PackResult, RawFragment, PRIMARY_DOCUMENT};

/// Reads a pack from a directory containing `pack.yaml`.
#[derive(Debug, Clone)]
pub struct DirLoader {
    root: PathBuf,
}

impl DirLoader {
    /// A loader for `path`, which may be the pack directory or its
    /// `pack.yaml`.
    pub fn open(path: &Path) -> Self {
        let is_primary = path.file_name().is_some_and(|n| n == PRIMARY_DOCUMENT);
        let root = match path.parent() {
            Some(parent) if is_primary && path.is_file() => {
                if parent.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    parent.to_path_buf()
                }
            }
            _ => path.to_path_buf(),
        };
        Self { root }
    }

    /// The pack directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a normalized pointer to a path, refusing anything that resolves
    /// outside the pack directory through symlinks.
    fn resolve(&self, pointer: &str) -> PackResult<Option<PathBuf>> {
        let target = self.root.join(pointer);
        if !target.exists() {
            return Ok(None);
        }
        let root = canonical(&self.root)?;
        let resolved = canonical(&target)?;
        if !resolved.starts_with(&root) {
            return Err(PackError::PointerEscape {
                pointer: pointer.to_string(),
            });
        }
        Ok(Some(target))
    }
}

impl PackLoader for DirLoader {
    fn logical_name(&self) -> Option<String> {
        let root = canonical(&self.root).unwrap_or_else(|_| self.root.clone());
        root.file_name().map(|n| n.to_string_lossy().into_owned())
    }

    fn primary(&self) -> PackResult<String> {
        let path = self.root.join(PRIMARY_DOCUMENT);
        read_text(&path)?.ok_or(PackError::FileNotFound { path })
    }

    fn fragments(&self, pointer: &str) -> PackResult<Option<Vec<RawFragment>>> {
        let Some(target) = self.resolve(pointer)? else {
            return Ok(None);
        };

        if target.is_file() {
            return Ok(read_text(&target)?.map(|text| {
                vec![RawFragment {
                    name: pointer.to_string(),
                    text,
                }]
            }));
        }

        let entries = fs::read_dir(&target).map_err(|source| PackError::Read {
            path: target.clone(),
            source,
        })?;
        let mut files: Vec<(String, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!(path = %path.display(), "skipping file with non UTF-8 name");
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }
            files.push((file_name, path));
        }
        files.sort();

        let mut fragments = Vec::with_capacity(files.len());
        for (file_name, path) in files {
            let Some(text) = read_text(&path)? else {
                continue;
            };
            let name = if pointer.is_empty() {
                file_name
            } else {
                format!("{pointer}/{file_name}")
            };
            fragments.push(RawFragment { name, text });
        }

        Ok((!fragments.is_empty()).then_some(fragments))
    }

    fn guardrails(&self) -> PackResult<Option<String>> {
        for name in GUARDRAIL_DOCUMENTS {
            if let Some(text) = read_text(&self.root.join(name))? {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }
}

fn canonical(path: &Path) -> PackResult<PathBuf> {
    path.canonicalize().map_err(|source| PackError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a file, mapping absence to `None`. Invalid UTF-8 is replaced rather
/// than rejected so a stray byte surfaces as a parse issue.
fn read_text(path: &Path) -> PackResult<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PackError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Find every pack directory at or below `root`, sorted by path.
///
/// A directory holding `pack.yaml` is a pack; its subdirectories are
/// fragments, not further packs. Hidden directories are skipped.
pub fn discover_packs(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut packs = Vec::new();
    walk_for_packs(root, &mut packs)?;
    packs.sort();
    Ok(packs)
}

fn walk_for_packs(dir: &Path, packs: &mut Vec<PathBuf>) -> io::Result<()> {
    if dir.join(PRIMARY_DOCUMENT).is_file() {
        packs.push(dir.to_path_buf());
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if path.is_dir() && !hidden {
            walk_for_packs(&path, packs)?;
        }
    }
    Ok(())
}
