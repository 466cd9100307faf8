use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;

/// Discover documents from the given paths, respecting .gitignore plus the
/// `--include` / `--exclude` glob options. Directly named files bypass the
/// filters.
pub fn discover_files(
    paths: &[PathBuf],
    include: &[String],
    exclude: &[String],
) -> Result<Vec<PathBuf>> {
    let include_set = build_include_set(include)?;
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            files.extend(walk_directory(path, include_set.as_ref(), exclude)?);
        } else {
            anyhow::bail!("path does not exist: {}", path.display());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn build_include_set(include: &[String]) -> Result<Option<GlobSet>> {
    if include.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in include {
        let glob =
            Glob::new(pattern).with_context(|| format!("invalid include pattern: {pattern}"))?;
        builder.add(glob);
    }
    Ok(Some(builder.build().context("failed to build include set")?))
}

fn walk_directory(
    dir: &Path,
    include: Option<&GlobSet>,
    exclude: &[String],
) -> Result<Vec<PathBuf>> {
    let mut builder = WalkBuilder::new(dir);
    builder.hidden(true).git_ignore(true).git_global(true);

    if !exclude.is_empty() {
        let mut overrides = OverrideBuilder::new(dir);
        for pattern in exclude {
            // ignore crate overrides: prefix with ! to exclude
            overrides
                .add(&format!("!{pattern}"))
                .with_context(|| format!("invalid exclude pattern: {pattern}"))?;
        }
        let overrides = overrides.build().context("failed to build overrides")?;
        builder.overrides(overrides);
    }

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = entry.context("error walking directory")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let included = match include {
            Some(set) => {
                set.is_match(path)
                    || path
                        .file_name()
                        .is_some_and(|name| set.is_match(Path::new(name)))
            }
            None => true,
        };
        if included {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}
