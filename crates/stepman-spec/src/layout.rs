//! Materialized collection tree schema.
//!
//! Layout:
//! ```text
//! <collection_root>/
//!   steplib.yml  Optional collection manifest
//!   steps/
//!     <step-id>/
//!       assets/  Ignored
//!       <version>/
//!         step.yml  Step descriptor
//! ```
//!
//! Every path into a collection tree is built here; nothing else joins
//! collection-relative paths by hand.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SpecError};

/// Directory holding one subdirectory per step.
pub const STEPS_DIR: &str = "steps";

/// Descriptor file name inside a version directory.
pub const DESCRIPTOR_FILE: &str = "step.yml";

/// Collection manifest file name at the collection root.
pub const COLLECTION_MANIFEST_FILE: &str = "steplib.yml";

/// Per-step directory that holds icons etc., never a version.
const ASSETS_DIR: &str = "assets";

/// A materialized collection tree rooted at a directory.
#[derive(Debug, Clone)]
pub struct CollectionLayout {
    root: PathBuf,
}

/// A descriptor found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLocation {
    pub id: String,
    pub version: String,
    pub descriptor_path: PathBuf,
}

impl CollectionLayout {
    /// Create a layout rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CollectionLayout { root: root.into() }
    }

    /// Get the collection root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn steps_dir(&self) -> PathBuf {
        self.root.join(STEPS_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(COLLECTION_MANIFEST_FILE)
    }

    /// Directory of one step version.
    ///
    /// `id` and `version` must each name exactly one visible directory.
    pub fn step_dir(&self, id: &str, version: &str) -> Result<PathBuf> {
        check_component("step id", id)?;
        check_component("version", version)?;
        Ok(self.steps_dir().join(id).join(version))
    }

    /// Descriptor path of one step version.
    pub fn descriptor_path(&self, id: &str, version: &str) -> Result<PathBuf> {
        Ok(self.step_dir(id, version)?.join(DESCRIPTOR_FILE))
    }

    /// Walk the tree and list every step descriptor, sorted by id then version.
    ///
    /// A missing `steps/` directory is an empty collection. A version
    /// directory without a descriptor is a layout error.
    pub fn discover(&self) -> Result<Vec<StepLocation>> {
        let steps_dir = self.steps_dir();
        if !steps_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for id in list_subdirs(&steps_dir, &[])? {
            let step_root = steps_dir.join(&id);
            for version in list_subdirs(&step_root, &[ASSETS_DIR])? {
                let descriptor_path = self.descriptor_path(&id, &version)?;
                if !descriptor_path.is_file() {
                    return Err(SpecError::MalformedLayout {
                        path: step_root.join(&version),
                        detail: format!("missing {DESCRIPTOR_FILE}"),
                    });
                }
                found.push(StepLocation {
                    id: id.clone(),
                    version,
                    descriptor_path,
                });
            }
        }

        found.sort_by(|a, b| (&a.id, &a.version).cmp(&(&b.id, &b.version)));
        Ok(found)
    }
}

/// Whether `value` is one normal, non-hidden path component.
pub fn is_path_component(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !value.starts_with('.')
        && !value.contains(['/', '\\'])
}

fn check_component(kind: &'static str, value: &str) -> Result<()> {
    if is_path_component(value) {
        Ok(())
    } else {
        Err(SpecError::InvalidComponent {
            kind,
            value: value.to_string(),
        })
    }
}

/// Names of visible subdirectories, skipping `ignored`.
fn list_subdirs(dir: &Path, ignored: &[&str]) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| SpecError::io(dir, e))? {
        let entry = entry.map_err(|e| SpecError::io(dir, e))?;
        if !entry.path().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            return Err(SpecError::MalformedLayout {
                path: entry.path(),
                detail: "directory name is not valid UTF-8".to_string(),
            });
        };
        if name.starts_with('.') || ignored.contains(&name.as_str()) {
            continue;
        }
        names.push(name);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_step(root: &Path, id: &str, version: &str) {
        let dir = root.join(STEPS_DIR).join(id).join(version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(DESCRIPTOR_FILE), "title: x\n").unwrap();
    }

    #[test]
    fn paths_follow_schema() {
        let layout = CollectionLayout::new("/lib");
        assert_eq!(
            layout.descriptor_path("script", "1.0.0").unwrap(),
            PathBuf::from("/lib/steps/script/1.0.0/step.yml")
        );
        assert_eq!(layout.manifest_path(), PathBuf::from("/lib/steplib.yml"));
    }

    #[test]
    fn paths_reject_nested_and_relative_components() {
        let layout = CollectionLayout::new("/lib");
        for version in ["release/1.0", "../../../escaped", "..", ".", ".hidden", ""] {
            let err = layout.descriptor_path("script", version).unwrap_err();
            assert!(
                matches!(err, SpecError::InvalidComponent { kind: "version", .. }),
                "{version:?} accepted"
            );
        }
        assert!(layout.step_dir("a/b", "1.0.0").is_err());
        assert!(layout.step_dir("script", "v1.0.0-rc.1").is_ok());
    }

    #[test]
    fn discover_sorted_steps() {
        let dir = tempfile::tempdir().unwrap();
        touch_step(dir.path(), "zip", "1.0.0");
        touch_step(dir.path(), "script", "1.1.0");
        touch_step(dir.path(), "script", "1.0.0");

        let found = CollectionLayout::new(dir.path()).discover().unwrap();
        let pairs: Vec<(&str, &str)> = found
            .iter()
            .map(|l| (l.id.as_str(), l.version.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("script", "1.0.0"), ("script", "1.1.0"), ("zip", "1.0.0")]
        );
    }

    #[test]
    fn discover_skips_assets_hidden_and_files() {
        let dir = tempfile::tempdir().unwrap();
        touch_step(dir.path(), "script", "1.0.0");
        let step_root = dir.path().join("steps/script");
        std::fs::create_dir_all(step_root.join("assets")).unwrap();
        std::fs::write(step_root.join("assets/icon.svg"), "<svg/>").unwrap();
        std::fs::create_dir_all(dir.path().join("steps/.git")).unwrap();
        std::fs::write(dir.path().join("steps/README.md"), "readme").unwrap();

        let found = CollectionLayout::new(dir.path()).discover().unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn missing_steps_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CollectionLayout::new(dir.path()).discover().unwrap().is_empty());
    }

    #[test]
    fn version_without_descriptor_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("steps/script/1.0.0")).unwrap();

        let err = CollectionLayout::new(dir.path()).discover().unwrap_err();
        assert!(matches!(err, SpecError::MalformedLayout { .. }));
    }
}
