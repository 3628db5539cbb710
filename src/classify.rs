use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use crate::{foundation::error::BoardResult, scan};

/// Kind of render pass a file holds, and the layer it becomes inside a composite.
///
/// Ordering is the layer stacking order: base at the bottom, glare on top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Base,
    Ambient,
    Glare,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Base, Role::Ambient, Role::Glare];

    /// Layer name used inside composite role-groups.
    pub fn layer_name(self) -> &'static str {
        match self {
            Role::Base => "base",
            Role::Ambient => "ambient",
            Role::Glare => "glare",
        }
    }

    pub fn from_layer_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.layer_name() == name)
    }

    /// Map the middle segment of an overlay file (`door.Glare.png`) to its role.
    pub fn from_pass(segment: &str) -> Option<Self> {
        match segment.to_ascii_lowercase().as_str() {
            "ambient_occlusion" | "ambient" => Some(Role::Ambient),
            "glare" => Some(Role::Glare),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.layer_name())
    }
}

/// How a single file name is interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Base { key: String },
    Overlay { key: String, role: Role },
    /// Pass name that is not a known role. Stands in for the base when the batch has no
    /// plain `<key>.<ext>` file.
    UnknownPass { key: String, pass: String },
    /// Unexpected shape; not part of any asset.
    Ignored,
}

pub fn classify_name(name: &str) -> Classification {
    let segments: Vec<&str> = name.split('.').collect();
    match segments.as_slice() {
        [key, _ext] if !key.is_empty() => Classification::Base {
            key: key.to_string(),
        },
        [key, pass, _, ..] if !key.is_empty() => match Role::from_pass(pass) {
            Some(role) => Classification::Overlay {
                key: key.to_string(),
                role,
            },
            None => Classification::UnknownPass {
                key: key.to_string(),
                pass: pass.to_string(),
            },
        },
        _ => Classification::Ignored,
    }
}

/// All passes of one rendered view, keyed by role.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderedAsset {
    pub key: String,
    pub files: BTreeMap<Role, PathBuf>,
}

impl RenderedAsset {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            files: BTreeMap::new(),
        }
    }

    pub fn with(mut self, role: Role, path: impl Into<PathBuf>) -> Self {
        self.files.insert(role, path.into());
        self
    }

    pub fn get(&self, role: Role) -> Option<&Path> {
        self.files.get(&role).map(PathBuf::as_path)
    }

    pub fn base(&self) -> Option<&Path> {
        self.get(Role::Base)
    }

    /// Present roles in stacking order.
    pub fn roles(&self) -> impl Iterator<Item = (Role, &Path)> {
        self.files.iter().map(|(r, p)| (*r, p.as_path()))
    }
}

pub type AssetMap = BTreeMap<String, RenderedAsset>;

/// Group the files of a batch directory into rendered assets.
#[tracing::instrument(skip(batch_dir), fields(dir = %batch_dir.display()))]
pub fn classify(batch_dir: &Path) -> BoardResult<AssetMap> {
    let mut out = AssetMap::new();
    let mut fallback_bases: BTreeMap<String, PathBuf> = BTreeMap::new();
    for path in scan::list_files(batch_dir)? {
        let name = scan::file_name_of(&path);
        let (key, role) = match classify_name(&name) {
            Classification::Base { key } => (key, Role::Base),
            Classification::Overlay { key, role } => (key, role),
            Classification::UnknownPass { key, pass } => {
                tracing::debug!(%name, %pass, "unrecognized render pass, candidate base");
                fallback_bases.entry(key).or_insert(path);
                continue;
            }
            Classification::Ignored => {
                tracing::debug!(%name, "ignoring file with unexpected name");
                continue;
            }
        };
        tracing::debug!(%name, %role, "found render file");
        let asset = out
            .entry(key.clone())
            .or_insert_with(|| RenderedAsset::new(key));
        if let Some(prev) = asset.files.insert(role, path) {
            tracing::warn!(
                prev = %prev.display(),
                %name,
                "duplicate {role} pass, keeping the later file"
            );
        }
    }
    // A plain `<key>.<ext>` file always wins over an unrecognized pass.
    for (key, path) in fallback_bases {
        let asset = out
            .entry(key.clone())
            .or_insert_with(|| RenderedAsset::new(key));
        if asset.base().is_none() {
            tracing::debug!(key = %asset.key, file = %path.display(), "using as base pass");
            asset.files.insert(Role::Base, path);
        }
    }
    tracing::debug!(count = out.len(), "collected rendered assets");
    Ok(out)
}

/// Overview of a batch directory, as printed by `--info`.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchSummary {
    pub batch: PathBuf,
    pub base_count: usize,
    pub keys: Vec<String>,
    /// Distinct middle segments of multi-pass files, recognized or not.
    pub extra_passes: Vec<String>,
}

pub fn summarize(batch_dir: &Path) -> BoardResult<BatchSummary> {
    let mut summary = BatchSummary {
        batch: batch_dir.to_path_buf(),
        ..BatchSummary::default()
    };
    for path in scan::list_files(batch_dir)? {
        let name = scan::file_name_of(&path);
        let segments: Vec<&str> = name.split('.').collect();
        match segments.as_slice() {
            [key, _ext] => {
                summary.base_count += 1;
                summary.keys.push(key.to_string());
            }
            [_, pass, _, ..] => {
                if !summary.extra_passes.iter().any(|p| p == pass) {
                    summary.extra_passes.push(pass.to_string());
                }
            }
            _ => {}
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_classify_by_segment_count_and_pass() {
        assert_eq!(
            classify_name("window.png"),
            Classification::Base {
                key: "window".to_string()
            }
        );
        assert_eq!(
            classify_name("door.Ambient_Occlusion.png"),
            Classification::Overlay {
                key: "door".to_string(),
                role: Role::Ambient
            }
        );
        assert_eq!(
            classify_name("door.glare.exr.png"),
            Classification::Overlay {
                key: "door".to_string(),
                role: Role::Glare
            }
        );
        assert_eq!(
            classify_name("door.base123.png"),
            Classification::UnknownPass {
                key: "door".to_string(),
                pass: "base123".to_string()
            }
        );
        assert_eq!(classify_name("README"), Classification::Ignored);
    }

    #[test]
    fn layer_names_round_trip_to_roles() {
        for role in Role::ALL {
            assert_eq!(Role::from_layer_name(role.layer_name()), Some(role));
        }
        assert_eq!(Role::from_layer_name("Ambient_Occlusion"), None);
    }

    #[test]
    fn roles_iterate_in_stacking_order() {
        let asset = RenderedAsset::new("door")
            .with(Role::Glare, "g.png")
            .with(Role::Base, "b.png")
            .with(Role::Ambient, "a.png");
        let order: Vec<Role> = asset.roles().map(|(r, _)| r).collect();
        assert_eq!(order, vec![Role::Base, Role::Ambient, Role::Glare]);
    }
}
