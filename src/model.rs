use std::path::PathBuf;

use crate::foundation::error::{BoardError, BoardResult};

/// Layered board document as persisted by the reference editor.
///
/// Groups are stacked in order (first group at the bottom), and so are the layers inside a
/// group.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoardDocument {
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub groups: Vec<LayerGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<LayerRef>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerGroup {
    pub name: String,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    pub name: String,
    /// External image the layer content is linked to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub blend: BlendMode,
    #[serde(default = "full_opacity")]
    pub opacity: f32, // 0..1
    #[serde(default = "visible_by_default")]
    pub visible: bool,
}

fn full_opacity() -> f32 {
    1.0
}

fn visible_by_default() -> bool {
    true
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            blend: BlendMode::Normal,
            opacity: 1.0,
            visible: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[default]
    Pixels,
    Millimeters,
}

/// Index of a group inside a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct GroupRef(pub usize);

/// Index of a layer inside a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct LayerRef {
    pub group: usize,
    pub layer: usize,
}

impl BoardDocument {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            groups: Vec::new(),
            active: None,
        }
    }

    pub fn validate(&self) -> BoardResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(BoardError::validation(
                "document width/height must be > 0",
            ));
        }
        for group in &self.groups {
            for layer in &group.layers {
                if !(0.0..=1.0).contains(&layer.opacity) {
                    return Err(BoardError::validation(format!(
                        "layer '{}/{}' opacity must be within 0..=1",
                        group.name, layer.name
                    )));
                }
            }
        }
        if let Some(active) = self.active {
            self.layer(active)?;
        }
        Ok(())
    }

    pub fn group_mut(&mut self, group: GroupRef) -> BoardResult<&mut LayerGroup> {
        self.groups
            .get_mut(group.0)
            .ok_or_else(|| BoardError::editor_action(format!("no group #{}", group.0)))
    }

    pub fn layer(&self, at: LayerRef) -> BoardResult<&Layer> {
        self.groups
            .get(at.group)
            .and_then(|g| g.layers.get(at.layer))
            .ok_or_else(|| {
                BoardError::editor_action(format!("no layer #{}/#{}", at.group, at.layer))
            })
    }

    pub fn layer_mut(&mut self, at: LayerRef) -> BoardResult<&mut Layer> {
        self.groups
            .get_mut(at.group)
            .and_then(|g| g.layers.get_mut(at.layer))
            .ok_or_else(|| {
                BoardError::editor_action(format!("no layer #{}/#{}", at.group, at.layer))
            })
    }

    pub fn find_group(&self, name: &str) -> Option<&LayerGroup> {
        self.groups.iter().find(|g| g.name == name)
    }
}
