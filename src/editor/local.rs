use std::{
    collections::BTreeMap,
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::{
    editor::{
        DocId, DocumentEditor, EditorSession, ExportOptions, GroupInfo, LayerInfo, blend,
    },
    foundation::error::{BoardError, BoardResult},
    model::{BlendMode, BoardDocument, GroupRef, Layer, LayerGroup, LayerRef, Unit},
};

/// Group/layer name used when a plain image is opened as a document.
const RASTER_LAYER: &str = "image";

/// File-backed editor: documents are JSON [`BoardDocument`]s, previews are JPEGs composited
/// with [`blend::flatten_document`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalEditor;

impl LocalEditor {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentEditor for LocalEditor {
    fn acquire(&self) -> BoardResult<Box<dyn EditorSession + '_>> {
        tracing::debug!("attached local editor");
        Ok(Box::new(LocalSession::default()))
    }
}

struct OpenDoc {
    doc: BoardDocument,
    path: Option<PathBuf>,
}

#[derive(Default)]
pub struct LocalSession {
    unit: Unit,
    docs: BTreeMap<DocId, OpenDoc>,
    next_id: u64,
}

impl LocalSession {
    fn insert(&mut self, doc: BoardDocument, path: Option<PathBuf>) -> DocId {
        let id = DocId(self.next_id);
        self.next_id += 1;
        self.docs.insert(id, OpenDoc { doc, path });
        id
    }

    fn get(&self, id: DocId) -> BoardResult<&OpenDoc> {
        self.docs
            .get(&id)
            .ok_or_else(|| BoardError::editor_action(format!("document {id:?} is not open")))
    }

    fn get_mut(&mut self, id: DocId) -> BoardResult<&mut OpenDoc> {
        self.docs
            .get_mut(&id)
            .ok_or_else(|| BoardError::editor_action(format!("document {id:?} is not open")))
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }
}

impl Drop for LocalSession {
    fn drop(&mut self) {
        if !self.docs.is_empty() {
            tracing::debug!(
                count = self.docs.len(),
                "releasing session with open documents"
            );
        }
    }
}

fn action<T>(r: anyhow::Result<T>) -> BoardResult<T> {
    r.map_err(|e| BoardError::editor_action(format!("{e:#}")))
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

fn doc_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_board(path: &Path) -> anyhow::Result<BoardDocument> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("open '{}'", path.display()))?;
    let doc: BoardDocument =
        serde_json::from_str(&raw).with_context(|| format!("parse '{}'", path.display()))?;
    doc.validate()?;
    Ok(doc)
}

fn raster_document(path: &Path) -> anyhow::Result<BoardDocument> {
    let (width, height) = image::image_dimensions(path)
        .with_context(|| format!("read image size of '{}'", path.display()))?;
    let mut doc = BoardDocument::new(doc_name(path), width, height);
    doc.groups.push(LayerGroup {
        name: RASTER_LAYER.to_string(),
        layers: vec![Layer {
            source: Some(path.to_path_buf()),
            ..Layer::new(RASTER_LAYER)
        }],
    });
    Ok(doc)
}

impl EditorSession for LocalSession {
    fn set_unit(&mut self, unit: Unit) -> BoardResult<Unit> {
        Ok(std::mem::replace(&mut self.unit, unit))
    }

    fn create_document(&mut self, width: u32, height: u32, name: &str) -> BoardResult<DocId> {
        if self.unit != Unit::Pixels {
            return Err(BoardError::editor_action(
                "documents can only be created with pixel units",
            ));
        }
        let doc = BoardDocument::new(name, width, height);
        doc.validate()?;
        tracing::debug!(name, width, height, "created document");
        Ok(self.insert(doc, None))
    }

    fn open_document(&mut self, path: &Path) -> BoardResult<DocId> {
        let (doc, saved_path) = if image::ImageFormat::from_path(path).is_ok() {
            (action(raster_document(path))?, None)
        } else {
            (action(read_board(path))?, Some(path.to_path_buf()))
        };
        tracing::debug!(path = %path.display(), "opened document");
        Ok(self.insert(doc, saved_path))
    }

    fn document_size(&self, doc: DocId) -> BoardResult<(u32, u32)> {
        let d = &self.get(doc)?.doc;
        Ok((d.width, d.height))
    }

    fn add_group(&mut self, doc: DocId, name: &str) -> BoardResult<GroupRef> {
        let d = &mut self.get_mut(doc)?.doc;
        d.groups.push(LayerGroup {
            name: name.to_string(),
            layers: Vec::new(),
        });
        Ok(GroupRef(d.groups.len() - 1))
    }

    fn add_layer(&mut self, doc: DocId, group: GroupRef, name: &str) -> BoardResult<LayerRef> {
        let g = self.get_mut(doc)?.doc.group_mut(group)?;
        g.layers.push(Layer::new(name));
        Ok(LayerRef {
            group: group.0,
            layer: g.layers.len() - 1,
        })
    }

    fn bind_image(&mut self, doc: DocId, layer: LayerRef, image: &Path) -> BoardResult<()> {
        if !image.is_file() {
            return Err(BoardError::editor_action(format!(
                "cannot link missing image '{}'",
                image.display()
            )));
        }
        self.get_mut(doc)?.doc.layer_mut(layer)?.source = Some(image.to_path_buf());
        Ok(())
    }

    fn set_blend(
        &mut self,
        doc: DocId,
        layer: LayerRef,
        mode: BlendMode,
        opacity: f32,
    ) -> BoardResult<()> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(BoardError::editor_action(format!(
                "opacity {opacity} out of range"
            )));
        }
        let l = self.get_mut(doc)?.doc.layer_mut(layer)?;
        l.blend = mode;
        l.opacity = opacity;
        Ok(())
    }

    fn set_active_layer(&mut self, doc: DocId, layer: LayerRef) -> BoardResult<()> {
        let d = &mut self.get_mut(doc)?.doc;
        d.layer(layer)?;
        d.active = Some(layer);
        Ok(())
    }

    fn groups(&self, doc: DocId) -> BoardResult<Vec<GroupInfo>> {
        Ok(self
            .get(doc)?
            .doc
            .groups
            .iter()
            .enumerate()
            .map(|(i, g)| GroupInfo {
                id: GroupRef(i),
                name: g.name.clone(),
            })
            .collect())
    }

    fn layers(&self, doc: DocId, group: GroupRef) -> BoardResult<Vec<LayerInfo>> {
        let g = self
            .get(doc)?
            .doc
            .groups
            .get(group.0)
            .ok_or_else(|| BoardError::editor_action(format!("no group #{}", group.0)))?;
        Ok(g.layers
            .iter()
            .enumerate()
            .map(|(i, l)| LayerInfo {
                id: LayerRef {
                    group: group.0,
                    layer: i,
                },
                name: l.name.clone(),
            })
            .collect())
    }

    fn save(&mut self, doc: DocId) -> BoardResult<()> {
        let open = self.get(doc)?;
        let Some(path) = open.path.clone() else {
            return Err(BoardError::editor_action(format!(
                "document '{}' has no file yet; use save-as",
                open.doc.name
            )));
        };
        self.save_as(doc, &path)
    }

    fn save_as(&mut self, doc: DocId, path: &Path) -> BoardResult<()> {
        let open = self.get_mut(doc)?;
        open.doc.validate()?;
        let json = serde_json::to_string_pretty(&open.doc)
            .map_err(|e| BoardError::serde(format!("serialize document: {e}")))?;
        action(ensure_parent_dir(path))?;
        action(
            std::fs::write(path, json).with_context(|| format!("write '{}'", path.display())),
        )?;
        open.path = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "saved document");
        Ok(())
    }

    fn export_flattened(
        &mut self,
        doc: DocId,
        path: &Path,
        opts: &ExportOptions,
    ) -> BoardResult<()> {
        let flat = blend::flatten_document(&self.get(doc)?.doc, opts.matte)?;
        action(ensure_parent_dir(path))?;
        action((|| {
            let f = File::create(path).with_context(|| format!("create '{}'", path.display()))?;
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(BufWriter::new(f), opts.quality);
            encoder
                .encode_image(&flat)
                .with_context(|| format!("encode jpeg '{}'", path.display()))?;
            Ok(())
        })())?;
        tracing::debug!(path = %path.display(), "exported flattened preview");
        Ok(())
    }

    fn close(&mut self, doc: DocId) -> BoardResult<()> {
        self.docs
            .remove(&doc)
            .map(|_| ())
            .ok_or_else(|| BoardError::editor_action(format!("document {doc:?} is not open")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path, w: u32, h: u32, px: [u8; 4]) {
        image::RgbaImage::from_pixel(w, h, image::Rgba(px))
            .save(path)
            .unwrap();
    }

    #[test]
    fn opening_an_image_reports_its_size() {
        let tmp = tempfile::tempdir().unwrap();
        let png = tmp.path().join("door.png");
        write_png(&png, 6, 3, [1, 2, 3, 255]);

        let editor = LocalEditor::new();
        let mut session = editor.acquire().unwrap();
        let doc = session.open_document(&png).unwrap();
        assert_eq!(session.document_size(doc).unwrap(), (6, 3));
        assert!(session.save(doc).is_err());
        session.close(doc).unwrap();
        assert!(session.close(doc).is_err());
    }

    #[test]
    fn unit_switch_returns_previous_and_guards_creation() {
        let mut session = LocalSession::default();
        assert_eq!(session.set_unit(Unit::Millimeters).unwrap(), Unit::Pixels);
        assert!(session.create_document(4, 4, "x").is_err());
        assert_eq!(session.set_unit(Unit::Pixels).unwrap(), Unit::Millimeters);
        assert!(session.create_document(4, 4, "x").is_ok());
        assert_eq!(session.unit(), Unit::Pixels);
    }

    #[test]
    fn saved_document_reopens_with_same_structure() {
        let tmp = tempfile::tempdir().unwrap();
        let png = tmp.path().join("door.png");
        write_png(&png, 2, 2, [9, 9, 9, 255]);
        let board = tmp.path().join("out").join("door.board");

        let mut session = LocalSession::default();
        let doc = session.create_document(2, 2, "door").unwrap();
        let g = session.add_group(doc, "content").unwrap();
        let l = session.add_layer(doc, g, "base").unwrap();
        session.bind_image(doc, l, &png).unwrap();
        session
            .set_blend(doc, l, BlendMode::Multiply, 0.5)
            .unwrap();
        session.set_active_layer(doc, l).unwrap();
        session.save_as(doc, &board).unwrap();
        session.close(doc).unwrap();

        let doc = session.open_document(&board).unwrap();
        let groups = session.groups(doc).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "content");
        let layers = session.layers(doc, groups[0].id).unwrap();
        assert_eq!(layers[0].name, "base");
        session.save(doc).unwrap();

        let reread = read_board(&board).unwrap();
        assert_eq!(reread.groups[0].layers[0].blend, BlendMode::Multiply);
        assert_eq!(reread.groups[0].layers[0].source.as_deref(), Some(png.as_path()));
        assert_eq!(reread.active, Some(l));
    }

    #[test]
    fn binding_a_missing_image_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = LocalSession::default();
        let doc = session.create_document(2, 2, "door").unwrap();
        let g = session.add_group(doc, "content").unwrap();
        let l = session.add_layer(doc, g, "base").unwrap();
        let err = session
            .bind_image(doc, l, &tmp.path().join("missing.png"))
            .unwrap_err();
        assert!(matches!(err, BoardError::EditorActionFailed(_)));
    }

    #[test]
    fn export_writes_a_jpeg_of_document_size() {
        let tmp = tempfile::tempdir().unwrap();
        let png = tmp.path().join("door.png");
        write_png(&png, 8, 4, [200, 10, 10, 255]);
        let jpg = tmp.path().join("JPEG").join("door.jpg");

        let mut session = LocalSession::default();
        let doc = session.open_document(&png).unwrap();
        session
            .export_flattened(
                doc,
                &jpg,
                &ExportOptions {
                    quality: 90,
                    matte: [255, 255, 255],
                },
            )
            .unwrap();
        assert_eq!(image::image_dimensions(&jpg).unwrap(), (8, 4));
    }
}
