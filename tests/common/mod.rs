#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    path::{Path, PathBuf},
    rc::Rc,
};

use tempfile::TempDir;
use tourboard::{
    BlendMode, BoardDocument, BoardError, BoardResult, Config, DocId, DocumentEditor,
    EditorSession, ExportOptions, GroupRef, LayerRef, Subject, Unit,
    editor::{GroupInfo, LayerInfo, local::LocalSession},
    layout::Layout,
};

/// Temporary shared store with a config rooted in it.
pub struct Store {
    _tmp: TempDir,
    pub root: PathBuf,
    pub cfg: Config,
}

impl Store {
    pub fn new(subjects: &[&str]) -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().join("store");
        std::fs::create_dir_all(&root).unwrap();
        let cfg = Config::new(&root, subjects);
        Self {
            _tmp: tmp,
            root,
            cfg,
        }
    }

    pub fn subject(&self, name: &str) -> Subject {
        self.cfg.subject(name).unwrap()
    }

    pub fn layout(&self) -> Layout<'_> {
        Layout::new(&self.cfg)
    }

    /// Create `renderings/<batch>/` for `subject` with a small PNG per file name.
    pub fn batch(&self, subject: &str, batch: &str, files: &[&str]) -> PathBuf {
        let dir = self.root.join(subject).join("renderings").join(batch);
        std::fs::create_dir_all(&dir).unwrap();
        for f in files {
            write_png(&dir.join(f), 6, 3, [120, 130, 140, 255]);
        }
        dir
    }
}

pub fn write_png(path: &Path, w: u32, h: u32, px: [u8; 4]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image::RgbaImage::from_pixel(w, h, image::Rgba(px))
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

pub fn read_board(path: &Path) -> BoardDocument {
    let raw = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&raw).unwrap()
}

/// Sorted (relative path, bytes) of every file below `root`.
pub fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    fn walk(base: &Path, dir: &Path, out: &mut Vec<(PathBuf, Vec<u8>)>) {
        let Ok(rd) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in rd {
            let path = entry.unwrap().path();
            if path.is_dir() {
                out.push((path.strip_prefix(base).unwrap().to_path_buf(), Vec::new()));
                walk(base, &path, out);
            } else {
                out.push((
                    path.strip_prefix(base).unwrap().to_path_buf(),
                    std::fs::read(&path).unwrap(),
                ));
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

/// Editor whose sessions never attach.
pub struct UnavailableEditor;

impl DocumentEditor for UnavailableEditor {
    fn acquire(&self) -> BoardResult<Box<dyn EditorSession + '_>> {
        Err(BoardError::editor_unavailable("editor is not running"))
    }
}

/// Local editor that stops attaching after `ok_sessions` acquisitions.
pub struct FlakyEditor {
    pub ok_sessions: usize,
    pub acquired: Cell<usize>,
}

impl FlakyEditor {
    pub fn new(ok_sessions: usize) -> Self {
        Self {
            ok_sessions,
            acquired: Cell::new(0),
        }
    }
}

impl DocumentEditor for FlakyEditor {
    fn acquire(&self) -> BoardResult<Box<dyn EditorSession + '_>> {
        let n = self.acquired.get();
        self.acquired.set(n + 1);
        if n >= self.ok_sessions {
            return Err(BoardError::editor_unavailable("editor crashed"));
        }
        Ok(Box::new(LocalSession::default()))
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    pub opened: usize,
    pub created: usize,
    pub closed: usize,
    pub saves: usize,
    pub exports: usize,
}

/// Local editor that counts document lifecycle calls and can be told to fail saving or
/// exporting.
#[derive(Default)]
pub struct SpyEditor {
    pub stats: Rc<RefCell<Stats>>,
    pub fail_save: bool,
    pub fail_export: bool,
}

impl DocumentEditor for SpyEditor {
    fn acquire(&self) -> BoardResult<Box<dyn EditorSession + '_>> {
        Ok(Box::new(SpySession {
            inner: LocalSession::default(),
            stats: Rc::clone(&self.stats),
            fail_save: self.fail_save,
            fail_export: self.fail_export,
        }))
    }
}

struct SpySession {
    inner: LocalSession,
    stats: Rc<RefCell<Stats>>,
    fail_save: bool,
    fail_export: bool,
}

impl EditorSession for SpySession {
    fn set_unit(&mut self, unit: Unit) -> BoardResult<Unit> {
        self.inner.set_unit(unit)
    }

    fn create_document(&mut self, width: u32, height: u32, name: &str) -> BoardResult<DocId> {
        self.stats.borrow_mut().created += 1;
        self.inner.create_document(width, height, name)
    }

    fn open_document(&mut self, path: &Path) -> BoardResult<DocId> {
        let doc = self.inner.open_document(path)?;
        self.stats.borrow_mut().opened += 1;
        Ok(doc)
    }

    fn document_size(&self, doc: DocId) -> BoardResult<(u32, u32)> {
        self.inner.document_size(doc)
    }

    fn add_group(&mut self, doc: DocId, name: &str) -> BoardResult<GroupRef> {
        self.inner.add_group(doc, name)
    }

    fn add_layer(&mut self, doc: DocId, group: GroupRef, name: &str) -> BoardResult<LayerRef> {
        self.inner.add_layer(doc, group, name)
    }

    fn bind_image(&mut self, doc: DocId, layer: LayerRef, image: &Path) -> BoardResult<()> {
        self.inner.bind_image(doc, layer, image)
    }

    fn set_blend(
        &mut self,
        doc: DocId,
        layer: LayerRef,
        mode: BlendMode,
        opacity: f32,
    ) -> BoardResult<()> {
        self.inner.set_blend(doc, layer, mode, opacity)
    }

    fn set_active_layer(&mut self, doc: DocId, layer: LayerRef) -> BoardResult<()> {
        self.inner.set_active_layer(doc, layer)
    }

    fn groups(&self, doc: DocId) -> BoardResult<Vec<GroupInfo>> {
        self.inner.groups(doc)
    }

    fn layers(&self, doc: DocId, group: GroupRef) -> BoardResult<Vec<LayerInfo>> {
        self.inner.layers(doc, group)
    }

    fn save(&mut self, doc: DocId) -> BoardResult<()> {
        if self.fail_save {
            return Err(BoardError::editor_action("disk full"));
        }
        self.stats.borrow_mut().saves += 1;
        self.inner.save(doc)
    }

    fn save_as(&mut self, doc: DocId, path: &Path) -> BoardResult<()> {
        if self.fail_save {
            return Err(BoardError::editor_action("disk full"));
        }
        self.stats.borrow_mut().saves += 1;
        self.inner.save_as(doc, path)
    }

    fn export_flattened(
        &mut self,
        doc: DocId,
        path: &Path,
        opts: &ExportOptions,
    ) -> BoardResult<()> {
        if self.fail_export {
            return Err(BoardError::editor_action("encoder crashed"));
        }
        self.stats.borrow_mut().exports += 1;
        self.inner.export_flattened(doc, path, opts)
    }

    fn close(&mut self, doc: DocId) -> BoardResult<()> {
        self.inner.close(doc)?;
        self.stats.borrow_mut().closed += 1;
        Ok(())
    }
}
