//! tourboard assembles layered render boards from versioned render batches and promotes the
//! flattened results into panorama tours on a shared store.
//!
//! # Pipeline overview
//!
//! 1. **Allocate**: `renderings/<YYMMDD>v<index>` batch directories for the renderer to fill
//!    ([`version`]).
//! 2. **Classify**: group the files of the latest batch into [`RenderedAsset`]s, one base pass
//!    plus optional overlay passes per view ([`classify`]).
//! 3. **Compose**: build or update layered composite artifacts through a
//!    [`DocumentEditor`] session and export flattened JPEG previews ([`composite`],
//!    [`update`]).
//! 4. **Promote**: run the panorama tool over the previews and swap the result into the
//!    subject's tour with a backup ([`promote`]).
//!
//! Everything is sequential and blocking. Configuration is an explicit [`Config`] passed by
//! reference; there is no global state.
#![forbid(unsafe_code)]

pub mod classify;
pub mod composite;
pub mod editor;
pub mod foundation;
pub mod layout;
pub mod model;
pub mod pipeline;
pub mod promote;
pub mod scan;
pub mod update;
pub mod version;

pub use classify::{AssetMap, BatchSummary, Classification, RenderedAsset, Role};
pub use composite::{BACKGROUND_GROUP, CONTENT_GROUP, CompositeBuilder};
pub use editor::{DocId, DocumentEditor, EditorSession, ExportOptions, local::LocalEditor};
pub use foundation::config::{ALL_SUBJECTS, Config, PreviewConfig, Subject};
pub use foundation::error::{BoardError, BoardResult};
pub use layout::Layout;
pub use model::{BlendMode, BoardDocument, GroupRef, Layer, LayerGroup, LayerRef, Unit};
pub use promote::{
    Confirm, KrpanoTool, PanoramaTool, PromotionFlow, PromotionReport, PromotionState,
    PromotionWorkflow,
};
pub use update::CompositeUpdater;
