pub mod animation;
pub mod background;
pub mod bounds;
pub mod camera;
pub mod config;
pub mod constants;
pub mod engine;
pub mod entries;
pub mod error;
pub mod events;
pub mod grid;
pub mod input;
pub mod model;
pub mod progress;
pub mod projection;
pub mod recovery;
pub mod scene;
pub mod spin;

pub static SCENE_WGSL: &str = include_str!("../shaders/scene.wgsl");

pub use config::{EngineConfig, SectionConfig, Tuning};
pub use engine::{AnchorRect, CatalogEngine, PageSurface, ScrollSource};
pub use entries::{ModelRequest, ProductItem};
pub use error::{CatalogError, Result};
pub use events::{EngineEvent, SubscriptionId};
pub use grid::{OverlayData, OverlayRect};
pub use model::ModelData;
pub use progress::{ProgressEvent, ProgressMeter, ProgressPhase};
pub use projection::Viewport;
