pub mod cache;
pub mod headless;
pub mod surface;

pub use cache::{LayerCache, MonthLayer};
pub use headless::HeadlessMap;
pub use surface::{MapSurface, TileEvent, TileEventKind, TileRecord};
