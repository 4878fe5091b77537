pub mod group;
pub mod palette;
pub mod placement;
pub mod point_cache;
pub mod pool;
pub mod ranges;
pub mod runtime;
pub mod scene;
pub mod scheduler;
pub mod settings;
pub mod visual;

pub use group::{GroupSource, LayerKind, PassContext, PassError, PassReport, VisualizationGroup};
pub use palette::{DiscretePalettes, PaletteProvider, Rgb};
pub use placement::{HeightScale, LogHeightScale, OriginMode, OriginTrack, PlacementEngine};
pub use point_cache::{PointDataCache, PointSample, TimestepMatch};
pub use pool::{EntityId, EntityState, PoolConfig, PoolStats, Progress, VisualPool};
pub use ranges::{RangeError, RangeMode, VariableRange, VariableRangeRegistry};
pub use runtime::{FrameUpdate, TickReport, Visualization};
pub use scene::{EntityHandle, PrefabKind, RecordingScene, Scene, SceneCounters, SceneSnapshot};
pub use scheduler::{PlaybackState, SchedulerState, TimestepScheduler};
pub use settings::{GroupSettings, LoadedData, RangeSetting, Settings};
pub use visual::VisualKind;
