//! Common imports from external crates.

pub use anyhow::{ensure, Context, Error, Result};
pub use chrono::Local;
pub use futures::future::FutureExt;
pub use itertools::Itertools;
pub use roi_data_layer::{
    BlankImageSource, ExampleStore, FastRcnnBuilder, InputSlot, LayerConfig, LayerParams,
    RoiDataLayer,
};
pub use serde::{Deserialize, Serialize};
pub use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
pub use tracing::{debug, info, info_span, trace_span, warn};

pub type Fallible<T> = Result<T, Error>;
