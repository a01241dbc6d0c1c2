// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod forms;
pub mod ids;
pub mod model;
pub mod normalize;
pub mod platform;
pub mod registry;
pub mod source;
pub mod state;

pub use forms::*;
pub use ids::*;
pub use model::*;
pub use normalize::*;
pub use platform::*;
pub use registry::*;
pub use source::*;
pub use state::*;
