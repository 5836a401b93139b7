// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod codec;
pub mod filter;
pub mod format;
pub mod forms;
pub mod ids;
pub mod model;
pub mod render;
pub mod schema;
pub mod session;
pub mod source;
pub mod state;

pub use codec::{Codec, DataMap, DateRange, EditValue, PLACEHOLDER};
pub use filter::*;
pub use format::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use render::{Control, Input, Mode, RenderContext, SelectOption, Widget};
pub use schema::*;
pub use session::*;
pub use source::*;
pub use state::*;
