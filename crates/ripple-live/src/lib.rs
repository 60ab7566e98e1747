// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

//! Live-query collections (spec §4.12): a collection whose sync driver is a
//! compiled query pipeline, kept up to date by mirroring its source
//! collections' changes straight through that pipeline.

mod error;
mod live;

pub use error::{Error, Result};
pub use live::LiveQuery;
