// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod admin;
pub mod chart;
pub mod error;
pub mod explorer;
pub mod fetch;
pub mod filters;
pub mod ids;
pub mod model;
pub mod navigation;
pub mod pagination;
pub mod query;
pub mod search;
pub mod service;
pub mod sort;
pub mod state;

pub use admin::*;
pub use chart::*;
pub use error::*;
pub use explorer::*;
pub use fetch::*;
pub use filters::*;
pub use ids::*;
pub use model::*;
pub use navigation::*;
pub use pagination::*;
pub use query::*;
pub use search::*;
pub use service::*;
pub use sort::*;
pub use state::*;
