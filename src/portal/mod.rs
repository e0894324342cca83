pub mod endpoints;
pub mod history;
pub mod navigator;
pub mod snapshot;
