pub mod api;
pub mod client;
pub mod codes;
pub mod dashboard;
pub mod model;
pub mod prediction;
pub mod record;
pub mod report;
