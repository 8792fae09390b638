// Review enrichment pipeline: extraction, merge, and the enrichment stages

pub mod clean;
pub mod extract;
pub mod merge;
pub mod month_select;
pub mod orchestrator;
pub mod sentiment;
pub mod topics;
