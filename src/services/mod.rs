// Decision pipeline
pub mod decision;
pub mod revenue;
pub mod sales_feed;

// Orchestration
pub mod applier;
pub mod sweep;
pub mod toggles;
pub mod undo;

// Shared catalog access and the storefront client
pub mod catalog;
pub mod storefront;
