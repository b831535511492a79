pub mod price_change;
pub mod priced_item;
pub mod pricing_config;
pub mod pricing_run;
pub mod sale_record;
pub mod store;

pub use price_change::PriceAction;
pub use pricing_config::AutomationState;
