pub mod bucket;
pub mod suggestion_category;
