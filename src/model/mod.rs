pub mod detail;
pub mod work_item;
