pub mod alerts;
pub mod notify;
pub mod pages;
