pub mod config;
pub mod input;
pub mod menu;
pub mod utils;

pub use config::Config;
pub use menu::{MenuHost, MenuId, MenuSession};
