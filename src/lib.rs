pub mod commands;
pub mod database;
pub mod forecast;
pub mod model;
pub mod reports;
pub mod util;
