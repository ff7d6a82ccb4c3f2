mod config;
mod data_io;
mod driver;
mod error;
mod extract;
mod pacing;
mod paginate;
mod reconcile;
mod runtime;
mod scheduler;
mod session;
mod site;
#[cfg(test)]
mod testing;
mod types;
mod webdriver;

pub use runtime::run;
