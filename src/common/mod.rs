pub mod auth;
pub mod models;
pub mod state;
pub mod views;

#[cfg(test)]
mod tests;
