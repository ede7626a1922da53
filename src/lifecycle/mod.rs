pub mod aggregation;
pub mod models;
pub mod orchestrator;
pub mod transitions;

#[cfg(test)]
mod tests;
