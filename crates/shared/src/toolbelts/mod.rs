pub mod archivist;
pub mod calculator;
pub mod github;
pub mod weather;

pub use archivist::Archivist;
pub use calculator::Calculator;
pub use github::GitHub;
pub use weather::Weather;
