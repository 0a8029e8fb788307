pub mod clock;
pub mod experts;
pub mod models;
pub mod prompt;
pub mod sources;
pub mod sqlite;
