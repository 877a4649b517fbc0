pub mod documents;
pub mod health;
pub mod messages;
pub mod search;
