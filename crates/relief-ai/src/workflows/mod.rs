pub mod catalog;
pub mod encoding;
pub mod feedback;
pub mod hazards;
pub mod matching;
pub mod notifications;
pub mod resources;
pub mod sites;
