pub mod mutation;
pub mod portfolio;
pub mod price;
pub mod query;
pub mod selection;
pub mod session;
pub mod settings;
pub mod ticker;
