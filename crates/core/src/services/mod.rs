pub mod history_service;
pub mod portfolio_service;
pub mod selection_service;
pub mod session_service;
