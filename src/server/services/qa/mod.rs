pub mod controller;
pub mod prompt;
pub mod types;
pub mod validator;

pub use controller::QaController;
pub use types::{ErrorCode, QaAnswer, QaResponse, ValidRequest};
pub use validator::{QaValidator, ValidationError};
