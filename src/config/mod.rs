pub mod loader;
pub mod options;
pub mod validator;

pub use loader::*;
pub use options::*;
pub use validator::*;
