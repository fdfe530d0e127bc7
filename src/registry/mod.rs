pub mod directory;
pub mod login;
pub mod registration;
pub mod validation;

pub use directory::Directory;
pub use login::{LoginOutcome, LoginService};
pub use registration::Registrar;
pub use validation::{RegistrationRequest, StudentUpdateRequest};
