pub mod expense;
pub mod session;

pub use expense::{ExpenseSubmission, Profile, UploadResult};
pub use session::{Session, SessionId, TokenSet};
