mod admin_auth;
mod owner_auth;

pub use admin_auth::admin_auth;
pub use owner_auth::{OwnerContext, owner_auth};
