pub mod gate;
pub mod password;
pub mod permissions;
pub mod token;

pub use gate::{AuthError, AuthGate, IdentityStore};
pub use password::{PasswordError, PasswordHasher};
pub use permissions::{PermissionResolver, PgPermissionResolver, StaticGrants};
pub use token::{Claims, JwtError, TokenCodec};
