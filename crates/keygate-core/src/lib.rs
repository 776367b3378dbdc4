pub mod auth;
pub mod error;
pub mod hasher;
pub mod permission;
pub mod secret;
pub mod service;
pub mod token;

pub use auth::{
    AuthError, AuthState, AuthType, PermissionGate, Principal, api_key_auth, combined_auth,
    jwt_auth, require_permissions,
};
pub use error::{ApiError, ApiKeyError};
pub use hasher::{BcryptHasher, CredentialHasher, HashError};
pub use permission::{
    EmptyDirectory, MemoryPermissionDirectory, PermissionDirectory, PermissionSnapshot,
};
pub use secret::{PREFIX_LEN, SECRET_BYTES, SecretError, generate_secret, prefix_of};
pub use service::{ApiKeyService, ExpiryPolicy, IssuedKey, KeyPatch};
pub use token::{Claims, TokenError, TokenService};
