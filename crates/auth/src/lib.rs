//! `stockroom-auth`: bearer-token identity and role-based access policy.
//!
//! No HTTP and no storage here; the API layer feeds raw tokens in and gets a
//! verified principal plus permission checks back.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod policy;
pub mod roles;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use policy::permissions_for_roles;
pub use roles::Role;
