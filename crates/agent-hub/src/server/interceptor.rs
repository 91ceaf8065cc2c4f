//! Bearer token extraction shared by the gRPC stream handler and the UI push
//! bridge's SSE endpoint.

use tonic::metadata::MetadataMap;
use tonic::Status;

use crate::auth::{Claims, JwtManager};

/// Extract and validate the bearer token from `authorization` metadata.
///
/// Used directly inside `StreamMessages`'s `AwaitingAuth` phase rather than
/// as a blanket `tonic` interceptor, because `RegisterAgent` on the same
/// service must remain unauthenticated — it is how an agent obtains a token
/// in the first place.
pub fn authenticate(metadata: &MetadataMap, jwt: &JwtManager) -> Result<Claims, Status> {
    let token = metadata
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| Status::unauthenticated("Missing authorization header"))?;

    jwt.validate(token)
        .map_err(|_| Status::unauthenticated("Invalid or expired token"))
}
