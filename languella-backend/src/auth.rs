use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: uuid::Uuid, // subject (user id)
    pub exp: usize,      // expiry
}

/// Validate a Supabase access token and return its claims.
pub fn verify_jwt(token: &str) -> Result<Claims, ApiError> {
    let jwt_secret =
        std::env::var("SUPABASE_JWT_SECRET").map_err(|_| ApiError::Config("SUPABASE_JWT_SECRET"))?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&["authenticated"]);

    let decoding_key = DecodingKey::from_secret(jwt_secret.as_ref());

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(token_data) => Ok(token_data.claims),
        Err(_) => Err(ApiError::Unauthenticated),
    }
}
