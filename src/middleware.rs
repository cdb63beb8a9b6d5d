use actix_cors::Cors;

/// Permissive CORS; the server sits behind the game gateway, which enforces
/// origin rules.
pub fn cors_middleware() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}
