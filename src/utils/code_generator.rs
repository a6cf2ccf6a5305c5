use rand::Rng;
use uuid::Uuid;

/// Opaque token printed as a QR code, e.g. `STU-3f2a...`.
pub fn generate_qr_token(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// Numeric suffix appended to generated usernames.
pub fn generate_numeric_suffix() -> String {
    let mut rng = rand::thread_rng();
    format!("{:03}", rng.gen_range(0..1000))
}
