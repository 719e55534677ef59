use rand::Rng;

/// Короткий случайный идентификатор (16 hex символов)
pub fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 8]>())
}
