use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

/// Generates a human-readable order number, e.g. `MP-20260805-7Q2XKD`. Random enough that numbers are never reused;
/// uniqueness is still enforced by the store.
pub fn new_order_number() -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix: String =
        rand::thread_rng().sample_iter(&Alphanumeric).take(6).map(|c| (c as char).to_ascii_uppercase()).collect();
    format!("MP-{date}-{suffix}")
}

/// Generates the opaque public order identifier (32 hex chars).
pub fn new_order_id() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_numbers_have_the_expected_shape() {
        let n = new_order_number();
        assert!(n.starts_with("MP-"));
        assert_eq!(n.len(), "MP-20260805-XXXXXX".len());
    }

    #[test]
    fn order_ids_are_32_hex_chars() {
        let id = new_order_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
