use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque per-run token: UTC wall-clock time plus a random hex suffix.
///
/// Every server-side resource created during a run derives its identifier
/// from this token (`u`, `f`, `r` prefixes), so two runs never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let suffix: u32 = rng.gen_range(0..0x0100_0000);
        Self(format!("{}{suffix:06x}", now.format("%Y%m%d%H%M%S")))
    }

    /// Wrap an existing token (replays, tests).
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn universe_id(&self) -> String {
        format!("u{}", self.0)
    }

    pub fn field_list_id(&self) -> String {
        format!("f{}", self.0)
    }

    pub fn request_id(&self) -> String {
        format!("r{}", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_id_is_timestamp_plus_six_hex() {
        let now = Utc.with_ymd_and_hms(2023, 6, 15, 9, 30, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let id = SessionId::generate(now, &mut rng);
        assert!(id.as_str().starts_with("20230615093000"));
        let suffix = &id.as_str()[14..];
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn resource_ids_share_the_token() {
        let id = SessionId::from_token("20230615093000abcdef");
        assert_eq!(id.universe_id(), "u20230615093000abcdef");
        assert_eq!(id.field_list_id(), "f20230615093000abcdef");
        assert_eq!(id.request_id(), "r20230615093000abcdef");
    }

    #[test]
    fn different_seeds_give_different_ids() {
        let now = Utc.with_ymd_and_hms(2023, 6, 15, 9, 30, 0).unwrap();
        let a = SessionId::generate(now, &mut StdRng::seed_from_u64(1));
        let b = SessionId::generate(now, &mut StdRng::seed_from_u64(2));
        assert_ne!(a, b);
    }
}
