//! 메트릭 이름별 advisory lock 키.

/// FNV-1a 64비트 해시
pub fn fnv1a_64(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// `pg_advisory_xact_lock(int4, int4)`에 넘길 두 키 (상위/하위 32비트)
pub fn advisory_lock_keys(name: &str) -> (i32, i32) {
    let hash = fnv1a_64(name.as_bytes());
    ((hash >> 32) as u32 as i32, hash as u32 as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_known_vectors() {
        assert_eq!(fnv1a_64(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63dc4c8601ec8c);
        assert_eq!(fnv1a_64(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn keys_are_hash_halves() {
        let (hi, lo) = advisory_lock_keys("foobar");
        assert_eq!(hi as u32, 0x85944171);
        assert_eq!(lo as u32, 0xf73967e8);
    }

    #[test]
    fn same_name_same_keys() {
        assert_eq!(advisory_lock_keys("hits"), advisory_lock_keys("hits"));
        assert_ne!(advisory_lock_keys("hits"), advisory_lock_keys("cpu"));
    }
}
