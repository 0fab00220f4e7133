//! Process wide sharing of small well-known attribute values.
//!
//! ORIGIN, MULTI_EXIT_DISC, LOCAL_PREF and ATOMIC_AGGREGATE take only a few
//! distinct values in practice. Their packed values are interned here so
//! that equal attributes share one allocation, and an attribute parsed from
//! a message does not keep the whole message buffer alive.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use bytes::Bytes;

/// Upper bound on the number of interned values.
///
/// MED and LOCAL_PREF can take any 32 bit value. Once the cache is full,
/// new values are passed through unshared.
const MAX_ENTRIES: usize = 1 << 16;

type Cache = Mutex<HashMap<(u8, Bytes), Bytes>>;

static CACHE: OnceLock<Cache> = OnceLock::new();

/// Returns whether values of this attribute type code are interned.
pub fn is_cached_type(type_code: u8) -> bool {
    matches!(type_code, 1 | 4 | 5 | 6)
}

/// Returns the shared instance for `value`.
///
/// For type codes that are not cached, `value` is returned unchanged.
pub fn intern(type_code: u8, value: Bytes) -> Bytes {
    if !is_cached_type(type_code) {
        return value;
    }
    let cache = CACHE.get_or_init(Default::default);
    // The map is always left consistent, a panic elsewhere while holding
    // the lock does not make it unusable.
    let mut map = cache.lock().unwrap_or_else(|e| e.into_inner());

    let key = (type_code, value);
    if let Some(shared) = map.get(&key) {
        return shared.clone();
    }
    if map.len() >= MAX_ENTRIES {
        return key.1;
    }
    let shared = Bytes::copy_from_slice(&key.1);
    map.insert((type_code, shared.clone()), shared.clone());
    shared
}

/// Returns the number of interned values.
pub fn len() -> usize {
    CACHE.get().map_or(0, |c| {
        c.lock().unwrap_or_else(|e| e.into_inner()).len()
    })
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use octseq::Parser;
    use crate::bgp::message::SessionConfig;
    use crate::bgp::path_attributes::{PathAttribute, PaMap};
    use crate::bgp::types::{LocalPref, OriginType};

    #[test]
    fn shared_instances() {
        let a = intern(1, Bytes::from(vec![2]));
        let b = intern(1, Bytes::from(vec![2]));
        assert_eq!(a.as_ptr(), b.as_ptr());
        assert!(len() >= 1);

        // not cached
        let c = Bytes::from(vec![0, 0, 0, 1]);
        let ptr = c.as_ptr();
        assert_eq!(intern(8, c).as_ptr(), ptr);
    }

    #[test]
    fn decoded_origin_is_shared() {
        let raw = Bytes::from_static(&[0x40, 0x01, 0x01, 0x01]);
        let first = PathAttribute::parse(&mut Parser::from_ref(&raw)).unwrap();
        let raw2 = Bytes::copy_from_slice(&raw);
        let second = PathAttribute::parse(
            &mut Parser::from_ref(&raw2)
        ).unwrap();
        assert_eq!(first.value().as_ptr(), second.value().as_ptr());
        // and not a slice of either message
        assert_ne!(first.value().as_ptr(), raw[3..].as_ptr());

        let config = SessionConfig::modern();
        let mut map = PaMap::empty();
        map.set(OriginType::Egp, &config).unwrap();
        assert_eq!(
            map.attribute(first.typ()).unwrap().value().as_ptr(),
            first.value().as_ptr()
        );

        // equal values still compare equal regardless of sharing
        let lp = PathAttribute::new(&LocalPref(100), &config).unwrap();
        assert_eq!(lp, PathAttribute::new(&LocalPref(100), &config).unwrap());
    }
}
