//! Comparable sort values extracted from entity payloads.
//!
//! [`SortValue`] is the totally ordered, hashable value produced by comparator
//! and section-key extractors. The authoritative order is:
//!
//! 1. booleans (`false` < `true`)
//! 2. numbers (integers and doubles compare numerically)
//! 3. text (lexicographic by Unicode scalar values)
//! 4. null — absent or non-scalar keys sort after every non-null value
//!
//! Doubles are ordered with [`f64::total_cmp`], so the order is total even in
//! the presence of NaN. Integers and doubles that denote the same number
//! compare equal and hash identically.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// SortValue
// ---------------------------------------------------------------------------

/// A comparable value extracted from an entity payload.
///
/// Null is the "absent key" marker and sorts after all non-null values, so
/// entities missing a sort key cluster at the end of an ascending run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SortValue {
    /// Absent, JSON null, or a non-scalar (array/object) key.
    Null,
    /// A boolean key.
    Bool(bool),
    /// An integer key.
    Int(i64),
    /// A double-precision key.
    Float(f64),
    /// A text key.
    Text(String),
}

impl SortValue {
    /// Convert a JSON value into a `SortValue`.
    ///
    /// Arrays and objects are not meaningful sort keys and map to
    /// [`SortValue::Null`].
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_i64().map_or_else(
                || n.as_f64().map_or(Self::Null, Self::Float),
                Self::Int,
            ),
            Value::String(s) => Self::Text(s.clone()),
            Value::Null | Value::Array(_) | Value::Object(_) => Self::Null,
        }
    }

    /// Extract a top-level field of a payload as a `SortValue`.
    ///
    /// A missing field maps to [`SortValue::Null`].
    #[must_use]
    pub fn field(payload: &Value, name: &str) -> Self {
        payload.get(name).map_or(Self::Null, Self::from_json)
    }

    /// Build a text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Whether this is the null (absent) value.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Variant rank used as the first ordering criterion.
    const fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int(_) | Self::Float(_) => 1,
            Self::Text(_) => 2,
            Self::Null => 3,
        }
    }

}

/// Exact order of an integer against a double.
///
/// Never collapses the integer to `f64`: adjacent integers above 2^53 round
/// to the same double, which would make distinct values compare equal and
/// break transitivity. Instead the double is ranged against the `i64` domain
/// and truncated, so every comparison is exact. NaN follows the `total_cmp`
/// convention (negative NaN below everything, positive NaN above), and the
/// integer zero sits with `+0.0`, above `-0.0`, again matching `total_cmp`.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if f >= TWO_POW_63 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }
    // In range: the truncation is exact.
    #[allow(clippy::cast_possible_truncation)]
    let whole = f.trunc() as i64;
    match i.cmp(&whole) {
        Ordering::Equal if f.fract() > 0.0 => Ordering::Less,
        Ordering::Equal if f.fract() < 0.0 => Ordering::Greater,
        Ordering::Equal if f == 0.0 && f.is_sign_negative() => Ordering::Greater,
        ord => ord,
    }
}

impl Ord for SortValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Int(a), Self::Float(b)) => cmp_int_float(*a, *b),
            (Self::Float(a), Self::Int(b)) => cmp_int_float(*b, *a).reverse(),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for SortValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortValue {}

impl Hash for SortValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            // Numeric variants hash the double's bit pattern. Int(n) and
            // Float(f) compare equal only when f exactly equals n, in which
            // case `n as f64` is lossless and yields the same bits; unequal
            // large integers that round to a shared double merely collide.
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => (*i as f64).to_bits().hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for SortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;
    use serde_json::json;

    // -----------------------------------------------------------------------
    // Extraction
    // -----------------------------------------------------------------------

    #[test]
    fn from_json_scalars() {
        assert_eq!(SortValue::from_json(&json!(true)), SortValue::Bool(true));
        assert_eq!(SortValue::from_json(&json!(3)), SortValue::Int(3));
        assert_eq!(SortValue::from_json(&json!(2.5)), SortValue::Float(2.5));
        assert_eq!(SortValue::from_json(&json!("x")), SortValue::text("x"));
        assert_eq!(SortValue::from_json(&json!(null)), SortValue::Null);
    }

    #[test]
    fn non_scalar_keys_map_to_null() {
        assert_eq!(SortValue::from_json(&json!([1, 2])), SortValue::Null);
        assert_eq!(SortValue::from_json(&json!({"a": 1})), SortValue::Null);
    }

    #[test]
    fn field_extraction_handles_missing() {
        let payload = json!({"tag": 7});
        assert_eq!(SortValue::field(&payload, "tag"), SortValue::Int(7));
        assert_eq!(SortValue::field(&payload, "absent"), SortValue::Null);
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn nulls_sort_after_everything() {
        for v in [
            SortValue::Bool(true),
            SortValue::Int(i64::MAX),
            SortValue::Float(f64::INFINITY),
            SortValue::text("zzz"),
        ] {
            assert!(v < SortValue::Null, "{v} should sort before null");
        }
    }

    #[test]
    fn numbers_compare_across_variants() {
        assert!(SortValue::Int(1) < SortValue::Float(1.5));
        assert!(SortValue::Float(0.5) < SortValue::Int(1));
        assert_eq!(SortValue::Int(2), SortValue::Float(2.0));
    }

    #[test]
    fn large_integers_compare_exactly() {
        // Adjacent large i64 values collapse to the same f64; same-variant
        // comparison must still distinguish them.
        let a = SortValue::Int(i64::MAX - 1);
        let b = SortValue::Int(i64::MAX);
        assert!(a < b);
    }

    #[test]
    fn mixed_numeric_order_is_exact_above_f64_precision() {
        // 2^63 is the nearest double to both of these integers; collapsing
        // the integer side to f64 would call all three equal.
        let below = SortValue::Int(i64::MAX - 1);
        let max = SortValue::Int(i64::MAX);
        let two_pow_63 = SortValue::Float(9_223_372_036_854_775_808.0);

        assert!(below < max);
        assert!(max < two_pow_63);
        assert!(below < two_pow_63);
        assert_ne!(max, two_pow_63);
        assert!(SortValue::Float(-9_223_372_036_854_775_808.0) <= SortValue::Int(i64::MIN));
        assert!(SortValue::Float(-1e19) < SortValue::Int(i64::MIN));
    }

    #[test]
    fn fractional_floats_sit_between_adjacent_integers() {
        assert!(SortValue::Int(2) < SortValue::Float(2.5));
        assert!(SortValue::Float(2.5) < SortValue::Int(3));
        assert!(SortValue::Int(-3) < SortValue::Float(-2.5));
        assert!(SortValue::Float(-2.5) < SortValue::Int(-2));
    }

    #[test]
    fn zero_signs_order_consistently_across_variants() {
        // total_cmp puts -0.0 below +0.0; the integer zero joins +0.0 so
        // the mixed order stays transitive.
        assert!(SortValue::Float(-0.0) < SortValue::Int(0));
        assert_eq!(SortValue::Int(0), SortValue::Float(0.0));
        assert!(SortValue::Float(-0.0) < SortValue::Float(0.0));
    }

    #[test]
    fn nan_has_a_total_order() {
        let nan = SortValue::Float(f64::NAN);
        assert_eq!(nan.cmp(&nan), Ordering::Equal);
        assert!(SortValue::Float(f64::INFINITY) < nan);
    }

    #[test]
    fn ordering_is_transitive_across_ranks() {
        let a = SortValue::Bool(true);
        let b = SortValue::Int(0);
        let c = SortValue::text("");
        let d = SortValue::Null;
        assert!(a < b && b < c && c < d);
        assert!(a < c && a < d && b < d);
    }

    // -----------------------------------------------------------------------
    // Hash/eq consistency
    // -----------------------------------------------------------------------

    #[test]
    fn equal_numerics_hash_identically() {
        use std::collections::hash_map::DefaultHasher;

        let hash = |v: &SortValue| {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&SortValue::Int(4)), hash(&SortValue::Float(4.0)));
    }

    #[test]
    fn usable_as_hash_map_key() {
        use std::collections::HashMap;

        let mut m = HashMap::new();
        m.insert(SortValue::Int(1), "one");
        assert_eq!(m.get(&SortValue::Float(1.0)), Some(&"one"));
    }

    // -----------------------------------------------------------------------
    // Serde round-trip
    // -----------------------------------------------------------------------

    #[test]
    fn serde_roundtrip() {
        let v = SortValue::text("section-a");
        let json = serde_json::to_string(&v).unwrap();
        let parsed: SortValue = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, v);
    }
}
