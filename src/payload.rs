//! Node data payloads and payload-to-payload similarity.
//!
//! Payloads are a tagged union: plain values, byte sequences, string-keyed
//! mappings, and first-class numeric arrays with shape metadata. Similarity
//! dispatches on the variant pair and never fails; unknown pairs score 0.

use std::collections::BTreeMap;

use base64::Engine;

use crate::cosine_similarity;

/// Maximum length of the human-facing payload summary.
pub const SUMMARY_MAX_LEN: usize = 256;

/// The data payload carried by a node.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    /// No payload.
    None,
    /// UTF-8 text.
    Text(String),
    /// Raw byte sequence.
    Bytes(Vec<u8>),
    /// A single real number.
    Number(f64),
    /// String-keyed mapping with payload values.
    Mapping(BTreeMap<String, PayloadValue>),
    /// One-dimensional real array.
    Vector(Vec<f64>),
    /// N-dimensional real array stored flat, row-major, with its shape.
    Matrix {
        /// Extent of each dimension; the product equals `data.len()`.
        shape: Vec<usize>,
        /// Row-major elements.
        data: Vec<f64>,
    },
}

impl PayloadValue {
    /// Lowercase tag naming the variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            PayloadValue::None => "none",
            PayloadValue::Text(_) => "text",
            PayloadValue::Bytes(_) => "bytes",
            PayloadValue::Number(_) => "number",
            PayloadValue::Mapping(_) => "mapping",
            PayloadValue::Vector(_) => "vector",
            PayloadValue::Matrix { .. } => "matrix",
        }
    }

    /// Shape of a numeric array variant, `None` for everything else.
    pub fn shape(&self) -> Option<Vec<usize>> {
        match self {
            PayloadValue::Vector(v) => Some(vec![v.len()]),
            PayloadValue::Matrix { shape, .. } => Some(shape.clone()),
            _ => None,
        }
    }

    /// Flattened view of a numeric array variant.
    pub fn numeric_flat(&self) -> Option<&[f64]> {
        match self {
            PayloadValue::Vector(v) => Some(v),
            PayloadValue::Matrix { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Deterministic, untruncated, type-tagged representation.
    ///
    /// This string feeds the identity digest, so distinct payloads must not
    /// collide: the tag prefix keeps e.g. `None` and empty text apart.
    pub fn canonical_string(&self) -> String {
        match self {
            PayloadValue::None => "none".to_string(),
            PayloadValue::Text(s) => format!("text:{s}"),
            PayloadValue::Bytes(b) => format!(
                "bytes:{}",
                base64::engine::general_purpose::STANDARD.encode(b)
            ),
            PayloadValue::Number(n) => format!("number:{n}"),
            PayloadValue::Mapping(m) => {
                let inner: Vec<String> = m
                    .iter()
                    .map(|(k, v)| format!("{k}={}", v.canonical_string()))
                    .collect();
                format!("mapping:{{{}}}", inner.join(","))
            }
            PayloadValue::Vector(v) => format!("vector:{v:?}"),
            PayloadValue::Matrix { shape, data } => format!("matrix:{shape:?}:{data:?}"),
        }
    }

    /// Readable description for history entries and API responses,
    /// truncated to [`SUMMARY_MAX_LEN`] characters.
    pub fn summary(&self) -> String {
        let text = match self {
            PayloadValue::None => String::new(),
            PayloadValue::Text(s) => s.clone(),
            PayloadValue::Bytes(b) => format!("bytes len={}", b.len()),
            PayloadValue::Number(n) => n.to_string(),
            PayloadValue::Mapping(m) => {
                let inner: Vec<String> = m
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.summary()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            PayloadValue::Vector(v) => format!("vector shape=[{}]", v.len()),
            PayloadValue::Matrix { shape, .. } => format!("matrix shape={shape:?}"),
        };
        truncate_summary(text)
    }
}

fn truncate_summary(text: String) -> String {
    if text.chars().count() <= SUMMARY_MAX_LEN {
        return text;
    }
    let head: String = text.chars().take(SUMMARY_MAX_LEN - 3).collect();
    format!("{head}...")
}

/// Similarity of two payloads in [0, 1].
///
/// Rules, evaluated in order:
/// 1. Numeric arrays of equal shape: rescaled cosine of the flat data.
/// 2. Numeric arrays of differing shape: flatten both, then rule 1.
/// 3. Mappings: fraction of equal values over shared keys; two empty
///    mappings are identical (1), disjoint key sets score 0.
/// 4. Text/text or bytes/bytes: longest-common-subsequence ratio, with
///    bytes decoded as lossy UTF-8.
/// 5. Numbers: 1 when equal, else relative closeness.
/// 6. Anything else: structural equality.
pub fn similarity(a: &PayloadValue, b: &PayloadValue) -> f64 {
    match (a, b) {
        (x, y) if x.numeric_flat().is_some() && y.numeric_flat().is_some() => {
            // Equal-shape and flattened comparison coincide: cosine of the
            // flat data, 0 when the flattened lengths disagree.
            let fx = x.numeric_flat().unwrap_or(&[]);
            let fy = y.numeric_flat().unwrap_or(&[]);
            cosine_similarity(fx, fy)
        }
        (PayloadValue::Mapping(ma), PayloadValue::Mapping(mb)) => mapping_similarity(ma, mb),
        (PayloadValue::Text(x), PayloadValue::Text(y)) => string_similarity(x, y),
        (PayloadValue::Bytes(x), PayloadValue::Bytes(y)) => {
            let sx = String::from_utf8_lossy(x);
            let sy = String::from_utf8_lossy(y);
            string_similarity(&sx, &sy)
        }
        (PayloadValue::Number(x), PayloadValue::Number(y)) => number_similarity(*x, *y),
        _ => {
            if a == b {
                1.0
            } else {
                0.0
            }
        }
    }
}

fn mapping_similarity(a: &BTreeMap<String, PayloadValue>, b: &BTreeMap<String, PayloadValue>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared: Vec<&String> = a.keys().filter(|k| b.contains_key(*k)).collect();
    if shared.is_empty() {
        return 0.0;
    }
    let same = shared.iter().filter(|k| a.get(**k) == b.get(**k)).count();
    same as f64 / shared.len() as f64
}

fn number_similarity(a: f64, b: f64) -> f64 {
    if a == b {
        return 1.0;
    }
    let denom = a.abs().max(b.abs()).max(1.0);
    let diff = (a - b).abs() / denom;
    (1.0 - diff).max(0.0)
}

/// Longest-common-subsequence ratio over characters: `2·lcs / (|a| + |b|)`.
/// 1 iff the strings are equal; 0 when either is empty and they are not.
fn string_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let ca: Vec<char> = a.chars().collect();
    let cb: Vec<char> = b.chars().collect();
    let lcs = lcs_length(&ca, &cb);
    (2.0 * lcs as f64) / (ca.len() + cb.len()) as f64
}

fn lcs_length(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ch_a in a {
        for (j, &ch_b) in b.iter().enumerate() {
            curr[j + 1] = if ch_a == ch_b {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, PayloadValue)]) -> PayloadValue {
        PayloadValue::Mapping(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_vector_similarity_equal_shape() {
        let a = PayloadValue::Vector(vec![1.0, 0.0, 0.0]);
        let b = PayloadValue::Vector(vec![2.0, 0.0, 0.0]);
        assert!((similarity(&a, &b) - 1.0).abs() < 1e-12);

        let c = PayloadValue::Vector(vec![-1.0, 0.0, 0.0]);
        assert!(similarity(&a, &c).abs() < 1e-12);
    }

    #[test]
    fn test_matrix_vector_flattened() {
        let m = PayloadValue::Matrix {
            shape: vec![2, 2],
            data: vec![1.0, 2.0, 3.0, 4.0],
        };
        let v = PayloadValue::Vector(vec![1.0, 2.0, 3.0, 4.0]);
        assert!((similarity(&m, &v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_numeric_arrays_length_mismatch() {
        let a = PayloadValue::Vector(vec![1.0, 2.0]);
        let b = PayloadValue::Vector(vec![1.0, 2.0, 3.0]);
        assert_eq!(similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_zero_norm_vector_pair() {
        let a = PayloadValue::Vector(vec![0.0, 0.0]);
        let b = PayloadValue::Vector(vec![1.0, 1.0]);
        assert_eq!(similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_mapping_similarity() {
        let empty = mapping(&[]);
        assert_eq!(similarity(&empty, &empty), 1.0);

        let a = mapping(&[
            ("x", PayloadValue::Number(1.0)),
            ("y", PayloadValue::Text("hi".into())),
        ]);
        let b = mapping(&[
            ("x", PayloadValue::Number(1.0)),
            ("y", PayloadValue::Text("yo".into())),
        ]);
        assert!((similarity(&a, &b) - 0.5).abs() < 1e-12);

        let disjoint = mapping(&[("z", PayloadValue::Number(1.0))]);
        assert_eq!(similarity(&a, &disjoint), 0.0);
    }

    #[test]
    fn test_string_similarity() {
        let a = PayloadValue::Text("kitten".into());
        assert_eq!(similarity(&a, &a.clone()), 1.0);

        let b = PayloadValue::Text("sitting".into());
        // lcs("kitten", "sitting") = "ittn" -> 2*4 / 13
        assert!((similarity(&a, &b) - 8.0 / 13.0).abs() < 1e-12);

        let empty = PayloadValue::Text(String::new());
        assert_eq!(similarity(&a, &empty), 0.0);
    }

    #[test]
    fn test_bytes_lossy_decode() {
        let a = PayloadValue::Bytes(b"abc".to_vec());
        let b = PayloadValue::Bytes(b"abc".to_vec());
        assert_eq!(similarity(&a, &b), 1.0);

        let c = PayloadValue::Bytes(vec![0xff, 0xfe]);
        assert!(similarity(&a, &c) < 1.0);
    }

    #[test]
    fn test_number_similarity() {
        let a = PayloadValue::Number(10.0);
        assert_eq!(similarity(&a, &PayloadValue::Number(10.0)), 1.0);

        // |10-5| / max(10,5,1) = 0.5
        assert!((similarity(&a, &PayloadValue::Number(5.0)) - 0.5).abs() < 1e-12);

        // Distance dwarfs the magnitude floor.
        assert_eq!(
            similarity(&PayloadValue::Number(0.0), &PayloadValue::Number(100.0)),
            0.0
        );
    }

    #[test]
    fn test_cross_variant_fallback() {
        let t = PayloadValue::Text("1".into());
        let n = PayloadValue::Number(1.0);
        assert_eq!(similarity(&t, &n), 0.0);

        assert_eq!(similarity(&PayloadValue::None, &PayloadValue::None), 1.0);
        assert_eq!(similarity(&PayloadValue::None, &n), 0.0);
    }

    #[test]
    fn test_canonical_string_is_unambiguous() {
        assert_ne!(
            PayloadValue::None.canonical_string(),
            PayloadValue::Text(String::new()).canonical_string()
        );
        assert_ne!(
            PayloadValue::Text("1".into()).canonical_string(),
            PayloadValue::Number(1.0).canonical_string()
        );
    }

    #[test]
    fn test_summary_truncation() {
        let long = PayloadValue::Text("x".repeat(400));
        let s = long.summary();
        assert_eq!(s.chars().count(), SUMMARY_MAX_LEN);
        assert!(s.ends_with("..."));

        assert_eq!(PayloadValue::None.summary(), "");
        assert_eq!(
            PayloadValue::Bytes(vec![1, 2, 3]).summary(),
            "bytes len=3"
        );
    }
}
