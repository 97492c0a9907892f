//! Hint files: rules turning voxel intensities into graph weights
//!
//! ```text
//! # vertex rules
//! V <intensity|*> <weight>
//! # edge rules, matched on the unordered intensity pair
//! E <intensity1|*> <intensity2|*> <weight>
//! ```
//!
//! A weight is an integer, `U a b` (uniform in `[a, b]`) or `N mean sd`
//! (normal). Later rules override earlier ones. A vertex weight of zero
//! keeps the voxel out of the graph.

use std::path::Path;
use std::str::FromStr;

use rand::Rng;
use rand_distr::StandardNormal;
use voxpart_common::{Error, Result};

use crate::graph::MAX_WEIGHT;

/// Which intensities a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntensityPattern {
    Any,
    Exactly(i16),
}

impl IntensityPattern {
    fn matches(self, intensity: i16) -> bool {
        match self {
            IntensityPattern::Any => true,
            IntensityPattern::Exactly(v) => v == intensity,
        }
    }
}

/// How a weight is produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightSpec {
    Constant(i32),
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, sd: f64 },
}

impl WeightSpec {
    fn sample<R: Rng + ?Sized>(self, rng: &mut R) -> i32 {
        let value = match self {
            WeightSpec::Constant(w) => return w.min(MAX_WEIGHT),
            WeightSpec::Uniform { low, high } => rng.gen_range(low..=high),
            WeightSpec::Normal { mean, sd } => mean + sd * rng.sample::<f64, _>(StandardNormal),
        };
        (value.round() as i32).min(MAX_WEIGHT)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct VertexRule {
    intensity: IntensityPattern,
    weight: WeightSpec,
}

#[derive(Debug, Clone, PartialEq)]
struct EdgeRule {
    a: IntensityPattern,
    b: IntensityPattern,
    weight: WeightSpec,
}

/// Parsed hint file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightRules {
    vertex: Vec<VertexRule>,
    edge: Vec<EdgeRule>,
}

impl WeightRules {
    /// Load rules from a hint file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    /// True when the file held no rule at all
    pub fn is_empty(&self) -> bool {
        self.vertex.is_empty() && self.edge.is_empty()
    }

    /// Weight of a voxel with the given intensity; `<= 0` means excluded
    pub fn vertex_weight<R: Rng + ?Sized>(&self, intensity: i16, rng: &mut R) -> i32 {
        self.vertex
            .iter()
            .rev()
            .find(|r| r.intensity.matches(intensity))
            .map(|r| r.weight.sample(rng))
            .unwrap_or(if intensity != 0 { 1 } else { 0 })
    }

    /// Weight of an edge between two intensities; `<= 0` means no edge
    pub fn edge_weight<R: Rng + ?Sized>(&self, i1: i16, i2: i16, rng: &mut R) -> i32 {
        self.edge
            .iter()
            .rev()
            .find(|r| {
                (r.a.matches(i1) && r.b.matches(i2)) || (r.a.matches(i2) && r.b.matches(i1))
            })
            .map(|r| r.weight.sample(rng))
            .unwrap_or(1)
    }
}

impl FromStr for WeightRules {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let mut rules = WeightRules::default();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let fail = |message: String| Error::HintFile {
                line: line_no,
                message,
            };
            let mut tokens = line.split_whitespace();

            match tokens.next() {
                Some("V") => {
                    let intensity = parse_pattern(tokens.next()).map_err(fail)?;
                    let weight = parse_weight(&mut tokens).map_err(fail)?;
                    rules.vertex.push(VertexRule { intensity, weight });
                }
                Some("E") => {
                    let a = parse_pattern(tokens.next()).map_err(fail)?;
                    let b = parse_pattern(tokens.next()).map_err(fail)?;
                    let weight = parse_weight(&mut tokens).map_err(fail)?;
                    rules.edge.push(EdgeRule { a, b, weight });
                }
                Some(other) => return Err(fail(format!("unknown rule '{other}'"))),
                None => continue,
            }

            if let Some(extra) = tokens.next() {
                return Err(Error::HintFile {
                    line: line_no,
                    message: format!("unexpected token '{extra}'"),
                });
            }
        }

        Ok(rules)
    }
}

fn parse_pattern(token: Option<&str>) -> std::result::Result<IntensityPattern, String> {
    match token {
        Some("*") => Ok(IntensityPattern::Any),
        Some(t) => t
            .parse::<i16>()
            .map(IntensityPattern::Exactly)
            .map_err(|_| format!("invalid intensity '{t}'")),
        None => Err("missing intensity".to_string()),
    }
}

fn parse_number(token: Option<&str>) -> std::result::Result<f64, String> {
    let t = token.ok_or_else(|| "missing number".to_string())?;
    match t.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("invalid number '{t}'")),
    }
}

fn parse_weight<'a, I>(tokens: &mut I) -> std::result::Result<WeightSpec, String>
where
    I: Iterator<Item = &'a str>,
{
    match tokens.next() {
        Some("U") => {
            let low = parse_number(tokens.next())?;
            let high = parse_number(tokens.next())?;
            if low > high {
                return Err(format!("uniform range {low} > {high}"));
            }
            if !(high - low).is_finite() {
                return Err(format!("uniform range {low} {high} is too wide"));
            }
            Ok(WeightSpec::Uniform { low, high })
        }
        Some("N") => {
            let mean = parse_number(tokens.next())?;
            let sd = parse_number(tokens.next())?;
            if sd < 0.0 {
                return Err(format!("negative standard deviation {sd}"));
            }
            Ok(WeightSpec::Normal { mean, sd })
        }
        Some(t) => t
            .parse::<i32>()
            .map(WeightSpec::Constant)
            .map_err(|_| format!("invalid weight '{t}'")),
        None => Err("missing weight".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_defaults_without_rules() {
        let rules = WeightRules::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(rules.vertex_weight(0, &mut rng), 0);
        assert_eq!(rules.vertex_weight(12, &mut rng), 1);
        assert_eq!(rules.edge_weight(3, 4, &mut rng), 1);
    }

    #[test]
    fn test_later_rules_override_earlier() {
        let rules: WeightRules = "V * 2\nV 5 7\n".parse().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(rules.vertex_weight(5, &mut rng), 7);
        assert_eq!(rules.vertex_weight(6, &mut rng), 2);

        let rules: WeightRules = "V 5 7\nV * 2\n".parse().unwrap();
        assert_eq!(rules.vertex_weight(5, &mut rng), 2);
    }

    #[test]
    fn test_edge_rules_are_symmetric() {
        let rules: WeightRules = "E 1 2 9\n".parse().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(rules.edge_weight(1, 2, &mut rng), 9);
        assert_eq!(rules.edge_weight(2, 1, &mut rng), 9);
        assert_eq!(rules.edge_weight(1, 1, &mut rng), 1);
    }

    #[test]
    fn test_random_weights_stay_in_range() {
        let rules: WeightRules = "# comment line\nV * U 3 5   # trailing comment\nE * * N 10 0\n"
            .parse()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let w = rules.vertex_weight(1, &mut rng);
            assert!((3..=5).contains(&w));
        }
        assert_eq!(rules.edge_weight(1, 1, &mut rng), 10);
    }

    #[test]
    fn test_weights_capped() {
        let rules: WeightRules = "V * 5000\n".parse().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(rules.vertex_weight(1, &mut rng), MAX_WEIGHT);
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = "V * 1\nX 1 2\n".parse::<WeightRules>().unwrap_err();
        match err {
            Error::HintFile { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other:?}"),
        }

        assert!("V abc 1".parse::<WeightRules>().is_err());
        assert!("V * U 5 3".parse::<WeightRules>().is_err());
        assert!("E 1 2".parse::<WeightRules>().is_err());
        assert!("V 1 2 3".parse::<WeightRules>().is_err());
    }

    #[test]
    fn test_overflowing_uniform_range_rejected() {
        let err = "V * U -1e308 1e308".parse::<WeightRules>().unwrap_err();
        assert!(matches!(err, Error::HintFile { line: 1, .. }), "{err}");

        let err = "V * 1\nE * * U -1e308 1e308\n"
            .parse::<WeightRules>()
            .unwrap_err();
        assert!(matches!(err, Error::HintFile { line: 2, .. }), "{err}");

        // wide but representable ranges still sample within the cap
        let rules: WeightRules = "V * U -1e300 1e300".parse().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            assert!(rules.vertex_weight(1, &mut rng) <= MAX_WEIGHT);
        }
    }

    #[test]
    fn test_comment_only_file_is_empty() {
        let rules: WeightRules = "# nothing here\n\n".parse().unwrap();
        assert!(rules.is_empty());
        let rules: WeightRules = "E * * 2\n".parse().unwrap();
        assert!(!rules.is_empty());
    }
}
