//! Pointwise mutual information over co-occurrence edges

use std::collections::{BTreeMap, HashMap};

use crate::types::{EdgeKey, Pattern};

/// PMI of one edge: `ln((c/T) / ((ca/T) * (cb/T)))`, 0 when undefined
pub fn edge_pmi(joint: u64, count_a: u64, count_b: u64, total_tokens: u64) -> f64 {
    if joint == 0 || count_a == 0 || count_b == 0 || total_tokens == 0 {
        return 0.0;
    }
    let t = total_tokens as f64;
    let p_joint = joint as f64 / t;
    let p_a = count_a as f64 / t;
    let p_b = count_b as f64 / t;
    (p_joint / (p_a * p_b)).ln()
}

/// Mean PMI over each pattern's edges; patterns without edges are absent (0)
pub fn mean_pmi(
    patterns: &BTreeMap<String, Pattern>,
    edges: &BTreeMap<EdgeKey, u64>,
    total_tokens: u64,
) -> HashMap<String, f64> {
    let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();

    for (key, &joint) in edges {
        let (Some(a), Some(b)) = (patterns.get(key.a()), patterns.get(key.b())) else {
            continue;
        };
        let pmi = edge_pmi(joint, a.count, b.count, total_tokens);
        for text in [key.a(), key.b()] {
            let entry = sums.entry(text).or_insert((0.0, 0));
            entry.0 += pmi;
            entry.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(text, (sum, n))| (text.to_string(), sum / n as f64))
        .collect()
}
