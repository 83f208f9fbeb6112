//! Burkhard-Keller tree over Levenshtein distance
//!
//! Each child edge is labelled with its distance to the parent. A search
//! for `query` within `max` only descends into children labelled
//! `d - max ..= d + max`, where `d` is the distance from `query` to the
//! node; the triangle inequality rules out everything else.

use std::collections::BTreeMap;

use super::levenshtein::levenshtein;

#[derive(Debug, Clone)]
struct Node {
    word: String,
    children: BTreeMap<usize, usize>,
}

/// Metric index of distinct strings
#[derive(Debug, Clone, Default)]
pub struct BkTree {
    nodes: Vec<Node>,
}

impl BkTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert a word; returns false if it was already present
    pub fn insert(&mut self, word: &str) -> bool {
        if self.nodes.is_empty() {
            self.push_node(word);
            return true;
        }

        let mut current = 0;
        loop {
            let distance = levenshtein(word, &self.nodes[current].word);
            if distance == 0 {
                return false;
            }
            match self.nodes[current].children.get(&distance) {
                Some(&child) => current = child,
                None => {
                    let index = self.push_node(word);
                    self.nodes[current].children.insert(distance, index);
                    return true;
                }
            }
        }
    }

    /// All stored words within `max` of `query`, with their distances,
    /// sorted by distance then text
    pub fn search(&self, query: &str, max: usize) -> Vec<(&str, usize)> {
        let mut found = Vec::new();
        if self.nodes.is_empty() {
            return found;
        }

        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            let distance = levenshtein(query, &node.word);
            if distance <= max {
                found.push((node.word.as_str(), distance));
            }

            let low = distance.saturating_sub(max);
            let high = distance + max;
            stack.extend(node.children.range(low..=high).map(|(_, &child)| child));
        }

        found.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        found
    }

    /// Every unordered pair of distinct stored words within `max`, as
    /// `(a, b, distance)` with `a < b`
    pub fn pairs_within(&self, max: usize) -> Vec<(&str, &str, usize)> {
        let mut pairs = Vec::new();
        for node in &self.nodes {
            for (other, distance) in self.search(&node.word, max) {
                if node.word.as_str() < other {
                    pairs.push((node.word.as_str(), other, distance));
                }
            }
        }
        pairs.sort();
        pairs
    }

    fn push_node(&mut self, word: &str) -> usize {
        self.nodes.push(Node {
            word: word.to_string(),
            children: BTreeMap::new(),
        });
        self.nodes.len() - 1
    }
}

impl<'a> FromIterator<&'a str> for BkTree {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut tree = BkTree::new();
        for word in iter {
            tree.insert(word);
        }
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> BkTree {
        ["deploy", "deploys", "deployed", "staging", "stage", "rollback"]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_insert_dedupes() {
        let mut t = tree();
        assert_eq!(t.len(), 6);
        assert!(!t.insert("deploy"));
        assert_eq!(t.len(), 6);
    }

    #[test]
    fn test_search() {
        let t = tree();
        assert_eq!(
            t.search("deploy", 2),
            vec![("deploy", 0), ("deploys", 1), ("deployed", 2)]
        );
        assert_eq!(t.search("staging", 0), vec![("staging", 0)]);
        assert!(t.search("zzzzzzzz", 1).is_empty());
    }

    #[test]
    fn test_pairs_within() {
        let t = tree();
        let pairs = t.pairs_within(2);
        assert!(pairs.contains(&("deploy", "deploys", 1)));
        assert!(pairs.contains(&("deploy", "deployed", 2)));
        assert!(pairs.contains(&("deployed", "deploys", 2)));
        assert!(pairs.iter().all(|(a, b, _)| a < b));
        assert!(!pairs.iter().any(|(a, _, _)| *a == "rollback"));
    }

    #[test]
    fn test_empty_tree() {
        let t = BkTree::new();
        assert!(t.is_empty());
        assert!(t.search("deploy", 3).is_empty());
        assert!(t.pairs_within(3).is_empty());
    }
}
