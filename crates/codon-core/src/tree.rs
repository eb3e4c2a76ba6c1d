//! Rooted bifurcating tree input and its post-order-safe integer indexing.
//!
//! [`RawTree`] is the user-facing shape (parsed from a minimal Newick
//! dialect). [`index_tree`] turns it into an [`IndexedTree`]: tips are
//! numbered `0..ntips`, internal nodes `ntips..2*ntips-1`, and every
//! internal node's index is strictly greater than both of its children's —
//! the same guarantee a post-order traversal gives, so the kernel can fill
//! `L`/`dL` in plain index order and never read an unset slot.

use std::collections::HashMap;

use codon_error::{EngineResult, engine_err};

/// A parsed tree before indexing, mirroring how a Newick string nests.
/// Each node carries the branch length connecting it to its parent
/// (`1.0` when the Newick string omitted one).
#[derive(Debug, Clone, PartialEq)]
pub enum RawTree {
    Tip {
        name: String,
        length: f64,
    },
    Internal {
        left: Box<RawTree>,
        right: Box<RawTree>,
        length: f64,
    },
}

impl RawTree {
    fn collect_tips(&self, out: &mut Vec<String>) -> EngineResult<()> {
        match self {
            RawTree::Tip { name, .. } => {
                if out.contains(name) {
                    return Err(engine_err!(Structural: "duplicate tip name '{}'", name));
                }
                out.push(name.clone());
                Ok(())
            }
            RawTree::Internal { left, right, .. } => {
                left.collect_tips(out)?;
                right.collect_tips(out)
            }
        }
    }

    fn length(&self) -> f64 {
        match self {
            RawTree::Tip { length, .. } => *length,
            RawTree::Internal { length, .. } => *length,
        }
    }
}

/// A tree indexed so that children always precede their parent.
#[derive(Debug, Clone)]
pub struct IndexedTree {
    ntips: usize,
    /// `children[m - ntips] = (left, right)` for internal node `m`.
    children: Vec<(usize, usize)>,
    parent: Vec<Option<usize>>,
    /// `branch_length[n]` is the length of the edge from `n` to its parent;
    /// `0.0` at the root, which has none.
    branch_length: Vec<f64>,
    tip_names: Vec<String>,
    root: usize,
}

impl IndexedTree {
    pub fn ntips(&self) -> usize {
        self.ntips
    }

    pub fn nnodes(&self) -> usize {
        self.parent.len()
    }

    pub fn is_tip(&self, node: usize) -> bool {
        node < self.ntips
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn tip_name(&self, tip: usize) -> &str {
        &self.tip_names[tip]
    }

    pub fn tip_names(&self) -> &[String] {
        &self.tip_names
    }

    /// `(left, right)` children of an internal node. Panics if `node` is a tip.
    pub fn children(&self, node: usize) -> (usize, usize) {
        self.children[node - self.ntips]
    }

    pub fn parent(&self, node: usize) -> Option<usize> {
        self.parent[node]
    }

    /// Length of the edge from `node` to its parent (`0.0` at the root).
    pub fn branch_length(&self, node: usize) -> f64 {
        self.branch_length[node]
    }

    /// Internal node indices in ascending (post-order-consistent) order.
    pub fn internal_nodes(&self) -> impl Iterator<Item = usize> {
        self.ntips..self.nnodes()
    }
}

/// Indexes a parsed tree: tips get `0..ntips`, internal nodes `ntips..2*ntips-1`
/// in an order where every node comes after both of its children.
pub fn index_tree(raw: &RawTree) -> EngineResult<IndexedTree> {
    let mut tip_names = Vec::new();
    raw.collect_tips(&mut tip_names)?;
    let ntips = tip_names.len();
    if ntips < 2 {
        return Err(engine_err!(
            Structural: "tree must have at least 2 tips, got {}",
            ntips
        ));
    }

    let tip_index: HashMap<&str, usize> = tip_names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();

    let nnodes = 2 * ntips - 1;
    let mut children = vec![(0usize, 0usize); nnodes - ntips];
    let mut parent = vec![None; nnodes];
    let mut branch_length = vec![0.0; nnodes];
    let mut next_internal = ntips;

    fn assign(
        node: &RawTree,
        tip_index: &HashMap<&str, usize>,
        children: &mut [(usize, usize)],
        parent: &mut [Option<usize>],
        branch_length: &mut [f64],
        next_internal: &mut usize,
        ntips: usize,
    ) -> usize {
        match node {
            RawTree::Tip { name, length } => {
                let idx = tip_index[name.as_str()];
                branch_length[idx] = *length;
                idx
            }
            RawTree::Internal {
                left,
                right,
                length,
            } => {
                let li = assign(
                    left,
                    tip_index,
                    children,
                    parent,
                    branch_length,
                    next_internal,
                    ntips,
                );
                let ri = assign(
                    right,
                    tip_index,
                    children,
                    parent,
                    branch_length,
                    next_internal,
                    ntips,
                );
                let my_index = *next_internal;
                *next_internal += 1;
                children[my_index - ntips] = (li, ri);
                parent[li] = Some(my_index);
                parent[ri] = Some(my_index);
                branch_length[my_index] = *length;
                my_index
            }
        }
    }

    let root = assign(
        raw,
        &tip_index,
        &mut children,
        &mut parent,
        &mut branch_length,
        &mut next_internal,
        ntips,
    );
    debug_assert_eq!(root, nnodes - 1, "root must be assigned the final index");
    branch_length[root] = 0.0;

    Ok(IndexedTree {
        ntips,
        children,
        parent,
        branch_length,
        tip_names,
        root,
    })
}

/// Parses a minimal Newick dialect: nested `(left,right)name:length` pairs,
/// strictly bifurcating. Branch lengths and internal node names are accepted
/// but discarded; only tip names are kept.
pub fn parse_newick(input: &str) -> EngineResult<RawTree> {
    let trimmed = input.trim().trim_end_matches(';');
    let mut chars = trimmed.chars().peekable();
    let tree = parse_node(&mut chars)?;
    Ok(tree)
}

fn parse_node(chars: &mut std::iter::Peekable<std::str::Chars>) -> EngineResult<RawTree> {
    if chars.peek() == Some(&'(') {
        chars.next();
        let left = parse_node(chars)?;
        expect(chars, ',')?;
        let right = parse_node(chars)?;
        expect(chars, ')')?;
        let length = parse_label_and_length(chars);
        Ok(RawTree::Internal {
            left: Box::new(left),
            right: Box::new(right),
            length,
        })
    } else {
        let name = parse_label(chars);
        let length = parse_length(chars);
        if name.is_empty() {
            return Err(engine_err!(Structural: "expected a tip name in Newick string"));
        }
        Ok(RawTree::Tip { name, length })
    }
}

fn parse_label(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
    let mut label = String::new();
    while let Some(&c) = chars.peek() {
        if c == ',' || c == ')' || c == '(' || c == ':' {
            break;
        }
        label.push(c);
        chars.next();
    }
    label
}

const DEFAULT_BRANCH_LENGTH: f64 = 1.0;

fn parse_length(chars: &mut std::iter::Peekable<std::str::Chars>) -> f64 {
    if chars.peek() != Some(&':') {
        return DEFAULT_BRANCH_LENGTH;
    }
    chars.next();
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if c == ',' || c == ')' {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits.parse::<f64>().unwrap_or(DEFAULT_BRANCH_LENGTH)
}

fn parse_label_and_length(chars: &mut std::iter::Peekable<std::str::Chars>) -> f64 {
    parse_label(chars);
    parse_length(chars)
}

fn expect(chars: &mut std::iter::Peekable<std::str::Chars>, expected: char) -> EngineResult<()> {
    match chars.next() {
        Some(c) if c == expected => Ok(()),
        Some(c) => Err(engine_err!(
            Structural: "expected '{}' in Newick string, found '{}'",
            expected,
            c
        )),
        None => Err(engine_err!(
            Structural: "unexpected end of Newick string, expected '{}'",
            expected
        )),
    }
}
