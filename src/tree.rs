//! Huffman tree over output classes, used by hierarchical softmax.

use std::cmp::Reverse;

use tracing::debug;

/// One node of a [`Tree`]. `None` links mean "no such node": leaves have no
/// children and the root has no parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Node {
    pub parent: Option<usize>,
    pub left: Option<usize>,
    pub right: Option<usize>,
    /// Sum of the counts of all leaves under this node.
    pub count: u64,
    /// Which child this node is of its parent (`true` for the right child).
    pub binary: bool,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Binary Huffman tree stored as an arena of `2 * V - 1` nodes.
///
/// Nodes `0..V` are the leaves, and node `c` is the leaf for class `c`.
/// Nodes `V..2V-1` are internal, in the order they were created; the last one
/// is the root. Internal node `n` owns row `n - V` of the output matrix.
#[derive(Debug, Clone)]
pub struct Tree {
    num_classes: usize,
    nodes: Vec<Node>,
    /// `paths[c]` lists the output-matrix rows of the internal nodes on the way
    /// from the root down to leaf `c`.
    paths: Vec<Vec<usize>>,
    /// `codes[c][d]` is the branch taken below `paths[c][d]` (`true` = right).
    codes: Vec<Vec<bool>>,
}

impl Tree {
    /// Create a binary Huffman tree using the class counts.
    /// Frequent classes get short codes.
    ///
    /// Panics if `counts` is empty.
    pub fn build(counts: &[u64]) -> Tree {
        let num_classes = counts.len();
        assert!(num_classes > 0, "can't build a tree with no classes");

        let mut nodes = vec![Node::default(); 2 * num_classes - 1];
        for (node, &count) in nodes.iter_mut().zip(counts) {
            node.count = count;
        }

        // Leaves in order of decreasing count; `order[leaf - 1]` is the
        // smallest leaf not yet merged.
        let mut order: Vec<usize> = (0..num_classes).collect();
        order.sort_by_key(|&c| (Reverse(counts[c]), c));
        let mut leaf = num_classes;
        // Internal nodes are created with nondecreasing counts, so they form
        // a second sorted queue starting at `next`.
        let mut next = num_classes;

        // Add one internal node at a time, merging the two smallest nodes.
        for i in num_classes..(2 * num_classes - 1) {
            let mut mini = [0usize; 2];
            for m in &mut mini {
                if leaf > 0 && (next >= i || nodes[order[leaf - 1]].count < nodes[next].count) {
                    leaf -= 1;
                    *m = order[leaf];
                } else {
                    *m = next;
                    next += 1;
                }
            }
            let [left, right] = mini;
            nodes[i].left = Some(left);
            nodes[i].right = Some(right);
            nodes[i].count = nodes[left].count.saturating_add(nodes[right].count);
            nodes[left].parent = Some(i);
            nodes[right].parent = Some(i);
            nodes[right].binary = true;
        }

        // Now assign a path and code to each class.
        let mut paths = Vec::with_capacity(num_classes);
        let mut codes = Vec::with_capacity(num_classes);
        for c in 0..num_classes {
            let mut path = vec![];
            let mut code = vec![];
            let mut j = c;
            while let Some(parent) = nodes[j].parent {
                path.push(parent - num_classes);
                code.push(nodes[j].binary);
                j = parent;
            }
            path.reverse();
            code.reverse();
            paths.push(path);
            codes.push(code);
        }

        let tree = Tree {
            num_classes,
            nodes,
            paths,
            codes,
        };
        debug!(
            classes = num_classes,
            max_depth = tree.codes.iter().map(Vec::len).max().unwrap_or(0),
            "built Huffman tree"
        );
        tree
    }

    /// Total number of nodes, `2 * num_classes() - 1`.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn root(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn node(&self, i: usize) -> &Node {
        &self.nodes[i]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn path(&self, class: usize) -> &[usize] {
        &self.paths[class]
    }

    pub fn code(&self, class: usize) -> &[bool] {
        &self.codes[class]
    }

    /// Number of binary decisions between the root and `class`.
    pub fn depth(&self, class: usize) -> usize {
        self.codes[class].len()
    }

    /// Follow `code` down from the root and return the class of the leaf it
    /// ends at. Panics if the code stops early or runs past a leaf.
    pub fn decode(&self, code: &[bool]) -> usize {
        let mut n = self.root();
        for &bit in code {
            let node = &self.nodes[n];
            n = if bit { node.right } else { node.left }
                .unwrap_or_else(|| panic!("code {code:?} runs past a leaf"));
        }
        assert!(self.nodes[n].is_leaf(), "code {code:?} ends at an internal node");
        n
    }
}
