use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::{
    log, real, sigmoid, ConfigError, IndexScore, LossKind, Matrix, ModelConfig, NegativeTable,
    TopIndexScoresCollector, Tree,
};

/// Lower end of the range callers are expected to decay the learning rate to.
pub const MIN_LR: real = 0.000001;

/// The read-only structures built from the output class counts.
///
/// Build them once with one model, then hand clones to every worker's model
/// with [`Model::set_targets`]; the contents are shared, not copied.
#[derive(Debug, Clone, Default)]
pub struct Targets {
    pub tree: Option<Arc<Tree>>,
    pub negatives: Option<Arc<NegativeTable>>,
}

/// One training or prediction worker.
///
/// `wi` holds one embedding row per input feature. `wo` holds one row per
/// output class for softmax and negative sampling, or one row per internal
/// tree node for hierarchical softmax (so it has as many rows as there are
/// classes either way). Both matrices are shared with every other worker and
/// updated in place without locks.
pub struct Model<'a> {
    wi: &'a Matrix,
    wo: &'a Matrix,
    /// Average of the context's input rows.
    hidden: Vec<real>,
    /// Softmax scratch, one entry per output row.
    output: Vec<real>,
    /// Gradient for the context's input rows, already scaled by the learning rate.
    grad: Vec<real>,
    loss: LossKind,
    neg: usize,
    normalize_gradient: bool,
    lr: real,
    targets: Targets,
    /// Position of the next draw from `targets.negatives`.
    negpos: usize,
    rng: StdRng,
}

impl<'a> Model<'a> {
    pub fn new(wi: &'a Matrix, wo: &'a Matrix, config: &ModelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        for (name, m) in [("input", wi), ("output", wo)] {
            if m.rows() == 0 {
                return Err(ConfigError::EmptyMatrix(name));
            }
            if m.cols() != config.dim {
                return Err(ConfigError::DimensionMismatch {
                    matrix: name,
                    expected: config.dim,
                    actual: m.cols(),
                });
            }
        }

        debug!(
            inputs = wi.rows(),
            outputs = wo.rows(),
            dim = config.dim,
            loss = ?config.loss,
            "creating model"
        );
        Ok(Model {
            wi,
            wo,
            hidden: vec![0.0; config.dim],
            output: vec![0.0; wo.rows()],
            grad: vec![0.0; config.dim],
            loss: config.loss,
            neg: config.neg,
            normalize_gradient: config.normalize_gradient,
            lr: config.lr,
            targets: Targets::default(),
            negpos: 0,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    pub fn set_learning_rate(&mut self, lr: real) {
        self.lr = lr;
    }

    pub fn learning_rate(&self) -> real {
        self.lr
    }

    pub fn loss_kind(&self) -> LossKind {
        self.loss
    }

    /// Number of output classes.
    pub fn num_classes(&self) -> usize {
        self.wo.rows()
    }

    pub fn hidden(&self) -> &[real] {
        &self.hidden
    }

    pub fn grad(&self) -> &[real] {
        &self.grad
    }

    /// Build whatever the configured loss needs from per-class counts: the
    /// negative table for negative sampling, the tree for hierarchical
    /// softmax. Softmax needs neither.
    pub fn set_target_counts(&mut self, counts: &[u64]) {
        assert_eq!(
            counts.len(),
            self.num_classes(),
            "need one count per output class"
        );
        match self.loss {
            LossKind::NegativeSampling => self.init_table_negatives(counts),
            LossKind::HierarchicalSoftmax => self.build_tree(counts),
            LossKind::Softmax => {}
        }
    }

    pub fn init_table_negatives(&mut self, counts: &[u64]) {
        let table = NegativeTable::new(counts, &mut self.rng);
        self.targets.negatives = Some(Arc::new(table));
        self.negpos = 0;
    }

    pub fn build_tree(&mut self, counts: &[u64]) {
        assert_eq!(
            counts.len(),
            self.num_classes(),
            "need one count per output class"
        );
        self.targets.tree = Some(Arc::new(Tree::build(counts)));
    }

    /// The tree and table built so far, for sharing with other workers.
    pub fn targets(&self) -> Targets {
        self.targets.clone()
    }

    pub fn set_targets(&mut self, targets: Targets) {
        if let Some(tree) = &targets.tree {
            assert_eq!(tree.num_classes(), self.num_classes(), "tree doesn't fit the output matrix");
        }
        self.targets = targets;
        self.negpos = 0;
    }

    fn tree(&self) -> Arc<Tree> {
        Arc::clone(
            self.targets
                .tree
                .as_ref()
                .expect("hierarchical softmax used before build_tree"),
        )
    }

    /// Set `hidden` to the average of the input rows listed in `context`.
    pub fn compute_hidden(&mut self, context: &[usize]) {
        assert!(!context.is_empty(), "empty context");
        self.hidden.fill(0.0);
        for &i in context {
            self.wi.add_row_to(&mut self.hidden, i, 1.0);
        }
        let scale = 1.0 / context.len() as real;
        for h in &mut self.hidden {
            *h *= scale;
        }
    }

    /// Logistic regression of `hidden` against output row `row`.
    ///
    /// Adds this step's gradient into `grad`, updates the output row in place,
    /// and returns the log loss.
    pub fn binary_logistic(&mut self, row: usize, label: bool) -> real {
        let score = sigmoid(self.wo.dot_row(&self.hidden, row));
        let alpha = self.lr * (label as u8 as real - score);
        // Propagate errors output -> hidden, then learn weights hidden -> output.
        self.wo.add_row_to(&mut self.grad, row, alpha);
        self.wo.add_to_row(row, &self.hidden, alpha);
        if label {
            -log(score)
        } else {
            -log(1.0 - score)
        }
    }

    pub fn negative_sampling(&mut self, target: usize) -> real {
        let mut loss = self.binary_logistic(target, true);
        for _ in 0..self.neg {
            let negative = self.get_negative(target);
            loss += self.binary_logistic(negative, false);
        }
        loss
    }

    /// The next class in the negative table that isn't `target`.
    pub fn get_negative(&mut self, target: usize) -> usize {
        let table = self
            .targets
            .negatives
            .as_ref()
            .expect("negative sampling used before init_table_negatives");
        for _ in 0..table.len() {
            let negative = table.get(self.negpos);
            self.negpos = (self.negpos + 1) % table.len();
            if negative != target {
                return negative;
            }
        }
        panic!("negative table holds no class other than {target}");
    }

    pub fn hierarchical_softmax(&mut self, target: usize) -> real {
        let tree = self.tree();
        tree.path(target)
            .iter()
            .zip(tree.code(target))
            .map(|(&row, &bit)| self.binary_logistic(row, bit))
            .sum()
    }

    /// Fill `output` with the softmax of `wo * hidden`.
    fn compute_output_softmax(&mut self) {
        for (i, o) in self.output.iter_mut().enumerate() {
            *o = self.wo.dot_row(&self.hidden, i);
        }
        let max = self.output.iter().copied().fold(real::NEG_INFINITY, real::max);
        let mut z = 0.0;
        for o in &mut self.output {
            *o = (*o - max).exp();
            z += *o;
        }
        for o in &mut self.output {
            *o /= z;
        }
    }

    pub fn softmax(&mut self, target: usize) -> real {
        self.compute_output_softmax();
        for i in 0..self.output.len() {
            let label = if i == target { 1.0 } else { 0.0 };
            let alpha = self.lr * (label - self.output[i]);
            self.wo.add_row_to(&mut self.grad, i, alpha);
            self.wo.add_to_row(i, &self.hidden, alpha);
        }
        -log(self.output[target])
    }

    /// Probability of every output class given `context`. Parameters are not
    /// changed.
    pub fn output_probabilities(&mut self, context: &[usize]) -> &[real] {
        self.compute_hidden(context);
        self.compute_output_softmax();
        &self.output
    }

    /// One step of training on a single example. Returns the example's loss,
    /// each term scored just before its output row is moved.
    pub fn update(&mut self, context: &[usize], target: usize) -> real {
        assert!(
            target < self.num_classes(),
            "target {target} out of range for {} classes",
            self.num_classes()
        );
        self.compute_hidden(context);
        self.grad.fill(0.0);
        let loss = match self.loss {
            LossKind::NegativeSampling => self.negative_sampling(target),
            LossKind::HierarchicalSoftmax => self.hierarchical_softmax(target),
            LossKind::Softmax => self.softmax(target),
        };
        if self.normalize_gradient {
            let scale = 1.0 / context.len() as real;
            for g in &mut self.grad {
                *g *= scale;
            }
        }
        // Learn weights input -> hidden
        for &i in context {
            self.wi.add_to_row(i, &self.grad, 1.0);
        }
        loss
    }

    fn dfs(&self, tree: &Tree, node: usize, score: real, collector: &mut TopIndexScoresCollector) {
        // Scores only go down along a path, so nothing below here can make it.
        // A subtree tied with the k-th best is skipped too: ties keep the
        // class found first.
        if !collector.should_add(score) {
            return;
        }
        let n = tree.node(node);
        match (n.left, n.right) {
            (Some(left), Some(right)) => {
                let f = sigmoid(self.wo.dot_row(&self.hidden, node - tree.num_classes()));
                self.dfs(tree, left, score + log(1.0 - f), collector);
                self.dfs(tree, right, score + log(f), collector);
            }
            _ => collector.add(node, score),
        }
    }

    /// The `k` most likely classes with their log-probabilities, best first.
    fn predict_one_or_more(&mut self, k: usize, context: &[usize]) -> Vec<IndexScore> {
        assert!(k > 0, "asked for zero predictions");
        self.compute_hidden(context);
        let mut collector = TopIndexScoresCollector::new(k);
        if let Some(tree) = self.targets.tree.clone() {
            self.dfs(&tree, tree.root(), 0.0, &mut collector);
        } else {
            self.compute_output_softmax();
            for (i, &p) in self.output.iter().enumerate() {
                let score = log(p);
                if collector.should_add(score) {
                    collector.add(i, score);
                }
            }
        }
        collector.result()
    }

    pub fn predict(&mut self, context: &[usize]) -> usize {
        self.predict_prob(context).0
    }

    pub fn predict_prob(&mut self, context: &[usize]) -> IndexScore {
        self.predict_one_or_more(1, context)[0]
    }

    pub fn predict_top_k(&mut self, k: usize, context: &[usize]) -> Vec<usize> {
        self.predict_one_or_more(k, context)
            .into_iter()
            .map(|(i, _)| i)
            .collect()
    }

    pub fn predict_top_k_prob(&mut self, k: usize, context: &[usize]) -> Vec<IndexScore> {
        self.predict_one_or_more(k, context)
    }
}
