//! Weight-augmented AVL price tree
//!
//! One node per occupied price level. Every node carries the total
//! resting amount of its subtree (its weight), so a fill can decide in
//! constant time whether a whole subtree will be consumed and take it
//! without visiting its nodes. Fills can therefore detach subtrees of
//! arbitrary height, which plain insert/delete rebalancing cannot
//! repair; reassembly goes through a height-aware join instead.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;
use types::ids::Direction;
use types::numeric::{Amount, Price};

/// Structural defects reported by a tree audit
///
/// Produced by [`PriceTree::check_invariants`] and by snapshot rebuild.
/// Any defect means the tree contents cannot be trusted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeDefect {
    #[error("Price order violated at {price}")]
    PriceOrder { price: Price },

    #[error("Node at {price} holds zero amount")]
    ZeroAmountNode { price: Price },

    #[error("Stored height {stored} at {price} does not match actual {actual}")]
    HeightMismatch { price: Price, stored: u32, actual: u32 },

    #[error("Balance violated at {price}: left height {left}, right height {right}")]
    Unbalanced { price: Price, left: u32, right: u32 },

    #[error("Stored weight {stored} at {price} does not match actual {actual}")]
    WeightMismatch {
        price: Price,
        stored: Amount,
        actual: Amount,
    },

    #[error("Subtree weight overflows at {price}")]
    WeightOverflow { price: Price },

    #[error("Rebuilt {consumed} of {total} records; remainder is not a valid pre-order")]
    TrailingRecords { consumed: usize, total: usize },
}

/// Flat form of one tree node for snapshots
///
/// Records are exported in pre-order, which together with the price
/// ordering pins down the exact tree shape. Stored heights and weights
/// are redundant and re-verified on rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub price: Price,
    pub own_amount: Amount,
    pub height: u32,
    pub weight: Amount,
}

/// One price level's contribution to a fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelFill {
    pub price: Price,
    pub consumed: Amount,
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    price: Price,
    height: u32,
    /// Amount resting at this node's own price level, always nonzero
    own_amount: Amount,
    /// Total amount in this subtree: own plus both children's weights
    weight: Amount,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    fn leaf(price: Price, amount: Amount) -> Box<Self> {
        Box::new(Self {
            price,
            height: 1,
            own_amount: amount,
            weight: amount,
            left: None,
            right: None,
        })
    }

    /// Recompute height and weight from the children, which must
    /// already be consistent themselves.
    fn update(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
        self.weight = self.own_amount + weight(&self.left) + weight(&self.right);
    }

    fn balance(&self) -> i32 {
        height(&self.left) as i32 - height(&self.right) as i32
    }
}

fn height(node: &Option<Box<Node>>) -> u32 {
    node.as_ref().map_or(0, |n| n.height)
}

fn weight(node: &Option<Box<Node>>) -> Amount {
    node.as_ref().map_or(Amount::ZERO, |n| n.weight)
}

/// Map (left, right) to (better, worse) for a direction. The function
/// is its own inverse, so applying it twice restores (left, right).
fn orient<T>(direction: Direction, left: T, right: T) -> (T, T) {
    match direction {
        Direction::ZeroForOne => (left, right),
        Direction::OneForZero => (right, left),
    }
}

/// Whether a price falls on the far side of a taker's limit
fn beyond_limit(price: Price, limit: Option<Price>, direction: Direction) -> bool {
    match (limit, direction) {
        (None, _) => false,
        (Some(limit), Direction::ZeroForOne) => price > limit,
        (Some(limit), Direction::OneForZero) => price < limit,
    }
}

/// Rotate right around `node`; its left child becomes the subtree root.
/// Heights and weights are recomputed child before parent.
fn rotate_right(mut node: Box<Node>) -> Box<Node> {
    let mut pivot = node.left.take().expect("rotate_right requires a left child");
    node.left = pivot.right.take();
    node.update();
    pivot.right = Some(node);
    pivot.update();
    pivot
}

/// Mirror image of [`rotate_right`].
fn rotate_left(mut node: Box<Node>) -> Box<Node> {
    let mut pivot = node.right.take().expect("rotate_left requires a right child");
    node.right = pivot.left.take();
    node.update();
    pivot.left = Some(node);
    pivot.update();
    pivot
}

/// Restore the AVL invariant at `node` after a child changed height.
///
/// Handles a balance factor of at most 2 in either direction, which is
/// the most a single insert, delete, or join spine step can produce. A
/// child leaning the opposite way forces the double rotation; a child
/// balance of zero takes the single rotation.
fn rebalance(mut node: Box<Node>) -> Box<Node> {
    node.update();
    let bf = node.balance();
    if bf > 1 {
        let lean = node
            .left
            .as_ref()
            .map_or(0, |child| child.balance());
        if lean < 0 {
            let left = node.left.take().expect("left-heavy node missing left child");
            node.left = Some(rotate_left(left));
        }
        rotate_right(node)
    } else if bf < -1 {
        let lean = node
            .right
            .as_ref()
            .map_or(0, |child| child.balance());
        if lean > 0 {
            let right = node
                .right
                .take()
                .expect("right-heavy node missing right child");
            node.right = Some(rotate_right(right));
        }
        rotate_left(node)
    } else {
        node
    }
}

/// Join two price-ordered subtrees around a middle node.
///
/// Every price in `left` must be below `mid.price` and every price in
/// `right` above it. The height gap between the sides may be arbitrary:
/// the middle is attached down the taller side's spine where the
/// heights meet, and each spine step is rebalanced on the way back up.
fn join(left: Option<Box<Node>>, mut mid: Box<Node>, right: Option<Box<Node>>) -> Box<Node> {
    let lh = height(&left);
    let rh = height(&right);
    if lh > rh + 1 {
        let mut root = left.expect("taller left side cannot be empty");
        root.right = Some(join(root.right.take(), mid, right));
        rebalance(root)
    } else if rh > lh + 1 {
        let mut root = right.expect("taller right side cannot be empty");
        root.left = Some(join(left, mid, root.left.take()));
        rebalance(root)
    } else {
        mid.left = left;
        mid.right = right;
        mid.update();
        mid
    }
}

/// Merge two price-ordered subtrees with no middle node, where every
/// price in `left` is below every price in `right`.
fn merge(left: Option<Box<Node>>, right: Option<Box<Node>>) -> Option<Box<Node>> {
    match (left, right) {
        (None, right) => right,
        (left, None) => left,
        (left, Some(right)) => {
            let (min, rest) = extract_min(right);
            Some(join(left, min, rest))
        }
    }
}

/// Detach the minimum-price node, returning it bare alongside the
/// rebalanced remainder. The detached node keeps stale height and
/// weight; callers reattach it through [`join`], which recomputes both.
fn extract_min(mut node: Box<Node>) -> (Box<Node>, Option<Box<Node>>) {
    match node.left.take() {
        None => {
            let rest = node.right.take();
            (node, rest)
        }
        Some(left) => {
            let (min, remaining) = extract_min(left);
            node.left = remaining;
            (min, Some(rebalance(node)))
        }
    }
}

fn insert_rec(node: Option<Box<Node>>, price: Price, amount: Amount) -> Box<Node> {
    let Some(mut node) = node else {
        return Node::leaf(price, amount);
    };
    match price.cmp(&node.price) {
        Ordering::Less => node.left = Some(insert_rec(node.left.take(), price, amount)),
        Ordering::Greater => node.right = Some(insert_rec(node.right.take(), price, amount)),
        Ordering::Equal => {
            // Same price level: accumulate in place, heights unchanged.
            node.own_amount += amount;
            node.update();
            return node;
        }
    }
    rebalance(node)
}

fn remove_rec(node: Option<Box<Node>>, price: Price, amount: Amount) -> (Option<Box<Node>>, Amount) {
    let Some(mut node) = node else {
        return (None, Amount::ZERO);
    };
    let removed = match price.cmp(&node.price) {
        Ordering::Less => {
            let (child, removed) = remove_rec(node.left.take(), price, amount);
            node.left = child;
            removed
        }
        Ordering::Greater => {
            let (child, removed) = remove_rec(node.right.take(), price, amount);
            node.right = child;
            removed
        }
        Ordering::Equal => {
            let removed = node.own_amount.min(amount);
            node.own_amount -= removed;
            if node.own_amount.is_zero() {
                return (detach(node), removed);
            }
            removed
        }
    };
    if removed.is_zero() {
        (Some(node), Amount::ZERO)
    } else {
        (Some(rebalance(node)), removed)
    }
}

/// Physically remove a node whose own amount reached zero. A node with
/// two children is replaced by its in-order successor via [`join`].
fn detach(mut node: Box<Node>) -> Option<Box<Node>> {
    match (node.left.take(), node.right.take()) {
        (None, None) => None,
        (Some(child), None) | (None, Some(child)) => Some(child),
        (Some(left), Some(right)) => {
            let (successor, rest) = extract_min(right);
            Some(join(Some(left), successor, rest))
        }
    }
}

fn fill_rec(
    node: Option<Box<Node>>,
    direction: Direction,
    limit: Option<Price>,
    remaining: &mut Amount,
    fills: &mut Vec<LevelFill>,
) -> Option<Box<Node>> {
    let Some(mut node) = node else {
        return None;
    };
    if remaining.is_zero() {
        return Some(node);
    }
    // A whole subtree can be taken in one step only when no limit could
    // exclude part of it.
    if limit.is_none() && node.weight <= *remaining {
        *remaining -= node.weight;
        drain_levels(node, direction, fills);
        return None;
    }
    let (better, worse) = orient(direction, node.left.take(), node.right.take());
    if beyond_limit(node.price, limit, direction) {
        // This node and its whole worse side are past the limit; only
        // the better side can hold eligible levels.
        let better = fill_rec(better, direction, limit, remaining, fills);
        let (left, right) = orient(direction, better, worse);
        return Some(join(left, node, right));
    }
    // Once this node is within the limit, every better price is too, so
    // the better side fills unconstrained and may be drained whole.
    let better = fill_rec(better, direction, None, remaining, fills);
    if !remaining.is_zero() {
        let consumed = node.own_amount.min(*remaining);
        *remaining -= consumed;
        node.own_amount -= consumed;
        fills.push(LevelFill {
            price: node.price,
            consumed,
        });
    }
    let worse = if remaining.is_zero() {
        worse
    } else {
        fill_rec(worse, direction, limit, remaining, fills)
    };
    let (left, right) = orient(direction, better, worse);
    if node.own_amount.is_zero() {
        merge(left, right)
    } else {
        Some(join(left, node, right))
    }
}

/// Record every level of a fully consumed subtree, best prices first.
fn drain_levels(node: Box<Node>, direction: Direction, fills: &mut Vec<LevelFill>) {
    let Node {
        price,
        own_amount,
        left,
        right,
        ..
    } = *node;
    let (better, worse) = orient(direction, left, right);
    if let Some(better) = better {
        drain_levels(better, direction, fills);
    }
    fills.push(LevelFill {
        price,
        consumed: own_amount,
    });
    if let Some(worse) = worse {
        drain_levels(worse, direction, fills);
    }
}

fn collect_levels(
    node: Option<&Node>,
    direction: Direction,
    max: usize,
    out: &mut Vec<(Price, Amount)>,
) {
    let Some(node) = node else {
        return;
    };
    if out.len() >= max {
        return;
    }
    let (better, worse) = orient(direction, node.left.as_deref(), node.right.as_deref());
    collect_levels(better, direction, max, out);
    if out.len() < max {
        out.push((node.price, node.own_amount));
    }
    collect_levels(worse, direction, max, out);
}

fn count_nodes(node: Option<&Node>) -> usize {
    node.map_or(0, |n| {
        1 + count_nodes(n.left.as_deref()) + count_nodes(n.right.as_deref())
    })
}

fn export_pre_order(node: Option<&Node>, out: &mut Vec<NodeRecord>) {
    let Some(node) = node else {
        return;
    };
    out.push(NodeRecord {
        price: node.price,
        own_amount: node.own_amount,
        height: node.height,
        weight: node.weight,
    });
    export_pre_order(node.left.as_deref(), out);
    export_pre_order(node.right.as_deref(), out);
}

fn build_pre_order(
    records: &[NodeRecord],
    cursor: &mut usize,
    lower: Option<Price>,
    upper: Option<Price>,
) -> Option<Box<Node>> {
    let record = records.get(*cursor)?;
    if lower.is_some_and(|bound| record.price <= bound)
        || upper.is_some_and(|bound| record.price >= bound)
    {
        return None;
    }
    *cursor += 1;
    let price = record.price;
    let mut node = Box::new(Node {
        price,
        height: record.height,
        own_amount: record.own_amount,
        weight: record.weight,
        left: None,
        right: None,
    });
    node.left = build_pre_order(records, cursor, lower, Some(price));
    node.right = build_pre_order(records, cursor, Some(price), upper);
    Some(node)
}

/// Verify price ordering, node residency, stored heights, AVL balance,
/// and stored weights over a subtree. Returns the subtree's height and
/// weight for the parent's checks.
fn audit(
    node: Option<&Node>,
    lower: Option<Price>,
    upper: Option<Price>,
) -> Result<(u32, Amount), TreeDefect> {
    let Some(node) = node else {
        return Ok((0, Amount::ZERO));
    };
    if lower.is_some_and(|bound| node.price <= bound)
        || upper.is_some_and(|bound| node.price >= bound)
    {
        return Err(TreeDefect::PriceOrder { price: node.price });
    }
    if node.own_amount.is_zero() {
        return Err(TreeDefect::ZeroAmountNode { price: node.price });
    }
    let (left_height, left_weight) = audit(node.left.as_deref(), lower, Some(node.price))?;
    let (right_height, right_weight) = audit(node.right.as_deref(), Some(node.price), upper)?;
    let actual_height = 1 + left_height.max(right_height);
    if node.height != actual_height {
        return Err(TreeDefect::HeightMismatch {
            price: node.price,
            stored: node.height,
            actual: actual_height,
        });
    }
    if left_height.abs_diff(right_height) > 1 {
        return Err(TreeDefect::Unbalanced {
            price: node.price,
            left: left_height,
            right: right_height,
        });
    }
    let actual_weight = node
        .own_amount
        .checked_add(left_weight)
        .and_then(|sum| sum.checked_add(right_weight))
        .ok_or(TreeDefect::WeightOverflow { price: node.price })?;
    if node.weight != actual_weight {
        return Err(TreeDefect::WeightMismatch {
            price: node.price,
            stored: node.weight,
            actual: actual_weight,
        });
    }
    Ok((actual_height, actual_weight))
}

/// Weight-augmented AVL tree over occupied price levels
///
/// The tree stores one node per price with the level's total resting
/// amount; it does not know about individual orders. All mutations keep
/// heights and weights exact, so the root weight is always the book's
/// total liquidity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTree {
    root: Option<Box<Node>>,
}

impl PriceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add resting amount at a price, creating the level if absent
    ///
    /// # Panics
    /// Panics if `amount` is zero; zero amounts are rejected upstream
    /// and never enter the tree.
    pub fn insert(&mut self, price: Price, amount: Amount) {
        assert!(!amount.is_zero(), "Inserted amount must be nonzero");
        let root = self.root.take();
        self.root = Some(insert_rec(root, price, amount));
    }

    /// Remove up to `amount` from the level at `price`
    ///
    /// Returns the amount actually removed: zero when the price is
    /// absent, the whole level when it holds less than `amount`. Only
    /// this one level is touched; consumption across levels goes
    /// through [`PriceTree::fill`]. A level whose amount reaches zero
    /// is physically detached.
    pub fn remove_amount(&mut self, price: Price, amount: Amount) -> Amount {
        let root = self.root.take();
        let (root, removed) = remove_rec(root, price, amount);
        self.root = root;
        removed
    }

    /// Consume up to `amount` of liquidity, best prices first
    ///
    /// Returns the per-level fills in consumption order and the portion
    /// of `amount` that could not be filled. Fully consumed levels are
    /// detached; a partially consumed level keeps the remainder.
    pub fn fill(&mut self, direction: Direction, amount: Amount) -> (Vec<LevelFill>, Amount) {
        self.fill_bounded(direction, amount, None)
    }

    /// [`PriceTree::fill`] restricted to prices at or better than `limit`
    pub fn fill_bounded(
        &mut self,
        direction: Direction,
        amount: Amount,
        limit: Option<Price>,
    ) -> (Vec<LevelFill>, Amount) {
        let mut fills = Vec::new();
        let mut remaining = amount;
        let root = self.root.take();
        self.root = fill_rec(root, direction, limit, &mut remaining, &mut fills);
        (fills, remaining)
    }

    /// The best occupied price for a direction: the lowest for
    /// zero-for-one flow, the highest for one-for-zero.
    pub fn find_best(&self, direction: Direction) -> Option<Price> {
        let mut node = self.root.as_deref()?;
        loop {
            let next = match direction {
                Direction::ZeroForOne => node.left.as_deref(),
                Direction::OneForZero => node.right.as_deref(),
            };
            match next {
                Some(child) => node = child,
                None => return Some(node.price),
            }
        }
    }

    /// Resting amount at an exact price, if the level is occupied
    pub fn amount_at(&self, price: Price) -> Option<Amount> {
        let mut node = self.root.as_deref()?;
        loop {
            match price.cmp(&node.price) {
                Ordering::Less => node = node.left.as_deref()?,
                Ordering::Greater => node = node.right.as_deref()?,
                Ordering::Equal => return Some(node.own_amount),
            }
        }
    }

    /// Total resting amount across all levels
    pub fn weight(&self) -> Amount {
        weight(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of occupied price levels
    pub fn len(&self) -> usize {
        count_nodes(self.root.as_deref())
    }

    /// Height of the tree; zero when empty
    pub fn height(&self) -> u32 {
        height(&self.root)
    }

    /// Up to `max` occupied levels in best-first order
    pub fn levels_best_first(&self, direction: Direction, max: usize) -> Vec<(Price, Amount)> {
        let mut out = Vec::new();
        collect_levels(self.root.as_deref(), direction, max, &mut out);
        out
    }

    /// Full structural audit: price ordering, nonzero amounts, exact
    /// heights, AVL balance, and exact weights.
    pub fn check_invariants(&self) -> Result<(), TreeDefect> {
        audit(self.root.as_deref(), None, None)?;
        Ok(())
    }

    /// Flatten the tree into pre-order records for a snapshot
    pub fn export_records(&self) -> Vec<NodeRecord> {
        let mut out = Vec::with_capacity(self.len());
        export_pre_order(self.root.as_deref(), &mut out);
        out
    }

    /// Rebuild a tree from pre-order records
    ///
    /// The exact shape is reconstructed and then audited, so records
    /// with tampered amounts, weights, or heights are rejected rather
    /// than trusted.
    pub fn from_records(records: &[NodeRecord]) -> Result<Self, TreeDefect> {
        let mut cursor = 0;
        let root = build_pre_order(records, &mut cursor, None, None);
        if cursor != records.len() {
            return Err(TreeDefect::TrailingRecords {
                consumed: cursor,
                total: records.len(),
            });
        }
        let tree = Self { root };
        tree.check_invariants()?;
        Ok(tree)
    }
}
