use std::cmp::Ordering;
use std::mem;
use std::ptr::NonNull;

use log::trace;

use crate::node::{Color, Link, RBNode, color_of, minimum_from};

// PROVE: any node with height `h` has black height at least `h/2`
// PROVE: the subtree located at any node `x` contains at least `2^bh(x) - 1` nodes (use induction)
// LEMMA: An RBTree with `n` internal nodes has height at most `2*log₂(n+1)`

/// A red-black tree over caller-owned nodes.
///
/// The tree stores only link topology. It never allocates or frees a node:
/// callers construct [`RBNode`]s, keep them alive while attached, and
/// reclaim them after detaching. Lookups report absence with `None`;
/// structural failures (absent arguments, a rotation missing its pivot
/// child) report `false` without rewriting any link.
///
/// After every completed [`insert`](RBTree::insert) and
/// [`delete`](RBTree::delete):
/// 1. every node is red or black,
/// 2. the root is black,
/// 3. every absent child reads as black,
/// 4. a red node never has a red parent,
/// 5. all paths from a node down to a leaf cross the same number of black
///    nodes.
///
/// The fixup procedures may violate 2 and 4 transiently while they walk.
pub struct RBTree<K> {
    root: Link<K>,
}

impl<K> RBTree<K> {
    /// Creates an empty tree.
    pub const fn new() -> Self {
        RBTree { root: None }
    }

    pub fn root(&self) -> Link<K> {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

impl<K> Default for RBTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> RBTree<K> {
    /// Descends from the root comparing `key` at each node: a match returns
    /// that node, otherwise the last node visited (the would-be parent of
    /// `key`) comes back. `None` only for an empty tree.
    ///
    /// # Safety
    /// All nodes attached to this tree must be alive and consistently
    /// linked.
    unsafe fn search(&self, key: &K) -> Link<K> {
        let mut last = None;
        let mut cur = self.root;
        while let Some(n) = cur {
            last = cur;
            let node = unsafe { n.as_ref() };
            match key.cmp(&node.key) {
                Ordering::Equal => return cur,
                Ordering::Less => cur = node.left,
                Ordering::Greater => cur = node.right,
            }
        }
        last
    }

    /// Looks up a node by key.
    ///
    /// Returns `None` both for a missing key and for an empty tree.
    ///
    /// # Safety
    /// All nodes attached to this tree must be alive and consistently
    /// linked.
    pub unsafe fn find(&self, key: &K) -> Link<K> {
        let hit = unsafe { self.search(key) }?;
        if unsafe { &hit.as_ref().key } == key {
            Some(hit)
        } else {
            None
        }
    }

    /// Replaces the subtree rooted at `u` with the subtree rooted at `v` in
    /// `u`'s parent slot. Does nothing when `u` is absent.
    ///
    /// `u`'s own links are left as they were; only the attachment point
    /// changes.
    ///
    /// # Safety
    /// `u`, when present, must be attached to this tree; `v`, when present,
    /// must be alive.
    unsafe fn transplant(&mut self, u: Link<K>, v: Link<K>) {
        let Some(u) = u else { return };
        let parent = unsafe { u.as_ref().parent };
        match parent {
            None => self.root = v,
            Some(p) => unsafe {
                let p = p.as_ptr();
                if (*p).left == Some(u) {
                    (*p).left = v;
                } else {
                    (*p).right = v;
                }
            },
        }
        if let Some(v) = v {
            unsafe { (*v.as_ptr()).parent = parent };
        }
    }

    /// Rotates the subtree at `x` leftward: `x`'s right child takes `x`'s
    /// position and `x` reattaches as its left child. The in-order key
    /// sequence is unchanged; `x` descends one level.
    ///
    /// Returns `false`, rewriting nothing, when `x` is absent or has no
    /// right child.
    ///
    /// # Safety
    /// `x`, when present, must be attached to this tree with alive,
    /// consistently linked neighbors.
    unsafe fn left_rotate(&mut self, x: Link<K>) -> bool {
        let Some(x) = x else { return false };
        let right = unsafe { x.as_ref().right };
        let Some(y) = right else { return false };
        trace!("left_rotate: {:p} descends under {:p}", x, y);
        unsafe {
            // y's left subtree becomes x's right subtree
            (*x.as_ptr()).right = (*y.as_ptr()).left;
            if let Some(mid) = (*y.as_ptr()).left {
                (*mid.as_ptr()).parent = Some(x);
            }
            // y takes x's place, then x reattaches below it
            self.transplant(Some(x), Some(y));
            (*y.as_ptr()).left = Some(x);
            (*x.as_ptr()).parent = Some(y);
        }
        true
    }

    /// Mirror image of [`left_rotate`](RBTree::left_rotate): requires a left
    /// child, which ascends while `x` becomes its right child.
    ///
    /// # Safety
    /// Same contract as [`left_rotate`](RBTree::left_rotate).
    unsafe fn right_rotate(&mut self, x: Link<K>) -> bool {
        let Some(x) = x else { return false };
        let left = unsafe { x.as_ref().left };
        let Some(y) = left else { return false };
        trace!("right_rotate: {:p} descends under {:p}", x, y);
        unsafe {
            (*x.as_ptr()).left = (*y.as_ptr()).right;
            if let Some(mid) = (*y.as_ptr()).right {
                (*mid.as_ptr()).parent = Some(x);
            }
            self.transplant(Some(x), Some(y));
            (*y.as_ptr()).right = Some(x);
            (*x.as_ptr()).parent = Some(y);
        }
        true
    }

    /// Attaches `node` to the tree, rebalancing as needed.
    ///
    /// Returns `false` only when `node` is absent. Duplicate keys are
    /// accepted: an equal key compares as "not less" at every step of the
    /// descent, so a duplicate always lands in the right subtree of any
    /// equal-keyed node it passes.
    ///
    /// # Safety
    /// `node`, when present, must point to an alive node not currently
    /// attached to any tree, and it must stay alive for as long as it is
    /// attached. All nodes already attached must be alive and consistently
    /// linked.
    pub unsafe fn insert(&mut self, node: Link<K>) -> bool {
        let Some(z) = node else { return false };
        // descend to the attachment point, always a leaf position
        let mut parent = None;
        let mut goes_left = false;
        let mut cur = self.root;
        while let Some(n) = cur {
            parent = cur;
            unsafe {
                goes_left = z.as_ref().key < n.as_ref().key;
                cur = if goes_left {
                    n.as_ref().left
                } else {
                    n.as_ref().right
                };
            }
        }
        unsafe {
            let z_ptr = z.as_ptr();
            (*z_ptr).parent = parent;
            (*z_ptr).left = None;
            (*z_ptr).right = None;
            (*z_ptr).color = Color::Red;
            match parent {
                None => self.root = node,
                Some(p) => {
                    if goes_left {
                        (*p.as_ptr()).left = node;
                    } else {
                        (*p.as_ptr()).right = node;
                    }
                }
            }
            self.insert_fixup(z);
        }
        true
    }

    /// Restores the invariants after `z` was attached red.
    ///
    /// Walks upward while the parent is red. A red uncle pushes the
    /// violation two levels up by recoloring alone; a black-or-absent uncle
    /// is repaired in place with at most two rotations, which ends the
    /// walk. The root is forced black afterwards.
    ///
    /// # Safety
    /// `z` must be attached to this tree, with all attached nodes alive and
    /// consistently linked.
    unsafe fn insert_fixup(&mut self, mut z: NonNull<RBNode<K>>) {
        loop {
            let Some(p) = (unsafe { z.as_ref().parent }) else {
                break;
            };
            let p_color = unsafe { p.as_ref().color };
            if p_color.is_black() {
                break;
            }
            // the parent is red, so it is not the root and the grandparent
            // exists
            let Some(pp) = (unsafe { p.as_ref().parent }) else {
                break;
            };
            let uncle = unsafe { z.as_ref().uncle() };
            let uncle_color = unsafe { color_of(uncle) };
            if uncle_color.is_red() {
                // red uncle: pull the grandparent's blackness down one
                // level and carry the violation up two
                trace!("insert_fixup: red uncle of {:p}, recoloring", z);
                unsafe {
                    (*p.as_ptr()).color = Color::Black;
                    if let Some(u) = uncle {
                        (*u.as_ptr()).color = Color::Black;
                    }
                    (*pp.as_ptr()).color = Color::Red;
                }
                z = pp;
                continue;
            }
            let p_is_left = unsafe { pp.as_ref().left } == Some(p);
            if p_is_left {
                let p_right = unsafe { p.as_ref().right };
                let mid = if p_right == Some(z) {
                    // zig-zag: straighten into a left-left line first
                    unsafe { self.left_rotate(Some(p)) };
                    z
                } else {
                    p
                };
                // the middle key takes the grandparent's place, black on top
                trace!("insert_fixup: rotating {:p} over {:p}", mid, pp);
                unsafe {
                    (*mid.as_ptr()).color = Color::Black;
                    (*pp.as_ptr()).color = Color::Red;
                    self.right_rotate(Some(pp));
                }
            } else {
                let p_left = unsafe { p.as_ref().left };
                let mid = if p_left == Some(z) {
                    unsafe { self.right_rotate(Some(p)) };
                    z
                } else {
                    p
                };
                trace!("insert_fixup: rotating {:p} over {:p}", mid, pp);
                unsafe {
                    (*mid.as_ptr()).color = Color::Black;
                    (*pp.as_ptr()).color = Color::Red;
                    self.left_rotate(Some(pp));
                }
            }
            // the subtree root is black again, nothing propagates further
            break;
        }
        if let Some(root) = self.root {
            unsafe { (*root.as_ptr()).color = Color::Black };
        }
    }

    /// Detaches `node` from the tree, rebalancing as needed, and clears the
    /// node's own links so it reads as freshly constructed.
    ///
    /// Returns `false` only when `node` is absent; a present node must
    /// currently be a member of this tree.
    ///
    /// # Safety
    /// `node`, when present, must point to an alive node attached to this
    /// tree, with all attached nodes alive and consistently linked.
    pub unsafe fn delete(&mut self, node: Link<K>) -> bool {
        let Some(z) = node else { return false };
        let z_left = unsafe { z.as_ref().left };
        let z_right = unsafe { z.as_ref().right };

        // the color of the node actually spliced out of its position;
        // removing a black one leaves that path one black short
        let mut spliced_color = unsafe { z.as_ref().color };
        let x: Link<K>;
        let x_parent: Link<K>;

        match (z_left, z_right) {
            (None, _) => {
                x = z_right;
                x_parent = unsafe { z.as_ref().parent };
                unsafe { self.transplant(node, z_right) };
            }
            (_, None) => {
                x = z_left;
                x_parent = unsafe { z.as_ref().parent };
                unsafe { self.transplant(node, z_left) };
            }
            (Some(left), Some(right)) => {
                // the successor of a two-child node has no left child; it
                // takes z's position and color
                let y = unsafe { minimum_from(right) };
                spliced_color = unsafe { y.as_ref().color };
                x = unsafe { y.as_ref().right };
                let y_parent = unsafe { y.as_ref().parent };
                if y_parent == Some(z) {
                    x_parent = Some(y);
                } else {
                    x_parent = y_parent;
                    unsafe {
                        self.transplant(Some(y), x);
                        (*y.as_ptr()).right = z_right;
                        (*right.as_ptr()).parent = Some(y);
                    }
                }
                unsafe {
                    self.transplant(node, Some(y));
                    (*y.as_ptr()).left = z_left;
                    (*left.as_ptr()).parent = Some(y);
                    (*y.as_ptr()).color = z.as_ref().color;
                }
            }
        }

        // z is out of the tree; a detached node looks freshly constructed
        unsafe {
            let z_ptr = z.as_ptr();
            (*z_ptr).parent = None;
            (*z_ptr).left = None;
            (*z_ptr).right = None;
        }

        if spliced_color.is_black() {
            unsafe { self.delete_fixup(x, x_parent) };
        }
        true
    }

    /// Restores the invariants after a black node was spliced out, starting
    /// from `x`, the node now occupying the spliced slot.
    ///
    /// `x` may be absent, so `parent` names the slot it occupies; that is
    /// what lets an absent replacement act as the black leaf it reads as.
    /// Walks upward while `x` is a non-root black: a red sibling is rotated
    /// down to expose a black one; a black sibling with black children
    /// gives up one black and moves the deficit up; otherwise one or two
    /// rotations repay the deficit and end the walk. The final occupant is
    /// forced black.
    ///
    /// # Safety
    /// `parent`, when present, must be attached to this tree and `x`, when
    /// present, must occupy one of its child slots (`x` is the root when
    /// `parent` is absent). All attached nodes alive and consistently
    /// linked.
    unsafe fn delete_fixup(&mut self, mut x: Link<K>, mut parent: Link<K>) {
        loop {
            let x_color = unsafe { color_of(x) };
            if x == self.root || x_color.is_red() {
                break;
            }
            let Some(p) = parent else { break };
            let p_left = unsafe { p.as_ref().left };
            if x == p_left {
                // the deficit side is one black short, so the sibling
                // subtree cannot be empty
                let sib = unsafe { p.as_ref().right };
                let Some(mut w) = sib else { break };
                let w_color = unsafe { w.as_ref().color };
                if w_color.is_red() {
                    // red sibling: rotate it up to expose a black one
                    trace!("delete_fixup: red sibling {:p}", w);
                    unsafe {
                        (*w.as_ptr()).color = Color::Black;
                        (*p.as_ptr()).color = Color::Red;
                        self.left_rotate(Some(p));
                    }
                    let sib = unsafe { p.as_ref().right };
                    let Some(next) = sib else { break };
                    w = next;
                }
                let w_has_red = unsafe { w.as_ref().has_red_children() };
                if !w_has_red {
                    // both of w's children black: drain one black from both
                    // sides of p and move the deficit up
                    trace!("delete_fixup: recoloring sibling {:p}, deficit moves up", w);
                    unsafe { (*w.as_ptr()).color = Color::Red };
                    x = Some(p);
                    parent = unsafe { p.as_ref().parent };
                } else {
                    let w_right_color = unsafe { color_of(w.as_ref().right) };
                    if w_right_color.is_black() {
                        // red near-child only: bring it to the far side
                        let w_left = unsafe { w.as_ref().left };
                        if let Some(wl) = w_left {
                            unsafe {
                                mem::swap(&mut (*w.as_ptr()).color, &mut (*wl.as_ptr()).color);
                                self.right_rotate(Some(w));
                            }
                        }
                        let sib = unsafe { p.as_ref().right };
                        let Some(next) = sib else { break };
                        w = next;
                    }
                    // red far child: one rotation repays the missing black
                    trace!("delete_fixup: terminal rotation at {:p}", p);
                    unsafe {
                        (*w.as_ptr()).color = p.as_ref().color;
                        (*p.as_ptr()).color = Color::Black;
                        if let Some(wr) = w.as_ref().right {
                            (*wr.as_ptr()).color = Color::Black;
                        }
                        self.left_rotate(Some(p));
                    }
                    x = self.root;
                    parent = None;
                }
            } else {
                // mirror image: x occupies the right slot
                let sib = p_left;
                let Some(mut w) = sib else { break };
                let w_color = unsafe { w.as_ref().color };
                if w_color.is_red() {
                    trace!("delete_fixup: red sibling {:p}", w);
                    unsafe {
                        (*w.as_ptr()).color = Color::Black;
                        (*p.as_ptr()).color = Color::Red;
                        self.right_rotate(Some(p));
                    }
                    let sib = unsafe { p.as_ref().left };
                    let Some(next) = sib else { break };
                    w = next;
                }
                let w_has_red = unsafe { w.as_ref().has_red_children() };
                if !w_has_red {
                    trace!("delete_fixup: recoloring sibling {:p}, deficit moves up", w);
                    unsafe { (*w.as_ptr()).color = Color::Red };
                    x = Some(p);
                    parent = unsafe { p.as_ref().parent };
                } else {
                    let w_left_color = unsafe { color_of(w.as_ref().left) };
                    if w_left_color.is_black() {
                        let w_right = unsafe { w.as_ref().right };
                        if let Some(wr) = w_right {
                            unsafe {
                                mem::swap(&mut (*w.as_ptr()).color, &mut (*wr.as_ptr()).color);
                                self.left_rotate(Some(w));
                            }
                        }
                        let sib = unsafe { p.as_ref().left };
                        let Some(next) = sib else { break };
                        w = next;
                    }
                    trace!("delete_fixup: terminal rotation at {:p}", p);
                    unsafe {
                        (*w.as_ptr()).color = p.as_ref().color;
                        (*p.as_ptr()).color = Color::Black;
                        if let Some(wl) = w.as_ref().left {
                            (*wl.as_ptr()).color = Color::Black;
                        }
                        self.right_rotate(Some(p));
                    }
                    x = self.root;
                    parent = None;
                }
            }
        }
        if let Some(x) = x {
            unsafe { (*x.as_ptr()).color = Color::Black };
        }
    }
}
