//! B+tree node layout: interprets a raw page buffer as either a leaf or an
//! internal node via fixed header/body offsets.
//!
//! Every accessor here is a free function over a borrowed page buffer
//! rather than a method on an owned node struct — a page is borrowed from
//! the pager for the duration of one operation and never cached, per the
//! "page references, not pointers" rule: nothing here outlives the pager
//! slot it reads from.

use super::row::ROW_SIZE;
use crate::errors::Error;

pub const PAGE_SIZE: usize = 4096;
pub const TABLE_MAX_PAGES: usize = 100;

pub type Page = [u8; PAGE_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Leaf,
    Internal,
}

// --- Common node header ---

const NODE_TYPE_OFFSET: usize = 0;
const NODE_TYPE_SIZE: usize = 1;

const IS_ROOT_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
const IS_ROOT_SIZE: usize = 1;

const PARENT_POINTER_OFFSET: usize = IS_ROOT_OFFSET + IS_ROOT_SIZE;
const PARENT_POINTER_SIZE: usize = 4;

pub const COMMON_NODE_HEADER_SIZE: usize = NODE_TYPE_SIZE + IS_ROOT_SIZE + PARENT_POINTER_SIZE;

// --- Leaf node header ---

const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const LEAF_NODE_NUM_CELLS_SIZE: usize = 4;

const LEAF_NODE_NEXT_LEAF_OFFSET: usize = LEAF_NODE_NUM_CELLS_OFFSET + LEAF_NODE_NUM_CELLS_SIZE;
const LEAF_NODE_NEXT_LEAF_SIZE: usize = 4;

pub const LEAF_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + LEAF_NODE_NUM_CELLS_SIZE + LEAF_NODE_NEXT_LEAF_SIZE;

// --- Leaf node body ---

const LEAF_NODE_KEY_SIZE: usize = 4;
const LEAF_NODE_VALUE_SIZE: usize = ROW_SIZE;
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;

/// Maximum number of `(key, row)` cells a leaf node can hold.
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;

/// Number of cells that go to the right (new) node on a split.
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;
/// Number of cells that stay in the left (old) node on a split.
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize =
    (LEAF_NODE_MAX_CELLS + 1) - LEAF_NODE_RIGHT_SPLIT_COUNT;

// --- Internal node header ---

const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const INTERNAL_NODE_NUM_KEYS_SIZE: usize = 4;

const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize =
    INTERNAL_NODE_NUM_KEYS_OFFSET + INTERNAL_NODE_NUM_KEYS_SIZE;
const INTERNAL_NODE_RIGHT_CHILD_SIZE: usize = 4;

const INTERNAL_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + INTERNAL_NODE_NUM_KEYS_SIZE + INTERNAL_NODE_RIGHT_CHILD_SIZE;

// --- Internal node body ---

const INTERNAL_NODE_CHILD_SIZE: usize = 4;
const INTERNAL_NODE_KEY_SIZE: usize = 4;
const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;

fn read_u32(page: &Page, offset: usize) -> u32 {
    u32::from_le_bytes(page[offset..offset + 4].try_into().unwrap())
}

fn write_u32(page: &mut Page, offset: usize, value: u32) {
    page[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

// --- Common header accessors ---

pub fn node_type(page: &Page) -> Result<NodeType, Error> {
    match page[NODE_TYPE_OFFSET] {
        0 => Ok(NodeType::Leaf),
        1 => Ok(NodeType::Internal),
        other => Err(Error::CorruptNode(format!("invalid node type byte: {}", other))),
    }
}

pub fn set_node_type(page: &mut Page, kind: NodeType) {
    page[NODE_TYPE_OFFSET] = match kind {
        NodeType::Leaf => 0,
        NodeType::Internal => 1,
    };
}

pub fn is_root(page: &Page) -> bool {
    page[IS_ROOT_OFFSET] == 1
}

pub fn set_is_root(page: &mut Page, value: bool) {
    page[IS_ROOT_OFFSET] = value as u8;
}

pub fn parent_pointer(page: &Page) -> u32 {
    read_u32(page, PARENT_POINTER_OFFSET)
}

pub fn set_parent_pointer(page: &mut Page, parent: u32) {
    write_u32(page, PARENT_POINTER_OFFSET, parent);
}

// --- Leaf node accessors ---

pub fn leaf_num_cells(page: &Page) -> u32 {
    read_u32(page, LEAF_NODE_NUM_CELLS_OFFSET)
}

pub fn set_leaf_num_cells(page: &mut Page, num_cells: u32) {
    write_u32(page, LEAF_NODE_NUM_CELLS_OFFSET, num_cells);
}

pub fn leaf_next_leaf(page: &Page) -> u32 {
    read_u32(page, LEAF_NODE_NEXT_LEAF_OFFSET)
}

pub fn set_leaf_next_leaf(page: &mut Page, next: u32) {
    write_u32(page, LEAF_NODE_NEXT_LEAF_OFFSET, next);
}

fn leaf_cell_offset(cell_num: usize) -> usize {
    LEAF_NODE_HEADER_SIZE + cell_num * LEAF_NODE_CELL_SIZE
}

pub fn leaf_cell(page: &Page, cell_num: usize) -> &[u8] {
    let off = leaf_cell_offset(cell_num);
    &page[off..off + LEAF_NODE_CELL_SIZE]
}

pub fn leaf_cell_mut(page: &mut Page, cell_num: usize) -> &mut [u8] {
    let off = leaf_cell_offset(cell_num);
    &mut page[off..off + LEAF_NODE_CELL_SIZE]
}

/// Overwrites an entire `(key, value)` cell with raw bytes copied from
/// elsewhere (another node's cell, or a value computed off to the side).
pub fn set_leaf_cell(page: &mut Page, cell_num: usize, cell: &[u8]) {
    debug_assert_eq!(cell.len(), LEAF_NODE_CELL_SIZE);
    let off = leaf_cell_offset(cell_num);
    page[off..off + LEAF_NODE_CELL_SIZE].copy_from_slice(cell);
}

/// Shifts `num_cells` cells starting at `from_cell` one slot to the right,
/// making room for a new cell at `from_cell`. Handles the overlapping
/// source/destination ranges safely via `copy_within`.
pub fn shift_leaf_cells_right(page: &mut Page, from_cell: usize, num_cells: usize) {
    let src_start = leaf_cell_offset(from_cell);
    let src_end = src_start + num_cells * LEAF_NODE_CELL_SIZE;
    let dest_start = src_start + LEAF_NODE_CELL_SIZE;
    page.copy_within(src_start..src_end, dest_start);
}

pub fn leaf_key(page: &Page, cell_num: usize) -> u32 {
    let off = leaf_cell_offset(cell_num);
    read_u32(page, off)
}

pub fn set_leaf_key(page: &mut Page, cell_num: usize, key: u32) {
    let off = leaf_cell_offset(cell_num);
    write_u32(page, off, key);
}

pub fn leaf_value(page: &Page, cell_num: usize) -> &[u8] {
    let off = leaf_cell_offset(cell_num) + LEAF_NODE_KEY_SIZE;
    &page[off..off + LEAF_NODE_VALUE_SIZE]
}

pub fn set_leaf_value(page: &mut Page, cell_num: usize, value: &[u8]) {
    debug_assert_eq!(value.len(), LEAF_NODE_VALUE_SIZE);
    let off = leaf_cell_offset(cell_num) + LEAF_NODE_KEY_SIZE;
    page[off..off + LEAF_NODE_VALUE_SIZE].copy_from_slice(value);
}

pub fn initialize_leaf_node(page: &mut Page) {
    set_node_type(page, NodeType::Leaf);
    set_is_root(page, false);
    set_leaf_num_cells(page, 0);
    set_leaf_next_leaf(page, 0);
}

// --- Internal node accessors ---

pub fn internal_num_keys(page: &Page) -> u32 {
    read_u32(page, INTERNAL_NODE_NUM_KEYS_OFFSET)
}

pub fn set_internal_num_keys(page: &mut Page, num_keys: u32) {
    write_u32(page, INTERNAL_NODE_NUM_KEYS_OFFSET, num_keys);
}

pub fn internal_right_child(page: &Page) -> u32 {
    read_u32(page, INTERNAL_NODE_RIGHT_CHILD_OFFSET)
}

pub fn set_internal_right_child(page: &mut Page, right_child: u32) {
    write_u32(page, INTERNAL_NODE_RIGHT_CHILD_OFFSET, right_child);
}

fn internal_cell_offset(cell_num: u32) -> usize {
    INTERNAL_NODE_HEADER_SIZE + cell_num as usize * INTERNAL_NODE_CELL_SIZE
}

/// Returns the child page number at `child_num`. If `child_num` equals the
/// node's `num_keys`, returns the right child; `child_num > num_keys` is
/// fatal (spec.md §4.3/§9 Open Question 2).
pub fn internal_child(page: &Page, child_num: u32) -> Result<u32, Error> {
    let num_keys = internal_num_keys(page);
    if child_num > num_keys {
        return Err(Error::CorruptNode(format!(
            "internal node child index {} exceeds num_keys {}",
            child_num, num_keys
        )));
    }
    if child_num == num_keys {
        Ok(internal_right_child(page))
    } else {
        let off = internal_cell_offset(child_num);
        Ok(read_u32(page, off))
    }
}

pub fn set_internal_child(page: &mut Page, child_num: u32, child_page_num: u32) {
    let off = internal_cell_offset(child_num);
    write_u32(page, off, child_page_num);
}

pub fn internal_key(page: &Page, key_num: u32) -> u32 {
    let off = internal_cell_offset(key_num) + INTERNAL_NODE_CHILD_SIZE;
    read_u32(page, off)
}

pub fn set_internal_key(page: &mut Page, key_num: u32, key: u32) {
    let off = internal_cell_offset(key_num) + INTERNAL_NODE_CHILD_SIZE;
    write_u32(page, off, key);
}

pub fn initialize_internal_node(page: &mut Page) {
    set_node_type(page, NodeType::Internal);
    set_is_root(page, false);
    set_internal_num_keys(page, 0);
    set_internal_right_child(page, 0);
}

/// The largest key reachable from this node: for a leaf, the last cell's
/// key; for an internal node, the last key (routing keys hold the max key
/// of their left subtree, so the rightmost key here is the subtree max).
pub fn max_key(page: &Page) -> Result<u32, Error> {
    match node_type(page)? {
        NodeType::Leaf => Ok(leaf_key(page, leaf_num_cells(page) as usize - 1)),
        NodeType::Internal => Ok(internal_key(page, internal_num_keys(page) - 1)),
    }
}

/// Named format constants, in the order the `.constants` meta-command
/// prints them.
pub fn constants() -> [(&'static str, usize); 6] {
    [
        ("ROW_SIZE", ROW_SIZE),
        ("COMMON_NODE_HEADER_SIZE", COMMON_NODE_HEADER_SIZE),
        ("LEAF_NODE_HEADER_SIZE", LEAF_NODE_HEADER_SIZE),
        ("LEAF_NODE_CELL_SIZE", LEAF_NODE_CELL_SIZE),
        ("LEAF_NODE_SPACE_FOR_CELLS", LEAF_NODE_SPACE_FOR_CELLS),
        ("LEAF_NODE_MAX_CELLS", LEAF_NODE_MAX_CELLS),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_node_max_cells_fits_page() {
        assert!(LEAF_NODE_MAX_CELLS > 0);
        assert!(LEAF_NODE_LEFT_SPLIT_COUNT >= LEAF_NODE_RIGHT_SPLIT_COUNT);
        assert_eq!(
            LEAF_NODE_LEFT_SPLIT_COUNT + LEAF_NODE_RIGHT_SPLIT_COUNT,
            LEAF_NODE_MAX_CELLS + 1
        );
    }

    #[test]
    fn leaf_cell_round_trip() {
        let mut page = [0u8; PAGE_SIZE];
        initialize_leaf_node(&mut page);
        set_leaf_num_cells(&mut page, 1);
        set_leaf_key(&mut page, 0, 42);
        let value = [7u8; ROW_SIZE];
        set_leaf_value(&mut page, 0, &value);

        assert_eq!(leaf_key(&page, 0), 42);
        assert_eq!(leaf_value(&page, 0), &value[..]);
        assert_eq!(max_key(&page).unwrap(), 42);
    }

    #[test]
    fn internal_child_boundary_returns_right_child() {
        let mut page = [0u8; PAGE_SIZE];
        initialize_internal_node(&mut page);
        set_internal_num_keys(&mut page, 1);
        set_internal_child(&mut page, 0, 5);
        set_internal_key(&mut page, 0, 10);
        set_internal_right_child(&mut page, 9);

        assert_eq!(internal_child(&page, 0).unwrap(), 5);
        assert_eq!(internal_child(&page, 1).unwrap(), 9);
        assert!(internal_child(&page, 2).is_err());
    }

    #[test]
    fn parent_pointer_offset_matches_historical_layout() {
        // The source computes PARENT_POINTER_OFFSET as
        // IS_ROOT_OFFSET + IS_ROOT_OFFSET (a typo for + IS_ROOT_SIZE).
        // Both sizes are 1 here, so the straightforward formula below
        // lands on the same byte offset as the source's.
        assert_eq!(PARENT_POINTER_OFFSET, IS_ROOT_OFFSET + IS_ROOT_OFFSET);
    }
}
