//! The B+tree's mutating operations: insertion, leaf splitting, and
//! new-root promotion, plus the table-level API the REPL drives.

use super::cursor::Cursor;
use super::node::{self, NodeType, Page};
use super::pager::Pager;
use super::row::{self, Row};
use crate::errors::Error;
use std::path::Path;
use tracing::{debug, warn};

pub struct Table {
    pub pager: Pager,
    pub root_page_num: usize,
}

/// Outcome of `execute_insert`. `TableFull` is retained for interface
/// continuity with the source tutorial's enum — it is never produced by
/// this engine's insert path, since the capacity that would trigger it
/// (`TABLE_MAX_PAGES` leaves' worth of rows with no internal-node split
/// support) is unreachable before the unimplemented non-root-split path
/// aborts first.
#[derive(Debug, PartialEq, Eq)]
pub enum ExecuteResult {
    Success,
    DuplicateKey,
    TableFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Internal,
}

/// One step of an in-order page walk, used by the `.btree` meta-command.
#[derive(Debug)]
pub struct BTreeEvent {
    pub indent: usize,
    pub kind: NodeKind,
    pub count: u32,
    pub key: Option<u32>,
}

impl Table {
    /// Opens (or creates) the database file and initializes page 0 as an
    /// empty leaf root if the file was just created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Table, Error> {
        let mut pager = Pager::open(path)?;
        let root_page_num = 0;

        if pager.num_pages() == 0 {
            let root = pager.get_page(root_page_num)?;
            node::initialize_leaf_node(root);
            node::set_is_root(root, true);
        }

        Ok(Table { pager, root_page_num })
    }

    /// Flushes and closes the pager.
    pub fn close(&mut self) -> Result<(), Error> {
        self.pager.close()
    }

    pub fn execute_insert(&mut self, row: &Row) -> Result<ExecuteResult, Error> {
        let key = row.id;
        let mut cursor = Cursor::table_find(self, key)?;

        let num_cells = {
            let page = cursor.table.pager.get_page(cursor.page_num)?;
            node::leaf_num_cells(page) as usize
        };

        if cursor.cell_num < num_cells {
            let key_at_cursor = {
                let page = cursor.table.pager.get_page(cursor.page_num)?;
                node::leaf_key(page, cursor.cell_num)
            };
            if key_at_cursor == key {
                return Ok(ExecuteResult::DuplicateKey);
            }
        }

        if num_cells >= node::LEAF_NODE_MAX_CELLS {
            debug!(key, num_cells, "Leaf full, splitting.");
            leaf_split_and_insert(&mut cursor, key, row)?;
        } else {
            leaf_insert(&mut cursor, key, row)?;
        }

        Ok(ExecuteResult::Success)
    }

    /// Streams every row in ascending key order to `sink`.
    pub fn execute_select<F: FnMut(&Row)>(&mut self, mut sink: F) -> Result<(), Error> {
        let mut cursor = Cursor::table_start(self)?;
        while !cursor.end_of_table {
            let row = cursor.value()?;
            sink(&row);
            cursor.advance()?;
        }
        Ok(())
    }

    /// An in-order walk of the tree's pages, for the `.btree` meta-command.
    pub fn dump_btree(&mut self) -> Result<Vec<BTreeEvent>, Error> {
        let mut events = Vec::new();
        let root_page_num = self.root_page_num;
        self.dump_node(root_page_num, 0, &mut events)?;
        Ok(events)
    }

    fn dump_node(
        &mut self,
        page_num: usize,
        indent: usize,
        events: &mut Vec<BTreeEvent>,
    ) -> Result<(), Error> {
        let node_type = {
            let page = self.pager.get_page(page_num)?;
            node::node_type(page)?
        };

        match node_type {
            NodeType::Leaf => {
                let num_cells = {
                    let page = self.pager.get_page(page_num)?;
                    node::leaf_num_cells(page)
                };
                events.push(BTreeEvent {
                    indent,
                    kind: NodeKind::Leaf,
                    count: num_cells,
                    key: None,
                });
                for i in 0..num_cells as usize {
                    let key = {
                        let page = self.pager.get_page(page_num)?;
                        node::leaf_key(page, i)
                    };
                    events.push(BTreeEvent {
                        indent: indent + 1,
                        kind: NodeKind::Leaf,
                        count: 0,
                        key: Some(key),
                    });
                }
            }
            NodeType::Internal => {
                let num_keys = {
                    let page = self.pager.get_page(page_num)?;
                    node::internal_num_keys(page)
                };
                events.push(BTreeEvent {
                    indent,
                    kind: NodeKind::Internal,
                    count: num_keys,
                    key: None,
                });
                for i in 0..num_keys {
                    let child = {
                        let page = self.pager.get_page(page_num)?;
                        node::internal_child(page, i)?
                    } as usize;
                    self.dump_node(child, indent + 1, events)?;

                    let key = {
                        let page = self.pager.get_page(page_num)?;
                        node::internal_key(page, i)
                    };
                    events.push(BTreeEvent {
                        indent: indent + 1,
                        kind: NodeKind::Internal,
                        count: 0,
                        key: Some(key),
                    });
                }
                let right_child = {
                    let page = self.pager.get_page(page_num)?;
                    node::internal_right_child(page)
                } as usize;
                self.dump_node(right_child, indent + 1, events)?;
            }
        }
        Ok(())
    }
}

/// Shifts cells right to make room, then writes `(key, row)` at the
/// cursor's cell.
fn leaf_insert(cursor: &mut Cursor, key: u32, row: &Row) -> Result<(), Error> {
    let page = cursor.table.pager.get_page(cursor.page_num)?;
    let num_cells = node::leaf_num_cells(page) as usize;

    if cursor.cell_num < num_cells {
        node::shift_leaf_cells_right(page, cursor.cell_num, num_cells - cursor.cell_num);
    }

    node::set_leaf_num_cells(page, num_cells as u32 + 1);
    node::set_leaf_key(page, cursor.cell_num, key);
    let mut buf = [0u8; row::ROW_SIZE];
    row.serialize(&mut buf);
    node::set_leaf_value(page, cursor.cell_num, &buf);
    Ok(())
}

/// Splits a full leaf into two halves, inserting the new `(key, row)` in
/// whichever half it belongs to, then promotes a new root if the leaf that
/// split was the root (the only split path this engine implements — see
/// DESIGN.md and spec.md §9).
fn leaf_split_and_insert(cursor: &mut Cursor, key: u32, row: &Row) -> Result<(), Error> {
    let old_page_num = cursor.page_num;
    let new_page_num = cursor.table.pager.get_unused_page_num();

    // Snapshot the old node's bytes before any mutation: Page is Copy, so
    // this is a cheap value copy rather than a second live borrow.
    let old_snapshot: Page = *cursor.table.pager.get_page(old_page_num)?;
    let old_is_root = node::is_root(&old_snapshot);
    let old_next_leaf = node::leaf_next_leaf(&old_snapshot);

    {
        let new_page = cursor.table.pager.get_page(new_page_num)?;
        node::initialize_leaf_node(new_page);
        node::set_leaf_next_leaf(new_page, old_next_leaf);
    }
    {
        let old_page = cursor.table.pager.get_page(old_page_num)?;
        node::set_leaf_next_leaf(old_page, new_page_num as u32);
    }

    let mut new_row_buf = [0u8; row::ROW_SIZE];
    row.serialize(&mut new_row_buf);

    // All existing keys plus the new one are divided between the old
    // (left) and new (right) halves. Walk virtual positions 0..=MAX from
    // the right so each old cell is read from the untouched snapshot
    // exactly once.
    for i in (0..=node::LEAF_NODE_MAX_CELLS).rev() {
        let dest_page_num = if i >= node::LEAF_NODE_LEFT_SPLIT_COUNT {
            new_page_num
        } else {
            old_page_num
        };
        let dest_cell_num = i % node::LEAF_NODE_LEFT_SPLIT_COUNT;

        if i == cursor.cell_num {
            let dest_page = cursor.table.pager.get_page(dest_page_num)?;
            node::set_leaf_key(dest_page, dest_cell_num, key);
            node::set_leaf_value(dest_page, dest_cell_num, &new_row_buf);
        } else {
            let src_cell_num = if i > cursor.cell_num { i - 1 } else { i };
            let cell = node::leaf_cell(&old_snapshot, src_cell_num).to_vec();
            let dest_page = cursor.table.pager.get_page(dest_page_num)?;
            node::set_leaf_cell(dest_page, dest_cell_num, &cell);
        }
    }

    {
        let old_page = cursor.table.pager.get_page(old_page_num)?;
        node::set_leaf_num_cells(old_page, node::LEAF_NODE_LEFT_SPLIT_COUNT as u32);
    }
    {
        let new_page = cursor.table.pager.get_page(new_page_num)?;
        node::set_leaf_num_cells(new_page, node::LEAF_NODE_RIGHT_SPLIT_COUNT as u32);
    }

    if old_is_root {
        create_new_root(cursor.table, new_page_num)?;
        Ok(())
    } else {
        warn!("Attempted to split a non-root leaf.");
        Err(Error::Unimplemented(
            "Need to implement updating parent after split",
        ))
    }
}

/// Re-initializes the root page as an internal node with two children:
/// the former root's content, copied to a fresh left-child page, and the
/// already-allocated right child.
fn create_new_root(table: &mut Table, right_child_page_num: usize) -> Result<(), Error> {
    let root_page_num = table.root_page_num;
    let left_child_page_num = table.pager.get_unused_page_num();

    debug!(right_child_page_num, left_child_page_num, "Creating new root.");

    let root_snapshot: Page = *table.pager.get_page(root_page_num)?;

    {
        let left_child = table.pager.get_page(left_child_page_num)?;
        *left_child = root_snapshot;
        node::set_is_root(left_child, false);
    }

    let left_child_max_key = {
        let left_child = table.pager.get_page(left_child_page_num)?;
        node::max_key(left_child)?
    };

    let root = table.pager.get_page(root_page_num)?;
    node::initialize_internal_node(root);
    node::set_is_root(root, true);
    node::set_internal_num_keys(root, 1);
    node::set_internal_child(root, 0, left_child_page_num as u32);
    node::set_internal_key(root, 0, left_child_max_key);
    node::set_internal_right_child(root, right_child_page_num as u32);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn temp_table() -> (NamedTempFile, Table) {
        let file = NamedTempFile::new().unwrap();
        let table = Table::open(file.path()).unwrap();
        (file, table)
    }

    fn collect(table: &mut Table) -> Vec<Row> {
        let mut rows = Vec::new();
        table.execute_select(|r| rows.push(r.clone())).unwrap();
        rows
    }

    #[test]
    fn insert_then_select() {
        let (_file, mut table) = temp_table();
        let row = Row::new(1, "user1", "person1@example.com");
        assert_eq!(table.execute_insert(&row).unwrap(), ExecuteResult::Success);
        let rows = collect(&mut table);
        assert_eq!(rows, vec![row]);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let (_file, mut table) = temp_table();
        let row = Row::new(1, "a", "a@x");
        assert_eq!(table.execute_insert(&row).unwrap(), ExecuteResult::Success);
        let dup = Row::new(1, "b", "b@x");
        assert_eq!(
            table.execute_insert(&dup).unwrap(),
            ExecuteResult::DuplicateKey
        );
        let rows = collect(&mut table);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].username_str(), "a");
    }

    #[test]
    fn keys_stay_in_ascending_order_after_unordered_inserts() {
        let (_file, mut table) = temp_table();
        for id in [5u32, 1, 3, 2, 4] {
            let row = Row::new(id, "u", "u@x");
            assert_eq!(table.execute_insert(&row).unwrap(), ExecuteResult::Success);
        }
        let rows = collect(&mut table);
        let ids: Vec<u32> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn capacity_boundary_splits_and_preserves_order() {
        let (_file, mut table) = temp_table();
        let total = node::LEAF_NODE_MAX_CELLS + 1;
        for id in 1..=total as u32 {
            let row = Row::new(id, "u", "u@x");
            assert_eq!(table.execute_insert(&row).unwrap(), ExecuteResult::Success);
        }
        let rows = collect(&mut table);
        let ids: Vec<u32> = rows.iter().map(|r| r.id).collect();
        let expected: Vec<u32> = (1..=total as u32).collect();
        assert_eq!(ids, expected);

        let events = table.dump_btree().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e.kind, NodeKind::Internal) && e.key.is_none()));
    }

    #[test]
    fn persists_across_reopen() {
        let file = NamedTempFile::new().unwrap();
        {
            let mut table = Table::open(file.path()).unwrap();
            let row = Row::new(1, "user1", "person1@example.com");
            table.execute_insert(&row).unwrap();
            table.close().unwrap();
        }
        let mut table = Table::open(file.path()).unwrap();
        let rows = collect(&mut table);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].username_str(), "user1");
    }

    #[test]
    fn leaf_linkage_visits_every_key_once_after_split() {
        let (_file, mut table) = temp_table();
        let total = node::LEAF_NODE_MAX_CELLS + 1;
        for id in 1..=total as u32 {
            table.execute_insert(&Row::new(id, "u", "u@x")).unwrap();
        }
        let rows = collect(&mut table);
        assert_eq!(rows.len(), total);
        let mut seen = std::collections::HashSet::new();
        for r in &rows {
            assert!(seen.insert(r.id), "key {} visited twice", r.id);
        }
    }
}
