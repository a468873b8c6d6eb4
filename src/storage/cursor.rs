//! Cursor-driven ordered search and in-order traversal over the B+tree.
//!
//! A cursor is a short-lived logical position `(page_num, cell_num,
//! end_of_table)`. It borrows the table for its whole lifetime and must
//! not outlive a single statement (spec.md §9 "Cursor ownership").

use super::node::{self, NodeType};
use super::row::Row;
use super::table::Table;
use crate::errors::Error;

pub struct Cursor<'a> {
    pub table: &'a mut Table,
    pub page_num: usize,
    pub cell_num: usize,
    pub end_of_table: bool,
}

impl<'a> Cursor<'a> {
    /// A cursor at the smallest key in the table (the first cell of the
    /// leftmost leaf), or `end_of_table` if the table is empty.
    pub fn table_start(table: &'a mut Table) -> Result<Self, Error> {
        let mut cursor = Cursor::table_find(table, 0)?;
        let num_cells = node::leaf_num_cells(cursor.table.pager.get_page(cursor.page_num)?);
        cursor.end_of_table = num_cells == 0;
        Ok(cursor)
    }

    /// A cursor at `key`'s exact position, or at the index where `key`
    /// would be inserted. Dispatches on the root's node type.
    pub fn table_find(table: &'a mut Table, key: u32) -> Result<Self, Error> {
        let root_page_num = table.root_page_num;
        let root_type = node::node_type(table.pager.get_page(root_page_num)?)?;
        match root_type {
            NodeType::Leaf => Cursor::leaf_find(table, root_page_num, key),
            NodeType::Internal => Cursor::internal_find(table, root_page_num, key),
        }
    }

    /// Binary search over a leaf's cells for `key`, or the first index
    /// whose key exceeds it.
    fn leaf_find(table: &'a mut Table, page_num: usize, key: u32) -> Result<Self, Error> {
        let page = table.pager.get_page(page_num)?;
        let num_cells = node::leaf_num_cells(page) as usize;

        let mut min_index = 0usize;
        let mut one_past_max_index = num_cells;
        while one_past_max_index != min_index {
            let index = (min_index + one_past_max_index) / 2;
            let key_at_index = node::leaf_key(page, index);
            if key == key_at_index {
                min_index = index;
                break;
            }
            if key < key_at_index {
                one_past_max_index = index;
            } else {
                min_index = index + 1;
            }
        }

        Ok(Cursor {
            table,
            page_num,
            cell_num: min_index,
            end_of_table: false,
        })
    }

    /// Binary search for the smallest child index whose routing key is
    /// `>= key`, then recurse into that child (a leaf or another internal
    /// node).
    fn internal_find(table: &'a mut Table, page_num: usize, key: u32) -> Result<Self, Error> {
        let page = table.pager.get_page(page_num)?;
        let num_keys = node::internal_num_keys(page);

        let mut min_index = 0u32;
        let mut max_index = num_keys; // inclusive of "past the end" -> right_child
        while min_index != max_index {
            let index = (min_index + max_index) / 2;
            let key_at_index = node::internal_key(page, index);
            if key <= key_at_index {
                max_index = index;
            } else {
                min_index = index + 1;
            }
        }

        let child_page_num = node::internal_child(page, min_index)? as usize;
        let child_type = node::node_type(table.pager.get_page(child_page_num)?)?;
        match child_type {
            NodeType::Leaf => Cursor::leaf_find(table, child_page_num, key),
            NodeType::Internal => Cursor::internal_find(table, child_page_num, key),
        }
    }

    /// Decodes the row at the cursor's current position.
    pub fn value(&mut self) -> Result<Row, Error> {
        let page = self.table.pager.get_page(self.page_num)?;
        Ok(Row::deserialize(node::leaf_value(page, self.cell_num)))
    }

    /// Advances to the next cell, following the leaf sibling link when the
    /// current leaf is exhausted.
    pub fn advance(&mut self) -> Result<(), Error> {
        let page = self.table.pager.get_page(self.page_num)?;
        self.cell_num += 1;
        if self.cell_num >= node::leaf_num_cells(page) as usize {
            let next_leaf = node::leaf_next_leaf(page);
            if next_leaf == 0 {
                self.end_of_table = true;
            } else {
                self.page_num = next_leaf as usize;
                self.cell_num = 0;
            }
        }
        Ok(())
    }
}
