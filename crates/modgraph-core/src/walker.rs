// Breadth-first traversal of serde_json trees.
// Arrays and objects are expanded; every other value is reported as a leaf.
// Object keys are reported before their values are visited.
// Knows nothing about mods or identifiers.
use std::collections::VecDeque;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Visit<'a> {
    Key(&'a str),
    Leaf(&'a Value),
}

pub fn walk<'a>(root: &'a Value, mut visit: impl FnMut(Visit<'a>)) {
    let mut queue = VecDeque::new();
    queue.push_back(root);
    while let Some(current) = queue.pop_front() {
        match current {
            Value::Array(items) => queue.extend(items.iter()),
            Value::Object(map) => {
                for (key, value) in map {
                    visit(Visit::Key(key));
                    queue.push_back(value);
                }
            }
            leaf => visit(Visit::Leaf(leaf)),
        }
    }
}

pub fn walk_leaves_mut(root: &mut Value, mut on_leaf: impl FnMut(&mut Value)) {
    let mut queue = VecDeque::new();
    queue.push_back(root);
    while let Some(current) = queue.pop_front() {
        match current {
            Value::Array(items) => queue.extend(items.iter_mut()),
            Value::Object(map) => queue.extend(map.iter_mut().map(|(_, v)| v)),
            _ => on_leaf(current),
        }
    }
}
