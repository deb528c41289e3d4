//! Shared fixtures for workspace tests.

use crate::block::BlockId;
use crate::library::{BlockDef, BlockLibrary, ConnectionSpec, FieldDef, InputDef, InputKind};
use crate::workspace::Workspace;

fn number_check() -> Option<Vec<String>> {
    Some(vec!["Number".to_string()])
}

/// A small library exercising every connection shape: plain values, checked
/// values, statements, terminal statements and an output+previous hybrid.
pub fn library() -> BlockLibrary {
    [
        BlockDef {
            name: "number".to_string(),
            output: Some(ConnectionSpec {
                check: number_check(),
            }),
            fields: vec![FieldDef {
                name: "NUM".to_string(),
                default_value: "0".to_string(),
            }],
            ..Default::default()
        },
        BlockDef {
            name: "value_passthrough".to_string(),
            output: Some(ConnectionSpec::default()),
            inputs: vec![InputDef {
                name: "CHILD".to_string(),
                kind: InputKind::Value,
                check: None,
            }],
            ..Default::default()
        },
        BlockDef {
            name: "sum".to_string(),
            output: Some(ConnectionSpec {
                check: number_check(),
            }),
            inputs: vec![
                InputDef {
                    name: "A".to_string(),
                    kind: InputKind::Value,
                    check: number_check(),
                },
                InputDef {
                    name: "B".to_string(),
                    kind: InputKind::Value,
                    check: number_check(),
                },
            ],
            ..Default::default()
        },
        BlockDef {
            name: "statement_noop".to_string(),
            previous: Some(ConnectionSpec::default()),
            next: Some(ConnectionSpec::default()),
            ..Default::default()
        },
        BlockDef {
            name: "statement_terminal".to_string(),
            previous: Some(ConnectionSpec::default()),
            ..Default::default()
        },
        BlockDef {
            name: "hybrid".to_string(),
            output: Some(ConnectionSpec::default()),
            previous: Some(ConnectionSpec::default()),
            ..Default::default()
        },
    ]
    .into()
}

pub fn workspace() -> Workspace {
    Workspace::new(library())
}

/// Connects `below` under `above` in a statement stack.
pub fn stack(ws: &mut Workspace, above: BlockId, below: BlockId) {
    let next = ws.blk(above).next.unwrap();
    let previous = ws.blk(below).previous.unwrap();
    assert!(ws.connect(next, previous));
}
