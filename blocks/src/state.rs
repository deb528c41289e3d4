//! Opaque serialized block templates.
//!
//! One representation serves both persistence boundaries (YAML and JSON are
//! dispatched at the edge via `common::FileFormat`); shadow descriptions on
//! connections are stored in this form.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::block::BlockId;
use crate::connection::{ConnectionId, ConnectionKind};
use crate::workspace::Workspace;
use common::{FileFormat, SerdeFormatResult};

/// Serialized description of a block and its attached subtree.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    /// Name of the block definition to instantiate.
    pub def: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, String>,
    /// Child subtrees keyed by input name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub inputs: HashMap<String, BlockState>,
    /// Continuation of the statement chain, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Box<BlockState>>,
}

impl BlockState {
    pub fn of(def: &str) -> BlockState {
        BlockState {
            def: def.to_string(),
            ..Default::default()
        }
    }

    pub fn serialize(&self, format: FileFormat) -> String {
        common::serialize(self, format)
    }

    pub fn deserialize(serialized: &str, format: FileFormat) -> SerdeFormatResult<BlockState> {
        common::deserialize(serialized, format)
    }
}

/// Serializes a live block, capturing current field values and every
/// attached child subtree.
pub fn save_block(ws: &Workspace, id: BlockId) -> BlockState {
    let block = ws.blk(id);

    let mut inputs = HashMap::new();
    for slot in &block.inputs {
        if let Some(child) = ws.target_block_of(slot.connection) {
            inputs.insert(slot.name.clone(), save_block(ws, child));
        }
    }

    let next = block
        .next
        .and_then(|next_conn| ws.target_block_of(next_conn))
        .map(|child| Box::new(save_block(ws, child)));

    BlockState {
        def: block.def.clone(),
        fields: block.fields.clone(),
        inputs,
        next,
    }
}

#[derive(Clone, Copy, Default, Debug)]
pub struct MaterializeOptions {
    /// Superior connection the new block should be attached to.
    pub parent_connection: Option<ConnectionId>,
    pub is_shadow: bool,
    pub record_undo: bool,
}

/// Instantiates a serialized block template in the workspace, recursively
/// rebuilding child subtrees and optionally wiring the result under a parent
/// connection.
pub fn materialize(
    ws: &mut Workspace,
    state: &BlockState,
    opts: MaterializeOptions,
) -> anyhow::Result<BlockId> {
    let prev_record_undo = ws.events.record_undo();
    ws.events.set_record_undo(opts.record_undo);
    let result = materialize_internal(ws, state, opts);
    ws.events.set_record_undo(prev_record_undo);
    result
}

fn materialize_internal(
    ws: &mut Workspace,
    state: &BlockState,
    opts: MaterializeOptions,
) -> anyhow::Result<BlockId> {
    let id = ws.spawn_block(&state.def, opts.is_shadow)?;
    // A malformed template must not leave half-built blocks behind: any
    // failure below tears down the block and whatever got attached to it.
    if let Err(err) = populate_block(ws, id, state, opts) {
        ws.dispose_block(id, false);
        return Err(err);
    }
    Ok(id)
}

fn populate_block(
    ws: &mut Workspace,
    id: BlockId,
    state: &BlockState,
    opts: MaterializeOptions,
) -> anyhow::Result<()> {
    for (name, value) in &state.fields {
        ws.blk_mut(id).fields.insert(name.clone(), value.clone());
    }

    for (input_name, child_state) in &state.inputs {
        let slot_connection = ws
            .blk(id)
            .input(input_name)
            .map(|slot| slot.connection)
            .ok_or_else(|| anyhow::anyhow!("Missing expected input: {}", input_name))?;
        materialize_internal(
            ws,
            child_state,
            MaterializeOptions {
                parent_connection: Some(slot_connection),
                ..opts
            },
        )?;
    }

    if let Some(next_state) = &state.next {
        let next_connection = ws
            .blk(id)
            .next
            .ok_or_else(|| anyhow::Error::msg("Block is missing a next connection"))?;
        materialize_internal(
            ws,
            next_state,
            MaterializeOptions {
                parent_connection: Some(next_connection),
                ..opts
            },
        )?;
    }

    if let Some(parent) = opts.parent_connection {
        let inferior = match ws.conn(parent).kind {
            ConnectionKind::ValueInput => ws.blk(id).output.ok_or_else(|| {
                anyhow::Error::msg("Shadow block is missing an output connection")
            })?,
            ConnectionKind::NextStatement => ws.blk(id).previous.ok_or_else(|| {
                anyhow::Error::msg("Shadow block is missing a previous connection")
            })?,
            _ => {
                return Err(anyhow::Error::msg(
                    "Cannot connect a block to an inferior connection",
                ));
            }
        };
        if !ws.connect(parent, inferior) {
            return Err(anyhow::Error::msg("Could not connect block to connection"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support;

    #[test]
    fn failed_materialize_leaves_no_live_blocks() {
        let mut ws = support::workspace();
        let live = |ws: &Workspace| ws.blocks().filter(|b| !b.disposed).count();
        let before = live(&ws);

        let mut template = BlockState::of("value_passthrough");
        template
            .inputs
            .insert("NO_SUCH_INPUT".to_string(), BlockState::of("number"));
        assert!(materialize(&mut ws, &template, MaterializeOptions::default()).is_err());
        assert_eq!(live(&ws), before);

        // Same for a template continuing a stack past a block with no next
        // connection.
        let mut template = BlockState::of("number");
        template.next = Some(Box::new(BlockState::of("statement_noop")));
        assert!(materialize(&mut ws, &template, MaterializeOptions::default()).is_err());
        assert_eq!(live(&ws), before);
    }

    #[test]
    fn format_round_trip() -> anyhow::Result<()> {
        let mut state = BlockState::of("math_number");
        state
            .fields
            .insert("NUM".to_string(), "42".to_string());
        let mut outer = BlockState::of("math_sum");
        outer.inputs.insert("A".to_string(), state);

        for format in [FileFormat::Yaml, FileFormat::Json] {
            let serialized = outer.serialize(format);
            let parsed = BlockState::deserialize(&serialized, format)?;
            assert_eq!(parsed, outer);
        }
        Ok(())
    }
}
