use crate::chunk_ir::ChunkIr;
use crate::dict::{Dictionary, KeyType, RamDictionary};
use crate::op::{CtKind, CtOp, ScaledPtVal};
use fathom_base::{IoSpec, Level, LevelInfo, LogChunkSize, LogN, LogScale};
use fathom_dag::{Dag, NodeId};
use std::collections::BTreeSet;
use tracing::debug;

/// Global parameters a program is compiled against.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ProgramContext {
    log_n: LogN,
    log_scale: LogScale,
    usable_levels: Level,
}

impl ProgramContext {
    pub fn new(log_n: LogN, log_scale: LogScale, usable_levels: Level) -> Self {
        ProgramContext {
            log_n,
            log_scale,
            usable_levels,
        }
    }

    pub fn log_n(&self) -> LogN {
        self.log_n
    }

    pub fn log_chunk_size(&self) -> LogChunkSize {
        self.log_n.log_chunk_size()
    }

    pub fn log_scale(&self) -> LogScale {
        self.log_scale
    }

    pub fn usable_levels(&self) -> Level {
        self.usable_levels
    }
}

/// A lowered program: context, the ciphertext-op dag, and the dictionary
/// of plaintext chunk recipes the dag's nodes refer to.
#[derive(Clone, Debug)]
pub struct CtProgram {
    context: ProgramContext,
    dag: Dag<CtOp>,
    chunk_dict: RamDictionary<ChunkIr>,
    io_specs: BTreeSet<IoSpec>,
}

impl CtProgram {
    pub fn new(context: ProgramContext) -> Self {
        CtProgram {
            context,
            dag: Dag::new(),
            chunk_dict: RamDictionary::new(),
            io_specs: BTreeSet::new(),
        }
    }

    pub fn with_parts(
        context: ProgramContext,
        dag: Dag<CtOp>,
        chunk_dict: RamDictionary<ChunkIr>,
    ) -> Self {
        let mut io_specs = BTreeSet::new();
        for id in dag.ids() {
            if let Some(io_spec) = dag.value(id).kind().io_spec() {
                io_specs.insert(io_spec.clone());
            }
        }
        CtProgram {
            context,
            dag,
            chunk_dict,
            io_specs,
        }
    }

    pub fn context(&self) -> &ProgramContext {
        &self.context
    }

    pub fn dag(&self) -> &Dag<CtOp> {
        &self.dag
    }

    pub fn dag_mut(&mut self) -> &mut Dag<CtOp> {
        &mut self.dag
    }

    pub fn chunk_dict(&self) -> &RamDictionary<ChunkIr> {
        &self.chunk_dict
    }

    pub fn record_chunk(&mut self, chunk: ChunkIr) -> KeyType {
        self.chunk_dict.record(chunk)
    }

    pub fn chunk_ir(&self, key: &str) -> Option<&ChunkIr> {
        self.chunk_dict.at(key)
    }

    pub fn add_node(&mut self, op: CtOp, parents: &[NodeId]) -> NodeId {
        if let Some(io_spec) = op.kind().io_spec() {
            assert!(
                self.io_specs.insert(io_spec.clone()),
                "io spec bound to two nodes"
            );
        }
        self.dag.add_node(op, parents)
    }

    pub fn level_info(&self, id: NodeId) -> LevelInfo {
        self.dag.value(id).level_info()
    }

    fn is_zero(&self, id: NodeId) -> bool {
        self.dag.value(id).kind().is_zero()
    }

    /// The shared zero ciphertext at `level_info`. Zeroes hang off the
    /// sentinel so one per level-info serves the whole dag.
    pub fn fetch_zero_c(&mut self, level_info: LevelInfo) -> NodeId {
        let hit = self.dag.sentinel_children().iter().copied().find(|id| {
            self.dag.value(*id).kind().is_zero() && self.dag.value(*id).level_info() == level_info
        });
        if let Some(id) = hit {
            return id;
        }
        self.dag.add_node(CtOp::new(CtKind::Zero, level_info), &[])
    }

    pub fn fetch_zero_same_level_as(&mut self, node: NodeId) -> NodeId {
        let level_info = self.level_info(node);
        self.fetch_zero_c(level_info)
    }

    /// The zero that matches what a MulCP child of `parent` would sit at.
    pub fn fetch_zero_as_mul_cp_child_of(
        &mut self,
        parent: NodeId,
        pt_log_scale: LogScale,
    ) -> NodeId {
        let parent_info = self.level_info(parent);
        self.fetch_zero_c(LevelInfo::new(
            parent_info.level,
            pt_log_scale + parent_info.log_scale,
        ))
    }

    pub fn create_input_c(&mut self, level_info: LevelInfo, io_spec: IoSpec) -> NodeId {
        self.add_node(CtOp::new(CtKind::Input { io_spec }, level_info), &[])
    }

    pub fn create_output_c(
        &mut self,
        level_info: LevelInfo,
        io_spec: IoSpec,
        parent: NodeId,
    ) -> NodeId {
        self.add_node(CtOp::new(CtKind::Output { io_spec }, level_info), &[parent])
    }

    /// Add of two ciphertexts; adding a zero is the other operand.
    pub fn create_add_cc(&mut self, parent_1: NodeId, parent_2: NodeId) -> NodeId {
        if self.is_zero(parent_2) {
            return parent_1;
        }
        if self.is_zero(parent_1) {
            return parent_2;
        }
        let info_1 = self.level_info(parent_1);
        let info_2 = self.level_info(parent_2);
        let level_info = LevelInfo::new(
            info_1.level.min(info_2.level),
            info_1.log_scale.max(info_2.log_scale),
        );
        self.add_node(CtOp::new(CtKind::AddCC, level_info), &[parent_1, parent_2])
    }

    pub fn create_add_cp(
        &mut self,
        parent: NodeId,
        chunk: ChunkIr,
        pt_log_scale: LogScale,
    ) -> NodeId {
        let handle = self.record_chunk(chunk);
        let parent_info = self.level_info(parent);
        let level_info = LevelInfo::new(
            parent_info.level,
            parent_info.log_scale.max(pt_log_scale),
        );
        self.add_node(
            CtOp::new(
                CtKind::AddCP {
                    handle,
                    pt_log_scale,
                },
                level_info,
            ),
            &[parent],
        )
    }

    pub fn create_add_cs(&mut self, parent: NodeId, scalar: ScaledPtVal) -> NodeId {
        let parent_info = self.level_info(parent);
        let level_info = LevelInfo::new(
            parent_info.level,
            parent_info.log_scale.max(scalar.log_scale),
        );
        self.add_node(CtOp::new(CtKind::AddCS { scalar }, level_info), &[parent])
    }

    /// Multiply two ciphertexts; a zero operand folds the whole product
    /// to the zero at the product's level info.
    pub fn create_mul_cc(&mut self, parent_1: NodeId, parent_2: NodeId) -> NodeId {
        let info_1 = self.level_info(parent_1);
        let info_2 = self.level_info(parent_2);
        let level_info = LevelInfo::new(
            info_1.level.min(info_2.level),
            info_1.log_scale + info_2.log_scale,
        );
        if self.is_zero(parent_1) || self.is_zero(parent_2) {
            return self.fetch_zero_c(level_info);
        }
        self.add_node(CtOp::new(CtKind::MulCC, level_info), &[parent_1, parent_2])
    }

    pub fn create_mul_cp(
        &mut self,
        parent: NodeId,
        chunk: ChunkIr,
        pt_log_scale: LogScale,
    ) -> NodeId {
        let handle = self.record_chunk(chunk);
        if self.is_zero(parent) {
            return self.fetch_zero_as_mul_cp_child_of(parent, pt_log_scale);
        }
        let parent_info = self.level_info(parent);
        let level_info = LevelInfo::new(parent_info.level, pt_log_scale + parent_info.log_scale);
        self.add_node(
            CtOp::new(
                CtKind::MulCP {
                    handle,
                    pt_log_scale,
                },
                level_info,
            ),
            &[parent],
        )
    }

    pub fn create_mul_cs(&mut self, parent: NodeId, scalar: ScaledPtVal) -> NodeId {
        if self.is_zero(parent) {
            return self.fetch_zero_as_mul_cp_child_of(parent, scalar.log_scale);
        }
        let parent_info = self.level_info(parent);
        let level_info = LevelInfo::new(
            parent_info.level,
            scalar.log_scale + parent_info.log_scale,
        );
        self.add_node(CtOp::new(CtKind::MulCS { scalar }, level_info), &[parent])
    }

    /// Rotating a zero, by zero, or by a full chunk is the parent itself.
    pub fn create_rotate_c(&mut self, parent: NodeId, rotate_by: i64) -> NodeId {
        if self.is_zero(parent) {
            return parent;
        }
        if rotate_by == 0 || rotate_by == self.context.log_chunk_size().chunk_size().value() {
            return parent;
        }
        let level_info = self.level_info(parent);
        self.add_node(
            CtOp::new(CtKind::Rotate { rotate_by }, level_info),
            &[parent],
        )
    }

    pub fn create_bootstrap_c(&mut self, level_info: LevelInfo, parent: NodeId) -> NodeId {
        self.add_node(CtOp::new(CtKind::Bootstrap, level_info), &[parent])
    }

    pub fn create_rescale_c(&mut self, level_info: LevelInfo, parent: NodeId) -> NodeId {
        self.add_node(CtOp::new(CtKind::Rescale, level_info), &[parent])
    }
}

/// Split a program at bootstrap boundaries: every bootstrap starts a new
/// partition, and parents crossing a partition boundary are replaced by
/// phony inputs so each partition is self-contained.
pub fn partition_program(program: &CtProgram) -> Vec<CtProgram> {
    let mut result: Vec<CtProgram> = Vec::new();
    let mut node_partition: std::collections::BTreeMap<NodeId, usize> = Default::default();
    let mut old_to_new: std::collections::BTreeMap<NodeId, NodeId> = Default::default();
    let dag = program.dag();
    for id in dag.topological_order() {
        let mut partition = dag
            .parents(id)
            .iter()
            .map(|parent| node_partition[parent])
            .max()
            .unwrap_or(0);
        if matches!(dag.value(id).kind(), CtKind::Bootstrap) {
            partition += 1;
        }
        while result.len() <= partition {
            result.push(CtProgram::new(*program.context()));
        }
        let parents: Vec<NodeId> = dag
            .parents(id)
            .iter()
            .filter(|parent| node_partition[parent] == partition)
            .map(|parent| old_to_new[parent])
            .collect();
        node_partition.insert(id, partition);
        let new_id = if parents.is_empty() {
            // Cross-partition feeds arrive as phony inputs.
            result[partition].add_node(
                CtOp::new(
                    CtKind::Input {
                        io_spec: IoSpec::new(format!("phony_{}", id), 15),
                    },
                    dag.value(id).level_info(),
                ),
                &[],
            )
        } else {
            result[partition].add_node(dag.value(id).clone(), &parents)
        };
        old_to_new.insert(id, new_id);
    }
    debug!(target: "fathom", partitions = result.len(), "partitioned program");
    result
}
