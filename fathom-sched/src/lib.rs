// Emission of the scheduler-facing dataflow text. The dag is cloned,
// key-switch hints are spliced in as side nodes (one per mul level, one
// per rotate level/amount), nodes get dense sequential ids in ancestor-id
// order, and the whole thing prints as tab-separated node and edge lines.


mod perf;

pub use perf::{estimate_program, execution_time, PerfEstimate};

use fathom_base::{err, Level, LogScale, Result};
use fathom_ct::{CtKind, CtOp, CtProgram};
use fathom_dag::{Dag, NodeId};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::debug;

const CRATER_LAKE_BITS_PER_LEVEL: i64 = 28;
const SCRATCHPAD_MEGABYTES: i64 = 256;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SecurityBits {
    Bits80,
    Bits128,
}

/// `crater_lake_level(level) = ceil(level * bits_per_level / 28)`, with a
/// zero entry so the vector indexes directly by level value.
pub fn best_possible_level_to_craterlake_map(
    max_levels: Level,
    bits_per_level: LogScale,
) -> Vec<i64> {
    let mut result = vec![0];
    for level in 1..=max_levels.value() {
        result
            .push((level * bits_per_level.value() + CRATER_LAKE_BITS_PER_LEVEL - 1)
                / CRATER_LAKE_BITS_PER_LEVEL);
    }
    result
}

/// `log_q` of each level, indexed by `level - 1`.
pub fn default_level_to_log_q_map(usable_levels: Level, log_scale: LogScale) -> Vec<i64> {
    (0..usable_levels.value())
        .map(|x| x * log_scale.value())
        .collect()
}

fn log_q(level: Level, log_q_map: &[i64]) -> i64 {
    log_q_map[(level.value() - 1) as usize]
}

/// Key-switch digit count for a modulus size, bounded by the security
/// level. Exceeding the ceiling is a scheduler-model error.
pub fn ksh_digits(security: SecurityBits, log_q: i64) -> Result<i64> {
    match security {
        SecurityBits::Bits80 => {
            if log_q > 60 * 28 {
                Err(err("log q too large for 80-bit security"))
            } else if log_q > 52 * 28 {
                Ok(2)
            } else {
                Ok(1)
            }
        }
        SecurityBits::Bits128 => {
            if log_q > 51 * 128 {
                Err(err("log q too large for 128-bit security"))
            } else if log_q > 43 * 28 {
                Ok(3)
            } else if log_q > 32 * 28 {
                Ok(2)
            } else {
                Ok(1)
            }
        }
    }
}

fn axel_slots(level: Level, cl_map: &[i64]) -> i64 {
    2 * cl_map[level.value() as usize]
}

fn mul_cc_label(security: SecurityBits, log_q: i64) -> Result<&'static str> {
    Ok(match ksh_digits(security, log_q)? {
        1 => "MUL_KS_NEW",
        2 => "MUL_KS_2DIGIT",
        _ => "MUL_KS_3DIGIT",
    })
}

fn rotate_label(security: SecurityBits, log_q: i64) -> Result<&'static str> {
    Ok(match ksh_digits(security, log_q)? {
        1 => "ROTATE_KS_NEW",
        2 => "ROTATE_KS_2DIGIT",
        _ => "ROTATE_KS_3DIGIT",
    })
}

// The ksh dictionary: one hint node per (mul, level) and one per
// (rotate, level, rotate_by); the first consumer wires the hint behind
// its own first parent.
struct KshDictionary {
    mul_kshs: BTreeMap<i64, NodeId>,
    rotate_kshs: BTreeMap<(i64, i64), NodeId>,
}

impl KshDictionary {
    fn new() -> Self {
        KshDictionary {
            mul_kshs: BTreeMap::new(),
            rotate_kshs: BTreeMap::new(),
        }
    }

    fn at(&mut self, dag: &mut Dag<CtOp>, op: &CtOp) -> NodeId {
        let level = op.level();
        let info = fathom_base::LevelInfo::new(level, LogScale::new(0));
        match op.kind() {
            CtKind::MulCC => *self
                .mul_kshs
                .entry(level.value())
                .or_insert_with(|| dag.add_node(CtOp::new(CtKind::MulKsh, info), &[])),
            CtKind::Rotate { rotate_by } => *self
                .rotate_kshs
                .entry((level.value(), *rotate_by))
                .or_insert_with(|| {
                    dag.add_node(
                        CtOp::new(
                            CtKind::RotateKsh {
                                rotate_by: *rotate_by,
                            },
                            info,
                        ),
                        &[],
                    )
                }),
            _ => unreachable!("only muls and rotates consume key-switch hints"),
        }
    }
}

/// Clone the dag and attach a shared key-switch hint node to every op
/// that needs one.
pub fn add_schedulable_ksh_nodes(program: &CtProgram) -> Dag<CtOp> {
    let mut dag = program.dag().clone_from_ancestor();
    let mut kshs = KshDictionary::new();
    let consumers: Vec<NodeId> = dag
        .ids()
        .filter(|id| dag.value(*id).kind().requires_keyswitching())
        .collect();
    for id in consumers {
        let op = dag.value(id).clone();
        let ksh = kshs.at(&mut dag, &op);
        if dag.parents(ksh).is_empty() {
            let first_parent = dag.parents(id)[0];
            dag.add_edge(first_parent, ksh);
        }
        dag.add_edge(ksh, id);
    }
    dag
}

fn is_ksh(op: &CtOp) -> bool {
    matches!(op.kind(), CtKind::MulKsh | CtKind::RotateKsh { .. })
}

fn write_node(
    out: &mut impl Write,
    op: &CtOp,
    cl_map: &[i64],
    log_q_map: &[i64],
    security: SecurityBits,
) -> Result<()> {
    let slots = axel_slots(op.level(), cl_map);
    match op.kind() {
        CtKind::Input { io_spec } => {
            write!(out, "CIPHERTEXT\t{}\t{}\tct", io_spec.to_filename(), slots)?;
        }
        CtKind::Zero => {
            write!(out, "CIPHERTEXT\tZERO 0\t{}\tct", slots)?;
        }
        CtKind::MulCC => {
            let label = mul_cc_label(security, log_q(op.level(), log_q_map))?;
            write!(out, "{}\tmul\t{}\tct", label, slots)?;
        }
        CtKind::MulCP { .. } => {
            write!(out, "MUL_SIMPLE\tMulCP\t{}\tct", slots)?;
        }
        CtKind::MulCS { .. } => {
            write!(out, "MUL_SIMPLE\tMulCS\t{}\tct", slots)?;
        }
        CtKind::AddCC | CtKind::AddCP { .. } | CtKind::AddCS { .. } => {
            write!(out, "ADD\tadd\t{}\tct", slots)?;
        }
        CtKind::Rotate { .. } => {
            let label = rotate_label(security, log_q(op.level(), log_q_map))?;
            write!(out, "{}\trotate\t{}\tct", label, slots)?;
        }
        CtKind::Rescale => {
            write!(out, "RESCALE\trescale\t{}\tct", slots)?;
        }
        CtKind::Bootstrap => {
            // The scheduler sees a bootstrap as a fresh ciphertext.
            write!(out, "CIPHERTEXT\tBOOTSTRAPPED\t{}\tct", slots)?;
        }
        CtKind::Output { .. } => {
            // Outputs serialize as a fake MulCP for scheduler compatibility.
            write!(out, "MUL_SIMPLE\tMulCP\t{}\tct", slots)?;
        }
        CtKind::MulKsh => {
            let digits = ksh_digits(security, log_q(op.level(), log_q_map))?;
            let size = (digits + 1) * cl_map[op.level().value() as usize];
            write!(out, "KSH\tksh({}, mul)\t{}\tksh", op.level().value(), size)?;
        }
        CtKind::RotateKsh { rotate_by } => {
            let digits = ksh_digits(security, log_q(op.level(), log_q_map))?;
            let size = (digits + 1) * cl_map[op.level().value() as usize];
            write!(
                out,
                "KSH\tksh({}, {})\t{}\tksh",
                op.level().value(),
                rotate_by,
                size
            )?;
        }
    }
    Ok(())
}

/// Emit the scheduler-facing text: scratchpad header, one line per node
/// (hints included), then one line per edge, skipping edges into hints.
/// ModDown telemetry records go to `summary` when a sink is supplied.
pub fn write_schedulable_dataflow_graph(
    out: &mut impl Write,
    program: &CtProgram,
    cl_map: &[i64],
    log_q_map: &[i64],
    security: SecurityBits,
    mut summary: Option<&mut dyn Write>,
) -> Result<()> {
    let dag = add_schedulable_ksh_nodes(program);
    writeln!(out, "{}", SCRATCHPAD_MEGABYTES)?;
    let mut node_to_axel_id: BTreeMap<NodeId, i64> = BTreeMap::new();
    let mut count = 0;
    for id in dag.ids() {
        let op = dag.value(id);
        write!(out, "{}\t", count)?;
        node_to_axel_id.insert(id, count);
        count += 1;
        write_node(out, op, cl_map, log_q_map, security)?;
        writeln!(out)?;
        // Rescaling happens before any modulus drop on muls and
        // bootstraps; everything else pays one ModDown per distinct
        // child level below its own.
        if !matches!(
            op.kind(),
            CtKind::MulCC | CtKind::MulCP { .. } | CtKind::Bootstrap
        ) {
            if let Some(summary) = summary.as_deref_mut() {
                let mut child_levels: Vec<i64> = dag
                    .children(id)
                    .iter()
                    .map(|child| dag.value(*child).level().value())
                    .filter(|lvl| *lvl != op.level().value())
                    .collect();
                child_levels.sort_unstable();
                child_levels.dedup();
                for _ in child_levels {
                    writeln!(
                        summary,
                        "ModDownC {}",
                        cl_map[op.level().value() as usize]
                    )?;
                }
            }
        }
    }
    for id in dag.ids() {
        for child in dag.children(id) {
            if is_ksh(dag.value(*child)) {
                continue;
            }
            writeln!(out, "{}\t{}", node_to_axel_id[&id], node_to_axel_id[child])?;
        }
    }
    debug!(target: "fathom", nodes = count, "emitted schedulable dataflow graph");
    Ok(())
}
