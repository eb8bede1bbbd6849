use crate::chunk_ir::ChunkIr;
use crate::dict::{Dictionary, RamDictionary};
use crate::op::{CtKind, CtOp, ScaledPtVal};
use crate::program::{CtProgram, ProgramContext};
use fathom_base::{err, IoSpec, Level, LevelInfo, LogN, LogScale, Result};
use fathom_dag::{Dag, NodeId};
use std::io::Write;

// Persisted program format, line oriented and whitespace tokenized:
//
//   <log_n> <log_scale> <usable_levels>
//   <dictionary entry count>
//   <key> <ChunkIrTypeName> <fields...>        one line per entry
//   <node count>
//   <id> <TypeName> <fields...> <level> <log_scale> <n_parents> <parents...>
//
// Nodes are written in topological order so parents are always known by
// the time a child line is read; the id prefix keeps ids stable across a
// round trip. An unknown type name is a serialization error.

const EMPTY_TOKEN: &str = "?";

fn write_chunk_ir(out: &mut impl Write, chunk: &ChunkIr) -> Result<()> {
    match chunk {
        ChunkIr::Zero(_) => return Err(err("zero chunks are never persisted")),
        ChunkIr::Direct(values) => {
            write!(out, "DirectChunkIr {}", values.len())?;
            for v in values {
                write!(out, " {}", v.into_inner())?;
            }
        }
        ChunkIr::Indirect {
            tensor_name,
            flat_indices,
        } => {
            write!(out, "IndirectChunkIr {} {}", tensor_name, flat_indices.len())?;
            for idx in flat_indices {
                match idx {
                    Some(idx) => write!(out, " {}", idx)?,
                    None => write!(out, " {}", EMPTY_TOKEN)?,
                }
            }
        }
    }
    Ok(())
}

struct Tokens<'a> {
    iter: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(input: &'a str) -> Self {
        Tokens {
            iter: input.split_whitespace(),
        }
    }

    fn next_str(&mut self) -> Result<&'a str> {
        self.iter.next().ok_or_else(|| err("truncated program stream"))
    }

    fn next_i64(&mut self) -> Result<i64> {
        self.next_str()?
            .parse()
            .map_err(|_| err("expected an integer token"))
    }

    fn next_f64(&mut self) -> Result<f64> {
        self.next_str()?
            .parse()
            .map_err(|_| err("expected a float token"))
    }

    fn next_usize(&mut self) -> Result<usize> {
        let val = self.next_i64()?;
        if val < 0 {
            return Err(err("expected a non-negative count"));
        }
        Ok(val as usize)
    }

    fn next_level_info(&mut self) -> Result<LevelInfo> {
        let level = Level::parse(self.next_i64()?)?;
        let log_scale = LogScale::parse(self.next_i64()?)?;
        Ok(LevelInfo::new(level, log_scale))
    }
}

fn read_chunk_ir(tokens: &mut Tokens) -> Result<ChunkIr> {
    match tokens.next_str()? {
        "DirectChunkIr" => {
            let len = tokens.next_usize()?;
            let mut values = Vec::with_capacity(len);
            for _ in 0..len {
                values.push(tokens.next_f64()?);
            }
            Ok(ChunkIr::direct(values))
        }
        "IndirectChunkIr" => {
            let tensor_name = tokens.next_str()?.to_string();
            let len = tokens.next_usize()?;
            let mut flat_indices = Vec::with_capacity(len);
            for _ in 0..len {
                let tok = tokens.next_str()?;
                if tok == EMPTY_TOKEN {
                    flat_indices.push(None);
                } else {
                    flat_indices.push(Some(
                        tok.parse().map_err(|_| err("bad flat index token"))?,
                    ));
                }
            }
            Ok(ChunkIr::Indirect {
                tensor_name,
                flat_indices,
            })
        }
        _ => Err(err("unknown chunk ir type name")),
    }
}

fn write_op(out: &mut impl Write, op: &CtOp) -> Result<()> {
    write!(out, "{}", op.kind().type_name())?;
    match op.kind() {
        CtKind::Input { io_spec } | CtKind::Output { io_spec } => {
            write!(out, " {} {}", io_spec.name, io_spec.offset)?;
        }
        CtKind::AddCP {
            handle,
            pt_log_scale,
        }
        | CtKind::MulCP {
            handle,
            pt_log_scale,
        } => {
            write!(out, " {} {}", handle, pt_log_scale.value())?;
        }
        CtKind::AddCS { scalar } | CtKind::MulCS { scalar } => {
            write!(out, " {} {}", scalar.value.into_inner(), scalar.log_scale.value())?;
        }
        CtKind::Rotate { rotate_by } | CtKind::RotateKsh { rotate_by } => {
            write!(out, " {}", rotate_by)?;
        }
        CtKind::Zero
        | CtKind::AddCC
        | CtKind::MulCC
        | CtKind::Rescale
        | CtKind::Bootstrap
        | CtKind::MulKsh => {}
    }
    write!(
        out,
        " {} {}",
        op.level_info().level.value(),
        op.level_info().log_scale.value()
    )?;
    Ok(())
}

fn read_op(tokens: &mut Tokens) -> Result<CtOp> {
    let type_name = tokens.next_str()?;
    let kind = match type_name {
        "InputC" | "OutputC" => {
            let name = tokens.next_str()?.to_string();
            let offset = tokens.next_i64()?;
            let io_spec = IoSpec::new(name, offset);
            if type_name == "InputC" {
                CtKind::Input { io_spec }
            } else {
                CtKind::Output { io_spec }
            }
        }
        "AddCP" | "MulCP" => {
            let handle = tokens.next_str()?.to_string();
            let pt_log_scale = LogScale::parse(tokens.next_i64()?)?;
            if type_name == "AddCP" {
                CtKind::AddCP {
                    handle,
                    pt_log_scale,
                }
            } else {
                CtKind::MulCP {
                    handle,
                    pt_log_scale,
                }
            }
        }
        "AddCS" | "MulCS" => {
            let value = tokens.next_f64()?;
            let log_scale = LogScale::parse(tokens.next_i64()?)?;
            let scalar = ScaledPtVal::new(value, log_scale);
            if type_name == "AddCS" {
                CtKind::AddCS { scalar }
            } else {
                CtKind::MulCS { scalar }
            }
        }
        "RotateC" => CtKind::Rotate {
            rotate_by: tokens.next_i64()?,
        },
        "SchedulableRotateKsh" => CtKind::RotateKsh {
            rotate_by: tokens.next_i64()?,
        },
        "ZeroC" => CtKind::Zero,
        "AddCC" => CtKind::AddCC,
        "MulCC" => CtKind::MulCC,
        "RescaleC" => CtKind::Rescale,
        "BootstrapC" => CtKind::Bootstrap,
        "SchedulableMulKsh" => CtKind::MulKsh,
        _ => return Err(err("unknown ct op type name")),
    };
    let level_info = tokens.next_level_info()?;
    Ok(CtOp::new(kind, level_info))
}

pub fn write_program(program: &CtProgram, out: &mut impl Write) -> Result<()> {
    let context = program.context();
    writeln!(
        out,
        "{} {} {}",
        context.log_n().value(),
        context.log_scale().value(),
        context.usable_levels().value()
    )?;
    writeln!(out, "{}", program.chunk_dict().len())?;
    for (key, chunk) in program.chunk_dict().iter() {
        write!(out, "{} ", key)?;
        write_chunk_ir(out, chunk)?;
        writeln!(out)?;
    }
    let dag = program.dag();
    writeln!(out, "{}", dag.len())?;
    for id in dag.topological_order() {
        write!(out, "{} ", id)?;
        write_op(out, dag.value(id))?;
        write!(out, " {}", dag.parents(id).len())?;
        for parent in dag.parents(id) {
            write!(out, " {}", parent)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn read_program(input: &str) -> Result<CtProgram> {
    let mut tokens = Tokens::new(input);
    let raw_log_n = tokens.next_i64()?;
    if !(1..33).contains(&raw_log_n) {
        return Err(err("log n out of range"));
    }
    let log_n = LogN::new(raw_log_n);
    let log_scale = LogScale::parse(tokens.next_i64()?)?;
    let usable_levels = Level::parse(tokens.next_i64()?)?;
    let context = ProgramContext::new(log_n, log_scale, usable_levels);

    let mut chunk_dict = RamDictionary::new();
    let dict_len = tokens.next_usize()?;
    for _ in 0..dict_len {
        let key = tokens.next_str()?.to_string();
        let chunk = read_chunk_ir(&mut tokens)?;
        chunk_dict.insert_keyed(key, chunk);
    }

    let mut dag: Dag<CtOp> = Dag::new();
    let node_count = tokens.next_usize()?;
    for _ in 0..node_count {
        let id = NodeId(tokens.next_i64()?);
        let op = read_op(&mut tokens)?;
        if let CtKind::AddCP { handle, .. } | CtKind::MulCP { handle, .. } = op.kind() {
            if chunk_dict.at(handle).is_none() {
                return Err(err("node refers to a chunk key not in the dictionary"));
            }
        }
        let parent_count = tokens.next_usize()?;
        let mut parents = Vec::with_capacity(parent_count);
        for _ in 0..parent_count {
            let parent = NodeId(tokens.next_i64()?);
            if !dag.contains(parent) {
                return Err(err("node refers to an unknown parent id"));
            }
            parents.push(parent);
        }
        if dag.contains(id) {
            return Err(err("duplicate node id in program stream"));
        }
        dag.add_node_with_id(id, op, &parents);
    }
    Ok(CtProgram::with_parts(context, dag, chunk_dict))
}
