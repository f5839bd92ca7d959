mod codegen;
mod commandline;
mod error;
mod il;
mod listing;
mod vars;

use anyhow::Result;
use clap::Parser;
use log::info;

use codegen::arm64::Arm64;
use codegen::machine::MachineListing;
use codegen::x64::X64;
use codegen::{TacCompiler, Target};
use commandline::{Options, TargetChoice};
use il::dag::{DagArena, OperatorKind};
use il::operators::OperatorTable;
use il::{LoweringEngine, TacListing};
use vars::{Frame, VarTable, Variable};

fn main() -> Result<()> {
    let opts = Options::parse();
    stderrlog::new().verbosity(opts.verbose as usize).init()?;

    let (mut arena, mut vars, tac) = demo_program()?;

    if opts.emit_tac {
        println!("; three-address code");
        print!("{}", tac);
        println!();
    }

    let mut frame = Frame::new();
    let listing = match opts.target {
        TargetChoice::X64 => compile(&X64, &mut arena, &mut vars, &mut frame, &tac)?,
        TargetChoice::Arm64 => compile(&Arm64, &mut arena, &mut vars, &mut frame, &tac)?,
    };
    print!("{}", listing);
    info!("frame size: {} bytes", frame.size());
    Ok(())
}

fn compile<T: Target>(
    target: &T,
    arena: &mut DagArena,
    vars: &mut VarTable,
    frame: &mut Frame,
    tac: &TacListing,
) -> Result<MachineListing> {
    println!("; {}", target.name());
    let compiler = TacCompiler::new(target, arena, vars, frame);
    Ok(compiler.compile(tac)?)
}

/// Builds the operand graph for a small worked example and lowers it:
///
/// ```text
/// x = a[i] + 3;
/// *p = x << 2;
/// ```
fn demo_program() -> Result<(DagArena, VarTable, TacListing)> {
    let mut arena = DagArena::new();
    let mut vars = VarTable::new();
    let table = OperatorTable::new();
    let mut tac = TacListing::new();

    let x = arena.leaf(vars.add(Variable::local("x", 8, -8)));
    let a = arena.leaf(vars.add(Variable::local("a", 40, -48).with_array(1, 4)));
    let i = arena.leaf(vars.add(Variable::local("i", 4, -56)));
    let three = arena.leaf(vars.add(Variable::int_const(3)));
    let elem = arena.node(OperatorKind::Index, vec![a, i]);
    let sum = arena.node(OperatorKind::Add, vec![elem, three]);
    let assign = arena.node(OperatorKind::Assign, vec![x, sum]);

    let p = arena.leaf(
        vars.add(
            Variable::local("p", 8, -64)
                .with_pointer(1)
                .with_elem_size(8),
        ),
    );
    let two = arena.leaf(vars.add(Variable::int_const(2)));
    let shifted = arena.node(OperatorKind::Shl, vec![x, two]);
    let store = arena.node(OperatorKind::AssignDeref, vec![p, shifted]);

    let mut engine = LoweringEngine::new(&mut arena, &table);
    engine.lower(&mut tac, assign)?;
    engine.lower(&mut tac, store)?;

    Ok((arena, vars, tac))
}
