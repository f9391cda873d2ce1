// Based on https://github.com/scrtlabs/SecretNetwork/blob/621d3899babc4741ef1ba596152c097677d246db/cosmwasm/enclaves/shared/contract-engine/src/wasm3/gas.rs
use walrus::{ir::*, FunctionBuilder, GlobalId, InitExpr, LocalFunction, ValType};

pub const RESET_GAS: &str = "reset_gas";
pub const GET_GAS: &str = "get_gas";

/// Instruments every local function so that each block charges its length
/// against a gas global before running. Running out of gas zeroes the global
/// and traps, so the host can tell exhaustion apart from other traps.
///
/// The global starts at `initial_gas`, which bounds any start function.
pub fn rewrite(wasm: &[u8], initial_gas: i32) -> Result<Vec<u8>, super::Error> {
    let mut module = match walrus::Module::from_buffer(wasm) {
        Ok(m) => m,
        Err(e) => {
            return Err(super::Error {
                msg: format!("Failed to parse wasm: {e:?}"),
            })
        }
    };

    let gas_global =
        module
            .globals
            .add_local(ValType::I32, true, InitExpr::Value(Value::I32(initial_gas)));

    for (_, func) in module.funcs.iter_local_mut() {
        rewrite_function(func, gas_global);
    }

    {
        let mut func = FunctionBuilder::new(&mut module.types, &[ValType::I32], &[]);
        let amount = module.locals.add(ValType::I32);
        func.func_body().local_get(amount).global_set(gas_global);
        let reset_gas = func.finish(vec![amount], &mut module.funcs);
        module.exports.add(RESET_GAS, reset_gas);
    }

    {
        let mut func = FunctionBuilder::new(&mut module.types, &[], &[ValType::I32]);
        func.func_body().global_get(gas_global);
        let get_gas = func.finish(vec![], &mut module.funcs);
        module.exports.add(GET_GAS, get_gas);
    }

    Ok(module.emit_wasm())
}

fn rewrite_function(func: &mut LocalFunction, gas_global: GlobalId) {
    let block_ids: Vec<_> = {
        struct Collect(Vec<InstrSeqId>);
        impl<'instr> Visitor<'instr> for Collect {
            fn start_instr_seq(&mut self, seq: &'instr InstrSeq) {
                self.0.push(seq.id());
            }
        }
        let mut collect = Collect(Vec::new());
        dfs_in_order(&mut collect, func, func.entry_block());
        collect.0
    };
    for block_id in block_ids {
        rewrite_block(func, block_id, gas_global);
    }
}

/// Number of injected metering instructions.
const METERING_INSTRUCTION_COUNT: usize = 8;

fn rewrite_block(func: &mut LocalFunction, block_id: InstrSeqId, gas_global: GlobalId) {
    let block = func.block_mut(block_id);
    let block_len = block.instrs.len();
    let block_cost = block_len as i32;

    let builder = func.builder_mut();
    let mut builder = builder.dangling_instr_seq(None);
    let seq = builder
        // if unsigned(gas) < unsigned(cost) { gas = 0; trap }
        .global_get(gas_global)
        .i32_const(block_cost)
        .binop(BinaryOp::I32LtU)
        .if_else(
            None,
            |then| {
                then.i32_const(0).global_set(gas_global).unreachable();
            },
            |_else| {},
        )
        .global_get(gas_global)
        .i32_const(block_cost)
        .binop(BinaryOp::I32Sub)
        .global_set(gas_global);

    let mut new_instrs = Vec::with_capacity(block_len + METERING_INSTRUCTION_COUNT);
    new_instrs.append(seq.instrs_mut());

    let block = func.block_mut(block_id);
    new_instrs.extend_from_slice(block);
    block.instrs = new_instrs;
}
